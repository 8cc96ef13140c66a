use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::ws::{Message, Utf8Bytes};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, timeout_at, Duration, Instant};

use super::registry::{ConnectionId, Hub};
use crate::config::HubConfig;
use crate::models::message::{
    AdminControlData, AnswerSubmitData, ClientFrame, ClientFrameKind, ErrorPayload,
    JoinSessionData,
};
use crate::models::{MessageType, OutboundMessage, Principal};

/// Who sent an inbound frame, fixed when the connection is accepted.
#[derive(Debug, Clone)]
pub struct FrameContext {
    pub connection_id: ConnectionId,
    pub principal: Principal,
    pub session_id: Option<String>,
}

/// Consumer of quiz-level frames. The hub only routes them here.
#[async_trait]
pub trait FrameHandler: Send + Sync {
    async fn on_answer_submit(&self, ctx: &FrameContext, session_id: &str, data: AnswerSubmitData);

    /// Only called for admin principals.
    async fn on_admin_control(&self, ctx: &FrameContext, session_id: &str, data: AdminControlData);

    /// Returns the session the connection now belongs to, if the join succeeded.
    async fn on_join_session(&self, ctx: &FrameContext, data: JoinSessionData) -> Option<String>;
}

/// Bridges one physical connection to the hub.
///
/// `run` drives two loops: a spawned writer that is the only thing touching the
/// sink, and the reader on the calling task. Whichever ends first tears the
/// connection down through `Hub::unregister`.
pub struct ClientSession {
    hub: Arc<Hub>,
    handler: Arc<dyn FrameHandler>,
    config: HubConfig,
    ctx: FrameContext,
}

impl ClientSession {
    pub fn new(
        hub: Arc<Hub>,
        handler: Arc<dyn FrameHandler>,
        config: HubConfig,
        ctx: FrameContext,
    ) -> Self {
        Self {
            hub,
            handler,
            config: config.normalized(),
            ctx,
        }
    }

    pub async fn run<S, R, E>(mut self, queue: mpsc::Receiver<Utf8Bytes>, sink: S, mut stream: R)
    where
        S: Sink<Message> + Unpin + Send + 'static,
        S::Error: Display + Send,
        R: Stream<Item = Result<Message, E>> + Unpin + Send,
        E: Display + Send,
    {
        let connection_id = self.ctx.connection_id;
        let mut writer = tokio::spawn(write_loop(
            connection_id,
            queue,
            sink,
            self.config.ping_period,
            self.config.write_wait,
        ));

        tokio::select! {
            _ = self.read_loop(&mut stream) => {}
            _ = &mut writer => {
                tracing::debug!(connection_id = %connection_id, "Write loop ended first");
            }
        }

        self.hub.unregister(connection_id).await;

        // the queue is closed now, so the writer flushes a close frame and exits
        if !writer.is_finished() && timeout(self.config.write_wait, &mut writer).await.is_err() {
            writer.abort();
        }
    }

    async fn read_loop<R, E>(&mut self, stream: &mut R)
    where
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        let mut deadline = Instant::now() + self.config.pong_wait;
        loop {
            let message = match timeout_at(deadline, stream.next()).await {
                Err(_) => {
                    tracing::info!(
                        connection_id = %self.ctx.connection_id,
                        "No keepalive response before read deadline"
                    );
                    return;
                }
                Ok(None) => return,
                Ok(Some(Err(e))) => {
                    tracing::debug!(connection_id = %self.ctx.connection_id, "Read error: {}", e);
                    return;
                }
                Ok(Some(Ok(message))) => message,
            };

            match message {
                Message::Text(text) => {
                    if text.len() > self.config.max_message_size {
                        tracing::warn!(
                            connection_id = %self.ctx.connection_id,
                            size = text.len(),
                            "Dropping oversized frame"
                        );
                        continue;
                    }
                    self.handle_text(text.as_str()).await;
                }
                Message::Pong(_) => deadline = Instant::now() + self.config.pong_wait,
                Message::Close(_) => return,
                // transport-level pings are answered by the websocket layer
                Message::Ping(_) | Message::Binary(_) => {}
            }
        }
    }

    async fn handle_text(&mut self, text: &str) {
        let frame: ClientFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(connection_id = %self.ctx.connection_id, "Malformed frame: {}", e);
                return;
            }
        };

        let Some(kind) = ClientFrameKind::parse(&frame.kind) else {
            tracing::debug!(
                connection_id = %self.ctx.connection_id,
                kind = %frame.kind,
                "Ignoring unknown frame type"
            );
            return;
        };

        match kind {
            ClientFrameKind::Ping => {
                self.hub
                    .send_to_connection(
                        self.ctx.connection_id,
                        &OutboundMessage::<()>::bare(MessageType::Pong),
                    )
                    .await;
            }
            ClientFrameKind::AnswerSubmit => {
                let Some(session_id) = frame.session_id.or_else(|| self.ctx.session_id.clone())
                else {
                    self.reply_error("sessionId is required").await;
                    return;
                };
                let Some(data) = decode::<AnswerSubmitData>(frame.data) else {
                    self.reply_error("invalid answer_submit payload").await;
                    return;
                };
                self.handler
                    .on_answer_submit(&self.ctx, &session_id, data)
                    .await;
            }
            ClientFrameKind::AdminControl => {
                if !self.ctx.principal.is_admin {
                    tracing::warn!(
                        connection_id = %self.ctx.connection_id,
                        user_id = %self.ctx.principal.user_id,
                        "admin_control from non-admin ignored"
                    );
                    self.reply_error("admin privileges required").await;
                    return;
                }
                let Some(session_id) = frame.session_id.or_else(|| self.ctx.session_id.clone())
                else {
                    self.reply_error("sessionId is required").await;
                    return;
                };
                let Some(data) = decode::<AdminControlData>(frame.data) else {
                    self.reply_error("invalid admin_control payload").await;
                    return;
                };
                self.handler
                    .on_admin_control(&self.ctx, &session_id, data)
                    .await;
            }
            ClientFrameKind::JoinSession => {
                let data = decode::<JoinSessionData>(frame.data)
                    .or_else(|| frame.session_id.map(|session_id| JoinSessionData { session_id }));
                let Some(data) = data else {
                    self.reply_error("sessionId is required").await;
                    return;
                };
                if let Some(session_id) = self.handler.on_join_session(&self.ctx, data).await {
                    self.ctx.session_id = Some(session_id);
                }
            }
        }
    }

    async fn reply_error(&self, message: &str) {
        let reply = OutboundMessage::new(
            MessageType::Error,
            self.ctx.session_id.as_deref(),
            ErrorPayload {
                error: message.to_string(),
            },
        );
        self.hub
            .send_to_connection(self.ctx.connection_id, &reply)
            .await;
    }
}

fn decode<T: DeserializeOwned>(data: Option<serde_json::Value>) -> Option<T> {
    data.and_then(|value| serde_json::from_value(value).ok())
}

async fn write_loop<S>(
    connection_id: ConnectionId,
    mut queue: mpsc::Receiver<Utf8Bytes>,
    mut sink: S,
    ping_period: Duration,
    write_wait: Duration,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ticker = interval_at(Instant::now() + ping_period, ping_period);

    loop {
        let outgoing = tokio::select! {
            next = queue.recv() => match next {
                Some(text) => Message::Text(text),
                None => {
                    // hub closed the queue
                    let _ = timeout(write_wait, sink.send(Message::Close(None))).await;
                    return;
                }
            },
            _ = ticker.tick() => Message::Ping(Bytes::new()),
        };

        match timeout(write_wait, sink.send(outgoing)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(connection_id = %connection_id, "Write failed: {}", e);
                return;
            }
            Err(_) => {
                tracing::debug!(connection_id = %connection_id, "Write timed out");
                return;
            }
        }
    }
}
