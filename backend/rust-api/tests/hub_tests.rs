use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::channel::mpsc as fmpsc;
use futures::{SinkExt, StreamExt};
use quizarena_api::config::HubConfig;
use quizarena_api::hub::{ClientSession, Connection, ConnectionId, FrameContext, FrameHandler, Hub};
use quizarena_api::models::message::ErrorPayload;
use quizarena_api::models::{MessageType, OutboundMessage, Principal};
use serde_json::{json, Value};

mod common;

fn player(user_id: &str) -> Principal {
    Principal::new(user_id, format!("Player {}", user_id), false)
}

fn notice(session_id: &str, text: &str) -> OutboundMessage<ErrorPayload> {
    OutboundMessage::new(
        MessageType::Error,
        Some(session_id),
        ErrorPayload {
            error: text.to_string(),
        },
    )
}

#[tokio::test]
async fn broadcast_reaches_only_the_target_session() {
    let hub = Hub::new();
    let mut s1 = Vec::new();
    let mut s2 = Vec::new();

    for i in 0..150 {
        let (conn, queue) = Connection::new(player(&format!("a{}", i)), Some("s1".into()), 256);
        hub.register(conn).await;
        s1.push(queue);
    }
    for i in 0..50 {
        let (conn, queue) = Connection::new(player(&format!("b{}", i)), Some("s2".into()), 256);
        hub.register(conn).await;
        s2.push(queue);
    }
    // discard join announcements
    for queue in s1.iter_mut().chain(s2.iter_mut()) {
        common::drain(queue);
    }

    let delivered = hub.broadcast_to_session("s1", &notice("s1", "hello")).await;
    assert_eq!(delivered, 150);

    for queue in s1.iter_mut() {
        let got = common::drain(queue);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0]["sessionId"], "s1");
    }
    for queue in s2.iter_mut() {
        assert!(common::drain(queue).is_empty());
    }
    assert_eq!(hub.session_client_count("s1").await, 150);
    assert_eq!(hub.session_client_count("s2").await, 50);
}

#[tokio::test]
async fn slow_consumer_is_dropped_without_blocking_others() {
    let hub = Hub::new();
    let mut healthy = Vec::new();
    for i in 0..20 {
        let (conn, queue) = Connection::new(player(&format!("u{}", i)), Some("s1".into()), 256);
        hub.register(conn).await;
        healthy.push(queue);
    }
    // registered last so no join announcement lands in its queue
    let (slow, mut slow_queue) = Connection::new(player("slow"), Some("s1".into()), 1);
    let slow_id = hub.register(slow).await;
    for queue in healthy.iter_mut() {
        common::drain(queue);
    }

    assert_eq!(hub.broadcast_to_session("s1", &notice("s1", "one")).await, 21);
    let second = tokio::time::timeout(
        Duration::from_secs(1),
        hub.broadcast_to_session("s1", &notice("s1", "two")),
    )
    .await
    .expect("broadcast must not block on a full queue");
    assert_eq!(second, 20);

    assert!(!hub.is_user_connected("s1", "slow").await);
    assert_eq!(hub.session_client_count("s1").await, 20);
    assert!(!hub.unregister(slow_id).await);

    for queue in healthy.iter_mut() {
        assert_eq!(common::drain(queue).len(), 2);
    }
    // the queued frame is still readable, then the queue reports closed
    assert!(slow_queue.recv().await.is_some());
    assert!(slow_queue.recv().await.is_none());
}

#[tokio::test]
async fn one_full_queue_among_two_sessions_drops_only_that_connection() {
    let hub = Hub::new();
    let mut session_b = Vec::new();
    for i in 0..50 {
        let (conn, queue) = Connection::new(player(&format!("b{}", i)), Some("s2".into()), 256);
        hub.register(conn).await;
        session_b.push(queue);
    }
    let mut session_a = Vec::new();
    for i in 0..149 {
        let (conn, queue) = Connection::new(player(&format!("a{}", i)), Some("s1".into()), 256);
        hub.register(conn).await;
        session_a.push(queue);
    }
    let (stuck, _stuck_queue) = Connection::new(player("stuck"), Some("s1".into()), 1);
    let stuck_id = hub.register(stuck).await;
    for queue in session_a.iter_mut().chain(session_b.iter_mut()) {
        common::drain(queue);
    }

    // fill the only slot without anyone reading it
    assert!(hub.send_to_connection(stuck_id, &notice("s1", "filler")).await);

    let delivered = hub.broadcast_to_session("s1", &notice("s1", "round")).await;
    assert_eq!(delivered, 149);
    assert_eq!(hub.session_client_count("s1").await, 149);
    assert_eq!(hub.session_client_count("s2").await, 50);
    assert!(!hub.is_user_connected("s1", "stuck").await);

    for queue in session_a.iter_mut() {
        assert_eq!(common::drain(queue).len(), 1);
    }
    for queue in session_b.iter_mut() {
        assert!(common::drain(queue).is_empty());
    }
}

#[tokio::test]
async fn join_and_leave_are_announced_to_the_rest_of_the_session() {
    let hub = Hub::new();
    let (first, mut first_queue) = Connection::new(player("alice"), Some("s1".into()), 16);
    hub.register(first).await;
    let (second, mut second_queue) = Connection::new(player("bob"), Some("s1".into()), 16);
    let second_id = hub.register(second).await;

    let joined = common::drain(&mut first_queue);
    assert_eq!(common::types(&joined), vec!["participant_join"]);
    assert_eq!(joined[0]["data"]["userId"], "bob");
    assert!(common::drain(&mut second_queue).is_empty());

    assert!(hub.unregister(second_id).await);
    let left = common::drain(&mut first_queue);
    assert_eq!(common::types(&left), vec!["participant_leave"]);
    assert_eq!(left[0]["data"]["displayName"], "Player bob");
    assert_eq!(hub.connected_user_ids("s1").await, vec!["alice".to_string()]);
}

#[tokio::test]
async fn user_scoped_delivery_covers_every_connection_of_the_user() {
    let hub = Hub::new();
    let (phone, mut phone_queue) = Connection::new(player("alice"), Some("s1".into()), 16);
    let (laptop, mut laptop_queue) = Connection::new(player("alice"), None, 16);
    let (other, mut other_queue) = Connection::new(player("bob"), Some("s1".into()), 16);
    hub.register(phone).await;
    hub.register(laptop).await;
    hub.register(other).await;
    common::drain(&mut phone_queue);

    let sent = hub.broadcast_to_user("alice", &notice("s1", "psst")).await;
    assert_eq!(sent, 2);
    assert_eq!(common::drain(&mut phone_queue).len(), 1);
    assert_eq!(common::drain(&mut laptop_queue).len(), 1);
    assert!(common::drain(&mut other_queue).is_empty());
}

type Inbound = fmpsc::UnboundedSender<Result<Message, Infallible>>;
type Outbound = fmpsc::UnboundedReceiver<Message>;

/// Spawns a client session over in-process channels and returns both ends.
async fn spawn_client(
    state: &Arc<quizarena_api::AppState>,
    principal: Principal,
    session_id: Option<&str>,
    config: HubConfig,
) -> (ConnectionId, Inbound, Outbound, tokio::task::JoinHandle<()>) {
    let (conn, queue) = Connection::new(
        principal.clone(),
        session_id.map(str::to_owned),
        config.outbound_queue_capacity,
    );
    let connection_id = state.hub.register(conn).await;

    let (inbound_tx, inbound_rx) = fmpsc::unbounded::<Result<Message, Infallible>>();
    let (outbound_tx, outbound_rx) = fmpsc::unbounded::<Message>();
    let handler: Arc<dyn FrameHandler> = Arc::new(state.dispatcher.clone());
    let client = ClientSession::new(
        state.hub.clone(),
        handler,
        config,
        FrameContext {
            connection_id,
            principal,
            session_id: session_id.map(str::to_owned),
        },
    );
    let task = tokio::spawn(client.run(queue, outbound_tx, inbound_rx));
    (connection_id, inbound_tx, outbound_rx, task)
}

async fn send(inbound: &mut Inbound, frame: Value) {
    inbound
        .send(Ok(Message::Text(frame.to_string().into())))
        .await
        .expect("client loop alive");
}

/// Next text frame, skipping transport frames.
async fn next_text(outbound: &mut Outbound) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(2), outbound.next())
            .await
            .expect("frame in time")
            .expect("stream open");
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).expect("json frame");
        }
    }
}

#[tokio::test]
async fn ping_frame_gets_pong_and_garbage_is_ignored() {
    let state = common::test_state();
    let (_, mut inbound, mut outbound, task) =
        spawn_client(&state, player("alice"), None, HubConfig::default()).await;

    inbound
        .send(Ok(Message::Text("{not json".into())))
        .await
        .unwrap();
    send(&mut inbound, json!({ "type": "mystery" })).await;
    send(&mut inbound, json!({ "type": "ping" })).await;

    let reply = next_text(&mut outbound).await;
    assert_eq!(reply["type"], "pong");

    // closing the inbound side ends the session and unregisters the connection
    drop(inbound);
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("session ends")
        .unwrap();
    assert_eq!(state.hub.connection_count().await, 0);
}

#[tokio::test]
async fn oversized_frames_are_dropped() {
    let state = common::test_state();
    let config = HubConfig {
        max_message_size: 64,
        ..HubConfig::default()
    };
    let (_, mut inbound, mut outbound, _task) = spawn_client(&state, player("alice"), None, config).await;

    let padding = "x".repeat(128);
    send(&mut inbound, json!({ "type": "ping", "data": { "pad": padding } })).await;
    send(&mut inbound, json!({ "type": "ping" })).await;

    // only the small ping is answered
    assert_eq!(next_text(&mut outbound).await["type"], "pong");
    assert!(
        tokio::time::timeout(Duration::from_millis(100), outbound.next())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn join_and_answer_over_the_socket() {
    let state = common::test_state();
    let session = common::create_session(&state, 0, false, 0).await;
    let (_, mut inbound, mut outbound, _task) =
        spawn_client(&state, player("alice"), None, HubConfig::default()).await;

    send(
        &mut inbound,
        json!({ "type": "join_session", "data": { "sessionId": session.id } }),
    )
    .await;
    let joined = next_text(&mut outbound).await;
    assert_eq!(joined["type"], "join_success");
    assert_eq!(joined["data"]["userId"], "alice");
    assert!(state.hub.is_user_connected(&session.id, "alice").await);

    state.sessions.start_session(&session.id).await.unwrap();
    assert_eq!(next_text(&mut outbound).await["type"], "session_update");

    let question = common::question(&state, &session.id).await;
    assert_eq!(next_text(&mut outbound).await["type"], "question_start");

    send(
        &mut inbound,
        json!({
            "type": "answer_submit",
            "data": { "questionId": question.id, "selectedOption": common::CORRECT, "responseTime": 800 }
        }),
    )
    .await;
    let ack = next_text(&mut outbound).await;
    assert_eq!(ack["type"], "answer_submitted");
    assert_eq!(ack["data"]["isCorrect"], true);
    assert_eq!(ack["data"]["questionId"], question.id.as_str());
}

#[tokio::test]
async fn admin_control_requires_admin() {
    let state = common::test_state();
    let session = common::create_session(&state, 0, false, 0).await;

    let (_, mut inbound, mut outbound, _task) =
        spawn_client(&state, player("mallory"), Some(&session.id), HubConfig::default()).await;
    send(
        &mut inbound,
        json!({ "type": "admin_control", "data": { "action": "start" } }),
    )
    .await;
    assert_eq!(next_text(&mut outbound).await["type"], "error");
    assert!(state.sessions.get_session(&session.id).await.unwrap().is_waiting());

    let admin = Principal::new("boss", "Boss", true);
    let (_, mut admin_in, mut admin_out, _admin_task) =
        spawn_client(&state, admin, Some(&session.id), HubConfig::default()).await;
    send(
        &mut admin_in,
        json!({ "type": "admin_control", "data": { "action": "start" } }),
    )
    .await;
    let update = next_text(&mut admin_out).await;
    assert_eq!(update["type"], "session_update");
    assert_eq!(update["data"]["status"], "active");
}

#[tokio::test]
async fn unregistering_closes_the_transport() {
    let state = common::test_state();
    let (id, _inbound, mut outbound, task) =
        spawn_client(&state, player("alice"), Some("s1"), HubConfig::default()).await;
    assert_eq!(state.hub.connected_user_ids("s1").await, vec!["alice".to_string()]);

    // the registry owns the only sender, so removal closes the queue
    assert!(state.hub.unregister(id).await);

    let closing = tokio::time::timeout(Duration::from_secs(2), outbound.next())
        .await
        .expect("close frame in time");
    assert!(matches!(closing, Some(Message::Close(_))));
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("session ends")
        .unwrap();
    assert_eq!(state.hub.session_client_count("s1").await, 0);
}

#[tokio::test]
async fn missing_keepalive_response_ends_the_connection() {
    let state = common::test_state();
    let config = HubConfig {
        ping_period: Duration::from_millis(40),
        pong_wait: Duration::from_millis(300),
        ..HubConfig::default()
    };
    let (_, mut inbound, mut outbound, task) =
        spawn_client(&state, player("alice"), Some("s1"), config).await;

    // answering the first few pings keeps the connection past one pong window
    for _ in 0..10 {
        let frame = tokio::time::timeout(Duration::from_secs(2), outbound.next())
            .await
            .expect("keepalive in time")
            .expect("stream open");
        assert!(matches!(frame, Message::Ping(_)));
        inbound.send(Ok(Message::Pong(Default::default()))).await.unwrap();
    }
    assert!(state.hub.is_user_connected("s1", "alice").await);

    // then go silent
    tokio::time::timeout(Duration::from_secs(3), task)
        .await
        .expect("read deadline ends the session")
        .unwrap();
    assert_eq!(state.hub.connection_count().await, 0);
    drop(inbound);
}

#[tokio::test]
async fn zero_keepalive_period_does_not_kill_the_connection() {
    let state = common::test_state();
    let config = HubConfig {
        ping_period: Duration::ZERO,
        ..HubConfig::default()
    };
    let (_, mut inbound, mut outbound, task) =
        spawn_client(&state, player("alice"), Some("s1"), config).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!task.is_finished());
    assert!(state.hub.is_user_connected("s1", "alice").await);

    send(&mut inbound, json!({ "type": "ping" })).await;
    assert_eq!(next_text(&mut outbound).await["type"], "pong");
}
