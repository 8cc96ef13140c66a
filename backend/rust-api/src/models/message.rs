use axum::extract::ws::Utf8Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::participant::Participant;
use super::question::Question;
use super::session::SessionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    QuestionStart,
    QuestionEnd,
    RoundResult,
    SessionUpdate,
    ParticipantJoin,
    ParticipantLeave,
    RevivalStart,
    RevivalResult,
    AnswerSubmitted,
    JoinSuccess,
    Error,
    Ping,
    Pong,
}

/// Envelope shared by every server-to-client event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage<T = serde_json::Value> {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Unix seconds.
    pub timestamp: i64,
}

impl<T: Serialize> OutboundMessage<T> {
    pub fn new(kind: MessageType, session_id: Option<&str>, data: T) -> Self {
        Self {
            kind,
            session_id: session_id.map(str::to_owned),
            data: Some(data),
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn encode(&self) -> Result<Utf8Bytes, serde_json::Error> {
        serde_json::to_string(self).map(Utf8Bytes::from)
    }
}

impl OutboundMessage<()> {
    /// A message with neither session nor payload, e.g. `pong`.
    pub fn bare(kind: MessageType) -> Self {
        Self {
            kind,
            session_id: None,
            data: None,
            timestamp: Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub round: u32,
    pub category: String,
}

impl From<&Question> for QuestionView {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id.clone(),
            text: q.text.clone(),
            options: q.options.clone(),
            round: q.round,
            category: q.category.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStartPayload {
    pub question: QuestionView,
    pub time_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionEndPayload {
    pub question_id: String,
    /// `-1` when the question was skipped without revealing an answer.
    pub correct_answer: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantScore {
    pub user_id: String,
    pub display_name: String,
    pub score: u32,
}

impl From<&Participant> for ParticipantScore {
    fn from(p: &Participant) -> Self {
        Self {
            user_id: p.user_id.clone(),
            display_name: p.display_name.clone(),
            score: p.score,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResultPayload {
    pub round: u32,
    pub survivors: Vec<ParticipantScore>,
    pub eliminated: Vec<ParticipantScore>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdatePayload {
    pub status: SessionStatus,
    pub current_round: u32,
    pub participant_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantPresence {
    pub user_id: String,
    pub display_name: String,
}

impl From<&Participant> for ParticipantPresence {
    fn from(p: &Participant) -> Self {
        Self {
            user_id: p.user_id.clone(),
            display_name: p.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevivalStartPayload {
    pub candidates: Vec<ParticipantPresence>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevivalResultPayload {
    pub revived: Vec<ParticipantPresence>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmittedPayload {
    pub question_id: String,
    pub selected_option: i32,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}

// ---- inbound ----

/// Raw client frame. `data` stays untyped until the frame kind is known.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientFrameKind {
    Ping,
    AnswerSubmit,
    AdminControl,
    JoinSession,
}

impl ClientFrameKind {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "ping" => Some(Self::Ping),
            "answer_submit" => Some(Self::AnswerSubmit),
            "admin_control" => Some(Self::AdminControl),
            "join_session" => Some(Self::JoinSession),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmitData {
    pub question_id: String,
    pub selected_option: i32,
    /// Milliseconds the player took to answer.
    #[serde(default)]
    pub response_time: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    Start,
    Finish,
    NextRound,
    ProcessResults,
    Revival,
    SkipQuestion,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminControlData {
    pub action: AdminAction,
    #[serde(default)]
    pub question_id: Option<String>,
    #[serde(default)]
    pub count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSessionData {
    pub session_id: String,
}
