pub mod message;
pub mod participant;
pub mod question;
pub mod requests;
pub mod session;

pub use message::{MessageType, OutboundMessage};
pub use participant::{Participant, ParticipantStatus};
pub use question::{Answer, Difficulty, GeneratedQuestion, Question};
pub use session::{Session, SessionSettings, SessionStatus};

/// Caller identity, decoded once at the HTTP/WebSocket boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub display_name: String,
    pub is_admin: bool,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>, is_admin: bool) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            is_admin,
        }
    }

    pub fn anonymous(display_name: Option<String>) -> Self {
        let user_id = format!("anonymous_{}", uuid::Uuid::new_v4());
        let display_name = display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "Anonymous".to_string());
        Self {
            user_id,
            display_name,
            is_admin: false,
        }
    }
}
