use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::QuizError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Waiting,
    Active,
    Finished,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Waiting => "waiting",
            SessionStatus::Active => "active",
            SessionStatus::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    pub time_limit_seconds: u32,
    pub revival_enabled: bool,
    pub revival_count: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            time_limit_seconds: 30,
            revival_enabled: false,
            revival_count: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub title: String,
    pub status: SessionStatus,
    pub current_round: u32,
    pub max_participants: u32,
    pub settings: SessionSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(title: impl Into<String>, max_participants: u32, settings: SessionSettings) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            status: SessionStatus::Waiting,
            current_round: 0,
            max_participants,
            settings,
            created_at: now,
            updated_at: now,
        }
    }

    /// Waiting -> Active, opening round 1.
    pub fn start(&mut self) -> Result<(), QuizError> {
        if self.status != SessionStatus::Waiting {
            return Err(QuizError::InvalidSessionStatus);
        }
        self.status = SessionStatus::Active;
        self.current_round = 1;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Active -> Finished. Terminal.
    pub fn finish(&mut self) -> Result<(), QuizError> {
        if self.status != SessionStatus::Active {
            return Err(QuizError::InvalidSessionStatus);
        }
        self.status = SessionStatus::Finished;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn next_round(&mut self) -> Result<(), QuizError> {
        if self.status != SessionStatus::Active {
            return Err(QuizError::InvalidSessionStatus);
        }
        self.current_round += 1;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_waiting(&self) -> bool {
        self.status == SessionStatus::Waiting
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn is_finished(&self) -> bool {
        self.status == SessionStatus::Finished
    }

    /// Participants may join before the game starts and while it runs.
    pub fn accepts_participants(&self) -> bool {
        matches!(self.status, SessionStatus::Waiting | SessionStatus::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("Friday quiz", 10, SessionSettings::default())
    }

    #[test]
    fn start_opens_first_round() {
        let mut s = session();
        assert!(s.is_waiting());
        assert_eq!(s.current_round, 0);

        s.start().unwrap();
        assert!(s.is_active());
        assert_eq!(s.current_round, 1);
    }

    #[test]
    fn finish_from_waiting_is_rejected() {
        let mut s = session();
        assert!(matches!(s.finish(), Err(QuizError::InvalidSessionStatus)));
        assert!(s.is_waiting());
    }

    #[test]
    fn start_is_rejected_after_waiting() {
        let mut s = session();
        s.start().unwrap();
        assert!(matches!(s.start(), Err(QuizError::InvalidSessionStatus)));

        s.finish().unwrap();
        assert!(matches!(s.start(), Err(QuizError::InvalidSessionStatus)));
        assert!(s.is_finished());
    }

    #[test]
    fn next_round_requires_active() {
        let mut s = session();
        assert!(matches!(s.next_round(), Err(QuizError::InvalidSessionStatus)));

        s.start().unwrap();
        s.next_round().unwrap();
        s.next_round().unwrap();
        assert_eq!(s.current_round, 3);

        s.finish().unwrap();
        assert!(matches!(s.next_round(), Err(QuizError::InvalidSessionStatus)));
        assert_eq!(s.current_round, 3);
    }

    #[test]
    fn session_serializes_camel_case() {
        let s = session();
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["status"], "waiting");
        assert_eq!(json["currentRound"], 0);
        assert_eq!(json["settings"]["timeLimitSeconds"], 30);
        assert_eq!(json["settings"]["revivalEnabled"], false);
    }
}
