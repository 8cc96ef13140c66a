use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Active,
    Eliminated,
    Revived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    pub display_name: String,
    pub status: ParticipantStatus,
    pub score: u32,
    pub correct_answers: u32,
    pub joined_at: DateTime<Utc>,
    pub eliminated_at: Option<DateTime<Utc>>,
    pub revived_at: Option<DateTime<Utc>>,
}

impl Participant {
    pub fn new(
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            session_id: session_id.into(),
            display_name: display_name.into(),
            status: ParticipantStatus::Active,
            score: 0,
            correct_answers: 0,
            joined_at: Utc::now(),
            eliminated_at: None,
            revived_at: None,
        }
    }

    /// Revived participants play exactly like active ones.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            ParticipantStatus::Active | ParticipantStatus::Revived
        )
    }

    pub fn is_eliminated(&self) -> bool {
        self.status == ParticipantStatus::Eliminated
    }

    pub fn eliminate(&mut self) {
        self.status = ParticipantStatus::Eliminated;
        self.eliminated_at = Some(Utc::now());
    }

    pub fn revive(&mut self) {
        self.status = ParticipantStatus::Revived;
        self.revived_at = Some(Utc::now());
    }

    pub fn add_correct_answer(&mut self, points: u32) {
        self.score += points;
        self.correct_answers += 1;
    }
}
