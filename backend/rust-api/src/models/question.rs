use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default rotation of categories when the caller does not pick one.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "general",
    "science",
    "history",
    "geography",
    "sports",
    "entertainment",
    "technology",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn points(&self) -> u32 {
        match self {
            Difficulty::Easy => 10,
            Difficulty::Medium => 20,
            Difficulty::Hard => 30,
        }
    }

    pub fn for_round(round: u32) -> Self {
        match round {
            0..=3 => Difficulty::Easy,
            4..=6 => Difficulty::Medium,
            _ => Difficulty::Hard,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

pub fn category_for_round(round: u32) -> &'static str {
    DEFAULT_CATEGORIES[round as usize % DEFAULT_CATEGORIES.len()]
}

/// Question content as produced by a generator, before it is bound to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestion {
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub session_id: String,
    pub round: u32,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: i32,
    pub difficulty: Difficulty,
    pub category: String,
    pub provider: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set once the round is resolved or skipped; answers are refused afterwards.
    pub closed_at: Option<DateTime<Utc>>,
}

impl Question {
    pub fn new(
        session_id: impl Into<String>,
        round: u32,
        generated: GeneratedQuestion,
        difficulty: Difficulty,
        category: impl Into<String>,
        provider: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            round,
            text: generated.text,
            options: generated.options,
            correct_answer: generated.correct_answer,
            difficulty,
            category: category.into(),
            provider,
            created_at: Utc::now(),
            closed_at: None,
        }
    }

    /// Out-of-range selections are wrong answers, not errors.
    pub fn is_correct(&self, selected_option: i32) -> bool {
        selected_option >= 0
            && (selected_option as usize) < self.options.len()
            && selected_option == self.correct_answer
    }

    pub fn points(&self) -> u32 {
        self.difficulty.points()
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    pub question_id: String,
    pub selected_option: i32,
    pub is_correct: bool,
    pub response_time_ms: u32,
    pub answered_at: DateTime<Utc>,
}

impl Answer {
    pub fn new(
        user_id: impl Into<String>,
        question: &Question,
        selected_option: i32,
        response_time_ms: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            session_id: question.session_id.clone(),
            question_id: question.id.clone(),
            selected_option,
            is_correct: question.is_correct(selected_option),
            response_time_ms,
            answered_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct: i32) -> Question {
        Question::new(
            "s1",
            1,
            GeneratedQuestion {
                text: "2 + 2?".into(),
                options: vec!["1".into(), "3".into(), "4".into(), "5".into()],
                correct_answer: correct,
            },
            Difficulty::Easy,
            "general",
            None,
        )
    }

    #[test]
    fn points_follow_difficulty() {
        assert_eq!(Difficulty::Easy.points(), 10);
        assert_eq!(Difficulty::Medium.points(), 20);
        assert_eq!(Difficulty::Hard.points(), 30);
    }

    #[test]
    fn difficulty_ramps_with_round() {
        assert_eq!(Difficulty::for_round(1), Difficulty::Easy);
        assert_eq!(Difficulty::for_round(3), Difficulty::Easy);
        assert_eq!(Difficulty::for_round(4), Difficulty::Medium);
        assert_eq!(Difficulty::for_round(6), Difficulty::Medium);
        assert_eq!(Difficulty::for_round(7), Difficulty::Hard);
    }

    #[test]
    fn out_of_range_selection_is_incorrect() {
        let q = question(2);
        assert!(q.is_correct(2));
        assert!(!q.is_correct(1));
        assert!(!q.is_correct(-1));
        assert!(!q.is_correct(4));
        assert!(!q.is_correct(i32::MAX));
    }

    #[test]
    fn answer_is_graded_on_creation() {
        let q = question(2);
        let a = Answer::new("u1", &q, 2, 1500);
        assert!(a.is_correct);
        assert_eq!(a.question_id, q.id);
        assert_eq!(a.session_id, "s1");
    }

    #[test]
    fn category_rotates() {
        assert_eq!(category_for_round(0), "general");
        assert_eq!(category_for_round(1), "science");
        assert_eq!(category_for_round(DEFAULT_CATEGORIES.len() as u32), "general");
    }
}
