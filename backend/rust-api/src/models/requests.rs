use serde::Deserialize;
use validator::Validate;

use super::message::AdminAction;
use super::question::Difficulty;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    /// Zero or negative falls back to the configured default.
    #[serde(default)]
    pub max_participants: i64,
    #[serde(default)]
    #[validate(range(min = 5, max = 600, message = "Time limit must be 5-600 seconds"))]
    pub time_limit: Option<u32>,
    #[serde(default)]
    pub revival_enabled: bool,
    #[serde(default)]
    pub revival_count: u32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinSessionRequest {
    #[validate(length(max = 64, message = "Display name is too long"))]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    #[validate(length(min = 1, message = "questionId is required"))]
    pub question_id: String,
    pub selected_option: i32,
    #[serde(default)]
    pub response_time: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuestionRequest {
    pub round: Option<u32>,
    pub difficulty: Option<Difficulty>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResultsRequest {
    pub question_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RevivalRequest {
    #[validate(range(min = 1, message = "count must be at least 1"))]
    pub count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlRequest {
    pub action: AdminAction,
}
