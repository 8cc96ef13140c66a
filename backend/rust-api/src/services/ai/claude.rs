use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{build_prompt, ensure_success, parse_generated, AiError, QuestionProvider};
use crate::models::{Difficulty, GeneratedQuestion};

const CLAUDE_URL: &str = "https://api.anthropic.com/v1/messages";
const CLAUDE_MODEL: &str = "claude-3-haiku-20240307";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

pub struct ClaudeProvider {
    http: reqwest::Client,
    api_key: String,
}

impl ClaudeProvider {
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        Self { http, api_key }
    }
}

#[async_trait]
impl QuestionProvider for ClaudeProvider {
    fn name(&self) -> &'static str {
        "claude"
    }

    async fn generate_question(
        &self,
        difficulty: Difficulty,
        category: &str,
    ) -> Result<GeneratedQuestion, AiError> {
        let prompt = build_prompt(difficulty, category);
        let body = MessagesRequest {
            model: CLAUDE_MODEL,
            max_tokens: 500,
            messages: vec![Message {
                role: "user",
                content: &prompt,
            }],
        };

        let response = self
            .http
            .post(CLAUDE_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;
        let reply: MessagesResponse = ensure_success(response).await?.json().await?;

        let text: String = reply
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect();
        if text.is_empty() {
            return Err(AiError::EmptyResponse);
        }
        parse_generated(&text)
    }
}
