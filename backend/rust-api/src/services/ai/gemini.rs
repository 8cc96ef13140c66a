use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{build_prompt, ensure_success, parse_generated, AiError, QuestionProvider};
use crate::models::{Difficulty, GeneratedQuestion};

const GEMINI_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

pub struct GeminiProvider {
    http: reqwest::Client,
    api_key: String,
}

impl GeminiProvider {
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        Self { http, api_key }
    }
}

#[async_trait]
impl QuestionProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate_question(
        &self,
        difficulty: Difficulty,
        category: &str,
    ) -> Result<GeneratedQuestion, AiError> {
        let prompt = build_prompt(difficulty, category);
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: &prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.7,
                top_k: 40,
                top_p: 0.95,
            },
        };

        let response = self
            .http
            .post(GEMINI_URL)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        let reply: GenerateResponse = ensure_success(response).await?.json().await?;

        let text: String = reply
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(AiError::EmptyResponse);
        }
        parse_generated(&text)
    }
}
