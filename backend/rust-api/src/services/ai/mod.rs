//! Question generation through third-party LLM providers.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::AiConfig;
use crate::error::QuizError;
use crate::metrics::AI_GENERATION_TOTAL;
use crate::models::{Difficulty, GeneratedQuestion};
use crate::utils::retry::{retry_async_with_config, RetryConfig};

pub mod claude;
pub mod gemini;
pub mod openai;

pub use claude::ClaudeProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

pub const OPTION_COUNT: usize = 4;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider returned no content")]
    EmptyResponse,
    #[error("invalid question format: {0}")]
    InvalidFormat(String),
}

impl AiError {
    /// Network failures, rate limits and 5xx are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            AiError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            AiError::Status { status, .. } => *status == 429 || *status >= 500,
            AiError::EmptyResponse | AiError::InvalidFormat(_) => false,
        }
    }
}

#[async_trait]
pub trait QuestionProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate_question(
        &self,
        difficulty: Difficulty,
        category: &str,
    ) -> Result<GeneratedQuestion, AiError>;
}

/// Tries providers in priority order and reports the first success.
pub struct AiService {
    providers: Vec<Arc<dyn QuestionProvider>>,
    retry: RetryConfig,
}

impl AiService {
    pub fn new(providers: Vec<Arc<dyn QuestionProvider>>, retry: RetryConfig) -> Self {
        Self { providers, retry }
    }

    /// Gemini, then OpenAI, then Claude; providers without a key are skipped.
    pub fn from_config(config: &AiConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        let mut providers: Vec<Arc<dyn QuestionProvider>> = Vec::new();
        if let Some(key) = &config.gemini_api_key {
            providers.push(Arc::new(GeminiProvider::new(http.clone(), key.clone())));
        }
        if let Some(key) = &config.openai_api_key {
            providers.push(Arc::new(OpenAiProvider::new(http.clone(), key.clone())));
        }
        if let Some(key) = &config.claude_api_key {
            providers.push(Arc::new(ClaudeProvider::new(http, key.clone())));
        }

        if providers.is_empty() {
            tracing::warn!("No AI provider configured; question generation is unavailable");
        } else {
            tracing::info!(
                "AI providers: {}",
                providers.iter().map(|p| p.name()).collect::<Vec<_>>().join(", ")
            );
        }

        Self::new(providers, RetryConfig::default())
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn is_available(&self) -> bool {
        !self.providers.is_empty()
    }

    /// Returns the question and the name of the provider that produced it.
    pub async fn generate(
        &self,
        difficulty: Difficulty,
        category: &str,
    ) -> Result<(GeneratedQuestion, &'static str), QuizError> {
        for provider in &self.providers {
            let result = retry_async_with_config(self.retry.clone(), AiError::is_transient, || {
                provider.generate_question(difficulty, category)
            })
            .await;

            match result {
                Ok(question) => {
                    AI_GENERATION_TOTAL
                        .with_label_values(&[provider.name(), "success"])
                        .inc();
                    return Ok((question, provider.name()));
                }
                Err(e) => {
                    AI_GENERATION_TOTAL
                        .with_label_values(&[provider.name(), "error"])
                        .inc();
                    tracing::warn!("Question generation with {} failed: {}", provider.name(), e);
                }
            }
        }

        Err(QuizError::AiServiceUnavailable)
    }
}

/// Turns non-2xx replies into `AiError::Status` with the body for logging.
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, AiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AiError::Status {
        status: status.as_u16(),
        body,
    })
}

pub fn build_prompt(difficulty: Difficulty, category: &str) -> String {
    let level = match difficulty {
        Difficulty::Easy => "easy (general knowledge)",
        Difficulty::Medium => "medium (requires some thought)",
        Difficulty::Hard => "hard (requires specialist knowledge)",
    };
    let category = if category.trim().is_empty() {
        "general trivia"
    } else {
        category
    };

    format!(
        "Write one multiple-choice quiz question for a live party game.\n\
         \n\
         Requirements:\n\
         - Difficulty: {level}\n\
         - Category: {category}\n\
         - Exactly 4 options, one correct\n\
         - Fun and suitable for everyone\n\
         \n\
         Reply with JSON only, no commentary:\n\
         {{\"text\": \"question\", \"options\": [\"a\", \"b\", \"c\", \"d\"], \"correctAnswer\": 0}}\n\
         \n\
         correctAnswer is the zero-based index of the correct option."
    )
}

/// Extracts and validates the JSON object embedded in a model reply.
pub fn parse_generated(reply: &str) -> Result<GeneratedQuestion, AiError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => return Err(AiError::InvalidFormat("no JSON object in reply".into())),
    };

    let question: GeneratedQuestion =
        serde_json::from_str(json).map_err(|e| AiError::InvalidFormat(e.to_string()))?;

    if question.text.trim().is_empty() {
        return Err(AiError::InvalidFormat("question text is empty".into()));
    }
    if question.options.len() != OPTION_COUNT {
        return Err(AiError::InvalidFormat(format!(
            "expected {} options, got {}",
            OPTION_COUNT,
            question.options.len()
        )));
    }
    if question.correct_answer < 0 || question.correct_answer as usize >= OPTION_COUNT {
        return Err(AiError::InvalidFormat("correct answer index out of range".into()));
    }
    Ok(question)
}
