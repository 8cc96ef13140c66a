#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::Utf8Bytes;
use axum::Router;
use quizarena_api::{
    config::Config,
    create_router,
    middlewares::auth::{JwtClaims, ADMIN_ROLE},
    models::{
        requests::CreateSessionRequest, Difficulty, GeneratedQuestion, Participant, Question,
        Session,
    },
    repositories::Repositories,
    services::{
        ai::{AiError, AiService, QuestionProvider},
        AppState,
    },
    utils::retry::RetryConfig,
};
use serde_json::Value;
use tokio::sync::mpsc;

/// Index of the correct option in every generated question.
pub const CORRECT: i32 = 1;
pub const WRONG: i32 = 2;

/// Deterministic provider: four options, the second one is right.
pub struct FixedProvider;

#[async_trait]
impl QuestionProvider for FixedProvider {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn generate_question(
        &self,
        difficulty: Difficulty,
        category: &str,
    ) -> Result<GeneratedQuestion, AiError> {
        Ok(GeneratedQuestion {
            text: format!("{} question about {}", difficulty.as_str(), category),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_answer: CORRECT,
        })
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// In-memory state with zero pacing and the fixed question provider.
pub fn test_state() -> Arc<AppState> {
    init_tracing();
    let ai = Arc::new(AiService::new(
        vec![Arc::new(FixedProvider) as Arc<dyn QuestionProvider>],
        RetryConfig::no_retry(),
    ));
    Arc::new(AppState::with_components(
        Config::for_tests(),
        Repositories::in_memory(),
        ai,
    ))
}

pub fn create_test_app() -> (Arc<AppState>, Router) {
    let state = test_state();
    let app = create_router(state.clone());
    (state, app)
}

pub async fn create_session(
    state: &AppState,
    max_participants: i64,
    revival_enabled: bool,
    revival_count: u32,
) -> Session {
    state
        .sessions
        .create_session(CreateSessionRequest {
            title: "Friday quiz".to_string(),
            max_participants,
            time_limit: Some(20),
            revival_enabled,
            revival_count,
        })
        .await
        .expect("create session")
}

pub async fn join(state: &AppState, session_id: &str, user_id: &str) -> Participant {
    state
        .sessions
        .join_session(session_id, user_id, &format!("Player {}", user_id))
        .await
        .expect("join session")
}

/// Creates a session, joins `users` and starts it.
pub async fn started_session(
    state: &AppState,
    users: &[&str],
    revival_enabled: bool,
    revival_count: u32,
) -> Session {
    let session = create_session(state, 0, revival_enabled, revival_count).await;
    for user in users {
        join(state, &session.id, user).await;
    }
    state
        .sessions
        .start_session(&session.id)
        .await
        .expect("start session")
}

pub async fn question(state: &AppState, session_id: &str) -> Question {
    state
        .quiz
        .generate_question(session_id, None, None, None)
        .await
        .expect("generate question")
}

pub async fn answer(state: &AppState, session_id: &str, user_id: &str, question_id: &str, option: i32) {
    state
        .quiz
        .submit_answer(session_id, user_id, question_id, option, 1200)
        .await
        .expect("submit answer");
}

pub fn token(state: &AppState, user_id: &str, role: &str) -> String {
    state
        .jwt
        .generate_token(&JwtClaims::new(user_id, Some(format!("Player {}", user_id)), role, 3600))
        .expect("token")
}

pub fn admin_token(state: &AppState) -> String {
    token(state, "admin-1", ADMIN_ROLE)
}

/// Everything currently queued, decoded.
pub fn drain(queue: &mut mpsc::Receiver<Utf8Bytes>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(frame) = queue.try_recv() {
        out.push(serde_json::from_str(frame.as_str()).expect("valid json"));
    }
    out
}

pub fn types(messages: &[Value]) -> Vec<String> {
    messages
        .iter()
        .map(|m| m["type"].as_str().unwrap_or_default().to_string())
        .collect()
}
