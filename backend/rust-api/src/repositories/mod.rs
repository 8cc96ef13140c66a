//! Storage contracts for sessions, participants, questions and answers.
//!
//! Two implementations exist: MongoDB for deployments and an in-process store
//! for tests and `STORAGE_BACKEND=memory`. Both enforce one participant per
//! (user, session) and one answer per (user, question).

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RepositoryError;
use crate::models::{Answer, Participant, Question, Session};

pub mod memory;
pub mod mongo;

pub type RepoResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> RepoResult<()>;
    async fn get_by_id(&self, id: &str) -> RepoResult<Option<Session>>;
    async fn update(&self, session: &Session) -> RepoResult<()>;
    /// Newest first.
    async fn list(&self) -> RepoResult<Vec<Session>>;
}

#[async_trait]
pub trait ParticipantRepository: Send + Sync {
    /// Fails with `RepositoryError::Duplicate` if the user already joined the session.
    async fn create(&self, participant: &Participant) -> RepoResult<()>;
    async fn get_by_id(&self, id: &str) -> RepoResult<Option<Participant>>;
    async fn update(&self, participant: &Participant) -> RepoResult<()>;
    /// Ordered by join time, ties broken by user id.
    async fn get_by_session(&self, session_id: &str) -> RepoResult<Vec<Participant>>;
    /// Active and revived participants, same order as `get_by_session`.
    async fn get_active_by_session(&self, session_id: &str) -> RepoResult<Vec<Participant>>;
    async fn get_eliminated_by_session(&self, session_id: &str) -> RepoResult<Vec<Participant>>;
    async fn get_by_user_and_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> RepoResult<Option<Participant>>;
    async fn count_by_session(&self, session_id: &str) -> RepoResult<usize>;
    /// Atomically adds `points` to the score and bumps the correct-answer count.
    async fn add_correct_answer(&self, participant_id: &str, points: u32) -> RepoResult<()>;
}

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    async fn create(&self, question: &Question) -> RepoResult<()>;
    async fn get_by_id(&self, id: &str) -> RepoResult<Option<Question>>;
    async fn update(&self, question: &Question) -> RepoResult<()>;
    /// Ordered by round, then creation time.
    async fn get_by_session(&self, session_id: &str) -> RepoResult<Vec<Question>>;
    async fn get_by_session_and_round(
        &self,
        session_id: &str,
        round: u32,
    ) -> RepoResult<Option<Question>>;
    /// Flips an open question to closed. Returns `false` if it was already closed
    /// or does not exist.
    async fn close(&self, id: &str) -> RepoResult<bool>;
}

/// Answers are write-once, so there is no update.
#[async_trait]
pub trait AnswerRepository: Send + Sync {
    /// Fails with `RepositoryError::Duplicate` if the user already answered the question.
    async fn create(&self, answer: &Answer) -> RepoResult<()>;
    async fn get_by_id(&self, id: &str) -> RepoResult<Option<Answer>>;
    async fn get_by_user_and_question(
        &self,
        user_id: &str,
        question_id: &str,
    ) -> RepoResult<Option<Answer>>;
    async fn get_by_question(&self, question_id: &str) -> RepoResult<Vec<Answer>>;
    async fn get_by_session(&self, session_id: &str) -> RepoResult<Vec<Answer>>;
}

#[derive(Clone)]
pub struct Repositories {
    pub sessions: Arc<dyn SessionRepository>,
    pub participants: Arc<dyn ParticipantRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub answers: Arc<dyn AnswerRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            sessions: Arc::new(memory::MemorySessionRepository::default()),
            participants: Arc::new(memory::MemoryParticipantRepository::default()),
            questions: Arc::new(memory::MemoryQuestionRepository::default()),
            answers: Arc::new(memory::MemoryAnswerRepository::default()),
        }
    }

    /// Builds Mongo-backed repositories, creating the unique indexes they rely on.
    pub async fn mongo(db: &mongodb::Database) -> RepoResult<Self> {
        mongo::ensure_indexes(db).await?;
        Ok(Self {
            sessions: Arc::new(mongo::MongoSessionRepository::new(db)),
            participants: Arc::new(mongo::MongoParticipantRepository::new(db)),
            questions: Arc::new(mongo::MongoQuestionRepository::new(db)),
            answers: Arc::new(mongo::MongoAnswerRepository::new(db)),
        })
    }
}

pub(crate) fn sort_participants(participants: &mut [Participant]) {
    participants.sort_by(|a, b| {
        a.joined_at
            .cmp(&b.joined_at)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
}

pub(crate) fn sort_questions(questions: &mut [Question]) {
    questions.sort_by(|a, b| {
        a.round
            .cmp(&b.round)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

pub(crate) fn sort_sessions_newest_first(sessions: &mut [Session]) {
    sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
