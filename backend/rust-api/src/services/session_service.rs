use std::sync::Arc;

use crate::error::{QuizError, RepositoryError};
use crate::metrics::record_session_transition;
use crate::models::requests::CreateSessionRequest;
use crate::models::{Participant, Session, SessionSettings};
use crate::repositories::Repositories;
use crate::services::locks::SessionLocks;
use crate::services::notifier::Notifier;

/// Session lifecycle and participant membership.
pub struct SessionService {
    repos: Repositories,
    locks: Arc<SessionLocks>,
    notifier: Notifier,
    default_max_participants: u32,
}

impl SessionService {
    pub fn new(
        repos: Repositories,
        locks: Arc<SessionLocks>,
        notifier: Notifier,
        default_max_participants: u32,
    ) -> Self {
        Self {
            repos,
            locks,
            notifier,
            default_max_participants,
        }
    }

    pub async fn create_session(&self, req: CreateSessionRequest) -> Result<Session, QuizError> {
        let title = req.title.trim();
        if title.is_empty() {
            return Err(QuizError::invalid_input("title is required"));
        }

        let max_participants = if req.max_participants <= 0 {
            self.default_max_participants
        } else {
            u32::try_from(req.max_participants).unwrap_or(u32::MAX)
        };

        let defaults = SessionSettings::default();
        let settings = SessionSettings {
            time_limit_seconds: req.time_limit.unwrap_or(defaults.time_limit_seconds),
            revival_enabled: req.revival_enabled,
            revival_count: req.revival_count,
        };

        let session = Session::new(title, max_participants, settings);
        self.repos.sessions.create(&session).await?;

        record_session_transition("created");
        tracing::info!(
            session_id = %session.id,
            max_participants,
            "Session created: {}",
            session.title
        );
        Ok(session)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Session, QuizError> {
        self.repos
            .sessions
            .get_by_id(session_id)
            .await?
            .ok_or(QuizError::SessionNotFound)
    }

    pub async fn list_sessions(&self) -> Result<Vec<Session>, QuizError> {
        Ok(self.repos.sessions.list().await?)
    }

    pub async fn start_session(&self, session_id: &str) -> Result<Session, QuizError> {
        let session = {
            let _guard = self.locks.exclusive(session_id).await;
            let mut session = self.get_session(session_id).await?;
            session.start()?;
            self.repos.sessions.update(&session).await?;
            session
        };

        record_session_transition("started");
        tracing::info!(session_id = %session_id, "Session started");
        self.notifier.session_update(&session).await;
        Ok(session)
    }

    pub async fn finish_session(&self, session_id: &str) -> Result<Session, QuizError> {
        let session = {
            let _guard = self.locks.exclusive(session_id).await;
            let mut session = self.get_session(session_id).await?;
            session.finish()?;
            self.repos.sessions.update(&session).await?;
            session
        };

        record_session_transition("finished");
        tracing::info!(session_id = %session_id, "Session finished");
        self.notifier.session_update(&session).await;
        Ok(session)
    }

    /// Joins the user to the session. Joining twice returns the first record.
    pub async fn join_session(
        &self,
        session_id: &str,
        user_id: &str,
        display_name: &str,
    ) -> Result<Participant, QuizError> {
        // capacity check and insert must not interleave with other joins
        let _guard = self.locks.exclusive(session_id).await;

        let session = self.get_session(session_id).await?;
        if !session.accepts_participants() {
            return Err(QuizError::SessionNotActive);
        }

        if let Some(existing) = self
            .repos
            .participants
            .get_by_user_and_session(user_id, session_id)
            .await?
        {
            return Ok(existing);
        }

        let count = self.repos.participants.count_by_session(session_id).await?;
        if count >= session.max_participants as usize {
            tracing::debug!(session_id = %session_id, user_id = %user_id, "Session full");
            return Err(QuizError::SessionFull);
        }

        let participant = Participant::new(user_id, session_id, display_name);
        match self.repos.participants.create(&participant).await {
            Ok(()) => {}
            // another instance inserted the same user first
            Err(RepositoryError::Duplicate) => {
                return self
                    .repos
                    .participants
                    .get_by_user_and_session(user_id, session_id)
                    .await?
                    .ok_or(QuizError::ParticipantNotFound);
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            session_id = %session_id,
            user_id = %user_id,
            "Participant joined: {}",
            display_name
        );
        Ok(participant)
    }

    pub async fn get_participants(&self, session_id: &str) -> Result<Vec<Participant>, QuizError> {
        self.get_session(session_id).await?;
        Ok(self.repos.participants.get_by_session(session_id).await?)
    }

    pub async fn get_active_participants(
        &self,
        session_id: &str,
    ) -> Result<Vec<Participant>, QuizError> {
        self.get_session(session_id).await?;
        Ok(self
            .repos
            .participants
            .get_active_by_session(session_id)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::Hub;

    fn service() -> SessionService {
        SessionService::new(
            Repositories::in_memory(),
            Arc::new(SessionLocks::new()),
            Notifier::new(Arc::new(Hub::new())),
            50,
        )
    }

    fn request(title: &str, max_participants: i64) -> CreateSessionRequest {
        CreateSessionRequest {
            title: title.to_string(),
            max_participants,
            time_limit: None,
            revival_enabled: false,
            revival_count: 0,
        }
    }

    #[tokio::test]
    async fn create_applies_defaults() {
        let svc = service();
        let session = svc.create_session(request("  Trivia  ", 0)).await.unwrap();
        assert_eq!(session.title, "Trivia");
        assert_eq!(session.max_participants, 50);
        assert_eq!(session.settings.time_limit_seconds, 30);
        assert!(session.is_waiting());
    }

    #[tokio::test]
    async fn create_rejects_blank_title() {
        let svc = service();
        let result = svc.create_session(request("   ", 10)).await;
        assert!(matches!(result, Err(QuizError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let svc = service();
        let session = svc.create_session(request("Trivia", 10)).await.unwrap();

        let first = svc.join_session(&session.id, "u1", "Alice").await.unwrap();
        let second = svc.join_session(&session.id, "u1", "Renamed").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.display_name, "Alice");
        assert_eq!(svc.get_participants(&session.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn join_rejects_finished_and_missing_sessions() {
        let svc = service();
        let session = svc.create_session(request("Trivia", 10)).await.unwrap();
        svc.start_session(&session.id).await.unwrap();
        svc.finish_session(&session.id).await.unwrap();

        assert!(matches!(
            svc.join_session(&session.id, "u1", "Alice").await,
            Err(QuizError::SessionNotActive)
        ));
        assert!(matches!(
            svc.join_session("missing", "u1", "Alice").await,
            Err(QuizError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn existing_participant_rejoins_full_session() {
        let svc = service();
        let session = svc.create_session(request("Trivia", 1)).await.unwrap();
        svc.join_session(&session.id, "u1", "Alice").await.unwrap();

        assert!(matches!(
            svc.join_session(&session.id, "u2", "Bob").await,
            Err(QuizError::SessionFull)
        ));
        assert!(svc.join_session(&session.id, "u1", "Alice").await.is_ok());
    }

    #[tokio::test]
    async fn lifecycle_transitions_are_enforced() {
        let svc = service();
        let session = svc.create_session(request("Trivia", 10)).await.unwrap();

        assert!(matches!(
            svc.finish_session(&session.id).await,
            Err(QuizError::InvalidSessionStatus)
        ));
        let started = svc.start_session(&session.id).await.unwrap();
        assert_eq!(started.current_round, 1);
        assert!(matches!(
            svc.start_session(&session.id).await,
            Err(QuizError::InvalidSessionStatus)
        ));
    }
}
