use std::sync::Arc;

use mongodb::{Client as MongoClient, Database};

use crate::config::{Config, StorageBackend};
use crate::hub::Hub;
use crate::middlewares::auth::JwtService;
use crate::repositories::Repositories;
use crate::services::admin_service::AdminService;
use crate::services::ai::AiService;
use crate::services::dispatcher::FrameDispatcher;
use crate::services::locks::SessionLocks;
use crate::services::notifier::Notifier;
use crate::services::quiz_service::QuizService;
use crate::services::revival_service::RevivalService;
use crate::services::round_service::RoundService;
use crate::services::session_service::SessionService;

pub struct AppState {
    pub config: Config,
    /// Present only with the mongo storage backend; used by the health check.
    pub mongo: Option<Database>,
    pub repos: Repositories,
    pub hub: Arc<Hub>,
    pub notifier: Notifier,
    pub ai: Arc<AiService>,
    pub sessions: Arc<SessionService>,
    pub quiz: Arc<QuizService>,
    pub rounds: Arc<RoundService>,
    pub revival: Arc<RevivalService>,
    pub admin: AdminService,
    pub dispatcher: FrameDispatcher,
    pub jwt: JwtService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let ai = Arc::new(AiService::from_config(&config.ai));
        if !ai.is_available() {
            tracing::warn!("No AI provider configured, question generation will fail");
        }

        match config.storage_backend {
            StorageBackend::Memory => {
                tracing::info!("Using in-memory storage");
                Ok(Self::with_components(config, Repositories::in_memory(), ai))
            }
            StorageBackend::Mongo => {
                tracing::info!("Connecting to MongoDB...");
                let client = MongoClient::with_uri_str(&config.mongo_uri).await?;
                let db = client.database(&config.mongo_database);
                let repos = Repositories::mongo(&db).await?;
                tracing::info!("MongoDB connected, indexes ensured");

                let mut state = Self::with_components(config, repos, ai);
                state.mongo = Some(db);
                Ok(state)
            }
        }
    }

    /// Wires every service around the given storage and AI backends.
    pub fn with_components(config: Config, repos: Repositories, ai: Arc<AiService>) -> Self {
        let hub = Arc::new(Hub::new());
        let locks = Arc::new(SessionLocks::new());
        let notifier = Notifier::new(hub.clone());

        let sessions = Arc::new(SessionService::new(
            repos.clone(),
            locks.clone(),
            notifier.clone(),
            config.default_max_participants,
        ));
        let quiz = Arc::new(QuizService::new(
            repos.clone(),
            locks.clone(),
            notifier.clone(),
            ai.clone(),
        ));
        let rounds = Arc::new(RoundService::new(
            repos.clone(),
            locks.clone(),
            notifier.clone(),
            config.pacing,
        ));
        let revival = Arc::new(RevivalService::new(
            repos.clone(),
            locks,
            notifier.clone(),
            config.pacing,
        ));
        let admin = AdminService::new(repos.clone(), hub.clone());
        let dispatcher = FrameDispatcher::new(
            hub.clone(),
            sessions.clone(),
            quiz.clone(),
            rounds.clone(),
            revival.clone(),
        );
        let jwt = JwtService::new(&config.jwt_secret);

        Self {
            config,
            mongo: None,
            repos,
            hub,
            notifier,
            ai,
            sessions,
            quiz,
            rounds,
            revival,
            admin,
            dispatcher,
            jwt,
        }
    }
}

pub mod admin_service;
pub mod ai;
pub mod dispatcher;
pub mod locks;
pub mod notifier;
pub mod pacing;
pub mod quiz_service;
pub mod revival_service;
pub mod round_service;
pub mod session_service;
