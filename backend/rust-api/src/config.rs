use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::services::pacing::PacingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Mongo,
    Memory,
}

impl StorageBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Some(Self::Mongo),
            "memory" | "in-memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// Tuning for the connection hub and the per-connection read/write loops.
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub outbound_queue_capacity: usize,
    pub ping_period: Duration,
    pub pong_wait: Duration,
    pub write_wait: Duration,
    pub max_message_size: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        let pong_wait = Duration::from_secs(60);
        Self {
            outbound_queue_capacity: 256,
            // keepalive pings must go out before the peer's read deadline lapses
            ping_period: pong_wait * 9 / 10,
            pong_wait,
            write_wait: Duration::from_secs(10),
            max_message_size: 512,
        }
    }
}

const MIN_HUB_INTERVAL: Duration = Duration::from_millis(1);

impl HubConfig {
    /// Clamps the timers to usable values: non-zero durations, and a ping period
    /// strictly shorter than the read deadline it has to refresh.
    pub fn normalized(mut self) -> Self {
        self.outbound_queue_capacity = self.outbound_queue_capacity.max(1);
        self.pong_wait = self.pong_wait.max(MIN_HUB_INTERVAL * 2);
        self.write_wait = self.write_wait.max(MIN_HUB_INTERVAL);
        if self.ping_period.is_zero() || self.ping_period >= self.pong_wait {
            self.ping_period = (self.pong_wait * 9 / 10).max(MIN_HUB_INTERVAL);
        }
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct AiConfig {
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub claude_api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub storage_backend: StorageBackend,
    pub mongo_uri: String,
    pub mongo_database: String,
    pub jwt_secret: String,
    pub default_max_participants: u32,
    pub hub: HubConfig,
    pub pacing: PacingConfig,
    pub ai: AiConfig,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/{env}.toml first, APP__SECTION__KEY env vars on top
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let string_setting = |key: &str, legacy_env: &str| -> Option<String> {
            settings
                .get_string(key)
                .ok()
                .or_else(|| env::var(legacy_env).ok())
                .filter(|v| !v.trim().is_empty())
        };
        let u64_setting = |key: &str, legacy_env: &str, default: u64| -> u64 {
            settings
                .get_int(key)
                .ok()
                .and_then(|v| u64::try_from(v).ok())
                .or_else(|| env::var(legacy_env).ok().and_then(|v| v.parse().ok()))
                .unwrap_or(default)
        };

        let storage_backend = match string_setting("storage.backend", "STORAGE_BACKEND") {
            Some(raw) => StorageBackend::parse(&raw).ok_or_else(|| {
                config::ConfigError::Message(format!("unknown storage backend: {}", raw))
            })?,
            None => StorageBackend::Mongo,
        };

        let mongo_uri = string_setting("database.mongo_uri", "MONGO_URI")
            .unwrap_or_else(|| "mongodb://localhost:27017".to_string());
        let mongo_database = string_setting("database.mongo_database", "MONGO_DATABASE")
            .unwrap_or_else(|| "quizarena".to_string());

        let jwt_secret = match string_setting("auth.jwt_secret", "JWT_SECRET") {
            Some(secret) => secret,
            None if app_env == "prod" => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ))
            }
            None => {
                tracing::warn!("Using default JWT secret (dev mode only)");
                "dev-secret-only-for-local-testing".to_string()
            }
        };

        let bind_addr = string_setting("server.bind_addr", "BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let hub_defaults = HubConfig::default();
        let hub = HubConfig {
            outbound_queue_capacity: u64_setting(
                "hub.outbound_queue_capacity",
                "HUB_OUTBOUND_QUEUE_CAPACITY",
                hub_defaults.outbound_queue_capacity as u64,
            )
            .max(1) as usize,
            ping_period: Duration::from_millis(u64_setting(
                "hub.ping_period_ms",
                "HUB_PING_PERIOD_MS",
                hub_defaults.ping_period.as_millis() as u64,
            )),
            pong_wait: Duration::from_millis(u64_setting(
                "hub.pong_wait_ms",
                "HUB_PONG_WAIT_MS",
                hub_defaults.pong_wait.as_millis() as u64,
            )),
            write_wait: Duration::from_millis(u64_setting(
                "hub.write_wait_ms",
                "HUB_WRITE_WAIT_MS",
                hub_defaults.write_wait.as_millis() as u64,
            )),
            max_message_size: u64_setting(
                "hub.max_message_size",
                "HUB_MAX_MESSAGE_SIZE",
                hub_defaults.max_message_size as u64,
            ) as usize,
        }
        .normalized();

        let pacing_defaults = PacingConfig::default();
        let pacing = PacingConfig {
            round_result_delay: Duration::from_millis(u64_setting(
                "pacing.round_result_delay_ms",
                "ROUND_RESULT_DELAY_MS",
                pacing_defaults.round_result_delay.as_millis() as u64,
            )),
            revival_reveal_delay: Duration::from_millis(u64_setting(
                "pacing.revival_reveal_delay_ms",
                "REVIVAL_REVEAL_DELAY_MS",
                pacing_defaults.revival_reveal_delay.as_millis() as u64,
            )),
        };

        let default_max_participants = u64_setting(
            "quiz.default_max_participants",
            "DEFAULT_MAX_PARTICIPANTS",
            200,
        )
        .clamp(1, u32::MAX as u64) as u32;

        let ai = AiConfig {
            gemini_api_key: string_setting("ai.gemini_api_key", "GEMINI_API_KEY"),
            openai_api_key: string_setting("ai.openai_api_key", "OPENAI_API_KEY"),
            claude_api_key: string_setting("ai.claude_api_key", "CLAUDE_API_KEY"),
        };

        Ok(Config {
            bind_addr,
            storage_backend,
            mongo_uri,
            mongo_database,
            jwt_secret,
            default_max_participants,
            hub,
            pacing,
            ai,
        })
    }

    /// In-memory configuration with no pacing delays, for tests and local tooling.
    pub fn for_tests() -> Self {
        Config {
            bind_addr: "127.0.0.1:0".to_string(),
            storage_backend: StorageBackend::Memory,
            mongo_uri: String::new(),
            mongo_database: "quizarena_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            default_max_participants: 200,
            hub: HubConfig::default(),
            pacing: PacingConfig::immediate(),
            ai: AiConfig::default(),
        }
    }
}
