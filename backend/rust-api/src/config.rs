use serde::Deserialize;
use std::env;

/// Which persistence backend `AppState` builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Mongo,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = config::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StorageBackend::Mongo),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(config::ConfigError::Message(format!(
                "unknown storage backend: {other}"
            ))),
        }
    }
}

/// Point values and streak rules. Every field falls back to its default when
/// absent from configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PointsConfig {
    pub correct_answer_points: i32,
    pub streak_bonus_multiplier: i32,
    pub max_streak_bonus: i32,
    pub lesson_completion_bonus: i32,
    pub course_completion_bonus: i32,
    pub daily_streak_bonus_points: i32,
    pub daily_streak_milestones: Vec<u32>,
    pub milestone_bonus_multiplier: i32,
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            correct_answer_points: 10,
            streak_bonus_multiplier: 2,
            max_streak_bonus: 50,
            lesson_completion_bonus: 50,
            course_completion_bonus: 200,
            daily_streak_bonus_points: 20,
            daily_streak_milestones: vec![7, 30, 100, 365],
            milestone_bonus_multiplier: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub storage_backend: StorageBackend,
    pub mongo_uri: String,
    pub mongo_database: String,
    pub jwt_secret: String,
    pub content_dir: String,
    /// Basic auth credentials for `/metrics`, formatted `user:password`.
    pub metrics_auth: String,
    pub points: PointsConfig,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            // Override with environment variables (APP__SECTION__KEY)
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("points.daily_streak_milestones")
                    .try_parsing(true),
            )
            .build()?;

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let storage_backend = settings
            .get_string("storage.backend")
            .unwrap_or_else(|_| "mongo".to_string())
            .parse::<StorageBackend>()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017/?replicaSet=rs0".to_string());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "devquest".to_string());

        let jwt_secret = match settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
        {
            Ok(secret) => secret,
            Err(_) if env == "prod" => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ));
            }
            Err(_) => {
                tracing::warn!("Using default JWT secret (dev mode only)");
                "dev-secret-only-for-local-testing".to_string()
            }
        };

        let content_dir = settings
            .get_string("content.dir")
            .or_else(|_| env::var("CONTENT_DIR"))
            .unwrap_or_else(|_| "data".to_string());

        let metrics_auth = settings
            .get_string("metrics.auth")
            .or_else(|_| env::var("METRICS_AUTH"))
            .unwrap_or_else(|_| "admin:changeme".to_string());

        let points = match settings.get::<PointsConfig>("points") {
            Ok(points) => points,
            Err(config::ConfigError::NotFound(_)) => PointsConfig::default(),
            Err(e) => return Err(e),
        };

        Ok(Config {
            bind_addr,
            storage_backend,
            mongo_uri,
            mongo_database,
            jwt_secret,
            content_dir,
            metrics_auth,
            points,
        })
    }
}
