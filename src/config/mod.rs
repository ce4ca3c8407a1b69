use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub llm: LlmConfig,
    pub forms: FormsConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Language-model API configuration for the assistant
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Missing keys are reported per request as `api_key_missing`.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_ms: u64,
}

/// Which form-data loader implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoaderStrategy {
    /// One fetch per question type
    Legacy,
    /// All question types fetched concurrently
    #[default]
    Unified,
}

impl std::str::FromStr for LoaderStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "legacy" => Ok(LoaderStrategy::Legacy),
            "unified" => Ok(LoaderStrategy::Unified),
            _ => Err(format!("Unknown loader strategy: {}", s)),
        }
    }
}

/// Story form configuration
#[derive(Debug, Clone)]
pub struct FormsConfig {
    /// Base URL used to build public submission links
    pub public_base_url: String,
    /// Stories a demo account may collect per project
    pub demo_story_limit: i64,
    pub loader: LoaderStrategy,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/culture_sprint.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let llm = LlmConfig {
            api_key: env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
            model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            timeout_ms: env::var("LLM_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(15000),
        };

        let loader = match env::var("FORM_LOADER") {
            Ok(value) => value.parse().map_err(|message| AppError::Config { message })?,
            Err(_) => LoaderStrategy::default(),
        };

        let forms = FormsConfig {
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            demo_story_limit: env::var("DEMO_STORY_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(15),
            loader,
        };

        Ok(Config {
            database,
            logging,
            llm,
            forms,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: PathBuf::from("./data/culture_sprint.db"),
                max_connections: 5,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
            llm: LlmConfig::default(),
            forms: FormsConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_ms: 15000,
        }
    }
}

impl Default for FormsConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:5173".to_string(),
            demo_story_limit: 15,
            loader: LoaderStrategy::Unified,
        }
    }
}
