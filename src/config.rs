//! Application configuration
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::str::FromStr;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database connection URL; `None` selects the in-memory store (development only)
    pub database_url: Option<String>,
    /// Frontend assets directory
    pub frontend_dir: String,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// CORS allowed origins
    pub cors_origins: Vec<String>,
    /// Environment (development/production)
    pub environment: Environment,
    /// Trusted proxy IP prefixes (e.g., ["10.0.0.", "172.16."])
    /// Only trust X-Forwarded-For headers from these IPs
    pub trusted_proxies: Vec<String>,
    /// `frame-ancestors` value for embed routes
    pub embed_frame_ancestors: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let environment = match var("ENVIRONMENT")
            .unwrap_or_else(|| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        // DATABASE_URL, or the individual DATABASE_* components
        let database_url = var("DATABASE_URL").or_else(|| {
            let host = var("DATABASE_SERVER_HOST")?;
            let port = var("DATABASE_SERVER_PORT").unwrap_or_else(|| "5432".to_string());
            let user = var("DATABASE_SERVER_USER")?;
            let password = var("DATABASE_PASSWORD")?;
            let db = var("DATABASE_DB")?;
            Some(format!("postgres://{}:{}@{}:{}/{}", user, password, host, port, db))
        });

        if database_url.is_none() && environment == Environment::Production {
            return Err(ConfigError::Missing(
                "DATABASE_URL or DATABASE_SERVER_HOST + DATABASE_SERVER_USER + DATABASE_PASSWORD + DATABASE_DB is required in production".to_string(),
            ));
        }

        Ok(Config {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_number(&var, "PORT", 8080)?,
            database_url,
            frontend_dir: var("FRONTEND_DIR").unwrap_or_else(|| "./frontend".to_string()),
            max_body_size: parse_number(&var, "MAX_BODY_SIZE", 1024 * 1024)?, // 1MB default
            cors_origins: var("CORS_ORIGINS")
                .map(|s| split_list(&s))
                .unwrap_or_else(|| vec!["http://localhost:8080".to_string()]),
            environment,
            // Examples: "10.0.0.", "172.16.", "127.0.0.1"
            trusted_proxies: var("TRUSTED_PROXIES")
                .map(|s| split_list(&s))
                .unwrap_or_default(),
            // Comma list in the environment, space-separated source list in the header
            embed_frame_ancestors: var("EMBED_FRAME_ANCESTORS")
                .map(|s| split_list(&s).join(" "))
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "*".to_string()),
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_number<T: FromStr>(
    var: impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{} must be a number, got '{}'", key, raw))),
        None => Ok(default),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
