//! Process-level settings for the HTTP server

use std::env;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000";
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Server configuration, read from the environment
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    /// Allowed browser origins
    pub cors_origins: Vec<String>,
    /// Deployment name reported by the health endpoint
    pub environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            cors_origins: parse_origins(DEFAULT_CORS_ORIGINS),
            environment: DEFAULT_ENVIRONMENT.to_string(),
        }
    }
}

impl AppConfig {
    /// Read `PORT`, `CORS_ORIGINS` and `APP_ENV`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            port: lookup("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: lookup("CORS_ORIGINS")
                .map(|o| parse_origins(&o))
                .filter(|o| !o.is_empty())
                .unwrap_or(defaults.cors_origins),
            environment: lookup("APP_ENV")
                .filter(|e| !e.trim().is_empty())
                .unwrap_or(defaults.environment),
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect()
}
