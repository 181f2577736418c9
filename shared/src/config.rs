//! Configuration sections shared by every service.
//!
//! Each service composes its own `Config` out of these and reads them from
//! the environment (after `dotenvy::dotenv()`).

use anyhow::Result;
use serde::{Deserialize, Serialize};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// `port_var` is the service specific port variable, e.g. `USER_SERVICE_PORT`.
    pub fn from_env(port_var: &str, default_port: u16) -> Result<Self> {
        Ok(Self {
            host: env_or("SERVER_HOST", "0.0.0.0"),
            port: std::env::var(port_var)
                .unwrap_or_else(|_| default_port.to_string())
                .parse()?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            url: std::env::var("DATABASE_URL")?,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", "10").parse()?,
            acquire_timeout_seconds: env_or("DATABASE_ACQUIRE_TIMEOUT_SECONDS", "30").parse()?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub session_ttl_seconds: u64,
}

impl RedisConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            url: env_or("REDIS_URL", "redis://localhost:6379"),
            session_ttl_seconds: env_or("SESSION_TTL_SECONDS", "2592000").parse()?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expiry_hours: u64,
    pub refresh_token_expiry_days: u64,
}

impl JwtConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            secret: std::env::var("JWT_SECRET")?,
            access_token_expiry_hours: env_or("ACCESS_TOKEN_EXPIRY_HOURS", "24").parse()?,
            refresh_token_expiry_days: env_or("REFRESH_TOKEN_EXPIRY_DAYS", "30").parse()?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_address: String,
    pub from_name: String,
}

impl EmailConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            enabled: env_or("EMAIL_ENABLED", "false").parse()?,
            smtp_host: env_or("SMTP_HOST", "smtp.gmail.com"),
            smtp_port: env_or("SMTP_PORT", "587").parse()?,
            smtp_username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
            smtp_password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
            from_address: env_or("EMAIL_FROM", "noreply@talentzik.com"),
            from_name: env_or("EMAIL_FROM_NAME", "TalentZik"),
        })
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_address: "noreply@talentzik.com".to_string(),
            from_name: "TalentZik".to_string(),
        }
    }
}

/// Public URL of the web front, used to build links sent by email.
pub fn public_base_url() -> String {
    env_or("PUBLIC_BASE_URL", "http://localhost:8000")
        .trim_end_matches('/')
        .to_string()
}
