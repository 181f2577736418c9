use anyhow::Result;
use serde::{Deserialize, Serialize};
use shared::config::{DatabaseConfig, EmailConfig, JwtConfig, RedisConfig, ServerConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub email: EmailConfig,
    pub tokens: TokenConfig,
    pub public_base_url: String,
}

/// Lifetimes of the one-time tokens kept in Redis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub email_verification_ttl_seconds: u64,
    pub password_reset_ttl_seconds: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            email_verification_ttl_seconds: 24 * 3600,
            password_reset_ttl_seconds: 3600,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server: ServerConfig::from_env("USER_SERVICE_PORT", 8081)?,
            database: DatabaseConfig::from_env()?,
            redis: RedisConfig::from_env()?,
            jwt: JwtConfig::from_env()?,
            email: EmailConfig::from_env()?,
            tokens: TokenConfig {
                email_verification_ttl_seconds: std::env::var("EMAIL_VERIFICATION_TTL_SECONDS")
                    .unwrap_or_else(|_| "86400".to_string())
                    .parse()?,
                password_reset_ttl_seconds: std::env::var("PASSWORD_RESET_TTL_SECONDS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()?,
            },
            public_base_url: shared::config::public_base_url(),
        })
    }
}
