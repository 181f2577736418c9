use anyhow::Result;
use serde::{Deserialize, Serialize};
use shared::config::{DatabaseConfig, EmailConfig, JwtConfig, ServerConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub email: EmailConfig,
    pub reviews: ReviewConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    pub public_base_url: String,
    pub request_expiry_days: i64,
    /// Oldest event an organizer may still review
    pub max_event_age_days: i64,
    pub page_size: i64,
    pub stats_refresh_interval_seconds: u64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:8000".to_string(),
            request_expiry_days: 30,
            max_event_age_days: 365,
            page_size: 10,
            stats_refresh_interval_seconds: 3600,
        }
    }
}

impl ReviewConfig {
    pub fn review_url(&self, token: &uuid::Uuid) -> String {
        format!("{}/reviews/leave/public/{}", self.public_base_url, token)
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = ReviewConfig::default();

        Ok(Self {
            server: ServerConfig::from_env("REVIEW_SERVICE_PORT", 8084)?,
            database: DatabaseConfig::from_env()?,
            jwt: JwtConfig::from_env()?,
            email: EmailConfig::from_env()?,
            reviews: ReviewConfig {
                public_base_url: shared::config::public_base_url(),
                request_expiry_days: std::env::var("REVIEW_REQUEST_EXPIRY_DAYS")
                    .unwrap_or_else(|_| defaults.request_expiry_days.to_string())
                    .parse()?,
                max_event_age_days: std::env::var("REVIEW_MAX_EVENT_AGE_DAYS")
                    .unwrap_or_else(|_| defaults.max_event_age_days.to_string())
                    .parse()?,
                page_size: std::env::var("REVIEWS_PAGE_SIZE")
                    .unwrap_or_else(|_| defaults.page_size.to_string())
                    .parse()?,
                stats_refresh_interval_seconds: std::env::var("STATS_REFRESH_INTERVAL_SECS")
                    .unwrap_or_else(|_| defaults.stats_refresh_interval_seconds.to_string())
                    .parse()?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_url() {
        let config = ReviewConfig::default();
        let token = uuid::Uuid::nil();
        assert_eq!(
            config.review_url(&token),
            "http://localhost:8000/reviews/leave/public/00000000-0000-0000-0000-000000000000"
        );
    }
}
