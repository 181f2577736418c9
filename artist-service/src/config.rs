use anyhow::Result;
use serde::{Deserialize, Serialize};
use shared::config::{DatabaseConfig, JwtConfig, ServerConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub page_size: i64,
    pub similar_artists_limit: i64,
    pub quick_search_limit: i64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            page_size: 12,
            similar_artists_limit: 4,
            quick_search_limit: 5,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = CatalogConfig::default();

        Ok(Self {
            server: ServerConfig::from_env("ARTIST_SERVICE_PORT", 8082)?,
            database: DatabaseConfig::from_env()?,
            jwt: JwtConfig::from_env()?,
            catalog: CatalogConfig {
                page_size: std::env::var("ARTISTS_PAGE_SIZE")
                    .unwrap_or_else(|_| defaults.page_size.to_string())
                    .parse()?,
                similar_artists_limit: std::env::var("SIMILAR_ARTISTS_LIMIT")
                    .unwrap_or_else(|_| defaults.similar_artists_limit.to_string())
                    .parse()?,
                quick_search_limit: std::env::var("QUICK_SEARCH_LIMIT")
                    .unwrap_or_else(|_| defaults.quick_search_limit.to_string())
                    .parse()?,
            },
        })
    }
}
