//! Shared utilities and types for TalentZik backend services

// Re-export common dependencies
pub use anyhow;
pub use chrono;
pub use serde;
pub use serde_json;
pub use thiserror;
pub use tracing;
pub use uuid;

pub mod auth;
pub mod config;
pub mod database;
pub mod http;
pub mod mailer;
pub mod observability;
pub mod text;
pub mod types;

pub use types::{ApiError, ApiResult};
