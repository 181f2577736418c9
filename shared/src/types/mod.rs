//! Shared type definitions for the TalentZik marketplace services
//!
//! - Identifier aliases and the account role enum
//! - Page resolution and paginated response envelopes
//! - The HTTP-facing error type

pub mod common;
pub mod error;

pub use common::{
    ArtistId, MessageResponse, OrganizerId, Page, PaginatedResponse, UserId, UserType,
};
pub use error::{ApiError, ApiResult};
