pub mod admin;
pub mod health;
pub mod requests;
pub mod reviews;
