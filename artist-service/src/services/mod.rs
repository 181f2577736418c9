pub mod artist_service;
pub mod reference_service;
