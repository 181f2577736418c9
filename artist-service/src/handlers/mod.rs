pub mod artists;
pub mod health;
pub mod reference;
pub mod whatsapp;

use axum::http::HeaderMap;
use shared::auth::Claims;
use std::net::SocketAddr;

use crate::services::artist_service::Visitor;

pub(crate) fn visitor(headers: &HeaderMap, remote: SocketAddr, claims: Option<Claims>) -> Visitor {
    Visitor {
        claims,
        ip: shared::http::client_ip(headers, Some(remote)),
        referrer: shared::http::referrer(headers),
    }
}
