//! Small request helpers shared by the HTTP handlers

use std::net::SocketAddr;

use axum::http::{header, HeaderMap};

/// Client address as seen through the reverse proxy: the first entry of
/// `X-Forwarded-For` when present, otherwise the peer address.
pub fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| remote.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "0.0.0.0".to_string())
}

pub fn referrer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_for_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("41.202.1.9, 10.0.0.1"));
        let remote: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        assert_eq!(client_ip(&headers, Some(remote)), "41.202.1.9");
    }

    #[test]
    fn test_falls_back_to_remote_address() {
        let remote: SocketAddr = "192.168.1.20:5000".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), Some(remote)), "192.168.1.20");
        assert_eq!(client_ip(&HeaderMap::new(), None), "0.0.0.0");
    }
}
