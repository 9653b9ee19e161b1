use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Resolve the client address recorded on a session.
///
/// First match wins: the leftmost `X-Forwarded-For` entry, then `X-Real-IP`,
/// then the socket peer. Each candidate must parse as a bare IP literal;
/// anything else is skipped.
#[must_use]
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    parse_ip(header_str(headers, X_FORWARDED_FOR).and_then(|value| value.split(',').next()))
        .or_else(|| parse_ip(header_str(headers, X_REAL_IP)))
        .or_else(|| peer.map(|addr| addr.ip()))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}

fn parse_ip(candidate: Option<&str>) -> Option<IpAddr> {
    candidate?.trim().parse().ok()
}
