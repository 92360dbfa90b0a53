//! Requester identification for submission records

use axum::http::{header, HeaderMap};
use std::net::{IpAddr, SocketAddr};

const MAX_USER_AGENT_CHARS: usize = 500;

/// Client IP for the request.
///
/// Forwarding headers are only believed when the direct peer matches one of the
/// trusted proxy prefixes; otherwise the peer address itself is used.
pub fn client_ip(
    peer: Option<SocketAddr>,
    headers: &HeaderMap,
    trusted_proxies: &[String],
) -> Option<String> {
    let peer_ip = peer.map(|addr| addr.ip().to_string());

    let behind_proxy = peer_ip
        .as_deref()
        .is_some_and(|ip| trusted_proxies.iter().any(|prefix| ip.starts_with(prefix.as_str())));

    if behind_proxy {
        if let Some(ip) = forwarded_ip(headers) {
            return Some(ip);
        }
    }

    peer_ip
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    // X-Forwarded-For: client, proxy1, proxy2
    let from_xff = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(parse_ip);

    from_xff.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_ip)
    })
}

fn parse_ip(value: &str) -> Option<String> {
    value.trim().parse::<IpAddr>().ok().map(|ip| ip.to_string())
}

pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.chars().take(MAX_USER_AGENT_CHARS).collect())
}
