//! Security headers

use crate::handlers::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

macro_rules! base_csp {
    () => {
        "default-src 'self'; script-src 'self' 'unsafe-inline'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; font-src 'self'; form-action 'self'; base-uri 'self'"
    };
}

const BASE_CSP: &str = base_csp!();
const STRICT_CSP: &str = concat!(base_csp!(), "; frame-ancestors 'none'");

/// Embedded viewer routes, which third-party pages may frame
fn is_embed_path(path: &str) -> bool {
    ["/embed", "/api/embed"]
        .iter()
        .any(|prefix| path == *prefix || path.starts_with(&format!("{}/", prefix)))
}

/// Security headers middleware
pub async fn security_headers(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let embed = is_embed_path(request.uri().path());
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    let framed_csp = embed
        .then(|| format!("{}; frame-ancestors {}", BASE_CSP, state.frame_ancestors))
        .and_then(|csp| match HeaderValue::from_str(&csp) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring unusable frame ancestors '{}'", state.frame_ancestors);
                None
            }
        });

    match framed_csp {
        Some(csp) => {
            headers.insert("Content-Security-Policy", csp);
        }
        None => {
            headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
            headers.insert("Content-Security-Policy", HeaderValue::from_static(STRICT_CSP));
        }
    }

    if state.is_production {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        );
    }

    response
}
