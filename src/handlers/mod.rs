//! HTTP request handlers

pub mod client;
pub mod embed;
pub mod forms;
pub mod middleware;

use crate::db::{FormStore, SubmissionSink};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::services::ServeDir;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub forms: Arc<dyn FormStore>,
    pub submissions: Arc<dyn SubmissionSink>,
    pub is_production: bool,
    /// Trusted proxy IP prefixes for X-Forwarded-For validation
    pub trusted_proxies: Vec<String>,
    /// `frame-ancestors` source list for embed responses
    pub frame_ancestors: String,
}

/// API routes, optional static frontend, and security headers on everything
pub fn router(state: AppState, frontend_dir: Option<&str>) -> Router {
    let api_routes = Router::new()
        // Builder
        .route("/forms", get(forms::list_forms).post(forms::create_form))
        .route(
            "/forms/:slug",
            get(forms::get_form)
                .put(forms::update_form)
                .delete(forms::delete_form),
        )
        .route("/forms/:slug/submissions", get(forms::list_submissions))
        .route(
            "/forms/:slug/submissions/:id/status",
            put(forms::update_submission_status),
        )
        // Embedded viewer
        .route("/embed/:slug", get(embed::get_embed_form))
        .route("/embed/:slug/visibility", post(embed::page_visibility))
        .route("/embed/:slug/next", post(embed::next_page))
        .route("/embed/:slug/submissions", post(embed::submit));

    let mut app = Router::new().nest("/api", api_routes);
    if let Some(dir) = frontend_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(from_fn_with_state(state.clone(), middleware::security_headers))
        .with_state(state)
}
