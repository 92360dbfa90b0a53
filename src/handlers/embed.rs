//! Respondent-facing endpoints used by the embedded viewer
//!
//! The viewer evaluates navigation locally for responsiveness, but every decision
//! is available here too, and a final submission is always re-derived on the
//! server from the complete answer map before it is recorded.

use crate::engine::{normalize_submission, replay, visible_fields, FormGraph, NextPage, SubmissionMeta};
use crate::handlers::client::{client_ip, user_agent};
use crate::handlers::forms::store_error;
use crate::handlers::AppState;
use crate::models::*;
use crate::validation::validate_page_answers;
use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use std::net::SocketAddr;

#[derive(Debug, Serialize)]
pub struct NextPageResponse {
    pub next: NextPage,
}

/// Load a form the public may see; inactive forms look missing
async fn active_form(state: &AppState, slug: &str) -> Result<Form, (StatusCode, String)> {
    match state.forms.find_by_slug(slug).await {
        Ok(Some(form)) if form.is_active => Ok(form),
        Ok(_) => Err((StatusCode::NOT_FOUND, "Form not found".to_string())),
        Err(e) => {
            let (status, Json(body)) = store_error::<()>(e);
            Err((status, body.error.unwrap_or_default()))
        }
    }
}

fn failure<T>((status, message): (StatusCode, String)) -> (StatusCode, Json<ApiResponse<T>>) {
    (status, Json(ApiResponse::error(message)))
}

/// Answers to fields the respondent could actually see on the path taken.
///
/// Values for pages off the path, or for fields hidden on a visited page, are left
/// out so normalization records them as null.
fn reached_answers(form: &Form, visited: &[usize], answers: &AnswerMap) -> AnswerMap {
    let mut reached = AnswerMap::new();
    for page in visited.iter().filter_map(|&index| form.pages.get(index)) {
        for field in visible_fields(page, answers) {
            if let Some(value) = answers.get(&field.name) {
                reached.insert(field.name.clone(), value.clone());
            }
        }
    }
    reached
}

/// Form definition for the viewer
pub async fn get_embed_form(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    match active_form(&state, &slug).await {
        Ok(form) => (StatusCode::OK, Json(ApiResponse::success(form))),
        Err(e) => failure(e),
    }
}

/// Names of the fields on a page that are visible for the given answers
pub async fn page_visibility(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(input): Json<VisibilityRequest>,
) -> impl IntoResponse {
    let form = match active_form(&state, &slug).await {
        Ok(form) => form,
        Err(e) => return failure(e),
    };

    let Some(page) = form.pages.get(input.page_index) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<VisibilityResponse>::error("Page index out of range")),
        );
    };

    let visible = visible_fields(page, &input.answers)
        .into_iter()
        .map(|f| f.name.clone())
        .collect();

    (
        StatusCode::OK,
        Json(ApiResponse::success(VisibilityResponse {
            page_index: input.page_index,
            visible_fields: visible,
        })),
    )
}

/// Validate the current page, then resolve where the respondent goes next
pub async fn next_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(input): Json<NextPageRequest>,
) -> impl IntoResponse {
    let form = match active_form(&state, &slug).await {
        Ok(form) => form,
        Err(e) => return failure(e),
    };

    let Some(page) = form.pages.get(input.current_index) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<NextPageResponse>::error("Page index out of range")),
        );
    };

    if let Err(errors) = validate_page_answers(page, &input.answers) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::field_errors("Please correct the highlighted fields", errors)),
        );
    }

    let graph = FormGraph::from_pages(&form.pages);
    let next = graph.resolve_next_page(input.current_index, &input.answers);
    tracing::debug!("Form {} page {} -> {:?}", form.slug, input.current_index, next);

    (StatusCode::OK, Json(ApiResponse::success(NextPageResponse { next })))
}

/// Record a completed traversal.
///
/// The path is replayed from the first page against the submitted answers, every
/// visited page is validated, and the record is normalized to the form's full
/// field list before it reaches the sink.
pub async fn submit(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(input): Json<CreateSubmission>,
) -> impl IntoResponse {
    let form = match active_form(&state, &slug).await {
        Ok(form) => form,
        Err(e) => return failure(e),
    };

    let graph = FormGraph::from_pages(&form.pages);
    let visited = match replay(&graph, &input.answers) {
        Ok(visited) => visited,
        Err(e) => {
            tracing::warn!("Rejected submission for {}: {}", form.slug, e);
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ApiResponse::<Submission>::error(e.to_string())),
            );
        }
    };

    let errors: Vec<FieldError> = visited
        .iter()
        .filter_map(|&index| form.pages.get(index))
        .filter_map(|page| validate_page_answers(page, &input.answers).err())
        .flatten()
        .collect();
    if !errors.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::field_errors("Please correct the highlighted fields", errors)),
        );
    }

    let meta = SubmissionMeta {
        submitted_at: Utc::now(),
        ip_address: client_ip(
            connect_info.map(|ConnectInfo(addr)| addr),
            &headers,
            &state.trusted_proxies,
        ),
        user_agent: user_agent(&headers),
    };
    let reached = reached_answers(&form, &visited, &input.answers);
    let data = normalize_submission(&form, &reached, &meta);

    let submission = NewSubmission {
        form_id: form.id,
        data,
        ip_address: meta.ip_address,
        user_agent: meta.user_agent,
        submitted_at: meta.submitted_at,
    };

    match state.submissions.record(submission).await {
        Ok(recorded) => {
            tracing::info!(
                "Recorded submission {} for form {} ({} pages visited)",
                recorded.id,
                form.slug,
                visited.len()
            );
            (StatusCode::CREATED, Json(ApiResponse::success(recorded)))
        }
        Err(e) => store_error(e),
    }
}
