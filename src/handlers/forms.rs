//! Builder endpoints: form definitions and collected submissions

use crate::builder::FormDraft;
use crate::db::RepositoryError;
use crate::engine::{project_record, record_columns};
use crate::handlers::AppState;
use crate::models::*;
use crate::validation::validate_form_definition;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListSubmissionsQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Map a storage failure to a response, logging anything that is not the caller's fault
pub(crate) fn store_error<T>(e: RepositoryError) -> (StatusCode, Json<ApiResponse<T>>) {
    match e {
        RepositoryError::NotFound(_) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Form not found")),
        ),
        RepositoryError::Conflict(message) => {
            tracing::debug!("Conflict while saving form: {}", message);
            (
                StatusCode::CONFLICT,
                Json(ApiResponse::error("A form with this slug already exists")),
            )
        }
        RepositoryError::Storage(message) => {
            tracing::error!("Storage error: {}", message);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Internal server error")),
            )
        }
    }
}

// =============================================================================
// Form definitions
// =============================================================================

/// List all forms
pub async fn list_forms(State(state): State<AppState>) -> impl IntoResponse {
    match state.forms.list().await {
        Ok(forms) => (StatusCode::OK, Json(ApiResponse::success(forms))),
        Err(e) => store_error(e),
    }
}

/// Create a form from a builder draft
pub async fn create_form(
    State(state): State<AppState>,
    Json(mut draft): Json<FormDraft>,
) -> impl IntoResponse {
    // Pages and fields sent without an id are new
    draft.assign_temporary_ids();
    if let Err(e) = validate_form_definition(&draft) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<Form>::error(e.to_string())),
        );
    }

    match state.forms.create(&draft).await {
        Ok(form) => {
            tracing::info!("Created form {} ({} pages)", form.slug, form.pages.len());
            (StatusCode::CREATED, Json(ApiResponse::success(form)))
        }
        Err(e) => store_error(e),
    }
}

/// Full form for the builder, active or not
pub async fn get_form(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    match state.forms.find_by_slug(&slug).await {
        Ok(Some(form)) => (StatusCode::OK, Json(ApiResponse::success(form))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Form not found")),
        ),
        Err(e) => store_error(e),
    }
}

/// Save a builder draft over an existing form
pub async fn update_form(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(mut draft): Json<FormDraft>,
) -> impl IntoResponse {
    // Pages and fields sent without an id are new
    draft.assign_temporary_ids();
    if let Err(e) = validate_form_definition(&draft) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<Form>::error(e.to_string())),
        );
    }

    match state.forms.update(&slug, &draft).await {
        Ok(form) => {
            tracing::info!("Saved form {}", form.slug);
            (StatusCode::OK, Json(ApiResponse::success(form)))
        }
        Err(e) => store_error(e),
    }
}

/// Delete a form with its pages, fields and submissions
pub async fn delete_form(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    match state.forms.delete(&slug).await {
        Ok(()) => {
            tracing::info!("Deleted form {}", slug);
            (StatusCode::OK, Json(ApiResponse::success(())))
        }
        Err(e) => store_error(e),
    }
}

// =============================================================================
// Submissions
// =============================================================================

/// Normalized submissions of a form, newest first, each row shaped to the current columns
pub async fn list_submissions(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<ListSubmissionsQuery>,
) -> impl IntoResponse {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let form = match state.forms.find_by_slug(&slug).await {
        Ok(Some(form)) => form,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<SubmissionTable>::error("Form not found")),
            )
        }
        Err(e) => return store_error(e),
    };

    match state.submissions.list(form.id, page, per_page).await {
        Ok((mut rows, total)) => {
            let total_pages = (total + per_page - 1) / per_page;
            let columns = record_columns(&form);
            for row in &mut rows {
                row.data = project_record(&columns, &row.data);
            }
            (
                StatusCode::OK,
                Json(ApiResponse::success(SubmissionTable {
                    columns,
                    rows,
                    total,
                    page,
                    per_page,
                    total_pages,
                })),
            )
        }
        Err(e) => store_error(e),
    }
}

/// Mark a submission as read or archived
pub async fn update_submission_status(
    State(state): State<AppState>,
    Path((slug, id)): Path<(String, Uuid)>,
    Json(input): Json<UpdateSubmissionStatus>,
) -> impl IntoResponse {
    let form = match state.forms.find_by_slug(&slug).await {
        Ok(Some(form)) => form,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<Submission>::error("Form not found")),
            )
        }
        Err(e) => return store_error(e),
    };

    match state
        .submissions
        .update_status(form.id, id, input.status)
        .await
    {
        Ok(submission) => (StatusCode::OK, Json(ApiResponse::success(submission))),
        Err(RepositoryError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Submission not found")),
        ),
        Err(e) => store_error(e),
    }
}
