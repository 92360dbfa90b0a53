//! Persistence collaborators
//!
//! The engine never talks to storage; handlers load a form aggregate through
//! [`FormStore`] and hand normalized records to a [`SubmissionSink`].

use crate::builder::{is_temporary, FormDraft, IdMap};
use crate::models::{Form, FormSummary, NewSubmission, Submission, SubmissionStatus};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashSet;
use uuid::Uuid;

/// Repository result type
pub type RepoResult<T> = Result<T, RepositoryError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row".to_string()),
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                RepositoryError::Conflict(db.message().to_string())
            }
            _ => RepositoryError::Storage(e.to_string()),
        }
    }
}

/// Form aggregates: form, pages sorted by `sort_order`, fields sorted within pages
#[async_trait]
pub trait FormStore: Send + Sync {
    /// Consistent snapshot of one form with all pages and fields
    async fn find_by_slug(&self, slug: &str) -> RepoResult<Option<Form>>;

    async fn list(&self) -> RepoResult<Vec<FormSummary>>;

    async fn create(&self, draft: &FormDraft) -> RepoResult<Form>;

    /// Replace the form's pages and fields with the draft, reconciling temporary ids
    async fn update(&self, slug: &str, draft: &FormDraft) -> RepoResult<Form>;

    async fn delete(&self, slug: &str) -> RepoResult<()>;
}

/// Destination of completed submissions
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    async fn record(&self, submission: NewSubmission) -> RepoResult<Submission>;

    /// Newest first; returns the page of rows and the total count
    async fn list(&self, form_id: i64, page: i64, per_page: i64) -> RepoResult<(Vec<Submission>, i64)>;

    async fn update_status(
        &self,
        form_id: i64,
        id: Uuid,
        status: SubmissionStatus,
    ) -> RepoResult<Submission>;
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Default)]
struct MemoryState {
    forms: Vec<Form>,
    submissions: Vec<Submission>,
    next_id: i64,
}

impl MemoryState {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Fresh ids for every draft page and field the form does not already own
    fn assign_ids(&mut self, draft: &FormDraft, owned: Option<&Form>) -> IdMap {
        let owned_pages: HashSet<i64> = owned
            .map(|f| f.pages.iter().map(|p| p.id).collect())
            .unwrap_or_default();
        let owned_fields: HashSet<i64> = owned
            .map(|f| f.fields().map(|field| field.id).collect())
            .unwrap_or_default();

        let mut ids = IdMap::new();
        for page in &draft.pages {
            if is_temporary(page.id) || !owned_pages.contains(&page.id) {
                let id = self.allocate();
                ids.insert_page(page.id, id);
            }
            for field in &page.fields {
                if is_temporary(field.id) || !owned_fields.contains(&field.id) {
                    let id = self.allocate();
                    ids.insert_field(field.id, id);
                }
            }
        }
        ids
    }
}

/// In-memory store (development without a database, and tests)
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FormStore for InMemoryStore {
    async fn find_by_slug(&self, slug: &str) -> RepoResult<Option<Form>> {
        Ok(self
            .state
            .read()
            .forms
            .iter()
            .find(|f| f.slug == slug)
            .cloned())
    }

    async fn list(&self) -> RepoResult<Vec<FormSummary>> {
        let state = self.state.read();
        let mut forms: Vec<FormSummary> = state.forms.iter().map(FormSummary::from).collect();
        forms.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(forms)
    }

    async fn create(&self, draft: &FormDraft) -> RepoResult<Form> {
        let mut state = self.state.write();
        if state.forms.iter().any(|f| f.slug == draft.slug) {
            return Err(RepositoryError::Conflict(format!("slug '{}' is taken", draft.slug)));
        }

        let form_id = state.allocate();
        let ids = state.assign_ids(draft, None);
        let now = Utc::now();
        let form = Form {
            id: form_id,
            name: draft.name.clone(),
            slug: draft.slug.clone(),
            description: draft.description.clone(),
            settings: draft.settings.clone(),
            is_active: draft.is_active,
            owner_id: draft.owner_id,
            pages: draft.reconcile(form_id, &ids),
            created_at: now,
            updated_at: now,
        };
        state.forms.push(form.clone());
        Ok(form)
    }

    async fn update(&self, slug: &str, draft: &FormDraft) -> RepoResult<Form> {
        let mut state = self.state.write();
        if draft.slug != slug && state.forms.iter().any(|f| f.slug == draft.slug) {
            return Err(RepositoryError::Conflict(format!("slug '{}' is taken", draft.slug)));
        }
        let position = state
            .forms
            .iter()
            .position(|f| f.slug == slug)
            .ok_or_else(|| RepositoryError::NotFound(slug.to_string()))?;

        let existing = state.forms[position].clone();
        let ids = state.assign_ids(draft, Some(&existing));
        let form = &mut state.forms[position];
        form.name = draft.name.clone();
        form.slug = draft.slug.clone();
        form.description = draft.description.clone();
        form.settings = draft.settings.clone();
        form.is_active = draft.is_active;
        form.owner_id = draft.owner_id;
        form.pages = draft.reconcile(form.id, &ids);
        form.updated_at = Utc::now();
        Ok(form.clone())
    }

    async fn delete(&self, slug: &str) -> RepoResult<()> {
        let mut state = self.state.write();
        let position = state
            .forms
            .iter()
            .position(|f| f.slug == slug)
            .ok_or_else(|| RepositoryError::NotFound(slug.to_string()))?;
        let form = state.forms.remove(position);
        state.submissions.retain(|s| s.form_id != form.id);
        Ok(())
    }
}

#[async_trait]
impl SubmissionSink for InMemoryStore {
    async fn record(&self, submission: NewSubmission) -> RepoResult<Submission> {
        let stored = Submission {
            id: Uuid::new_v4(),
            form_id: submission.form_id,
            data: submission.data,
            ip_address: submission.ip_address,
            user_agent: submission.user_agent,
            status: SubmissionStatus::New,
            submitted_at: submission.submitted_at,
        };
        self.state.write().submissions.push(stored.clone());
        Ok(stored)
    }

    async fn list(&self, form_id: i64, page: i64, per_page: i64) -> RepoResult<(Vec<Submission>, i64)> {
        let state = self.state.read();
        let mut rows: Vec<&Submission> = state
            .submissions
            .iter()
            .filter(|s| s.form_id == form_id)
            .collect();
        rows.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));

        let total = rows.len() as i64;
        let offset = ((page - 1).max(0) * per_page) as usize;
        let items = rows
            .into_iter()
            .skip(offset)
            .take(per_page.max(0) as usize)
            .cloned()
            .collect();
        Ok((items, total))
    }

    async fn update_status(
        &self,
        form_id: i64,
        id: Uuid,
        status: SubmissionStatus,
    ) -> RepoResult<Submission> {
        let mut state = self.state.write();
        let submission = state
            .submissions
            .iter_mut()
            .find(|s| s.id == id && s.form_id == form_id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        submission.status = status;
        Ok(submission.clone())
    }
}
