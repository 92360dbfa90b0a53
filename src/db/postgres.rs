//! Postgres-backed form store and submission sink

use super::store::{FormStore, RepoResult, RepositoryError, SubmissionSink};
use crate::builder::{is_temporary, FormDraft, IdMap};
use crate::models::{
    AnswerMap, Condition, ConditionalLogic, Field, FieldOption, FieldSettings, FieldType, Form,
    FormSummary, NewSubmission, Page, PageSettings, Submission, SubmissionStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::HashSet;
use uuid::Uuid;

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, FromRow)]
struct FormRow {
    id: i64,
    name: String,
    slug: String,
    description: Option<String>,
    settings: Json<Map<String, Value>>,
    is_active: bool,
    owner_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct FormSummaryRow {
    id: i64,
    name: String,
    slug: String,
    description: Option<String>,
    is_active: bool,
    page_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct PageRow {
    id: i64,
    form_id: i64,
    title: String,
    description: Option<String>,
    sort_order: i32,
    settings: Json<PageSettings>,
    conditional_logic: Option<Json<ConditionalLogic>>,
}

#[derive(Debug, FromRow)]
struct FieldRow {
    id: i64,
    page_id: i64,
    label: String,
    name: String,
    field_type: String,
    placeholder: Option<String>,
    help_text: Option<String>,
    default_value: Option<Json<Value>>,
    required: bool,
    validation: Json<Vec<String>>,
    options: Json<Vec<FieldOption>>,
    conditions: Json<Vec<Condition>>,
    settings: Json<FieldSettings>,
    sort_order: i32,
}

#[derive(Debug, FromRow)]
struct SubmissionRow {
    id: Uuid,
    form_id: i64,
    data: Json<AnswerMap>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    status: String,
    submitted_at: DateTime<Utc>,
}

impl FieldRow {
    fn into_field(self) -> Option<Field> {
        let field_type: FieldType =
            serde_json::from_value(Value::String(self.field_type.clone())).ok()?;
        Some(Field {
            id: self.id,
            page_id: self.page_id,
            label: self.label,
            name: self.name,
            field_type,
            placeholder: self.placeholder,
            help_text: self.help_text,
            default_value: self.default_value.map(|v| v.0),
            required: self.required,
            validation: self.validation.0,
            options: self.options.0,
            conditions: self.conditions.0,
            settings: self.settings.0,
            sort_order: self.sort_order,
        })
    }
}

impl From<SubmissionRow> for Submission {
    fn from(row: SubmissionRow) -> Self {
        Self {
            id: row.id,
            form_id: row.form_id,
            data: row.data.0,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            status: SubmissionStatus::parse(&row.status).unwrap_or_default(),
            submitted_at: row.submitted_at,
        }
    }
}

fn field_type_name(field_type: FieldType) -> String {
    match serde_json::to_value(field_type) {
        Ok(Value::String(name)) => name,
        _ => "text".to_string(),
    }
}

// =============================================================================
// Store
// =============================================================================

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_form(tx: &mut Transaction<'_, Postgres>, row: FormRow) -> RepoResult<Form> {
        let page_rows = sqlx::query_as::<_, PageRow>(
            "SELECT * FROM pages WHERE form_id = $1 ORDER BY sort_order, id",
        )
        .bind(row.id)
        .fetch_all(&mut **tx)
        .await?;

        let page_ids: Vec<i64> = page_rows.iter().map(|p| p.id).collect();
        let field_rows = sqlx::query_as::<_, FieldRow>(
            "SELECT * FROM fields WHERE page_id = ANY($1) ORDER BY page_id, sort_order, id",
        )
        .bind(&page_ids)
        .fetch_all(&mut **tx)
        .await?;

        let mut fields: Vec<Field> = Vec::with_capacity(field_rows.len());
        for field_row in field_rows {
            let (id, field_type) = (field_row.id, field_row.field_type.clone());
            match field_row.into_field() {
                Some(field) => fields.push(field),
                None => tracing::warn!("Skipping field {} with unknown type '{}'", id, field_type),
            }
        }

        let pages = page_rows
            .into_iter()
            .map(|page| Page {
                fields: fields.iter().filter(|f| f.page_id == page.id).cloned().collect(),
                id: page.id,
                form_id: page.form_id,
                title: page.title,
                description: page.description,
                sort_order: page.sort_order,
                settings: page.settings.0,
                conditional_logic: page.conditional_logic.map(|l| l.0),
            })
            .collect();

        Ok(Form {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            settings: row.settings.0,
            is_active: row.is_active,
            owner_id: row.owner_id,
            pages,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    /// Write the draft's pages and fields for `form_id`, keeping rows the form owns
    async fn write_pages(
        tx: &mut Transaction<'_, Postgres>,
        form_id: i64,
        draft: &FormDraft,
    ) -> RepoResult<()> {
        let owned_pages: HashSet<i64> =
            sqlx::query_scalar::<_, i64>("SELECT id FROM pages WHERE form_id = $1")
                .bind(form_id)
                .fetch_all(&mut **tx)
                .await?
                .into_iter()
                .collect();
        let owned_fields: HashSet<i64> = sqlx::query_scalar::<_, i64>(
            "SELECT f.id FROM fields f JOIN pages p ON p.id = f.page_id WHERE p.form_id = $1",
        )
        .bind(form_id)
        .fetch_all(&mut **tx)
        .await?
        .into_iter()
        .collect();

        // Pass 1: make sure every page row exists so ids are known
        let mut ids = IdMap::new();
        for page in &draft.pages {
            if is_temporary(page.id) || !owned_pages.contains(&page.id) {
                let id: i64 = sqlx::query_scalar(
                    "INSERT INTO pages (form_id, title, sort_order) VALUES ($1, $2, 0) RETURNING id",
                )
                .bind(form_id)
                .bind(&page.title)
                .fetch_one(&mut **tx)
                .await?;
                ids.insert_page(page.id, id);
            }
        }

        // Pass 2: fields
        for page in &draft.pages {
            for field in &page.fields {
                if is_temporary(field.id) || !owned_fields.contains(&field.id) {
                    let id: i64 = sqlx::query_scalar(
                        r#"
                        INSERT INTO fields (page_id, label, name, field_type, sort_order)
                        VALUES ($1, $2, $3, $4, 0)
                        RETURNING id
                        "#,
                    )
                    .bind(ids.page(page.id))
                    .bind(&field.label)
                    .bind(&field.name)
                    .bind(field_type_name(field.field_type))
                    .fetch_one(&mut **tx)
                    .await?;
                    ids.insert_field(field.id, id);
                }
            }
        }

        // Pass 3: full contents with every reference rewritten to persisted ids
        for page in draft.reconcile(form_id, &ids) {
            sqlx::query(
                r#"
                UPDATE pages SET
                    title = $1, description = $2, sort_order = $3,
                    settings = $4, conditional_logic = $5
                WHERE id = $6
                "#,
            )
            .bind(&page.title)
            .bind(&page.description)
            .bind(page.sort_order)
            .bind(Json(&page.settings))
            .bind(page.conditional_logic.as_ref().map(Json))
            .bind(page.id)
            .execute(&mut **tx)
            .await?;

            for field in &page.fields {
                sqlx::query(
                    r#"
                    UPDATE fields SET
                        page_id = $1, label = $2, name = $3, field_type = $4,
                        placeholder = $5, help_text = $6, default_value = $7,
                        required = $8, validation = $9, options = $10,
                        conditions = $11, settings = $12, sort_order = $13
                    WHERE id = $14
                    "#,
                )
                .bind(field.page_id)
                .bind(&field.label)
                .bind(&field.name)
                .bind(field_type_name(field.field_type))
                .bind(&field.placeholder)
                .bind(&field.help_text)
                .bind(field.default_value.as_ref().map(Json))
                .bind(field.required)
                .bind(Json(&field.validation))
                .bind(Json(&field.options))
                .bind(Json(&field.conditions))
                .bind(Json(&field.settings))
                .bind(field.sort_order)
                .bind(field.id)
                .execute(&mut **tx)
                .await?;
            }
        }

        // Removals last, so fields moved off a removed page survive the cascade
        let kept_pages: Vec<i64> = draft.pages.iter().map(|p| ids.page(p.id)).collect();
        let kept_fields: Vec<i64> = draft
            .pages
            .iter()
            .flat_map(|p| p.fields.iter().map(|f| ids.field(f.id)))
            .collect();
        sqlx::query(
            r#"
            DELETE FROM fields
            WHERE page_id IN (SELECT id FROM pages WHERE form_id = $1)
              AND NOT (id = ANY($2))
            "#,
        )
        .bind(form_id)
        .bind(&kept_fields)
        .execute(&mut **tx)
        .await?;
        sqlx::query("DELETE FROM pages WHERE form_id = $1 AND NOT (id = ANY($2))")
            .bind(form_id)
            .bind(&kept_pages)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    async fn find_in_tx(tx: &mut Transaction<'_, Postgres>, slug: &str) -> RepoResult<Option<Form>> {
        let row = sqlx::query_as::<_, FormRow>("SELECT * FROM forms WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&mut **tx)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::load_form(tx, row).await?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl FormStore for PgStore {
    async fn find_by_slug(&self, slug: &str) -> RepoResult<Option<Form>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;
        let form = Self::find_in_tx(&mut tx, slug).await?;
        tx.commit().await?;
        Ok(form)
    }

    async fn list(&self) -> RepoResult<Vec<FormSummary>> {
        let rows = sqlx::query_as::<_, FormSummaryRow>(
            r#"
            SELECT f.id, f.name, f.slug, f.description, f.is_active,
                   (SELECT COUNT(*) FROM pages p WHERE p.form_id = f.id) AS page_count,
                   f.created_at, f.updated_at
            FROM forms f
            ORDER BY f.created_at DESC, f.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| FormSummary {
                id: row.id,
                name: row.name,
                slug: row.slug,
                description: row.description,
                is_active: row.is_active,
                page_count: row.page_count.max(0) as usize,
                created_at: row.created_at,
                updated_at: row.updated_at,
            })
            .collect())
    }

    async fn create(&self, draft: &FormDraft) -> RepoResult<Form> {
        let mut tx = self.pool.begin().await?;

        let form_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO forms (name, slug, description, settings, is_active, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.slug)
        .bind(&draft.description)
        .bind(Json(&draft.settings))
        .bind(draft.is_active)
        .bind(draft.owner_id)
        .fetch_one(&mut *tx)
        .await?;

        Self::write_pages(&mut tx, form_id, draft).await?;
        let form = Self::find_in_tx(&mut tx, &draft.slug)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(draft.slug.clone()))?;
        tx.commit().await?;
        Ok(form)
    }

    async fn update(&self, slug: &str, draft: &FormDraft) -> RepoResult<Form> {
        let mut tx = self.pool.begin().await?;

        let form_id: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE forms SET
                name = $1, slug = $2, description = $3, settings = $4,
                is_active = $5, owner_id = $6, updated_at = NOW()
            WHERE slug = $7
            RETURNING id
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.slug)
        .bind(&draft.description)
        .bind(Json(&draft.settings))
        .bind(draft.is_active)
        .bind(draft.owner_id)
        .bind(slug)
        .fetch_optional(&mut *tx)
        .await?;

        let form_id = form_id.ok_or_else(|| RepositoryError::NotFound(slug.to_string()))?;
        Self::write_pages(&mut tx, form_id, draft).await?;
        let form = Self::find_in_tx(&mut tx, &draft.slug)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(draft.slug.clone()))?;
        tx.commit().await?;
        Ok(form)
    }

    async fn delete(&self, slug: &str) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM forms WHERE slug = $1")
            .bind(slug)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(slug.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SubmissionSink for PgStore {
    async fn record(&self, submission: NewSubmission) -> RepoResult<Submission> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            r#"
            INSERT INTO submissions (id, form_id, data, ip_address, user_agent, status, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(submission.form_id)
        .bind(Json(&submission.data))
        .bind(&submission.ip_address)
        .bind(&submission.user_agent)
        .bind(SubmissionStatus::New.as_str())
        .bind(submission.submitted_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn list(&self, form_id: i64, page: i64, per_page: i64) -> RepoResult<(Vec<Submission>, i64)> {
        let offset = (page - 1).max(0) * per_page;

        let rows = sqlx::query_as::<_, SubmissionRow>(
            r#"
            SELECT * FROM submissions
            WHERE form_id = $1
            ORDER BY submitted_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(form_id)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM submissions WHERE form_id = $1")
            .bind(form_id)
            .fetch_one(&self.pool)
            .await?;

        Ok((rows.into_iter().map(Submission::from).collect(), total))
    }

    async fn update_status(
        &self,
        form_id: i64,
        id: Uuid,
        status: SubmissionStatus,
    ) -> RepoResult<Submission> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            r#"
            UPDATE submissions SET status = $1
            WHERE id = $2 AND form_id = $3
            RETURNING *
            "#,
        )
        .bind(status.as_str())
        .bind(id)
        .bind(form_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Submission::from)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }
}
