//! Data models for the application

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Accumulated field-name → value record built while a respondent moves through pages
pub type AnswerMap = Map<String, Value>;

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Email,
    Number,
    Phone,
    Textarea,
    Select,
    Radio,
    Checkbox,
    Date,
    File,
    Url,
}

impl FieldType {
    /// Types whose answers must come from the field's option list
    pub fn has_options(self) -> bool {
        matches!(self, FieldType::Select | FieldType::Radio | FieldType::Checkbox)
    }
}

/// Comparison operator of a [`Condition`].
///
/// Anything outside the known set deserializes to `Unknown`, which never matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    In,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    New,
    Read,
    Archived,
}

impl SubmissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::New => "new",
            SubmissionStatus::Read => "read",
            SubmissionStatus::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(SubmissionStatus::New),
            "read" => Some(SubmissionStatus::Read),
            "archived" => Some(SubmissionStatus::Archived),
            _ => None,
        }
    }
}

// =============================================================================
// Conditions
// =============================================================================

/// Predicate over the answer map, shared by page rules and field visibility rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    #[serde(default)]
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

/// One page-navigation rule. Offset addressing is relative to the page the rule
/// belongs to; id addressing names a page directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationRule {
    #[serde(flatten)]
    pub condition: Condition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_offset: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionalLogic {
    #[serde(default)]
    pub rules: Vec<NavigationRule>,
    /// Fallback when no rule matches; absent together with the id means "submit"
    #[serde(default)]
    pub default_next_page_offset: Option<i64>,
    #[serde(default)]
    pub default_next_page_id: Option<i64>,
}

// =============================================================================
// Form
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    /// Theme, notification and tracking settings; opaque to the engine
    #[serde(default)]
    pub settings: Map<String, Value>,
    pub is_active: bool,
    pub owner_id: Option<i64>,
    /// Sorted by `sort_order` ascending
    #[serde(default)]
    pub pages: Vec<Page>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Form {
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.pages.iter().flat_map(|page| page.fields.iter())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FormSummary {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub page_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Form> for FormSummary {
    fn from(form: &Form) -> Self {
        Self {
            id: form.id,
            name: form.name.clone(),
            slug: form.slug.clone(),
            description: form.description.clone(),
            is_active: form.is_active,
            page_count: form.pages.len(),
            created_at: form.created_at,
            updated_at: form.updated_at,
        }
    }
}

// =============================================================================
// Page
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    pub form_id: i64,
    pub title: String,
    pub description: Option<String>,
    /// 1-based position within the form
    pub sort_order: i32,
    #[serde(default)]
    pub settings: PageSettings,
    #[serde(default)]
    pub conditional_logic: Option<ConditionalLogic>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSettings {
    #[serde(default = "default_true")]
    pub show_progress_bar: bool,
    #[serde(default)]
    pub auto_advance: bool,
    #[serde(default)]
    pub button_label: Option<String>,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            show_progress_bar: true,
            auto_advance: false,
            button_label: None,
        }
    }
}

// =============================================================================
// Field
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub id: i64,
    pub page_id: i64,
    pub label: String,
    /// Answer-map key, unique within its page
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub placeholder: Option<String>,
    pub help_text: Option<String>,
    pub default_value: Option<Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub validation: Vec<String>,
    #[serde(default)]
    pub options: Vec<FieldOption>,
    /// Visibility rules; the field shows when any of them holds
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub settings: FieldSettings,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSettings {
    #[serde(default = "default_true")]
    pub show_label: bool,
    #[serde(default = "default_true")]
    pub show_placeholder: bool,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl Default for FieldSettings {
    fn default() -> Self {
        Self {
            show_label: true,
            show_placeholder: true,
            max_length: None,
            min: None,
            max: None,
        }
    }
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Submission
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub form_id: i64,
    /// Normalized record: every field name of the form plus metadata keys
    pub data: AnswerMap,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub form_id: i64,
    pub data: AnswerMap,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSubmission {
    #[serde(default)]
    pub answers: AnswerMap,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSubmissionStatus {
    pub status: SubmissionStatus,
}

#[derive(Debug, Serialize)]
pub struct SubmissionTable {
    /// Stable column order: field names in form order, then metadata keys
    pub columns: Vec<String>,
    pub rows: Vec<Submission>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

// =============================================================================
// Embed viewer requests
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct VisibilityRequest {
    pub page_index: usize,
    #[serde(default)]
    pub answers: AnswerMap,
}

#[derive(Debug, Clone, Serialize)]
pub struct VisibilityResponse {
    pub page_index: usize,
    pub visible_fields: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NextPageRequest {
    pub current_index: usize,
    #[serde(default)]
    pub answers: AnswerMap,
}

// =============================================================================
// API Responses
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            errors: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            errors: Vec::new(),
        }
    }

    pub fn field_errors(message: impl Into<String>, errors: Vec<FieldError>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            errors,
        }
    }
}

// =============================================================================
// Test fixtures
// =============================================================================
