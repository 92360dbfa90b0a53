//! Submission normalization
//!
//! Every field name of the form appears in the normalized record, whether or not
//! the respondent reached its page. Metadata keys carry a `@` prefix, a character
//! field names cannot contain.

use crate::models::{AnswerMap, Form};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

/// Prefix reserved for metadata keys in normalized records
pub const META_PREFIX: &str = "@";
pub const META_SUBMITTED_AT: &str = "@submitted_at";
pub const META_IP_ADDRESS: &str = "@ip_address";
pub const META_USER_AGENT: &str = "@user_agent";

/// Request metadata recorded alongside the answers
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionMeta {
    pub submitted_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Field names across all pages in traversal order, first occurrence wins
pub fn field_names(form: &Form) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for field in form.fields() {
        if !names.contains(&field.name.as_str()) {
            names.push(&field.name);
        }
    }
    names
}

/// Column order of normalized records for `form`
pub fn record_columns(form: &Form) -> Vec<String> {
    field_names(form)
        .into_iter()
        .map(str::to_string)
        .chain(
            [META_SUBMITTED_AT, META_IP_ADDRESS, META_USER_AGENT]
                .into_iter()
                .map(str::to_string),
        )
        .collect()
}

/// Build the complete, stable-shape record for a raw answer map
pub fn normalize_submission(form: &Form, raw: &AnswerMap, meta: &SubmissionMeta) -> AnswerMap {
    let names = field_names(form);
    let mut record = AnswerMap::new();

    for name in &names {
        let value = raw.get(*name).cloned().unwrap_or(Value::Null);
        record.insert((*name).to_string(), value);
    }

    let dropped = raw
        .keys()
        .filter(|key| !names.contains(&key.as_str()))
        .count();
    if dropped > 0 {
        tracing::debug!(form_id = form.id, dropped, "Ignoring answers without a matching field");
    }

    record.insert(
        META_SUBMITTED_AT.to_string(),
        Value::String(meta.submitted_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    record.insert(
        META_IP_ADDRESS.to_string(),
        meta.ip_address.clone().map(Value::String).unwrap_or(Value::Null),
    );
    record.insert(
        META_USER_AGENT.to_string(),
        meta.user_agent.clone().map(Value::String).unwrap_or(Value::Null),
    );

    record
}

/// Reshape a stored record onto `columns`, so rows recorded before the form changed
/// line up with the current column list
pub fn project_record(columns: &[String], record: &AnswerMap) -> AnswerMap {
    columns
        .iter()
        .map(|column| {
            let value = record.get(column).cloned().unwrap_or(Value::Null);
            (column.clone(), value)
        })
        .collect()
}
