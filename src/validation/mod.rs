//! Input validation module
//!
//! Two scopes: form definitions checked when the builder saves, and page answers
//! checked before navigation or submission. Answer checks only ever look at
//! fields that are currently visible.

use crate::builder::FormDraft;
use crate::engine::condition::{string_form, to_number};
use crate::engine::{visible_fields, FormGraph};
use crate::models::{AnswerMap, Field, FieldError, FieldType, Page};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;
use validator::Validate;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' is too long (max {max} characters)")]
    TooLong { field: String, max: usize },

    #[error("Field '{field}' is too short (min {min} characters)")]
    TooShort { field: String, min: usize },

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Invalid URL format")]
    InvalidUrl,

    #[error("Invalid slug format (must be lowercase alphanumeric with hyphens)")]
    InvalidSlug,

    #[error("Invalid form: {0}")]
    InvalidPayload(String),

    #[error("Invalid field name '{name}' (letters, digits and underscores only)")]
    InvalidFieldName { name: String },

    #[error("Field name '{name}' is used twice on page '{page}'")]
    DuplicateFieldName { page: String, name: String },

    #[error("Id {id} is used more than once")]
    DuplicateId { id: i64 },

    #[error("Field '{field}' needs at least one option")]
    MissingOptions { field: String },

    #[error("Condition refers to unknown field '{field}'")]
    UnknownConditionField { field: String },

    #[error("Navigation rule refers to unknown page id {id}")]
    UnknownPageReference { id: i64 },

    #[error("Navigation from page '{page}' can loop back to itself")]
    NavigationCycle { page: String },

    #[error("Must be a number")]
    NotANumber,

    #[error("Must be at least {min}")]
    BelowMinimum { min: f64 },

    #[error("Must be at most {max}")]
    AboveMaximum { max: f64 },

    #[error("Invalid date (expected YYYY-MM-DD)")]
    InvalidDate,

    #[error("Invalid phone number")]
    InvalidPhone,

    #[error("'{value}' is not one of the available options")]
    InvalidOption { value: String },

    #[error("Only letters and digits are allowed")]
    NotAlphaNumeric,
}

// =============================================================================
// Form definitions
// =============================================================================

/// Validate a builder draft before it is saved
pub fn validate_form_definition(draft: &FormDraft) -> Result<(), ValidationError> {
    draft
        .validate()
        .map_err(|e| ValidationError::InvalidPayload(e.to_string()))?;

    let mut page_ids = HashSet::new();
    let mut field_ids = HashSet::new();
    let mut all_names = HashSet::new();

    for page in &draft.pages {
        if page.title.len() > 255 {
            return Err(ValidationError::TooLong {
                field: "title".to_string(),
                max: 255,
            });
        }
        if !page_ids.insert(page.id) {
            return Err(ValidationError::DuplicateId { id: page.id });
        }

        let mut page_names = HashSet::new();
        for field in &page.fields {
            validate_field_name(&field.name)?;
            if !page_names.insert(field.name.as_str()) {
                return Err(ValidationError::DuplicateFieldName {
                    page: page.title.clone(),
                    name: field.name.clone(),
                });
            }
            if !field_ids.insert(field.id) {
                return Err(ValidationError::DuplicateId { id: field.id });
            }
            if field.field_type.has_options() && field.options.is_empty() {
                return Err(ValidationError::MissingOptions {
                    field: field.name.clone(),
                });
            }
            all_names.insert(field.name.as_str());
        }
    }

    for page in &draft.pages {
        for condition in page.fields.iter().flat_map(|f| f.conditions.iter()) {
            if !all_names.contains(condition.field.as_str()) {
                return Err(ValidationError::UnknownConditionField {
                    field: condition.field.clone(),
                });
            }
        }

        let Some(logic) = &page.conditional_logic else {
            continue;
        };
        for rule in &logic.rules {
            if !all_names.contains(rule.condition.field.as_str()) {
                return Err(ValidationError::UnknownConditionField {
                    field: rule.condition.field.clone(),
                });
            }
            if let (None, Some(id)) = (rule.next_page_offset, rule.next_page_id) {
                if !page_ids.contains(&id) {
                    return Err(ValidationError::UnknownPageReference { id });
                }
            }
        }
        if let (None, Some(id)) = (logic.default_next_page_offset, logic.default_next_page_id) {
            if !page_ids.contains(&id) {
                return Err(ValidationError::UnknownPageReference { id });
            }
        }
    }

    let ids: Vec<i64> = draft.pages.iter().map(|p| p.id).collect();
    let graph = FormGraph::compile(
        draft
            .pages
            .iter()
            .map(|p| (p.id, p.conditional_logic.as_ref())),
        &ids,
    );
    if let Some(cycle) = graph.find_cycle() {
        let page = cycle
            .first()
            .and_then(|&index| draft.pages.get(index))
            .map(|p| p.title.clone())
            .unwrap_or_default();
        return Err(ValidationError::NavigationCycle { page });
    }

    Ok(())
}

/// Field names double as answer-map keys: `[a-zA-Z0-9_]+`
pub fn validate_field_name(name: &str) -> Result<(), ValidationError> {
    let is_valid = !name.is_empty()
        && name.len() <= 64
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !is_valid {
        return Err(ValidationError::InvalidFieldName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Validate slug format
pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if slug.is_empty() || slug.len() > 50 {
        return Err(ValidationError::InvalidSlug);
    }

    // Must match pattern: lowercase letters, numbers, and hyphens
    let is_valid = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if !is_valid || slug.starts_with('-') || slug.ends_with('-') {
        return Err(ValidationError::InvalidSlug);
    }

    Ok(())
}

// =============================================================================
// Page answers
// =============================================================================

/// Validate the visible fields of `page`; hidden fields are exempt even when required
pub fn validate_page_answers(page: &Page, answers: &AnswerMap) -> Result<(), Vec<FieldError>> {
    let errors: Vec<FieldError> = visible_fields(page, answers)
        .into_iter()
        .filter_map(|field| {
            validate_answer(field, answers.get(&field.name))
                .err()
                .map(|e| FieldError {
                    field: field.name.clone(),
                    message: e.to_string(),
                })
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate one answer against its field definition
pub fn validate_answer(field: &Field, value: Option<&Value>) -> Result<(), ValidationError> {
    let Some(value) = value.filter(|v| !is_empty_answer(v)) else {
        if field.required {
            return Err(ValidationError::Required {
                field: field.name.clone(),
            });
        }
        return Ok(());
    };

    match field.field_type {
        FieldType::Email => {
            if !is_valid_email(&string_form(value)) {
                return Err(ValidationError::InvalidEmail);
            }
        }
        FieldType::Url => validate_url(&string_form(value))?,
        FieldType::Number => validate_number(value, field.settings.min, field.settings.max)?,
        FieldType::Phone => {
            if !is_valid_phone(&string_form(value)) {
                return Err(ValidationError::InvalidPhone);
            }
        }
        FieldType::Date => {
            chrono::NaiveDate::parse_from_str(&string_form(value), "%Y-%m-%d")
                .map_err(|_| ValidationError::InvalidDate)?;
        }
        FieldType::Select | FieldType::Radio => validate_option(field, value)?,
        FieldType::Checkbox => match value {
            Value::Array(items) => {
                for item in items {
                    validate_option(field, item)?;
                }
            }
            single => validate_option(field, single)?,
        },
        FieldType::Text | FieldType::Textarea | FieldType::File => {}
    }

    if let Some(max) = field.settings.max_length {
        if value.is_string() && string_form(value).chars().count() > max {
            return Err(ValidationError::TooLong {
                field: field.name.clone(),
                max,
            });
        }
    }

    for rule in &field.validation {
        apply_rule(field, rule, value)?;
    }

    Ok(())
}

/// Null, blank strings and empty arrays count as unanswered
fn is_empty_answer(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn apply_rule(field: &Field, rule: &str, value: &Value) -> Result<(), ValidationError> {
    let (name, argument) = match rule.split_once(':') {
        Some((name, argument)) => (name.trim(), Some(argument.trim())),
        None => (rule.trim(), None),
    };
    let bound = argument.and_then(|a| a.parse::<f64>().ok());

    match (name, bound) {
        ("email", _) => {
            if !is_valid_email(&string_form(value)) {
                return Err(ValidationError::InvalidEmail);
            }
        }
        ("url", _) => validate_url(&string_form(value))?,
        ("numeric", _) => validate_number(value, None, None)?,
        ("alpha_num", _) => {
            if !string_form(value).chars().all(|c| c.is_alphanumeric()) {
                return Err(ValidationError::NotAlphaNumeric);
            }
        }
        ("min", Some(min)) if field.field_type == FieldType::Number => {
            validate_number(value, Some(min), None)?
        }
        ("max", Some(max)) if field.field_type == FieldType::Number => {
            validate_number(value, None, Some(max))?
        }
        ("min", Some(min)) => {
            if (string_form(value).chars().count() as f64) < min {
                return Err(ValidationError::TooShort {
                    field: field.name.clone(),
                    min: min as usize,
                });
            }
        }
        ("max", Some(max)) => {
            if (string_form(value).chars().count() as f64) > max {
                return Err(ValidationError::TooLong {
                    field: field.name.clone(),
                    max: max as usize,
                });
            }
        }
        _ => tracing::debug!(rule, field = %field.name, "Ignoring unsupported validation rule"),
    }

    Ok(())
}

fn validate_number(value: &Value, min: Option<f64>, max: Option<f64>) -> Result<(), ValidationError> {
    let number = to_number(value)
        .filter(|_| !value.is_boolean())
        .ok_or(ValidationError::NotANumber)?;

    if let Some(min) = min {
        if number < min {
            return Err(ValidationError::BelowMinimum { min });
        }
    }
    if let Some(max) = max {
        if number > max {
            return Err(ValidationError::AboveMaximum { max });
        }
    }
    Ok(())
}

fn validate_option(field: &Field, value: &Value) -> Result<(), ValidationError> {
    let candidate = string_form(value);
    if field.options.iter().any(|o| o.value == candidate) {
        Ok(())
    } else {
        Err(ValidationError::InvalidOption { value: candidate })
    }
}

fn validate_url(url: &str) -> Result<(), ValidationError> {
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(ValidationError::InvalidUrl);
    }
    if url.len() > 2048 {
        return Err(ValidationError::TooLong {
            field: "url".to_string(),
            max: 2048,
        });
    }
    Ok(())
}

fn is_valid_phone(phone: &str) -> bool {
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'));
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    allowed && (6..=20).contains(&digits)
}

/// Simple email validation
fn is_valid_email(email: &str) -> bool {
    // Basic check: contains @ and at least one .
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    let (local, domain) = (parts[0], parts[1]);

    !local.is_empty() && !domain.is_empty() && domain.contains('.') && domain.len() > 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{branching_form, condition, field, options};
    use crate::models::{NavigationRule, Operator};
    use serde_json::json;

    fn draft() -> FormDraft {
        let mut draft = FormDraft::from_form(&branching_form());
        draft.assign_temporary_ids();
        draft
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("test@example.com"));
        assert!(is_valid_email("user.name@domain.nl"));
        assert!(!is_valid_email("invalid"));
        assert!(!is_valid_email("@domain.com"));
        assert!(!is_valid_email("user@"));
    }

    #[test]
    fn test_slug_validation() {
        assert!(validate_slug("contact-us-2024").is_ok());
        assert!(validate_slug("membership").is_ok());
        assert!(validate_slug("-invalid").is_err());
        assert!(validate_slug("UPPERCASE").is_err());
        assert!(validate_slug("").is_err());
    }

    #[test]
    fn test_field_name_validation() {
        assert!(validate_field_name("age_group").is_ok());
        assert!(validate_field_name("Q1").is_ok());
        assert!(validate_field_name("").is_err());
        assert!(validate_field_name("first name").is_err());
        assert!(validate_field_name("@ip_address").is_err());
    }

    #[test]
    fn test_valid_definition() {
        assert!(validate_form_definition(&draft()).is_ok());
    }

    #[test]
    fn test_definition_rejects_bad_slug() {
        let mut draft = draft();
        draft.slug = "Bad Slug".to_string();
        assert!(matches!(
            validate_form_definition(&draft),
            Err(ValidationError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_definition_rejects_duplicate_field_name() {
        let mut draft = draft();
        let mut copy = draft.pages[2].fields[0].clone();
        copy.id = -50;
        draft.pages[2].fields.push(copy);
        assert!(matches!(
            validate_form_definition(&draft),
            Err(ValidationError::DuplicateFieldName { .. })
        ));
    }

    #[test]
    fn test_same_field_name_on_different_pages_is_allowed() {
        let mut draft = draft();
        let mut copy = draft.pages[2].fields[0].clone();
        copy.id = -50;
        draft.pages[1].fields.push(copy);
        assert!(validate_form_definition(&draft).is_ok());
    }

    #[test]
    fn test_definition_rejects_shared_ids() {
        let mut draft = draft();
        draft.pages[0].id = 0;
        draft.pages[1].id = 0;
        assert_eq!(
            validate_form_definition(&draft),
            Err(ValidationError::DuplicateId { id: 0 })
        );

        let mut draft = self::draft();
        draft.pages[2].fields[1].id = draft.pages[2].fields[0].id;
        assert!(matches!(
            validate_form_definition(&draft),
            Err(ValidationError::DuplicateId { .. })
        ));
    }

    #[test]
    fn test_definition_rejects_missing_options() {
        let mut draft = draft();
        draft.pages[0].fields[0].options.clear();
        assert_eq!(
            validate_form_definition(&draft),
            Err(ValidationError::MissingOptions {
                field: "age_group".to_string()
            })
        );
    }

    #[test]
    fn test_definition_rejects_unknown_condition_field() {
        let mut draft = draft();
        draft.pages[2].fields[1].conditions = vec![condition("nope", Operator::Equals, json!(1))];
        assert_eq!(
            validate_form_definition(&draft),
            Err(ValidationError::UnknownConditionField {
                field: "nope".to_string()
            })
        );
    }

    #[test]
    fn test_definition_rejects_unknown_page_reference() {
        let mut draft = draft();
        if let Some(logic) = draft.pages[0].conditional_logic.as_mut() {
            logic.rules.push(NavigationRule {
                condition: condition("age_group", Operator::Equals, json!("x")),
                next_page_offset: None,
                next_page_id: Some(4242),
            });
        }
        assert_eq!(
            validate_form_definition(&draft),
            Err(ValidationError::UnknownPageReference { id: 4242 })
        );
    }

    #[test]
    fn test_definition_rejects_cycle() {
        let mut draft = draft();
        let first_id = draft.pages[0].id;
        draft.pages[2].conditional_logic = Some(crate::models::ConditionalLogic {
            rules: vec![NavigationRule {
                condition: condition("plan_type", Operator::Equals, json!("basic")),
                next_page_offset: None,
                next_page_id: Some(first_id),
            }],
            default_next_page_offset: None,
            default_next_page_id: None,
        });
        assert!(matches!(
            validate_form_definition(&draft),
            Err(ValidationError::NavigationCycle { .. })
        ));
    }

    #[test]
    fn test_hidden_required_field_is_exempt() {
        let form = branching_form();
        let answers = json!({"plan_type": "basic"});
        assert!(validate_page_answers(&form.pages[2], answers.as_object().unwrap()).is_ok());
    }

    #[test]
    fn test_visible_required_field_is_enforced() {
        let form = branching_form();
        let answers = json!({"plan_type": "premium", "card_number": "  "});
        let errors = validate_page_answers(&form.pages[2], answers.as_object().unwrap()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "card_number");
        assert_eq!(errors[0].message, "Field 'card_number' is required");
    }

    #[test]
    fn test_all_errors_are_collected() {
        let form = branching_form();
        let answers = json!({"plan_type": "gold"});
        let errors = validate_page_answers(&form.pages[2], answers.as_object().unwrap()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "'gold' is not one of the available options");

        let errors = validate_page_answers(&form.pages[2], &AnswerMap::new()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "plan_type");
    }

    #[test]
    fn test_number_bounds() {
        let mut f = field(1, 1, "age", FieldType::Number);
        f.settings.min = Some(18.0);
        f.settings.max = Some(120.0);
        assert!(validate_answer(&f, Some(&json!("42"))).is_ok());
        assert_eq!(
            validate_answer(&f, Some(&json!(12))),
            Err(ValidationError::BelowMinimum { min: 18.0 })
        );
        assert_eq!(
            validate_answer(&f, Some(&json!(121))),
            Err(ValidationError::AboveMaximum { max: 120.0 })
        );
        assert_eq!(
            validate_answer(&f, Some(&json!("old"))),
            Err(ValidationError::NotANumber)
        );
        assert_eq!(
            validate_answer(&f, Some(&json!(true))),
            Err(ValidationError::NotANumber)
        );
    }

    #[test]
    fn test_optional_empty_answer_is_ok() {
        let f = field(1, 1, "website", FieldType::Url);
        assert!(validate_answer(&f, None).is_ok());
        assert!(validate_answer(&f, Some(&json!(""))).is_ok());
        assert_eq!(
            validate_answer(&f, Some(&json!("example.com"))),
            Err(ValidationError::InvalidUrl)
        );
    }

    #[test]
    fn test_typed_answers() {
        let email = field(1, 1, "email", FieldType::Email);
        assert!(validate_answer(&email, Some(&json!("a@b.nl"))).is_ok());
        assert_eq!(
            validate_answer(&email, Some(&json!("nope"))),
            Err(ValidationError::InvalidEmail)
        );

        let date = field(2, 1, "born", FieldType::Date);
        assert!(validate_answer(&date, Some(&json!("1990-02-28"))).is_ok());
        assert_eq!(
            validate_answer(&date, Some(&json!("28/02/1990"))),
            Err(ValidationError::InvalidDate)
        );

        let phone = field(3, 1, "phone", FieldType::Phone);
        assert!(validate_answer(&phone, Some(&json!("+31 (0)20-1234567"))).is_ok());
        assert_eq!(
            validate_answer(&phone, Some(&json!("call me"))),
            Err(ValidationError::InvalidPhone)
        );
    }

    #[test]
    fn test_checkbox_values_must_be_options() {
        let mut f = field(1, 1, "toppings", FieldType::Checkbox);
        f.options = options(&["ham", "cheese"]);
        f.required = true;
        assert!(validate_answer(&f, Some(&json!(["ham", "cheese"]))).is_ok());
        assert_eq!(
            validate_answer(&f, Some(&json!(["ham", "olives"]))),
            Err(ValidationError::InvalidOption {
                value: "olives".to_string()
            })
        );
        assert_eq!(
            validate_answer(&f, Some(&json!([]))),
            Err(ValidationError::Required {
                field: "toppings".to_string()
            })
        );
    }

    #[test]
    fn test_max_length_setting() {
        let mut f = field(1, 1, "nickname", FieldType::Text);
        f.settings.max_length = Some(5);
        assert!(validate_answer(&f, Some(&json!("short"))).is_ok());
        assert!(matches!(
            validate_answer(&f, Some(&json!("too long"))),
            Err(ValidationError::TooLong { max: 5, .. })
        ));
    }

    #[test]
    fn test_validation_rule_list() {
        let mut f = field(1, 1, "code", FieldType::Text);
        f.validation = vec!["alpha_num".to_string(), "min:3".to_string(), "max:6".to_string()];
        assert!(validate_answer(&f, Some(&json!("abc123"))).is_ok());
        assert_eq!(
            validate_answer(&f, Some(&json!("ab-1"))),
            Err(ValidationError::NotAlphaNumeric)
        );
        assert!(matches!(
            validate_answer(&f, Some(&json!("ab"))),
            Err(ValidationError::TooShort { min: 3, .. })
        ));
        assert!(matches!(
            validate_answer(&f, Some(&json!("abcdefg"))),
            Err(ValidationError::TooLong { max: 6, .. })
        ));

        let mut n = field(2, 1, "qty", FieldType::Number);
        n.validation = vec!["min:1".to_string(), "unknown_rule".to_string()];
        assert!(validate_answer(&n, Some(&json!(3))).is_ok());
        assert_eq!(
            validate_answer(&n, Some(&json!(0))),
            Err(ValidationError::BelowMinimum { min: 1.0 })
        );
    }
}
