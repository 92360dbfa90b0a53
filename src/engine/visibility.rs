//! Field visibility within a page

use super::condition::evaluate_condition;
use crate::models::{AnswerMap, Field, Page};

/// A field shows when it has no conditions or when any of its conditions holds
pub fn is_field_visible(field: &Field, answers: &AnswerMap) -> bool {
    field.conditions.is_empty()
        || field
            .conditions
            .iter()
            .any(|condition| evaluate_condition(condition, answers))
}

/// Fields of `page` that are currently visible, in page order
pub fn visible_fields<'a>(page: &'a Page, answers: &AnswerMap) -> Vec<&'a Field> {
    page.fields
        .iter()
        .filter(|field| is_field_visible(field, answers))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{branching_form, condition, field};
    use crate::models::{FieldType, Operator};
    use serde_json::json;

    #[test]
    fn test_unconditional_field_is_visible() {
        let f = field(1, 1, "name", FieldType::Text);
        assert!(is_field_visible(&f, &AnswerMap::new()));
    }

    #[test]
    fn test_any_condition_reveals_field() {
        let mut f = field(1, 1, "discount_code", FieldType::Text);
        f.conditions = vec![
            condition("plan_type", Operator::Equals, json!("premium")),
            condition("member", Operator::Equals, json!("yes")),
        ];
        let answers = json!({"plan_type": "basic", "member": "yes"});
        assert!(is_field_visible(&f, answers.as_object().unwrap()));

        let neither = json!({"plan_type": "basic", "member": "no"});
        assert!(!is_field_visible(&f, neither.as_object().unwrap()));
    }

    #[test]
    fn test_unknown_operator_keeps_field_hidden() {
        let mut f = field(1, 1, "secret", FieldType::Text);
        f.conditions = vec![condition("x", Operator::Unknown, json!("y"))];
        let answers = json!({"x": "y"});
        assert!(!is_field_visible(&f, answers.as_object().unwrap()));
    }

    #[test]
    fn test_visible_fields_of_plan_page() {
        let form = branching_form();
        let plan_page = &form.pages[2];

        let basic = json!({"plan_type": "basic"});
        let names: Vec<&str> = visible_fields(plan_page, basic.as_object().unwrap())
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["plan_type"]);

        let premium = json!({"plan_type": "premium"});
        let names: Vec<&str> = visible_fields(plan_page, premium.as_object().unwrap())
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["plan_type", "card_number"]);
    }
}
