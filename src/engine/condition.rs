//! Condition evaluation against the live answer map
//!
//! Evaluation never fails: missing answers read as null, unknown operators and
//! non-numeric comparisons evaluate to `false`.

use crate::models::{AnswerMap, Condition, Operator};
use serde_json::Value;

/// Evaluate one condition against the current answers
pub fn evaluate_condition(condition: &Condition, answers: &AnswerMap) -> bool {
    let answer = answers.get(&condition.field).unwrap_or(&Value::Null);

    match condition.operator {
        Operator::Equals => equals(answer, &condition.value),
        Operator::NotEquals => !equals(answer, &condition.value),
        Operator::Contains => contains(answer, &condition.value),
        Operator::GreaterThan => compare(answer, &condition.value, |a, b| a > b),
        Operator::LessThan => compare(answer, &condition.value, |a, b| a < b),
        Operator::In => within(answer, &condition.value),
        Operator::Unknown => {
            tracing::debug!(field = %condition.field, "Unknown condition operator, failing closed");
            false
        }
    }
}

/// Equality with multi-value answers treated as membership
fn equals(answer: &Value, expected: &Value) -> bool {
    match answer {
        Value::Array(items) => items.iter().any(|item| loose_eq(item, expected)),
        _ => loose_eq(answer, expected),
    }
}

fn contains(answer: &Value, needle: &Value) -> bool {
    if answer.is_null() {
        return false;
    }
    string_form(answer).contains(&string_form(needle))
}

fn compare(answer: &Value, expected: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (to_number(answer), to_number(expected)) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

fn within(answer: &Value, collection: &Value) -> bool {
    let Value::Array(candidates) = collection else {
        return false;
    };

    match answer {
        Value::Null => false,
        Value::Array(items) => items
            .iter()
            .any(|item| candidates.iter().any(|c| loose_eq(item, c))),
        scalar => candidates.iter().any(|c| loose_eq(scalar, c)),
    }
}

/// Loose equality: null only equals null, numbers compare numerically when both
/// sides are numeric, everything else compares by string form.
pub(crate) fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(_), _) | (_, Value::Number(_)) => match (to_number(left), to_number(right)) {
            (Some(a), Some(b)) => a == b,
            _ => string_form(left) == string_form(right),
        },
        _ => string_form(left) == string_form(right),
    }
}

/// String form of an answer; arrays join their items with commas
pub(crate) fn string_form(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(string_form).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// Numeric coercion; `None` stands in for NaN. Infinities are not numbers here,
/// so free text such as `"inf"` never passes an ordering comparison.
pub(crate) fn to_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    };
    number.filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::condition;
    use serde_json::json;

    fn answers(value: Value) -> AnswerMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("answers must be an object"),
        }
    }

    #[test]
    fn test_equals_scalar() {
        let cond = condition("plan_type", Operator::Equals, json!("premium"));
        assert!(evaluate_condition(&cond, &answers(json!({"plan_type": "premium"}))));
        assert!(!evaluate_condition(&cond, &answers(json!({"plan_type": "basic"}))));
    }

    #[test]
    fn test_equals_loose_number_and_string() {
        let cond = condition("count", Operator::Equals, json!(3));
        assert!(evaluate_condition(&cond, &answers(json!({"count": "3"}))));
        assert!(evaluate_condition(&cond, &answers(json!({"count": "3.0"}))));
        assert!(!evaluate_condition(&cond, &answers(json!({"count": "three"}))));
    }

    #[test]
    fn test_equals_bool_against_string() {
        let cond = condition("agree", Operator::Equals, json!("true"));
        assert!(evaluate_condition(&cond, &answers(json!({"agree": true}))));
    }

    #[test]
    fn test_equals_array_answer_is_membership() {
        let cond = condition("toppings", Operator::Equals, json!("cheese"));
        assert!(evaluate_condition(
            &cond,
            &answers(json!({"toppings": ["ham", "cheese"]}))
        ));
        assert!(!evaluate_condition(&cond, &answers(json!({"toppings": ["ham"]}))));
    }

    #[test]
    fn test_not_equals_mirrors_equals() {
        let cond = condition("toppings", Operator::NotEquals, json!("cheese"));
        assert!(!evaluate_condition(
            &cond,
            &answers(json!({"toppings": ["ham", "cheese"]}))
        ));
        assert!(evaluate_condition(&cond, &answers(json!({"toppings": ["ham"]}))));
    }

    #[test]
    fn test_missing_answer_is_null() {
        let empty = AnswerMap::new();
        assert!(!evaluate_condition(
            &condition("x", Operator::Equals, json!("a")),
            &empty
        ));
        assert!(evaluate_condition(
            &condition("x", Operator::NotEquals, json!("a")),
            &empty
        ));
        assert!(!evaluate_condition(
            &condition("x", Operator::Contains, json!("")),
            &empty
        ));
        assert!(!evaluate_condition(
            &condition("x", Operator::GreaterThan, json!(0)),
            &empty
        ));
        assert!(!evaluate_condition(
            &condition("x", Operator::In, json!(["a"])),
            &empty
        ));
    }

    #[test]
    fn test_null_equals_null() {
        let cond = condition("x", Operator::Equals, Value::Null);
        assert!(evaluate_condition(&cond, &AnswerMap::new()));
    }

    #[test]
    fn test_contains_uses_string_form() {
        let cond = condition("comment", Operator::Contains, json!("urgent"));
        assert!(evaluate_condition(
            &cond,
            &answers(json!({"comment": "this is urgent!"}))
        ));
        assert!(!evaluate_condition(&cond, &answers(json!({"comment": "later"}))));

        let numeric = condition("zip", Operator::Contains, json!(12));
        assert!(evaluate_condition(&numeric, &answers(json!({"zip": 51234}))));
    }

    #[test]
    fn test_contains_on_array_answer() {
        let cond = condition("tags", Operator::Contains, json!("b,c"));
        assert!(evaluate_condition(&cond, &answers(json!({"tags": ["a", "b", "c"]}))));
    }

    #[test]
    fn test_numeric_comparisons() {
        let gt = condition("age", Operator::GreaterThan, json!(17));
        let lt = condition("age", Operator::LessThan, json!("18"));
        let adult = answers(json!({"age": "30"}));
        let minor = answers(json!({"age": 12}));
        assert!(evaluate_condition(&gt, &adult));
        assert!(!evaluate_condition(&lt, &adult));
        assert!(!evaluate_condition(&gt, &minor));
        assert!(evaluate_condition(&lt, &minor));
    }

    #[test]
    fn test_non_numeric_comparison_is_false() {
        let gt = condition("age", Operator::GreaterThan, json!(1));
        let lt = condition("age", Operator::LessThan, json!(1));
        for value in [
            json!("abc"),
            json!(""),
            json!(["5"]),
            json!({"a": 1}),
            json!("inf"),
            json!("infinity"),
            json!("+Infinity"),
            json!("-inf"),
            json!("NaN"),
            json!("1e400"),
        ] {
            let map = answers(json!({ "age": value }));
            assert!(!evaluate_condition(&gt, &map));
            assert!(!evaluate_condition(&lt, &map));
        }
        let bad_expected = condition("age", Operator::GreaterThan, json!("n/a"));
        assert!(!evaluate_condition(&bad_expected, &answers(json!({"age": 5}))));
    }

    #[test]
    fn test_in_requires_collection() {
        let cond = condition("country", Operator::In, json!(["NL", "BE"]));
        assert!(evaluate_condition(&cond, &answers(json!({"country": "NL"}))));
        assert!(!evaluate_condition(&cond, &answers(json!({"country": "DE"}))));

        let scalar = condition("country", Operator::In, json!("NL"));
        assert!(!evaluate_condition(&scalar, &answers(json!({"country": "NL"}))));
    }

    #[test]
    fn test_in_with_array_answer() {
        let cond = condition("langs", Operator::In, json!(["rust", "go"]));
        assert!(evaluate_condition(&cond, &answers(json!({"langs": ["php", "go"]}))));
        assert!(!evaluate_condition(&cond, &answers(json!({"langs": ["php"]}))));
    }

    #[test]
    fn test_unknown_operator_fails_closed() {
        let cond = condition("x", Operator::Unknown, json!("a"));
        assert!(!evaluate_condition(&cond, &answers(json!({"x": "a"}))));
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let cond = condition("age", Operator::GreaterThan, json!(17));
        let map = answers(json!({"age": 20}));
        let first = evaluate_condition(&cond, &map);
        for _ in 0..10 {
            assert_eq!(evaluate_condition(&cond, &map), first);
        }
    }
}
