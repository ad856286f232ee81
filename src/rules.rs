//! Field-level validation rules and their evaluation.
//!
//! Rules are pure data derived from resolved schema nodes. Evaluation
//! always recovers failures as structured error strings; nothing in this
//! module returns `Err` or panics on bad input.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::assemble::ValueEntry;
use crate::node::{Constraints, Kind, SchemaNode};

const REQUIRED_MESSAGE: &str = "This field is required";

/// Outcome of validating one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldCheck {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl FieldCheck {
    pub fn ok() -> Self {
        FieldCheck {
            valid: true,
            errors: Vec::new(),
        }
    }
}

/// Constraint set for one input field, derived 1:1 from its descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationRule {
    pub required: bool,
    pub kind: Kind,
    pub constraints: Constraints,
    /// Enum literals the value must equal (string equality).
    pub allowed: Vec<Value>,
    pub format: Option<String>,
}

impl ValidationRule {
    pub fn from_node(node: &SchemaNode, required: bool) -> Self {
        ValidationRule {
            required,
            kind: node.kind,
            constraints: node.constraints.clone(),
            allowed: node.enum_values.clone(),
            format: node.format.clone(),
        }
    }

    /// Run every applicable check and report all failures, not just the first.
    ///
    /// `None` means no value was collected for the field; it is treated the
    /// same as null or an empty string.
    pub fn check(&self, value: Option<&Value>) -> FieldCheck {
        let mut errors = Vec::new();
        match value {
            None | Some(Value::Null) => {
                if self.required {
                    errors.push(REQUIRED_MESSAGE.to_string());
                }
            }
            Some(Value::String(s)) if s.is_empty() => {
                if self.required {
                    errors.push(REQUIRED_MESSAGE.to_string());
                }
            }
            Some(value) => {
                self.check_type(value, &mut errors);
                self.check_range(value, &mut errors);
                self.check_length(value, &mut errors);
                self.check_pattern(value, &mut errors);
                self.check_enum(value, &mut errors);
                self.check_format(value, &mut errors);
            }
        }
        FieldCheck {
            valid: errors.is_empty(),
            errors,
        }
    }

    fn check_type(&self, value: &Value, errors: &mut Vec<String>) {
        match self.kind {
            Kind::Integer => {
                if !numeric_value(value).is_some_and(|n| n.fract() == 0.0) {
                    errors.push("must be an integer".to_string());
                }
            }
            Kind::Number => {
                if numeric_value(value).is_none() {
                    errors.push("must be a number".to_string());
                }
            }
            _ => {}
        }
    }

    fn check_range(&self, value: &Value, errors: &mut Vec<String>) {
        let Some(number) = numeric_value(value) else {
            return;
        };
        if let Some(min) = self.constraints.minimum {
            if number < min {
                errors.push(format!("must be at least {}", display_number(min)));
            }
        }
        if let Some(max) = self.constraints.maximum {
            if number > max {
                errors.push(format!("must be at most {}", display_number(max)));
            }
        }
    }

    fn check_length(&self, value: &Value, errors: &mut Vec<String>) {
        let Some(text) = value.as_str() else {
            return;
        };
        let length = text.chars().count() as u64;
        if let Some(min) = self.constraints.min_length {
            if length < min {
                errors.push(format!("must be at least {} characters", min));
            }
        }
        if let Some(max) = self.constraints.max_length {
            if length > max {
                errors.push(format!("must be at most {} characters", max));
            }
        }
    }

    fn check_pattern(&self, value: &Value, errors: &mut Vec<String>) {
        let (Some(pattern), Some(text)) = (self.constraints.pattern.as_deref(), value.as_str())
        else {
            return;
        };
        // Schema-supplied pattern is used verbatim, not anchored.
        match Regex::new(pattern) {
            Ok(re) => {
                if !re.is_match(text) {
                    errors.push("does not match the required pattern".to_string());
                }
            }
            Err(_) => {
                // Malformed schema pattern: skip the check rather than fail.
                debug!(pattern, "invalid pattern in schema, skipping check");
            }
        }
    }

    fn check_enum(&self, value: &Value, errors: &mut Vec<String>) {
        if self.allowed.is_empty() {
            return;
        }
        let candidate = literal_text(value);
        if !self.allowed.iter().any(|v| literal_text(v) == candidate) {
            let listed: Vec<String> = self.allowed.iter().map(|v| literal_text(v)).collect();
            errors.push(format!("must be one of: {}", listed.join(", ")));
        }
    }

    fn check_format(&self, value: &Value, errors: &mut Vec<String>) {
        let (Some(format), Some(text)) = (self.format.as_deref(), value.as_str()) else {
            return;
        };
        let ok = match format {
            "email" => is_email(text),
            "uri" | "url" => url::Url::parse(text).is_ok(),
            "uuid" => is_uuid(text),
            "date" => is_date(text),
            "date-time" => is_date_time(text),
            // Unknown formats are not enforced.
            _ => true,
        };
        if !ok {
            errors.push(match format {
                "email" => "must be a valid email address".to_string(),
                "uri" | "url" => "must be a valid URI".to_string(),
                "uuid" => "must be a valid UUID".to_string(),
                "date" => "must be a valid date (YYYY-MM-DD)".to_string(),
                _ => "must be a valid date-time".to_string(),
            });
        }
    }
}

/// Validation rules registered per field path for one selected operation.
///
/// Built alongside the field descriptors and discarded with them when the
/// selection changes.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: BTreeMap<String, ValidationRule>,
}

impl RuleSet {
    pub fn insert(&mut self, path: impl Into<String>, rule: ValidationRule) {
        self.rules.insert(path.into(), rule);
    }

    pub fn get(&self, path: &str) -> Option<&ValidationRule> {
        self.rules.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Validate one field. Paths with no registered rule pass trivially.
    pub fn validate(&self, path: &str, value: Option<&Value>) -> FieldCheck {
        match self.rules.get(path) {
            Some(rule) => rule.check(value),
            None => FieldCheck::ok(),
        }
    }

    /// Re-run per-field validation for every registered path.
    ///
    /// Paths with no matching entry are checked as empty. The form is valid
    /// iff the returned map is empty.
    pub fn validate_all(&self, entries: &[ValueEntry]) -> BTreeMap<String, Vec<String>> {
        let mut failures = BTreeMap::new();
        for (path, rule) in &self.rules {
            let value = entries
                .iter()
                .find(|entry| &entry.path == path)
                .map(|entry| &entry.value);
            let check = rule.check(value);
            if !check.valid {
                failures.insert(path.clone(), check.errors);
            }
        }
        failures
    }
}

/// Numeric interpretation of a candidate value: JSON numbers directly,
/// strings via parsing. Non-finite results are rejected.
fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// String form of a literal for enum comparison.
fn literal_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn display_number(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

/// local@domain with at least one dot inside the domain.
fn is_email(text: &str) -> bool {
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@')
}

/// Canonical 8-4-4-4-12 hex grouping.
fn is_uuid(text: &str) -> bool {
    let groups: Vec<&str> = text.split('-').collect();
    let lengths = [8, 4, 4, 4, 12];
    groups.len() == lengths.len()
        && groups.iter().zip(lengths).all(|(group, len)| {
            group.len() == len && group.chars().all(|c| c.is_ascii_hexdigit())
        })
}

/// `YYYY-MM-DD`, calendar-valid.
fn is_date(text: &str) -> bool {
    text.len() == 10 && NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
}

/// ISO-8601 (RFC 3339) or the truncated minute-precision form, calendar-valid.
fn is_date_time(text: &str) -> bool {
    DateTime::parse_from_rfc3339(text).is_ok()
        || NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(kind: Kind) -> ValidationRule {
        ValidationRule {
            kind,
            ..ValidationRule::default()
        }
    }

    fn string_rule_with_format(format: &str) -> ValidationRule {
        ValidationRule {
            kind: Kind::String,
            format: Some(format.to_string()),
            ..ValidationRule::default()
        }
    }

    // === Required / empty ===

    #[test]
    fn required_missing_value() {
        let rule = ValidationRule {
            required: true,
            kind: Kind::String,
            ..ValidationRule::default()
        };
        let check = rule.check(None);
        assert!(!check.valid);
        assert_eq!(check.errors, vec![REQUIRED_MESSAGE.to_string()]);
    }

    #[test]
    fn required_empty_string_and_null() {
        let rule = ValidationRule {
            required: true,
            ..ValidationRule::default()
        };
        assert!(!rule.check(Some(&json!(""))).valid);
        assert!(!rule.check(Some(&json!(null))).valid);
    }

    #[test]
    fn optional_empty_is_valid() {
        let rule = ValidationRule::default();
        assert!(rule.check(None).valid);
        assert!(rule.check(Some(&json!(""))).valid);
    }

    #[test]
    fn empty_value_skips_other_checks() {
        // Empty but optional: no type error for the empty string.
        let rule = rule(Kind::Integer);
        assert!(rule.check(Some(&json!(""))).valid);
    }

    // === Type checks ===

    #[test]
    fn integer_rejects_text() {
        let check = rule(Kind::Integer).check(Some(&json!("abc")));
        assert!(!check.valid);
        assert_eq!(check.errors, vec!["must be an integer".to_string()]);
    }

    #[test]
    fn integer_rejects_fractional() {
        assert!(!rule(Kind::Integer).check(Some(&json!("5.5"))).valid);
        assert!(!rule(Kind::Integer).check(Some(&json!(5.5))).valid);
    }

    #[test]
    fn integer_accepts_whole_numbers() {
        assert!(rule(Kind::Integer).check(Some(&json!(7))).valid);
        assert!(rule(Kind::Integer).check(Some(&json!("7"))).valid);
    }

    #[test]
    fn number_rejects_text_accepts_decimal() {
        let check = rule(Kind::Number).check(Some(&json!("x")));
        assert_eq!(check.errors, vec!["must be a number".to_string()]);
        assert!(rule(Kind::Number).check(Some(&json!("3.14"))).valid);
    }

    // === Range ===

    #[test]
    fn minimum_violation() {
        let rule = ValidationRule {
            kind: Kind::Integer,
            constraints: Constraints {
                minimum: Some(10.0),
                ..Constraints::default()
            },
            ..ValidationRule::default()
        };
        let check = rule.check(Some(&json!(5)));
        assert!(!check.valid);
        assert_eq!(check.errors, vec!["must be at least 10".to_string()]);
    }

    #[test]
    fn maximum_violation() {
        let rule = ValidationRule {
            kind: Kind::Number,
            constraints: Constraints {
                maximum: Some(1.5),
                ..Constraints::default()
            },
            ..ValidationRule::default()
        };
        let check = rule.check(Some(&json!("2.5")));
        assert_eq!(check.errors, vec!["must be at most 1.5".to_string()]);
    }

    #[test]
    fn range_satisfied() {
        let rule = ValidationRule {
            kind: Kind::Integer,
            constraints: Constraints {
                minimum: Some(1.0),
                maximum: Some(10.0),
                ..Constraints::default()
            },
            ..ValidationRule::default()
        };
        assert!(rule.check(Some(&json!(10))).valid);
        assert!(rule.check(Some(&json!(1))).valid);
    }

    // === Length ===

    #[test]
    fn length_bounds() {
        let rule = ValidationRule {
            kind: Kind::String,
            constraints: Constraints {
                min_length: Some(3),
                max_length: Some(5),
                ..Constraints::default()
            },
            ..ValidationRule::default()
        };
        assert_eq!(
            rule.check(Some(&json!("ab"))).errors,
            vec!["must be at least 3 characters".to_string()]
        );
        assert_eq!(
            rule.check(Some(&json!("abcdef"))).errors,
            vec!["must be at most 5 characters".to_string()]
        );
        assert!(rule.check(Some(&json!("abcd"))).valid);
    }

    // === Pattern ===

    #[test]
    fn pattern_unanchored_match() {
        let rule = ValidationRule {
            kind: Kind::String,
            constraints: Constraints {
                pattern: Some("[0-9]{3}".into()),
                ..Constraints::default()
            },
            ..ValidationRule::default()
        };
        // Unanchored: a substring match is enough.
        assert!(rule.check(Some(&json!("abc123def"))).valid);
        assert_eq!(
            rule.check(Some(&json!("abc"))).errors,
            vec!["does not match the required pattern".to_string()]
        );
    }

    #[test]
    fn invalid_pattern_is_skipped() {
        let rule = ValidationRule {
            kind: Kind::String,
            constraints: Constraints {
                pattern: Some("(unclosed".into()),
                ..Constraints::default()
            },
            ..ValidationRule::default()
        };
        assert!(rule.check(Some(&json!("anything"))).valid);
    }

    // === Enum ===

    #[test]
    fn enum_membership() {
        let rule = ValidationRule {
            kind: Kind::String,
            allowed: vec![json!("red"), json!("green")],
            ..ValidationRule::default()
        };
        assert!(rule.check(Some(&json!("red"))).valid);
        let check = rule.check(Some(&json!("blue")));
        assert_eq!(check.errors, vec!["must be one of: red, green".to_string()]);
    }

    #[test]
    fn enum_numeric_literal_string_equality() {
        let rule = ValidationRule {
            kind: Kind::Integer,
            allowed: vec![json!(1), json!(2)],
            ..ValidationRule::default()
        };
        assert!(rule.check(Some(&json!("1"))).valid);
        assert!(!rule.check(Some(&json!("3"))).valid);
    }

    // === Formats ===

    #[test]
    fn email_format() {
        let rule = string_rule_with_format("email");
        assert!(rule.check(Some(&json!("x@y.com"))).valid);
        assert!(!rule.check(Some(&json!("x@y"))).valid);
        assert!(!rule.check(Some(&json!("not-an-email"))).valid);
        assert_eq!(
            rule.check(Some(&json!("@y.com"))).errors,
            vec!["must be a valid email address".to_string()]
        );
    }

    #[test]
    fn uri_format() {
        let rule = string_rule_with_format("uri");
        assert!(rule.check(Some(&json!("https://example.com/a"))).valid);
        assert!(!rule.check(Some(&json!("/relative/path"))).valid);
        assert!(!rule.check(Some(&json!("not a uri"))).valid);
    }

    #[test]
    fn uuid_format() {
        let rule = string_rule_with_format("uuid");
        assert!(rule
            .check(Some(&json!("00000000-0000-0000-0000-000000000000")))
            .valid);
        assert!(rule
            .check(Some(&json!("a1b2c3d4-e5f6-7890-abcd-ef0123456789")))
            .valid);
        assert!(!rule.check(Some(&json!("a1b2c3d4"))).valid);
        assert!(!rule
            .check(Some(&json!("g0000000-0000-0000-0000-000000000000")))
            .valid);
    }

    #[test]
    fn date_format_calendar_valid() {
        let rule = string_rule_with_format("date");
        assert!(rule.check(Some(&json!("2024-02-29"))).valid);
        assert!(!rule.check(Some(&json!("2023-02-29"))).valid);
        assert!(!rule.check(Some(&json!("2024-13-01"))).valid);
        assert!(!rule.check(Some(&json!("2024-1-1"))).valid);
    }

    #[test]
    fn date_time_format_forms() {
        let rule = string_rule_with_format("date-time");
        assert!(rule.check(Some(&json!("2024-06-01T12:30:00Z"))).valid);
        assert!(rule
            .check(Some(&json!("2024-06-01T12:30:00+02:00")))
            .valid);
        assert!(rule.check(Some(&json!("2024-06-01T12:30:00"))).valid);
        // Truncated minute-precision form.
        assert!(rule.check(Some(&json!("2024-06-01T12:30"))).valid);
        assert!(!rule.check(Some(&json!("2024-06-01"))).valid);
        assert!(!rule.check(Some(&json!("2024-02-30T12:30:00Z"))).valid);
    }

    #[test]
    fn unknown_format_not_enforced() {
        let rule = string_rule_with_format("hostname");
        assert!(rule.check(Some(&json!("anything goes"))).valid);
    }

    // === Multiple failures ===

    #[test]
    fn all_failures_reported() {
        let rule = ValidationRule {
            kind: Kind::Integer,
            constraints: Constraints {
                minimum: Some(10.0),
                ..Constraints::default()
            },
            allowed: vec![json!(10), json!(20)],
            ..ValidationRule::default()
        };
        let check = rule.check(Some(&json!(5)));
        // Range and enum both fail.
        assert_eq!(check.errors.len(), 2);
    }

    // === RuleSet ===

    #[test]
    fn validate_unknown_path_passes() {
        let rules = RuleSet::default();
        assert!(rules.validate("no.such.path", Some(&json!("x"))).valid);
    }

    #[test]
    fn validate_all_aggregates_by_path() {
        let mut rules = RuleSet::default();
        rules.insert(
            "name",
            ValidationRule {
                required: true,
                kind: Kind::String,
                ..ValidationRule::default()
            },
        );
        rules.insert(
            "age",
            ValidationRule {
                kind: Kind::Integer,
                ..ValidationRule::default()
            },
        );

        let entries = vec![ValueEntry::new("age", json!("abc"))];
        let failures = rules.validate_all(&entries);
        assert_eq!(failures.len(), 2);
        assert_eq!(failures["name"], vec![REQUIRED_MESSAGE.to_string()]);
        assert_eq!(failures["age"], vec!["must be an integer".to_string()]);
    }

    #[test]
    fn validate_all_empty_when_form_valid() {
        let mut rules = RuleSet::default();
        rules.insert(
            "name",
            ValidationRule {
                required: true,
                kind: Kind::String,
                ..ValidationRule::default()
            },
        );
        let entries = vec![ValueEntry::new("name", json!("ok"))];
        assert!(rules.validate_all(&entries).is_empty());
    }
}
