use super::fields::Field;
use rust_decimal::Decimal;
use serde_json::Value;

use std::str::FromStr;

/// Raw value of `field` in `record`, `None` if no path leads to a non-null value.
pub fn lookup<'a>(record: &'a Value, field: &Field) -> Option<&'a Value> {
    field.paths.iter().find_map(|path| {
        path.iter()
            .try_fold(record, |value, key| value.get(key))
            .filter(|value| !value.is_null())
    })
}

pub fn decimal(record: &Value, field: &Field) -> Option<Decimal> {
    let value = lookup(record, field)?;
    let parsed = to_decimal(value);
    if parsed.is_none() && !is_blank(value) {
        log::debug!("Ignoring non-numeric {}: {}", field.name, value);
    }
    parsed
}

pub fn integer(record: &Value, field: &Field) -> Option<i64> {
    match lookup(record, field)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn text(record: &Value, field: &Field) -> Option<String> {
    match lookup(record, field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn flag(record: &Value, field: &Field) -> bool {
    match lookup(record, field) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().map_or(false, |n| n != 0),
        Some(Value::String(s)) => matches!(s.trim(), "true" | "True" | "1"),
        _ => false,
    }
}

/// Numeric reading out of a raw value.
///
/// Numbers convert through their decimal text so `18843.2` stays `18843.2`.
/// Strings may carry a trailing unit (`"2337(W)"`, `"50%"`, `"32.0℃"`). Empty
/// strings, placeholders and compound readings like `"306.1/1.9"` are absent.
pub fn to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_number(&n.to_string()),
        Value::String(s) => parse_quantity(s),
        _ => None,
    }
}

fn parse_number(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

fn parse_quantity(s: &str) -> Option<Decimal> {
    let s = s.trim();
    let end = s
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || ((*c == '-' || *c == '+') && *i == 0)))
        .map_or(s.len(), |(i, _)| i);
    let (number, unit) = s.split_at(end);

    if number.is_empty() || unit.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    parse_number(number)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::String(s) => s.trim().is_empty(),
        Value::Null => true,
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn numbers_keep_their_decimal_text() {
        assert_eq!(Some(dec("18843.2")), to_decimal(&json!(18843.2)));
        assert_eq!(Some(dec("589")), to_decimal(&json!(589)));
        assert_eq!(Some(dec("-1")), to_decimal(&json!(-1)));
    }

    #[test]
    fn strings_with_units() {
        assert_eq!(Some(dec("2337")), to_decimal(&json!("2337(W)")));
        assert_eq!(Some(dec("-817")), to_decimal(&json!("-817(W)")));
        assert_eq!(Some(dec("50")), to_decimal(&json!("50%")));
        assert_eq!(Some(dec("32.0")), to_decimal(&json!(" 32.0℃ ")));
        assert_eq!(Some(dec("0.583")), to_decimal(&json!("0.583")));
    }

    #[test]
    fn empty_and_garbage_are_absent() {
        for raw in [json!(""), json!("  "), json!("--"), json!("306.1/1.9"), json!(null), json!(true), json!({})] {
            assert_eq!(None, to_decimal(&raw), "{}", raw);
        }
    }

    #[test]
    fn lookup_tries_paths_in_order() {
        const FIELD: Field = Field {
            name: "output_power",
            paths: &[&["pac"], &["out_pac"]],
        };
        assert_eq!(Some(dec("589")), decimal(&json!({"out_pac": 589}), &FIELD));
        assert_eq!(Some(dec("1")), decimal(&json!({"pac": 1, "out_pac": 589}), &FIELD));
        assert_eq!(Some(dec("589")), decimal(&json!({"pac": null, "out_pac": 589}), &FIELD));
        assert_eq!(None, decimal(&json!({"pac": ""}), &FIELD));
    }

    #[test]
    fn nested_paths() {
        const FIELD: Field = Field {
            name: "meter_serial",
            paths: &[&["homKit", "sn"]],
        };
        assert_eq!(
            Some("GW-METER".to_string()),
            text(&json!({"homKit": {"sn": "GW-METER"}}), &FIELD)
        );
        assert_eq!(None, text(&json!({"homKit": {"sn": null}}), &FIELD));
        assert_eq!(None, text(&json!({"homKit": null}), &FIELD));
    }

    #[test]
    fn integers_and_flags() {
        const FIELD: Field = Field {
            name: "status",
            paths: &[&["status"]],
        };
        assert_eq!(Some(-1), integer(&json!({"status": -1}), &FIELD));
        assert_eq!(Some(1), integer(&json!({"status": "1"}), &FIELD));
        assert_eq!(None, integer(&json!({"status": ""}), &FIELD));
        assert!(flag(&json!({"status": true}), &FIELD));
        assert!(!flag(&json!({}), &FIELD));
    }
}
