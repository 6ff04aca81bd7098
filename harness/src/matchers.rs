//! Custom assertion predicates
//!
//! Each predicate reports whether it passed and the message an assertion
//! would print: the failure for a miss, the negated failure for a hit.

use std::fmt::Display;

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub pass: bool,
    pub message: String,
}

impl MatchResult {
    /// Panic with the message unless the predicate passed
    #[track_caller]
    pub fn assert(self) {
        if !self.pass {
            panic!("{}", self.message);
        }
    }

    /// The `not` form: passes exactly when the predicate failed
    pub fn negate(self) -> Self {
        Self {
            pass: !self.pass,
            message: self.message,
        }
    }
}

/// Inclusive on both ends
pub fn to_be_in_range<T>(received: T, min: T, max: T) -> MatchResult
where
    T: PartialOrd + Display,
{
    let pass = received >= min && received <= max;
    let message = if pass {
        format!("Expected {} not to be in range {}-{}", received, min, max)
    } else {
        format!("Expected {} to be in range {}-{}", received, min, max)
    };
    MatchResult { pass, message }
}

pub fn to_have_exact_length<T>(items: &[T], expected: usize) -> MatchResult {
    let pass = items.len() == expected;
    let message = if pass {
        format!("Expected array not to have length {}", expected)
    } else {
        format!(
            "Expected array to have length {}, got {}",
            expected,
            items.len()
        )
    };
    MatchResult { pass, message }
}

/// Passes when some item carries every key of `expected` with an equal value.
///
/// Numbers compare by value, so `2` equals `2.0`. A non-object `expected`
/// has no keys and matches any item.
pub fn to_contain_object<T: Serialize>(items: &[T], expected: &Value) -> MatchResult {
    let wanted = expected.as_object();
    let pass = items.iter().any(|item| {
        let Some(wanted) = wanted else {
            return true;
        };
        let Ok(Value::Object(fields)) = serde_json::to_value(item) else {
            return false;
        };
        wanted.iter().all(|(key, value)| {
            fields
                .get(key)
                .is_some_and(|field| values_equal(field, value))
        })
    });
    let message = if pass {
        format!("Expected array not to contain object {}", expected)
    } else {
        format!("Expected array to contain object {}", expected)
    };
    MatchResult { pass, message }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64() == r.as_f64(),
        (Value::Array(l), Value::Array(r)) => {
            l.len() == r.len() && l.iter().zip(r).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(l), Value::Object(r)) => {
            l.len() == r.len()
                && l.iter()
                    .all(|(key, value)| r.get(key).is_some_and(|other| values_equal(value, other)))
        }
        _ => left == right,
    }
}
