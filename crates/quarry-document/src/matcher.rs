//! Quarry Predicate Matcher
//!
//! Evaluates comparisons against a loaded document.
//!
//! @version 0.1.0
//! @author Quarry Development Team

use crate::query::{Comparison, Operator, Query};
use crate::types::Value;

/// Follow `path` through nested objects. Arrays are never traversed.
pub fn lookup_path<'a, S: AsRef<str>>(document: &'a Value, path: &[S]) -> Option<&'a Value> {
    path.iter().try_fold(document, |current, segment| match current {
        Value::Object(fields) => fields.get(segment.as_ref()),
        _ => None,
    })
}

/// Numeric view of a value for ordering comparisons. Strings count when
/// their whole text parses as a decimal number.
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(f) => Some(*f),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

impl Comparison {
    /// Check if a document satisfies this comparison.
    pub fn matches(&self, document: &Value) -> bool {
        let Some(value) = lookup_path(document, &self.path) else {
            return false;
        };

        match self.operator {
            Operator::Eq => value.to_string() == self.literal,
            Operator::Gt | Operator::Lt => {
                let Ok(right) = self.literal.parse::<f64>() else {
                    return false;
                };
                let Some(left) = coerce_number(value) else {
                    return false;
                };
                if self.operator == Operator::Gt {
                    left > right
                } else {
                    left < right
                }
            }
        }
    }
}

impl Query {
    /// Check if a document satisfies every comparison.
    pub fn matches(&self, document: &Value) -> bool {
        self.comparisons.iter().all(|c| c.matches(document))
    }
}

// =============================================================================
// Tests
// =============================================================================
