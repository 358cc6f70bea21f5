//! Quarry Path Flattener
//!
//! Walks a document and yields every `(dotted path, scalar)` pair reachable
//! through objects alone. Nested objects extend the path with their key;
//! arrays end the walk for that branch and contribute nothing, scalars inside
//! them included. The order of pairs follows object iteration order and
//! carries no meaning.
//!
//! @version 0.1.0
//! @author Quarry Development Team

use crate::types::Value;
use std::collections::hash_map;

/// Lazy iterator over the scalar leaves of a document.
pub struct PathValues<'a> {
    stack: Vec<(Option<String>, hash_map::Iter<'a, String, Value>)>,
}

/// Flatten `document` into `(path, value)` pairs. A top-level value that is
/// not an object yields nothing.
pub fn path_values(document: &Value) -> PathValues<'_> {
    let stack = match document {
        Value::Object(fields) => vec![(None, fields.iter())],
        _ => Vec::new(),
    };
    PathValues { stack }
}

impl<'a> Iterator for PathValues<'a> {
    type Item = (String, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (prefix, fields) = self.stack.last_mut()?;

            let next = fields.next().map(|(key, value)| {
                let path = match prefix {
                    Some(prefix) => format!("{}.{}", prefix, key),
                    None => key.clone(),
                };
                (path, value)
            });

            match next {
                None => {
                    self.stack.pop();
                }
                Some((path, Value::Object(fields))) => {
                    self.stack.push((Some(path), fields.iter()));
                }
                Some((_, Value::Array(_))) => {}
                Some((path, scalar)) => return Some((path, scalar)),
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
