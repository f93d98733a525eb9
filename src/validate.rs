//! Composable response checks.
//!
//! A check is a pure predicate over a completed [`Exchange`]: it reads the
//! response and emits diagnostics, nothing else.  `validate` runs every
//! configured check even after one fails so a single bad response logs all
//! of its problems, then returns the conjunction.

use std::collections::HashSet;

use serde_json::Value;

use crate::executor::Exchange;
use crate::wire;

/// Required fields for the default product listing schema.
pub const PRODUCT_FIELDS: &[&str] = &["name", "description", "price"];

/// A single predicate over a completed exchange.  Build instances via
/// [`status_is`], [`content_type_is`] and [`product_schema`].
#[derive(Debug, Clone)]
pub enum Check {
    /// Status must be one of the listed codes.
    Status(HashSet<u16>),
    /// Declared content type must contain this substring.
    ContentType(String),
    /// Body must decode as a product listing whose first entry carries the
    /// required fields.  Empty listings always pass.
    ProductSchema(Vec<&'static str>),
}

/// Accept any of the given status codes.  A single code is the common case;
/// operations with an expected domain failure pass a set (e.g. `[200, 409]`
/// for a buy where out-of-stock is a legitimate outcome).
pub fn status_is<I>(expected: I) -> Check
where
    I: IntoIterator<Item = u16>,
{
    Check::Status(expected.into_iter().collect())
}

/// Substring match against the declared content type header.
pub fn content_type_is(expected: &str) -> Check {
    Check::ContentType(expected.to_string())
}

/// Sampled schema check: only the first entry of a non-empty listing is
/// inspected.  That shortcut is deliberate; it keeps the check cheap while
/// still catching a service that changes its product shape.
pub fn product_schema(required: &[&'static str]) -> Check {
    Check::ProductSchema(required.to_vec())
}

impl Check {
    pub fn passes(&self, exchange: &Exchange) -> bool {
        match self {
            Check::Status(expected) => {
                if expected.contains(&exchange.status) {
                    true
                } else {
                    tracing::warn!(
                        status = exchange.status,
                        expected = ?expected,
                        "unexpected status code"
                    );
                    false
                }
            }
            Check::ContentType(expected) => {
                let declared = exchange.content_type.as_deref().unwrap_or("");
                if declared.contains(expected.as_str()) {
                    true
                } else {
                    tracing::warn!(expected = %expected, got = %declared, "unexpected content type");
                    false
                }
            }
            Check::ProductSchema(required) => check_product_schema(&exchange.body, required),
        }
    }
}

/// Run every check and return the conjunction.  No short-circuiting: each
/// failing predicate logs its own reason for diagnostic completeness.
pub fn validate(exchange: &Exchange, checks: &[Check]) -> bool {
    let mut ok = true;
    for check in checks {
        if !check.passes(exchange) {
            ok = false;
        }
    }
    ok
}

fn check_product_schema(body: &str, required: &[&'static str]) -> bool {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(error = %err, "product listing body is not valid JSON");
            return false;
        }
    };
    let entries = match wire::normalize_entries(&value) {
        Some(entries) => entries,
        None => {
            tracing::warn!("product listing body has an unrecognized shape");
            return false;
        }
    };
    // An empty listing is a legitimate result, e.g. a category with no hits.
    let first = match entries.first() {
        Some(first) => first,
        None => return true,
    };
    let mut ok = true;
    for field in required {
        if first.get(field).is_none() {
            tracing::warn!(field, "product entry missing required field");
            ok = false;
        }
    }
    ok
}
