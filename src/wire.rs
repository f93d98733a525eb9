//! Decoding of product listing payloads.
//!
//! The product service has shipped several envelope shapes over time: a bare
//! JSON array of product objects, a `{"data": ...}` wrapper holding either an
//! array or a map keyed by product name, and a bare name-keyed map.  All of
//! them are normalized here, before anything else looks at the payload, so
//! the rest of the simulator only ever sees a flat `Vec<Product>`.

use serde_json::Value;

use crate::Product;

/// The wire shapes the decoder recognizes, after the optional `data`
/// envelope has been peeled off.
enum Shape<'a> {
    List(&'a [Value]),
    Keyed(&'a serde_json::Map<String, Value>),
}

fn classify(value: &Value) -> Option<Shape<'_>> {
    let inner = match value {
        Value::Object(map) if map.contains_key("data") => &map["data"],
        other => other,
    };
    match inner {
        Value::Array(items) => Some(Shape::List(items)),
        Value::Object(map) => Some(Shape::Keyed(map)),
        _ => None,
    }
}

/// Flatten a listing payload into its raw product entries, in wire order.
///
/// Returns `None` when the payload is not one of the recognized shapes.  For
/// keyed maps, only values that look product-like (an object carrying `name`)
/// are kept; the service occasionally mixes an `error` string into the map.
/// For lists every element is kept as-is so schema checks can see malformed
/// entries.
pub fn normalize_entries(value: &Value) -> Option<Vec<&Value>> {
    match classify(value)? {
        Shape::List(items) => Some(items.iter().collect()),
        Shape::Keyed(map) => Some(
            map.values()
                .filter(|v| v.get("name").and_then(Value::as_str).is_some())
                .collect(),
        ),
    }
}

/// Decode a listing payload into products.
///
/// Entries that do not parse as a product (missing `name`, wrong types) are
/// dropped rather than failing the whole payload; a partially bad listing
/// still yields the usable products.  `None` means the payload shape itself
/// was unrecognized.
pub fn decode_products(value: &Value) -> Option<Vec<Product>> {
    let entries = match normalize_entries(value) {
        Some(entries) => entries,
        None => {
            tracing::warn!(kind = value_kind(value), "unexpected product payload shape");
            return None;
        }
    };
    Some(entries.into_iter().filter_map(product_from_value).collect())
}

fn product_from_value(value: &Value) -> Option<Product> {
    value.get("name").and_then(Value::as_str)?;
    serde_json::from_value(value.clone()).ok()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_bare_list() {
        let body = json!([
            {"name": "Widget", "category": "Tools", "price": 9.99, "stock": 4},
            {"name": "Gadget", "price": 19.5, "stock": 0}
        ]);
        let products = decode_products(&body).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].name, "Widget");
        assert_eq!(products[0].category.as_deref(), Some("Tools"));
        assert_eq!(products[1].stock, 0);
    }

    #[test]
    fn decodes_enveloped_list() {
        let body = json!({"status": "ok", "data": [{"name": "Widget", "price": 1.0}]});
        let products = decode_products(&body).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].price, 1.0);
    }

    #[test]
    fn decodes_enveloped_map_keyed_by_name() {
        let body = json!({"data": {
            "Widget": {"name": "Widget", "price": 1.0},
            "Gadget": {"name": "Gadget", "price": 2.0}
        }});
        let mut names: Vec<String> = decode_products(&body)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["Gadget", "Widget"]);
    }

    #[test]
    fn decodes_bare_map_and_skips_error_entries() {
        let body = json!({
            "Widget": {"name": "Widget", "price": 1.0},
            "error": "upstream hiccup"
        });
        let products = decode_products(&body).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Widget");
    }

    #[test]
    fn drops_entries_without_a_name() {
        let body = json!([{"name": "Widget", "price": 1.0}, {"price": 2.0}, 42]);
        let products = decode_products(&body).unwrap();
        assert_eq!(products.len(), 1);
    }

    #[test]
    fn rejects_scalar_payloads() {
        assert!(decode_products(&json!("nope")).is_none());
        assert!(decode_products(&json!(7)).is_none());
    }

    #[test]
    fn empty_list_decodes_to_empty() {
        assert_eq!(decode_products(&json!({"data": []})).unwrap(), vec![]);
    }

    #[test]
    fn passthrough_fields_survive() {
        let body = json!([{"name": "Widget", "price": 1.0, "productID": "p-1"}]);
        let products = decode_products(&body).unwrap();
        assert_eq!(
            products[0].extra.get("productID").and_then(Value::as_str),
            Some("p-1")
        );
    }
}
