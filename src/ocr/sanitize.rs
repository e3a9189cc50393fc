//! JSON normalization for engine-originated numeric values.
//!
//! Local OCR engines report coordinates and scores in fixed-width numeric
//! types (f32 tensors, integer pixel grids) that surface here as JSON
//! numbers with float representations of whole values, sometimes wrapped
//! in scalar-shaped single-element arrays. Everything persisted or
//! returned to clients must be a plain integer or finite float, so these
//! walkers reduce arbitrary nesting to plain scalars. Both functions are
//! idempotent.

use serde_json::{Number, Value};

/// Recursively coerce every number in `value` to a plain scalar:
/// integral floats become integers, everything else stays a finite f64.
/// Mappings and sequences are walked to arbitrary depth.
pub fn sanitize_value(value: Value) -> Value {
    match value {
        Value::Number(n) => Value::Number(sanitize_number(n)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_value).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, item)| (key, sanitize_value(item)))
                .collect(),
        ),
        other => other,
    }
}

/// Unwrap scalar-shaped array wrappers (`[x]`, `[[x]]`, ...) down to the
/// scalar they carry, then sanitize. Used where a scalar is expected but
/// the engine may hand back a zero-dimensional array value.
pub fn unwrap_scalar(value: Value) -> Value {
    match value {
        Value::Array(mut items) if items.len() == 1 => unwrap_scalar(items.remove(0)),
        other => sanitize_value(other),
    }
}

fn sanitize_number(n: Number) -> Number {
    if n.is_i64() || n.is_u64() {
        return n;
    }
    let f = n.as_f64().unwrap_or(0.0);
    // f64 can hold every i32-sized coordinate exactly; only coerce when the
    // round trip through i64 is lossless.
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 && (f as i64) as f64 == f {
        Number::from(f as i64)
    } else {
        Number::from_f64(f).unwrap_or_else(|| Number::from(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integral_floats_become_integers() {
        assert_eq!(sanitize_value(json!(3.0)), json!(3));
        assert_eq!(sanitize_value(json!(-17.0)), json!(-17));
        assert_eq!(sanitize_value(json!(0.875)), json!(0.875));
    }

    #[test]
    fn test_nested_structures_reduce_fully() {
        let raw = json!({
            "polygon": [[700.0, 12.0], [800.0, 12.0], [800.0, 48.0], [700.0, 48.0]],
            "scores": {"rec": [0.9732, 1.0], "det": 0.5}
        });
        let clean = sanitize_value(raw);
        assert_eq!(clean["polygon"][0], json!([700, 12]));
        assert_eq!(clean["scores"]["rec"], json!([0.9732, 1]));
        assert_eq!(clean["scores"]["det"], json!(0.5));
    }

    #[test]
    fn test_idempotent() {
        let raw = json!([[[1.0, 2.5]], {"a": [3.0, {"b": 4.0}]}]);
        let once = sanitize_value(raw);
        let twice = sanitize_value(once.clone());
        assert_eq!(once, twice);

        let wrapped = json!([[0.75]]);
        let once = unwrap_scalar(wrapped);
        assert_eq!(once, json!(0.75));
        assert_eq!(unwrap_scalar(once.clone()), once);
    }

    #[test]
    fn test_scalar_wrappers_unwrap() {
        assert_eq!(unwrap_scalar(json!([42.0])), json!(42));
        assert_eq!(unwrap_scalar(json!([[[0.5]]])), json!(0.5));
        // Multi-element arrays are not wrappers and stay intact
        assert_eq!(unwrap_scalar(json!([1.0, 2.0])), json!([1, 2]));
    }

    #[test]
    fn test_non_numeric_values_pass_through() {
        let raw = json!({"text": "hello", "ok": true, "missing": null});
        assert_eq!(sanitize_value(raw.clone()), raw);
    }

    #[test]
    fn test_large_floats_stay_floats() {
        // Beyond exact i64 round-trip territory
        let big = 1.0e300;
        assert_eq!(sanitize_value(json!(big)), json!(big));
    }
}
