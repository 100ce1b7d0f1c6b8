//! Type coercion between textual preference values and typed values.

use crate::models::PreferenceType;
use crate::{Error, Result};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// A preference value in its typed representation.
///
/// `Object` is an opaque payload: the engine keeps the raw text and leaves
/// its interpretation to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Object(String),
}

impl TypedValue {
    /// The preference type this value belongs to.
    pub fn pref_type(&self) -> PreferenceType {
        match self {
            TypedValue::String(_) => PreferenceType::String,
            TypedValue::Int(_) => PreferenceType::Int,
            TypedValue::Float(_) => PreferenceType::Float,
            TypedValue::Bool(_) => PreferenceType::Bool,
            TypedValue::Object(_) => PreferenceType::Object,
        }
    }

    /// Position of this value relative to a numeric bound, `None` for
    /// non-numeric values. Integers compare exactly, without widening to f64.
    fn cmp_bound(&self, bound: f64) -> Option<Ordering> {
        match self {
            TypedValue::Int(i) => Some(cmp_int_bound(*i, bound)),
            TypedValue::Float(x) => x.partial_cmp(&bound),
            _ => None,
        }
    }
}

/// Exact comparison of an integer with a float bound.
fn cmp_int_bound(i: i64, bound: f64) -> Ordering {
    // Both limits are exact powers of two, so the casts below never saturate
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if bound.is_nan() {
        return Ordering::Equal;
    }
    if bound >= LIMIT {
        return Ordering::Less;
    }
    if bound < -LIMIT {
        return Ordering::Greater;
    }
    let i = i as i128;
    if i < bound.ceil() as i128 {
        Ordering::Less
    } else if i > bound.floor() as i128 {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::String(s) | TypedValue::Object(s) => f.write_str(s),
            TypedValue::Int(i) => write!(f, "{}", i),
            TypedValue::Float(x) => write!(f, "{}", x),
            TypedValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Render a typed value back to its textual form.
///
/// For every type except `Object`, `coerce(&format(&v), v.pref_type(), ..)`
/// yields `v` again.
pub fn format(value: &TypedValue) -> String {
    value.to_string()
}

/// Convert raw text into a value of `pref_type`.
///
/// Numeric types honour `minimum`/`maximum` when present; bounds are ignored
/// for the other types. Non-finite floats are rejected.
pub fn coerce(
    raw: &str,
    pref_type: PreferenceType,
    minimum: Option<f64>,
    maximum: Option<f64>,
) -> Result<TypedValue> {
    let fail = |reason: String| Error::TypeCoercion {
        value: raw.to_string(),
        pref_type,
        reason,
    };

    let value = match pref_type {
        PreferenceType::String => TypedValue::String(raw.to_string()),
        PreferenceType::Object => TypedValue::Object(raw.to_string()),
        PreferenceType::Bool => match raw.to_lowercase().as_str() {
            "true" => TypedValue::Bool(true),
            "false" => TypedValue::Bool(false),
            _ => return Err(fail("expected 'true' or 'false'".to_string())),
        },
        PreferenceType::Int => raw
            .parse::<i64>()
            .map(TypedValue::Int)
            .map_err(|e| fail(e.to_string()))?,
        PreferenceType::Float => {
            let x = raw.parse::<f64>().map_err(|e| fail(e.to_string()))?;
            if !x.is_finite() {
                return Err(fail("value must be finite".to_string()));
            }
            TypedValue::Float(x)
        }
    };

    if let Some(min) = minimum
        && value.cmp_bound(min) == Some(Ordering::Less)
    {
        return Err(fail(format!("below minimum {}", min)));
    }
    if let Some(max) = maximum
        && value.cmp_bound(max) == Some(Ordering::Greater)
    {
        return Err(fail(format!("above maximum {}", max)));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_string_is_identity() {
        let v = coerce(" any text ", PreferenceType::String, None, None).unwrap();
        assert_eq!(v, TypedValue::String(" any text ".to_string()));
    }

    #[test]
    fn test_coerce_int() {
        assert_eq!(
            coerce("30", PreferenceType::Int, None, None).unwrap(),
            TypedValue::Int(30)
        );
        assert!(coerce("3.5", PreferenceType::Int, None, None).is_err());
        assert!(coerce("thirty", PreferenceType::Int, None, None).is_err());
    }

    #[test]
    fn test_coerce_int_out_of_bounds() {
        let err = coerce("150", PreferenceType::Int, Some(0.0), Some(100.0)).unwrap_err();
        assert!(matches!(err, Error::TypeCoercion { .. }));

        let err = coerce("-1", PreferenceType::Int, Some(0.0), Some(100.0)).unwrap_err();
        assert!(matches!(err, Error::TypeCoercion { .. }));
    }

    #[test]
    fn test_coerce_bounds_inclusive() {
        assert!(coerce("0", PreferenceType::Int, Some(0.0), Some(100.0)).is_ok());
        assert!(coerce("100", PreferenceType::Int, Some(0.0), Some(100.0)).is_ok());
        assert!(coerce("0.5", PreferenceType::Float, Some(0.5), None).is_ok());
    }

    #[test]
    fn test_coerce_int_bounds_are_exact_beyond_f64_precision() {
        // 2^53 + 1 rounds to 2^53 as f64
        let max = 9_007_199_254_740_992.0;
        assert!(coerce("9007199254740992", PreferenceType::Int, None, Some(max)).is_ok());
        assert!(coerce("9007199254740993", PreferenceType::Int, None, Some(max)).is_err());
        assert!(coerce("-9007199254740993", PreferenceType::Int, Some(-max), None).is_err());
        assert!(coerce(&i64::MAX.to_string(), PreferenceType::Int, None, Some(1e19)).is_ok());
        assert!(coerce(&i64::MIN.to_string(), PreferenceType::Int, Some(-1e19), None).is_ok());
        assert!(coerce("3", PreferenceType::Int, Some(2.5), Some(3.5)).is_ok());
        assert!(coerce("2", PreferenceType::Int, Some(2.5), None).is_err());
    }

    #[test]
    fn test_coerce_float() {
        assert_eq!(
            coerce("2.5", PreferenceType::Float, None, None).unwrap(),
            TypedValue::Float(2.5)
        );
        assert!(coerce("NaN", PreferenceType::Float, None, None).is_err());
        assert!(coerce("inf", PreferenceType::Float, None, None).is_err());
        assert!(coerce("", PreferenceType::Float, None, None).is_err());
    }

    #[test]
    fn test_coerce_bool_case_insensitive() {
        assert_eq!(
            coerce("TRUE", PreferenceType::Bool, None, None).unwrap(),
            TypedValue::Bool(true)
        );
        assert_eq!(
            coerce("False", PreferenceType::Bool, None, None).unwrap(),
            TypedValue::Bool(false)
        );
        assert!(coerce("yes", PreferenceType::Bool, None, None).is_err());
    }

    #[test]
    fn test_coerce_object_is_opaque() {
        let v = coerce("{not json", PreferenceType::Object, None, None).unwrap();
        assert_eq!(v, TypedValue::Object("{not json".to_string()));
    }

    #[test]
    fn test_bounds_ignored_for_non_numeric() {
        assert!(coerce("abc", PreferenceType::String, Some(10.0), Some(1.0)).is_ok());
    }

    #[test]
    fn test_format_round_trip() {
        for (raw, ty) in [
            ("-42", PreferenceType::Int),
            ("+7", PreferenceType::Int),
            ("0.1", PreferenceType::Float),
            ("1e10", PreferenceType::Float),
            ("TRUE", PreferenceType::Bool),
            ("hello", PreferenceType::String),
        ] {
            let v = coerce(raw, ty, None, None).unwrap();
            assert_eq!(coerce(&format(&v), ty, None, None).unwrap(), v, "raw {}", raw);
        }
    }

    #[test]
    fn test_serialize_untagged() {
        assert_eq!(serde_json::to_value(TypedValue::Int(30)).unwrap(), 30);
        assert_eq!(serde_json::to_value(TypedValue::Bool(true)).unwrap(), true);
        assert_eq!(serde_json::to_value(TypedValue::String("a".into())).unwrap(), "a");
    }
}
