//! Property tests for persisted keys and value coercion.

use prefs::models::{PersistedKey, PreferenceType, Scope, TypedValue, build_key, coerce, format};
use proptest::prelude::*;

/// Identifying fields accepted by `build_key`.
fn key_parts() -> impl Strategy<Value = (Scope, Option<String>, String)> {
    (
        prop::sample::select(Scope::ALL.to_vec()),
        "[A-Za-z0-9_.-]{1,10}",
        "[A-Za-z0-9_./-]{1,16}",
    )
        .prop_map(|(scope, owner, key)| {
            let owner = scope.requires_owner().then_some(owner);
            (scope, owner, key)
        })
}

fn build(parts: &(Scope, Option<String>, String)) -> PersistedKey {
    build_key(parts.0, parts.1.as_deref(), &parts.2).unwrap()
}

proptest! {
    #[test]
    fn test_text_form_round_trips(parts in key_parts()) {
        let key = build(&parts);
        let parsed: PersistedKey = key.to_string().parse().unwrap();
        prop_assert_eq!(parsed, key);
    }

    #[test]
    fn test_build_key_is_injective(a in key_parts(), b in key_parts()) {
        let (ka, kb) = (build(&a), build(&b));
        if a == b {
            prop_assert_eq!(ka.to_string(), kb.to_string());
        } else {
            prop_assert_ne!(ka.to_string(), kb.to_string());
            prop_assert_ne!(ka, kb);
        }
    }

    #[test]
    fn test_owned_scope_without_owner_is_rejected(
        scope in prop::sample::select(vec![Scope::Module, Scope::Role, Scope::User]),
        key in "[a-z]{1,8}",
    ) {
        prop_assert!(build_key(scope, None, &key).is_err());
    }

    #[test]
    fn test_int_round_trips(n in any::<i64>()) {
        let value = TypedValue::Int(n);
        prop_assert_eq!(coerce(&format(&value), PreferenceType::Int, None, None).unwrap(), value);
    }

    #[test]
    fn test_float_round_trips(x in prop::num::f64::NORMAL | prop::num::f64::ZERO) {
        let value = TypedValue::Float(x);
        prop_assert_eq!(coerce(&format(&value), PreferenceType::Float, None, None).unwrap(), value);
    }

    #[test]
    fn test_bool_round_trips(b in any::<bool>()) {
        let value = TypedValue::Bool(b);
        prop_assert_eq!(coerce(&format(&value), PreferenceType::Bool, None, None).unwrap(), value);
    }

    #[test]
    fn test_string_round_trips(s in ".*") {
        let value = TypedValue::String(s);
        prop_assert_eq!(coerce(&format(&value), PreferenceType::String, None, None).unwrap(), value);
    }

    #[test]
    fn test_int_bounds_are_inclusive(min in -1000i64..0, max in 0i64..1000, n in -2000i64..2000) {
        let result = coerce(&n.to_string(), PreferenceType::Int, Some(min as f64), Some(max as f64));
        prop_assert_eq!(result.is_ok(), (min..=max).contains(&n));
    }
}
