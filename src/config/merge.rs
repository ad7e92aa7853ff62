// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::Value;

/// Merges pipeline-supplied overrides over a plugin's default configuration.
///
/// The merge is shallow: top-level keys of `overrides` replace those of
/// `defaults` wholesale. A null override leaves the defaults untouched, and a
/// non-object on either side means the override wins outright.
pub fn merge_config(defaults: &Value, overrides: &Value) -> Value {
    match (defaults, overrides) {
        (_, Value::Null) => defaults.clone(),
        (Value::Object(base), Value::Object(top)) => {
            let mut merged = base.clone();
            for (key, value) in top {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => overrides.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overrides_replace_top_level_keys() {
        let defaults = json!({"endpoint": "0.0.0.0:80", "tls": {"enabled": false, "ca": "x"}});
        let overrides = json!({"tls": {"enabled": true}, "extra": 1});

        assert_eq!(
            merge_config(&defaults, &overrides),
            json!({"endpoint": "0.0.0.0:80", "tls": {"enabled": true}, "extra": 1})
        );
    }

    #[test]
    fn test_null_overrides_keep_defaults() {
        let defaults = json!({"a": 1});
        assert_eq!(merge_config(&defaults, &Value::Null), defaults);
    }

    #[test]
    fn test_non_object_override_wins() {
        assert_eq!(merge_config(&json!({"a": 1}), &json!([1, 2])), json!([1, 2]));
        assert_eq!(merge_config(&Value::Null, &json!({"a": 1})), json!({"a": 1}));
    }
}
