//! Delta Encoder (C4)
//!
//! Computes and applies a structural, purely-additive diff between two
//! MessagePack maps. Deletions do not survive a round trip
//! — this is an explicit, documented simplification, not a bug.

mod store;

pub use store::DeltaStore;

use rmpv::Value;

/// Diff rules:
/// - for every key `k` in `current`:
///   - if `k` is not in `base`, emit `(k -> current[k])`
///   - if `base[k] != current[k]`:
///     - if both are maps, recurse and include the nested diff only if
///       non-empty
///     - else emit `(k -> current[k])`
/// - keys present in `base` but absent from `current` are **not** recorded.
///
/// Both `base` and `current` must be `Value::Map`; anything else is treated
/// as a single opaque value with no sub-structure to diff, matching the
/// "else" branch above (the whole value is emitted if it changed).
#[must_use]
pub fn diff(base: &Value, current: &Value) -> Value {
    match (base, current) {
        (Value::Map(base_entries), Value::Map(current_entries)) => {
            let mut out: Vec<(Value, Value)> = Vec::new();
            for (key, current_val) in current_entries {
                match map_get(base_entries, key) {
                    None => out.push((key.clone(), current_val.clone())),
                    Some(base_val) => {
                        if base_val == current_val {
                            continue;
                        }
                        if matches!(base_val, Value::Map(_)) && matches!(current_val, Value::Map(_))
                        {
                            let nested = diff(base_val, current_val);
                            if !is_empty_map(&nested) {
                                out.push((key.clone(), nested));
                            }
                        } else {
                            out.push((key.clone(), current_val.clone()));
                        }
                    }
                }
            }
            Value::Map(out)
        }
        _ => current.clone(),
    }
}

/// Apply rules: start with a copy of `base`; for each `k`
/// in `delta`, recurse if both `delta[k]` and `base[k]` are maps, otherwise
/// overwrite `base[k]` with `delta[k]`.
#[must_use]
pub fn apply(base: &Value, delta: &Value) -> Value {
    match (base, delta) {
        (Value::Map(base_entries), Value::Map(delta_entries)) => {
            let mut out = base_entries.clone();
            for (key, delta_val) in delta_entries {
                match map_get_mut(&mut out, key) {
                    Some(existing) if matches!(existing, Value::Map(_)) && matches!(delta_val, Value::Map(_)) => {
                        *existing = apply(existing, delta_val);
                    }
                    Some(existing) => *existing = delta_val.clone(),
                    None => out.push((key.clone(), delta_val.clone())),
                }
            }
            Value::Map(out)
        }
        _ => delta.clone(),
    }
}

fn map_get<'a>(entries: &'a [(Value, Value)], key: &Value) -> Option<&'a Value> {
    entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

fn map_get_mut<'a>(entries: &'a mut [(Value, Value)], key: &Value) -> Option<&'a mut Value> {
    entries.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
}

fn is_empty_map(value: &Value) -> bool {
    matches!(value, Value::Map(entries) if entries.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmpv::Value;

    fn map(entries: Vec<(&str, Value)>) -> Value {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Value::String(k.into()), v))
                .collect(),
        )
    }

    #[test]
    fn scenario_5_from_spec() {
        // base = {a:1, b:{c:2, d:3}}, current = {a:1, b:{c:2, d:4}, e:5}
        let base = map(vec![
            ("a", Value::from(1)),
            ("b", map(vec![("c", Value::from(2)), ("d", Value::from(3))])),
        ]);
        let current = map(vec![
            ("a", Value::from(1)),
            ("b", map(vec![("c", Value::from(2)), ("d", Value::from(4))])),
            ("e", Value::from(5)),
        ]);

        let d = diff(&base, &current);
        let expected = map(vec![
            ("b", map(vec![("d", Value::from(4))])),
            ("e", Value::from(5)),
        ]);
        assert_eq!(d, expected);

        let reconstructed = apply(&base, &d);
        assert_eq!(reconstructed, current);
    }

    #[test]
    fn delete_only_change_yields_empty_diff() {
        let base = map(vec![("a", Value::from(1)), ("b", Value::from(2))]);
        let current = map(vec![("a", Value::from(1))]);
        let d = diff(&base, &current);
        assert_eq!(d, map(vec![]));

        // Applying an empty diff does NOT reproduce `current` (documented
        // limitation: deletions never survive a round trip).
        let reconstructed = apply(&base, &d);
        assert_eq!(reconstructed, base);
        assert_ne!(reconstructed, current);
    }

    #[test]
    fn unchanged_maps_diff_to_empty() {
        let base = map(vec![("a", Value::from(1))]);
        let d = diff(&base, &base);
        assert_eq!(d, map(vec![]));
        assert_eq!(apply(&base, &d), base);
    }

    proptest::proptest! {
        #[test]
        fn apply_of_diff_reconstructs_current_when_additive_only(
            a in 0i64..100,
            b in 0i64..100,
            c in 0i64..100,
            extra in proptest::option::of(0i64..100),
        ) {
            let base = map(vec![("a", Value::from(a)), ("b", Value::from(b))]);
            let mut current_entries = vec![("a", Value::from(a)), ("b", Value::from(c))];
            if let Some(e) = extra {
                current_entries.push(("c", Value::from(e)));
            }
            let current = map(current_entries);

            let d = diff(&base, &current);
            let reconstructed = apply(&base, &d);
            prop_assert_eq!(reconstructed, current);
        }
    }
}
