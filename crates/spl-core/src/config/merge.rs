//! Layer merging helpers

use serde_json::{Map, Value};

/// Prefix of environment variables overriding settings.
pub const ENV_PREFIX: &str = "SPL_";

/// Selects the active environment section, not an override.
pub const ENV_SELECTOR: &str = "SPL_ENV";

/// Sections whose entries are keyed by user-chosen names.
const NAMED_SECTIONS: &[&str] = &["connections", "samples"];

/// Deep merge two JSON values, `other` wins on conflicts.
///
/// Objects merge recursively, every other value is replaced.
pub fn deep_merge_value(base: &mut Value, other: &Value) {
    match (base, other) {
        (Value::Object(base_map), Value::Object(other_map)) => {
            for (key, other_val) in other_map {
                if let Some(base_val) = base_map.get_mut(key) {
                    deep_merge_value(base_val, other_val);
                } else {
                    base_map.insert(key.clone(), other_val.clone());
                }
            }
        }
        (base, other) => {
            *base = other.clone();
        }
    }
}

/// Lower-case schema keys so `CONNECTIONS.local.HOST` reads as `connections.local.host`.
///
/// Names chosen by the user (connection, sample and Splunkbase app names,
/// docker environment variables) keep their case.
pub fn normalize_keys(value: Value) -> Value {
    let Value::Object(sections) = value else {
        return value;
    };

    let mut out = Map::new();
    for (key, section) in sections {
        let key = key.to_lowercase();
        let section = match (key.as_str(), section) {
            (name, Value::Object(entries)) if NAMED_SECTIONS.contains(&name) => Value::Object(
                entries
                    .into_iter()
                    .map(|(entry, value)| (entry, lowercase_object(value)))
                    .collect(),
            ),
            (_, Value::Object(fields)) => Value::Object(
                fields
                    .into_iter()
                    .map(|(field, value)| {
                        let field = field.to_lowercase();
                        let value = if field == "apps" {
                            match value {
                                Value::Object(apps) => Value::Object(
                                    apps.into_iter()
                                        .map(|(app, spec)| (app, lowercase_object(spec)))
                                        .collect(),
                                ),
                                other => other,
                            }
                        } else {
                            value
                        };
                        (field, value)
                    })
                    .collect(),
            ),
            (_, other) => other,
        };
        merge_into(&mut out, key, section);
    }
    Value::Object(out)
}

fn lowercase_object(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
        ),
        other => other,
    }
}

// `Docker` and `DOCKER` in one file fold into the same section.
fn merge_into(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(existing) => deep_merge_value(existing, &value),
        None => {
            map.insert(key, value);
        }
    }
}

/// Select the environment of a layered file.
///
/// A file with a top-level `default` section is layered as
/// `default` <- `<env>` <- `global`; any other file is taken as is.
pub fn select_environment(value: Value, env: &str) -> Value {
    let Value::Object(map) = value else {
        return value;
    };
    let find = |name: &str| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    };

    let Some(default) = find("default") else {
        return Value::Object(map);
    };
    let mut merged = default;
    for layer in [env, "global"] {
        if let Some(section) = find(layer) {
            deep_merge_value(&mut merged, &section);
        }
    }
    merged
}

/// Build an override tree from `SPL_<SECTION>__<KEY>...` variables.
///
/// Schema segments are lower-cased. Segments naming a user-chosen entry
/// (connection, sample, Splunkbase app, docker environment variable) match
/// an existing key of `base` case-insensitively and take its spelling, or
/// stay as written. Values are parsed as YAML scalars so
/// `SPL_CONNECTIONS__DEV__PORT=8089` becomes a number.
pub fn env_overrides<I>(vars: I, base: &Value) -> Value
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut root = Value::Object(Map::new());
    for (name, raw) in vars {
        if name == ENV_SELECTOR {
            continue;
        }
        let Some(path) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let raw_segments: Vec<&str> = path.split("__").filter(|s| !s.is_empty()).collect();
        if raw_segments.is_empty() {
            continue;
        }
        let segments = resolve_segments(&raw_segments, base);

        let value = parse_scalar(&raw);
        let overlay = segments
            .iter()
            .rev()
            .fold(value, |acc, segment| {
                let mut map = Map::new();
                map.insert(segment.clone(), acc);
                Value::Object(map)
            });
        deep_merge_value(&mut root, &overlay);
    }
    root
}

fn resolve_segments(raw: &[&str], base: &Value) -> Vec<String> {
    let mut resolved = Vec::with_capacity(raw.len());
    let mut node = Some(base);
    for (index, segment) in raw.iter().enumerate() {
        let segment = if is_named_position(&resolved, index) {
            existing_key(node, segment).unwrap_or_else(|| segment.to_string())
        } else {
            segment.to_lowercase()
        };
        node = node.and_then(|n| n.get(&segment));
        resolved.push(segment);
    }
    resolved
}

/// Whether the segment at `index` names a user-chosen entry.
fn is_named_position(parents: &[String], index: usize) -> bool {
    match (index, parents) {
        (1, [section]) => NAMED_SECTIONS.contains(&section.as_str()),
        (2, [section, field]) => matches!(
            (section.as_str(), field.as_str()),
            ("docker", "environment") | ("splunkbase", "apps")
        ),
        _ => false,
    }
}

fn existing_key(node: Option<&Value>, segment: &str) -> Option<String> {
    node?
        .as_object()?
        .keys()
        .find(|key| key.eq_ignore_ascii_case(segment))
        .cloned()
}

fn parse_scalar(raw: &str) -> Value {
    match serde_yaml::from_str::<Value>(raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::String(_))) => value,
        _ => Value::String(raw.to_string()),
    }
}
