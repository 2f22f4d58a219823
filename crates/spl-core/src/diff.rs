//! Keyed comparison of entity sets from two instances

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use spl_client::Entity;

/// Maximum recursion depth for diff operations
const MAX_DIFF_DEPTH: usize = 128;

/// How a property differs between source and destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeKind {
    /// Only the source has the property
    Set { src: Value },
    /// Only the destination has the property
    Unset { dest: Value },
    /// Values or types differ
    Changed { src: Value, dest: Value },
    /// List item of the source missing in the destination list
    ItemMissing { value: Value },
    /// List item of the destination absent from the source list
    ItemExtra { value: Value },
}

/// One property difference of an entity present on both sides.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyChange {
    pub entity: String,
    /// Content key, dotted for nested objects
    pub property: String,
    #[serde(flatten)]
    pub kind: ChangeKind,
}

impl PropertyChange {
    /// Source-side value of the change, if any.
    pub fn src_value(&self) -> Option<&Value> {
        match &self.kind {
            ChangeKind::Set { src } | ChangeKind::Changed { src, .. } => Some(src),
            ChangeKind::ItemMissing { value } => Some(value),
            ChangeKind::Unset { .. } | ChangeKind::ItemExtra { .. } => None,
        }
    }

    /// Destination-side value of the change, if any.
    pub fn dest_value(&self) -> Option<&Value> {
        match &self.kind {
            ChangeKind::Unset { dest } | ChangeKind::Changed { dest, .. } => Some(dest),
            ChangeKind::ItemExtra { value } => Some(value),
            ChangeKind::Set { .. } | ChangeKind::ItemMissing { .. } => None,
        }
    }
}

impl fmt::Display for PropertyChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (entity, prop) = (&self.entity, &self.property);
        match &self.kind {
            ChangeKind::Set { src } => write!(f, "{entity}.{prop}: set to {src}"),
            ChangeKind::Unset { dest } => write!(f, "{entity}.{prop}: unset {dest}"),
            ChangeKind::Changed { src, dest } => {
                write!(f, "{entity}.{prop}: {dest} -> {src}")
            }
            ChangeKind::ItemMissing { value } => write!(f, "{entity}.{prop}: add item {value}"),
            ChangeKind::ItemExtra { value } => write!(f, "{entity}.{prop}: remove item {value}"),
        }
    }
}

/// Differences between the entities of a source and a destination.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityDiff {
    /// Names only on the source, sorted
    pub missing: Vec<String>,
    /// Names only on the destination, sorted
    pub extra: Vec<String>,
    pub changes: Vec<PropertyChange>,
}

impl EntityDiff {
    /// Compare entities by name, then content property by property.
    ///
    /// Lists compare as multisets so reordering is not a change.
    pub fn compute(src: &[Entity], dest: &[Entity]) -> Self {
        let src_names: BTreeSet<&str> = src.iter().map(|e| e.name.as_str()).collect();
        let dest_names: BTreeSet<&str> = dest.iter().map(|e| e.name.as_str()).collect();

        let missing = src_names
            .difference(&dest_names)
            .map(|n| n.to_string())
            .collect();
        let extra = dest_names
            .difference(&src_names)
            .map(|n| n.to_string())
            .collect();

        let mut changes = Vec::new();
        for name in src_names.intersection(&dest_names) {
            let (Some(s), Some(d)) = (
                src.iter().find(|e| e.name == *name),
                dest.iter().find(|e| e.name == *name),
            ) else {
                continue;
            };
            let mut differ = Differ {
                entity: name,
                changes: &mut changes,
            };
            differ.objects(&s.content, &d.content, "", 0);
        }

        Self {
            missing,
            extra,
            changes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty() && self.changes.is_empty()
    }

    /// Changes of one entity.
    pub fn changes_for<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a PropertyChange> {
        self.changes.iter().filter(move |c| c.entity == entity)
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no differences".to_string();
        }
        let entities: BTreeSet<&str> = self.changes.iter().map(|c| c.entity.as_str()).collect();
        format!(
            "{} missing, {} extra, {} changed properties on {} entities",
            self.missing.len(),
            self.extra.len(),
            self.changes.len(),
            entities.len()
        )
    }
}

struct Differ<'a> {
    entity: &'a str,
    changes: &'a mut Vec<PropertyChange>,
}

impl Differ<'_> {
    fn push(&mut self, property: String, kind: ChangeKind) {
        self.changes.push(PropertyChange {
            entity: self.entity.to_string(),
            property,
            kind,
        });
    }

    fn objects(
        &mut self,
        src: &serde_json::Map<String, Value>,
        dest: &serde_json::Map<String, Value>,
        path: &str,
        depth: usize,
    ) {
        for (key, src_value) in src {
            let child = child_path(path, key);
            match dest.get(key) {
                Some(dest_value) => self.values(src_value, dest_value, child, depth + 1),
                None => self.push(
                    child,
                    ChangeKind::Set {
                        src: src_value.clone(),
                    },
                ),
            }
        }
        for (key, dest_value) in dest {
            if !src.contains_key(key) {
                self.push(
                    child_path(path, key),
                    ChangeKind::Unset {
                        dest: dest_value.clone(),
                    },
                );
            }
        }
    }

    fn values(&mut self, src: &Value, dest: &Value, path: String, depth: usize) {
        // Depth limit: treat deeply nested differences as a single change
        if depth > MAX_DIFF_DEPTH {
            if src != dest {
                self.push(
                    path,
                    ChangeKind::Changed {
                        src: src.clone(),
                        dest: dest.clone(),
                    },
                );
            }
            return;
        }

        match (src, dest) {
            (Value::Object(s), Value::Object(d)) => self.objects(s, d, &path, depth),
            (Value::Array(s), Value::Array(d)) => {
                let (missing, extra) = multiset_difference(s, d);
                for value in missing {
                    self.push(path.clone(), ChangeKind::ItemMissing { value });
                }
                for value in extra {
                    self.push(path.clone(), ChangeKind::ItemExtra { value });
                }
            }
            _ if src != dest => self.push(
                path,
                ChangeKind::Changed {
                    src: src.clone(),
                    dest: dest.clone(),
                },
            ),
            _ => {}
        }
    }
}

fn child_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

/// Items of `src` not matched in `dest` and vice versa, counting duplicates.
fn multiset_difference(src: &[Value], dest: &[Value]) -> (Vec<Value>, Vec<Value>) {
    let mut unmatched: Vec<Option<&Value>> = dest.iter().map(Some).collect();
    let mut missing = Vec::new();
    for item in src {
        match unmatched.iter_mut().find(|slot| slot.is_some_and(|d| d == item)) {
            Some(slot) => *slot = None,
            None => missing.push(item.clone()),
        }
    }
    let extra = unmatched.into_iter().flatten().cloned().collect();
    (missing, extra)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn entity(name: &str, content: Value) -> Entity {
        match content {
            Value::Object(map) => Entity::new(name, map),
            _ => unreachable!("test content must be an object"),
        }
    }

    #[test]
    fn missing_and_extra_are_sorted() {
        let src = vec![entity("zed", json!({})), entity("alice", json!({}))];
        let dest = vec![entity("bob", json!({})), entity("alice", json!({}))];

        let diff = EntityDiff::compute(&src, &dest);
        assert_eq!(diff.missing, vec!["zed"]);
        assert_eq!(diff.extra, vec!["bob"]);
        assert!(diff.changes.is_empty());
    }

    #[test]
    fn property_changes_carry_src_and_dest() {
        let src = vec![entity(
            "power",
            json!({"defaultApp": "search", "srchJobsQuota": 10, "imported_roles": ["user"]}),
        )];
        let dest = vec![entity(
            "power",
            json!({"defaultApp": "launcher", "imported_roles": ["user"], "cumulativeRTSrchJobsQuota": 2}),
        )];

        let diff = EntityDiff::compute(&src, &dest);
        assert_eq!(
            diff.changes,
            vec![
                PropertyChange {
                    entity: "power".into(),
                    property: "defaultApp".into(),
                    kind: ChangeKind::Changed {
                        src: json!("search"),
                        dest: json!("launcher")
                    },
                },
                PropertyChange {
                    entity: "power".into(),
                    property: "srchJobsQuota".into(),
                    kind: ChangeKind::Set { src: json!(10) },
                },
                PropertyChange {
                    entity: "power".into(),
                    property: "cumulativeRTSrchJobsQuota".into(),
                    kind: ChangeKind::Unset { dest: json!(2) },
                },
            ]
        );
    }

    #[test]
    fn list_items_compare_as_multiset() {
        let src = vec![entity("u", json!({"roles": ["admin", "user", "user"]}))];
        let dest = vec![entity("u", json!({"roles": ["user", "power"]}))];

        let diff = EntityDiff::compute(&src, &dest);
        let kinds: Vec<&ChangeKind> = diff.changes.iter().map(|c| &c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                &ChangeKind::ItemMissing { value: json!("admin") },
                &ChangeKind::ItemMissing { value: json!("user") },
                &ChangeKind::ItemExtra { value: json!("power") },
            ]
        );
    }

    #[test]
    fn nested_objects_use_dotted_paths() {
        let src = vec![entity("i", json!({"attrs": {"a": 1, "b": {"c": true}}}))];
        let dest = vec![entity("i", json!({"attrs": {"a": 1, "b": {"c": false}}}))];

        let diff = EntityDiff::compute(&src, &dest);
        assert_eq!(diff.changes.len(), 1);
        assert_eq!(diff.changes[0].property, "attrs.b.c");
        assert_eq!(diff.summary(), "0 missing, 0 extra, 1 changed properties on 1 entities");
    }

    #[test]
    fn type_change_is_changed() {
        let src = vec![entity("x", json!({"v": "1"}))];
        let dest = vec![entity("x", json!({"v": 1}))];
        let diff = EntityDiff::compute(&src, &dest);
        assert_eq!(diff.changes[0].src_value(), Some(&json!("1")));
        assert_eq!(diff.changes[0].dest_value(), Some(&json!(1)));
    }

    #[test]
    fn deep_nesting_is_bounded() {
        let mut src = json!("leaf-a");
        let mut dest = json!("leaf-b");
        for _ in 0..(MAX_DIFF_DEPTH + 10) {
            src = json!({ "n": src });
            dest = json!({ "n": dest });
        }
        let diff = EntityDiff::compute(&[entity("deep", src)], &[entity("deep", dest)]);
        assert_eq!(diff.changes.len(), 1);
        assert!(matches!(diff.changes[0].kind, ChangeKind::Changed { .. }));
    }

    proptest! {
        #[test]
        fn reordered_lists_have_no_changes(items in proptest::collection::vec("[a-z]{1,6}", 0..12)) {
            let mut reversed = items.clone();
            reversed.reverse();
            let src = vec![entity("e", json!({ "roles": items }))];
            let dest = vec![entity("e", json!({ "roles": reversed }))];
            prop_assert!(EntityDiff::compute(&src, &dest).is_empty());
        }

        #[test]
        fn identical_sides_are_empty(names in proptest::collection::btree_set("[a-z]{1,8}", 0..10)) {
            let entities: Vec<Entity> = names
                .iter()
                .map(|n| entity(n, json!({ "name": n, "n": n.len() })))
                .collect();
            prop_assert!(EntityDiff::compute(&entities, &entities).is_empty());
        }
    }
}
