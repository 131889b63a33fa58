//! Kind-tagged Kubernetes object as streamed by the dashboard backend.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference, Time};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use smallvec::SmallVec;

use crate::Kind;

static NO_ENTRIES: BTreeMap<String, String> = BTreeMap::new();

/// A Kubernetes object with typed metadata and everything else kept as JSON.
///
/// Stores replace resources wholesale; nothing here mutates a stored value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    #[serde(default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, deserialize_with = "lenient_metadata")]
    pub metadata: ObjectMeta,
    /// Remaining top-level fields (`spec`, `status`, `roleRef`, `data`, ...).
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Resource {
    pub fn new(kind: Kind, uid: &str, name: &str) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            metadata: ObjectMeta {
                uid: Some(uid.to_string()),
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            ..Self::default()
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.metadata.namespace = Some(namespace.to_string());
        self
    }

    pub fn with_owner(mut self, owner_uid: &str) -> Self {
        self.metadata
            .owner_references
            .get_or_insert_with(Vec::new)
            .push(OwnerReference { uid: owner_uid.to_string(), ..OwnerReference::default() });
        self
    }

    pub fn with_creation_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.metadata.creation_timestamp = Some(Time(ts));
        self
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Set a nested field, creating intermediate objects, e.g.
    /// `with_field(&["spec", "nodeName"], json!("node-1"))`.
    pub fn with_field(mut self, path: &[&str], value: Value) -> Self {
        insert_path(&mut self.data, path, value);
        self
    }

    /// Parsed kind, `None` for kinds without a store.
    pub fn typed_kind(&self) -> Option<Kind> {
        self.kind.parse().ok()
    }

    pub fn is_kind(&self, kind: Kind) -> bool {
        self.kind == kind.as_str()
    }

    pub fn uid(&self) -> &str {
        self.metadata.uid.as_deref().unwrap_or("")
    }

    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("")
    }

    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or("")
    }

    pub fn owner_reference_uids(&self) -> SmallVec<[&str; 2]> {
        self.metadata
            .owner_references
            .iter()
            .flatten()
            .map(|or| or.uid.as_str())
            .collect()
    }

    pub fn creation_timestamp(&self) -> Option<DateTime<Utc>> {
        self.metadata.creation_timestamp.as_ref().map(|t| t.0)
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        self.metadata.labels.as_ref().unwrap_or(&NO_ENTRIES)
    }

    pub fn annotations(&self) -> &BTreeMap<String, String> {
        self.metadata.annotations.as_ref().unwrap_or(&NO_ENTRIES)
    }

    /// Walk a path of object keys below the top level.
    pub fn field(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut cur = self.data.get(*first)?;
        for p in rest {
            cur = cur.get(*p)?;
        }
        Some(cur)
    }

    /// String field or `""` when absent or not a string.
    pub fn str_field(&self, path: &[&str]) -> &str {
        self.field(path).and_then(Value::as_str).unwrap_or("")
    }
}

/// Typed metadata, dropping any field that does not parse (an empty
/// timestamp, a null label value) instead of rejecting the whole object.
fn lenient_metadata<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ObjectMeta, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if let Ok(meta) = ObjectMeta::deserialize(&value) {
        return Ok(meta);
    }
    let fields = match value {
        Value::Object(fields) => fields,
        Value::Null => return Ok(ObjectMeta::default()),
        other => return Err(serde::de::Error::custom(format!("metadata must be an object, got {other}"))),
    };
    let kept: Map<String, Value> = fields
        .into_iter()
        .filter_map(|(key, field)| {
            let field = match key.as_str() {
                "labels" | "annotations" => string_entries(field),
                _ => field,
            };
            let single = Value::Object(Map::from_iter([(key.clone(), field.clone())]));
            ObjectMeta::deserialize(&single).is_ok().then_some((key, field))
        })
        .collect();
    ObjectMeta::deserialize(&Value::Object(kept)).map_err(serde::de::Error::custom)
}

fn string_entries(field: Value) -> Value {
    match field {
        Value::Object(map) => Value::Object(map.into_iter().filter(|(_, v)| v.is_string()).collect()),
        other => other,
    }
}

fn insert_path(map: &mut Map<String, Value>, path: &[&str], value: Value) {
    match path {
        [] => {}
        [last] => {
            map.insert((*last).to_string(), value);
        }
        [first, rest @ ..] => {
            let slot = map.entry((*first).to_string()).or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(inner) = slot {
                insert_path(inner, rest, value);
            }
        }
    }
}
