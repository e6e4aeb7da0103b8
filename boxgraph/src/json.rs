//! Persisted resource (de)serialization.

use crate::error::{EditorError, Result};
use crate::hash;
use crate::pending::ResourceKind;
use crate::store::DocumentStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One persisted resource as exchanged with the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: ResourceKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    pub body: Value,
}

impl Resource {
    pub fn new(kind: ResourceKind, name: impl Into<String>, body: Value) -> Resource {
        Resource {
            kind,
            name: name.into(),
            hash: None,
            body,
        }
    }

    /// The remote hash when given, otherwise the canonical content hash.
    pub fn effective_hash(&self) -> String {
        match &self.hash {
            Some(h) => h.clone(),
            None => hash::content_hash(&self.body),
        }
    }
}

pub fn parse_resource<T: DeserializeOwned>(body: Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| EditorError::InvalidDocument(e.to_string()))
}

/// Parses a user-entered custom-config blob. Blank input clears the config.
pub fn parse_custom_config(text: &str) -> Result<Option<Value>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(text)
        .map(Some)
        .map_err(|e| EditorError::MalformedConfig(e.to_string()))
}

fn to_body<T: Serialize>(t: &T) -> Result<Value> {
    serde_json::to_value(t).map_err(EditorError::from)
}

/// The store's full resource set in persisted shape, unknown fields included.
pub fn export_resources(store: &DocumentStore) -> Result<Vec<Resource>> {
    let mut out = Vec::new();
    for b in store.boxes() {
        out.push(Resource::new(ResourceKind::Box, &b.name, to_body(b)?));
    }
    for d in store.link_documents() {
        out.push(Resource::new(ResourceKind::LinkDefinition, &d.name, to_body(d)?));
    }
    for d in store.dictionaries() {
        out.push(Resource::new(ResourceKind::Dictionary, &d.name, to_body(d)?));
    }
    if let (Some(name), Some(s)) = (store.settings_name(), store.settings()) {
        out.push(Resource::new(ResourceKind::Settings, name, s.clone()));
    }
    for r in &mut out {
        r.hash = Some(hash::content_hash(&r.body));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoxEntity;
    use serde_json::json;

    #[test]
    fn custom_config_errors_are_malformed_config() {
        assert_eq!(parse_custom_config("  ").unwrap(), None);
        assert_eq!(parse_custom_config("{\"a\":1}").unwrap(), Some(json!({"a": 1})));
        let err = parse_custom_config("{a:").unwrap_err();
        assert_eq!(err.code(), "malformed_config");
    }

    #[test]
    fn parse_rejects_wrong_shape() {
        let err = parse_resource::<BoxEntity>(json!({"spec": {}})).unwrap_err();
        assert_eq!(err.code(), "invalid_document");
    }

    #[test]
    fn export_keeps_unknown_fields() {
        let mut s = DocumentStore::default();
        let raw = json!({"name": "a", "kind": "Box", "spec": {"type": "t", "pins": [], "replicas": 3}});
        s.create_box(parse_resource(raw.clone()).unwrap(), false).unwrap();
        let out = export_resources(&s).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].body, raw);
        assert_eq!(out[0].hash.as_deref(), Some(hash::content_hash(&raw).as_str()));
    }
}
