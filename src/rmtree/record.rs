//! Loading of the `.metadata` and `.content` records of an entity.

use crate::error::{RmTreeError, Result};
use crate::store::DataStore;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

/// The `.metadata` record. Fields the tool does not use are ignored.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MetadataRecord {
    #[serde(rename = "visibleName")]
    pub visible_name: String,
    pub parent: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// The `.content` record, kept as raw JSON: its shape depends on the format
/// version and is interpreted by [`crate::content`].
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRecord {
    pub id: Uuid,
    pub raw: Value,
}

impl ContentRecord {
    pub fn new(id: Uuid, raw: Value) -> Self {
        Self { id, raw }
    }

    /// The `formatVersion` field, if present and integral.
    pub fn format_version(&self) -> Option<i64> {
        self.raw.get("formatVersion").and_then(Value::as_i64)
    }

    pub fn has_field(&self, path: &[&str]) -> bool {
        self.field(path).is_some()
    }

    pub fn field(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(&self.raw, |value, key| value.get(key))
    }
}

pub fn metadata_name(id: &Uuid) -> String {
    format!("{}.metadata", id)
}

pub fn content_name(id: &Uuid) -> String {
    format!("{}.content", id)
}

pub fn load_metadata<S: DataStore>(store: &S, id: &Uuid) -> Result<MetadataRecord> {
    let name = metadata_name(id);
    let text = store.read_to_string(&name)?;
    serde_json::from_str(&text).map_err(|e| RmTreeError::malformed(name, e.to_string()))
}

pub fn load_content<S: DataStore>(store: &S, id: &Uuid) -> Result<ContentRecord> {
    let name = content_name(id);
    let text = store.read_to_string(&name)?;
    let raw: Value =
        serde_json::from_str(&text).map_err(|e| RmTreeError::malformed(&name, e.to_string()))?;
    if !raw.is_object() {
        return Err(RmTreeError::malformed(name, "expected a JSON object"));
    }
    Ok(ContentRecord::new(*id, raw))
}

/// Loads both records of an entity.
pub fn load<S: DataStore>(store: &S, id: &Uuid) -> Result<(MetadataRecord, ContentRecord)> {
    let metadata = load_metadata(store, id)?;
    let content = load_content(store, id)?;
    Ok((metadata, content))
}
