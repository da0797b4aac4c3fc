//! Preset record format and accessors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Maximum preset name length, in characters.
pub const MAX_NAME_CHARS: usize = 32;

/// Maximum quick-load tag length, in bytes.
pub const MAX_QUICK_LOAD_BYTES: usize = 8;

/// Field holding the preset name.
pub const FIELD_NAME: &str = "n";
/// Field holding the quick-load tag.
pub const FIELD_QUICK_LOAD: &str = "ql";
/// Field holding the referenced light-map index.
pub const FIELD_LEDMAP: &str = "ledmap";
/// Field holding an HTTP-API command string.
pub const FIELD_COMMAND: &str = "win";
/// Field holding a chained preset (or preset cycle) request.
pub const FIELD_CHAINED_PRESET: &str = "ps";
/// Field naming the boot preset; consumed at request time, never stored.
pub const FIELD_BOOT_PRESET: &str = "bootps";

/// Fields whose presence means applying the record changes live state.
const STATE_FIELDS: &[&str] = &["seg", "on", "bri", "nl", "ps", "playlist"];

/// A saved lighting configuration.
///
/// The payload is an opaque JSON object owned by the live-state serializer.
/// The store only reads the handful of fields exposed by the accessors below
/// and otherwise preserves the object as-is. Records are replaced wholesale on
/// save, never merged.
///
/// # JSON Format
///
/// ```json
/// {
///   "n": "Sunset",
///   "ql": "S",
///   "on": true,
///   "bri": 180,
///   "seg": [{ "id": 0, "fx": 65, "pal": 3 }]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetRecord(Map<String, Value>);

impl PresetRecord {
    /// Create a new empty record.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wrap an existing JSON object.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Convert a JSON value into a record, if it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Parse a record from a JSON string. The root must be an object.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the record to a compact JSON string.
    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    /// Borrow the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Mutably borrow the underlying JSON object.
    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    /// Unwrap into the underlying JSON object.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Get a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set a field, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Check whether a field is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of top-level fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Set a field, builder style.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set the name, truncated to [`MAX_NAME_CHARS`].
    pub fn with_name(mut self, name: &str) -> Self {
        self.insert(FIELD_NAME, clamp_name(name));
        self
    }

    /// Preset name, if present.
    pub fn name(&self) -> Option<&str> {
        self.0.get(FIELD_NAME).and_then(Value::as_str)
    }

    /// Quick-load tag, if present and non-empty.
    pub fn quick_load(&self) -> Option<&str> {
        self.0
            .get(FIELD_QUICK_LOAD)
            .and_then(Value::as_str)
            .filter(|tag| !tag.is_empty())
    }

    /// Referenced light-map index, if present.
    pub fn ledmap(&self) -> Option<u8> {
        self.0
            .get(FIELD_LEDMAP)
            .and_then(Value::as_u64)
            .and_then(|v| u8::try_from(v).ok())
    }

    /// HTTP-API command string, if the record is a command preset.
    pub fn command(&self) -> Option<&str> {
        self.0.get(FIELD_COMMAND).and_then(Value::as_str)
    }

    /// Returns true if applying this record changes live state.
    pub fn changes_state(&self) -> bool {
        self.command().is_some() || STATE_FIELDS.iter().any(|f| self.0.contains_key(*f))
    }
}

impl From<Map<String, Value>> for PresetRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<PresetRecord> for Value {
    fn from(record: PresetRecord) -> Self {
        Value::Object(record.0)
    }
}

/// Truncate a name to at most [`MAX_NAME_CHARS`] characters.
pub fn clamp_name(name: &str) -> String {
    name.chars().take(MAX_NAME_CHARS).collect()
}

/// Truncate a quick-load tag to at most [`MAX_QUICK_LOAD_BYTES`] bytes,
/// without splitting a character.
///
/// ```rust
/// use lumen_core::record::clamp_quick_load;
///
/// assert_eq!(clamp_quick_load("AB"), "AB");
/// assert_eq!(clamp_quick_load("ABCDEFGHIJ"), "ABCDEFGH");
/// // Each heart is 3 bytes; only two fit in 8 bytes.
/// assert_eq!(clamp_quick_load("♥♥♥"), "♥♥");
/// ```
pub fn clamp_quick_load(tag: &str) -> String {
    let mut end = tag.len().min(MAX_QUICK_LOAD_BYTES);
    while !tag.is_char_boundary(end) {
        end -= 1;
    }
    tag[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_from_json() {
        let record = PresetRecord::from_json(r#"{"n":"Sunset","ql":"S","bri":180,"ledmap":2}"#)
            .unwrap();
        assert_eq!(record.name(), Some("Sunset"));
        assert_eq!(record.quick_load(), Some("S"));
        assert_eq!(record.ledmap(), Some(2));
        assert!(record.changes_state());
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(PresetRecord::from_json("[1,2,3]").is_err());
        assert!(PresetRecord::from_json("\"text\"").is_err());
        assert!(PresetRecord::from_value(json!(5)).is_none());
    }

    #[test]
    fn test_empty_quick_load_is_none() {
        let record = PresetRecord::new().with_field(FIELD_QUICK_LOAD, "");
        assert_eq!(record.quick_load(), None);
    }

    #[test]
    fn test_ledmap_out_of_range() {
        let record = PresetRecord::new().with_field(FIELD_LEDMAP, 300);
        assert_eq!(record.ledmap(), None);
    }

    #[test]
    fn test_changes_state() {
        assert!(!PresetRecord::new().changes_state());
        assert!(!PresetRecord::new().with_name("Only a name").changes_state());
        assert!(PresetRecord::new().with_field("on", true).changes_state());
        assert!(PresetRecord::new().with_field("playlist", json!({})).changes_state());
        assert!(PresetRecord::new().with_field(FIELD_COMMAND, "T=2").changes_state());
    }

    #[test]
    fn test_clamp_name() {
        let long = "x".repeat(40);
        assert_eq!(clamp_name(&long).chars().count(), MAX_NAME_CHARS);
        assert_eq!(clamp_name("Sunset"), "Sunset");
    }

    #[test]
    fn test_to_json_roundtrip() {
        let record = PresetRecord::new()
            .with_name("Roundtrip")
            .with_field("seg", json!([{ "fx": 65 }]));
        let parsed = PresetRecord::from_json(&record.to_json()).unwrap();
        assert_eq!(parsed, record);
    }
}
