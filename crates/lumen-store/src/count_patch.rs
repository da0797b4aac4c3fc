//! Preset count embedded in preset-switch shortcuts.
//!
//! A preset-switch shortcut is a command preset whose `win` string cycles
//! through a preset range, e.g. `P1=3&P2=9&PL=~` ("cycle 3..=9"). The upper
//! bound must track the number of stored presets, so after every durable save
//! or delete the digits between the `&P2=` marker and the following `&PL=`
//! marker are replaced with the current count.
//!
//! The rewrite is a literal text splice so the file format stays compatible
//! with firmware that reads these strings directly.

use serde_json::{Map, Value};

use lumen_core::PresetId;
use lumen_core::record::FIELD_COMMAND;

/// Marker preceding the embedded count.
pub const COUNT_PREFIX: &str = "&P2=";

/// Marker following the embedded count.
pub const COUNT_SUFFIX: &str = "&PL=";

/// Splice `count` between the markers of `command`.
///
/// Returns `None` if a marker is missing, the suffix does not follow the
/// prefix, or the string already carries `count`.
///
/// # Example
///
/// ```rust
/// use lumen_store::count_patch::splice;
///
/// assert_eq!(splice("P1=3&P2=9&PL=~", 12).as_deref(), Some("P1=3&P2=12&PL=~"));
/// assert_eq!(splice("P1=3&P2=12&PL=~", 12), None); // unchanged
/// assert_eq!(splice("T=2", 12), None);             // no marker
/// assert_eq!(splice("P1=3&P2=9", 12), None);       // no suffix
/// ```
pub fn splice(command: &str, count: usize) -> Option<String> {
    let start = command.find(COUNT_PREFIX)? + COUNT_PREFIX.len();
    let end = start + command[start..].find(COUNT_SUFFIX)?;
    let digits = count.to_string();
    if command[start..end] == digits {
        return None;
    }
    let mut patched = String::with_capacity(command.len() + digits.len());
    patched.push_str(&command[..start]);
    patched.push_str(&digits);
    patched.push_str(&command[end..]);
    Some(patched)
}

/// Number of records in a tier document, not counting the placeholder.
pub fn count_records(doc: &Map<String, Value>) -> usize {
    doc.keys()
        .filter(|key| PresetId::from_key(key).is_none_or(|id| !id.is_placeholder()))
        .count()
}

/// Rewrite every count marker in `doc` to the current record count.
///
/// Returns the number of records that were changed.
pub fn apply(doc: &mut Map<String, Value>) -> usize {
    let count = count_records(doc);
    let mut patched = 0;
    for record in doc.values_mut() {
        let Some(Value::String(command)) = record
            .as_object_mut()
            .and_then(|fields| fields.get_mut(FIELD_COMMAND))
        else {
            continue;
        };
        if let Some(updated) = splice(command, count) {
            tracing::debug!(from = %command, to = %updated, "preset count patched");
            *command = updated;
            patched += 1;
        }
    }
    patched
}
