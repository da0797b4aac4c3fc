//! Factory presets written to a fresh durable file.
//!
//! The factory layout ships two command presets (a power toggle and a preset
//! switch that cycles the stored scenes) followed by two scenes. The command
//! presets are protected from overwrite and delete in the default
//! configuration, see [`FACTORY_PROTECTED_IDS`].

use serde_json::{Map, Value, json};

use lumen_core::{PresetId, PresetRecord};

/// Names of the factory presets, in id order starting at 1.
pub static FACTORY_PRESET_NAMES: &[&str] = &["OnOff", "PresetSwitch", "BlueGreen", "C9"];

/// Ids of the factory presets that must not be overwritten or deleted.
pub const FACTORY_PROTECTED_IDS: &[u8] = &[1, 2];

/// Number of empty stop entries following the first segment of a scene.
const SCENE_PADDING_SEGMENTS: usize = 32;

/// Power toggle.
const ON_OFF_PRESET: &str = r#"{"win":"T=2","n":"OnOff"}"#;

/// Cycles presets 3 up to the stored preset count.
const PRESET_SWITCH_PRESET: &str = r#"{"win":"P1=3&P2=9&PL=~","n":"PresetSwitch"}"#;

/// A full-strip scene on effect 65 with the given palette.
fn scene(name: &str, palette: u8) -> Value {
    let mut segments = vec![json!({
        "id": 0,
        "start": 0,
        "stop": 18,
        "grp": 1,
        "spc": 0,
        "of": 0,
        "on": true,
        "frz": false,
        "bri": 255,
        "cct": 127,
        "set": 0,
        "n": "",
        "col": [[0, 0, 255, 0], [8, 255, 0, 0], [0, 0, 0, 0]],
        "fx": 65,
        "sx": 128,
        "ix": 112,
        "pal": palette,
        "c1": 0,
        "c2": 128,
        "c3": 16,
        "sel": true,
        "rev": false,
        "mi": false,
        "o1": true,
        "o2": false,
        "o3": true,
        "si": 0,
        "m12": 0,
    })];
    segments.extend(std::iter::repeat_n(json!({ "stop": 0 }), SCENE_PADDING_SEGMENTS));

    json!({
        "on": true,
        "bri": 255,
        "transition": 7,
        "mainseg": 0,
        "seg": segments,
        "n": name,
    })
}

fn parse(json: &str) -> Option<PresetRecord> {
    PresetRecord::from_json(json).ok()
}

/// All factory presets with their ids.
///
/// # Example
///
/// ```rust
/// use lumen_store::factory::factory_presets;
///
/// let presets = factory_presets();
/// assert_eq!(presets.len(), 4);
/// assert_eq!(presets[0].1.command(), Some("T=2"));
/// ```
pub fn factory_presets() -> Vec<(PresetId, PresetRecord)> {
    let records = [
        parse(ON_OFF_PRESET),
        parse(PRESET_SWITCH_PRESET),
        PresetRecord::from_value(scene("BlueGreen", 3)),
        PresetRecord::from_value(scene("C9", 48)),
    ];
    (1u8..)
        .zip(records)
        .filter_map(|(raw, record)| record.map(|record| (PresetId::new(raw), record)))
        .collect()
}

/// Get a factory preset by name. The match is case-insensitive.
pub fn get_factory_preset(name: &str) -> Option<(PresetId, PresetRecord)> {
    factory_presets()
        .into_iter()
        .find(|(_, record)| record.name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
}

/// The complete factory durable document, including the placeholder.
pub fn factory_document() -> Map<String, Value> {
    let mut doc = Map::new();
    doc.insert(PresetId::PLACEHOLDER.key(), Value::Object(Map::new()));
    for (id, record) in factory_presets() {
        doc.insert(id.key(), Value::Object(record.into_map()));
    }
    doc
}
