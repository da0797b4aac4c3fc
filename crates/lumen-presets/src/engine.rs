//! Moving records between live state and storage.
//!
//! Capture turns a staged [`SaveRequest`] into the record that gets stored.
//! Dispatch hands a loaded record to live state, either as an API command or
//! as state, after stripping chained-preset requests that could recurse.

use serde_json::Value;

use lumen_core::record::{FIELD_CHAINED_PRESET, FIELD_LEDMAP, FIELD_NAME, FIELD_QUICK_LOAD};
use lumen_core::{
    CallMode, CaptureOptions, LiveState, PresetId, PresetRecord, PresetRequests, SaveRequest,
    SaveSource,
};

/// Name stored when a save request carries none.
pub const UNKNOWN_PRESET_NAME: &str = "Unknown preset";

/// Minimum number of `~` separators in a preset-cycle string.
const CYCLE_SEPARATORS: usize = 2;

/// Build the record to store for `request`.
///
/// State and playlist saves capture from `live` and then get the request's
/// name, quick-load tag and light-map index merged in. Verbatim saves are
/// stored as given, with a name added if they lack one.
pub fn capture<L: LiveState + ?Sized>(live: &L, request: &SaveRequest) -> PresetRecord {
    let mut record = match &request.source {
        SaveSource::Verbatim(record) => {
            let mut record = record.clone();
            if !record.contains(FIELD_NAME) {
                record.insert(FIELD_NAME, request.display_name());
            }
            return record;
        }
        SaveSource::Playlist => {
            let mut record = live.capture_playlist();
            if request.include_brightness {
                record.insert("on", true);
            }
            record
        }
        SaveSource::State => live.capture_state(CaptureOptions {
            include_brightness: request.include_brightness,
            include_bounds: request.include_bounds,
            selected_only: request.selected_only,
        }),
    };

    let name = request.name.as_deref().unwrap_or(UNKNOWN_PRESET_NAME);
    record.insert(FIELD_NAME, name);
    if let Some(tag) = request.quick_load.as_deref().filter(|tag| !tag.is_empty()) {
        record.insert(FIELD_QUICK_LOAD, tag);
    }
    if let Some(ledmap) = request.ledmap {
        record.insert(FIELD_LEDMAP, ledmap);
    }
    record
}

/// Returns true if `value` is a preset-cycle string such as `"1~5~"`.
pub fn is_cycle_request(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| s.matches('~').count() >= CYCLE_SEPARATORS)
}

/// Remove the chained-preset request unless `mode` may start a preset cycle.
///
/// Only a physical preset button may chain, and only into a cycle string;
/// anything else would let a preset re-trigger itself.
///
/// Returns true if a request was removed.
pub fn guard_chain(record: &mut PresetRecord, mode: CallMode) -> bool {
    let keep = mode.allows_preset_cycle()
        && record
            .get(FIELD_CHAINED_PRESET)
            .is_some_and(is_cycle_request);
    !keep && record.remove(FIELD_CHAINED_PRESET).is_some()
}

/// Hand `record` to live state.
///
/// Command presets go to [`LiveState::apply_command`]; everything else is
/// applied as state without a network notification.
pub fn dispatch<L: LiveState + ?Sized>(
    live: &mut L,
    mut record: PresetRecord,
    id: PresetId,
    mode: CallMode,
    requests: &PresetRequests,
) {
    if let Some(command) = record.command() {
        tracing::debug!(%id, command, "applying command preset");
        live.apply_command(command, requests);
        return;
    }
    if guard_chain(&mut record, mode) {
        tracing::debug!(%id, ?mode, "chained preset request dropped");
    }
    live.apply_state(&record, CallMode::NoNotify, id, requests);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        applied: Vec<(PresetRecord, CallMode, PresetId)>,
        commands: Vec<String>,
    }

    impl LiveState for Recorder {
        fn capture_state(&self, _options: CaptureOptions) -> PresetRecord {
            PresetRecord::new().with_field("bri", 77)
        }

        fn capture_playlist(&self) -> PresetRecord {
            PresetRecord::new().with_field("playlist", json!({ "ps": [3, 4] }))
        }

        fn apply_state(
            &mut self,
            record: &PresetRecord,
            mode: CallMode,
            source: PresetId,
            _requests: &PresetRequests,
        ) {
            self.applied.push((record.clone(), mode, source));
        }

        fn apply_command(&mut self, command: &str, _requests: &PresetRequests) {
            self.commands.push(command.to_string());
        }
    }

    struct OptionsProbe(std::cell::Cell<Option<CaptureOptions>>);

    impl LiveState for OptionsProbe {
        fn capture_state(&self, options: CaptureOptions) -> PresetRecord {
            self.0.set(Some(options));
            PresetRecord::new()
        }

        fn capture_playlist(&self) -> PresetRecord {
            PresetRecord::new()
        }

        fn apply_state(&mut self, _: &PresetRecord, _: CallMode, _: PresetId, _: &PresetRequests) {}
    }

    fn request(raw: u8) -> SaveRequest {
        SaveRequest::new(PresetId::new(raw)).unwrap()
    }

    #[test]
    fn test_capture_state_merges_metadata() {
        let live = Recorder::default();
        let req = request(4).with_name("Dusk").with_quick_load("D").with_ledmap(2);
        let record = capture(&live, &req);
        assert_eq!(record.name(), Some("Dusk"));
        assert_eq!(record.quick_load(), Some("D"));
        assert_eq!(record.ledmap(), Some(2));
        assert_eq!(record.get("bri"), Some(&json!(77)));
    }

    #[test]
    fn test_capture_without_name_uses_placeholder() {
        let record = capture(&Recorder::default(), &request(4));
        assert_eq!(record.name(), Some(UNKNOWN_PRESET_NAME));
        assert!(!record.contains(FIELD_QUICK_LOAD));
        assert!(!record.contains(FIELD_LEDMAP));
    }

    #[test]
    fn test_capture_passes_options() {
        let probe = OptionsProbe(std::cell::Cell::new(None));
        let req = request(4)
            .with_brightness(false)
            .with_bounds(false)
            .with_selected_only(true);
        capture(&probe, &req);
        assert_eq!(
            probe.0.get(),
            Some(CaptureOptions {
                include_brightness: false,
                include_bounds: false,
                selected_only: true,
            })
        );
    }

    #[test]
    fn test_capture_playlist_turns_on() {
        let record = capture(&Recorder::default(), &request(6).with_name("PL").as_playlist());
        assert_eq!(record.get("on"), Some(&json!(true)));
        assert!(record.contains("playlist"));
        assert_eq!(record.name(), Some("PL"));
    }

    #[test]
    fn test_capture_verbatim_untouched() {
        let stored = PresetRecord::new().with_field("win", "T=2").with_name("Toggle");
        let req = request(9).with_quick_load("T").verbatim(stored.clone()).unwrap();
        assert_eq!(capture(&Recorder::default(), &req), stored);

        let unnamed = PresetRecord::new().with_field("win", "A=5");
        let req = request(9).verbatim(unnamed).unwrap();
        assert_eq!(capture(&Recorder::default(), &req).name(), Some("Preset 9"));
    }

    #[test]
    fn test_cycle_detection() {
        assert!(is_cycle_request(&json!("1~5~")));
        assert!(is_cycle_request(&json!("~~")));
        assert!(!is_cycle_request(&json!("1~5")));
        assert!(!is_cycle_request(&json!(3)));
    }

    #[test]
    fn test_guard_chain_by_mode() {
        let cycle = PresetRecord::new().with_field("ps", "1~5~");
        let plain = PresetRecord::new().with_field("ps", 3);

        let mut r = cycle.clone();
        assert!(!guard_chain(&mut r, CallMode::ButtonPreset));
        assert!(r.contains("ps"));

        let mut r = cycle;
        assert!(guard_chain(&mut r, CallMode::Button));
        assert!(!r.contains("ps"));

        let mut r = plain;
        assert!(guard_chain(&mut r, CallMode::ButtonPreset));
        assert!(!r.contains("ps"));

        let mut r = PresetRecord::new();
        assert!(!guard_chain(&mut r, CallMode::DirectChange));
    }

    #[test]
    fn test_dispatch_routes_commands() {
        let mut live = Recorder::default();
        let requests = PresetRequests::new();
        let record = PresetRecord::new().with_field("win", "T=2").with_field("ps", 4);
        dispatch(&mut live, record, PresetId::new(1), CallMode::Button, &requests);
        assert_eq!(live.commands, vec!["T=2".to_string()]);
        assert!(live.applied.is_empty());
    }

    #[test]
    fn test_dispatch_state_without_notify() {
        let mut live = Recorder::default();
        let requests = PresetRequests::new();
        let record = PresetRecord::new().with_field("on", true).with_field("ps", 4);
        dispatch(&mut live, record, PresetId::new(7), CallMode::WebSocket, &requests);
        let (applied, mode, source) = &live.applied[0];
        assert_eq!(*mode, CallMode::NoNotify);
        assert_eq!(*source, PresetId::new(7));
        assert!(!applied.contains("ps"));
    }
}
