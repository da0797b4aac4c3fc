//! Staged save and apply requests.
//!
//! Callers never perform preset I/O themselves. Button handlers, network
//! handlers and the live-state deserializer (for chained presets) stage a
//! request through a [`PresetRequests`] handle and return immediately; the
//! scheduler drains at most one request per poll tick.
//!
//! Each request kind has a single [`Mailbox`] slot. Posting into an occupied
//! slot overwrites it (last write wins) and hands the displaced request back
//! to the caller.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;

use crate::record::{
    FIELD_BOOT_PRESET, FIELD_LEDMAP, FIELD_NAME, FIELD_QUICK_LOAD, PresetRecord, clamp_name,
    clamp_quick_load,
};
use crate::{CallMode, PresetId};

/// Fields stripped from an API command before it is saved verbatim.
const TRANSIENT_COMMAND_FIELDS: &[&str] = &["o", "v", "time", "error", "psave"];

/// Errors raised when a request is rejected at staging time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The id is reserved or outside the saveable range.
    #[error("preset id {0} cannot be saved")]
    NotSaveable(PresetId),

    /// The placeholder id was used as an apply target.
    #[error("preset id {0} cannot be applied")]
    NotApplicable(PresetId),

    /// API commands may only be saved to the persistent range.
    #[error("API commands cannot be saved to the quick slot")]
    CommandToQuickSlot,
}

/// A depth-1, overwrite-on-full, single-consumer slot.
///
/// # Example
///
/// ```rust
/// use lumen_core::Mailbox;
///
/// let mailbox = Mailbox::new();
/// assert_eq!(mailbox.post(1), None);
/// assert_eq!(mailbox.post(2), Some(1)); // overwritten
/// assert_eq!(mailbox.take(), Some(2));
/// assert!(!mailbox.is_pending());
/// ```
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Mailbox<T> {
    /// Creates an empty mailbox.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Stores a value, returning the one it displaced.
    pub fn post(&self, value: T) -> Option<T> {
        self.slot.lock().replace(value)
    }

    /// Removes and returns the pending value.
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    /// Puts a value back only if nothing newer was posted meanwhile.
    ///
    /// Returns `true` if the value was restored.
    pub fn restore(&self, value: T) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        true
    }

    /// Returns true if a value is pending.
    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Drops any pending value.
    pub fn clear(&self) {
        self.slot.lock().take();
    }
}

impl<T: Clone> Mailbox<T> {
    /// Returns a copy of the pending value without consuming it.
    pub fn peek(&self) -> Option<T> {
        self.slot.lock().clone()
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Effect and palette to fall back to when an applied preset does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fallback {
    /// Effect index.
    pub effect: u8,
    /// Palette index.
    pub palette: u8,
}

/// A staged request to apply a preset to live state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyRequest {
    /// Preset to apply.
    pub id: PresetId,
    /// Origin of the request.
    pub mode: CallMode,
    /// Stop any running playlist before applying.
    pub unload_playlist: bool,
    /// What to show if the preset does not exist.
    pub fallback: Option<Fallback>,
}

impl ApplyRequest {
    /// A regular apply request. Running playlists are unloaded first.
    pub fn new(id: PresetId, mode: CallMode) -> Self {
        Self {
            id,
            mode,
            unload_playlist: true,
            fallback: None,
        }
    }

    /// An apply request issued by a running playlist; the playlist keeps running.
    pub fn from_playlist(id: PresetId) -> Self {
        Self {
            id,
            mode: CallMode::DirectChange,
            unload_playlist: false,
            fallback: None,
        }
    }

    /// Attach a fallback effect and palette.
    pub fn with_fallback(mut self, effect: u8, palette: u8) -> Self {
        self.fallback = Some(Fallback { effect, palette });
        self
    }
}

/// What a save request captures.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SaveSource {
    /// Full live state.
    #[default]
    State,
    /// The running playlist.
    Playlist,
    /// A caller-supplied object, stored as-is (API command presets).
    Verbatim(PresetRecord),
}

/// A staged request to save a preset.
///
/// Built incrementally by the caller, then handed to
/// [`PresetRequests::request_save`] as a unit.
///
/// # Example
///
/// ```rust
/// use lumen_core::{PresetId, SaveRequest};
///
/// let request = SaveRequest::new(PresetId::new(5))
///     .unwrap()
///     .with_name("Sunset")
///     .with_quick_load("S")
///     .with_brightness(true);
///
/// assert_eq!(request.display_name(), "Sunset");
/// assert!(!request.is_playlist());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    /// Target id.
    pub id: PresetId,
    /// Preset name, at most 32 characters.
    pub name: Option<String>,
    /// Quick-load tag, at most 8 bytes.
    pub quick_load: Option<String>,
    /// Capture brightness and power state.
    pub include_brightness: bool,
    /// Capture segment bounds.
    pub include_bounds: bool,
    /// Capture only selected segments.
    pub selected_only: bool,
    /// Light-map index to reference.
    pub ledmap: Option<u8>,
    /// Boot preset to adopt when this save is serviced.
    pub boot_preset: Option<PresetId>,
    /// What to capture.
    pub source: SaveSource,
}

impl SaveRequest {
    /// Start a state save to `id`.
    pub fn new(id: PresetId) -> Result<Self, RequestError> {
        if !id.is_saveable() {
            return Err(RequestError::NotSaveable(id));
        }
        Ok(Self {
            id,
            name: None,
            quick_load: None,
            include_brightness: true,
            include_bounds: true,
            selected_only: false,
            ledmap: None,
            boot_preset: None,
            source: SaveSource::State,
        })
    }

    /// Set the name, truncated to 32 characters.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(clamp_name(name));
        self
    }

    /// Set the quick-load tag, truncated to 8 bytes. An empty tag clears it.
    pub fn with_quick_load(mut self, tag: &str) -> Self {
        let tag = clamp_quick_load(tag);
        self.quick_load = (!tag.is_empty()).then_some(tag);
        self
    }

    /// Capture brightness and power state.
    pub fn with_brightness(mut self, include: bool) -> Self {
        self.include_brightness = include;
        self
    }

    /// Capture segment bounds.
    pub fn with_bounds(mut self, include: bool) -> Self {
        self.include_bounds = include;
        self
    }

    /// Capture only selected segments.
    pub fn with_selected_only(mut self, selected_only: bool) -> Self {
        self.selected_only = selected_only;
        self
    }

    /// Reference a light-map index.
    pub fn with_ledmap(mut self, ledmap: u8) -> Self {
        self.ledmap = Some(ledmap);
        self
    }

    /// Adopt `id` as the boot preset when this save is serviced.
    pub fn with_boot_preset(mut self, id: PresetId) -> Self {
        self.boot_preset = Some(id);
        self
    }

    /// Capture the running playlist instead of the full state.
    pub fn as_playlist(mut self) -> Self {
        self.source = SaveSource::Playlist;
        self.include_brightness = true;
        self
    }

    /// Store `record` as-is instead of capturing live state.
    pub fn verbatim(mut self, record: PresetRecord) -> Result<Self, RequestError> {
        if self.id.is_quick() {
            return Err(RequestError::CommandToQuickSlot);
        }
        self.source = SaveSource::Verbatim(record);
        Ok(self)
    }

    /// Returns true for playlist saves.
    pub fn is_playlist(&self) -> bool {
        matches!(self.source, SaveSource::Playlist)
    }

    /// The name to store: the staged name, or `"Preset {id}"`.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Preset {}", self.id))
    }

    /// Build a save request from an API-style save object.
    ///
    /// - The name comes from `name`, then the object's `n`, then `"Preset {id}"`.
    /// - `ql` sets the quick-load tag; `bootps` sets the boot preset and is
    ///   removed from the object.
    /// - Without an `o` field the object describes a state save: `ib`, `sb`,
    ///   `sc` and `ledmap` select what is captured. An empty object, or the
    ///   quick slot, always includes brightness and bounds.
    /// - With `o` but no `playlist`, the object is an API command stored
    ///   verbatim, minus transient fields.
    /// - With `o` and `playlist`, the running playlist is saved.
    pub fn from_command(
        id: PresetId,
        name: Option<&str>,
        command: &PresetRecord,
    ) -> Result<Self, RequestError> {
        let mut command = command.clone();
        let mut request = Self::new(id)?;

        let name = match name {
            Some(name) => clamp_name(name),
            None => command
                .name()
                .map(clamp_name)
                .unwrap_or_else(|| format!("Preset {id}")),
        };
        request.name = Some(name.clone());
        if let Some(tag) = command.get(FIELD_QUICK_LOAD).and_then(Value::as_str) {
            request = request.with_quick_load(tag);
        }
        request.boot_preset = command
            .remove(FIELD_BOOT_PRESET)
            .and_then(|v| v.as_u64())
            .and_then(|v| u8::try_from(v).ok())
            .map(PresetId::new);

        if command.is_empty() || !command.contains("o") {
            let forced = command.is_empty() || id.is_quick();
            request.include_brightness = truthy(command.get("ib")) || forced;
            request.include_bounds = truthy(command.get("sb")) || forced;
            request.selected_only = truthy(command.get("sc"));
            request.ledmap = command
                .get(FIELD_LEDMAP)
                .and_then(Value::as_u64)
                .and_then(|v| u8::try_from(v).ok());
        } else if !command.contains("playlist") {
            for field in TRANSIENT_COMMAND_FIELDS {
                command.remove(field);
            }
            if !command.contains(FIELD_NAME) {
                command.insert(FIELD_NAME, name);
            }
            request = request.verbatim(command)?;
        } else {
            request = request.as_playlist();
        }

        Ok(request)
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    }
}

#[derive(Debug, Default)]
struct Queues {
    save: Mailbox<SaveRequest>,
    apply: Mailbox<ApplyRequest>,
}

/// Cloneable handle for staging preset requests.
///
/// All methods only touch the staging slots and never block on I/O, so the
/// handle can be used from button handlers, network callbacks, other threads,
/// or from inside the live-state deserializer while a preset is being applied.
///
/// # Example
///
/// ```rust
/// use lumen_core::{CallMode, PresetId, PresetRequests, SaveRequest};
///
/// let requests = PresetRequests::new();
/// let button = requests.clone();
///
/// button.request_apply(PresetId::new(3), CallMode::ButtonPreset);
/// requests.request_save(SaveRequest::new(PresetId::new(4)).unwrap());
///
/// assert!(requests.save_pending());
/// assert!(requests.apply_pending());
/// ```
#[derive(Debug, Clone, Default)]
pub struct PresetRequests {
    inner: Arc<Queues>,
}

impl PresetRequests {
    /// Creates a handle with empty slots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a save, returning the request it displaced.
    pub fn request_save(&self, request: SaveRequest) -> Option<SaveRequest> {
        tracing::debug!(id = %request.id, name = ?request.name, "save requested");
        let displaced = self.inner.save.post(request);
        if let Some(old) = &displaced {
            tracing::debug!(id = %old.id, "pending save overwritten");
        }
        displaced
    }

    /// Stage a save described by an API-style save object.
    ///
    /// See [`SaveRequest::from_command`] for how the object is interpreted.
    pub fn request_save_command(
        &self,
        id: PresetId,
        name: Option<&str>,
        command: &PresetRecord,
    ) -> Result<(), RequestError> {
        let request = SaveRequest::from_command(id, name, command)?;
        self.request_save(request);
        Ok(())
    }

    /// Stage an apply request, returning the request it displaced.
    pub fn submit_apply(&self, request: ApplyRequest) -> Result<Option<ApplyRequest>, RequestError> {
        if request.id.is_placeholder() {
            return Err(RequestError::NotApplicable(request.id));
        }
        tracing::debug!(id = %request.id, mode = ?request.mode, "apply requested");
        Ok(self.inner.apply.post(request))
    }

    /// Stage an apply of `id`. Running playlists are unloaded first.
    ///
    /// Returns `false` if the id cannot be applied.
    pub fn request_apply(&self, id: PresetId, mode: CallMode) -> bool {
        self.submit_apply(ApplyRequest::new(id, mode)).is_ok()
    }

    /// Stage an apply issued by a running playlist.
    pub fn request_apply_from_playlist(&self, id: PresetId) -> bool {
        self.submit_apply(ApplyRequest::from_playlist(id)).is_ok()
    }

    /// Stage an apply that falls back to `effect`/`palette` if `id` is missing.
    pub fn request_apply_with_fallback(
        &self,
        id: PresetId,
        mode: CallMode,
        effect: u8,
        palette: u8,
    ) -> bool {
        self.submit_apply(ApplyRequest::new(id, mode).with_fallback(effect, palette))
            .is_ok()
    }

    /// Returns true if a save is staged.
    pub fn save_pending(&self) -> bool {
        self.inner.save.is_pending()
    }

    /// Returns true if an apply is staged.
    pub fn apply_pending(&self) -> bool {
        self.inner.apply.is_pending()
    }

    /// Returns true if nothing is staged.
    pub fn is_idle(&self) -> bool {
        !self.save_pending() && !self.apply_pending()
    }

    /// Copy of the staged save, if any.
    pub fn pending_save(&self) -> Option<SaveRequest> {
        self.inner.save.peek()
    }

    /// Copy of the staged apply, if any.
    pub fn pending_apply(&self) -> Option<ApplyRequest> {
        self.inner.apply.peek()
    }

    /// Consume the staged save.
    pub fn take_save(&self) -> Option<SaveRequest> {
        self.inner.save.take()
    }

    /// Consume the staged apply.
    pub fn take_apply(&self) -> Option<ApplyRequest> {
        self.inner.apply.take()
    }

    /// Put a save back unless a newer one was staged meanwhile.
    pub fn restore_save(&self, request: SaveRequest) -> bool {
        self.inner.save.restore(request)
    }

    /// Drop every staged request.
    pub fn clear(&self) {
        self.inner.save.clear();
        self.inner.apply.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(raw: u8) -> PresetId {
        PresetId::new(raw)
    }

    #[test]
    fn test_mailbox_restore_yields_to_newer() {
        let mailbox = Mailbox::new();
        mailbox.post(1);
        let taken = mailbox.take().unwrap();
        mailbox.post(2);
        assert!(!mailbox.restore(taken));
        assert_eq!(mailbox.take(), Some(2));
        assert!(mailbox.restore(3));
        assert_eq!(mailbox.peek(), Some(3));
    }

    #[test]
    fn test_save_request_rejects_reserved_ids() {
        assert_eq!(
            SaveRequest::new(id(0)).unwrap_err(),
            RequestError::NotSaveable(id(0))
        );
        for raw in 251..=254 {
            assert!(SaveRequest::new(id(raw)).is_err());
        }
        assert!(SaveRequest::new(id(1)).is_ok());
        assert!(SaveRequest::new(id(250)).is_ok());
        assert!(SaveRequest::new(PresetId::QUICK).is_ok());
    }

    #[test]
    fn test_quick_load_clamped_and_empty_cleared() {
        let request = SaveRequest::new(id(1)).unwrap().with_quick_load("ABCDEFGHIJK");
        assert_eq!(request.quick_load.as_deref(), Some("ABCDEFGH"));
        let request = request.with_quick_load("");
        assert_eq!(request.quick_load, None);
    }

    #[test]
    fn test_verbatim_rejected_for_quick_slot() {
        let result = SaveRequest::new(PresetId::QUICK)
            .unwrap()
            .verbatim(PresetRecord::new());
        assert_eq!(result.unwrap_err(), RequestError::CommandToQuickSlot);
    }

    #[test]
    fn test_command_empty_object_is_full_state_save() {
        let request = SaveRequest::from_command(id(7), None, &PresetRecord::new()).unwrap();
        assert_eq!(request.name.as_deref(), Some("Preset 7"));
        assert!(request.include_brightness);
        assert!(request.include_bounds);
        assert!(!request.selected_only);
        assert_eq!(request.source, SaveSource::State);
    }

    #[test]
    fn test_command_state_flags() {
        let command = PresetRecord::from_value(json!({
            "n": "Evening", "ql": "E", "ib": false, "sb": 1, "sc": true, "ledmap": 3
        }))
        .unwrap();
        let request = SaveRequest::from_command(id(9), None, &command).unwrap();
        assert_eq!(request.name.as_deref(), Some("Evening"));
        assert_eq!(request.quick_load.as_deref(), Some("E"));
        assert!(!request.include_brightness);
        assert!(request.include_bounds);
        assert!(request.selected_only);
        assert_eq!(request.ledmap, Some(3));
    }

    #[test]
    fn test_command_quick_slot_forces_brightness() {
        let command = PresetRecord::from_value(json!({ "ib": false })).unwrap();
        let request = SaveRequest::from_command(PresetId::QUICK, None, &command).unwrap();
        assert!(request.include_brightness);
        assert!(request.include_bounds);
    }

    #[test]
    fn test_command_explicit_name_wins() {
        let command = PresetRecord::new().with_name("From object");
        let request = SaveRequest::from_command(id(2), Some("Explicit"), &command).unwrap();
        assert_eq!(request.name.as_deref(), Some("Explicit"));
    }

    #[test]
    fn test_command_boot_preset_extracted() {
        let command = PresetRecord::from_value(json!({ "bootps": 4 })).unwrap();
        let request = SaveRequest::from_command(id(4), None, &command).unwrap();
        assert_eq!(request.boot_preset, Some(id(4)));
        // Only bootps was present, so this is a full state save.
        assert!(request.include_brightness);
    }

    #[test]
    fn test_command_verbatim_strips_transient_fields() {
        let command = PresetRecord::from_value(json!({
            "o": true, "v": true, "time": 123, "error": 0, "psave": 12, "win": "T=2"
        }))
        .unwrap();
        let request = SaveRequest::from_command(id(12), Some("Toggle"), &command).unwrap();
        let SaveSource::Verbatim(record) = &request.source else {
            panic!("expected verbatim save, got {:?}", request.source);
        };
        assert_eq!(record.command(), Some("T=2"));
        assert_eq!(record.name(), Some("Toggle"));
        for field in TRANSIENT_COMMAND_FIELDS {
            assert!(!record.contains(field), "{field} should be stripped");
        }
    }

    #[test]
    fn test_command_verbatim_rejected_for_quick_slot() {
        let command = PresetRecord::from_value(json!({ "o": true, "win": "T=2" })).unwrap();
        assert_eq!(
            SaveRequest::from_command(PresetId::QUICK, None, &command).unwrap_err(),
            RequestError::CommandToQuickSlot
        );
    }

    #[test]
    fn test_command_playlist_save() {
        let command =
            PresetRecord::from_value(json!({ "o": true, "playlist": { "ps": [1, 2] } })).unwrap();
        let request = SaveRequest::from_command(id(20), None, &command).unwrap();
        assert!(request.is_playlist());
        assert!(request.include_brightness);
    }

    #[test]
    fn test_requests_last_write_wins() {
        let requests = PresetRequests::new();
        let first = SaveRequest::new(id(1)).unwrap().with_name("First");
        let second = SaveRequest::new(id(1)).unwrap().with_name("Second");
        assert!(requests.request_save(first.clone()).is_none());
        assert_eq!(requests.request_save(second), Some(first));
        assert_eq!(
            requests.pending_save().unwrap().name.as_deref(),
            Some("Second")
        );
    }

    #[test]
    fn test_apply_placeholder_rejected() {
        let requests = PresetRequests::new();
        assert!(!requests.request_apply(PresetId::PLACEHOLDER, CallMode::DirectChange));
        assert!(!requests.apply_pending());
    }

    #[test]
    fn test_apply_variants() {
        let requests = PresetRequests::new();
        requests.request_apply_from_playlist(id(3));
        let pending = requests.take_apply().unwrap();
        assert!(!pending.unload_playlist);
        assert_eq!(pending.mode, CallMode::DirectChange);

        requests.request_apply_with_fallback(id(3), CallMode::Button, 9, 2);
        let pending = requests.take_apply().unwrap();
        assert!(pending.unload_playlist);
        assert_eq!(
            pending.fallback,
            Some(Fallback {
                effect: 9,
                palette: 2
            })
        );
    }

    #[test]
    fn test_clones_share_slots() {
        let requests = PresetRequests::new();
        let other = requests.clone();
        other.request_apply(id(8), CallMode::WebSocket);
        assert_eq!(requests.take_apply().map(|r| r.id), Some(id(8)));
        assert!(other.is_idle());
    }
}
