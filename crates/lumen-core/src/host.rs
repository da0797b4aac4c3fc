//! Traits implemented by the host firmware.
//!
//! The preset subsystem never touches pixels, effects or the network itself.
//! It talks to the rest of the controller through these collaborators:
//!
//! - [`Renderer`] - the frame loop, quiesced around saves
//! - [`LiveState`] - converts live lighting state to and from records
//! - [`Notifier`] - informed after saves, deletes and applies

use std::time::SystemTime;

use crate::request::PresetRequests;
use crate::{CallMode, PresetId, PresetRecord};

/// The real-time rendering loop.
///
/// Saves must not read renderer-owned state while a frame is being drawn. The
/// scheduler calls [`suspend`](Renderer::suspend) and
/// [`resume`](Renderer::resume) symmetrically around every save and waits a
/// bounded time for [`is_updating`](Renderer::is_updating) to drop.
pub trait Renderer {
    /// Stop starting new frames.
    fn suspend(&mut self);

    /// Resume frame output.
    fn resume(&mut self);

    /// Returns true while a frame is in flight.
    fn is_updating(&self) -> bool;
}

/// What a state capture should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Power state and master brightness.
    pub include_brightness: bool,
    /// Segment start/stop bounds.
    pub include_bounds: bool,
    /// Only segments currently selected.
    pub selected_only: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            include_brightness: true,
            include_bounds: true,
            selected_only: false,
        }
    }
}

/// Live lighting state.
///
/// `apply_state` and `apply_command` receive the request handle so that
/// chained presets (playlists, `ps` cycles, `PL=` commands) can stage the next
/// apply. The scheduler services it on a later tick, so chains never recurse.
pub trait LiveState {
    /// Serialize the live state into a record.
    fn capture_state(&self, options: CaptureOptions) -> PresetRecord;

    /// Serialize the running playlist into a record.
    fn capture_playlist(&self) -> PresetRecord;

    /// Apply a record to live state.
    fn apply_state(
        &mut self,
        record: &PresetRecord,
        mode: CallMode,
        source: PresetId,
        requests: &PresetRequests,
    );

    /// Execute an HTTP-API command string stored in a command preset.
    fn apply_command(&mut self, command: &str, requests: &PresetRequests) {
        let _ = (command, requests);
    }

    /// Stop the running playlist, if any.
    fn unload_playlist(&mut self) {}

    /// Show `effect` with `palette`; used when an applied preset is missing.
    fn apply_fallback(&mut self, effect: u8, palette: u8) {
        let _ = (effect, palette);
    }
}

/// Change notifications for metadata caches, UI and sync.
pub trait Notifier {
    /// The stored presets changed (save or delete).
    fn presets_changed(&mut self, at: SystemTime) {
        let _ = at;
    }

    /// A preset was applied. `changed` is true if live state was modified.
    fn preset_applied(&mut self, id: PresetId, mode: CallMode, changed: bool) {
        let _ = (id, mode, changed);
    }
}

/// A notifier that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {}
