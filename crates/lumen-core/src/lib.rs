//! Lumen Core - shared vocabulary for the lumen preset subsystem
//!
//! This crate defines the types every other lumen crate speaks: preset ids and
//! their reserved ranges, storage tiers, call modes, the opaque preset record,
//! the process-wide sticky status flag, the depth-1 request mailboxes, and the
//! traits the host implements for its renderer, live state and notifications.
//!
//! # Core Abstractions
//!
//! ## Identifiers
//!
//! - [`PresetId`] - Small integer preset id with reserved ranges
//! - [`Tier`] - Durable (file-backed) or ephemeral (quick slot) storage
//! - [`CallMode`] - Who triggered a request (button, network, playlist, ...)
//!
//! ## Data
//!
//! - [`PresetRecord`] - Opaque JSON object payload with a few recognized fields
//! - [`StatusFlag`] - Sticky error flag read by reporting collaborators
//!
//! ## Requests
//!
//! - [`PresetRequests`] - Cloneable, non-blocking handle for staging requests
//! - [`SaveRequest`] / [`ApplyRequest`] - The staged commands
//!
//! ## Host Collaborators
//!
//! - [`Renderer`] - Frame loop that must be quiesced during saves
//! - [`LiveState`] - Captures and applies live lighting state
//! - [`Notifier`] - Receives change notifications
//!
//! # Id Ranges
//!
//! - `0` - Placeholder, always present in every tier file, never real content
//! - `1..=250` - Persistent presets (durable tier)
//! - `251..=254` - Never saved
//! - `255` - Ephemeral quick slot (ephemeral tier or RAM cache)

pub mod host;
pub mod record;
pub mod request;
pub mod status;

pub use host::{CaptureOptions, LiveState, Notifier, NoopNotifier, Renderer};
pub use record::PresetRecord;
pub use request::{
    ApplyRequest, Fallback, Mailbox, PresetRequests, RequestError, SaveRequest, SaveSource,
};
pub use status::{ErrorFlag, StatusFlag};

use serde::{Deserialize, Serialize};
use std::fmt;

/// A preset identifier.
///
/// Preset ids are a single byte. The value space is split into reserved
/// ranges; see the crate documentation for the layout.
///
/// # Example
///
/// ```rust
/// use lumen_core::{PresetId, Tier};
///
/// let id = PresetId::new(5);
/// assert!(id.is_persistent());
/// assert_eq!(id.tier(), Tier::Durable);
/// assert_eq!(id.key(), "5");
///
/// assert!(PresetId::QUICK.is_saveable());
/// assert_eq!(PresetId::QUICK.tier(), Tier::Ephemeral);
///
/// assert!(!PresetId::new(252).is_saveable());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetId(u8);

impl PresetId {
    /// Empty placeholder id, present in every tier file.
    pub const PLACEHOLDER: Self = Self(0);

    /// Ephemeral quick slot.
    pub const QUICK: Self = Self(255);

    /// Highest id that may be saved to the durable tier.
    pub const MAX_PERSISTENT: u8 = 250;

    /// Creates a preset id from its raw value.
    #[inline]
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    /// Returns the raw 8-bit value.
    #[inline]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Returns true for the reserved placeholder id `0`.
    #[inline]
    pub const fn is_placeholder(self) -> bool {
        self.0 == 0
    }

    /// Returns true for the ephemeral quick slot `255`.
    #[inline]
    pub const fn is_quick(self) -> bool {
        self.0 == 255
    }

    /// Returns true for ids in the persistent range `1..=250`.
    #[inline]
    pub const fn is_persistent(self) -> bool {
        self.0 >= 1 && self.0 <= Self::MAX_PERSISTENT
    }

    /// Returns true if a save to this id is allowed (persistent range or quick slot).
    #[inline]
    pub const fn is_saveable(self) -> bool {
        self.is_persistent() || self.is_quick()
    }

    /// Returns the tier that backs this id.
    #[inline]
    pub const fn tier(self) -> Tier {
        if self.is_quick() {
            Tier::Ephemeral
        } else {
            Tier::Durable
        }
    }

    /// Returns the decimal key used for this id in a tier file.
    pub fn key(self) -> String {
        self.0.to_string()
    }

    /// Parses a tier file key back into an id.
    ///
    /// Only plain decimal keys are accepted; `"007"` or `"+7"` are rejected so
    /// that every id has exactly one key.
    ///
    /// ```rust
    /// use lumen_core::PresetId;
    ///
    /// assert_eq!(PresetId::from_key("42"), Some(PresetId::new(42)));
    /// assert_eq!(PresetId::from_key("042"), None);
    /// assert_eq!(PresetId::from_key("256"), None);
    /// ```
    pub fn from_key(key: &str) -> Option<Self> {
        let raw: u8 = key.parse().ok()?;
        (raw.to_string() == key).then_some(Self(raw))
    }

    /// Returns the next id, or `None` past 255.
    #[inline]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }
}

impl From<u8> for PresetId {
    fn from(raw: u8) -> Self {
        Self(raw)
    }
}

impl From<PresetId> for u8 {
    fn from(id: PresetId) -> Self {
        id.0
    }
}

impl fmt::Display for PresetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Storage tier for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// File-backed presets, ids `1..=250`.
    Durable,
    /// Quick slot file, id `255`, possibly served by the RAM cache instead.
    Ephemeral,
}

impl Tier {
    /// Returns the file name for this tier, relative to the filesystem root.
    #[inline]
    pub const fn file_name(self) -> &'static str {
        match self {
            Tier::Durable => "/presets.json",
            Tier::Ephemeral => "/tmp.json",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Durable => f.write_str("durable"),
            Tier::Ephemeral => f.write_str("ephemeral"),
        }
    }
}

/// Origin of a state change request.
///
/// The call mode travels with an apply request and is handed back to the
/// notifier. It also gates the recursion guard: only
/// [`CallMode::ButtonPreset`] may keep a preset-cycle request embedded in a
/// record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallMode {
    /// Boot-time initialization.
    Init,
    /// Direct change from the API or UI.
    #[default]
    DirectChange,
    /// Physical button, non-preset action.
    Button,
    /// Received sync notification from another controller.
    Notification,
    /// Nightlight timer.
    Nightlight,
    /// Change that must not be broadcast.
    NoNotify,
    /// Preset cycling shortcut.
    PresetCycle,
    /// WebSocket client.
    WebSocket,
    /// Physical button bound to a preset.
    ButtonPreset,
}

impl CallMode {
    /// Returns true if a record applied in this mode may keep its embedded
    /// preset-cycle request.
    #[inline]
    pub const fn allows_preset_cycle(self) -> bool {
        matches!(self, CallMode::ButtonPreset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_ranges() {
        assert!(PresetId::PLACEHOLDER.is_placeholder());
        assert!(!PresetId::PLACEHOLDER.is_saveable());
        assert!(PresetId::new(1).is_persistent());
        assert!(PresetId::new(250).is_persistent());
        for raw in 251..=254 {
            let id = PresetId::new(raw);
            assert!(!id.is_persistent(), "{raw} must not be persistent");
            assert!(!id.is_saveable(), "{raw} must not be saveable");
        }
        assert!(PresetId::QUICK.is_quick());
        assert!(PresetId::QUICK.is_saveable());
        assert!(!PresetId::QUICK.is_persistent());
    }

    #[test]
    fn test_tier_mapping() {
        assert_eq!(PresetId::new(1).tier(), Tier::Durable);
        assert_eq!(PresetId::new(250).tier(), Tier::Durable);
        assert_eq!(PresetId::QUICK.tier(), Tier::Ephemeral);
        assert_eq!(Tier::Durable.file_name(), "/presets.json");
        assert_eq!(Tier::Ephemeral.file_name(), "/tmp.json");
    }

    #[test]
    fn test_key_roundtrip() {
        for raw in 0..=255u8 {
            let id = PresetId::new(raw);
            assert_eq!(PresetId::from_key(&id.key()), Some(id));
        }
        assert_eq!(PresetId::from_key(""), None);
        assert_eq!(PresetId::from_key("-1"), None);
        assert_eq!(PresetId::from_key("1.0"), None);
        assert_eq!(PresetId::from_key("01"), None);
    }

    #[test]
    fn test_next_saturates() {
        assert_eq!(PresetId::new(3).next(), Some(PresetId::new(4)));
        assert_eq!(PresetId::QUICK.next(), None);
    }

    #[test]
    fn test_call_mode_guard() {
        assert!(CallMode::ButtonPreset.allows_preset_cycle());
        assert!(!CallMode::Button.allows_preset_cycle());
        assert!(!CallMode::DirectChange.allows_preset_cycle());
    }
}
