//! Process-wide sticky status flag.
//!
//! Errors from the preset subsystem are not returned to the fire-and-forget
//! caller that queued the request. They land here instead, where reporting
//! collaborators (status LED, API info endpoint) pick them up.

use std::sync::atomic::{AtomicU8, Ordering};

/// Error codes reported through the [`StatusFlag`].
///
/// The discriminants match the codes reported to API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ErrorFlag {
    /// No error.
    #[default]
    None = 0,
    /// A preset could not be loaded (missing or corrupt record).
    PresetLoad = 12,
    /// General filesystem failure (open, read or write).
    FsGeneral = 19,
}

impl ErrorFlag {
    /// Returns the numeric code.
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Converts a numeric code back into a flag. Unknown codes map to
    /// [`ErrorFlag::FsGeneral`].
    pub const fn from_code(code: u8) -> Self {
        match code {
            0 => ErrorFlag::None,
            12 => ErrorFlag::PresetLoad,
            _ => ErrorFlag::FsGeneral,
        }
    }
}

/// Sticky error flag shared between the scheduler and reporting code.
///
/// # Example
///
/// ```rust
/// use lumen_core::{ErrorFlag, StatusFlag};
///
/// let status = StatusFlag::new();
/// status.report_preset_load(false);
/// assert_eq!(status.get(), ErrorFlag::PresetLoad);
///
/// // A successful load clears a preset-load error...
/// status.report_preset_load(true);
/// assert_eq!(status.get(), ErrorFlag::None);
///
/// // ...but never overrides a more specific one.
/// status.set(ErrorFlag::FsGeneral);
/// status.report_preset_load(false);
/// assert_eq!(status.get(), ErrorFlag::FsGeneral);
/// ```
#[derive(Debug, Default)]
pub struct StatusFlag(AtomicU8);

impl StatusFlag {
    /// Creates a cleared flag.
    pub const fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    /// Returns the current flag.
    pub fn get(&self) -> ErrorFlag {
        ErrorFlag::from_code(self.0.load(Ordering::Acquire))
    }

    /// Returns true if any error is active.
    pub fn is_set(&self) -> bool {
        self.get() != ErrorFlag::None
    }

    /// Overwrites the flag.
    pub fn set(&self, flag: ErrorFlag) {
        self.0.store(flag.code(), Ordering::Release);
    }

    /// Clears the flag.
    pub fn clear(&self) {
        self.set(ErrorFlag::None);
    }

    /// Records the outcome of a preset load.
    ///
    /// Only touches the flag when nothing more specific than a preset-load
    /// error is active: a failure sets [`ErrorFlag::PresetLoad`], a success
    /// clears a previous preset-load error.
    pub fn report_preset_load(&self, ok: bool) {
        let next = if ok {
            ErrorFlag::None
        } else {
            ErrorFlag::PresetLoad
        };
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                match ErrorFlag::from_code(current) {
                    ErrorFlag::None | ErrorFlag::PresetLoad => Some(next.code()),
                    ErrorFlag::FsGeneral => None,
                }
            });
    }
}
