//! Exclusive access to the shared serialize/parse buffer.
//!
//! The controller has one scratch buffer for JSON work. Presets, the API
//! handler, config persistence and others all compete for it, so every user
//! goes through a [`BufferArbiter`] and holds a [`Lease`] while working.
//!
//! A lease is released when dropped, so release cannot happen twice and
//! cannot be forgotten on an early return.
//!
//! # Example
//!
//! ```rust
//! use lumen_store::{AcquireMode, BufferArbiter, LeaseOwner};
//!
//! let arbiter = BufferArbiter::new(1024);
//!
//! let lease = arbiter.acquire(LeaseOwner::Save, AcquireMode::NonBlocking).unwrap();
//! assert_eq!(arbiter.holder(), Some(LeaseOwner::Save));
//!
//! // A second acquire fails while the first lease is held.
//! assert!(arbiter.acquire(LeaseOwner::Apply, AcquireMode::NonBlocking).is_err());
//!
//! lease.release();
//! assert!(arbiter.acquire(LeaseOwner::Apply, AcquireMode::NonBlocking).is_ok());
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::error::StoreError;

/// Who holds the buffer. Reported for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeaseOwner {
    /// Scheduler servicing a save.
    Save,
    /// Scheduler servicing an apply.
    Apply,
    /// Name lookup or listing.
    Lookup,
    /// Delete with compaction.
    Delete,
    /// Another subsystem, identified by a host-chosen code.
    External(u8),
}

impl LeaseOwner {
    const fn code(self) -> u16 {
        match self {
            LeaseOwner::Save => 1,
            LeaseOwner::Apply => 2,
            LeaseOwner::Lookup => 3,
            LeaseOwner::Delete => 4,
            LeaseOwner::External(code) => 0x100 | code as u16,
        }
    }

    const fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(LeaseOwner::Save),
            2 => Some(LeaseOwner::Apply),
            3 => Some(LeaseOwner::Lookup),
            4 => Some(LeaseOwner::Delete),
            c if c & 0x100 != 0 => Some(LeaseOwner::External((c & 0xFF) as u8)),
            _ => None,
        }
    }
}

impl fmt::Display for LeaseOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaseOwner::Save => f.write_str("save"),
            LeaseOwner::Apply => f.write_str("apply"),
            LeaseOwner::Lookup => f.write_str("lookup"),
            LeaseOwner::Delete => f.write_str("delete"),
            LeaseOwner::External(code) => write!(f, "external({code})"),
        }
    }
}

/// How hard [`BufferArbiter::acquire`] tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireMode {
    /// Fail immediately if the buffer is held.
    NonBlocking,
    /// Retry up to `max_retries` times, sleeping `retry_delay` before each retry.
    Blocking {
        /// Retries after the first attempt.
        max_retries: u8,
        /// Fixed delay between attempts.
        retry_delay: Duration,
    },
}

/// Gate around the shared buffer.
///
/// Share it between subsystems with an `Arc`.
#[derive(Debug)]
pub struct BufferArbiter {
    buffer: Mutex<Vec<u8>>,
    /// Holder code, 0 when free.
    holder: AtomicU16,
}

impl BufferArbiter {
    /// Creates an arbiter with a buffer of `capacity` bytes preallocated.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(Vec::with_capacity(capacity)),
            holder: AtomicU16::new(0),
        }
    }

    /// Acquire the buffer.
    ///
    /// Returns [`StoreError::BufferUnavailable`] if it is still held after the
    /// attempts allowed by `mode`. Nothing is queued on failure.
    pub fn acquire(&self, owner: LeaseOwner, mode: AcquireMode) -> Result<Lease<'_>, StoreError> {
        if let Some(lease) = self.try_acquire(owner) {
            return Ok(lease);
        }

        if let AcquireMode::Blocking {
            max_retries,
            retry_delay,
        } = mode
        {
            for attempt in 1..=max_retries {
                std::thread::sleep(retry_delay);
                if let Some(lease) = self.try_acquire(owner) {
                    tracing::debug!(%owner, attempt, "buffer acquired after retry");
                    return Ok(lease);
                }
            }
        }

        tracing::debug!(%owner, holder = ?self.holder(), "buffer unavailable");
        Err(StoreError::BufferUnavailable)
    }

    fn try_acquire(&self, owner: LeaseOwner) -> Option<Lease<'_>> {
        let guard = self.buffer.try_lock()?;
        self.holder.store(owner.code(), Ordering::Release);
        Some(Lease {
            guard,
            holder: &self.holder,
            owner,
        })
    }

    /// Returns true while a lease is outstanding.
    pub fn is_held(&self) -> bool {
        self.buffer.is_locked()
    }

    /// Returns the current lease holder, if any.
    pub fn holder(&self) -> Option<LeaseOwner> {
        LeaseOwner::from_code(self.holder.load(Ordering::Acquire))
    }
}

impl Default for BufferArbiter {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Exclusive ownership of the shared buffer. Released on drop.
pub struct Lease<'a> {
    guard: MutexGuard<'a, Vec<u8>>,
    holder: &'a AtomicU16,
    owner: LeaseOwner,
}

impl Lease<'_> {
    /// Who holds this lease.
    pub fn owner(&self) -> LeaseOwner {
        self.owner
    }

    /// The shared buffer. Contents left by a previous holder are unspecified.
    pub fn buffer(&mut self) -> &mut Vec<u8> {
        &mut self.guard
    }

    /// Release the lease. Equivalent to dropping it.
    pub fn release(self) {}
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        self.holder.store(0, Ordering::Release);
    }
}

impl fmt::Debug for Lease<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("owner", &self.owner)
            .field("buffer_len", &self.guard.len())
            .finish()
    }
}
