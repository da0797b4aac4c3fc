//! Single-slot RAM cache for the quick preset.
//!
//! Saves to the quick slot (id 255) happen often (every "remember this look"
//! button press), so on hardware with spare RAM the serialized record is kept
//! in memory instead of being written to flash. The slot holds exactly one
//! blob, is replaced wholesale on every quick save, is left alone by applies,
//! and is only dropped by [`RamCache::clear`].
//!
//! Allocation is fallible. When it fails the caller writes the ephemeral file
//! instead, so readers of id 255 must check the cache first and the file
//! second.

use thiserror::Error;

/// The cache could not hold a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("could not allocate {requested} bytes for the quick-slot cache")]
pub struct AllocationFailure {
    /// Size of the rejected blob.
    pub requested: usize,
}

/// Single-slot cache for the serialized quick preset.
///
/// # Example
///
/// ```rust
/// use lumen_store::RamCache;
///
/// let mut cache = RamCache::new(64);
/// cache.store(br#"{"n":"quick"}"#).unwrap();
/// assert_eq!(cache.load(), Some(&br#"{"n":"quick"}"#[..]));
///
/// // Too large for the budget: the slot is emptied and the caller falls back.
/// assert!(cache.store(&[b' '; 128]).is_err());
/// assert!(!cache.is_populated());
/// ```
#[derive(Debug, Clone)]
pub struct RamCache {
    blob: Option<Box<[u8]>>,
    budget: usize,
    enabled: bool,
}

impl RamCache {
    /// Create an enabled cache that accepts blobs up to `budget` bytes.
    pub fn new(budget: usize) -> Self {
        Self {
            blob: None,
            budget,
            enabled: true,
        }
    }

    /// Create a cache that rejects every blob.
    pub fn disabled() -> Self {
        Self {
            blob: None,
            budget: 0,
            enabled: false,
        }
    }

    /// Returns true if the cache accepts blobs.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Largest blob the cache accepts.
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Returns true if a blob is cached.
    pub fn is_populated(&self) -> bool {
        self.blob.is_some()
    }

    /// Size of the cached blob.
    pub fn len(&self) -> usize {
        self.blob.as_ref().map_or(0, |blob| blob.len())
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.blob.is_none()
    }

    /// Replace the cached blob with a copy of `bytes`.
    ///
    /// The previous blob is dropped before allocating, so on failure the slot
    /// is empty and stale content can never shadow the fallback file.
    pub fn store(&mut self, bytes: &[u8]) -> Result<(), AllocationFailure> {
        self.blob = None;

        let requested = bytes.len();
        if !self.enabled || requested > self.budget {
            return Err(AllocationFailure { requested });
        }

        let mut blob = Vec::new();
        blob.try_reserve_exact(requested)
            .map_err(|_| AllocationFailure { requested })?;
        blob.extend_from_slice(bytes);
        self.blob = Some(blob.into_boxed_slice());
        Ok(())
    }

    /// The cached blob, if any.
    pub fn load(&self) -> Option<&[u8]> {
        self.blob.as_deref()
    }

    /// Drop the cached blob. Returns true if there was one.
    pub fn clear(&mut self) -> bool {
        self.blob.take().is_some()
    }
}

impl Default for RamCache {
    fn default() -> Self {
        Self::disabled()
    }
}
