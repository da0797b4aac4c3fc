//! Preset storage for lumen.
//!
//! This crate owns everything that touches bytes: the shared serialization
//! buffer, the tier files, and the in-memory quick slot.
//!
//! # Features
//!
//! - **Buffer Arbiter**: exclusive, bounded-retry access to the one shared
//!   scratch buffer, see [`BufferArbiter`]
//! - **Record Store**: one JSON document per tier file, with self-heal,
//!   compaction on delete and the preset-count patch, see [`RecordStore`]
//! - **RAM Cache**: single-slot in-memory copy of the quick preset, see [`RamCache`]
//! - **Factory Presets**: the built-in durable layout
//! - **Paths**: platform data and config directories
//!
//! # Example
//!
//! ```rust
//! use lumen_core::{PresetId, PresetRecord, Tier};
//! use lumen_store::{AcquireMode, BufferArbiter, LeaseOwner, MemoryFs, RecordStore};
//!
//! let store = RecordStore::new(MemoryFs::new());
//! let arbiter = BufferArbiter::new(4096);
//!
//! let mut lease = arbiter.acquire(LeaseOwner::Save, AcquireMode::NonBlocking).unwrap();
//! store.seed_factory(&mut lease).unwrap();
//!
//! let compaction = store.delete(&mut lease, PresetId::new(3)).unwrap();
//! assert_eq!(compaction.resolve(PresetId::new(4)), Some(PresetId::new(3)));
//! lease.release();
//! ```

mod error;

/// Exclusive access to the shared buffer.
pub mod arbiter;

/// Id compaction after deletes.
pub mod compaction;

/// Preset count embedded in preset-switch commands.
pub mod count_patch;

/// Factory presets written to a fresh durable file.
pub mod factory;

/// Filesystem collaborator and its implementations.
pub mod fs;

/// Platform-specific data and config directories.
pub mod paths;

/// Single-slot RAM cache for the quick preset.
pub mod ram_cache;

/// Flat-file record store.
pub mod store;

pub use arbiter::{AcquireMode, BufferArbiter, Lease, LeaseOwner};
pub use compaction::Compaction;
pub use error::StoreError;
pub use factory::{FACTORY_PRESET_NAMES, FACTORY_PROTECTED_IDS, factory_presets, get_factory_preset};
pub use fs::{FileSystem, MemoryFs, StdFs};
pub use ram_cache::{AllocationFailure, RamCache};
pub use store::RecordStore;
