//! The record store: one JSON document per tier file.
//!
//! Each tier file holds a single object keyed by decimal preset id:
//!
//! ```json
//! {"0":{},"1":{"n":"OnOff","win":"T=2"},"3":{"n":"BlueGreen","on":true}}
//! ```
//!
//! Every operation takes a [`Lease`] as proof that the caller owns the shared
//! buffer; the buffer is used as scratch space for reading and serializing
//! the document. A missing tier file is recreated as `{"0":{}}` on first
//! access. An unparseable file is reported as [`StoreError::Corrupt`] and left
//! alone.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use lumen_core::{PresetId, PresetRecord, Tier};

use crate::arbiter::Lease;
use crate::compaction::{self, Compaction};
use crate::count_patch;
use crate::factory;
use crate::fs::FileSystem;
use crate::StoreError;

/// Contents of a freshly materialized tier file.
pub const EMPTY_DOCUMENT: &str = r#"{"0":{}}"#;

/// Flat-file preset store over a [`FileSystem`].
///
/// # Example
///
/// ```rust
/// use lumen_core::{PresetId, PresetRecord, Tier};
/// use lumen_store::{AcquireMode, BufferArbiter, LeaseOwner, MemoryFs, RecordStore};
///
/// let store = RecordStore::new(MemoryFs::new());
/// let arbiter = BufferArbiter::new(4096);
/// let mut lease = arbiter.acquire(LeaseOwner::Save, AcquireMode::NonBlocking).unwrap();
///
/// let id = PresetId::new(3);
/// store
///     .write(&mut lease, Tier::Durable, id, &PresetRecord::new().with_name("Sunset"))
///     .unwrap();
///
/// assert_eq!(store.read(&mut lease, Tier::Durable, id).unwrap().name(), Some("Sunset"));
/// assert_eq!(store.count(&mut lease).unwrap(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct RecordStore<F> {
    fs: F,
    protected: BTreeSet<PresetId>,
}

impl<F: FileSystem> RecordStore<F> {
    /// Creates a store with no protected ids.
    pub fn new(fs: F) -> Self {
        Self {
            fs,
            protected: BTreeSet::new(),
        }
    }

    /// Refuse saves and deletes targeting `ids`.
    pub fn with_protected(mut self, ids: impl IntoIterator<Item = PresetId>) -> Self {
        self.protected.extend(ids);
        self
    }

    /// The underlying filesystem.
    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Returns true if `id` is write-protected.
    pub fn is_protected(&self, id: PresetId) -> bool {
        self.protected.contains(&id)
    }

    /// Create the tier file as `{"0":{}}` if it does not exist.
    ///
    /// Returns true if the file was created.
    pub fn ensure_tier(&self, tier: Tier) -> Result<bool, StoreError> {
        let path = tier.file_name();
        if self.fs.exists(path) {
            return Ok(false);
        }
        self.fs
            .write(path, EMPTY_DOCUMENT.as_bytes())
            .map_err(|e| StoreError::write_file(path, e))?;
        tracing::info!(%tier, path, "tier file created");
        Ok(true)
    }

    /// Read the record stored under `id`.
    pub fn read(
        &self,
        lease: &mut Lease<'_>,
        tier: Tier,
        id: PresetId,
    ) -> Result<PresetRecord, StoreError> {
        let mut doc = self.load(lease, tier)?;
        match doc.remove(&id.key()) {
            Some(Value::Object(map)) => Ok(PresetRecord::from_map(map)),
            Some(_) => {
                tracing::warn!(%id, %tier, "stored preset is not an object");
                Err(StoreError::RecordNotFound(id))
            }
            None => Err(StoreError::RecordNotFound(id)),
        }
    }

    /// Store `record` under `id`, replacing any previous record.
    ///
    /// Durable writes also refresh the preset count embedded in preset-switch
    /// commands, in the same file write.
    pub fn write(
        &self,
        lease: &mut Lease<'_>,
        tier: Tier,
        id: PresetId,
        record: &PresetRecord,
    ) -> Result<(), StoreError> {
        if !id.is_saveable() || id.tier() != tier {
            return Err(StoreError::InvalidId(id));
        }
        if self.is_protected(id) {
            return Err(StoreError::Protected(id));
        }

        let mut doc = self.load(lease, tier)?;
        doc.insert(id.key(), Value::Object(record.as_map().clone()));
        if tier == Tier::Durable {
            count_patch::apply(&mut doc);
        }
        self.store(lease, tier, &doc)?;
        tracing::info!(%id, %tier, name = ?record.name(), "preset written");
        Ok(())
    }

    /// Delete the durable preset `id` and compact the ids above it.
    ///
    /// The placeholder, the quick slot, protected ids and missing ids are
    /// rejected without touching the file, as is a delete whose compaction
    /// would move a protected preset.
    pub fn delete(&self, lease: &mut Lease<'_>, id: PresetId) -> Result<Compaction, StoreError> {
        if !id.is_persistent() {
            return Err(StoreError::InvalidId(id));
        }
        if self.is_protected(id) {
            return Err(StoreError::Protected(id));
        }

        let mut doc = self.load(lease, Tier::Durable)?;
        let compaction =
            compaction::delete_and_compact(&mut doc, id).ok_or(StoreError::RecordNotFound(id))?;
        if let Some(&(source, _)) = compaction
            .moves
            .iter()
            .find(|(source, target)| self.is_protected(*source) || self.is_protected(*target))
        {
            tracing::warn!(%id, %source, "delete would shift a protected preset");
            return Err(StoreError::Protected(source));
        }
        count_patch::apply(&mut doc);
        self.store(lease, Tier::Durable, &doc)?;
        tracing::info!(%id, shifted = compaction.moves.len(), "preset deleted");
        Ok(compaction)
    }

    /// Number of durable presets, not counting the placeholder.
    pub fn count(&self, lease: &mut Lease<'_>) -> Result<usize, StoreError> {
        let doc = self.load(lease, Tier::Durable)?;
        Ok(count_patch::count_records(&doc))
    }

    /// Rewrite the preset count in every preset-switch command.
    ///
    /// The file is only written if a command changed. Returns the count.
    pub fn refresh_count(&self, lease: &mut Lease<'_>) -> Result<usize, StoreError> {
        let mut doc = self.load(lease, Tier::Durable)?;
        if count_patch::apply(&mut doc) > 0 {
            self.store(lease, Tier::Durable, &doc)?;
        }
        Ok(count_patch::count_records(&doc))
    }

    /// Ids stored in `tier`, ascending, without the placeholder.
    pub fn ids(&self, lease: &mut Lease<'_>, tier: Tier) -> Result<Vec<PresetId>, StoreError> {
        let doc = self.load(lease, tier)?;
        let mut ids: Vec<PresetId> = doc
            .keys()
            .filter_map(|key| PresetId::from_key(key))
            .filter(|id| !id.is_placeholder())
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Durable presets with their names, ascending by id.
    pub fn names(
        &self,
        lease: &mut Lease<'_>,
    ) -> Result<Vec<(PresetId, Option<String>)>, StoreError> {
        let doc = self.load(lease, Tier::Durable)?;
        let mut names: Vec<_> = doc
            .iter()
            .filter_map(|(key, value)| {
                let id = PresetId::from_key(key).filter(|id| !id.is_placeholder())?;
                let name = value
                    .get(lumen_core::record::FIELD_NAME)
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Some((id, name))
            })
            .collect();
        names.sort_unstable_by_key(|(id, _)| *id);
        Ok(names)
    }

    /// Name of the preset `id`, looked up in the tier that backs it.
    ///
    /// Returns `Ok(None)` if the preset exists but has no name.
    pub fn name(&self, lease: &mut Lease<'_>, id: PresetId) -> Result<Option<String>, StoreError> {
        let record = self.read(lease, id.tier(), id)?;
        Ok(record.name().map(str::to_string))
    }

    /// First durable preset, by ascending id, whose quick-load tag equals `tag`.
    pub fn find_by_quick_load(
        &self,
        lease: &mut Lease<'_>,
        tag: &str,
    ) -> Result<Option<PresetId>, StoreError> {
        let doc = self.load(lease, Tier::Durable)?;
        let mut hits: Vec<PresetId> = doc
            .iter()
            .filter(|(_, value)| {
                value.get(lumen_core::record::FIELD_QUICK_LOAD).and_then(Value::as_str) == Some(tag)
            })
            .filter_map(|(key, _)| PresetId::from_key(key))
            .collect();
        hits.sort_unstable();
        Ok(hits.first().copied())
    }

    /// Write the factory durable document if no durable file exists yet.
    ///
    /// Returns true if the factory presets were written.
    pub fn seed_factory(&self, lease: &mut Lease<'_>) -> Result<bool, StoreError> {
        if self.fs.exists(Tier::Durable.file_name()) {
            return Ok(false);
        }
        self.store(lease, Tier::Durable, &factory::factory_document())?;
        tracing::info!(
            presets = factory::FACTORY_PRESET_NAMES.len(),
            "factory presets written"
        );
        Ok(true)
    }

    fn load(&self, lease: &mut Lease<'_>, tier: Tier) -> Result<Map<String, Value>, StoreError> {
        self.ensure_tier(tier)?;
        let path = tier.file_name();
        let buf = lease.buffer();
        buf.clear();
        self.fs
            .read(path, buf)
            .map_err(|e| StoreError::read_file(path, e))?;
        let mut doc: Map<String, Value> =
            serde_json::from_slice(buf).map_err(|e| StoreError::corrupt(path, e))?;
        doc.entry(PresetId::PLACEHOLDER.key())
            .or_insert_with(|| Value::Object(Map::new()));
        Ok(doc)
    }

    fn store(
        &self,
        lease: &mut Lease<'_>,
        tier: Tier,
        doc: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        let path = tier.file_name();
        let buf = lease.buffer();
        buf.clear();
        serde_json::to_writer(&mut *buf, doc).map_err(StoreError::Encode)?;
        self.fs
            .write(path, buf)
            .map_err(|e| StoreError::write_file(path, e))
    }
}
