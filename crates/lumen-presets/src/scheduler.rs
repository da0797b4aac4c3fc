//! Tick-driven save and apply scheduler.
//!
//! Requests are staged through a [`PresetRequests`] handle and serviced here,
//! one per [`PresetScheduler::poll`] call:
//!
//! ```text
//!            request_save ──┐        ┌── request_apply
//!                           ▼        ▼
//!                      ┌──────┐  ┌───────┐
//!                      │ save │  │ apply │   depth-1 mailboxes
//!                      └──┬───┘  └───┬───┘
//!                         │ first    │ only if no save
//!                         ▼          ▼
//!                  ┌────────────────────────┐
//!   poll() ──────▶ │ lease → store / cache  │ ──▶ live state, notifier
//!                  └────────────────────────┘
//! ```
//!
//! A save suspends the renderer, waits a bounded time for the current frame,
//! and blocks (with bounded retries) for the shared buffer. An apply never
//! blocks: if the buffer is busy the request stays staged for the next tick.
//! Chained presets staged while an apply runs are serviced on later ticks.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use lumen_core::{
    ApplyRequest, ErrorFlag, LiveState, NoopNotifier, Notifier, PresetId, PresetRecord,
    PresetRequests, Renderer, StatusFlag, Tier,
};
use lumen_store::{
    AcquireMode, BufferArbiter, Compaction, FileSystem, Lease, LeaseOwner, RamCache, RecordStore,
    StoreError,
};

use crate::config::SchedulerConfig;
use crate::engine;

/// Where a save ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTarget {
    /// The quick-slot RAM cache.
    RamCache,
    /// A tier file.
    File(Tier),
}

/// What a call to [`PresetScheduler::poll`] did.
#[derive(Debug)]
pub enum PollOutcome {
    /// Nothing was staged.
    Idle,
    /// A save was written.
    Saved {
        /// Saved id.
        id: PresetId,
        /// Where the record went.
        target: SaveTarget,
    },
    /// The buffer stayed busy; the save is still staged.
    SaveDeferred {
        /// Id of the deferred save.
        id: PresetId,
    },
    /// The save targeted a protected id and was dropped.
    SaveRejected {
        /// Protected id.
        id: PresetId,
    },
    /// The save could not be written and was dropped.
    SaveFailed {
        /// Id of the failed save.
        id: PresetId,
        /// Cause.
        error: StoreError,
    },
    /// A record was applied to live state.
    Applied {
        /// Applied id.
        id: PresetId,
        /// Whether the record modified live state.
        changed: bool,
    },
    /// The buffer was busy; the apply is still staged.
    ApplyDeferred {
        /// Id of the deferred apply.
        id: PresetId,
    },
    /// The record could not be loaded; the fallback, if any, was shown.
    ApplyFailed {
        /// Id of the failed apply.
        id: PresetId,
        /// Cause.
        error: StoreError,
    },
}

impl PollOutcome {
    /// Returns true if the poll found nothing to do.
    pub fn is_idle(&self) -> bool {
        matches!(self, PollOutcome::Idle)
    }
}

/// Services staged preset requests against a record store.
///
/// # Example
///
/// ```rust
/// use lumen_core::{
///     CallMode, CaptureOptions, LiveState, PresetId, PresetRecord, PresetRequests, Renderer,
///     SaveRequest,
/// };
/// use lumen_presets::{PollOutcome, PresetScheduler, SchedulerConfig};
/// use lumen_store::{MemoryFs, RecordStore};
///
/// struct Strip;
/// impl Renderer for Strip {
///     fn suspend(&mut self) {}
///     fn resume(&mut self) {}
///     fn is_updating(&self) -> bool { false }
/// }
///
/// #[derive(Default)]
/// struct Light { bri: u8 }
/// impl LiveState for Light {
///     fn capture_state(&self, _: CaptureOptions) -> PresetRecord {
///         PresetRecord::new().with_field("bri", self.bri)
///     }
///     fn capture_playlist(&self) -> PresetRecord { PresetRecord::new() }
///     fn apply_state(&mut self, r: &PresetRecord, _: CallMode, _: PresetId, _: &PresetRequests) {
///         self.bri = r.get("bri").and_then(|v| v.as_u64()).unwrap_or(0) as u8;
///     }
/// }
///
/// let mut scheduler = PresetScheduler::new(RecordStore::new(MemoryFs::new()), SchedulerConfig::default());
/// let requests = scheduler.requests();
/// let (mut strip, mut light) = (Strip, Light { bri: 90 });
///
/// requests.request_save(SaveRequest::new(PresetId::new(5)).unwrap().with_name("Dim"));
/// assert!(matches!(scheduler.poll(&mut strip, &mut light), PollOutcome::Saved { .. }));
///
/// light.bri = 255;
/// requests.request_apply(PresetId::new(5), CallMode::Button);
/// scheduler.poll(&mut strip, &mut light);
/// assert_eq!(light.bri, 90);
/// assert_eq!(scheduler.current_preset(), Some(PresetId::new(5)));
/// ```
pub struct PresetScheduler<F> {
    config: SchedulerConfig,
    store: RecordStore<F>,
    cache: RamCache,
    arbiter: Arc<BufferArbiter>,
    requests: PresetRequests,
    status: Arc<StatusFlag>,
    notifier: Box<dyn Notifier + Send>,
    current_preset: Option<PresetId>,
    boot_preset: Option<PresetId>,
    presets_modified_at: Option<SystemTime>,
}

impl<F: FileSystem> PresetScheduler<F> {
    /// Creates a scheduler with its own buffer arbiter and status flag.
    ///
    /// The store's protected ids are extended with those in `config`.
    pub fn new(store: RecordStore<F>, config: SchedulerConfig) -> Self {
        let arbiter = Arc::new(BufferArbiter::new(config.buffer_capacity));
        Self::with_arbiter(store, config, arbiter)
    }

    /// Creates a scheduler sharing `arbiter` with other subsystems.
    pub fn with_arbiter(
        store: RecordStore<F>,
        config: SchedulerConfig,
        arbiter: Arc<BufferArbiter>,
    ) -> Self {
        let store = store.with_protected(config.protected());
        Self {
            cache: config.build_ram_cache(),
            config,
            store,
            arbiter,
            requests: PresetRequests::new(),
            status: Arc::new(StatusFlag::new()),
            notifier: Box::new(NoopNotifier),
            current_preset: None,
            boot_preset: None,
            presets_modified_at: None,
        }
    }

    /// Report changes to `notifier`.
    pub fn with_notifier(mut self, notifier: Box<dyn Notifier + Send>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Report errors through a shared status flag.
    pub fn with_status(mut self, status: Arc<StatusFlag>) -> Self {
        self.status = status;
        self
    }

    /// Adopt a boot preset loaded from device configuration.
    pub fn with_boot_preset(mut self, id: Option<PresetId>) -> Self {
        self.boot_preset = id;
        self
    }

    /// A handle for staging requests.
    pub fn requests(&self) -> PresetRequests {
        self.requests.clone()
    }

    /// The shared status flag.
    pub fn status(&self) -> Arc<StatusFlag> {
        Arc::clone(&self.status)
    }

    /// The shared buffer arbiter.
    pub fn arbiter(&self) -> Arc<BufferArbiter> {
        Arc::clone(&self.arbiter)
    }

    /// The record store.
    pub fn store(&self) -> &RecordStore<F> {
        &self.store
    }

    /// The quick-slot RAM cache.
    pub fn cache(&self) -> &RamCache {
        &self.cache
    }

    /// The active configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Last preset applied that changed live state, if any.
    pub fn current_preset(&self) -> Option<PresetId> {
        self.current_preset
    }

    /// Preset applied at boot, if any.
    pub fn boot_preset(&self) -> Option<PresetId> {
        self.boot_preset
    }

    /// When a durable preset was last saved or deleted.
    pub fn presets_modified_at(&self) -> Option<SystemTime> {
        self.presets_modified_at
    }

    /// Prepare the durable file at startup.
    ///
    /// Seeds the factory presets when configured and no durable file exists,
    /// then refreshes the preset count in preset-switch commands. Returns the
    /// number of durable presets.
    pub fn initialize(&mut self) -> Result<usize, StoreError> {
        let arbiter = Arc::clone(&self.arbiter);
        let mut lease = arbiter.acquire(LeaseOwner::Lookup, self.config.save_acquire_mode())?;

        let result = self.prepare_durable(&mut lease);
        drop(lease);

        match result {
            Ok(count) => {
                tracing::info!(count, "presets ready");
                Ok(count)
            }
            Err(error) => {
                self.record_store_error(&error);
                tracing::error!(%error, "failed to prepare presets");
                Err(error)
            }
        }
    }

    fn prepare_durable(&mut self, lease: &mut Lease<'_>) -> Result<usize, StoreError> {
        if self.config.seed_factory && self.store.seed_factory(lease)? {
            self.presets_modified_at = Some(SystemTime::now());
        }
        self.store.refresh_count(lease)
    }

    /// Service at most one staged request.
    ///
    /// A staged save always wins over a staged apply; the apply is then left
    /// for the next tick.
    pub fn poll<R, L>(&mut self, renderer: &mut R, live: &mut L) -> PollOutcome
    where
        R: Renderer + ?Sized,
        L: LiveState + ?Sized,
    {
        if self.requests.save_pending() {
            return self.service_save(renderer, live);
        }
        if self.requests.apply_pending() {
            return self.service_apply(live);
        }
        PollOutcome::Idle
    }

    fn service_save<R, L>(&mut self, renderer: &mut R, live: &mut L) -> PollOutcome
    where
        R: Renderer + ?Sized,
        L: LiveState + ?Sized,
    {
        let Some(request) = self.requests.take_save() else {
            return PollOutcome::Idle;
        };
        let id = request.id;

        if self.store.is_protected(id) {
            tracing::warn!(%id, "save to protected preset ignored");
            return PollOutcome::SaveRejected { id };
        }

        renderer.suspend();
        if !wait_for_frame(&*renderer, self.config.quiesce_timeout()) {
            tracing::debug!(%id, "renderer still drawing, saving anyway");
        }

        let arbiter = Arc::clone(&self.arbiter);
        let mut lease = match arbiter.acquire(LeaseOwner::Save, self.config.save_acquire_mode()) {
            Ok(lease) => lease,
            Err(_) => {
                renderer.resume();
                if !self.requests.restore_save(request) {
                    tracing::debug!(%id, "deferred save superseded");
                }
                tracing::warn!(%id, "buffer busy, save deferred");
                return PollOutcome::SaveDeferred { id };
            }
        };

        let record = engine::capture(live, &request);
        let result = self.persist(&mut lease, id, &record);
        drop(lease);
        renderer.resume();

        if let Some(boot) = request.boot_preset {
            self.boot_preset = Some(boot);
            tracing::info!(id = %boot, "boot preset changed");
        }

        match result {
            Ok(target) => {
                tracing::info!(%id, ?target, name = ?record.name(), "preset saved");
                if let SaveTarget::File(Tier::Durable) = target {
                    let now = SystemTime::now();
                    self.presets_modified_at = Some(now);
                    self.notifier.presets_changed(now);
                }
                PollOutcome::Saved { id, target }
            }
            Err(error) => {
                self.record_store_error(&error);
                tracing::error!(%id, %error, "preset save failed");
                PollOutcome::SaveFailed { id, error }
            }
        }
    }

    fn persist(
        &mut self,
        lease: &mut Lease<'_>,
        id: PresetId,
        record: &PresetRecord,
    ) -> Result<SaveTarget, StoreError> {
        if !id.is_quick() {
            self.store.write(lease, Tier::Durable, id, record)?;
            return Ok(SaveTarget::File(Tier::Durable));
        }

        if self.cache.is_enabled() {
            let buf = lease.buffer();
            buf.clear();
            serde_json::to_writer(&mut *buf, record).map_err(StoreError::Encode)?;
            match self.cache.store(buf) {
                Ok(()) => return Ok(SaveTarget::RamCache),
                Err(failure) => tracing::warn!(%failure, "falling back to the ephemeral file"),
            }
        }
        self.store.write(lease, Tier::Ephemeral, id, record)?;
        Ok(SaveTarget::File(Tier::Ephemeral))
    }

    fn service_apply<L: LiveState + ?Sized>(&mut self, live: &mut L) -> PollOutcome {
        let arbiter = Arc::clone(&self.arbiter);
        let Ok(mut lease) = arbiter.acquire(LeaseOwner::Apply, AcquireMode::NonBlocking) else {
            return match self.requests.pending_apply() {
                Some(pending) => {
                    tracing::debug!(id = %pending.id, "buffer busy, apply deferred");
                    PollOutcome::ApplyDeferred { id: pending.id }
                }
                None => PollOutcome::Idle,
            };
        };
        let Some(request) = self.requests.take_apply() else {
            return PollOutcome::Idle;
        };
        let ApplyRequest {
            id,
            mode,
            unload_playlist,
            fallback,
        } = request;
        tracing::debug!(%id, ?mode, "applying preset");

        if unload_playlist {
            live.unload_playlist();
        }

        let loaded = self.load(&mut lease, id);
        self.status.report_preset_load(loaded.is_ok());

        let record = match loaded {
            Ok(record) => record,
            Err(error) => {
                drop(lease);
                if let Some(fallback) = fallback {
                    live.apply_fallback(fallback.effect, fallback.palette);
                }
                tracing::warn!(%id, %error, "preset could not be loaded");
                self.notifier.preset_applied(id, mode, false);
                return PollOutcome::ApplyFailed { id, error };
            }
        };

        let changed = record.changes_state();
        engine::dispatch(live, record, id, mode, &self.requests);
        if changed && !self.status.is_set() && !id.is_quick() {
            self.current_preset = Some(id);
        }
        drop(lease);

        self.notifier.preset_applied(id, mode, changed);
        PollOutcome::Applied { id, changed }
    }

    fn load(&self, lease: &mut Lease<'_>, id: PresetId) -> Result<PresetRecord, StoreError> {
        if id.is_quick()
            && let Some(blob) = self.cache.load()
        {
            return serde_json::from_slice(blob)
                .map_err(|e| StoreError::corrupt("quick-slot cache", e));
        }
        self.store.read(lease, id.tier(), id)
    }

    /// Name of preset `id`, or `None` if it is missing, unnamed or unreadable.
    ///
    /// Waits for the shared buffer like a save does.
    pub fn preset_name(&self, id: PresetId) -> Option<String> {
        if id.is_quick()
            && let Some(blob) = self.cache.load()
        {
            return serde_json::from_slice::<PresetRecord>(blob)
                .ok()
                .and_then(|record| record.name().map(str::to_string));
        }
        let mut lease = self
            .arbiter
            .acquire(LeaseOwner::Lookup, self.config.save_acquire_mode())
            .ok()?;
        match self.store.name(&mut lease, id) {
            Ok(name) => name,
            Err(error) => {
                tracing::debug!(%id, %error, "preset name lookup failed");
                None
            }
        }
    }

    /// Durable presets with their names.
    pub fn list(&self) -> Result<Vec<(PresetId, Option<String>)>, StoreError> {
        let mut lease = self
            .arbiter
            .acquire(LeaseOwner::Lookup, self.config.save_acquire_mode())?;
        self.store.names(&mut lease)
    }

    /// Delete durable preset `id`, shifting the presets above it down.
    ///
    /// The current and boot preset follow their records to the new ids, and
    /// are cleared if they pointed at the deleted preset. References stored
    /// inside other records (playlists, cycle ranges, commands) are not
    /// rewritten; use the returned report to migrate them.
    pub fn delete(&mut self, id: PresetId) -> Result<Compaction, StoreError> {
        let arbiter = Arc::clone(&self.arbiter);
        let mut lease = arbiter.acquire(LeaseOwner::Delete, self.config.save_acquire_mode())?;
        let result = self.store.delete(&mut lease, id);
        drop(lease);

        let compaction = match result {
            Ok(compaction) => compaction,
            Err(error) => {
                self.record_store_error(&error);
                tracing::warn!(%id, %error, "preset delete failed");
                return Err(error);
            }
        };

        self.current_preset = self.current_preset.and_then(|id| compaction.resolve(id));
        self.boot_preset = self.boot_preset.and_then(|id| compaction.resolve(id));
        if !compaction.is_trivial() {
            tracing::info!(
                removed = %compaction.removed,
                shifted = compaction.moves.len(),
                "preset ids compacted; references inside other presets are not updated"
            );
        }

        let now = SystemTime::now();
        self.presets_modified_at = Some(now);
        self.notifier.presets_changed(now);
        Ok(compaction)
    }

    /// Drop the quick-slot RAM cache.
    pub fn shutdown(&mut self) {
        if self.cache.clear() {
            tracing::debug!("quick-slot cache released");
        }
    }

    fn record_store_error(&self, error: &StoreError) {
        if error.is_io() {
            self.status.set(ErrorFlag::FsGeneral);
        }
    }
}

impl<F> std::fmt::Debug for PresetScheduler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresetScheduler")
            .field("current_preset", &self.current_preset)
            .field("boot_preset", &self.boot_preset)
            .field("save_pending", &self.requests.save_pending())
            .field("apply_pending", &self.requests.apply_pending())
            .field("cache_len", &self.cache.len())
            .field("status", &self.status.get())
            .finish_non_exhaustive()
    }
}

/// Spin until the renderer finishes its frame or `timeout` elapses.
///
/// Returns false on timeout.
fn wait_for_frame<R: Renderer + ?Sized>(renderer: &R, timeout: Duration) -> bool {
    let start = Instant::now();
    while renderer.is_updating() {
        if start.elapsed() >= timeout {
            return false;
        }
        std::thread::yield_now();
    }
    true
}
