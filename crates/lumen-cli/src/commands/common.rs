//! Shared CLI plumbing: data directory, configuration and the host loop.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use lumen_core::{PresetId, Renderer};
use lumen_presets::{PollOutcome, PresetScheduler, SchedulerConfig};
use lumen_store::{RecordStore, StdFs, paths};

use crate::light::SimLight;

/// Upper bound on ticks per invocation; chained presets may loop forever.
const MAX_TICKS: usize = 32;

/// Everything a command needs.
pub struct Context {
    pub data_dir: PathBuf,
    pub config: SchedulerConfig,
}

impl Context {
    /// Resolve the data directory and configuration.
    ///
    /// Without `--config`, the user config file is used if it exists.
    pub fn open(data_dir: Option<PathBuf>, config: Option<&Path>) -> anyhow::Result<Self> {
        let data_dir = data_dir.unwrap_or_else(paths::data_dir);
        paths::ensure_dir(&data_dir)?;

        let config = match config {
            Some(path) => SchedulerConfig::load(path)?,
            None => {
                let default = paths::config_file();
                if default.is_file() {
                    SchedulerConfig::load(&default)?
                } else {
                    SchedulerConfig::default()
                }
            }
        };

        Ok(Self { data_dir, config })
    }

    /// Build a scheduler over the data directory.
    ///
    /// The quick-slot RAM cache only lives as long as the process, so each
    /// invocation keeps the quick slot in the ephemeral file instead.
    pub fn scheduler(&self, light: &SimLight) -> PresetScheduler<StdFs> {
        let mut config = self.config.clone();
        config.ram_cache.enabled = false;
        PresetScheduler::new(RecordStore::new(StdFs::new(&self.data_dir)), config)
            .with_boot_preset(light.boot_preset.map(PresetId::new))
    }

    /// Load the simulated light.
    pub fn light(&self) -> anyhow::Result<SimLight> {
        SimLight::load(&self.light_path())
    }

    /// Persist the simulated light.
    pub fn store_light(&self, light: &SimLight) -> anyhow::Result<()> {
        light
            .save(&self.light_path())
            .with_context(|| format!("failed to save {}", self.light_path().display()))
    }

    fn light_path(&self) -> PathBuf {
        self.data_dir.join(SimLight::FILE_NAME)
    }
}

/// A renderer with nothing in flight.
#[derive(Debug, Default)]
pub struct IdleRenderer;

impl Renderer for IdleRenderer {
    fn suspend(&mut self) {
        tracing::trace!("output suspended");
    }

    fn resume(&mut self) {
        tracing::trace!("output resumed");
    }

    fn is_updating(&self) -> bool {
        false
    }
}

/// Poll until no request is staged, printing what each tick did.
///
/// Returns every outcome in order.
pub fn run_until_idle(
    scheduler: &mut PresetScheduler<StdFs>,
    light: &mut SimLight,
) -> Vec<PollOutcome> {
    let mut renderer = IdleRenderer;
    let mut outcomes = Vec::new();
    for _ in 0..MAX_TICKS {
        let outcome = scheduler.poll(&mut renderer, light);
        if outcome.is_idle() {
            return outcomes;
        }
        report(&outcome);
        outcomes.push(outcome);
    }
    tracing::warn!(ticks = MAX_TICKS, "requests still pending, giving up");
    scheduler.requests().clear();
    outcomes
}

fn report(outcome: &PollOutcome) {
    match outcome {
        PollOutcome::Idle => {}
        PollOutcome::Saved { id, target } => println!("Saved preset {id} ({target:?})"),
        PollOutcome::SaveDeferred { id } => println!("Save of preset {id} deferred"),
        PollOutcome::SaveRejected { id } => println!("Preset {id} is protected"),
        PollOutcome::SaveFailed { id, error } => println!("Save of preset {id} failed: {error}"),
        PollOutcome::Applied { id, changed } => {
            let note = if *changed { "" } else { " (no change)" };
            println!("Applied preset {id}{note}");
        }
        PollOutcome::ApplyDeferred { id } => println!("Apply of preset {id} deferred"),
        PollOutcome::ApplyFailed { id, error } => println!("Apply of preset {id} failed: {error}"),
    }
}

/// Parse a preset id for clap's `value_parser`.
pub fn parse_preset_id(s: &str) -> Result<PresetId, String> {
    s.parse::<u8>()
        .map(PresetId::new)
        .map_err(|_| format!("invalid preset id '{s}' (expected 0-255)"))
}
