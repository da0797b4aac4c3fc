//! Preset management commands.
//!
//! Every command runs one host-loop session: stage the request, poll the
//! scheduler until nothing is pending, then persist the simulated light.

use clap::{Args, Subcommand, ValueEnum};
use lumen_core::{CallMode, PresetId, PresetRecord, SaveRequest, Tier};
use lumen_presets::{PollOutcome, PresetScheduler};
use lumen_store::{AcquireMode, Lease, LeaseOwner, StdFs, StoreError, factory_presets};

use super::common::{Context, parse_preset_id, run_until_idle};

#[derive(Args)]
pub struct PresetsArgs {
    #[command(subcommand)]
    command: PresetsCommand,
}

#[derive(Subcommand)]
enum PresetsCommand {
    /// Create the preset file (with factory presets) and refresh the preset count
    Init,

    /// List stored presets
    List {
        /// Show the built-in factory presets instead
        #[arg(long)]
        factory: bool,
    },

    /// Print a stored preset as JSON
    Show {
        /// Preset id or quick-load tag
        preset: String,
    },

    /// Capture the light into a preset
    Save {
        /// Target id (1-250, or 255 for the quick slot)
        #[arg(value_parser = parse_preset_id)]
        id: PresetId,

        /// Preset name
        #[arg(short, long)]
        name: Option<String>,

        /// Quick-load tag
        #[arg(short, long)]
        quick_load: Option<String>,

        /// Leave power and brightness out
        #[arg(long)]
        no_brightness: bool,

        /// Leave segment bounds out
        #[arg(long)]
        no_bounds: bool,

        /// Capture only selected segments
        #[arg(long)]
        selected: bool,

        /// Light-map index to reference
        #[arg(long)]
        ledmap: Option<u8>,

        /// Save the running playlist instead of the state
        #[arg(long, conflicts_with = "json")]
        playlist: bool,

        /// Also make this the boot preset
        #[arg(long)]
        boot: bool,

        /// API save object, e.g. '{"o":true,"win":"T=2"}'
        #[arg(long)]
        json: Option<String>,
    },

    /// Apply a preset to the light
    Apply {
        /// Preset id or quick-load tag
        preset: String,

        /// Who is asking
        #[arg(short, long, value_enum, default_value_t = ModeArg::Direct)]
        mode: ModeArg,

        /// Effect and palette to show if the preset is missing, e.g. "9,5"
        #[arg(long, value_parser = parse_fallback)]
        fallback: Option<(u8, u8)>,
    },

    /// Delete a preset, shifting the presets above it down
    Delete {
        /// Preset id
        #[arg(value_parser = parse_preset_id)]
        id: PresetId,
    },

    /// Print the number of stored presets
    Count,

    /// Show the data directory and config file locations
    Paths,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Direct,
    Button,
    ButtonPreset,
    Websocket,
    Init,
}

impl From<ModeArg> for CallMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Direct => CallMode::DirectChange,
            ModeArg::Button => CallMode::Button,
            ModeArg::ButtonPreset => CallMode::ButtonPreset,
            ModeArg::Websocket => CallMode::WebSocket,
            ModeArg::Init => CallMode::Init,
        }
    }
}

pub fn run(args: PresetsArgs, ctx: Context) -> anyhow::Result<()> {
    match args.command {
        PresetsCommand::Init => init(&ctx),
        PresetsCommand::List { factory } => list(&ctx, factory),
        PresetsCommand::Show { preset } => show(&ctx, &preset),
        PresetsCommand::Save {
            id,
            name,
            quick_load,
            no_brightness,
            no_bounds,
            selected,
            ledmap,
            playlist,
            boot,
            json,
        } => {
            let request = match json {
                Some(json) => {
                    let command = PresetRecord::from_json(&json)
                        .map_err(|e| anyhow::anyhow!("invalid save object: {e}"))?;
                    SaveRequest::from_command(id, name.as_deref(), &command)?
                }
                None => {
                    let mut request = SaveRequest::new(id)?
                        .with_brightness(!no_brightness)
                        .with_bounds(!no_bounds)
                        .with_selected_only(selected);
                    if let Some(name) = name.as_deref() {
                        request = request.with_name(name);
                    }
                    if let Some(tag) = quick_load.as_deref() {
                        request = request.with_quick_load(tag);
                    }
                    if let Some(ledmap) = ledmap {
                        request = request.with_ledmap(ledmap);
                    }
                    if playlist {
                        request = request.as_playlist();
                    }
                    request
                }
            };
            let request = if boot {
                request.with_boot_preset(id)
            } else {
                request
            };
            save(&ctx, request)
        }
        PresetsCommand::Apply {
            preset,
            mode,
            fallback,
        } => apply(&ctx, &preset, mode.into(), fallback),
        PresetsCommand::Delete { id } => delete(&ctx, id),
        PresetsCommand::Count => count(&ctx),
        PresetsCommand::Paths => paths(&ctx),
    }
}

fn init(ctx: &Context) -> anyhow::Result<()> {
    let light = ctx.light()?;
    let mut scheduler = ctx.scheduler(&light);
    let count = scheduler.initialize()?;
    println!("Presets ready: {count}");
    Ok(())
}

fn list(ctx: &Context, factory: bool) -> anyhow::Result<()> {
    if factory {
        println!("Factory Presets:");
        println!("================");
        for (id, record) in factory_presets() {
            println!("  {:>3}  {}", id.raw(), record.name().unwrap_or(""));
        }
        return Ok(());
    }

    let light = ctx.light()?;
    let scheduler = ctx.scheduler(&light);
    let presets = scheduler.list()?;

    println!("Presets:");
    println!("========");
    if presets.is_empty() {
        println!("  (none)");
        println!();
        println!("  Create one with: lumen presets save <id> --name \"...\"");
    }
    for (id, name) in presets {
        let marker = if light.boot_preset == Some(id.raw()) {
            " [boot]"
        } else {
            ""
        };
        println!("  {:>3}  {}{}", id.raw(), name.as_deref().unwrap_or("(unnamed)"), marker);
    }

    let quick = with_lease(&scheduler, |scheduler, lease| {
        scheduler.store().ids(lease, Tier::Ephemeral)
    })?;
    if quick.contains(&PresetId::QUICK) {
        let name = scheduler.preset_name(PresetId::QUICK);
        println!("  {:>3}  {}", PresetId::QUICK.raw(), name.as_deref().unwrap_or("(unnamed)"));
    }
    Ok(())
}

fn show(ctx: &Context, preset: &str) -> anyhow::Result<()> {
    let light = ctx.light()?;
    let scheduler = ctx.scheduler(&light);
    let id = resolve(&scheduler, preset)?;
    let record = with_lease(&scheduler, |scheduler, lease| {
        scheduler.store().read(lease, id.tier(), id)
    })?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn save(ctx: &Context, request: SaveRequest) -> anyhow::Result<()> {
    let mut light = ctx.light()?;
    let mut scheduler = ctx.scheduler(&light);
    scheduler.requests().request_save(request);

    let outcomes = run_until_idle(&mut scheduler, &mut light);
    light.boot_preset = scheduler.boot_preset().map(PresetId::raw);
    ctx.store_light(&light)?;
    settle(outcomes)
}

fn apply(
    ctx: &Context,
    preset: &str,
    mode: CallMode,
    fallback: Option<(u8, u8)>,
) -> anyhow::Result<()> {
    let mut light = ctx.light()?;
    let mut scheduler = ctx.scheduler(&light);
    let id = resolve(&scheduler, preset)?;

    let requests = scheduler.requests();
    let staged = match fallback {
        Some((effect, palette)) => requests.request_apply_with_fallback(id, mode, effect, palette),
        None => requests.request_apply(id, mode),
    };
    anyhow::ensure!(staged, "preset {id} cannot be applied");

    let outcomes = run_until_idle(&mut scheduler, &mut light);
    ctx.store_light(&light)?;
    settle(outcomes)
}

fn delete(ctx: &Context, id: PresetId) -> anyhow::Result<()> {
    let mut light = ctx.light()?;
    let mut scheduler = ctx.scheduler(&light);
    let compaction = scheduler.delete(id)?;

    println!("Deleted preset {id}.");
    for (from, to) in &compaction.moves {
        println!("  {from} -> {to}");
    }
    if !compaction.is_trivial() {
        println!("References to moved presets inside other presets were not updated.");
    }

    light.boot_preset = scheduler.boot_preset().map(PresetId::raw);
    light.last_preset = light
        .last_preset
        .and_then(|raw| compaction.resolve(PresetId::new(raw)))
        .map(PresetId::raw);
    ctx.store_light(&light)
}

fn count(ctx: &Context) -> anyhow::Result<()> {
    let light = ctx.light()?;
    let scheduler = ctx.scheduler(&light);
    let count = with_lease(&scheduler, |scheduler, lease| scheduler.store().count(lease))?;
    println!("{count}");
    Ok(())
}

fn paths(ctx: &Context) -> anyhow::Result<()> {
    println!("Data directory: {}", ctx.data_dir.display());
    println!("Durable file:   {}", ctx.data_dir.join("presets.json").display());
    println!("Quick slot:     {}", ctx.data_dir.join("tmp.json").display());
    println!("Config file:    {}", lumen_store::paths::config_file().display());
    Ok(())
}

/// Parse an id, or look the argument up as a quick-load tag.
fn resolve(scheduler: &PresetScheduler<StdFs>, preset: &str) -> anyhow::Result<PresetId> {
    if let Ok(id) = parse_preset_id(preset) {
        return Ok(id);
    }
    with_lease(scheduler, |scheduler, lease| {
        scheduler.store().find_by_quick_load(lease, preset)
    })?
    .ok_or_else(|| {
        anyhow::anyhow!(
            "Preset '{}' not found. Use 'lumen presets list' to see stored presets.",
            preset
        )
    })
}

fn with_lease<T>(
    scheduler: &PresetScheduler<StdFs>,
    f: impl FnOnce(&PresetScheduler<StdFs>, &mut Lease<'_>) -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    let arbiter = scheduler.arbiter();
    let mut lease = arbiter.acquire(LeaseOwner::Lookup, AcquireMode::NonBlocking)?;
    f(scheduler, &mut lease)
}

/// Turn the first failure of a session into an error exit.
fn settle(outcomes: Vec<PollOutcome>) -> anyhow::Result<()> {
    for outcome in outcomes {
        match outcome {
            PollOutcome::SaveFailed { id, error } | PollOutcome::ApplyFailed { id, error } => {
                return Err(anyhow::Error::new(error).context(format!("preset {id}")));
            }
            PollOutcome::SaveRejected { id } => anyhow::bail!("preset {id} is protected"),
            _ => {}
        }
    }
    Ok(())
}

fn parse_fallback(s: &str) -> Result<(u8, u8), String> {
    let (effect, palette) = s
        .split_once(',')
        .ok_or_else(|| format!("invalid fallback '{s}' (expected effect,palette)"))?;
    let effect = effect.trim().parse().map_err(|_| format!("invalid effect '{effect}'"))?;
    let palette = palette.trim().parse().map_err(|_| format!("invalid palette '{palette}'"))?;
    Ok((effect, palette))
}
