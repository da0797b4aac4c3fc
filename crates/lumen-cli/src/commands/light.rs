//! Simulated light commands.

use clap::{Args, Subcommand};
use lumen_core::{CaptureOptions, LiveState};

use super::common::Context;

#[derive(Args)]
pub struct LightArgs {
    #[command(subcommand)]
    command: LightCommand,
}

#[derive(Subcommand)]
enum LightCommand {
    /// Print the light state as JSON
    Show,

    /// Change the light state
    Set {
        /// Power on
        #[arg(long, conflicts_with = "off")]
        on: bool,

        /// Power off
        #[arg(long)]
        off: bool,

        /// Master brightness
        #[arg(short, long)]
        bri: Option<u8>,

        /// Effect index
        #[arg(short = 'x', long)]
        fx: Option<u8>,

        /// Palette index
        #[arg(short, long)]
        pal: Option<u8>,

        /// Segment start
        #[arg(long)]
        start: Option<u16>,

        /// Segment stop
        #[arg(long)]
        stop: Option<u16>,

        /// Preset ids of a playlist to load
        #[arg(long, value_delimiter = ',')]
        playlist: Option<Vec<u8>>,
    },

    /// Forget the light state
    Reset,
}

pub fn run(args: LightArgs, ctx: Context) -> anyhow::Result<()> {
    match args.command {
        LightCommand::Show => {
            let light = ctx.light()?;
            let state = light.capture_state(CaptureOptions::default());
            println!("{}", serde_json::to_string_pretty(&state)?);
            if !light.playlist.is_empty() {
                println!("Playlist: {:?}", light.playlist);
            }
            Ok(())
        }
        LightCommand::Set {
            on,
            off,
            bri,
            fx,
            pal,
            start,
            stop,
            playlist,
        } => {
            let mut light = ctx.light()?;
            if on {
                light.on = true;
            }
            if off {
                light.on = false;
            }
            if let Some(bri) = bri {
                light.bri = bri;
            }
            if let Some(fx) = fx {
                light.effect = fx;
            }
            if let Some(pal) = pal {
                light.palette = pal;
            }
            if let Some(start) = start {
                light.start = start;
            }
            if let Some(stop) = stop {
                light.stop = stop;
            }
            if let Some(playlist) = playlist {
                light.playlist = playlist;
            }
            ctx.store_light(&light)
        }
        LightCommand::Reset => ctx.store_light(&crate::light::SimLight::default()),
    }
}
