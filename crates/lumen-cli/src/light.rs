//! A simulated single-segment light, persisted between invocations.
//!
//! Understands enough of the state and command formats to exercise the
//! preset scheduler: power, brightness, effect, palette, segment bounds,
//! playlists, `ps` cycles and the `T=`/`A=`/`FX=`/`FP=`/`PL=` commands.

use std::path::Path;

use anyhow::Context as _;
use lumen_core::{
    CallMode, CaptureOptions, LiveState, PresetId, PresetRecord, PresetRequests,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Live state of the simulated light.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimLight {
    pub on: bool,
    pub bri: u8,
    pub effect: u8,
    pub palette: u8,
    pub speed: u8,
    pub intensity: u8,
    pub start: u16,
    pub stop: u16,
    /// Preset ids of the running playlist.
    pub playlist: Vec<u8>,
    /// Last preset handed to the light.
    pub last_preset: Option<u8>,
    pub boot_preset: Option<u8>,
}

impl Default for SimLight {
    fn default() -> Self {
        Self {
            on: true,
            bri: 128,
            effect: 0,
            palette: 0,
            speed: 128,
            intensity: 128,
            start: 0,
            stop: 30,
            playlist: Vec::new(),
            last_preset: None,
            boot_preset: None,
        }
    }
}

impl SimLight {
    /// File name inside the data directory.
    pub const FILE_NAME: &'static str = "light.json";

    /// Load from `path`, or start from defaults if it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("invalid light state in {}", path.display()))
    }

    /// Write to `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Next id in `first..=last` after the last applied preset, wrapping.
    fn cycle(&self, first: u8, last: u8) -> Option<PresetId> {
        if first == 0 || last < first {
            return None;
        }
        let next = match self.last_preset {
            Some(current) if (first..last).contains(&current) => current + 1,
            _ => first,
        };
        Some(PresetId::new(next))
    }

    fn apply_segment(&mut self, seg: &Value) {
        let field = |key: &str| seg.get(key).and_then(Value::as_u64);
        let byte = |key: &str| field(key).and_then(|v| u8::try_from(v).ok());
        let led = |key: &str| field(key).and_then(|v| u16::try_from(v).ok());
        if let Some(fx) = byte("fx") {
            self.effect = fx;
        }
        if let Some(pal) = byte("pal") {
            self.palette = pal;
        }
        if let Some(sx) = byte("sx") {
            self.speed = sx;
        }
        if let Some(ix) = byte("ix") {
            self.intensity = ix;
        }
        if let Some(start) = led("start") {
            self.start = start;
        }
        if let Some(stop) = led("stop") {
            self.stop = stop;
        }
    }
}

impl LiveState for SimLight {
    fn capture_state(&self, options: CaptureOptions) -> PresetRecord {
        let mut seg = json!({
            "id": 0,
            "fx": self.effect,
            "pal": self.palette,
            "sx": self.speed,
            "ix": self.intensity,
        });
        if options.include_bounds {
            seg["start"] = json!(self.start);
            seg["stop"] = json!(self.stop);
        }
        let mut record = PresetRecord::new()
            .with_field("mainseg", 0)
            .with_field("seg", json!([seg]));
        if options.include_brightness {
            record.insert("on", self.on);
            record.insert("bri", self.bri);
        }
        record
    }

    fn capture_playlist(&self) -> PresetRecord {
        let dur = vec![100; self.playlist.len()];
        PresetRecord::new().with_field(
            "playlist",
            json!({ "ps": self.playlist, "dur": dur, "repeat": 0 }),
        )
    }

    fn apply_state(
        &mut self,
        record: &PresetRecord,
        _mode: CallMode,
        source: PresetId,
        requests: &PresetRequests,
    ) {
        if !source.is_placeholder() {
            self.last_preset = Some(source.raw());
        }
        if let Some(on) = record.get("on").and_then(Value::as_bool) {
            self.on = on;
        }
        if let Some(bri) = record
            .get("bri")
            .and_then(Value::as_u64)
            .and_then(|v| u8::try_from(v).ok())
        {
            self.bri = bri;
        }
        if let Some(seg) = record.get("seg").and_then(Value::as_array).and_then(|s| s.first()) {
            self.apply_segment(seg);
        }
        if let Some(ids) = record
            .get("playlist")
            .and_then(|p| p.get("ps"))
            .and_then(Value::as_array)
        {
            self.playlist = ids
                .iter()
                .filter_map(Value::as_u64)
                .filter_map(|id| u8::try_from(id).ok())
                .collect();
            if let Some(&first) = self.playlist.first() {
                requests.request_apply_from_playlist(PresetId::new(first));
            }
        }
        if let Some(range) = record.get("ps").and_then(Value::as_str) {
            let mut bounds = range.split('~').filter_map(|s| s.parse::<u8>().ok());
            if let (Some(first), Some(last)) = (bounds.next(), bounds.next())
                && let Some(next) = self.cycle(first, last)
            {
                requests.request_apply(next, CallMode::PresetCycle);
            }
        }
    }

    fn apply_command(&mut self, command: &str, requests: &PresetRequests) {
        let mut cycle_first = None;
        let mut cycle_last = None;
        for (key, value) in command.split('&').filter_map(|pair| pair.split_once('=')) {
            let number = value.parse::<u8>().ok();
            match (key, number) {
                ("T", Some(0)) => self.on = false,
                ("T", Some(1)) => self.on = true,
                ("T", Some(2)) => self.on = !self.on,
                ("A", Some(bri)) => self.bri = bri,
                ("FX", Some(fx)) => self.effect = fx,
                ("FP", Some(pal)) => self.palette = pal,
                ("P1", Some(first)) => cycle_first = Some(first),
                ("P2", Some(last)) => cycle_last = Some(last),
                ("PL", Some(id)) => {
                    requests.request_apply(PresetId::new(id), CallMode::DirectChange);
                }
                ("PL", None) if value == "~" => {
                    if let (Some(first), Some(last)) = (cycle_first, cycle_last)
                        && let Some(next) = self.cycle(first, last)
                    {
                        requests.request_apply(next, CallMode::PresetCycle);
                    }
                }
                _ => tracing::debug!(key, value, "ignoring unknown command field"),
            }
        }
    }

    fn unload_playlist(&mut self) {
        if !self.playlist.is_empty() {
            tracing::debug!("playlist unloaded");
        }
        self.playlist.clear();
    }

    fn apply_fallback(&mut self, effect: u8, palette: u8) {
        self.effect = effect;
        self.palette = palette;
    }
}
