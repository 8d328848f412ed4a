//! Engine tuning knobs and the memory layout snapshots are read from.
//!
//! Every budget and threshold the engine uses lives here so callers can tune them to a
//! particular simulation's timing. All sections default to values that work for the
//! reference memory map; a TOML file only has to name what it overrides.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ByteWidth;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub pathfinding: PathfindingConfig,
    pub traversal: TraversalConfig,
    pub anomaly: AnomalyConfig,
    pub snapshot: SnapshotLayout,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfindingConfig {
    /// Upper bound on A* node expansions per search.
    pub max_expansions: u32,
    /// Frames the avatar needs to cross one tile at walking speed.
    pub frames_per_tile: u32,
    /// Frame budget for following one planned path.
    pub follow_frame_budget: u32,
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        Self { max_expansions: 16_384, frames_per_tile: 8, follow_frame_budget: 1_200 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    /// Pixel size of the tiles door offsets are counted in.
    pub tile_size: u32,
    /// Pixels of slack accepted when lining up with a row door.
    pub align_tolerance: i32,
    pub align_press_frames: u32,
    pub align_max_presses: u32,
    /// Consecutive unchanged position polls after which row alignment gives up.
    pub stuck_poll_limit: u32,
    pub push_frames: u32,
    /// Frames a single door edge may take from first push to confirmed arrival.
    pub edge_frame_budget: u32,
    /// Frames waited after a room change before re-reading the room id.
    pub settle_frames: u32,
    pub stair_press_frames: u32,
    pub stair_frame_budget: u32,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            tile_size: 8,
            align_tolerance: 2,
            align_press_frames: 2,
            align_max_presses: 64,
            stuck_poll_limit: 3,
            push_frames: 4,
            edge_frame_budget: 600,
            settle_frames: 8,
            stair_press_frames: 8,
            stair_frame_budget: 300,
        }
    }
}

/// Inclusive range of mode values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeRange {
    pub min: u8,
    pub max: u8,
}

impl ModeRange {
    pub fn contains(&self, mode: u8) -> bool {
        (self.min..=self.max).contains(&mode)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub window_capacity: usize,
    pub black_screen_threshold: usize,
    pub stagnation_threshold: usize,
    pub mode_stuck_threshold: usize,
    /// Modes in which a frozen display means the game stopped drawing mid-play.
    pub gameplay_modes: ModeRange,
    /// Modes the game legitimately sits in for long stretches.
    pub steady_modes: Vec<u8>,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            window_capacity: 128,
            black_screen_threshold: 30,
            stagnation_threshold: 40,
            mode_stuck_threshold: 120,
            gameplay_modes: ModeRange { min: 0x07, max: 0x0B },
            steady_modes: vec![0x07, 0x09, 0x0B, 0x0E],
        }
    }
}

/// Memory-mapped bit flag: set when `value & mask != 0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagSpec {
    pub address: u32,
    pub mask: u8,
    /// Report the flag as set when the masked bits are all clear instead.
    #[serde(default)]
    pub inverted: bool,
}

impl FlagSpec {
    pub fn is_set(&self, value: u8) -> bool {
        (value & self.mask != 0) != self.inverted
    }
}

/// Extra named value captured into every snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchSpec {
    pub name: String,
    pub address: u32,
    pub width: ByteWidth,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotLayout {
    pub mode: u32,
    pub submode: u32,
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub frozen_display: FlagSpec,
    pub moving: FlagSpec,
    pub watches: Vec<WatchSpec>,
}

impl Default for SnapshotLayout {
    fn default() -> Self {
        Self {
            mode: 0x7E_0010,
            submode: 0x7E_0011,
            x: 0x7E_0022,
            y: 0x7E_0020,
            z: 0x7E_0024,
            // Screen brightness nibble; zero means the display is blanked.
            frozen_display: FlagSpec { address: 0x7E_0013, mask: 0x0F, inverted: true },
            moving: FlagSpec { address: 0x7E_0067, mask: 0x0F, inverted: false },
            watches: vec![
                WatchSpec { name: "room".to_string(), address: 0x7E_00A0, width: ByteWidth::Word },
                WatchSpec { name: "layer".to_string(), address: 0x7E_00EE, width: ByteWidth::Byte },
            ],
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("pathfinding.max_expansions", self.pathfinding.max_expansions),
            ("pathfinding.frames_per_tile", self.pathfinding.frames_per_tile),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero".to_string()));
            }
        }

        self.traversal.validate()?;
        self.anomaly.validate()
    }
}

impl TraversalConfig {
    /// Largest tile size accepted; door coordinates stay well inside `i32` below it.
    pub const MAX_TILE_SIZE: u32 = 256;

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("traversal.tile_size", self.tile_size),
            ("traversal.align_press_frames", self.align_press_frames),
            ("traversal.stuck_poll_limit", self.stuck_poll_limit),
            ("traversal.push_frames", self.push_frames),
            ("traversal.edge_frame_budget", self.edge_frame_budget),
            ("traversal.stair_press_frames", self.stair_press_frames),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero".to_string()));
            }
        }
        if self.tile_size > Self::MAX_TILE_SIZE {
            return Err(invalid(
                "traversal.tile_size",
                format!("{} exceeds {}", self.tile_size, Self::MAX_TILE_SIZE),
            ));
        }
        if self.align_tolerance < 0 {
            return Err(invalid("traversal.align_tolerance", "must not be negative".to_string()));
        }
        Ok(())
    }
}

impl AnomalyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = [
            ("anomaly.black_screen_threshold", self.black_screen_threshold),
            ("anomaly.stagnation_threshold", self.stagnation_threshold),
            ("anomaly.mode_stuck_threshold", self.mode_stuck_threshold),
        ];
        for (field, threshold) in thresholds {
            if threshold == 0 {
                return Err(invalid(field, "must be greater than zero".to_string()));
            }
            if threshold > self.window_capacity {
                return Err(invalid(
                    field,
                    format!("{threshold} exceeds window capacity {}", self.window_capacity),
                ));
            }
        }
        if self.gameplay_modes.min > self.gameplay_modes.max {
            return Err(invalid(
                "anomaly.gameplay_modes",
                format!(
                    "min {:#04x} is above max {:#04x}",
                    self.gameplay_modes.min, self.gameplay_modes.max
                ),
            ));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}
