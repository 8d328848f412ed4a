//! Sliding-window soft-lock detection over a stream of state snapshots.
//! This module exists so stall and corruption patterns surface as advisory values.
//! It does not own recovery; the caller decides what to do with an anomaly.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{AnomalyConfig, ConfigError};
use crate::snapshot::StateSnapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyKind {
    FrozenDisplay,
    Stagnation,
    ModeStuck,
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnomalyKind::FrozenDisplay => "frozen display",
            AnomalyKind::Stagnation => "stagnation",
            AnomalyKind::ModeStuck => "mode stuck",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub severity: Severity,
    /// Length of the run that triggered the check.
    pub sample_count: usize,
    /// Frame of the snapshot that completed the run.
    pub timestamp: u64,
    pub context: String,
}

/// Per-check latch: set when the check fires, cleared once its condition lapses.
#[derive(Clone, Copy, Debug, Default)]
struct Latches {
    frozen_display: bool,
    stagnation: bool,
    mode_stuck: bool,
}

pub struct AnomalyDetector {
    config: AnomalyConfig,
    window: VecDeque<StateSnapshot>,
    latches: Latches,
    emitted: u64,
}

impl AnomalyDetector {
    pub fn new(config: AnomalyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let window = VecDeque::with_capacity(config.window_capacity);
        Ok(Self { config, window, latches: Latches::default(), emitted: 0 })
    }

    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    pub fn history_len(&self) -> usize {
        self.window.len()
    }

    /// Anomalies returned since construction. `reset` does not clear it.
    pub fn emitted_count(&self) -> u64 {
        self.emitted
    }

    /// Drop all history and re-arm every check.
    pub fn reset(&mut self) {
        debug!(dropped = self.window.len(), "anomaly history reset");
        self.window.clear();
        self.latches = Latches::default();
    }

    /// Append `snapshot` and report at most one newly started anomaly.
    ///
    /// Checks run in priority order: frozen display, stagnation, mode stuck. A check fires
    /// once per run of its condition. While the display is frozen the other checks are not
    /// evaluated; a lower check that holds in the same update as a higher one stays armed.
    pub fn update(&mut self, snapshot: StateSnapshot) -> Option<Anomaly> {
        if self.window.len() == self.config.window_capacity {
            self.window.pop_front();
        }
        self.window.push_back(snapshot);

        if self.frozen_display_holds() {
            if self.latches.frozen_display {
                return None;
            }
            self.latches.frozen_display = true;
            return Some(self.emit(AnomalyKind::FrozenDisplay));
        }
        self.latches.frozen_display = false;

        let stagnation = self.stagnation_holds();
        let mode_stuck = self.mode_stuck_holds();
        self.latches.stagnation &= stagnation;
        self.latches.mode_stuck &= mode_stuck;

        if stagnation && !self.latches.stagnation {
            self.latches.stagnation = true;
            return Some(self.emit(AnomalyKind::Stagnation));
        }
        if mode_stuck && !self.latches.mode_stuck {
            self.latches.mode_stuck = true;
            return Some(self.emit(AnomalyKind::ModeStuck));
        }
        None
    }

    /// Most recent `count` samples, or `None` until that much history exists.
    fn recent(&self, count: usize) -> Option<impl Iterator<Item = &StateSnapshot>> {
        let len = self.window.len();
        (len >= count).then(|| self.window.range(len - count..))
    }

    fn frozen_display_holds(&self) -> bool {
        let gameplay = self.config.gameplay_modes;
        self.recent(self.config.black_screen_threshold).is_some_and(|mut samples| {
            samples.all(|sample| sample.frozen_display && gameplay.contains(sample.mode))
        })
    }

    fn stagnation_holds(&self) -> bool {
        let Some(last) = self.window.back() else {
            return false;
        };
        self.recent(self.config.stagnation_threshold).is_some_and(|mut samples| {
            samples.all(|sample| sample.moving && sample.position == last.position)
        })
    }

    fn mode_stuck_holds(&self) -> bool {
        let Some(last) = self.window.back() else {
            return false;
        };
        if self.config.steady_modes.contains(&last.mode) {
            return false;
        }
        self.recent(self.config.mode_stuck_threshold)
            .is_some_and(|mut samples| samples.all(|sample| sample.mode == last.mode))
    }

    fn emit(&mut self, kind: AnomalyKind) -> Anomaly {
        self.emitted += 1;
        let (severity, sample_count) = match kind {
            AnomalyKind::FrozenDisplay => (Severity::Critical, self.config.black_screen_threshold),
            AnomalyKind::Stagnation => (Severity::Warning, self.config.stagnation_threshold),
            AnomalyKind::ModeStuck => (Severity::Error, self.config.mode_stuck_threshold),
        };

        let (timestamp, context) = match self.window.back() {
            Some(last) => {
                let position = last.position;
                let context = match kind {
                    AnomalyKind::FrozenDisplay => {
                        format!("display frozen in mode {:#04x}", last.mode)
                    }
                    AnomalyKind::Stagnation => format!(
                        "moving but stuck at ({}, {}, {})",
                        position.x, position.y, position.z
                    ),
                    AnomalyKind::ModeStuck => format!(
                        "mode {:#04x} submode {:#04x} did not change",
                        last.mode, last.submode
                    ),
                };
                (last.frame, context)
            }
            None => (0, String::new()),
        };

        warn!(%kind, ?severity, samples = sample_count, frame = timestamp, %context, "anomaly");
        Anomaly { kind, severity, sample_count, timestamp, context }
    }
}
