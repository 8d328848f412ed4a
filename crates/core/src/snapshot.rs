//! Point-in-time samples of the observable simulation state.
//! This module exists so anomaly detection and reporting share one immutable sample shape.
//! It does not own sampling cadence; callers decide when to capture.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{FlagSpec, SnapshotLayout};
use crate::session::{MemoryBus, SessionError, read_value};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position3 {
    pub x: u16,
    pub y: u16,
    pub z: u16,
}

/// One sample. Built once, never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Frame counter of the sample; doubles as the anomaly timestamp.
    pub frame: u64,
    pub mode: u8,
    pub submode: u8,
    pub position: Position3,
    pub frozen_display: bool,
    /// The avatar is trying to move this frame.
    pub moving: bool,
    pub values: BTreeMap<String, u16>,
}

impl StateSnapshot {
    pub fn new(frame: u64, mode: u8, submode: u8, position: Position3) -> Self {
        Self {
            frame,
            mode,
            submode,
            position,
            frozen_display: false,
            moving: false,
            values: BTreeMap::new(),
        }
    }

    pub fn with_frozen_display(mut self, frozen: bool) -> Self {
        self.frozen_display = frozen;
        self
    }

    pub fn with_moving(mut self, moving: bool) -> Self {
        self.moving = moving;
        self
    }

    pub fn with_value(mut self, name: impl Into<String>, value: u16) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn value(&self, name: &str) -> Option<u16> {
        self.values.get(name).copied()
    }
}

/// Read one snapshot through `bus` at the addresses named by `layout`.
pub fn capture_snapshot<B: MemoryBus + ?Sized>(
    bus: &mut B,
    layout: &SnapshotLayout,
    frame: u64,
) -> Result<StateSnapshot, SessionError> {
    let mode = bus.read_byte(layout.mode)?;
    let submode = bus.read_byte(layout.submode)?;
    let position = Position3 {
        x: bus.read_word(layout.x)?,
        y: bus.read_word(layout.y)?,
        z: bus.read_word(layout.z)?,
    };

    let mut snapshot = StateSnapshot::new(frame, mode, submode, position)
        .with_frozen_display(read_flag(bus, &layout.frozen_display)?)
        .with_moving(read_flag(bus, &layout.moving)?);
    for watch in &layout.watches {
        let value = read_value(bus, watch.address, watch.width)?;
        snapshot.values.insert(watch.name.clone(), value);
    }
    Ok(snapshot)
}

fn read_flag<B: MemoryBus + ?Sized>(bus: &mut B, flag: &FlagSpec) -> Result<bool, SessionError> {
    Ok(flag.is_set(bus.read_byte(flag.address)?))
}
