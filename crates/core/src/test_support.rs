//! Shared test fixtures for the engine's unit test suites.
//! This module exists to avoid repeating grid, graph, and session setup across many tests.
//! It does not own production navigation logic.

use std::collections::{BTreeMap, HashMap};

use crate::graph::{DoorEdge, DoorKind};
use crate::grid::CollisionGrid;
use crate::session::*;
use crate::snapshot::{Position3, StateSnapshot};
use crate::types::*;

pub(crate) fn test_key() -> RoomKey {
    RoomKey::new(RoomId(1), 0)
}

pub(crate) fn open_buffer(width: usize, height: usize) -> CollisionBuffer {
    CollisionBuffer {
        width,
        height,
        tile_size: 8,
        origin: PixelPos::default(),
        tiles: vec![0x00; width * height],
    }
}

pub(crate) fn open_grid(width: usize, height: usize) -> CollisionGrid {
    CollisionGrid::from_buffer(test_key(), open_buffer(width, height)).expect("open grid")
}

pub(crate) fn grid_from_codes(width: usize, height: usize, tiles: Vec<TileCode>) -> CollisionGrid {
    let buffer = CollisionBuffer { tiles, ..open_buffer(width, height) };
    CollisionGrid::from_buffer(test_key(), buffer).expect("grid from codes")
}

/// `.` floor, `#` wall, `~` deep water, `^` hazard, `>` stairs, `?` unloaded.
pub(crate) fn grid_from_ascii(rows: &[&str]) -> CollisionGrid {
    let rows: Vec<Vec<TileCode>> = rows
        .iter()
        .map(|row| {
            row.chars()
                .map(|c| match c {
                    '.' => 0x00,
                    '~' => 0x08,
                    '^' => 0x20,
                    '>' => 0x1D,
                    '?' => 0xFF,
                    _ => 0x01,
                })
                .collect()
        })
        .collect();
    CollisionGrid::from_rows(test_key(), 8, &rows).expect("ascii grid")
}

pub(crate) fn door(from: RoomId, to: RoomId, direction: Direction, offset: u16) -> DoorEdge {
    DoorEdge { from, to, direction, kind: DoorKind::Open, offset }
}

pub(crate) fn snapshot(frame: u64, mode: u8, position: (u16, u16, u16)) -> StateSnapshot {
    let (x, y, z) = position;
    StateSnapshot::new(frame, mode, 0, Position3 { x, y, z })
}

/// Door that moves the avatar to `target` once pushed long enough while lined up.
#[derive(Clone, Debug)]
pub(crate) struct DoorTrigger {
    pub room: RoomId,
    pub direction: Direction,
    pub axis_value: i32,
    pub tolerance: i32,
    pub push_frames_needed: u32,
    pub target: RoomId,
    pub arrival: PixelPos,
    /// Times the room id flips to `target` and back before the transition sticks.
    pub bounces: u32,
}

/// In-memory session with scripted movement, doors, and memory.
pub(crate) struct ScriptedSession {
    pub room: RoomId,
    pub position: PixelPos,
    pub pixels_per_frame: i32,
    /// Axis on which directional presses do not move the avatar.
    pub frozen_axis: Option<Axis>,
    pub memory: BTreeMap<u32, u8>,
    pub bad_addresses: Vec<u32>,
    pub doors: Vec<DoorTrigger>,
    /// Buttons that move the avatar to a room as soon as they are pressed.
    pub button_targets: Vec<(Button, RoomId)>,
    pub button_presses: Vec<(Button, u32)>,
    pub scheduled_writes: Vec<(u64, u32, u8)>,
    pub scheduled_rooms: Vec<(u64, RoomId)>,
    pub frame: u64,
    pub presses: Vec<(Direction, u32)>,
    pub collision_fetches: u32,
    pub description_fetches: u32,
    collision: HashMap<RoomKey, CollisionBuffer>,
    descriptions: HashMap<RoomId, RoomDescription>,
    push_progress: u32,
    revert_room: Option<RoomId>,
}

impl ScriptedSession {
    pub(crate) fn new(room: RoomId) -> Self {
        Self {
            room,
            position: PixelPos::default(),
            pixels_per_frame: 1,
            frozen_axis: None,
            memory: BTreeMap::new(),
            bad_addresses: Vec::new(),
            doors: Vec::new(),
            button_targets: Vec::new(),
            button_presses: Vec::new(),
            scheduled_writes: Vec::new(),
            scheduled_rooms: Vec::new(),
            frame: 0,
            presses: Vec::new(),
            collision_fetches: 0,
            description_fetches: 0,
            collision: HashMap::new(),
            descriptions: HashMap::new(),
            push_progress: 0,
            revert_room: None,
        }
    }

    pub(crate) fn add_collision(&mut self, key: RoomKey, buffer: CollisionBuffer) {
        self.collision.insert(key, buffer);
    }

    pub(crate) fn add_description(&mut self, room: RoomId, description: RoomDescription) {
        self.descriptions.insert(room, description);
    }

    pub(crate) fn add_door(&mut self, trigger: DoorTrigger) {
        self.doors.push(trigger);
    }

    pub(crate) fn poke(&mut self, address: u32, value: u8) {
        self.memory.insert(address, value);
    }

    fn tick(&mut self, frames: u32) {
        self.frame += u64::from(frames);
        let now = self.frame;
        let due: Vec<(u64, u32, u8)> =
            self.scheduled_writes.iter().copied().filter(|(at, _, _)| *at <= now).collect();
        self.scheduled_writes.retain(|(at, _, _)| *at > now);
        for (_, address, value) in due {
            self.memory.insert(address, value);
        }
        if let Some(&(_, room)) = self.scheduled_rooms.iter().rev().find(|(at, _)| *at <= now) {
            self.room = room;
        }
        self.scheduled_rooms.retain(|(at, _)| *at > now);
    }

    fn check_address(&self, address: u32) -> Result<(), SessionError> {
        if self.bad_addresses.contains(&address) {
            return Err(SessionError::BadAddress { address });
        }
        Ok(())
    }
}

impl MemoryBus for ScriptedSession {
    fn read_byte(&mut self, address: u32) -> Result<u8, SessionError> {
        self.check_address(address)?;
        Ok(self.memory.get(&address).copied().unwrap_or(0))
    }

    fn read_word(&mut self, address: u32) -> Result<u16, SessionError> {
        let lo = self.read_byte(address)?;
        let hi = self.read_byte(address + 1)?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn write_byte(&mut self, address: u32, value: u8) -> Result<(), SessionError> {
        self.check_address(address)?;
        self.memory.insert(address, value);
        Ok(())
    }

    fn write_word(&mut self, address: u32, value: u16) -> Result<(), SessionError> {
        let [lo, hi] = value.to_le_bytes();
        self.write_byte(address, lo)?;
        self.write_byte(address + 1, hi)
    }
}

impl Session for ScriptedSession {
    fn press_direction(&mut self, direction: Direction, frames: u32) -> Result<(), SessionError> {
        self.presses.push((direction, frames));
        self.tick(frames);

        let moving_axis = match direction {
            Direction::North | Direction::South => Axis::Y,
            Direction::West | Direction::East => Axis::X,
        };
        if self.frozen_axis != Some(moving_axis) {
            let (dx, dy) = direction.delta();
            let distance = self.pixels_per_frame * frames as i32;
            self.position.x += dx * distance;
            self.position.y += dy * distance;
        }

        let room = self.room;
        let position = self.position;
        let Some(index) = self.doors.iter().position(|door| {
            door.room == room
                && door.direction == direction
                && (position.along(direction.alignment_axis()) - door.axis_value).abs()
                    <= door.tolerance
        }) else {
            return Ok(());
        };

        self.push_progress += frames;
        let door = &mut self.doors[index];
        if self.push_progress >= door.push_frames_needed {
            self.push_progress = 0;
            if door.bounces > 0 {
                door.bounces -= 1;
                self.revert_room = Some(self.room);
                self.room = door.target;
            } else {
                self.room = door.target;
                self.position = door.arrival;
            }
        }
        Ok(())
    }

    fn press_button(&mut self, button: Button, frames: u32) -> Result<(), SessionError> {
        self.button_presses.push((button, frames));
        self.tick(frames);
        if let Some(&(_, room)) = self.button_targets.iter().find(|(target, _)| *target == button)
        {
            self.room = room;
        }
        Ok(())
    }

    fn advance_frames(&mut self, frames: u32) -> Result<(), SessionError> {
        self.tick(frames);
        if let Some(room) = self.revert_room.take() {
            self.room = room;
        }
        Ok(())
    }

    fn current_room_id(&mut self) -> Result<RoomId, SessionError> {
        Ok(self.room)
    }

    fn current_position(&mut self) -> Result<PixelPos, SessionError> {
        Ok(self.position)
    }

    fn set_position_axis(&mut self, axis: Axis, value: i32) -> Result<(), SessionError> {
        match axis {
            Axis::X => self.position.x = value,
            Axis::Y => self.position.y = value,
        }
        Ok(())
    }

    fn fetch_collision_buffer(&mut self, key: RoomKey) -> Result<CollisionBuffer, SessionError> {
        self.collision_fetches += 1;
        self.collision.get(&key).cloned().ok_or(SessionError::NoCollisionData(key))
    }

    fn fetch_room_description(&mut self, room: RoomId) -> Result<RoomDescription, SessionError> {
        self.description_fetches += 1;
        self.descriptions.get(&room).cloned().ok_or(SessionError::NoRoomDescription(room))
    }
}
