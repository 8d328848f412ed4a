//! Small simulated world shared by the integration tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::iter;

use navcore::session::{CollisionBuffer, DoorSpec, RoomDescription};
use navcore::{
    Axis, Button, Direction, DoorKind, MemoryBus, PixelPos, RoomId, RoomKey, Session,
    SessionError,
};

pub const MODE: u32 = 0x7E_0010;
pub const BRIGHTNESS: u32 = 0x7E_0013;
pub const POS_Y: u32 = 0x7E_0020;
pub const POS_X: u32 = 0x7E_0022;
pub const MOVING: u32 = 0x7E_0067;
pub const ROOM: u32 = 0x7E_00A0;
pub const HEALTH: u32 = 0x7E_F36D;

pub const TILE: i32 = 8;
const ROOM_TILES: usize = 16;
const DOOR_PUSH_FRAMES: u32 = 8;

pub struct SimRoom {
    pub description: RoomDescription,
    pub rows: Vec<String>,
}

/// One pixel per frame of movement, walls stop the avatar, doors open after a short push.
pub struct SimSession {
    rooms: HashMap<RoomId, SimRoom>,
    pub room: RoomId,
    pub position: PixelPos,
    pub frame: u64,
    memory: BTreeMap<u32, u8>,
    push: Option<(Direction, u32)>,
}

impl SimSession {
    pub fn new(room: RoomId, position: PixelPos) -> Self {
        let mut session = Self {
            rooms: HashMap::new(),
            room,
            position,
            frame: 0,
            memory: BTreeMap::new(),
            push: None,
        };
        session.memory.insert(MODE, 0x07);
        session.memory.insert(BRIGHTNESS, 0x0F);
        session.memory.insert(HEALTH, 0x18);
        session.sync(false);
        session
    }

    pub fn add_room(&mut self, room: RoomId, rows: &[&str], doors: &[DoorSpec]) {
        let rows = rows.iter().map(|row| row.to_string()).collect();
        let description = RoomDescription { doors: doors.to_vec(), stairs: Vec::new() };
        self.rooms.insert(room, SimRoom { description, rows });
    }

    pub fn poke(&mut self, address: u32, value: u8) {
        self.memory.insert(address, value);
    }

    fn walkable(&self, pixel: PixelPos) -> bool {
        let Some(room) = self.rooms.get(&self.room) else {
            return false;
        };
        if pixel.x < 0 || pixel.y < 0 {
            return false;
        }
        let (x, y) = ((pixel.x / TILE) as usize, (pixel.y / TILE) as usize);
        room.rows.get(y).and_then(|row| row.as_bytes().get(x)).is_some_and(|tile| *tile == b'.')
    }

    fn door_ahead(&self, direction: Direction) -> Option<DoorSpec> {
        let room = self.rooms.get(&self.room)?;
        let axis = direction.alignment_axis();
        room.description.doors.iter().copied().find(|door| {
            let coordinate = i32::from(door.offset) * TILE;
            door.direction == direction && (self.position.along(axis) - coordinate).abs() <= 2
        })
    }

    fn enter(&mut self, door: DoorSpec) {
        let coordinate = i32::from(door.offset) * TILE;
        let far = (ROOM_TILES as i32 - 2) * TILE;
        self.room = door.to;
        self.position = match door.direction {
            Direction::North => PixelPos::new(coordinate, far),
            Direction::South => PixelPos::new(coordinate, TILE),
            Direction::West => PixelPos::new(far, coordinate),
            Direction::East => PixelPos::new(TILE, coordinate),
        };
        self.push = None;
    }

    fn sync(&mut self, moving: bool) {
        let [x_lo, x_hi] = (self.position.x as u16).to_le_bytes();
        let [y_lo, y_hi] = (self.position.y as u16).to_le_bytes();
        let [room_lo, room_hi] = self.room.0.to_le_bytes();
        self.memory.insert(POS_X, x_lo);
        self.memory.insert(POS_X + 1, x_hi);
        self.memory.insert(POS_Y, y_lo);
        self.memory.insert(POS_Y + 1, y_hi);
        self.memory.insert(ROOM, room_lo);
        self.memory.insert(ROOM + 1, room_hi);
        self.memory.insert(MOVING, u8::from(moving));
    }
}

impl MemoryBus for SimSession {
    fn read_byte(&mut self, address: u32) -> Result<u8, SessionError> {
        Ok(self.memory.get(&address).copied().unwrap_or(0))
    }

    fn read_word(&mut self, address: u32) -> Result<u16, SessionError> {
        let lo = self.read_byte(address)?;
        let hi = self.read_byte(address + 1)?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn write_byte(&mut self, address: u32, value: u8) -> Result<(), SessionError> {
        self.memory.insert(address, value);
        Ok(())
    }

    fn write_word(&mut self, address: u32, value: u16) -> Result<(), SessionError> {
        let [lo, hi] = value.to_le_bytes();
        self.memory.insert(address, lo);
        self.memory.insert(address + 1, hi);
        Ok(())
    }
}

impl Session for SimSession {
    fn press_direction(&mut self, direction: Direction, frames: u32) -> Result<(), SessionError> {
        let (dx, dy) = direction.delta();
        for _ in 0..frames {
            self.frame += 1;
            let next = PixelPos::new(self.position.x + dx, self.position.y + dy);
            if self.walkable(next) {
                self.position = next;
            }
        }

        match self.door_ahead(direction) {
            Some(door) => {
                let pushed = match self.push {
                    Some((pushing, so_far)) if pushing == direction => so_far + frames,
                    _ => frames,
                };
                if pushed >= DOOR_PUSH_FRAMES {
                    self.enter(door);
                } else {
                    self.push = Some((direction, pushed));
                }
            }
            None => self.push = None,
        }
        self.sync(true);
        Ok(())
    }

    fn press_button(&mut self, _button: Button, frames: u32) -> Result<(), SessionError> {
        self.frame += u64::from(frames);
        self.sync(false);
        Ok(())
    }

    fn advance_frames(&mut self, frames: u32) -> Result<(), SessionError> {
        self.frame += u64::from(frames);
        self.sync(false);
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
        self.sync(false);
        Ok(())
    }

    fn fetch_collision_buffer(&mut self, key: RoomKey) -> Result<CollisionBuffer, SessionError> {
        let room = self.rooms.get(&key.room).ok_or(SessionError::NoCollisionData(key))?;
        let tiles = room
            .rows
            .iter()
            .flat_map(|row| row.bytes().map(|tile| if tile == b'.' { 0x00 } else { 0x01 }))
            .collect();
        Ok(CollisionBuffer {
            width: ROOM_TILES,
            height: room.rows.len(),
            tile_size: TILE as u32,
            origin: PixelPos::default(),
            tiles,
        })
    }

    fn fetch_room_description(&mut self, room: RoomId) -> Result<RoomDescription, SessionError> {
        self.rooms
            .get(&room)
            .map(|room| room.description.clone())
            .ok_or(SessionError::NoRoomDescription(room))
    }
}

/// 16x16 room: solid border, open interior.
pub fn open_room() -> Vec<&'static str> {
    let mut rows = vec!["################"];
    rows.extend(iter::repeat_n("#..............#", 14));
    rows.push("################");
    rows
}

pub fn door_to(to: RoomId, direction: Direction, offset: u16) -> DoorSpec {
    DoorSpec { to, direction, kind: DoorKind::Open, offset }
}
