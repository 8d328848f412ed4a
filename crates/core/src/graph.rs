//! Room connectivity for one play session and breadth-first routing over it.
//! This module exists so room routes are planned from an explicit, caller-owned graph.
//! It does not own physical traversal; see `navigator` for the per-edge state machine.

mod navigator;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::session::{RoomDescription, Session, SessionError};
use crate::types::*;

pub use navigator::{
    Alignment, GraphNavigator, Transition, TraversalError, TraversalOutcome, select_closest_edge,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DoorKind {
    Open,
    Shutter,
    Locked,
    BigKeyLocked,
    /// Doorless opening in the wall; no alignment needed.
    Passage,
}

impl DoorKind {
    pub fn requires_alignment(self) -> bool {
        !matches!(self, DoorKind::Passage)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StairKind {
    Up,
    Down,
    /// Hole dropping into the room below.
    Pit,
    Warp,
}

/// Input that sets a stair transition off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StairTrigger {
    Hold(Direction),
    Press(Button),
    /// Nothing to press; the transition runs on its own once the avatar is on the tile.
    Wait,
}

impl StairKind {
    pub fn trigger(self) -> StairTrigger {
        match self {
            StairKind::Up => StairTrigger::Hold(Direction::North),
            StairKind::Down => StairTrigger::Hold(Direction::South),
            StairKind::Pit => StairTrigger::Wait,
            StairKind::Warp => StairTrigger::Press(Button::A),
        }
    }
}

/// Physically traversed connection from one room into another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorEdge {
    pub from: RoomId,
    pub to: RoomId,
    pub direction: Direction,
    pub kind: DoorKind,
    /// Tile offset of the door along its wall within `from`.
    pub offset: u16,
}

impl DoorEdge {
    /// Room-local pixel coordinate the avatar must match on the door's alignment axis.
    ///
    /// Saturates at `i32::MAX` rather than wrapping for oversized tiles.
    pub fn alignment_coordinate(&self, tile_size: u32) -> i32 {
        let tile_size = i32::try_from(tile_size).unwrap_or(i32::MAX);
        i32::from(self.offset).saturating_mul(tile_size)
    }
}

/// Teleport-like connection that skips direction and alignment logic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StairEdge {
    pub from: RoomId,
    pub to: RoomId,
    pub kind: StairKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("{0} is not part of the room graph")]
    UnknownRoom(RoomId),
    #[error("no door route from {from} to {to}")]
    NoRoute { from: RoomId, to: RoomId },
    #[error("room exploration exceeded {limit} rooms")]
    TooManyRooms { limit: usize },
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Doors and stairs of one play session, scoped to the entrance the session started from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomGraph {
    entrance: EntranceId,
    rooms: BTreeSet<RoomId>,
    doors: Vec<DoorEdge>,
    stairs: Vec<StairEdge>,
    doors_by_room: BTreeMap<RoomId, Vec<usize>>,
    stairs_by_room: BTreeMap<RoomId, Vec<usize>>,
}

impl RoomGraph {
    pub fn new(entrance: EntranceId) -> Self {
        Self {
            entrance,
            rooms: BTreeSet::new(),
            doors: Vec::new(),
            stairs: Vec::new(),
            doors_by_room: BTreeMap::new(),
            stairs_by_room: BTreeMap::new(),
        }
    }

    /// Build from descriptions already fetched, in the given room order.
    pub fn from_descriptions<I>(entrance: EntranceId, descriptions: I) -> Self
    where
        I: IntoIterator<Item = (RoomId, RoomDescription)>,
    {
        let mut graph = Self::new(entrance);
        for (room, description) in descriptions {
            graph.add_description(room, &description);
        }
        graph
    }

    pub fn add_door(&mut self, edge: DoorEdge) {
        self.rooms.insert(edge.from);
        self.rooms.insert(edge.to);
        self.doors_by_room.entry(edge.from).or_default().push(self.doors.len());
        self.doors.push(edge);
    }

    pub fn add_stair(&mut self, edge: StairEdge) {
        self.rooms.insert(edge.from);
        self.rooms.insert(edge.to);
        self.stairs_by_room.entry(edge.from).or_default().push(self.stairs.len());
        self.stairs.push(edge);
    }

    fn add_description(&mut self, room: RoomId, description: &RoomDescription) {
        self.rooms.insert(room);
        for door in &description.doors {
            self.add_door(DoorEdge {
                from: room,
                to: door.to,
                direction: door.direction,
                kind: door.kind,
                offset: door.offset,
            });
        }
        for stair in &description.stairs {
            self.add_stair(StairEdge { from: room, to: stair.to, kind: stair.kind });
        }
    }

    pub fn entrance(&self) -> EntranceId {
        self.entrance
    }

    /// Whether this graph still describes a session that entered through `entrance`.
    pub fn is_current_for(&self, entrance: EntranceId) -> bool {
        self.entrance == entrance
    }

    pub fn contains_room(&self, room: RoomId) -> bool {
        self.rooms.contains(&room)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn door_count(&self) -> usize {
        self.doors.len()
    }

    pub fn doors_from(&self, room: RoomId) -> impl Iterator<Item = &DoorEdge> {
        self.doors_by_room.get(&room).into_iter().flatten().map(|index| &self.doors[*index])
    }

    pub fn stairs_from(&self, room: RoomId) -> impl Iterator<Item = &StairEdge> {
        self.stairs_by_room.get(&room).into_iter().flatten().map(|index| &self.stairs[*index])
    }

    /// Every door leaving `from` for `to` through the wall facing `direction`.
    pub fn parallel_doors(&self, from: RoomId, to: RoomId, direction: Direction) -> Vec<DoorEdge> {
        self.doors_from(from)
            .filter(|door| door.to == to && door.direction == direction)
            .copied()
            .collect()
    }

    /// Fewest-doors route from `from` to `to`. Stairs are never used implicitly.
    pub fn bfs_path(&self, from: RoomId, to: RoomId) -> Result<Vec<DoorEdge>, GraphError> {
        if !self.contains_room(from) {
            return Err(GraphError::UnknownRoom(from));
        }
        if !self.contains_room(to) {
            return Err(GraphError::UnknownRoom(to));
        }
        if from == to {
            return Ok(Vec::new());
        }

        let mut visited = BTreeSet::from([from]);
        let mut came_from: BTreeMap<RoomId, usize> = BTreeMap::new();
        let mut queue = VecDeque::from([from]);

        while let Some(room) = queue.pop_front() {
            for &index in self.doors_by_room.get(&room).into_iter().flatten() {
                let next = self.doors[index].to;
                if !visited.insert(next) {
                    continue;
                }
                came_from.insert(next, index);
                if next == to {
                    let route = self.reconstruct_route(&came_from, from, to);
                    debug!(%from, %to, doors = route.len(), "room route found");
                    return Ok(route);
                }
                queue.push_back(next);
            }
        }

        Err(GraphError::NoRoute { from, to })
    }

    fn reconstruct_route(
        &self,
        came_from: &BTreeMap<RoomId, usize>,
        from: RoomId,
        to: RoomId,
    ) -> Vec<DoorEdge> {
        let mut route = Vec::new();
        let mut room = to;
        while room != from {
            let Some(&index) = came_from.get(&room) else {
                break;
            };
            let edge = self.doors[index];
            route.push(edge);
            room = edge.from;
        }
        route.reverse();
        route
    }
}

/// Explore room descriptions breadth-first from `roots` and collect every door and stair.
///
/// Each room is fetched once. Exploration stops with an error rather than returning a
/// partial graph once more than `max_rooms` rooms would have to be fetched.
pub fn build_graph<S: Session + ?Sized>(
    session: &mut S,
    entrance: EntranceId,
    roots: &[RoomId],
    max_rooms: usize,
) -> Result<RoomGraph, GraphError> {
    let mut graph = RoomGraph::new(entrance);
    let mut seen: BTreeSet<RoomId> = BTreeSet::new();
    let mut queue: VecDeque<RoomId> = VecDeque::new();
    for &root in roots {
        if seen.insert(root) {
            queue.push_back(root);
        }
    }

    let mut fetched = 0_usize;
    while let Some(room) = queue.pop_front() {
        if fetched == max_rooms {
            return Err(GraphError::TooManyRooms { limit: max_rooms });
        }
        let description = session.fetch_room_description(room)?;
        fetched += 1;

        let targets = description
            .doors
            .iter()
            .map(|door| door.to)
            .chain(description.stairs.iter().map(|stair| stair.to));
        for target in targets {
            if seen.insert(target) {
                queue.push_back(target);
            }
        }
        graph.add_description(room, &description);
    }

    info!(
        entrance = entrance.0,
        rooms = graph.room_count(),
        doors = graph.door_count(),
        stairs = graph.stairs.len(),
        "room graph built"
    );
    Ok(graph)
}
