//! Per-edge traversal: pick a door, line up with it, push through, and confirm arrival.
//!
//! Every loop here is bounded by a frame budget from `TraversalConfig`. Failures are
//! returned to the caller untouched; nothing retries on its own.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{DoorEdge, GraphError, RoomGraph, StairEdge, StairTrigger};
use crate::config::{ConfigError, TraversalConfig};
use crate::session::{Session, SessionError};
use crate::types::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraversalError {
    #[error("avatar is in {actual}, edge starts in {expected}")]
    NotInRoom { expected: RoomId, actual: RoomId },
    #[error("room stayed {from} for {frames} frames while heading to {to}")]
    Timeout { from: RoomId, to: RoomId, frames: u32 },
    #[error("expected to enter {expected} from {from}, arrived in {actual}")]
    WrongRoom { from: RoomId, expected: RoomId, actual: RoomId },
    #[error(
        "alignment stalled {offset}px off the door to {to}; room stayed {from} for {frames} frames"
    )]
    RoomUnchanged { from: RoomId, to: RoomId, offset: i32, frames: u32 },
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// How the avatar was lined up with a door before pushing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    NotRequired,
    /// Column door: cross-axis coordinate written directly.
    Snapped { from: i32, to: i32 },
    /// Row door: walked into the tolerance band.
    Walked { presses: u32, offset: i32 },
    /// Row door: gave up short of the band; `offset` is what was left.
    Stalled { presses: u32, offset: i32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    Door(DoorEdge),
    Stairs(StairEdge),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalOutcome {
    pub transition: Transition,
    pub frames_spent: u32,
    pub alignment: Alignment,
}

/// Door among `candidates` whose alignment coordinate is closest to `position`.
///
/// Ties go to the earliest candidate. Returns `None` only for an empty slice.
pub fn select_closest_edge(
    candidates: &[DoorEdge],
    position: PixelPos,
    tile_size: u32,
) -> Option<DoorEdge> {
    candidates.iter().copied().min_by_key(|edge| {
        let axis = edge.direction.alignment_axis();
        edge.alignment_coordinate(tile_size).abs_diff(position.along(axis))
    })
}

enum Arrival {
    Confirmed,
    Bounced,
    Elsewhere(RoomId),
}

pub struct GraphNavigator<'g> {
    graph: &'g RoomGraph,
    config: TraversalConfig,
}

impl<'g> GraphNavigator<'g> {
    /// Rejects configs whose press lengths or budgets would keep a loop from advancing.
    pub fn new(graph: &'g RoomGraph, config: TraversalConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { graph, config })
    }

    pub fn graph(&self) -> &RoomGraph {
        self.graph
    }

    /// Walk the fewest-doors route to `target`, stopping at the first edge that fails.
    pub fn go_to_room<S: Session + ?Sized>(
        &self,
        session: &mut S,
        target: RoomId,
    ) -> Result<Vec<TraversalOutcome>, TraversalError> {
        let start = session.current_room_id()?;
        let route = self.graph.bfs_path(start, target)?;
        info!(from = %start, to = %target, doors = route.len(), "following room route");

        let mut outcomes = Vec::with_capacity(route.len());
        for edge in &route {
            match self.traverse_door(session, edge) {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    warn!(from = %edge.from, to = %edge.to, error = %err, "room route aborted");
                    return Err(err);
                }
            }
        }
        Ok(outcomes)
    }

    /// Move through one door: select, align, push, confirm.
    pub fn traverse_door<S: Session + ?Sized>(
        &self,
        session: &mut S,
        edge: &DoorEdge,
    ) -> Result<TraversalOutcome, TraversalError> {
        ensure_in_room(session, edge.from)?;

        let position = session.current_position()?;
        let candidates = self.graph.parallel_doors(edge.from, edge.to, edge.direction);
        let door =
            select_closest_edge(&candidates, position, self.config.tile_size).unwrap_or(*edge);
        debug!(
            from = %door.from,
            to = %door.to,
            offset = door.offset,
            candidates = candidates.len(),
            "door selected"
        );

        let mut spent = 0_u32;
        let alignment = self.align(session, &door, position, &mut spent)?;

        let budget = self.config.edge_frame_budget;
        while spent < budget {
            session.press_direction(door.direction, self.config.push_frames)?;
            spent = spent.saturating_add(self.config.push_frames);
            match self.check_arrival(session, door.from, door.to, &mut spent)? {
                None | Some(Arrival::Bounced) => continue,
                Some(Arrival::Confirmed) => {
                    info!(from = %door.from, to = %door.to, frames = spent, "door traversed");
                    return Ok(TraversalOutcome {
                        transition: Transition::Door(door),
                        frames_spent: spent,
                        alignment,
                    });
                }
                Some(Arrival::Elsewhere(actual)) => {
                    return Err(TraversalError::WrongRoom {
                        from: door.from,
                        expected: door.to,
                        actual,
                    });
                }
            }
        }

        match alignment {
            Alignment::Stalled { offset, .. } => Err(TraversalError::RoomUnchanged {
                from: door.from,
                to: door.to,
                offset,
                frames: spent,
            }),
            _ => Err(TraversalError::Timeout { from: door.from, to: door.to, frames: spent }),
        }
    }

    /// Trigger a stair transition and wait for the room id to become the stair's target.
    pub fn take_stairs<S: Session + ?Sized>(
        &self,
        session: &mut S,
        edge: &StairEdge,
    ) -> Result<TraversalOutcome, TraversalError> {
        ensure_in_room(session, edge.from)?;

        let frames = self.config.stair_press_frames;
        let budget = self.config.stair_frame_budget;
        let mut spent = 0_u32;
        while spent < budget {
            match edge.kind.trigger() {
                StairTrigger::Hold(direction) => session.press_direction(direction, frames)?,
                StairTrigger::Press(button) => session.press_button(button, frames)?,
                StairTrigger::Wait => session.advance_frames(frames)?,
            }
            spent = spent.saturating_add(frames);
            match self.check_arrival(session, edge.from, edge.to, &mut spent)? {
                None | Some(Arrival::Bounced) => continue,
                Some(Arrival::Confirmed) => {
                    info!(
                        from = %edge.from,
                        to = %edge.to,
                        kind = ?edge.kind,
                        frames = spent,
                        "stairs taken"
                    );
                    return Ok(TraversalOutcome {
                        transition: Transition::Stairs(*edge),
                        frames_spent: spent,
                        alignment: Alignment::NotRequired,
                    });
                }
                Some(Arrival::Elsewhere(actual)) => {
                    return Err(TraversalError::WrongRoom {
                        from: edge.from,
                        expected: edge.to,
                        actual,
                    });
                }
            }
        }
        Err(TraversalError::Timeout { from: edge.from, to: edge.to, frames: spent })
    }

    fn align<S: Session + ?Sized>(
        &self,
        session: &mut S,
        door: &DoorEdge,
        position: PixelPos,
        spent: &mut u32,
    ) -> Result<Alignment, SessionError> {
        if !door.kind.requires_alignment() {
            return Ok(Alignment::NotRequired);
        }
        let axis = door.direction.alignment_axis();
        let target = door.alignment_coordinate(self.config.tile_size);

        if axis == Axis::X {
            let from = position.x;
            session.set_position_axis(Axis::X, target)?;
            debug!(from, to = target, "snapped to door column");
            return Ok(Alignment::Snapped { from, to: target });
        }

        let mut current = position.along(axis);
        let mut presses = 0_u32;
        let mut unchanged_polls = 0_u32;
        loop {
            let offset = target - current;
            if offset.abs() <= self.config.align_tolerance {
                debug!(presses, offset, "aligned with door row");
                return Ok(Alignment::Walked { presses, offset });
            }
            if presses >= self.config.align_max_presses
                || unchanged_polls >= self.config.stuck_poll_limit
            {
                warn!(presses, offset, unchanged_polls, "door row alignment stalled");
                return Ok(Alignment::Stalled { presses, offset });
            }

            let direction = Direction::along(axis, offset > 0);
            session.press_direction(direction, self.config.align_press_frames)?;
            *spent = spent.saturating_add(self.config.align_press_frames);
            presses += 1;

            let polled = session.current_position()?.along(axis);
            if polled == current {
                unchanged_polls += 1;
            } else {
                unchanged_polls = 0;
            }
            current = polled;
        }
    }

    /// `None` while still in `from`; otherwise settle and classify where the avatar ended up.
    fn check_arrival<S: Session + ?Sized>(
        &self,
        session: &mut S,
        from: RoomId,
        to: RoomId,
        spent: &mut u32,
    ) -> Result<Option<Arrival>, SessionError> {
        if session.current_room_id()? == from {
            return Ok(None);
        }
        session.advance_frames(self.config.settle_frames)?;
        *spent = spent.saturating_add(self.config.settle_frames);

        let settled = session.current_room_id()?;
        let arrival = if settled == from {
            debug!(room = %from, "transient room change bounced back");
            Arrival::Bounced
        } else if settled == to {
            Arrival::Confirmed
        } else {
            warn!(from = %from, expected = %to, actual = %settled, "arrived in unexpected room");
            Arrival::Elsewhere(settled)
        };
        Ok(Some(arrival))
    }
}

fn ensure_in_room<S: Session + ?Sized>(
    session: &mut S,
    expected: RoomId,
) -> Result<(), TraversalError> {
    let actual = session.current_room_id()?;
    if actual != expected {
        return Err(TraversalError::NotInRoom { expected, actual });
    }
    Ok(())
}
