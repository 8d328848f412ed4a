//! Deterministic A* over a collision grid and the move-input planning built on its routes.
//! This module exists so tile routing is reproducible: equal-cost ties always resolve the same way.
//! It does not own room-to-room routing or the decision of which tile to target.

mod follow;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use thiserror::Error;
use tracing::debug;

use crate::config::PathfindingConfig;
use crate::grid::CollisionGrid;
use crate::types::*;

pub use follow::{FollowReport, PathFollowError, PathFollower};

/// Cost of one axis-aligned step.
pub const STEP_COST: u32 = 1;

new_key_type! {
    /// Handle of a search node inside one search's arena.
    pub struct NodeId;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("start {0} is not walkable")]
    StartInvalid(GridPos),
    #[error("goal {0} is out of bounds or not walkable")]
    GoalUnreachable(GridPos),
    #[error("no path from {start} to {goal}")]
    NoPathFound { start: GridPos, goal: GridPos },
    #[error("search from {start} to {goal} stopped after {expanded} expansions")]
    SearchBudgetExhausted { start: GridPos, goal: GridPos, expanded: u32 },
    #[error("path steps {from} -> {to} are not adjacent")]
    NonAdjacentSteps { from: GridPos, to: GridPos },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathResult {
    /// Start to goal, both inclusive.
    pub path: Vec<GridPos>,
    pub cost: u32,
    /// Nodes expanded before the goal was popped.
    pub expanded: u32,
}

#[derive(Clone, Copy, Debug)]
struct PathNode {
    pos: GridPos,
    g: u32,
    h: u32,
    parent: Option<NodeId>,
}

impl PathNode {
    fn f(&self) -> u32 {
        self.g + self.h
    }
}

/// Open-set entry. Ordered by `f`, then by insertion sequence so equal-`f` nodes pop FIFO.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct OpenNode {
    f: u32,
    seq: u64,
    id: NodeId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridPathfinder {
    max_expansions: u32,
}

impl Default for GridPathfinder {
    fn default() -> Self {
        Self::new(&PathfindingConfig::default())
    }
}

impl GridPathfinder {
    pub fn new(config: &PathfindingConfig) -> Self {
        Self { max_expansions: config.max_expansions }
    }

    pub fn with_max_expansions(max_expansions: u32) -> Self {
        Self { max_expansions }
    }

    pub fn find_path(
        &self,
        grid: &CollisionGrid,
        start: GridPos,
        goal: GridPos,
        can_swim: bool,
    ) -> Result<PathResult, PathError> {
        if !grid.is_walkable(goal, can_swim) {
            return Err(PathError::GoalUnreachable(goal));
        }
        if !grid.is_walkable(start, can_swim) {
            return Err(PathError::StartInvalid(start));
        }

        let mut arena: SlotMap<NodeId, PathNode> = SlotMap::with_key();
        let mut open_set = BTreeSet::new();
        let mut g_score = BTreeMap::new();
        let mut seq = 0_u64;
        let mut expanded = 0_u32;

        let root =
            arena.insert(PathNode { pos: start, g: 0, h: start.manhattan(goal), parent: None });
        open_set.insert(OpenNode { f: arena[root].f(), seq, id: root });
        g_score.insert(start, 0);

        while let Some(entry) = open_set.pop_first() {
            let node = arena[entry.id];
            if g_score.get(&node.pos).is_some_and(|best| *best < node.g) {
                continue;
            }
            if node.pos == goal {
                debug!(%start, %goal, cost = node.g, expanded, "path found");
                let path = reconstruct_path(&arena, entry.id);
                return Ok(PathResult { path, cost: node.g, expanded });
            }
            if expanded >= self.max_expansions {
                debug!(%start, %goal, expanded, "search budget exhausted");
                return Err(PathError::SearchBudgetExhausted { start, goal, expanded });
            }
            expanded += 1;

            for next in grid.neighbors(node.pos, can_swim) {
                let tentative = node.g + STEP_COST;
                if tentative < *g_score.get(&next).unwrap_or(&u32::MAX) {
                    g_score.insert(next, tentative);
                    let child = arena.insert(PathNode {
                        pos: next,
                        g: tentative,
                        h: next.manhattan(goal),
                        parent: Some(entry.id),
                    });
                    seq += 1;
                    open_set.insert(OpenNode { f: arena[child].f(), seq, id: child });
                }
            }
        }

        debug!(%start, %goal, expanded, "open set exhausted");
        Err(PathError::NoPathFound { start, goal })
    }
}

/// A* with the default expansion cap.
pub fn find_path(
    grid: &CollisionGrid,
    start: GridPos,
    goal: GridPos,
    can_swim: bool,
) -> Result<PathResult, PathError> {
    GridPathfinder::default().find_path(grid, start, goal, can_swim)
}

fn reconstruct_path(arena: &SlotMap<NodeId, PathNode>, goal: NodeId) -> Vec<GridPos> {
    let mut result = Vec::new();
    let mut cursor = Some(goal);
    while let Some(id) = cursor {
        let node = &arena[id];
        result.push(node.pos);
        cursor = node.parent;
    }
    result.reverse();
    result
}

/// Collapse a tile path into runs of same-direction steps.
pub fn path_to_move_inputs(path: &[GridPos]) -> Result<Vec<MoveInput>, PathError> {
    let mut inputs: Vec<MoveInput> = Vec::new();
    for pair in path.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let direction = from.direction_to(to).ok_or(PathError::NonAdjacentSteps { from, to })?;
        match inputs.last_mut() {
            Some(last) if last.direction == direction => last.tiles += 1,
            _ => inputs.push(MoveInput { direction, tiles: 1 }),
        }
    }
    Ok(inputs)
}

/// Tile reached from `start` after executing `inputs` on an unobstructed grid.
pub fn displace(start: GridPos, inputs: &[MoveInput]) -> GridPos {
    inputs.iter().fold(start, |pos, input| {
        let (dx, dy) = input.direction.delta();
        let tiles = input.tiles as i32;
        GridPos { x: pos.x + dx * tiles, y: pos.y + dy * tiles }
    })
}
