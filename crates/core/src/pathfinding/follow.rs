//! Executes planned move inputs through a session and checks the avatar lands where planned.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::displace;
use crate::config::PathfindingConfig;
use crate::grid::CollisionGrid;
use crate::session::{Session, SessionError};
use crate::types::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathFollowError {
    #[error("after input {index} expected avatar on tile {expected}, found {actual:?}")]
    Diverged { index: usize, expected: GridPos, actual: Option<GridPos> },
    #[error("input {index} needs {needed} frames but only {remaining} of {budget} remain")]
    Timeout { index: usize, needed: u32, remaining: u32, budget: u32 },
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowReport {
    pub inputs_executed: usize,
    pub frames_spent: u32,
    pub final_tile: GridPos,
}

/// Drives a session along move inputs planned on `grid`.
pub struct PathFollower<'a> {
    grid: &'a CollisionGrid,
    frames_per_tile: u32,
    frame_budget: u32,
}

impl<'a> PathFollower<'a> {
    pub fn new(grid: &'a CollisionGrid, config: &PathfindingConfig) -> Self {
        Self {
            grid,
            frames_per_tile: config.frames_per_tile,
            frame_budget: config.follow_frame_budget,
        }
    }

    /// Execute `inputs` one at a time starting from tile `start`, polling position after each.
    ///
    /// Stops at the first input that leaves the avatar off its planned tile.
    pub fn follow<S: Session + ?Sized>(
        &self,
        session: &mut S,
        start: GridPos,
        inputs: &[MoveInput],
    ) -> Result<FollowReport, PathFollowError> {
        let mut spent = 0_u32;
        let mut expected = start;

        for (index, input) in inputs.iter().enumerate() {
            let needed = input.frames(self.frames_per_tile);
            let remaining = self.frame_budget.saturating_sub(spent);
            if needed > remaining {
                warn!(index, needed, remaining, "path follow out of frames");
                return Err(PathFollowError::Timeout {
                    index,
                    needed,
                    remaining,
                    budget: self.frame_budget,
                });
            }

            session.press_direction(input.direction, needed)?;
            spent += needed;
            expected = displace(expected, &[*input]);

            let actual = self.grid.to_grid(session.current_position()?);
            debug!(
                index,
                direction = ?input.direction,
                tiles = input.tiles,
                %expected,
                ?actual,
                "move input executed"
            );
            if actual != Some(expected) {
                warn!(index, %expected, ?actual, "avatar diverged from planned path");
                return Err(PathFollowError::Diverged { index, expected, actual });
            }
        }

        Ok(FollowReport {
            inputs_executed: inputs.len(),
            frames_spent: spent,
            final_tile: expected,
        })
    }
}
