//! Per-session holder that swaps the collision grid whenever the room key changes.

use tracing::{debug, info};

use super::{CollisionGrid, GridError};
use crate::session::Session;
use crate::types::RoomKey;

#[derive(Debug, Default)]
pub struct GridCache {
    grid: Option<CollisionGrid>,
    refreshes: u32,
}

impl GridCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grid for `key`, fetching a fresh one if the cached grid belongs to another key.
    pub fn grid_for<S: Session + ?Sized>(
        &mut self,
        session: &mut S,
        key: RoomKey,
    ) -> Result<&CollisionGrid, GridError> {
        let grid = match self.grid.take() {
            Some(grid) if grid.key() == key => {
                debug!(room = %key, "collision grid reused");
                grid
            }
            previous => {
                let buffer = session.fetch_collision_buffer(key)?;
                let fresh = CollisionGrid::from_buffer(key, buffer)?;
                let previous = previous.as_ref().map(CollisionGrid::fingerprint);
                info!(
                    room = %key,
                    width = fresh.width(),
                    height = fresh.height(),
                    fingerprint = fresh.fingerprint(),
                    same_tiles_as_previous = previous == Some(fresh.fingerprint()),
                    "collision grid refreshed"
                );
                self.refreshes += 1;
                fresh
            }
        };
        Ok(self.grid.insert(grid))
    }

    pub fn current(&self) -> Option<&CollisionGrid> {
        self.grid.as_ref()
    }

    /// Number of fetches performed so far.
    pub fn refreshes(&self) -> u32 {
        self.refreshes
    }

    pub fn invalidate(&mut self) {
        self.grid = None;
    }
}
