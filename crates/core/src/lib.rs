pub mod anomaly;
pub mod config;
pub mod graph;
pub mod grid;
pub mod pathfinding;
pub mod session;
pub mod snapshot;
pub mod types;
pub mod verify;

#[cfg(test)]
mod test_support;

pub use anomaly::{Anomaly, AnomalyDetector, AnomalyKind, Severity};
pub use config::{ConfigError, EngineConfig};
pub use graph::{
    DoorEdge, DoorKind, GraphError, GraphNavigator, RoomGraph, StairEdge, StairKind,
    TraversalError, TraversalOutcome, build_graph,
};
pub use grid::{CollisionGrid, GridCache, GridError, NavCategory, classify};
pub use pathfinding::{GridPathfinder, PathError, PathResult, find_path, path_to_move_inputs};
pub use session::{MemoryBus, Session, SessionError};
pub use snapshot::{StateSnapshot, capture_snapshot};
pub use types::*;
pub use verify::{IntegrityVerifier, MemoryCheck, VerificationError, VerificationReport};
