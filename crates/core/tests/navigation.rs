mod support;

use navcore::config::EngineConfig;
use navcore::graph::{Alignment, Transition};
use navcore::pathfinding::PathFollower;
use navcore::{
    Direction, EntranceId, GraphNavigator, GridCache, GridPos, PixelPos, RoomId, RoomKey,
    TraversalError, build_graph, find_path, path_to_move_inputs,
};
use support::{SimSession, door_to, open_room};

const A: RoomId = RoomId(0x10);
const B: RoomId = RoomId(0x11);
const C: RoomId = RoomId(0x12);

fn walled_room() -> Vec<&'static str> {
    let mut rows = open_room();
    rows[6] = "#.############.#";
    rows
}

fn three_rooms() -> SimSession {
    let mut session = SimSession::new(A, PixelPos::new(24, 96));
    session.add_room(A, &walled_room(), &[door_to(B, Direction::North, 8)]);
    session.add_room(
        B,
        &open_room(),
        &[door_to(C, Direction::East, 5), door_to(A, Direction::South, 8)],
    );
    session.add_room(C, &open_room(), &[door_to(B, Direction::West, 5)]);
    session
}

#[test]
fn test_build_graph_discovers_every_connected_room() {
    let mut session = three_rooms();
    let graph = build_graph(&mut session, EntranceId(1), &[A], 8).expect("graph should build");

    assert_eq!(graph.room_count(), 3);
    assert_eq!(graph.door_count(), 4);
    assert!(graph.is_current_for(EntranceId(1)));
    assert!(!graph.is_current_for(EntranceId(2)));

    let route = graph.bfs_path(A, C).expect("C is two doors away");
    let hops: Vec<(RoomId, RoomId)> = route.iter().map(|edge| (edge.from, edge.to)).collect();
    assert_eq!(hops, vec![(A, B), (B, C)]);
}

#[test]
fn test_go_to_room_crosses_column_and_row_doors() {
    let mut session = three_rooms();
    let config = EngineConfig::default();
    let graph = build_graph(&mut session, EntranceId(1), &[A], 8).expect("graph should build");
    let navigator = GraphNavigator::new(&graph, config.traversal.clone()).expect("valid config");

    let outcomes = navigator.go_to_room(&mut session, C).expect("route should complete");

    assert_eq!(session.room, C);
    assert_eq!(outcomes.len(), 2);
    assert!(matches!(outcomes[0].transition, Transition::Door(edge) if edge.to == B));
    assert_eq!(outcomes[0].alignment, Alignment::Snapped { from: 24, to: 64 });
    match outcomes[1].alignment {
        Alignment::Walked { presses, offset } => {
            assert_eq!(presses, 35);
            assert!(offset.abs() <= config.traversal.align_tolerance);
        }
        other => panic!("expected walked alignment, got {other:?}"),
    }
    assert!(outcomes.iter().all(|outcome| outcome.frames_spent <= 600));
}

#[test]
fn test_go_to_room_reports_unreachable_target_without_moving() {
    let mut session = three_rooms();
    let graph = build_graph(&mut session, EntranceId(1), &[A], 8).expect("graph should build");
    let navigator = GraphNavigator::new(&graph, EngineConfig::default().traversal)
        .expect("valid config");

    let err = navigator.go_to_room(&mut session, RoomId(0x99)).expect_err("room not in graph");

    assert!(matches!(err, TraversalError::Graph(_)), "unexpected error: {err}");
    assert_eq!(session.position, PixelPos::new(24, 96));
    assert_eq!(session.frame, 0);
}

#[test]
fn test_tile_route_is_planned_and_followed_inside_a_room() {
    let mut session = three_rooms();
    session.position = PixelPos::new(16, 16);
    let config = EngineConfig::default();

    let mut cache = GridCache::new();
    let grid = cache.grid_for(&mut session, RoomKey::new(A, 0)).expect("grid should load");
    let start = GridPos::new(2, 2);
    let goal = GridPos::new(12, 10);

    let result = find_path(grid, start, goal, false).expect("gap in the wall is reachable");
    assert_eq!(result.cost, 20);
    assert!(result.path.contains(&GridPos::new(1, 6)));
    assert!(result.path.iter().all(|pos| grid.is_walkable(*pos, false)));

    let inputs = path_to_move_inputs(&result.path).expect("path is adjacent");
    let report = PathFollower::new(grid, &config.pathfinding)
        .follow(&mut session, start, &inputs)
        .expect("simulated avatar follows the plan");

    assert_eq!(report.final_tile, goal);
    assert_eq!(report.inputs_executed, inputs.len());
    assert_eq!(report.frames_spent, 20 * 8);
    assert_eq!(session.position, PixelPos::new(96, 80));
}

#[test]
fn test_grid_cache_refetches_only_on_room_change() {
    let mut session = three_rooms();
    let mut cache = GridCache::new();

    let first = cache.grid_for(&mut session, RoomKey::new(A, 0)).expect("A").fingerprint();
    cache.grid_for(&mut session, RoomKey::new(A, 0)).expect("A again");
    assert_eq!(cache.refreshes(), 1);

    let second = cache.grid_for(&mut session, RoomKey::new(B, 0)).expect("B").fingerprint();
    assert_eq!(cache.refreshes(), 2);
    assert_ne!(first, second);
    assert_eq!(cache.current().map(|grid| grid.key().room), Some(B));
}
