use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use navcore::graph::DoorEdge;
use navcore::session::RoomDescription;
use navcore::{
    CollisionGrid, EngineConfig, EntranceId, GridPathfinder, GridPos, MoveInput, PathResult,
    RoomGraph, RoomId, RoomKey, TileCode, path_to_move_inputs,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Plan tile and room routes for a scenario file.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the scenario JSON file
    #[arg(short, long)]
    scenario: PathBuf,
    /// Optional engine config TOML; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Print the plan as JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Deserialize)]
struct Scenario {
    grid: GridSpec,
    start: GridPos,
    goal: GridPos,
    #[serde(default)]
    can_swim: bool,
    #[serde(default)]
    rooms: Option<RoomScenario>,
}

#[derive(Deserialize)]
struct GridSpec {
    #[serde(default = "default_tile_size")]
    tile_size: u32,
    rows: Vec<Vec<TileCode>>,
}

fn default_tile_size() -> u32 {
    8
}

#[derive(Deserialize)]
struct RoomScenario {
    entrance: EntranceId,
    from: RoomId,
    to: RoomId,
    descriptions: Vec<RoomEntry>,
}

#[derive(Deserialize)]
struct RoomEntry {
    room: RoomId,
    #[serde(flatten)]
    description: RoomDescription,
}

#[derive(Serialize)]
struct Plan {
    path: Vec<GridPos>,
    cost: u32,
    expanded: u32,
    inputs: Vec<MoveInput>,
    route: Option<Vec<DoorEdge>>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let scenario_data = fs::read_to_string(&args.scenario)
        .with_context(|| format!("Failed to read scenario file: {}", args.scenario.display()))?;
    let scenario: Scenario = serde_json::from_str(&scenario_data)
        .with_context(|| "Failed to deserialize scenario JSON")?;

    let room = scenario.rooms.as_ref().map_or(RoomId(0), |rooms| rooms.from);
    let key = RoomKey::new(room, 0);
    let grid = CollisionGrid::from_rows(key, scenario.grid.tile_size, &scenario.grid.rows)
        .with_context(|| "Scenario grid is malformed")?;
    info!(width = grid.width(), height = grid.height(), "scenario grid loaded");

    let PathResult { path, cost, expanded } = GridPathfinder::new(&config.pathfinding)
        .find_path(&grid, scenario.start, scenario.goal, scenario.can_swim)
        .with_context(|| format!("No tile route from {} to {}", scenario.start, scenario.goal))?;
    let inputs = path_to_move_inputs(&path).with_context(|| "Planned path is not contiguous")?;

    let route = match &scenario.rooms {
        Some(rooms) => {
            let descriptions =
                rooms.descriptions.iter().map(|entry| (entry.room, entry.description.clone()));
            let graph = RoomGraph::from_descriptions(rooms.entrance, descriptions);
            let route = graph
                .bfs_path(rooms.from, rooms.to)
                .with_context(|| format!("No room route from {} to {}", rooms.from, rooms.to))?;
            Some(route)
        }
        None => None,
    };

    let plan = Plan { path, cost, expanded, inputs, route };
    if args.json {
        let json = serde_json::to_string_pretty(&plan).with_context(|| "Failed to encode plan")?;
        println!("{json}");
        return Ok(());
    }

    println!("Tile path ({} steps, {} nodes expanded):", plan.cost, plan.expanded);
    let tiles: Vec<String> = plan.path.iter().map(GridPos::to_string).collect();
    println!("  {}", tiles.join(" -> "));
    println!("Move inputs:");
    for input in &plan.inputs {
        println!("  {:?} x{}", input.direction, input.tiles);
    }
    if let Some(route) = &plan.route {
        println!("Room route ({} doors):", route.len());
        for edge in route {
            println!(
                "  {} -> {} via {:?} {:?} door at offset {}",
                edge.from, edge.to, edge.direction, edge.kind, edge.offset
            );
        }
    }

    Ok(())
}
