use std::collections::{BTreeMap, VecDeque};

use anyhow::{Result, bail};
use clap::Parser;
use navcore::pathfinding::displace;
use navcore::{
    CollisionGrid, GridPathfinder, GridPos, PathError, RoomId, RoomKey, TileCode,
    path_to_move_inputs,
};
use rand_chacha::{
    ChaCha8Rng,
    rand_core::{Rng, SeedableRng},
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = 42)]
    seed: u64,
    #[arg(short, long, default_value_t = 1000)]
    cases: u32,
}

fn below(rng: &mut ChaCha8Rng, bound: u64) -> u64 {
    rng.next_u64() % bound
}

/// Floor, wall, or deep water; walls dominate the non-floor share.
fn random_grid(rng: &mut ChaCha8Rng) -> Result<CollisionGrid> {
    let width = 4 + below(rng, 21) as usize;
    let height = 4 + below(rng, 21) as usize;
    let wall_percent = below(rng, 45);
    let rows: Vec<Vec<TileCode>> = (0..height)
        .map(|_| {
            (0..width)
                .map(|_| match below(rng, 100) {
                    roll if roll < wall_percent => 0x01,
                    roll if roll < wall_percent + 5 => 0x08,
                    _ => 0x00,
                })
                .collect()
        })
        .collect();
    Ok(CollisionGrid::from_rows(RoomKey::new(RoomId(0), 0), 8, &rows)?)
}

fn random_pos(rng: &mut ChaCha8Rng, grid: &CollisionGrid) -> GridPos {
    GridPos::new(below(rng, grid.width() as u64) as i32, below(rng, grid.height() as u64) as i32)
}

/// Plain breadth-first distance, used as the optimality reference.
fn bfs_distance(
    grid: &CollisionGrid,
    start: GridPos,
    goal: GridPos,
    can_swim: bool,
) -> Option<u32> {
    let mut distance = BTreeMap::from([(start, 0_u32)]);
    let mut queue = VecDeque::from([start]);
    while let Some(pos) = queue.pop_front() {
        let here = distance[&pos];
        if pos == goal {
            return Some(here);
        }
        for next in grid.neighbors(pos, can_swim) {
            distance.entry(next).or_insert_with(|| {
                queue.push_back(next);
                here + 1
            });
        }
    }
    None
}

fn check_case(grid: &CollisionGrid, start: GridPos, goal: GridPos, can_swim: bool) -> Result<()> {
    let pathfinder = GridPathfinder::default();
    let first = pathfinder.find_path(grid, start, goal, can_swim);
    let second = pathfinder.find_path(grid, start, goal, can_swim);
    if first != second {
        bail!("non-deterministic search from {start} to {goal}");
    }

    let reference = bfs_distance(grid, start, goal, can_swim);
    match first {
        Ok(result) => {
            if result.path.first() != Some(&start) || result.path.last() != Some(&goal) {
                bail!("path from {start} to {goal} has wrong endpoints");
            }
            if result.path.len() as u32 != result.cost + 1 {
                bail!("path length {} disagrees with cost {}", result.path.len(), result.cost);
            }
            if result.path.windows(2).any(|pair| pair[0].manhattan(pair[1]) != 1) {
                bail!("path from {start} to {goal} has a non-adjacent step");
            }
            if result.path.iter().any(|pos| !grid.is_walkable(*pos, can_swim)) {
                bail!("path from {start} to {goal} crosses a blocked tile");
            }
            if reference != Some(result.cost) {
                bail!("cost {} is not optimal, reference {reference:?}", result.cost);
            }
            let inputs = path_to_move_inputs(&result.path)?;
            if displace(start, &inputs) != goal {
                bail!("move inputs from {start} do not land on {goal}");
            }
        }
        Err(PathError::GoalUnreachable(_)) if !grid.is_walkable(goal, can_swim) => {}
        Err(PathError::StartInvalid(_)) if !grid.is_walkable(start, can_swim) => {}
        Err(PathError::NoPathFound { .. }) if reference.is_none() => {}
        Err(err) => {
            bail!("unexpected failure from {start} to {goal}: {err} (reference {reference:?})")
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    println!("Starting pathfinder fuzz on seed {} for {} cases...", args.seed, args.cases);
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);

    let mut routed = 0_u32;
    for case in 0..args.cases {
        let grid = random_grid(&mut rng)?;
        let start = random_pos(&mut rng, &grid);
        let goal = random_pos(&mut rng, &grid);
        let can_swim = below(&mut rng, 2) == 1;

        if let Err(err) = check_case(&grid, start, goal, can_swim) {
            bail!("case {case} (seed {}) failed: {err}", args.seed);
        }
        if bfs_distance(&grid, start, goal, can_swim).is_some() {
            routed += 1;
        }
    }

    println!("Fuzzing completed successfully: {routed} of {} cases routable.", args.cases);
    Ok(())
}
