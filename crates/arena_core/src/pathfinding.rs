//! Grid-based pathfinding using A* algorithm.
//!
//! Four-connected movement with unit step cost and a Manhattan
//! heuristic, which is admissible and consistent for this movement
//! model, so returned paths are always shortest.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::grid::SpatialMap;
use crate::math::{Direction, GridPos};

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    cell: GridPos,
    /// f_score = g_score + heuristic
    f_score: u32,
    /// Tie-breaker for determinism: lower coordinates first.
    tie_breaker: u64,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap, so we reverse the comparison for min-heap behavior.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.tie_breaker.cmp(&self.tie_breaker),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Convert coordinates to a tie-breaker value for deterministic ordering.
#[inline]
fn coords_to_tie_breaker(cell: GridPos) -> u64 {
    ((cell.y as u32 as u64) << 32) | (cell.x as u32 as u64)
}

/// Find a shortest four-connected path from `start` to `goal`.
///
/// `is_blocked` decides which cells may be entered. It must report
/// cells outside the playable area as blocked, otherwise an unreachable
/// goal on an unbounded plane never terminates. The start cell itself
/// is never tested.
///
/// Returns the cells from `start` to `goal` inclusive, or `None` when
/// the frontier is exhausted.
pub fn find_path<F>(start: GridPos, goal: GridPos, is_blocked: F) -> Option<Vec<GridPos>>
where
    F: Fn(GridPos) -> bool,
{
    if start == goal {
        return Some(vec![start]);
    }

    let mut open_set: BinaryHeap<AStarNode> = BinaryHeap::new();
    let mut came_from: HashMap<GridPos, GridPos> = HashMap::new();
    let mut g_score: HashMap<GridPos, u32> = HashMap::new();

    g_score.insert(start, 0);
    open_set.push(AStarNode {
        cell: start,
        f_score: start.manhattan_distance(goal),
        tie_breaker: coords_to_tie_breaker(start),
    });

    while let Some(current) = open_set.pop() {
        if current.cell == goal {
            return Some(reconstruct_path(&came_from, goal));
        }

        let current_g = g_score.get(&current.cell).copied().unwrap_or(u32::MAX);

        // Stale heap entry superseded by a cheaper one.
        if current.f_score > current_g.saturating_add(current.cell.manhattan_distance(goal)) {
            continue;
        }

        for direction in Direction::ALL {
            let neighbor = current.cell.step(direction);
            if is_blocked(neighbor) {
                continue;
            }

            let tentative_g = current_g + 1;
            let neighbor_g = g_score.get(&neighbor).copied().unwrap_or(u32::MAX);

            if tentative_g < neighbor_g {
                came_from.insert(neighbor, current.cell);
                g_score.insert(neighbor, tentative_g);
                open_set.push(AStarNode {
                    cell: neighbor,
                    f_score: tentative_g + neighbor.manhattan_distance(goal),
                    tie_breaker: coords_to_tie_breaker(neighbor),
                });
            }
        }
    }

    None
}

/// Find a path over a map where both obstacle kinds block movement.
pub fn find_path_on<M: SpatialMap + ?Sized>(
    map: &M,
    start: GridPos,
    goal: GridPos,
) -> Option<Vec<GridPos>> {
    find_path(start, goal, |cell| !map.is_passable(cell))
}

/// Reconstruct path from came_from map.
fn reconstruct_path(came_from: &HashMap<GridPos, GridPos>, goal: GridPos) -> Vec<GridPos> {
    let mut path = vec![goal];
    let mut current = goal;

    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }

    path.reverse();
    path
}
