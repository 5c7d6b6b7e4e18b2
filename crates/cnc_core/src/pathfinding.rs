//! Grid pathfinding using the A* algorithm.
//!
//! Paths are produced as a list of facings, one per cell step, and are
//! truncated to the vehicle's path buffer. Units re-plan when the buffer
//! runs dry, so a long trip is planned in installments.
//!
//! Diagonal steps cost half again as much as straight ones, so open
//! ground yields straight runs rather than zig-zags. All costs are
//! integers and ties are broken by cell position, so every peer finds the
//! same path.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::math::{CellPos, FacingType};

/// Facings held in a unit's path buffer.
pub const PATH_MAX: usize = 12;

/// Cells expanded before the search gives up and settles for the closest
/// approach found so far.
pub const MAX_SEARCH: usize = 4096;

/// Cost of a straight cell step.
const STRAIGHT_COST: i32 = 2;

/// Cost of a diagonal cell step.
const DIAGONAL_COST: i32 = 3;

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    cell: CellPos,
    /// `g_score + heuristic`.
    f_score: i32,
    /// Remaining estimate; among equal `f_score` the node nearer the goal wins.
    h_score: i32,
    /// Tie-breaker for determinism: lower coordinates first.
    tie_breaker: u64,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap, so reverse for min-heap behaviour.
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| other.h_score.cmp(&self.h_score))
            .then_with(|| other.tie_breaker.cmp(&self.tie_breaker))
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Octile distance in step-cost units.
#[inline]
fn octile_heuristic(a: CellPos, b: CellPos) -> i32 {
    let dx = (a.x - b.x).abs();
    let dy = (a.y - b.y).abs();
    STRAIGHT_COST * dx.max(dy) + (DIAGONAL_COST - STRAIGHT_COST) * dx.min(dy)
}

#[inline]
fn step_cost(facing: FacingType) -> i32 {
    if facing.is_diagonal() {
        DIAGONAL_COST
    } else {
        STRAIGHT_COST
    }
}

/// Convert a cell to a tie-breaker value for deterministic ordering.
#[inline]
fn tie_breaker(cell: CellPos) -> u64 {
    (u64::from(cell.y as u32) << 32) | u64::from(cell.x as u32)
}

/// Whether a step may be taken without cutting a blocked corner.
#[inline]
fn is_diagonal_valid<F>(from: CellPos, facing: FacingType, passable: &F) -> bool
where
    F: Fn(CellPos) -> bool,
{
    if !facing.is_diagonal() {
        return true;
    }
    let (dx, dy) = facing.offset();
    passable(CellPos::new(from.x + dx, from.y)) && passable(CellPos::new(from.x, from.y + dy))
}

/// Find a facing path from `start` toward `goal`.
///
/// `passable` decides which cells may be stepped through. If the goal is
/// unreachable the path leads to the explored cell closest to it. Returns
/// `None` when already at the goal or when no step can be taken at all.
///
/// # Example
///
/// ```
/// use cnc_core::math::{CellPos, FacingType};
/// use cnc_core::pathfinding::basic_path;
///
/// let path = basic_path(CellPos::new(0, 0), CellPos::new(3, 0), |_| true).unwrap();
/// assert_eq!(path, vec![FacingType::E; 3]);
/// ```
pub fn basic_path<F>(start: CellPos, goal: CellPos, passable: F) -> Option<Vec<FacingType>>
where
    F: Fn(CellPos) -> bool,
{
    if start == goal {
        return None;
    }

    let mut open_set: BinaryHeap<AStarNode> = BinaryHeap::new();
    let mut came_from: HashMap<CellPos, (CellPos, FacingType)> = HashMap::new();
    let mut g_score: HashMap<CellPos, i32> = HashMap::new();

    g_score.insert(start, 0);
    let start_h = octile_heuristic(start, goal);
    open_set.push(AStarNode {
        cell: start,
        f_score: start_h,
        h_score: start_h,
        tie_breaker: tie_breaker(start),
    });

    // Closest approach: (heuristic, g, tie-breaker, cell).
    let mut best: Option<(i32, i32, u64, CellPos)> = None;
    let mut expanded = 0usize;

    while let Some(current) = open_set.pop() {
        if current.cell == goal {
            return Some(reconstruct_path(&came_from, goal));
        }

        let current_g = g_score.get(&current.cell).copied().unwrap_or(i32::MAX);
        if current.f_score > current_g.saturating_add(current.h_score) {
            // Stale heap entry.
            continue;
        }

        if current.cell != start {
            let key = (
                current.h_score,
                current_g,
                tie_breaker(current.cell),
                current.cell,
            );
            if best.map_or(true, |b| (key.0, key.1, key.2) < (b.0, b.1, b.2)) {
                best = Some(key);
            }
        }

        expanded += 1;
        if expanded >= MAX_SEARCH {
            break;
        }

        for facing in FacingType::ALL {
            let next = current.cell.adjacent(facing);
            if !passable(next) || !is_diagonal_valid(current.cell, facing, &passable) {
                continue;
            }

            let tentative_g = current_g + step_cost(facing);
            let neighbor_g = g_score.get(&next).copied().unwrap_or(i32::MAX);

            if tentative_g < neighbor_g {
                came_from.insert(next, (current.cell, facing));
                g_score.insert(next, tentative_g);
                let h_score = octile_heuristic(next, goal);
                open_set.push(AStarNode {
                    cell: next,
                    f_score: tentative_g + h_score,
                    h_score,
                    tie_breaker: tie_breaker(next),
                });
            }
        }
    }

    best.map(|(_, _, _, cell)| reconstruct_path(&came_from, cell))
}

/// Walk `came_from` back from `end`, keeping only the first
/// [`PATH_MAX`] facings.
fn reconstruct_path(came_from: &HashMap<CellPos, (CellPos, FacingType)>, end: CellPos) -> Vec<FacingType> {
    let mut path = Vec::new();
    let mut current = end;
    while let Some(&(prev, facing)) = came_from.get(&current) {
        path.push(facing);
        current = prev;
    }
    path.reverse();
    path.truncate(PATH_MAX);
    path
}
