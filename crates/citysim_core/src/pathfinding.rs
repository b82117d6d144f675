//! City tile map and bounded A* path planning.
//!
//! The simulation asks a [`PathPlanner`] for a waypoint sequence between
//! two tiles. [`TileMap`] is the built-in planner: a 3D grid searched with
//! A* over 26-connected moves. Every search is capped by an iteration
//! budget, and running out of budget is reported as "no path" rather than
//! searching on.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use serde::{Deserialize, Serialize};

use crate::math::TilePos;

/// Something that can plan a route between two tiles.
pub trait PathPlanner {
    /// Plan a route from `from` to `to`, expanding at most `max_iterations`
    /// nodes.
    ///
    /// The returned waypoints exclude `from` and end at `to`. `None` means
    /// no route was found within budget.
    fn compute_path(&self, from: TilePos, to: TilePos, max_iterations: usize)
        -> Option<Vec<TilePos>>;
}

/// Cell types for the city grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellType {
    /// Open air or road.
    #[default]
    Open,
    /// Solid scenery.
    Blocked,
}

impl CellType {
    /// Returns true if vehicles may pass through this cell.
    #[must_use]
    pub const fn is_passable(self) -> bool {
        !matches!(self, Self::Blocked)
    }
}

/// Three-dimensional city grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileMap {
    size: TilePos,
    cells: Vec<CellType>,
}

impl TileMap {
    /// Create a map with every cell open.
    ///
    /// # Panics
    ///
    /// Panics if any dimension is not positive.
    #[must_use]
    pub fn new(size_x: i32, size_y: i32, size_z: i32) -> Self {
        assert!(
            size_x > 0 && size_y > 0 && size_z > 0,
            "TileMap dimensions must be positive"
        );
        let count = (size_x as usize) * (size_y as usize) * (size_z as usize);
        Self {
            size: TilePos::new(size_x, size_y, size_z),
            cells: vec![CellType::Open; count],
        }
    }

    /// Map dimensions.
    #[must_use]
    pub const fn size(&self) -> TilePos {
        self.size
    }

    /// Check if a tile is within map bounds.
    #[must_use]
    pub const fn in_bounds(&self, p: TilePos) -> bool {
        p.x >= 0
            && p.y >= 0
            && p.z >= 0
            && p.x < self.size.x
            && p.y < self.size.y
            && p.z < self.size.z
    }

    #[inline]
    fn index(&self, p: TilePos) -> usize {
        ((p.z as usize) * (self.size.y as usize) + (p.y as usize)) * (self.size.x as usize)
            + (p.x as usize)
    }

    /// Get the cell at `p`. Returns `None` if out of bounds.
    #[must_use]
    pub fn get_cell(&self, p: TilePos) -> Option<CellType> {
        self.in_bounds(p).then(|| self.cells[self.index(p)])
    }

    /// Set the cell at `p`. Returns `false` if out of bounds.
    pub fn set_cell(&mut self, p: TilePos, cell: CellType) -> bool {
        if !self.in_bounds(p) {
            return false;
        }
        let index = self.index(p);
        self.cells[index] = cell;
        true
    }

    /// Check if a tile is passable.
    #[must_use]
    pub fn is_passable(&self, p: TilePos) -> bool {
        self.get_cell(p).is_some_and(CellType::is_passable)
    }

    /// Clamp a tile into map bounds.
    #[must_use]
    pub fn clamp(&self, p: TilePos) -> TilePos {
        TilePos::new(
            p.x.clamp(0, self.size.x - 1),
            p.y.clamp(0, self.size.y - 1),
            p.z.clamp(0, self.size.z - 1),
        )
    }
}

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    pos: TilePos,
    f_score: u32,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: lower f_score wins, then lower coordinates.
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| other.pos.cmp(&self.pos))
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Cost of an axis-aligned step.
const STRAIGHT_COST: u32 = 10;

/// Cost of a step changing two axes (approximation of 10 * sqrt(2)).
const DIAGONAL_COST: u32 = 14;

/// Cost of a step changing all three axes (approximation of 10 * sqrt(3)).
const CORNER_COST: u32 = 17;

/// Step cost for a neighbour offset.
const fn step_cost(offset: TilePos) -> u32 {
    let axes = (offset.x != 0) as u32 + (offset.y != 0) as u32 + (offset.z != 0) as u32;
    match axes {
        1 => STRAIGHT_COST,
        2 => DIAGONAL_COST,
        _ => CORNER_COST,
    }
}

/// Exact open-space cost between two tiles (3-D octile distance).
///
/// Corner steps are used while all three axes still differ, then
/// diagonal steps, then straight ones.
fn heuristic(from: TilePos, to: TilePos) -> u32 {
    let mut d = [
        from.x.abs_diff(to.x),
        from.y.abs_diff(to.y),
        from.z.abs_diff(to.z),
    ];
    d.sort_unstable();
    let [low, mid, high] = d;
    low * CORNER_COST + (mid - low) * DIAGONAL_COST + (high - mid) * STRAIGHT_COST
}

/// All 26 neighbour offsets, in a fixed order.
fn neighbour_offsets() -> impl Iterator<Item = TilePos> {
    (-1..=1).flat_map(|dz| {
        (-1..=1).flat_map(move |dy| {
            (-1..=1)
                .filter(move |&dx| !(dx == 0 && dy == 0 && dz == 0))
                .map(move |dx| TilePos::new(dx, dy, dz))
        })
    })
}

impl PathPlanner for TileMap {
    fn compute_path(
        &self,
        from: TilePos,
        to: TilePos,
        max_iterations: usize,
    ) -> Option<Vec<TilePos>> {
        if !self.is_passable(from) || !self.is_passable(to) {
            return None;
        }
        if from == to {
            return Some(Vec::new());
        }

        let mut open_set = BinaryHeap::new();
        let mut came_from: HashMap<TilePos, TilePos> = HashMap::new();
        let mut g_score: HashMap<TilePos, u32> = HashMap::new();

        g_score.insert(from, 0);
        open_set.push(AStarNode {
            pos: from,
            f_score: heuristic(from, to),
        });

        let mut iterations = 0;
        while let Some(current) = open_set.pop() {
            if current.pos == to {
                return Some(reconstruct_path(&came_from, from, to));
            }

            iterations += 1;
            if iterations > max_iterations {
                return None;
            }

            let current_g = g_score.get(&current.pos).copied().unwrap_or(u32::MAX);

            for offset in neighbour_offsets() {
                let next = TilePos::new(
                    current.pos.x + offset.x,
                    current.pos.y + offset.y,
                    current.pos.z + offset.z,
                );
                if !self.is_passable(next) {
                    continue;
                }

                let tentative_g = current_g.saturating_add(step_cost(offset));
                if tentative_g < g_score.get(&next).copied().unwrap_or(u32::MAX) {
                    came_from.insert(next, current.pos);
                    g_score.insert(next, tentative_g);
                    open_set.push(AStarNode {
                        pos: next,
                        f_score: tentative_g.saturating_add(heuristic(next, to)),
                    });
                }
            }
        }

        None
    }
}

/// Reconstruct the path from the came_from map, excluding the start tile.
fn reconstruct_path(
    came_from: &HashMap<TilePos, TilePos>,
    from: TilePos,
    to: TilePos,
) -> Vec<TilePos> {
    let mut path = vec![to];
    let mut current = to;

    while let Some(&prev) = came_from.get(&current) {
        if prev == from {
            break;
        }
        path.push(prev);
        current = prev;
    }

    path.reverse();
    path
}
