//! Occupancy grid built from static map geometry.
//!
//! The grid answers three questions for a unit of a given footprint
//! (cells per side): does a block of cells fit ([`NavigationGrid::has_clearance`]),
//! is the straight segment between two points open
//! ([`NavigationGrid::is_line_clear`]), and what route leads around the
//! obstacles ([`NavigationGrid::find_path`]).
//!
//! # Footprint anchoring
//!
//! A footprint of `N` cells is addressed by its top-left (lowest x/y)
//! anchor cell. A unit standing at world position `p` occupies the block
//! whose center is nearest `p`, so for `N = 1` the anchor is simply the
//! cell containing `p`, and for `N = 2` it is the cell half a tile up and
//! left of `p`. Waypoints are block centers, which keeps the two
//! conversions inverse to each other.
//!
//! The grid is built once per map load and is read-only afterwards.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkirmishError};
use crate::math::{decimal_serde, fixed_serde, Fixed, Vec2Fixed};

/// Default cap on A* node expansions per search.
pub const DEFAULT_SEARCH_BUDGET: u32 = 2000;

/// How far (in cells) the goal may be moved to find a cell the footprint fits.
const GOAL_SNAP_RADIUS: i32 = 3;

/// Orthogonal step cost.
const ORTHOGONAL_COST: Fixed = Fixed::ONE;

/// Diagonal step cost (≈1.4).
const DIAGONAL_COST: Fixed = Fixed::from_bits(0x1_6666_6666);

/// Direction offsets for 8-directional movement.
const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),   // East
    (1, 1),   // Southeast
    (0, 1),   // South
    (-1, 1),  // Southwest
    (-1, 0),  // West
    (-1, -1), // Northwest
    (0, -1),  // North
    (1, -1),  // Northeast
];

/// One tile collision layer.
///
/// Rows are strings where `#` marks a colliding tile and any other
/// character is open ground.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileLayer {
    /// Layer name (for diagnostics).
    pub name: String,
    /// Tile rows, top to bottom.
    pub rows: Vec<String>,
}

impl TileLayer {
    /// Build a layer from string rows.
    #[must_use]
    pub fn from_rows(name: &str, rows: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            rows: rows.iter().map(|r| (*r).to_string()).collect(),
        }
    }

    fn collides(&self, x: usize, y: usize) -> bool {
        self.rows
            .get(y)
            .and_then(|row| row.as_bytes().get(x))
            .is_some_and(|&b| b == b'#')
    }
}

/// Axis-aligned obstacle rectangle in world units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObstacleRect {
    /// Left edge.
    #[serde(with = "decimal_serde")]
    pub x: Fixed,
    /// Top edge.
    #[serde(with = "decimal_serde")]
    pub y: Fixed,
    /// Width.
    #[serde(with = "decimal_serde")]
    pub width: Fixed,
    /// Height.
    #[serde(with = "decimal_serde")]
    pub height: Fixed,
}

impl ObstacleRect {
    /// Create a rectangle from integer world coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x: Fixed::from_num(x),
            y: Fixed::from_num(y),
            width: Fixed::from_num(width),
            height: Fixed::from_num(height),
        }
    }

    /// Rectangle center.
    #[must_use]
    pub fn center(&self) -> Vec2Fixed {
        Vec2Fixed::new(self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// Static map geometry consumed at load time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapDescription {
    /// Map width in tiles.
    pub width: u32,
    /// Map height in tiles.
    pub height: u32,
    /// Tile size in world units (the grid cell size).
    #[serde(with = "decimal_serde")]
    pub tile_size: Fixed,
    /// Tile collision layers; each must be `width` × `height`.
    #[serde(default)]
    pub layers: Vec<TileLayer>,
    /// Rectangular obstacle objects.
    #[serde(default)]
    pub obstacles: Vec<ObstacleRect>,
}

/// Binary occupancy grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationGrid {
    width: u32,
    height: u32,
    /// Row-major blocked flags.
    blocked: Vec<bool>,
    #[serde(with = "fixed_serde")]
    cell_size: Fixed,
}

impl NavigationGrid {
    /// Create an open grid.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero, or if `cell_size` is not positive.
    #[must_use]
    pub fn new(width: u32, height: u32, cell_size: Fixed) -> Self {
        assert!(width > 0, "NavigationGrid width must be positive");
        assert!(height > 0, "NavigationGrid height must be positive");
        assert!(cell_size > Fixed::ZERO, "NavigationGrid cell_size must be positive");

        Self {
            width,
            height,
            blocked: vec![false; (width as usize) * (height as usize)],
            cell_size,
        }
    }

    /// Build the grid from a map description.
    ///
    /// Every cell overlapped by a colliding tile or an obstacle rectangle
    /// is marked blocked.
    pub fn build(map: &MapDescription) -> Result<Self> {
        if map.width == 0 || map.height == 0 {
            return Err(SkirmishError::InvalidMap(format!(
                "map size must be positive, got {}x{}",
                map.width, map.height
            )));
        }
        if map.tile_size <= Fixed::ZERO {
            return Err(SkirmishError::InvalidMap("tile_size must be positive".into()));
        }

        let mut grid = Self::new(map.width, map.height, map.tile_size);

        for layer in &map.layers {
            if layer.rows.len() != map.height as usize {
                return Err(SkirmishError::InvalidMap(format!(
                    "layer '{}' has {} rows, expected {}",
                    layer.name,
                    layer.rows.len(),
                    map.height
                )));
            }
            if let Some((y, row)) = layer
                .rows
                .iter()
                .enumerate()
                .find(|(_, row)| row.len() != map.width as usize)
            {
                return Err(SkirmishError::InvalidMap(format!(
                    "layer '{}' row {y} has {} tiles, expected {}",
                    layer.name,
                    row.len(),
                    map.width
                )));
            }

            for y in 0..map.height as usize {
                for x in 0..map.width as usize {
                    if layer.collides(x, y) {
                        grid.set_blocked(x as i32, y as i32, true);
                    }
                }
            }
        }

        for rect in &map.obstacles {
            if rect.width <= Fixed::ZERO || rect.height <= Fixed::ZERO {
                return Err(SkirmishError::InvalidMap(format!(
                    "obstacle at ({}, {}) has non-positive size",
                    rect.x, rect.y
                )));
            }
            grid.block_rect(rect);
        }

        tracing::debug!(
            width = grid.width,
            height = grid.height,
            blocked = grid.blocked.iter().filter(|b| **b).count(),
            "Navigation grid built"
        );

        Ok(grid)
    }

    /// Mark every cell the rectangle overlaps.
    fn block_rect(&mut self, rect: &ObstacleRect) {
        let x0 = (rect.x / self.cell_size).floor().to_num::<i32>().max(0);
        let y0 = (rect.y / self.cell_size).floor().to_num::<i32>().max(0);
        let x1 = ((rect.x + rect.width) / self.cell_size)
            .ceil()
            .to_num::<i32>()
            .min(self.width as i32);
        let y1 = ((rect.y + rect.height) / self.cell_size)
            .ceil()
            .to_num::<i32>()
            .min(self.height as i32);

        for y in y0..y1 {
            for x in x0..x1 {
                self.set_blocked(x, y, true);
            }
        }
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Cell size in world units.
    #[must_use]
    pub const fn cell_size(&self) -> Fixed {
        self.cell_size
    }

    /// Check if cell coordinates are within grid bounds.
    #[must_use]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    /// Whether a single cell is blocked. Out-of-bounds cells count as blocked.
    #[must_use]
    pub fn is_blocked(&self, x: i32, y: i32) -> bool {
        !self.in_bounds(x, y) || self.blocked[self.index(x, y)]
    }

    /// Set a cell's blocked flag. Only meaningful while building a grid.
    /// Returns `false` if out of bounds.
    pub fn set_blocked(&mut self, x: i32, y: i32, blocked: bool) -> bool {
        if self.in_bounds(x, y) {
            let index = self.index(x, y);
            self.blocked[index] = blocked;
            true
        } else {
            false
        }
    }

    /// Cell containing a world position (may lie outside the grid).
    #[must_use]
    pub fn cell_of(&self, pos: Vec2Fixed) -> (i32, i32) {
        (
            (pos.x / self.cell_size).floor().to_num::<i32>(),
            (pos.y / self.cell_size).floor().to_num::<i32>(),
        )
    }

    /// Anchor cell of a `footprint`-sized block centered nearest `pos`.
    #[must_use]
    pub fn anchor_cell(&self, pos: Vec2Fixed, footprint: u32) -> (i32, i32) {
        let shift = self.cell_size * Fixed::from_num(footprint.max(1) - 1) / 2;
        self.cell_of(Vec2Fixed::new(pos.x - shift, pos.y - shift))
    }

    /// World-space center of the `footprint`-sized block anchored at a cell.
    #[must_use]
    pub fn footprint_center(&self, x: i32, y: i32, footprint: u32) -> Vec2Fixed {
        let half = self.cell_size * Fixed::from_num(footprint.max(1)) / 2;
        Vec2Fixed::new(
            Fixed::from_num(x) * self.cell_size + half,
            Fixed::from_num(y) * self.cell_size + half,
        )
    }

    /// World-space center of a single cell.
    #[must_use]
    pub fn cell_center(&self, x: i32, y: i32) -> Vec2Fixed {
        self.footprint_center(x, y, 1)
    }

    /// True iff the `footprint`×`footprint` block anchored at `(x, y)` lies
    /// in bounds and every cell in it is open.
    #[must_use]
    pub fn has_clearance(&self, x: i32, y: i32, footprint: u32) -> bool {
        self.first_blocked_cell(x, y, footprint).is_none()
    }

    /// First blocked (or out-of-bounds) cell in a footprint block, scanning
    /// row by row.
    #[must_use]
    pub fn first_blocked_cell(&self, x: i32, y: i32, footprint: u32) -> Option<(i32, i32)> {
        let size = footprint.max(1) as i32;
        for dy in 0..size {
            for dx in 0..size {
                if self.is_blocked(x + dx, y + dy) {
                    return Some((x + dx, y + dy));
                }
            }
        }
        None
    }

    /// Whether a unit with this footprint fits at a world position.
    #[must_use]
    pub fn fits_at(&self, pos: Vec2Fixed, footprint: u32) -> bool {
        let (x, y) = self.anchor_cell(pos, footprint);
        self.has_clearance(x, y, footprint)
    }

    /// Rasterize the segment between two world points (Bresenham) and
    /// require clearance at every stepped cell, both ends included.
    #[must_use]
    pub fn is_line_clear(&self, start: Vec2Fixed, end: Vec2Fixed, footprint: u32) -> bool {
        let (x0, y0) = self.anchor_cell(start, footprint);
        let (x1, y1) = self.anchor_cell(end, footprint);

        let dx = (x1 - x0).abs();
        let dy = (y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx - dy;

        let mut x = x0;
        let mut y = y0;

        loop {
            if !self.has_clearance(x, y, footprint) {
                return false;
            }

            if x == x1 && y == y1 {
                return true;
            }

            let e2 = 2 * err;
            if e2 > -dy {
                err -= dy;
                x += sx;
            }
            if e2 < dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Find a route between two world points with the default search budget.
    #[must_use]
    pub fn find_path(
        &self,
        start: Vec2Fixed,
        goal: Vec2Fixed,
        footprint: u32,
    ) -> Option<Vec<Vec2Fixed>> {
        self.find_path_with_budget(start, goal, footprint, DEFAULT_SEARCH_BUDGET)
    }

    /// A* over 8-connected cells.
    ///
    /// Orthogonal steps cost 1, diagonal steps ≈1.4, and the heuristic is
    /// Manhattan distance. A diagonal step is rejected when either of the
    /// two orthogonal neighbors it passes lacks clearance.
    ///
    /// Returns `None` when the goal is unreachable or when more than
    /// `budget` nodes are expanded; callers fall back to direct movement.
    /// Waypoints exclude the start cell and are footprint-block centers,
    /// each of which satisfies [`has_clearance`](Self::has_clearance).
    #[must_use]
    pub fn find_path_with_budget(
        &self,
        start: Vec2Fixed,
        goal: Vec2Fixed,
        footprint: u32,
        budget: u32,
    ) -> Option<Vec<Vec2Fixed>> {
        let (start_x, start_y) = self.anchor_cell(start, footprint);
        if !self.in_bounds(start_x, start_y) {
            return None;
        }

        let (goal_x, goal_y) = {
            let (gx, gy) = self.anchor_cell(goal, footprint);
            if self.has_clearance(gx, gy, footprint) {
                (gx, gy)
            } else {
                self.nearest_clear_cell(gx, gy, footprint)?
            }
        };

        if start_x == goal_x && start_y == goal_y {
            return Some(vec![self.footprint_center(goal_x, goal_y, footprint)]);
        }

        let cell_count = self.blocked.len();
        let mut g_score = vec![Fixed::MAX; cell_count];
        let mut came_from = vec![usize::MAX; cell_count];
        let mut closed = vec![false; cell_count];
        let mut open_set = BinaryHeap::new();

        let start_index = self.index(start_x, start_y);
        let goal_index = self.index(goal_x, goal_y);
        g_score[start_index] = Fixed::ZERO;
        open_set.push(AStarNode {
            x: start_x,
            y: start_y,
            f_score: manhattan(start_x, start_y, goal_x, goal_y),
            tie_breaker: start_index as u64,
        });

        let mut expanded = 0u32;

        while let Some(current) = open_set.pop() {
            let current_index = self.index(current.x, current.y);
            if closed[current_index] {
                continue;
            }
            closed[current_index] = true;

            if current_index == goal_index {
                return Some(self.reconstruct_path(&came_from, start_index, goal_index, footprint));
            }

            expanded += 1;
            if expanded > budget {
                tracing::trace!(
                    budget,
                    from = ?(start_x, start_y),
                    to = ?(goal_x, goal_y),
                    "Path search budget exhausted"
                );
                return None;
            }

            let current_g = g_score[current_index];

            for &(dx, dy) in &DIRECTIONS {
                let nx = current.x + dx;
                let ny = current.y + dy;

                if !self.has_clearance(nx, ny, footprint) {
                    continue;
                }

                let diagonal = dx != 0 && dy != 0;
                if diagonal
                    && (!self.has_clearance(current.x + dx, current.y, footprint)
                        || !self.has_clearance(current.x, current.y + dy, footprint))
                {
                    continue;
                }

                let neighbor_index = self.index(nx, ny);
                if closed[neighbor_index] {
                    continue;
                }

                let step = if diagonal { DIAGONAL_COST } else { ORTHOGONAL_COST };
                let tentative_g = current_g + step;

                if tentative_g < g_score[neighbor_index] {
                    came_from[neighbor_index] = current_index;
                    g_score[neighbor_index] = tentative_g;
                    open_set.push(AStarNode {
                        x: nx,
                        y: ny,
                        f_score: tentative_g + manhattan(nx, ny, goal_x, goal_y),
                        tie_breaker: neighbor_index as u64,
                    });
                }
            }
        }

        None
    }

    /// Closest cell (by ring, then scan order) around `(x, y)` where the
    /// footprint fits.
    fn nearest_clear_cell(&self, x: i32, y: i32, footprint: u32) -> Option<(i32, i32)> {
        for radius in 1..=GOAL_SNAP_RADIUS {
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    if dx.abs() != radius && dy.abs() != radius {
                        continue;
                    }
                    if self.has_clearance(x + dx, y + dy, footprint) {
                        return Some((x + dx, y + dy));
                    }
                }
            }
        }
        None
    }

    fn reconstruct_path(
        &self,
        came_from: &[usize],
        start_index: usize,
        goal_index: usize,
        footprint: u32,
    ) -> Vec<Vec2Fixed> {
        let width = self.width as usize;
        let mut path = Vec::new();
        let mut current = goal_index;

        while current != start_index {
            let x = (current % width) as i32;
            let y = (current / width) as i32;
            path.push(self.footprint_center(x, y, footprint));
            current = came_from[current];
        }

        path.reverse();
        path
    }
}

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    x: i32,
    y: i32,
    f_score: Fixed,
    /// Row-major cell index; lower first when f-scores tie.
    tie_breaker: u64,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse for lowest f first.
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

#[inline]
fn manhattan(x1: i32, y1: i32, x2: i32, y2: i32) -> Fixed {
    Fixed::from_num(x1.abs_diff(x2) + y1.abs_diff(y2))
}

/// Thin a path by skipping waypoints that are reachable in a straight,
/// footprint-clear line. Every kept waypoint is one of the input waypoints.
#[must_use]
pub fn smooth_path(grid: &NavigationGrid, path: Vec<Vec2Fixed>, footprint: u32) -> Vec<Vec2Fixed> {
    if path.len() <= 2 {
        return path;
    }

    let mut smoothed = Vec::with_capacity(path.len());
    smoothed.push(path[0]);

    let mut current_idx = 0;
    while current_idx < path.len() - 1 {
        let mut furthest_visible = current_idx + 1;

        for check_idx in (current_idx + 2)..path.len() {
            if grid.is_line_clear(path[current_idx], path[check_idx], footprint) {
                furthest_visible = check_idx;
            }
        }

        smoothed.push(path[furthest_visible]);
        current_idx = furthest_visible;
    }

    smoothed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn vec2(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_ints(x, y)
    }

    /// 10×10 grid of 10-unit cells with a vertical wall at x = 5, y in 2..8.
    fn walled_grid() -> NavigationGrid {
        let mut grid = NavigationGrid::new(10, 10, fixed(10));
        for y in 2..8 {
            grid.set_blocked(5, y, true);
        }
        grid
    }

    #[test]
    fn test_build_marks_tiles_and_obstacles() {
        let map = MapDescription {
            width: 4,
            height: 3,
            tile_size: fixed(10),
            layers: vec![TileLayer::from_rows("walls", &["#...", "....", "...#"])],
            obstacles: vec![ObstacleRect::from_ints(12, 12, 6, 6)],
        };

        let grid = NavigationGrid::build(&map).unwrap();
        assert!(grid.is_blocked(0, 0));
        assert!(grid.is_blocked(3, 2));
        assert!(grid.is_blocked(1, 1), "obstacle rect overlaps cell (1,1)");
        assert!(!grid.is_blocked(2, 1));
        assert!(!grid.is_blocked(1, 0));
    }

    #[test]
    fn test_build_marks_every_overlapped_cell() {
        let map = MapDescription {
            width: 5,
            height: 5,
            tile_size: fixed(10),
            layers: vec![],
            // Spans x 5..25 → cells 0,1,2; y 10..20 → cell 1 only
            obstacles: vec![ObstacleRect::from_ints(5, 10, 20, 10)],
        };

        let grid = NavigationGrid::build(&map).unwrap();
        for x in 0..3 {
            assert!(grid.is_blocked(x, 1));
        }
        assert!(!grid.is_blocked(3, 1));
        assert!(!grid.is_blocked(1, 2));
    }

    #[test]
    fn test_build_rejects_mismatched_layer() {
        let map = MapDescription {
            width: 4,
            height: 2,
            tile_size: fixed(10),
            layers: vec![TileLayer::from_rows("walls", &["....", "..."])],
            obstacles: vec![],
        };

        assert!(matches!(
            NavigationGrid::build(&map),
            Err(SkirmishError::InvalidMap(_))
        ));
    }

    #[test]
    fn test_anchor_and_center_are_inverse() {
        let grid = NavigationGrid::new(10, 10, fixed(10));
        for footprint in 1..=3 {
            let center = grid.footprint_center(4, 6, footprint);
            assert_eq!(grid.anchor_cell(center, footprint), (4, 6));
        }
        assert_eq!(grid.footprint_center(0, 0, 2), vec2(10, 10));
    }

    #[test]
    fn test_has_clearance_footprint() {
        let grid = walled_grid();
        assert!(grid.has_clearance(3, 3, 2));
        assert!(!grid.has_clearance(4, 3, 2), "2x2 block at x=4 touches the wall");
        assert!(grid.has_clearance(4, 3, 1));
        assert!(!grid.has_clearance(9, 9, 2), "block runs out of bounds");
        assert!(!grid.has_clearance(-1, 0, 1));
    }

    #[test]
    fn test_line_clear_in_open_area() {
        let grid = NavigationGrid::new(10, 10, fixed(10));
        assert!(grid.is_line_clear(vec2(5, 5), vec2(95, 75), 1));
    }

    #[test]
    fn test_line_blocked_by_wall() {
        let grid = walled_grid();
        assert!(!grid.is_line_clear(vec2(25, 45), vec2(85, 45), 1));
        // Passing below the wall is fine
        assert!(grid.is_line_clear(vec2(25, 85), vec2(85, 85), 1));
    }

    #[test]
    fn test_simple_path_ends_at_goal() {
        let grid = NavigationGrid::new(10, 10, fixed(10));
        let path = grid.find_path(vec2(5, 5), vec2(55, 55), 1).unwrap();

        assert!(!path.is_empty());
        assert_eq!(*path.last().unwrap(), vec2(55, 55));
        // Start cell is not repeated
        assert_ne!(path[0], vec2(5, 5));
    }

    #[test]
    fn test_path_around_obstacle() {
        let grid = walled_grid();
        let path = grid.find_path(vec2(25, 45), vec2(85, 45), 1).unwrap();

        for point in &path {
            let (x, y) = grid.cell_of(*point);
            assert!(!grid.is_blocked(x, y), "path goes through blocked cell ({x}, {y})");
        }
        assert_eq!(*path.last().unwrap(), vec2(85, 45));
    }

    #[test]
    fn test_no_corner_cutting() {
        let mut grid = NavigationGrid::new(3, 3, fixed(10));
        grid.set_blocked(1, 0, true);
        // Diagonal (0,0) -> (1,1) would squeeze past (1,0)
        let path = grid.find_path(vec2(5, 5), vec2(15, 15), 1).unwrap();
        assert_eq!(path, vec![vec2(5, 15), vec2(15, 15)]);
    }

    #[test]
    fn test_no_path_exists() {
        let mut grid = NavigationGrid::new(10, 10, fixed(10));
        for y in 0..10 {
            grid.set_blocked(5, y, true);
        }
        assert!(grid.find_path(vec2(25, 45), vec2(85, 45), 1).is_none());
    }

    #[test]
    fn test_budget_exhaustion_returns_none() {
        let grid = walled_grid();
        assert!(grid
            .find_path_with_budget(vec2(25, 45), vec2(85, 45), 1, 3)
            .is_none());
    }

    #[test]
    fn test_path_to_same_cell() {
        let grid = NavigationGrid::new(10, 10, fixed(10));
        let path = grid.find_path(vec2(51, 52), vec2(55, 58), 1).unwrap();
        assert_eq!(path, vec![vec2(55, 55)]);
    }

    #[test]
    fn test_blocked_goal_snaps_to_nearest_clear_cell() {
        let mut grid = NavigationGrid::new(10, 10, fixed(10));
        grid.set_blocked(5, 5, true);
        let path = grid.find_path(vec2(5, 5), vec2(55, 55), 1).unwrap();
        let (x, y) = grid.cell_of(*path.last().unwrap());
        assert!(grid.has_clearance(x, y, 1));
        assert!(x.abs_diff(5) <= 1 && y.abs_diff(5) <= 1);
    }

    #[test]
    fn test_large_footprint_waypoints_have_clearance() {
        let grid = walled_grid();
        let path = grid.find_path(vec2(20, 50), vec2(80, 50), 2).unwrap();

        for waypoint in &path {
            let (x, y) = grid.anchor_cell(*waypoint, 2);
            assert!(grid.has_clearance(x, y, 2), "waypoint {waypoint:?} lacks clearance");
        }
    }

    #[test]
    fn test_path_smoothing_keeps_endpoints() {
        let grid = NavigationGrid::new(10, 10, fixed(10));
        let path = vec![vec2(5, 5), vec2(15, 15), vec2(25, 25), vec2(35, 35), vec2(45, 45)];

        let smoothed = smooth_path(&grid, path, 1);
        assert_eq!(smoothed, vec![vec2(5, 5), vec2(45, 45)]);
    }

    #[test]
    fn test_determinism() {
        let grid = walled_grid();
        let path1 = grid.find_path(vec2(25, 45), vec2(85, 45), 1);
        let path2 = grid.find_path(vec2(25, 45), vec2(85, 45), 1);
        assert_eq!(path1, path2);
    }
}
