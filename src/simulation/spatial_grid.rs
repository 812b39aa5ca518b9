//! Uniform spatial grid for broad-phase collision detection
//!
//! The arena is covered by square cells whose side is the largest possible
//! circle diameter. Any two overlapping circles are therefore either in the
//! same cell or in directly adjacent cells, so candidate pairs only need to
//! be gathered from an 8-neighborhood.

use glam::Vec2;

/// Uniform cell grid over the world rectangle
///
/// Cell size is fixed at construction; the logical dimensions follow the
/// world bounds and are recomputed when the host resizes the arena.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    world_bound_x: f32,
    world_bound_y: f32,
    cell_size: f32,
    cell_count_x: i32,
    cell_count_y: i32,
    /// Row-major cells, each holding the indices inserted into it
    cells: Vec<Vec<usize>>,
}

impl SpatialGrid {
    /// Create a grid covering `[-world_bound_x, world_bound_x] x [-world_bound_y, world_bound_y]`
    ///
    /// The cell size hint is floored at 0.01 to keep the cell counts bounded.
    pub fn new(world_bound_x: f32, world_bound_y: f32, cell_size_hint: f32) -> Self {
        let mut grid = Self {
            world_bound_x: 0.0,
            world_bound_y: 0.0,
            cell_size: cell_size_hint.max(0.01),
            cell_count_x: 0,
            cell_count_y: 0,
            cells: Vec::new(),
        };
        grid.update_dimensions(world_bound_x, world_bound_y);
        grid
    }

    /// Recompute the cell counts for new world bounds
    ///
    /// Reallocates the backing store only when the counts actually change.
    pub fn update_dimensions(&mut self, world_bound_x: f32, world_bound_y: f32) {
        self.world_bound_x = world_bound_x;
        self.world_bound_y = world_bound_y;

        let new_count_x = (2.0 * world_bound_x / self.cell_size) as i32 + 1;
        let new_count_y = (2.0 * world_bound_y / self.cell_size) as i32 + 1;

        if new_count_x != self.cell_count_x || new_count_y != self.cell_count_y {
            self.cell_count_x = new_count_x;
            self.cell_count_y = new_count_y;
            self.cells
                .resize_with((new_count_x * new_count_y) as usize, Vec::new);
        }
    }

    /// Empty every cell, keeping allocations for the next pass
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
    }

    /// Insert an index at a world position
    ///
    /// Positions outside the grid are silently dropped. This only happens
    /// transiently around a window resize and the integrator brings those
    /// circles back within a few steps.
    pub fn insert(&mut self, value: usize, position: Vec2) {
        let cell_x = ((position.x + self.world_bound_x) / self.cell_size).floor() as i32;
        let cell_y = ((position.y + self.world_bound_y) / self.cell_size).floor() as i32;

        if self.is_valid_cell(cell_x, cell_y) {
            self.cells[(cell_y * self.cell_count_x + cell_x) as usize].push(value);
        }
    }

    /// Gather every unordered candidate pair into `pairs`
    ///
    /// For each cell in row-major order this emits the pairs within the cell,
    /// then the pairs against the right, below, below-right, and below-left
    /// neighbors. Every adjacency is visited exactly once, so no pair is
    /// emitted twice.
    pub fn potential_pairs(&self, pairs: &mut Vec<(usize, usize)>) {
        pairs.clear();

        for y in 0..self.cell_count_y {
            for x in 0..self.cell_count_x {
                let cell = &self.cells[(y * self.cell_count_x + x) as usize];

                // Pairs within the cell itself
                for i in 0..cell.len() {
                    for j in (i + 1)..cell.len() {
                        pairs.push((cell[i], cell[j]));
                    }
                }

                if x + 1 < self.cell_count_x {
                    let right = &self.cells[(y * self.cell_count_x + x + 1) as usize];
                    for &first in cell {
                        for &second in right {
                            pairs.push((first, second));
                        }
                    }
                }

                if y + 1 < self.cell_count_y {
                    let below = &self.cells[((y + 1) * self.cell_count_x + x) as usize];
                    for &first in cell {
                        for &second in below {
                            pairs.push((first, second));
                        }
                    }
                }

                if x + 1 < self.cell_count_x && y + 1 < self.cell_count_y {
                    let below_right = &self.cells[((y + 1) * self.cell_count_x + x + 1) as usize];
                    for &first in cell {
                        for &second in below_right {
                            pairs.push((first, second));
                        }
                    }
                }

                if x > 0 && y + 1 < self.cell_count_y {
                    let below_left = &self.cells[((y + 1) * self.cell_count_x + x - 1) as usize];
                    for &first in cell {
                        for &second in below_left {
                            pairs.push((first, second));
                        }
                    }
                }
            }
        }
    }

    fn is_valid_cell(&self, cell_x: i32, cell_y: i32) -> bool {
        cell_x >= 0 && cell_x < self.cell_count_x && cell_y >= 0 && cell_y < self.cell_count_y
    }
}
