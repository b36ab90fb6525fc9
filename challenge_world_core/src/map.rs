use serde::{Deserialize, Serialize};

use crate::{EntityId, Position};

/// Represents errors that can occur within the grid operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Coordinates ({x}, {y}) are out of bounds for grid size ({width}, {height})")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
    #[error("Entity {0} is not on the grid")]
    UnknownEntity(EntityId),
    #[error("Entity {0} is already on the grid")]
    DuplicateEntity(EntityId),
    #[error("Cell ({x}, {y}) already holds an obstacle")]
    CellHasObstacle { x: usize, y: usize },
    #[error("Obstacle {0} cannot be moved once placed")]
    ObstacleIsFixed(EntityId),
}

/// Offsets of the four cardinal neighbours: down, up, right, left.
const CARDINAL_OFFSETS: [(isize, isize); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];

/// A generic 2D grid structure.
///
/// Stores elements of type `T` in a flat vector using row-major order.
/// Provides methods for accessing and modifying elements via [`Position`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a new grid with the specified dimensions, filled with default values.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` overflows `usize`.
    pub fn new(width: usize, height: usize) -> Self
    where
        T: Default + Clone,
    {
        let size = width.checked_mul(height).expect("Grid size overflow");
        Grid {
            width,
            height,
            cells: vec![T::default(); size],
        }
    }

    /// Returns the width of the grid.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the height of the grid.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Converts a position to a flat vector index.
    ///
    /// Returns `None` if the position is out of bounds.
    #[inline]
    pub fn position_to_index(&self, pos: Position) -> Option<usize> {
        if self.is_valid(pos) {
            Some(pos.y * self.width + pos.x)
        } else {
            None
        }
    }

    /// Checks if the given position is within the grid boundaries.
    #[inline]
    pub fn is_valid(&self, pos: Position) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    /// Returns `Ok(())` for in-bounds positions, or the matching
    /// [`GridError::OutOfBounds`].
    pub fn check_bounds(&self, pos: Position) -> Result<(), GridError> {
        if self.is_valid(pos) {
            Ok(())
        } else {
            Err(GridError::OutOfBounds {
                x: pos.x,
                y: pos.y,
                width: self.width,
                height: self.height,
            })
        }
    }

    /// Gets an immutable reference to the cell at the given position.
    pub fn get(&self, pos: Position) -> Option<&T> {
        let index = self.position_to_index(pos)?;
        self.cells.get(index)
    }

    /// Gets a mutable reference to the cell at the given position.
    pub fn get_mut(&mut self, pos: Position) -> Option<&mut T> {
        let index = self.position_to_index(pos)?;
        self.cells.get_mut(index)
    }

    /// Returns an iterator over every in-bounds position in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + use<T> {
        let width = self.width;
        (0..self.height).flat_map(move |y| (0..width).map(move |x| Position { x, y }))
    }

    /// Returns an iterator that yields `(Position, &T)` for each cell.
    pub fn enumerate(&self) -> impl Iterator<Item = (Position, &T)> {
        let width = self.width;
        self.cells.iter().enumerate().map(move |(index, cell)| {
            let y = index / width;
            let x = index % width;
            (Position { x, y }, cell)
        })
    }

    /// Returns the in-bounds cardinal neighbours of `pos` (no diagonals, no
    /// wraparound), in down, up, right, left order.
    pub fn cardinal_neighbors(&self, pos: Position) -> Vec<Position> {
        let mut neighbors = Vec::with_capacity(4);
        for (dx, dy) in CARDINAL_OFFSETS {
            // Skip offsets that would underflow past the left/top edge
            let Some(x) = pos.x.checked_add_signed(dx) else {
                continue;
            };
            let Some(y) = pos.y.checked_add_signed(dy) else {
                continue;
            };
            let neighbor = Position { x, y };
            if self.is_valid(neighbor) {
                neighbors.push(neighbor);
            }
        }
        neighbors
    }
}
