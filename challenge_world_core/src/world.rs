use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    EntityId, EntityKind, Position,
    map::{Grid, GridError},
};

/// An entity reference stored in a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    pub id: EntityId,
    pub kind: EntityKind,
}

/// Bounded multi-occupancy grid.
///
/// Any number of entities may share a cell, except that a cell holds at most
/// one obstacle. Obstacles never move once placed.
#[derive(Debug, Clone)]
pub struct GridWorld {
    cells: Grid<Vec<Occupant>>,
    locations: HashMap<EntityId, Position>,
}

impl GridWorld {
    /// Creates a new, empty world.
    pub fn new(width: usize, height: usize) -> Self {
        GridWorld {
            cells: Grid::new(width, height),
            locations: HashMap::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.cells.width()
    }

    pub fn height(&self) -> usize {
        self.cells.height()
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        self.cells.is_valid(pos)
    }

    /// The underlying cell grid, for iteration by read-only consumers.
    pub fn cells(&self) -> &Grid<Vec<Occupant>> {
        &self.cells
    }

    /// Puts a new entity on the grid.
    pub fn place(
        &mut self,
        id: EntityId,
        kind: EntityKind,
        pos: Position,
    ) -> Result<(), GridError> {
        self.cells.check_bounds(pos)?;
        if self.locations.contains_key(&id) {
            return Err(GridError::DuplicateEntity(id));
        }
        if kind == EntityKind::Obstacle && self.has_obstacle(pos) {
            return Err(GridError::CellHasObstacle { x: pos.x, y: pos.y });
        }
        self.cell_mut(pos)?.push(Occupant { id, kind });
        self.locations.insert(id, pos);
        Ok(())
    }

    /// Relocates an entity that is already on the grid.
    pub fn move_entity(&mut self, id: EntityId, pos: Position) -> Result<(), GridError> {
        self.cells.check_bounds(pos)?;
        let from = self.position_of(id).ok_or(GridError::UnknownEntity(id))?;
        let occupants = self.cell_mut(from)?;
        let index = occupants
            .iter()
            .position(|o| o.id == id)
            .ok_or(GridError::UnknownEntity(id))?;
        if occupants[index].kind == EntityKind::Obstacle {
            return Err(GridError::ObstacleIsFixed(id));
        }
        let occupant = occupants.remove(index);
        self.cell_mut(pos)?.push(occupant);
        self.locations.insert(id, pos);
        Ok(())
    }

    /// Takes an entity off the grid, returning where it was.
    pub fn remove(&mut self, id: EntityId) -> Result<Position, GridError> {
        let pos = self
            .locations
            .remove(&id)
            .ok_or(GridError::UnknownEntity(id))?;
        self.cell_mut(pos)?.retain(|o| o.id != id);
        Ok(pos)
    }

    pub fn position_of(&self, id: EntityId) -> Option<Position> {
        self.locations.get(&id).copied()
    }

    /// Current occupants of a cell; empty for out-of-bounds positions.
    pub fn contents(&self, pos: Position) -> &[Occupant] {
        self.cells.get(pos).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True if the cell is in bounds and nothing occupies it.
    pub fn is_empty(&self, pos: Position) -> bool {
        self.cells.get(pos).is_some_and(Vec::is_empty)
    }

    pub fn has_obstacle(&self, pos: Position) -> bool {
        self.contents(pos)
            .iter()
            .any(|o| o.kind == EntityKind::Obstacle)
    }

    /// Up to four in-bounds neighbours of `pos`.
    pub fn cardinal_neighbors(&self, pos: Position) -> Vec<Position> {
        self.cells.cardinal_neighbors(pos)
    }

    /// All cells that currently hold nothing, in row-major order.
    pub fn empty_cells(&self) -> Vec<Position> {
        self.cells
            .enumerate()
            .filter(|(_, occupants)| occupants.is_empty())
            .map(|(pos, _)| pos)
            .collect()
    }

    fn cell_mut(&mut self, pos: Position) -> Result<&mut Vec<Occupant>, GridError> {
        let (width, height) = (self.cells.width(), self.cells.height());
        self.cells.get_mut(pos).ok_or(GridError::OutOfBounds {
            x: pos.x,
            y: pos.y,
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_outside_grid_fails_with_bounds_error() {
        let mut world = GridWorld::new(5, 5);
        let err = world
            .place(0, EntityKind::Learner, Position::new(5, 2))
            .unwrap_err();
        assert!(matches!(err, GridError::OutOfBounds { x: 5, y: 2, .. }));
        assert!(world.position_of(0).is_none());
    }

    #[test]
    fn move_outside_grid_fails_and_leaves_entity_in_place() {
        let mut world = GridWorld::new(5, 5);
        world.place(0, EntityKind::Learner, Position::new(1, 1)).unwrap();
        assert!(world.move_entity(0, Position::new(1, 9)).is_err());
        assert_eq!(world.position_of(0), Some(Position::new(1, 1)));
    }

    #[test]
    fn cells_allow_multiple_occupants() {
        let mut world = GridWorld::new(3, 3);
        let pos = Position::new(2, 2);
        world.place(0, EntityKind::Learner, pos).unwrap();
        world.place(1, EntityKind::GameNode, pos).unwrap();
        assert_eq!(world.contents(pos).len(), 2);
        assert!(!world.is_empty(pos));
    }

    #[test]
    fn second_obstacle_in_cell_is_rejected() {
        let mut world = GridWorld::new(3, 3);
        let pos = Position::new(0, 1);
        world.place(0, EntityKind::Obstacle, pos).unwrap();
        assert_eq!(
            world.place(1, EntityKind::Obstacle, pos),
            Err(GridError::CellHasObstacle { x: 0, y: 1 })
        );
    }

    #[test]
    fn obstacles_cannot_move() {
        let mut world = GridWorld::new(3, 3);
        world.place(4, EntityKind::Obstacle, Position::new(0, 0)).unwrap();
        assert_eq!(
            world.move_entity(4, Position::new(1, 0)),
            Err(GridError::ObstacleIsFixed(4))
        );
        assert!(world.has_obstacle(Position::new(0, 0)));
    }

    #[test]
    fn move_updates_both_cells() {
        let mut world = GridWorld::new(3, 3);
        world.place(0, EntityKind::Learner, Position::new(0, 0)).unwrap();
        world.move_entity(0, Position::new(0, 1)).unwrap();
        assert!(world.is_empty(Position::new(0, 0)));
        assert_eq!(world.contents(Position::new(0, 1))[0].id, 0);
    }

    #[test]
    fn remove_clears_cell_and_location() {
        let mut world = GridWorld::new(3, 3);
        world.place(7, EntityKind::GameNode, Position::new(2, 0)).unwrap();
        assert_eq!(world.remove(7), Ok(Position::new(2, 0)));
        assert!(world.is_empty(Position::new(2, 0)));
        assert_eq!(world.remove(7), Err(GridError::UnknownEntity(7)));
    }

    #[test]
    fn empty_cells_skip_occupied_ones() {
        let mut world = GridWorld::new(2, 2);
        world.place(0, EntityKind::Learner, Position::new(0, 0)).unwrap();
        world.place(1, EntityKind::Obstacle, Position::new(1, 1)).unwrap();
        assert_eq!(
            world.empty_cells(),
            vec![Position::new(1, 0), Position::new(0, 1)]
        );
    }
}
