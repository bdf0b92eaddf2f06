//! The occupancy index of a run.
//!
//! The grid does not own any agents or hospitals; it only records which of them are standing in
//! each cell. The [`Engine`](crate::Engine) clears and rebuilds it from scratch at the end of
//! every tick, so after a rebuild the occupants across all cells are exactly the current
//! locations of every agent and hospital.
use std::fmt::{self, Display};

use crate::agent::AgentId;
use crate::error::SimError;
use crate::hospital::HospitalId;

/// A tag stored in a grid cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Occupant {
    Hospital(HospitalId),
    Agent(AgentId),
}

impl Display for Occupant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Occupant::Hospital(id) => write!(f, "{id}"),
            Occupant::Agent(id) => write!(f, "{id}"),
        }
    }
}

/// Largest number of cells a grid may hold.
pub const MAX_CELLS: usize = 1 << 24;

#[derive(Clone, Debug)]
pub struct Grid {
    width: usize,
    height: usize,
    // Row-major, indexed by `y * width + x`.
    cells: Vec<Vec<Occupant>>,
}

impl Grid {
    /// # Panics
    ///
    /// Panics if either dimension is zero or the grid would exceed [`MAX_CELLS`].
    pub fn new(width: usize, height: usize) -> Self {
        match Grid::try_new(width, height) {
            Ok(grid) => grid,
            Err(e) => panic!("{e}"),
        }
    }

    /// # Errors
    ///
    /// Returns `SimError::InvalidParameters` if either dimension is zero or the grid would
    /// exceed [`MAX_CELLS`].
    pub fn try_new(width: usize, height: usize) -> Result<Self, SimError> {
        if width == 0 || height == 0 {
            return Err("Grid dimensions must be positive".into());
        }
        match width.checked_mul(height) {
            Some(cells) if cells <= MAX_CELLS => Ok(Grid {
                width,
                height,
                cells: vec![Vec::new(); cells],
            }),
            _ => Err(format!("a {width}x{height} grid exceeds {MAX_CELLS} cells").into()),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn index(&self, x: usize, y: usize) -> Result<usize, SimError> {
        if x < self.width && y < self.height {
            Ok(y * self.width + x)
        } else {
            Err(SimError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            })
        }
    }

    /// Returns the occupants of a cell.
    ///
    /// # Errors
    ///
    /// Returns `SimError::OutOfBounds` if the cell is outside the grid.
    pub fn get(&self, x: usize, y: usize) -> Result<&[Occupant], SimError> {
        let index = self.index(x, y)?;
        Ok(&self.cells[index])
    }

    /// Replaces the occupants of a cell.
    ///
    /// # Errors
    ///
    /// Returns `SimError::OutOfBounds` if the cell is outside the grid.
    pub fn set(&mut self, x: usize, y: usize, occupants: Vec<Occupant>) -> Result<(), SimError> {
        let index = self.index(x, y)?;
        self.cells[index] = occupants;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SimError::OutOfBounds` if the cell is outside the grid.
    pub fn add_hospital(&mut self, x: usize, y: usize, id: HospitalId) -> Result<(), SimError> {
        let index = self.index(x, y)?;
        self.cells[index].push(Occupant::Hospital(id));
        Ok(())
    }

    /// Any number of agents may share a cell.
    ///
    /// # Errors
    ///
    /// Returns `SimError::OutOfBounds` if the cell is outside the grid.
    pub fn add_agent(&mut self, x: usize, y: usize, id: AgentId) -> Result<(), SimError> {
        let index = self.index(x, y)?;
        self.cells[index].push(Occupant::Agent(id));
        Ok(())
    }

    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
    }

    /// Total number of tags across every cell.
    pub fn occupant_count(&self) -> usize {
        self.cells.iter().map(Vec::len).sum()
    }
}

impl Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for row in self.cells.chunks(self.width) {
            let rendered: Vec<String> = row
                .iter()
                .map(|cell| {
                    cell.iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(",")
                })
                .collect();
            writeln!(f, "{}", rendered.join("|"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_appends_without_overwriting() {
        let mut grid = Grid::new(4, 3);
        grid.add_hospital(1, 2, HospitalId(0)).unwrap();
        grid.add_agent(1, 2, AgentId(5)).unwrap();
        grid.add_agent(1, 2, AgentId(6)).unwrap();
        assert_eq!(
            grid.get(1, 2).unwrap(),
            &[
                Occupant::Hospital(HospitalId(0)),
                Occupant::Agent(AgentId(5)),
                Occupant::Agent(AgentId(6)),
            ]
        );
        assert_eq!(grid.occupant_count(), 3);
    }

    #[test]
    fn out_of_bounds_access_fails() {
        let mut grid = Grid::new(4, 3);
        assert!(matches!(
            grid.get(4, 0),
            Err(SimError::OutOfBounds { x: 4, y: 0, .. })
        ));
        assert!(grid.get(0, 3).is_err());
        assert!(grid.set(10, 10, Vec::new()).is_err());
        assert!(grid.add_agent(0, 3, AgentId(0)).is_err());
        assert!(grid.add_hospital(4, 2, HospitalId(0)).is_err());
        assert_eq!(grid.occupant_count(), 0);
    }

    #[test]
    fn set_replaces_cell() {
        let mut grid = Grid::new(2, 2);
        grid.add_agent(0, 0, AgentId(1)).unwrap();
        grid.set(0, 0, vec![Occupant::Agent(AgentId(2))]).unwrap();
        assert_eq!(grid.get(0, 0).unwrap(), &[Occupant::Agent(AgentId(2))]);
    }

    #[test]
    fn clear_empties_every_cell() {
        let mut grid = Grid::new(3, 3);
        grid.add_agent(0, 0, AgentId(1)).unwrap();
        grid.add_agent(2, 2, AgentId(2)).unwrap();
        grid.clear();
        assert_eq!(grid.occupant_count(), 0);
        assert!(grid.get(2, 2).unwrap().is_empty());
    }

    #[test]
    fn display_renders_pipe_separated_rows() {
        let mut grid = Grid::new(3, 2);
        grid.add_hospital(0, 0, HospitalId(1)).unwrap();
        grid.add_agent(2, 0, AgentId(3)).unwrap();
        grid.add_agent(2, 0, AgentId(4)).unwrap();
        assert_eq!(grid.to_string(), "H1||A3,A4\n||\n");
    }

    #[test]
    fn oversized_grid_is_rejected() {
        assert!(matches!(
            Grid::try_new(1 << 32, 1 << 32),
            Err(SimError::InvalidParameters(_))
        ));
        assert!(Grid::try_new(MAX_CELLS + 1, 1).is_err());
        assert!(Grid::try_new(0, 3).is_err());
        assert_eq!(Grid::try_new(10, 10).unwrap().width(), 10);
    }

    #[test]
    #[should_panic(expected = "Grid dimensions must be positive")]
    fn zero_sized_grid_panics() {
        let _ = Grid::new(0, 5);
    }
}
