//! The shared, public board: a fixed rows × cols grid of optional cards.

use im::Vector;
use serde::{Deserialize, Serialize};

use crate::cards::Card;

use super::entity::CardId;

/// A board coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellPos {
    pub row: u8,
    pub col: u8,
}

impl CellPos {
    /// Create a coordinate.
    #[must_use]
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }
}

impl std::fmt::Display for CellPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Board grid stored row-major.
///
/// Dimensions are fixed when the session is created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    rows: u8,
    cols: u8,
    cells: Vector<Option<Card>>,
}

impl Board {
    /// Create an empty board.
    #[must_use]
    pub fn new(rows: u8, cols: u8) -> Self {
        let cells = std::iter::repeat(None)
            .take(usize::from(rows) * usize::from(cols))
            .collect();
        Self { rows, cols, cells }
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> u8 {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub fn cols(&self) -> u8 {
        self.cols
    }

    /// Check whether a coordinate lies on the board.
    #[must_use]
    pub fn contains(&self, pos: CellPos) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }

    fn index(&self, pos: CellPos) -> Option<usize> {
        self.contains(pos)
            .then(|| usize::from(pos.row) * usize::from(self.cols) + usize::from(pos.col))
    }

    /// Card in a cell. `None` for empty or out-of-range cells.
    #[must_use]
    pub fn get(&self, pos: CellPos) -> Option<&Card> {
        self.cells.get(self.index(pos)?)?.as_ref()
    }

    /// Replace a cell's content.
    ///
    /// Returns `false` (and changes nothing) for out-of-range coordinates.
    pub fn set(&mut self, pos: CellPos, card: Option<Card>) -> bool {
        match self.index(pos) {
            Some(idx) => {
                self.cells.set(idx, card);
                true
            }
            None => false,
        }
    }

    /// Empty a cell, returning what was there.
    pub fn take(&mut self, pos: CellPos) -> Option<Card> {
        let idx = self.index(pos)?;
        let card = self.cells.get(idx)?.clone();
        self.cells.set(idx, None);
        card
    }

    /// Iterate all coordinates, row-major.
    pub fn positions(&self) -> impl Iterator<Item = CellPos> {
        let cols = self.cols;
        (0..self.rows).flat_map(move |row| (0..cols).map(move |col| CellPos::new(row, col)))
    }

    /// Iterate occupied cells.
    pub fn occupied(&self) -> impl Iterator<Item = (CellPos, &Card)> + '_ {
        self.positions().filter_map(move |pos| self.get(pos).map(|c| (pos, c)))
    }

    /// Locate a card on the board.
    #[must_use]
    pub fn find(&self, id: CardId) -> Option<CellPos> {
        self.occupied().find(|(_, c)| c.id == id).map(|(pos, _)| pos)
    }

    /// Count how many cells hold a card id.
    #[must_use]
    pub fn count(&self, id: CardId) -> usize {
        self.occupied().filter(|(_, c)| c.id == id).count()
    }
}
