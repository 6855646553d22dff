use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{bingo::error::BingoError, domain::track::Track};

/// Side length of a square board. Only 3, 4 and 5 are playable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct BoardSize(u8);

impl BoardSize {
    pub const ALLOWED: [u8; 3] = [3, 4, 5];

    pub fn new(size: u8) -> Result<Self, BingoError> {
        if Self::ALLOWED.contains(&size) {
            Ok(Self(size))
        } else {
            Err(BingoError::InvalidSize(size))
        }
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }

    pub fn cell_count(self) -> usize {
        self.get() * self.get()
    }

    /// Free space only exists on 5x5 boards, in the centre
    pub fn free_space_applies(self, include_free_space: bool) -> bool {
        include_free_space && self.0 == 5
    }

    pub fn centre(self) -> (usize, usize) {
        (self.get() / 2, self.get() / 2)
    }
}

impl TryFrom<u8> for BoardSize {
    type Error = BingoError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BoardSize> for u8 {
    fn from(size: BoardSize) -> Self {
        size.0
    }
}

impl Display for BoardSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{0}x{0}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardId(pub String);

impl Display for BoardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What sits in a cell: a track, or the free-space sentinel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Occupant {
    Track(Track),
    FreeSpace,
}

impl Occupant {
    pub fn is_free_space(&self) -> bool {
        matches!(self, Occupant::FreeSpace)
    }

    pub fn track(&self) -> Option<&Track> {
        match self {
            Occupant::Track(track) => Some(track),
            Occupant::FreeSpace => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
    pub occupant: Occupant,
    pub marked: bool,
}

impl Cell {
    pub fn is_free_space(&self) -> bool {
        self.occupant.is_free_space()
    }
}

/// One NxN bingo grid with its marking state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub size: BoardSize,
    /// Row-major matrix, `cells[row][col]`
    pub cells: Vec<Vec<Cell>>,
}

impl Board {
    pub fn cell(&self, row: usize, col: usize) -> Result<&Cell, BingoError> {
        self.check_range(row, col)?;
        Ok(&self.cells[row][col])
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().flatten()
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.cells().filter_map(|cell| cell.occupant.track())
    }

    pub fn free_space(&self) -> Option<&Cell> {
        self.cells().find(|cell| cell.is_free_space())
    }

    pub(crate) fn check_range(&self, row: usize, col: usize) -> Result<(), BingoError> {
        let size = self.size.get();
        if row >= size || col >= size {
            return Err(BingoError::OutOfRange { row, col, size });
        }
        Ok(())
    }

    /// Checks the shape invariants of a board received from outside,
    /// e.g. sent back by a client for the next move.
    pub fn validate(&self) -> Result<(), BingoError> {
        let size = self.size.get();
        if self.cells.len() != size {
            return Err(BingoError::MalformedBoard(format!(
                "expected {size} rows, got {}",
                self.cells.len()
            )));
        }

        for (r, row) in self.cells.iter().enumerate() {
            if row.len() != size {
                return Err(BingoError::MalformedBoard(format!(
                    "row {r} has {} cells, expected {size}",
                    row.len()
                )));
            }
            for (c, cell) in row.iter().enumerate() {
                if cell.row != r || cell.col != c {
                    return Err(BingoError::MalformedBoard(format!(
                        "cell at ({r}, {c}) claims position ({}, {})",
                        cell.row, cell.col
                    )));
                }
                if cell.is_free_space() && (self.size.get() != 5 || (r, c) != self.size.centre())
                {
                    return Err(BingoError::MalformedBoard(format!(
                        "free space at ({r}, {c}) is not allowed"
                    )));
                }
            }
        }

        let mut ids: Vec<_> = self.tracks().map(|t| &t.id).collect();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        if ids.len() != before {
            return Err(BingoError::MalformedBoard(
                "a track appears more than once".to_string(),
            ));
        }

        Ok(())
    }
}
