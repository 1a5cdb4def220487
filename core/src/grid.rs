// Grid model: addressable cells on a fixed-size square board.
//
// Columns are 0-based and shown as letters (A, B, ...); rows are 1-based.
// `Coordinate` is a small Copy value so placement and shot arithmetic never
// allocates. Bounds checks go through `within_bounds()`; nothing here panics.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Board dimensions. Fixed for the life of a match.
pub const GRID_SIZE: u8 = 10;

/// Largest board that still has a letter for every column.
pub const MAX_GRID_SIZE: u8 = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn opposite(self) -> Self {
        match self {
            Orientation::Horizontal => Orientation::Vertical,
            Orientation::Vertical => Orientation::Horizontal,
        }
    }

    pub fn is_horizontal(self) -> bool {
        self == Orientation::Horizontal
    }
}

#[derive(Copy, Clone, Debug, Deserialize, Eq, PartialEq, Serialize, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    pub col: u8,
    pub row: u8,
}

impl Coordinate {
    pub const fn new(col: u8, row: u8) -> Self {
        Self { col, row }
    }

    /// Display letter for the column. Columns past `Z` are shown as `?`.
    pub fn column_letter(&self) -> char {
        if self.col < MAX_GRID_SIZE {
            (b'A' + self.col) as char
        } else {
            '?'
        }
    }

    pub fn within_bounds(&self, grid_size: u8) -> bool {
        self.col < grid_size && (1..=grid_size).contains(&self.row)
    }

    /// Move by a cell delta, saturating at the board edges. Used for drag
    /// previews, where the pointer may leave the board.
    pub fn offset_by(self, d_col: i32, d_row: i32, grid_size: u8) -> Self {
        if grid_size == 0 {
            return self;
        }
        let max = grid_size as i32;
        let col = (self.col as i32).saturating_add(d_col).clamp(0, max - 1);
        let row = (self.row as i32).saturating_add(d_row).clamp(1, max);
        Self::new(col as u8, row as u8)
    }

    /// The coordinate `dist` cells further along `orientation`, or `None` on
    /// arithmetic overflow. Does not check board bounds.
    pub fn step(self, orientation: Orientation, dist: u8) -> Option<Self> {
        match orientation {
            Orientation::Horizontal => self.col.checked_add(dist).map(|col| Self::new(col, self.row)),
            Orientation::Vertical => self.row.checked_add(dist).map(|row| Self::new(self.col, row)),
        }
    }
}

impl From<(u8, u8)> for Coordinate {
    fn from(value: (u8, u8)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column_letter(), self.row)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseCoordinateError {
    #[error("empty coordinate")]
    Empty,
    #[error("column {0:?} is not a letter")]
    BadColumn(char),
    #[error("row {0:?} is not a number between 1 and 26")]
    BadRow(String),
}

impl FromStr for Coordinate {
    type Err = ParseCoordinateError;

    /// Parses the display form, e.g. `A7` or `j10`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let letter = chars.next().ok_or(ParseCoordinateError::Empty)?;
        if !letter.is_ascii_alphabetic() {
            return Err(ParseCoordinateError::BadColumn(letter));
        }
        let col = letter.to_ascii_uppercase() as u8 - b'A';
        let rest = chars.as_str();
        let row: u8 = rest
            .parse()
            .ok()
            .filter(|row| (1..=MAX_GRID_SIZE).contains(row))
            .ok_or_else(|| ParseCoordinateError::BadRow(rest.to_string()))?;
        Ok(Self::new(col, row))
    }
}

/// Every cell of a board in reading order (row by row, left to right).
pub fn all_coordinates(grid_size: u8) -> impl Iterator<Item = Coordinate> {
    (1..=grid_size).flat_map(move |row| (0..grid_size).map(move |col| Coordinate::new(col, row)))
}
