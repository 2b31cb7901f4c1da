use std::collections::HashSet;
use std::fmt::Display;
use crate::core::{GridIndex, Index};

/// Structural problems with a puzzle definition, caught before any search
/// happens. Distinct from infeasibility: an invalid board isn't a puzzle at
/// all, while an infeasible one is a well-formed puzzle with no solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidBoard {
    BadDimensions { rows: usize, cols: usize },
    RowSumsLength { expected: usize, got: usize },
    ColSumsLength { expected: usize, got: usize },
    BlockedOutOfBounds(Index),
}

impl Display for InvalidBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidBoard::BadDimensions { rows, cols } => {
                write!(f, "Board dimensions must be nonzero; got {}x{}", rows, cols)
            },
            InvalidBoard::RowSumsLength { expected, got } => {
                write!(f, "Expected {} row sums; got {}", expected, got)
            },
            InvalidBoard::ColSumsLength { expected, got } => {
                write!(f, "Expected {} column sums; got {}", expected, got)
            },
            InvalidBoard::BlockedOutOfBounds(index) => {
                write!(f, "Blocked cell {:?} is outside the grid", index)
            },
        }
    }
}

impl std::error::Error for InvalidBoard {}

/// An immutable puzzle definition: grid dimensions, the blocked cells, and
/// the target weighted sum for every row and column. Vertical dominoes weigh
/// 1 on their top half; horizontal dominoes weigh 2 on their right half; all
/// other cells (including blocked ones) weigh 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    rows: usize,
    cols: usize,
    blocked: HashSet<Index>,
    row_sums: Vec<u32>,
    col_sums: Vec<u32>,
}

impl Board {
    pub fn new(
        rows: usize,
        cols: usize,
        blocked: Vec<Index>,
        row_sums: Vec<u32>,
        col_sums: Vec<u32>,
    ) -> Result<Self, InvalidBoard> {
        if rows == 0 || cols == 0 {
            return Err(InvalidBoard::BadDimensions { rows, cols });
        }
        if row_sums.len() != rows {
            return Err(InvalidBoard::RowSumsLength { expected: rows, got: row_sums.len() });
        }
        if col_sums.len() != cols {
            return Err(InvalidBoard::ColSumsLength { expected: cols, got: col_sums.len() });
        }
        for index in &blocked {
            if !index.in_bounds(rows, cols) {
                return Err(InvalidBoard::BlockedOutOfBounds(*index));
            }
        }
        Ok(Board {
            rows,
            cols,
            blocked: blocked.into_iter().collect(),
            row_sums,
            col_sums,
        })
    }

    pub fn rows(&self) -> usize { self.rows }
    pub fn cols(&self) -> usize { self.cols }

    pub fn is_blocked(&self, index: Index) -> bool {
        self.blocked.contains(&index)
    }

    pub fn n_blocked(&self) -> usize { self.blocked.len() }

    pub fn row_sum(&self, r: usize) -> u32 { self.row_sums[r] }
    pub fn col_sum(&self, c: usize) -> u32 { self.col_sums[c] }
}
