use std::fmt::Debug;
use crate::board::Board;
use crate::constraint::Constraint;
use crate::core::{to_value, Attribution, ConstraintResult, DecisionGrid, Error, Index, State, Stateful, Value, WithId};
use crate::pieces::{PiecePart, TilingState};

pub const ROW_SUM_CONFLICT_ATTRIBUTION: &str = "ROW_SUM_CONFLICT";
pub const COL_SUM_CONFLICT_ATTRIBUTION: &str = "COL_SUM_CONFLICT";

pub const SUM_UNDO_MISMATCH: Error = Error::new_const(
    "Undo of a weight that was never applied to SumChecker",
);

/// Enforces the weighted row and column targets. Keeps a running total of
/// the weight already placed in each line, and bounds what the open cells
/// can still contribute using their candidate sets.
pub struct SumChecker {
    row_targets: Vec<u32>,
    col_targets: Vec<u32>,
    row_filled: Vec<u32>,
    col_filled: Vec<u32>,
    row_conflict: Attribution<WithId>,
    col_conflict: Attribution<WithId>,
}

// Inclusive weight bounds over a candidate set. An empty set contributes
// nothing; PlacementChecker is the one to flag it.
fn weight_bounds(s: &crate::core::UVSet<u8>) -> (u32, u32) {
    let mut lo = u32::MAX;
    let mut hi = 0;
    let mut any = false;
    for v in s.iter().map(to_value::<PiecePart>) {
        let w = v.weight();
        lo = lo.min(w);
        hi = hi.max(w);
        any = true;
    }
    if any { (lo, hi) } else { (0, 0) }
}

impl SumChecker {
    pub fn new(board: &Board) -> Self {
        let (rows, cols) = (board.rows(), board.cols());
        SumChecker {
            row_targets: (0..rows).map(|r| board.row_sum(r)).collect(),
            col_targets: (0..cols).map(|c| board.col_sum(c)).collect(),
            row_filled: vec![0; rows],
            col_filled: vec![0; cols],
            row_conflict: Attribution::new(ROW_SUM_CONFLICT_ATTRIBUTION).unwrap(),
            col_conflict: Attribution::new(COL_SUM_CONFLICT_ATTRIBUTION).unwrap(),
        }
    }

    pub fn row_filled(&self, r: usize) -> u32 { self.row_filled[r] }
    pub fn col_filled(&self, c: usize) -> u32 { self.col_filled[c] }

    // One line (a row or a column) of the check. `cells` enumerates the
    // line's indices in scan order.
    fn check_line<I: Iterator<Item = Index> + Clone>(
        &self,
        puzzle: &TilingState,
        grid: &mut DecisionGrid<PiecePart>,
        cells: I,
        filled: u32,
        target: u32,
        attribution: Attribution<WithId>,
    ) -> ConstraintResult<PiecePart> {
        let mut min_extra = 0;
        let mut max_extra = 0;
        let mut open = vec![];
        for index in cells {
            if puzzle.get(index).is_some() {
                continue;
            }
            let (lo, hi) = weight_bounds(grid.get(index));
            min_extra += lo;
            max_extra += hi;
            open.push((index, lo, hi));
        }
        if filled + min_extra > target || filled + max_extra < target {
            return ConstraintResult::Contradiction(attribution);
        }
        for (index, lo, hi) in open {
            let mut drop = vec![];
            for v in grid.get(index).iter().map(to_value::<PiecePart>) {
                let w = v.weight();
                if filled + w + (min_extra - lo) > target
                    || filled + w + (max_extra - hi) < target {
                    drop.push(v);
                }
            }
            let s = grid.get_mut(index);
            for v in drop {
                s.remove(v.to_uval());
            }
        }
        ConstraintResult::Ok
    }
}

impl Debug for SumChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SumChecker; rows: ")?;
        for (f2, t) in self.row_filled.iter().zip(self.row_targets.iter()) {
            write!(f, "{}/{} ", f2, t)?;
        }
        write!(f, "; cols: ")?;
        for (f2, t) in self.col_filled.iter().zip(self.col_targets.iter()) {
            write!(f, "{}/{} ", f2, t)?;
        }
        writeln!(f)
    }
}

impl Stateful<PiecePart> for SumChecker {
    fn reset(&mut self) {
        self.row_filled.iter_mut().for_each(|v| *v = 0);
        self.col_filled.iter_mut().for_each(|v| *v = 0);
    }

    fn apply(&mut self, index: Index, value: PiecePart) -> Result<(), Error> {
        let w = value.weight();
        self.row_filled[index[0]] += w;
        self.col_filled[index[1]] += w;
        Ok(())
    }

    fn undo(&mut self, index: Index, value: PiecePart) -> Result<(), Error> {
        let w = value.weight();
        self.row_filled[index[0]] = self.row_filled[index[0]]
            .checked_sub(w).ok_or(SUM_UNDO_MISMATCH)?;
        self.col_filled[index[1]] = self.col_filled[index[1]]
            .checked_sub(w).ok_or(SUM_UNDO_MISMATCH)?;
        Ok(())
    }
}

impl Constraint<PiecePart, TilingState> for SumChecker {
    fn check(&self, puzzle: &TilingState, grid: &mut DecisionGrid<PiecePart>) -> ConstraintResult<PiecePart> {
        let (rows, cols) = (puzzle.rows(), puzzle.cols());
        for r in 0..rows {
            let result = self.check_line(
                puzzle, grid,
                (0..cols).map(move |c| [r, c]),
                self.row_filled[r], self.row_targets[r], self.row_conflict,
            );
            if let ConstraintResult::Contradiction(_) = result {
                return result;
            }
        }
        for c in 0..cols {
            let result = self.check_line(
                puzzle, grid,
                (0..rows).map(move |r| [r, c]),
                self.col_filled[c], self.col_targets[c], self.col_conflict,
            );
            if let ConstraintResult::Contradiction(_) = result {
                return result;
            }
        }
        ConstraintResult::Ok
    }

    fn debug_at(&self, _: &TilingState, index: Index) -> Option<String> {
        Some(format!(
            "row {}/{}; col {}/{}",
            self.row_filled[index[0]], self.row_targets[index[0]],
            self.col_filled[index[1]], self.col_targets[index[1]],
        ))
    }
}
