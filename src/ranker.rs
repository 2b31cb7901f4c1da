use crate::core::{unpack_values, Attribution, BranchPoint, CertainDecision, ConstraintResult, DecisionGrid, State, Value, WithId};

/// A ranker finds the "best" place in the grid to make a guess. In theory, we
/// could extend this to return multiple guesses, but since a given index
/// provides a mutually exclusive and exhaustive set of guesses, there isn't
/// really a need.
pub trait Ranker<V: Value, S: State<V>> {
    // Note: the ranker must not suggest already filled cells.
    fn top(&self, step: usize, grid: &DecisionGrid<V>, puzzle: &S) -> BranchPoint<V>;

    // Collapse a DecisionGrid into a ConstraintResult, returning any Certainty
    // or Contradiction that is present. This must be compatible with top() --
    // i.e., top() must always return something possible if no Contradiction is
    // found here.
    fn to_constraint_result(&self, grid: &DecisionGrid<V>, puzzle: &S) -> ConstraintResult<V>;
}

pub const DG_EMPTY_ATTRIBUTION: &str = "DG_EMPTY";
pub const DG_TOP_CELL_ATTRIBUTION: &str = "DG_CELL_TOP";
pub const DG_NO_VALS_ATTRIBUTION: &str = "DG_CELL_NO_VALS";
pub const DG_ONE_VAL_ATTRIBUTION: &str = "DG_CELL_ONE_VAL";

/// Ranker that always branches on the unfilled cell with the fewest remaining
/// candidates. Ties go to the earlier cell in scan order, and candidate values
/// come back in ordinal order, so the resulting search is fully deterministic.
pub struct StdRanker {
    empty_attribution: Attribution<WithId>,
    top_cell_attribution: Attribution<WithId>,
    no_vals_attribution: Attribution<WithId>,
    one_val_attribution: Attribution<WithId>,
}

impl StdRanker {
    pub fn new() -> Self {
        StdRanker {
            empty_attribution: Attribution::new(DG_EMPTY_ATTRIBUTION).unwrap(),
            top_cell_attribution: Attribution::new(DG_TOP_CELL_ATTRIBUTION).unwrap(),
            no_vals_attribution: Attribution::new(DG_NO_VALS_ATTRIBUTION).unwrap(),
            one_val_attribution: Attribution::new(DG_ONE_VAL_ATTRIBUTION).unwrap(),
        }
    }
}

impl Default for StdRanker {
    fn default() -> Self { Self::new() }
}

impl <V: Value, S: State<V>> Ranker<V, S> for StdRanker {
    fn top(&self, step: usize, grid: &DecisionGrid<V>, puzzle: &S) -> BranchPoint<V> {
        let mut top_index = None;
        let mut top_len = usize::MAX;
        for r in 0..grid.rows() {
            for c in 0..grid.cols() {
                if puzzle.get([r, c]).is_some() {
                    continue;
                }
                let len = grid.get([r, c]).len();
                if len < top_len {
                    top_len = len;
                    top_index = Some([r, c]);
                }
            }
        }
        if let Some(index) = top_index {
            BranchPoint::for_cell(step, self.top_cell_attribution, index, unpack_values(grid.get(index)))
        } else {
            BranchPoint::empty(step, self.empty_attribution)
        }
    }

    fn to_constraint_result(&self, grid: &DecisionGrid<V>, puzzle: &S) -> ConstraintResult<V> {
        for r in 0..grid.rows() {
            for c in 0..grid.cols() {
                if puzzle.get([r, c]).is_none() {
                    let cell = grid.get([r, c]);
                    if cell.len() == 0 {
                        return ConstraintResult::Contradiction(self.no_vals_attribution);
                    } else if cell.len() == 1 {
                        let v = unpack_values::<V>(cell)[0];
                        return ConstraintResult::Certainty(
                            CertainDecision::new([r, c], v),
                            self.one_val_attribution,
                        );
                    }
                }
            }
        }
        ConstraintResult::Ok
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::test_util::{OneDim, TestVal};
    use crate::core::{pack_values, singleton_set, BranchOver, Stateful};

    #[test]
    fn test_top_prefers_fewest_candidates() {
        let puzzle = OneDim::new(3);
        let mut grid = DecisionGrid::<TestVal>::full(1, 3);
        *grid.get_mut([0, 1]) = pack_values(&vec![TestVal(2), TestVal(4)]);
        let ranker = StdRanker::new();
        let bp = Ranker::<TestVal, OneDim>::top(&ranker, 1, &grid, &puzzle);
        match bp.choices {
            BranchOver::Cell(index, values, 0) => {
                assert_eq!(index, [0, 1]);
                assert_eq!(values, vec![TestVal(2), TestVal(4)]);
            },
            other => panic!("Unexpected branch choices: {:?}", other),
        }
    }

    #[test]
    fn test_top_tie_breaks_in_scan_order() {
        let puzzle = OneDim::new(3);
        let grid = DecisionGrid::<TestVal>::full(1, 3);
        let ranker = StdRanker::new();
        let bp = Ranker::<TestVal, OneDim>::top(&ranker, 1, &grid, &puzzle);
        assert_eq!(bp.chosen(), Some(([0, 0], TestVal(1))));
    }

    #[test]
    fn test_top_skips_filled_cells() {
        let mut puzzle = OneDim::new(2);
        puzzle.apply([0, 0], TestVal(1)).unwrap();
        let mut grid = DecisionGrid::<TestVal>::full(1, 2);
        *grid.get_mut([0, 0]) = singleton_set(TestVal(1));
        let ranker = StdRanker::new();
        let bp = Ranker::<TestVal, OneDim>::top(&ranker, 1, &grid, &puzzle);
        assert_eq!(bp.chosen().map(|(i, _)| i), Some([0, 1]));
    }

    #[test]
    fn test_to_constraint_result_collapses() {
        let mut puzzle = OneDim::new(2);
        let mut grid = DecisionGrid::<TestVal>::full(1, 2);
        *grid.get_mut([0, 0]) = singleton_set(TestVal(3));
        let ranker = StdRanker::new();
        match Ranker::<TestVal, OneDim>::to_constraint_result(&ranker, &grid, &puzzle) {
            ConstraintResult::Certainty(d, a) => {
                assert_eq!(d.index, [0, 0]);
                assert_eq!(d.value, TestVal(3));
                assert_eq!(a.name(), DG_ONE_VAL_ATTRIBUTION);
            },
            other => panic!("Expected a certainty; got {:?}", other),
        }
        puzzle.apply([0, 0], TestVal(3)).unwrap();
        grid.get_mut([0, 1]).clear();
        match Ranker::<TestVal, OneDim>::to_constraint_result(&ranker, &grid, &puzzle) {
            ConstraintResult::Contradiction(a) => {
                assert_eq!(a.name(), DG_NO_VALS_ATTRIBUTION);
            },
            other => panic!("Expected a contradiction; got {:?}", other),
        }
    }
}
