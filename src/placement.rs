use std::fmt::Debug;
use crate::constraint::Constraint;
use crate::core::{singleton_set, Attribution, ConstraintResult, DecisionGrid, Index, State, Stateful, Value, WithId};
use crate::pieces::{PiecePart, TilingState};

pub const PAIR_CONFLICT_ATTRIBUTION: &str = "PAIR_CONFLICT";
pub const BLOCKED_MISMATCH_ATTRIBUTION: &str = "BLOCKED_MISMATCH";

/// Structural legality of piece placement: every domino half must have its
/// other half in the adjacent cell it implies, dominoes may not run off the
/// grid or into blocked cells, and blocked cells hold exactly the Blocked
/// marker. Fully determined by the puzzle state, so there's no internal
/// bookkeeping to keep in sync.
pub struct PlacementChecker {
    pair_conflict: Attribution<WithId>,
    blocked_mismatch: Attribution<WithId>,
}

impl PlacementChecker {
    pub fn new() -> Self {
        PlacementChecker {
            pair_conflict: Attribution::new(PAIR_CONFLICT_ATTRIBUTION).unwrap(),
            blocked_mismatch: Attribution::new(BLOCKED_MISMATCH_ATTRIBUTION).unwrap(),
        }
    }

    // A filled cell's partner obligation, checked against the current state.
    // Returns false on an outright conflict; prunes the partner's candidates
    // when it is still open.
    fn partner_ok(
        &self,
        puzzle: &TilingState,
        grid: &mut DecisionGrid<PiecePart>,
        index: Index,
        value: PiecePart,
    ) -> bool {
        let board = puzzle.board();
        match value.partner(index, board.rows(), board.cols()) {
            None => false,
            Some((pi, pv)) => {
                if board.is_blocked(pi) {
                    return false;
                }
                match puzzle.get(pi) {
                    Some(w) => w == pv,
                    None => {
                        grid.get_mut(pi).intersect_with(&singleton_set(pv));
                        true
                    },
                }
            },
        }
    }

    // Would placing `value` at `index` still be legal, ignoring sums? Used to
    // narrow the candidates of open cells.
    fn placement_legal(&self, puzzle: &TilingState, index: Index, value: PiecePart) -> bool {
        let board = puzzle.board();
        match value.partner(index, board.rows(), board.cols()) {
            None => false,
            Some((pi, pv)) => {
                !board.is_blocked(pi) && match puzzle.get(pi) {
                    Some(w) => w == pv,
                    None => true,
                }
            },
        }
    }
}

impl Default for PlacementChecker {
    fn default() -> Self { Self::new() }
}

impl Debug for PlacementChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PlacementChecker\n")
    }
}

impl Stateful<PiecePart> for PlacementChecker {}

impl Constraint<PiecePart, TilingState> for PlacementChecker {
    fn check(&self, puzzle: &TilingState, grid: &mut DecisionGrid<PiecePart>) -> ConstraintResult<PiecePart> {
        let board = puzzle.board();
        for r in 0..board.rows() {
            for c in 0..board.cols() {
                let index = [r, c];
                if board.is_blocked(index) {
                    match puzzle.get(index) {
                        Some(PiecePart::Blocked) => {},
                        Some(_) => return ConstraintResult::Contradiction(self.blocked_mismatch),
                        None => {
                            *grid.get_mut(index) = singleton_set(PiecePart::Blocked);
                        },
                    }
                    continue;
                }
                match puzzle.get(index) {
                    Some(PiecePart::Blocked) => {
                        return ConstraintResult::Contradiction(self.blocked_mismatch);
                    },
                    Some(v) => {
                        if !self.partner_ok(puzzle, grid, index, v) {
                            return ConstraintResult::Contradiction(self.pair_conflict);
                        }
                    },
                    None => {
                        let mut keep = vec![];
                        for v in grid.get(index).iter().map(crate::core::to_value::<PiecePart>) {
                            if v != PiecePart::Blocked && self.placement_legal(puzzle, index, v) {
                                keep.push(v);
                            }
                        }
                        let s = grid.get_mut(index);
                        s.clear();
                        for v in keep {
                            s.insert(v.to_uval());
                        }
                    },
                }
            }
        }
        ConstraintResult::Ok
    }

    fn debug_at(&self, puzzle: &TilingState, index: Index) -> Option<String> {
        let board = puzzle.board();
        if board.is_blocked(index) {
            return Some("blocked cell".to_string());
        }
        puzzle.get(index).map(|v| {
            match v.partner(index, board.rows(), board.cols()) {
                Some((pi, pv)) => format!("{} expects {} at {:?}", v, pv, pi),
                None => format!("{} has no room for its other half", v),
            }
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::board::Board;
    use crate::constraint::test_util::{assert_contradiction, assert_no_contradiction};
    use crate::core::unpack_values;
    use crate::pieces::test_util::fill_from_rows;
    use crate::ranker::StdRanker;
    use crate::solver::test_util::PuzzleReplay;

    fn open_board(rows: usize, cols: usize) -> Board {
        Board::new(rows, cols, vec![], vec![0; rows], vec![0; cols]).unwrap()
    }

    fn check_after(state: &mut TilingState, rows: &[&str]) -> (ConstraintResult<PiecePart>, DecisionGrid<PiecePart>) {
        fill_from_rows(state, rows);
        let checker = PlacementChecker::new();
        let mut grid = DecisionGrid::full(state.rows(), state.cols());
        let result = checker.check(state, &mut grid);
        (result, grid)
    }

    fn candidates(grid: &DecisionGrid<PiecePart>, index: Index) -> Vec<PiecePart> {
        unpack_values::<PiecePart>(grid.get(index))
    }

    #[test]
    fn test_corner_candidates() {
        let mut state = TilingState::new(open_board(3, 3));
        let (result, grid) = check_after(&mut state, &[]);
        assert_no_contradiction(result);
        // Top-left corner: only a vertical top or horizontal left fits.
        assert_eq!(
            candidates(&grid, [0, 0]),
            vec![PiecePart::VerticalTop, PiecePart::HorizontalLeft],
        );
        // Bottom-right corner: only the dependent halves fit.
        assert_eq!(
            candidates(&grid, [2, 2]),
            vec![PiecePart::HorizontalRight, PiecePart::VerticalBottom],
        );
        // Interior cell: everything but Blocked.
        assert_eq!(candidates(&grid, [1, 1]).len(), 4);
    }

    #[test]
    fn test_edge_candidates() {
        let mut state = TilingState::new(open_board(3, 3));
        let (result, grid) = check_after(&mut state, &[]);
        assert_no_contradiction(result);
        // Top edge: no vertical bottom.
        assert!(!candidates(&grid, [0, 1]).contains(&PiecePart::VerticalBottom));
        // Left edge: no horizontal right.
        assert!(!candidates(&grid, [1, 0]).contains(&PiecePart::HorizontalRight));
        // Right edge: no horizontal left.
        assert!(!candidates(&grid, [1, 2]).contains(&PiecePart::HorizontalLeft));
        // Bottom edge: no vertical top.
        assert!(!candidates(&grid, [2, 1]).contains(&PiecePart::VerticalTop));
    }

    #[test]
    fn test_blocked_neighbor_excluded() {
        let board = Board::new(3, 3, vec![[1, 1]], vec![0; 3], vec![0; 3]).unwrap();
        let mut state = TilingState::new(board);
        crate::core::test_util::replay_givens(&mut state);
        let (result, grid) = check_after(&mut state, &[]);
        assert_no_contradiction(result);
        // The cell above the blocked one can't start a vertical domino into it.
        assert!(!candidates(&grid, [0, 1]).contains(&PiecePart::VerticalTop));
        // The cell to its right can't claim it as a horizontal left half.
        assert!(!candidates(&grid, [1, 2]).contains(&PiecePart::HorizontalRight));
    }

    #[test]
    fn test_partner_forced_singleton() {
        let mut state = TilingState::new(open_board(2, 2));
        let (result, grid) = check_after(&mut state, &[
            "T.",
            "..",
        ]);
        assert_no_contradiction(result);
        assert_eq!(candidates(&grid, [1, 0]), vec![PiecePart::VerticalBottom]);
    }

    #[test]
    fn test_pair_conflict() {
        let mut state = TilingState::new(open_board(2, 2));
        let (result, _) = check_after(&mut state, &[
            "TT",
            "BL",
        ]);
        // (1, 1) should be the bottom of the second vertical domino, not a
        // horizontal left half.
        assert_contradiction(result, "PAIR_CONFLICT");
    }

    #[test]
    fn test_domino_off_grid() {
        let mut state = TilingState::new(open_board(2, 2));
        let (result, _) = check_after(&mut state, &[
            "..",
            "T.",
        ]);
        assert_contradiction(result, "PAIR_CONFLICT");
    }

    #[test]
    fn test_domino_into_blocked_cell() {
        let board = Board::new(2, 2, vec![[1, 0]], vec![0, 0], vec![0, 0]).unwrap();
        let mut state = TilingState::new(board);
        crate::core::test_util::replay_givens(&mut state);
        let (result, _) = check_after(&mut state, &[
            "T.",
            "..",
        ]);
        assert_contradiction(result, "PAIR_CONFLICT");
    }

    #[test]
    fn test_blocked_value_on_open_cell() {
        let mut state = TilingState::new(open_board(2, 2));
        state.apply([0, 0], PiecePart::Blocked).unwrap();
        let checker = PlacementChecker::new();
        let mut grid = DecisionGrid::full(2, 2);
        assert_contradiction(checker.check(&state, &mut grid), "BLOCKED_MISMATCH");
    }

    #[test]
    fn test_replay_with_blocked_givens() {
        // Replaying the blocked givens through the constraint must not
        // produce a contradiction on a well formed board.
        let board = Board::new(3, 3, vec![[1, 1]], vec![2, 0, 1], vec![1, 2, 0]).unwrap();
        let mut state = TilingState::new(board);
        let ranker = StdRanker::new();
        let mut checker = PlacementChecker::new();
        let result = PuzzleReplay::new(&mut state, &ranker, &mut checker, None).replay().unwrap();
        assert_no_contradiction(result);
    }
}
