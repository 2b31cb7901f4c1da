use std::fmt::Display;
use crate::board::{Board, InvalidBoard};
use crate::constraint::MultiConstraint;
use crate::core::{Error, Index, State};
use crate::debug::NullObserver;
use crate::pieces::{PiecePart, TilingState};
use crate::placement::PlacementChecker;
use crate::ranker::StdRanker;
use crate::solver::{FindFirstSolution, StepObserver};
use crate::sums::SumChecker;

/// A complete assignment of every cell on a Board: each open cell holds one
/// domino half and blocked cells are marked as such.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labeling {
    rows: usize,
    cols: usize,
    parts: Vec<PiecePart>,
}

impl Labeling {
    pub fn rows(&self) -> usize { self.rows }
    pub fn cols(&self) -> usize { self.cols }

    /// The part at `index`. Panics if `index` is outside the grid.
    pub fn get(&self, index: Index) -> PiecePart {
        self.parts[index[0] * self.cols + index[1]]
    }

    /// Freeze a fully filled state into a Labeling. Errors if any cell is
    /// still open.
    pub fn from_state(state: &TilingState) -> Result<Self, Error> {
        let (rows, cols) = (state.rows(), state.cols());
        let mut parts = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                match state.get([r, c]) {
                    Some(v) => parts.push(v),
                    None => return Err(Error::new(
                        format!("Cell [{}, {}] is still unfilled", r, c),
                    )),
                }
            }
        }
        Ok(Labeling { rows, cols, parts })
    }
}

impl Display for Labeling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for r in 0..self.rows {
            for c in 0..self.cols {
                write!(f, "{}", self.get([r, c]))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Why a valid Board has no Labeling, or what went wrong looking for one.
#[derive(Debug)]
pub enum SolveError {
    /// The search space is exhausted; no tiling satisfies the sums.
    Infeasible,
    /// The solver itself failed (e.g. inconsistent constraint bookkeeping).
    Engine(Error),
}

impl Display for SolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveError::Infeasible => write!(f, "no tiling satisfies the given sums"),
            SolveError::Engine(e) => write!(f, "solver failure: {}", e),
        }
    }
}

impl std::error::Error for SolveError {}

/// Full failure taxonomy for solve_puzzle: boards that are malformed are
/// distinguished from well-formed boards with no solution.
#[derive(Debug)]
pub enum PuzzleError {
    Invalid(InvalidBoard),
    Infeasible,
    Engine(Error),
}

impl Display for PuzzleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PuzzleError::Invalid(e) => write!(f, "invalid board: {}", e),
            PuzzleError::Infeasible => write!(f, "no tiling satisfies the given sums"),
            PuzzleError::Engine(e) => write!(f, "solver failure: {}", e),
        }
    }
}

impl std::error::Error for PuzzleError {}

impl From<InvalidBoard> for PuzzleError {
    fn from(e: InvalidBoard) -> Self { PuzzleError::Invalid(e) }
}

impl From<SolveError> for PuzzleError {
    fn from(e: SolveError) -> Self {
        match e {
            SolveError::Infeasible => PuzzleError::Infeasible,
            SolveError::Engine(e) => PuzzleError::Engine(e),
        }
    }
}

pub type TilingConstraint = MultiConstraint<PiecePart, TilingState>;
pub type TilingObserver<'a> = dyn StepObserver<
    PiecePart, TilingState, StdRanker, TilingConstraint,
> + 'a;

pub fn tiling_constraint(board: &Board) -> TilingConstraint {
    MultiConstraint::new(vec_box::vec_box![
        PlacementChecker::new(),
        SumChecker::new(board),
    ])
}

/// Find the first tiling of the board consistent with its row and column
/// sums. The search order is fixed, so the same board always yields the same
/// Labeling.
pub fn solve(board: &Board) -> Result<Labeling, SolveError> {
    solve_with_observer::<NullObserver>(board, None)
}

// Generic over the concrete observer so the &mut dyn coercion happens here,
// where the solver's borrow of the freshly built puzzle state is in scope.
pub fn solve_with_observer<Obs>(
    board: &Board,
    observer: Option<&mut Obs>,
) -> Result<Labeling, SolveError>
where Obs: StepObserver<PiecePart, TilingState, StdRanker, TilingConstraint> {
    let mut puzzle = TilingState::new(board.clone());
    let ranker = StdRanker::new();
    let mut constraint = tiling_constraint(board);
    let observer = observer.map(|o| o as &mut TilingObserver);
    let mut finder = FindFirstSolution::new(&mut puzzle, &ranker, &mut constraint, observer);
    match finder.solve().map_err(SolveError::Engine)? {
        Some(view) => Labeling::from_state(view.state()).map_err(SolveError::Engine),
        None => Err(SolveError::Infeasible),
    }
}

/// One-call front door: validate the board and solve it.
pub fn solve_puzzle(
    rows: usize,
    cols: usize,
    blocked: Vec<Index>,
    row_sums: Vec<u32>,
    col_sums: Vec<u32>,
) -> Result<Labeling, PuzzleError> {
    let board = Board::new(rows, cols, blocked, row_sums, col_sums)?;
    Ok(solve(&board)?)
}
