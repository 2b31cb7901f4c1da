use std::fmt::{Debug, Display};
use crate::board::Board;
use crate::core::{to_value, Error, Index, State, Stateful, UVGrid, UVUnwrapped, UVWrapped, UVal, Value};

/// What a single cell holds: one half of a domino, or a blocked cell. Each
/// domino contributes weight through exactly one of its halves (the top of a
/// vertical piece, the right end of a horizontal piece), so per-cell weights
/// fully determine the row and column sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PiecePart {
    VerticalTop,
    HorizontalRight,
    VerticalBottom,
    HorizontalLeft,
    Blocked,
}

impl PiecePart {
    pub fn weight(&self) -> u32 {
        match self {
            PiecePart::VerticalTop => 1,
            PiecePart::HorizontalRight => 2,
            _ => 0,
        }
    }

    /// The cell and value that the other half of this domino must occupy, or
    /// None if that cell would fall outside a rows x cols grid. Blocked cells
    /// are whole; they never have a partner.
    pub fn partner(&self, index: Index, rows: usize, cols: usize) -> Option<(Index, PiecePart)> {
        let [r, c] = index;
        match self {
            PiecePart::VerticalTop => {
                (r + 1 < rows).then(|| ([r + 1, c], PiecePart::VerticalBottom))
            },
            PiecePart::VerticalBottom => {
                (r >= 1).then(|| ([r - 1, c], PiecePart::VerticalTop))
            },
            PiecePart::HorizontalRight => {
                (c >= 1).then(|| ([r, c - 1], PiecePart::HorizontalLeft))
            },
            PiecePart::HorizontalLeft => {
                (c + 1 < cols).then(|| ([r, c + 1], PiecePart::HorizontalRight))
            },
            PiecePart::Blocked => None,
        }
    }
}

impl Display for PiecePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = match self {
            PiecePart::VerticalTop => 'T',
            PiecePart::HorizontalRight => 'R',
            PiecePart::VerticalBottom => 'B',
            PiecePart::HorizontalLeft => 'L',
            PiecePart::Blocked => '#',
        };
        write!(f, "{}", c)
    }
}

// Ordinal order is branch order: weight-bearing halves first, so the solver
// always claims a domino from its top/right half before its dependent half.
impl Value for PiecePart {
    type U = u8;

    fn cardinality() -> usize { 5 }

    fn possibilities() -> Vec<Self> {
        vec![
            PiecePart::VerticalTop,
            PiecePart::HorizontalRight,
            PiecePart::VerticalBottom,
            PiecePart::HorizontalLeft,
            PiecePart::Blocked,
        ]
    }

    fn nth(ord: usize) -> Self { Self::possibilities()[ord] }

    fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "T" => Ok(PiecePart::VerticalTop),
            "R" => Ok(PiecePart::HorizontalRight),
            "B" => Ok(PiecePart::VerticalBottom),
            "L" => Ok(PiecePart::HorizontalLeft),
            "#" => Ok(PiecePart::Blocked),
            _ => Err(Error::new(format!("Not a piece part: {:?}", s))),
        }
    }

    fn ordinal(&self) -> usize {
        match self {
            PiecePart::VerticalTop => 0,
            PiecePart::HorizontalRight => 1,
            PiecePart::VerticalBottom => 2,
            PiecePart::HorizontalLeft => 3,
            PiecePart::Blocked => 4,
        }
    }

    fn from_uval(u: UVal<u8, UVUnwrapped>) -> Self {
        Self::nth(u.value() as usize)
    }

    fn to_uval(self) -> UVal<u8, UVWrapped> {
        UVal::new(self.ordinal() as u8)
    }
}

const OUT_OF_BOUNDS: Error = Error::new_const("Index out of bounds");
const ALREADY_FILLED: Error = Error::new_const("Cell already filled");
const UNDO_EMPTY: Error = Error::new_const("Undo on an empty cell");
const UNDO_MISMATCH: Error = Error::new_const("Undo value mismatch");

/// The partially filled tiling for a Board. Blocked cells are delivered as
/// given actions so the solver replays them through the constraints before
/// any branching happens.
#[derive(Clone)]
pub struct TilingState {
    board: Board,
    grid: UVGrid<u8>,
}

impl TilingState {
    pub fn new(board: Board) -> Self {
        let grid = UVGrid::new(board.rows(), board.cols());
        TilingState { board, grid }
    }

    pub fn board(&self) -> &Board { &self.board }
}

impl Debug for TilingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for r in 0..self.board.rows() {
            for c in 0..self.board.cols() {
                match self.get([r, c]) {
                    Some(v) => write!(f, "{}", v)?,
                    None => write!(f, ".")?,
                }
            }
            write!(f, "\n")?;
        }
        Ok(())
    }
}

impl Stateful<PiecePart> for TilingState {
    fn reset(&mut self) {
        self.grid = UVGrid::new(self.board.rows(), self.board.cols());
    }

    fn apply(&mut self, index: Index, value: PiecePart) -> Result<(), Error> {
        if index[0] >= self.board.rows() || index[1] >= self.board.cols() {
            return Err(OUT_OF_BOUNDS);
        }
        if self.grid.get(index).is_some() {
            return Err(ALREADY_FILLED);
        }
        self.grid.set(index, Some(value.to_uval()));
        Ok(())
    }

    fn undo(&mut self, index: Index, value: PiecePart) -> Result<(), Error> {
        if index[0] >= self.board.rows() || index[1] >= self.board.cols() {
            return Err(OUT_OF_BOUNDS);
        }
        match self.grid.get(index).map(to_value::<PiecePart>) {
            None => Err(UNDO_EMPTY),
            Some(v) if v != value => Err(UNDO_MISMATCH),
            Some(_) => {
                self.grid.set(index, None);
                Ok(())
            },
        }
    }
}

impl State<PiecePart> for TilingState {
    fn rows(&self) -> usize { self.board.rows() }
    fn cols(&self) -> usize { self.board.cols() }

    fn get(&self, index: Index) -> Option<PiecePart> {
        self.grid.get(index).map(to_value)
    }

    fn given_actions(&self) -> Vec<(Index, PiecePart)> {
        let mut givens = vec![];
        for r in 0..self.board.rows() {
            for c in 0..self.board.cols() {
                if self.board.is_blocked([r, c]) {
                    givens.push(([r, c], PiecePart::Blocked));
                }
            }
        }
        givens
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_util {
    use super::*;

    /// Fill a state from row strings ('.' for unfilled, '#' cells are skipped
    /// since blocked cells arrive via given actions).
    pub fn fill_from_rows(state: &mut TilingState, rows: &[&str]) {
        for (r, line) in rows.iter().enumerate() {
            for (c, ch) in line.chars().enumerate() {
                if ch == '.' || ch == '#' {
                    continue;
                }
                let v = PiecePart::parse(&ch.to_string()).unwrap();
                state.apply([r, c], v).unwrap();
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::test_util::{replay_givens, round_trip_value};

    fn small_board() -> Board {
        Board::new(2, 2, vec![[0, 1]], vec![1, 0], vec![1, 0]).unwrap()
    }

    #[test]
    fn test_piece_part_round_trip() {
        for v in PiecePart::possibilities() {
            assert_eq!(round_trip_value(v), v);
            assert_eq!(PiecePart::nth(v.ordinal()), v);
            assert_eq!(PiecePart::parse(&v.to_string()).unwrap(), v);
        }
    }

    #[test]
    fn test_weights() {
        assert_eq!(PiecePart::VerticalTop.weight(), 1);
        assert_eq!(PiecePart::HorizontalRight.weight(), 2);
        assert_eq!(PiecePart::VerticalBottom.weight(), 0);
        assert_eq!(PiecePart::HorizontalLeft.weight(), 0);
        assert_eq!(PiecePart::Blocked.weight(), 0);
    }

    #[test]
    fn test_partner_pairing() {
        assert_eq!(
            PiecePart::VerticalTop.partner([0, 0], 2, 2),
            Some(([1, 0], PiecePart::VerticalBottom)),
        );
        assert_eq!(
            PiecePart::VerticalBottom.partner([1, 0], 2, 2),
            Some(([0, 0], PiecePart::VerticalTop)),
        );
        assert_eq!(
            PiecePart::HorizontalRight.partner([0, 1], 2, 2),
            Some(([0, 0], PiecePart::HorizontalLeft)),
        );
        assert_eq!(
            PiecePart::HorizontalLeft.partner([0, 0], 2, 2),
            Some(([0, 1], PiecePart::HorizontalRight)),
        );
    }

    #[test]
    fn test_partner_at_boundaries() {
        // A vertical top in the last row and a vertical bottom in the first
        // row have nowhere to put their other half; same for horizontal
        // halves at the left/right edges.
        assert_eq!(PiecePart::VerticalTop.partner([1, 0], 2, 2), None);
        assert_eq!(PiecePart::VerticalBottom.partner([0, 0], 2, 2), None);
        assert_eq!(PiecePart::HorizontalRight.partner([0, 0], 2, 2), None);
        assert_eq!(PiecePart::HorizontalLeft.partner([0, 1], 2, 2), None);
        assert_eq!(PiecePart::Blocked.partner([0, 0], 2, 2), None);
    }

    #[test]
    fn test_given_actions_cover_blocked_cells() {
        let mut state = TilingState::new(small_board());
        assert_eq!(state.given_actions(), vec![([0, 1], PiecePart::Blocked)]);
        replay_givens(&mut state);
        assert_eq!(state.get([0, 1]), Some(PiecePart::Blocked));
        assert_eq!(state.get([0, 0]), None);
    }

    #[test]
    fn test_apply_undo() {
        let mut state = TilingState::new(small_board());
        state.apply([0, 0], PiecePart::VerticalTop).unwrap();
        assert_eq!(state.get([0, 0]), Some(PiecePart::VerticalTop));
        assert_eq!(state.apply([0, 0], PiecePart::VerticalBottom), Err(ALREADY_FILLED));
        assert_eq!(state.apply([2, 0], PiecePart::VerticalTop), Err(OUT_OF_BOUNDS));
        assert_eq!(state.undo([0, 0], PiecePart::HorizontalLeft), Err(UNDO_MISMATCH));
        state.undo([0, 0], PiecePart::VerticalTop).unwrap();
        assert_eq!(state.get([0, 0]), None);
        assert_eq!(state.undo([0, 0], PiecePart::VerticalTop), Err(UNDO_EMPTY));
    }
}
