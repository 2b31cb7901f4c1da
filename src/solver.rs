use std::fmt::Debug;
use crate::core::{singleton_set, Attribution, BranchPoint, ConstraintResult, DecisionGrid, Error, Index, State, Value, WithId};
use crate::constraint::Constraint;
use crate::ranker::Ranker;

#[derive(Debug, PartialEq, Clone, Copy, Eq)]
pub struct InitializingState {
    // The index is that of the most recently applied action (during the
    // initial stage when given actions are replayed).
    last_filled: Option<Index>,
    // The index into the vector of givens for the next given.
    next_given_index: usize,
}

#[derive(Debug, PartialEq, Clone, Copy, Eq)]
pub struct AdvancingState {
    // The number of possibilities at the BranchPoint where this advance was taken.
    pub possibilities: usize,
    // The step at which this advance was taken.
    pub step: usize,
}

#[derive(Debug, PartialEq, Clone, Copy, Eq)]
pub struct BacktrackingState {}

/// The state of the DFS solver. At any point in time, the solver is either
/// initializing (replaying given actions), advancing (ready to take a new
/// action), backtracking (undoing actions), solved (has found a solution), or
/// exhausted (no more actions to take).
#[derive(Debug, PartialEq, Clone, Copy, Eq)]
pub enum DfsSolverState {
    Initializing(InitializingState),
    Advancing(AdvancingState),
    Backtracking(BacktrackingState),
    InitializationFailed,
    Solved,
    Exhausted,
}

// A view on the state and associated data for the solver.
pub trait DfsSolverView<V, S, R, C>
where V: Value, S: State<V>, R: Ranker<V, S>, C: Constraint<V, S> {
    fn step_count(&self) -> usize;
    fn solver_state(&self) -> DfsSolverState;
    fn is_initializing(&self) -> bool;
    fn is_done(&self) -> bool;
    fn is_valid(&self) -> bool;
    fn most_recent_action(&self) -> Option<(Index, V)>;
    fn backtracked_steps(&self) -> Option<usize>;
    fn ranker(&self) -> &R;
    fn constraint(&self) -> &C;
    fn constraint_result(&self) -> ConstraintResult<V>;
    fn decision_grid(&self) -> Option<DecisionGrid<V>>;
    fn state(&self) -> &S;
}

// Mostly for debugging purposes, a StepObserver allows the caller of various
// solver methods to dump or otherwise inspect the state of the solver after
// each step. This is unlikely to be sufficient to write a fully fledged
// debugger (and certainly not sufficient for a UI), but when debugging failing
// tests, it is much easier to inject a StepObserver than it is to invert
// control and fully instrument the whole solving process.
pub trait StepObserver<V, S, R, C>
where V: Value, S: State<V>, R: Ranker<V, S>, C: Constraint<V, S> {
    fn after_step(&mut self, solver: &dyn DfsSolverView<V, S, R, C>);
}

pub const MANUAL_ATTRIBUTION: &str = "MANUAL_STEP";

/// DFS solver. If you want a lower-level API that allows for more control over
/// the solving process, you can directly use this. Most users should prefer
/// FindFirstSolution, which is a higher-level API. However, if you are
/// implementing a UI or debugging, this API may be useful.
pub struct DfsSolver<'a, V, S, R, C>
where V: Value, S: State<V>, R: Ranker<V, S>, C: Constraint<V, S> {
    step: usize,
    puzzle: &'a mut S,
    ranker: &'a R,
    constraint: &'a mut C,
    givens: Vec<(Index, V)>,
    check_result: ConstraintResult<V>,
    decision_grid: Option<DecisionGrid<V>>,
    next_decision: Option<BranchPoint<V>>,
    stack: Vec<BranchPoint<V>>,
    backtracked_steps: Option<usize>,
    manual_attr: Attribution<WithId>,
    state: DfsSolverState,
}

impl <'a, V, S, R, C> Debug for DfsSolver<'a, V, S, R, C>
where V: Value, S: State<V>, R: Ranker<V, S>, C: Constraint<V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "State:\n{:?}Constraint:\n{:?}\n", self.puzzle, self.constraint)
    }
}

impl <'a, V, S, R, C> DfsSolverView<V, S, R, C> for DfsSolver<'a, V, S, R, C>
where V: Value, S: State<V>, R: Ranker<V, S>, C: Constraint<V, S> {
    fn step_count(&self) -> usize {
        self.step
    }

    fn solver_state(&self) -> DfsSolverState {
        self.state
    }

    fn is_initializing(&self) -> bool {
        if let DfsSolverState::Initializing(_) = self.state {
            true
        } else {
            false
        }
    }

    fn is_done(&self) -> bool {
        match self.state {
            DfsSolverState::InitializationFailed | DfsSolverState::Solved | DfsSolverState::Exhausted => true,
            _ => false,
        }
    }

    fn is_valid(&self) -> bool {
        match self.check_result {
            ConstraintResult::Contradiction(_) => false,
            _ => true,
        }
    }

    fn most_recent_action(&self) -> Option<(Index, V)> {
        if let Some(b) = self.stack.last() {
            b.chosen()
        } else {
            match self.state {
                DfsSolverState::Initializing(InitializingState{ last_filled: Some(index), next_given_index: _ }) => {
                    Some((index, self.puzzle.get(index).unwrap()))
                },
                _ => None,
            }
        }
    }

    fn backtracked_steps(&self) -> Option<usize> { self.backtracked_steps }

    fn constraint(&self) -> &C {
        self.constraint
    }

    fn ranker(&self) -> &R {
        self.ranker
    }

    fn constraint_result(&self) -> ConstraintResult<V> {
        self.check_result.clone()
    }

    fn decision_grid(&self) -> Option<DecisionGrid<V>> {
        self.decision_grid.clone()
    }

    fn state(&self) -> &S {
        self.puzzle
    }
}

const NOT_INITIALIZED: Error = Error::new_const("Initialization not complete; can't apply actions yet");
const PUZZLE_ALREADY_DONE: Error = Error::new_const("Puzzle already done");
const NO_CHOICE: Error = Error::new_const("Decision point has no choice");

impl <'a, V, S, R, C> DfsSolver<'a, V, S, R, C>
where V: Value, S: State<V>, R: Ranker<V, S>, C: Constraint<V, S> {
    pub fn new(
        puzzle: &'a mut S,
        ranker: &'a R,
        constraint: &'a mut C,
    ) -> Self {
        let givens = puzzle.given_actions();
        DfsSolver {
            step: 0,
            puzzle,
            ranker,
            constraint,
            check_result: ConstraintResult::Ok,
            givens,
            decision_grid: None,
            next_decision: None,
            stack: Vec::new(),
            backtracked_steps: None,
            manual_attr: Attribution::new(MANUAL_ATTRIBUTION).unwrap(),
            state: DfsSolverState::Initializing(InitializingState { last_filled: None, next_given_index: 0 }),
        }
    }

    fn check_and_rank(&mut self) {
        let mut grid = DecisionGrid::full(self.puzzle.rows(), self.puzzle.cols());
        for r in 0..self.puzzle.rows() {
            for c in 0..self.puzzle.cols() {
                if let Some(v) = self.puzzle.get([r, c]) {
                    *grid.get_mut([r, c]) = singleton_set::<V>(v);
                }
            }
        }
        self.check_result = self.constraint.check(self.puzzle, &mut grid);
        let early_exit = if let ConstraintResult::Ok = self.check_result {
            self.check_result = self.ranker.to_constraint_result(&grid, self.puzzle);
            false
        } else {
            true
        };
        self.next_decision = match &self.check_result {
            ConstraintResult::Contradiction(_) => None,
            ConstraintResult::Certainty(d, a) => {
                Some(BranchPoint::unique(self.step+1, *a, d.index, d.value))
            },
            ConstraintResult::Ok => {
                Some(self.ranker.top(self.step+1, &grid, self.puzzle))
            },
        };
        self.decision_grid = if early_exit { None } else { Some(grid) };
    }

    fn apply(&mut self, decision: BranchPoint<V>) -> Result<(), Error> {
        if self.is_initializing() {
            return Err(NOT_INITIALIZED);
        } else if self.is_done() {
            return Err(PUZZLE_ALREADY_DONE);
        } else if decision.chosen().is_none() {
            return Err(NO_CHOICE);
        }
        {
            let (i, v) = decision.chosen().unwrap();
            self.puzzle.apply(i, v)?;
            if let Err(e) = self.constraint.apply(i, v) {
                self.puzzle.undo(i, v)?;
                return Err(e);
            }
        }
        let decision_width = decision.remaining() + 1;
        self.stack.push(decision);
        self.check_and_rank();
        self.state = if self.is_valid() {
            DfsSolverState::Advancing(AdvancingState {
                possibilities: decision_width,
                step: self.step,
            })
        } else {
            DfsSolverState::Backtracking(BacktrackingState {})
        };
        return Ok(());
    }

    fn unapply(&mut self, decision: &BranchPoint<V>) -> Result<(), Error> {
        let (i, v) = decision.chosen().unwrap();
        if let Err(e) = self.puzzle.undo(i, v) {
            self.constraint.undo(i, v)?;
            return Err(e);
        }
        self.constraint.undo(i, v)
    }

    /// The stack of BranchPoints.
    pub fn stack(&self) -> &Vec<BranchPoint<V>> { &self.stack }

    /// Overriding any logic the solver has, manually do a move.
    pub fn manual_step(&mut self, index: Index, value: V) -> Result<(), Error> {
        self.step += 1;
        self.apply(BranchPoint::unique(self.step, self.manual_attr, index, value))
    }

    /// Force the solver into the backtracking state.
    pub fn force_backtrack(&mut self) -> bool {
        if self.state == DfsSolverState::Exhausted {
            return false;
        }
        self.step += 1;
        self.state = DfsSolverState::Backtracking(BacktrackingState {});
        true
    }

    /// Undoes the previous action and applies the previous one from the same
    /// stack frame, if any. Unlike force_backtrack(), the solver will
    /// eventually revisit the state before retreat() was called. (Due to the
    /// way backtracking works, it may return immediately or take many steps to
    /// do so.) Returns false if there are no more actions to undo. Note that
    /// the step_count continues to increase.
    pub fn retreat(&mut self) -> Result<bool, Error> {
        self.step += 1;
        if self.stack.is_empty() {
            return Ok(false);
        }
        let mut decision = self.stack.pop().unwrap();
        self.unapply(&decision)?;
        if decision.retreat() {
            self.apply(decision)?;
        } else {
            self.check_and_rank();
            let decision_width = match self.stack.last() {
                Some(d) => d.remaining() + 1,
                None => 0,
            };
            self.state = if self.is_valid() {
                DfsSolverState::Advancing(AdvancingState {
                    possibilities: decision_width,
                    step: self.step,
                })
            } else {
                DfsSolverState::Backtracking(BacktrackingState {})
            };
        }
        Ok(true)
    }

    pub fn step(&mut self) -> Result<(), Error> {
        self.step += 1;
        match self.state {
            DfsSolverState::Initializing(state) => {
                // Make sure that check_and_rank gets called once regardless
                // of whether there are any actual givens to fill in.
                if state.last_filled.is_none() {
                    self.check_and_rank();
                }
                if state.next_given_index < self.givens.len() {
                    let (i, v) = self.givens[state.next_given_index];
                    self.puzzle.apply(i, v)?;
                    if let Err(e) = self.constraint.apply(i, v) {
                        self.puzzle.undo(i, v)?;
                        return Err(e);
                    }
                    self.check_and_rank();
                    self.state = if self.is_valid() {
                        DfsSolverState::Initializing(InitializingState {
                            last_filled: Some(i),
                            next_given_index: state.next_given_index + 1,
                        })
                    } else {
                        DfsSolverState::InitializationFailed
                    };
                } else if !self.is_valid() {
                    // A board can contradict before any given is placed.
                    self.state = DfsSolverState::InitializationFailed;
                } else {
                    self.state = DfsSolverState::Advancing(AdvancingState {
                        possibilities: 0,
                        step: self.step,
                    });
                    if self.decision_grid.is_none() {
                        self.decision_grid = Some(DecisionGrid::full(self.puzzle.rows(), self.puzzle.cols()));
                    }
                }
                Ok(())
            }
            DfsSolverState::InitializationFailed => Err(PUZZLE_ALREADY_DONE),
            DfsSolverState::Solved => Err(PUZZLE_ALREADY_DONE),
            DfsSolverState::Exhausted => Err(PUZZLE_ALREADY_DONE),
            DfsSolverState::Advancing(_) => {
                // Take a new action
                let decision = self.next_decision.as_ref().unwrap();
                if decision.chosen().is_some() {
                    self.apply(decision.clone())?;
                } else {
                    self.state = DfsSolverState::Solved;
                }
                self.backtracked_steps = None;
                Ok(())
            }
            DfsSolverState::Backtracking(_) => {
                if self.stack.is_empty() {
                    self.state = DfsSolverState::Exhausted;
                    self.backtracked_steps = Some(self.step);
                    return Ok(());
                }
                // Backtrack, attempting to advance an existing action set
                let mut decision = self.stack.pop().unwrap();
                self.backtracked_steps = Some(self.step - decision.branch_step);
                self.unapply(&decision)?;
                match decision.advance() {
                    Some(_) => {
                        self.apply(decision)?;
                        Ok(())
                    }
                    None => {
                        self.state = DfsSolverState::Backtracking(BacktrackingState {});
                        Ok(())
                    },
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.puzzle.reset();
        self.constraint.reset();
        self.check_result = ConstraintResult::Ok;
        self.decision_grid = None;
        self.stack.clear();
        self.state = DfsSolverState::Initializing(InitializingState { last_filled: None, next_given_index: 0 });
        self.step = 0;
        self.backtracked_steps = None;
    }
}

/// Find first solution to the puzzle using the given ranker and constraints.
pub struct FindFirstSolution<'a, V, S, R, C>
where V: Value, S: State<V>, R: Ranker<V, S>, C: Constraint<V, S> {
    solver: DfsSolver<'a, V, S, R, C>,
    observer: Option<&'a mut dyn StepObserver<V, S, R, C>>,
}

impl <'a, V, S, R, C> DfsSolverView<V, S, R, C> for FindFirstSolution<'a, V, S, R, C>
where V: Value, S: State<V>, R: Ranker<V, S>, C: Constraint<V, S> {
    fn step_count(&self) -> usize { self.solver.step_count() }
    fn solver_state(&self) -> DfsSolverState { self.solver.solver_state() }
    fn is_initializing(&self) -> bool { self.solver.is_initializing() }
    fn is_done(&self) -> bool { self.solver.is_done() }
    fn is_valid(&self) -> bool { self.solver.is_valid() }
    fn most_recent_action(&self) -> Option<(Index, V)> {
        self.solver.most_recent_action()
    }
    fn backtracked_steps(&self) -> Option<usize> { self.solver.backtracked_steps() }
    fn ranker(&self) -> &R {
        self.solver.ranker()
    }
    fn constraint(&self) -> &C {
        self.solver.constraint()
    }
    fn constraint_result(&self) -> ConstraintResult<V> {
        self.solver.constraint_result()
    }
    fn decision_grid(&self) -> Option<DecisionGrid<V>> {
        self.solver.decision_grid()
    }
    fn state(&self) -> &S { self.solver.state() }
}

impl <'a, V, S, R, C> FindFirstSolution<'a, V, S, R, C>
where V: Value, S: State<V>, R: Ranker<V, S>, C: Constraint<V, S> {
    pub fn new(
        puzzle: &'a mut S,
        ranker: &'a R,
        constraint: &'a mut C,
        observer: Option<&'a mut dyn StepObserver<V, S, R, C>>,
    ) -> Self {
        FindFirstSolution {
            solver: DfsSolver::new(puzzle, ranker, constraint),
            observer,
        }
    }

    pub fn step(&mut self) -> Result<&dyn DfsSolverView<V, S, R, C>, Error> {
        self.solver.step()?;
        Ok(&self.solver)
    }

    pub fn solve(&mut self) -> Result<Option<&dyn DfsSolverView<V, S, R, C>>, Error> {
        while !self.solver.is_done() {
            self.step()?;
            if let Some(observer) = &mut self.observer {
                observer.after_step(&self.solver);
            }
        }
        if self.solver.is_valid() {
            return Ok(Some(&self.solver));
        } else {
            return Ok(None);
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_util {
    use super::*;

    /// Replayer for a partially or wholly complete puzzle. This is helpful if
    /// you'd like to test a constraint and would prefer to specify the state
    /// as a set of givens, rather than as a sequence of actions.
    pub struct PuzzleReplay<'a, V, S, R, C>
    where V: Value, S: State<V>, R: Ranker<V, S>, C: Constraint<V, S> {
        solver: DfsSolver<'a, V, S, R, C>,
        observer: Option<&'a mut dyn StepObserver<V, S, R, C>>,
    }

    impl <'a, V, S, R, C> DfsSolverView<V, S, R, C> for PuzzleReplay<'a, V, S, R, C>
    where V: Value, S: State<V>, R: Ranker<V, S>, C: Constraint<V, S> {
        fn step_count(&self) -> usize { self.solver.step_count() }
        fn solver_state(&self) -> DfsSolverState { self.solver.solver_state() }
        fn is_initializing(&self) -> bool { self.solver.is_initializing() }
        fn is_done(&self) -> bool { self.solver.is_done() }
        fn is_valid(&self) -> bool { self.solver.is_valid() }
        fn most_recent_action(&self) -> Option<(Index, V)> {
            self.solver.most_recent_action()
        }
        fn backtracked_steps(&self) -> Option<usize> { self.solver.backtracked_steps() }
        fn ranker(&self) -> &R {
            self.solver.ranker()
        }
        fn constraint(&self) -> &C {
            self.solver.constraint()
        }
        fn constraint_result(&self) -> ConstraintResult<V> {
            self.solver.constraint_result()
        }
        fn decision_grid(&self) -> Option<DecisionGrid<V>> {
            self.solver.decision_grid()
        }
        fn state(&self) -> &S { self.solver.state() }
    }

    impl <'a, V, S, R, C> PuzzleReplay<'a, V, S, R, C>
    where V: Value, S: State<V>, R: Ranker<V, S>, C: Constraint<V, S> {
        pub fn new(
            puzzle: &'a mut S,
            ranker: &'a R,
            constraint: &'a mut C,
            observer: Option<&'a mut dyn StepObserver<V, S, R, C>>,
        ) -> Self {
            Self {
                solver: DfsSolver::new(puzzle, ranker, constraint),
                observer,
            }
        }

        pub fn step(&mut self) -> Result<&dyn DfsSolverView<V, S, R, C>, Error> {
            self.solver.step()?;
            Ok(&self.solver)
        }

        /// Replay all the given actions in the puzzle against a constraint
        /// and report the final ConstraintResult (or a contradiction if one
        /// is detected during the replay).
        pub fn replay(&mut self) -> Result<ConstraintResult<V>, Error> {
            while self.solver.is_initializing() {
                self.step()?;
                if let Some(observer) = &mut self.observer {
                    observer.after_step(&self.solver);
                }
                let result = self.solver.constraint_result();
                if let ConstraintResult::Contradiction(_) = result {
                    return Ok(result);
                }
            }
            return Ok(self.solver.constraint_result());
        }
    }
}

#[cfg(test)]
mod test {
    use crate::constraint::test_util::assert_contradiction;
    use crate::core::test_util::{OneDim, TestVal};
    use crate::core::{Attribution, Stateful};
    use crate::ranker::StdRanker;
    use super::*;

    // Adjacent cells must not hold the same digit.
    #[derive(Debug)]
    struct NoAdjacentSame;
    impl Stateful<TestVal> for NoAdjacentSame {}
    impl Constraint<TestVal, OneDim> for NoAdjacentSame {
        fn check(&self, puzzle: &OneDim, grid: &mut DecisionGrid<TestVal>) -> ConstraintResult<TestVal> {
            let n = puzzle.cols();
            for i in 0..n {
                if let Some(v) = puzzle.get([0, i]) {
                    if i + 1 < n && puzzle.get([0, i+1]) == Some(v) {
                        return ConstraintResult::Contradiction(Attribution::new("ADJ_SAME").unwrap());
                    }
                    if i > 0 && puzzle.get([0, i-1]).is_none() {
                        grid.get_mut([0, i-1]).remove(v.to_uval());
                    }
                    if i + 1 < n && puzzle.get([0, i+1]).is_none() {
                        grid.get_mut([0, i+1]).remove(v.to_uval());
                    }
                }
            }
            ConstraintResult::Ok
        }
        fn debug_at(&self, _: &OneDim, _: Index) -> Option<String> { None }
    }

    // Every cell must hold the given digit (used to make puzzles infeasible
    // or force givens-replay contradictions).
    #[derive(Debug)]
    struct AllEqual(u8);
    impl Stateful<TestVal> for AllEqual {}
    impl Constraint<TestVal, OneDim> for AllEqual {
        fn check(&self, puzzle: &OneDim, grid: &mut DecisionGrid<TestVal>) -> ConstraintResult<TestVal> {
            for i in 0..puzzle.cols() {
                if let Some(v) = puzzle.get([0, i]) {
                    if v.0 != self.0 {
                        return ConstraintResult::Contradiction(Attribution::new("NOT_EQUAL").unwrap());
                    }
                } else {
                    let s = grid.get_mut([0, i]);
                    for w in 1..=4 {
                        if w != self.0 {
                            s.remove(TestVal(w).to_uval());
                        }
                    }
                }
            }
            ConstraintResult::Ok
        }
        fn debug_at(&self, _: &OneDim, _: Index) -> Option<String> { None }
    }

    #[test]
    fn test_find_first_solution() -> Result<(), Error> {
        let mut puzzle = OneDim::new(4);
        let ranker = StdRanker::new();
        let mut constraint = NoAdjacentSame;
        let mut finder = FindFirstSolution::new(&mut puzzle, &ranker, &mut constraint, None);
        let maybe_solution = finder.solve()?;
        assert!(maybe_solution.is_some());
        // Lowest digits win at every branch.
        assert_eq!(maybe_solution.unwrap().state().to_string(), "1212");
        Ok(())
    }

    #[test]
    fn test_solve_is_deterministic() -> Result<(), Error> {
        let solve_once = || -> Result<String, Error> {
            let mut puzzle = OneDim::new(6);
            let ranker = StdRanker::new();
            let mut constraint = NoAdjacentSame;
            let mut finder = FindFirstSolution::new(&mut puzzle, &ranker, &mut constraint, None);
            let maybe_solution = finder.solve()?;
            Ok(maybe_solution.unwrap().state().to_string())
        };
        assert_eq!(solve_once()?, solve_once()?);
        Ok(())
    }

    #[test]
    fn test_exhaustion() -> Result<(), Error> {
        // Cells must all be 1s but also may not have adjacent duplicates.
        let mut puzzle = OneDim::new(2);
        let ranker = StdRanker::new();
        let mut constraint = crate::constraint::MultiConstraint::new(vec_box::vec_box![
            NoAdjacentSame, AllEqual(1),
        ]);
        let mut finder = FindFirstSolution::new(&mut puzzle, &ranker, &mut constraint, None);
        let maybe_solution = finder.solve()?;
        assert!(maybe_solution.is_none());
        assert_eq!(finder.solver_state(), DfsSolverState::Exhausted);
        Ok(())
    }

    #[test]
    fn test_givens_replay() -> Result<(), Error> {
        // A state with a given action baked in.
        #[derive(Debug, Clone)]
        struct WithGiven(OneDim);
        impl Stateful<TestVal> for WithGiven {
            fn reset(&mut self) { self.0.reset() }
            fn apply(&mut self, i: Index, v: TestVal) -> Result<(), Error> { self.0.apply(i, v) }
            fn undo(&mut self, i: Index, v: TestVal) -> Result<(), Error> { self.0.undo(i, v) }
        }
        impl State<TestVal> for WithGiven {
            fn rows(&self) -> usize { 1 }
            fn cols(&self) -> usize { self.0.cols() }
            fn get(&self, index: Index) -> Option<TestVal> { self.0.get(index) }
            fn given_actions(&self) -> Vec<(Index, TestVal)> { vec![([0, 0], TestVal(2))] }
        }
        #[derive(Debug)]
        struct Wrapped(NoAdjacentSame);
        impl Stateful<TestVal> for Wrapped {}
        impl Constraint<TestVal, WithGiven> for Wrapped {
            fn check(&self, puzzle: &WithGiven, grid: &mut DecisionGrid<TestVal>) -> ConstraintResult<TestVal> {
                self.0.check(&puzzle.0, grid)
            }
            fn debug_at(&self, _: &WithGiven, _: Index) -> Option<String> { None }
        }
        let mut puzzle = WithGiven(OneDim::new(3));
        let ranker = StdRanker::new();
        let mut constraint = Wrapped(NoAdjacentSame);
        let mut finder = FindFirstSolution::new(&mut puzzle, &ranker, &mut constraint, None);
        let maybe_solution = finder.solve()?;
        assert!(maybe_solution.is_some());
        // The given 2 in the first cell survives into the solution.
        assert_eq!(maybe_solution.unwrap().state().0.to_string(), "212");
        Ok(())
    }

    #[test]
    fn test_initialization_failure() -> Result<(), Error> {
        #[derive(Debug, Clone)]
        struct BadGiven(OneDim);
        impl Stateful<TestVal> for BadGiven {
            fn apply(&mut self, i: Index, v: TestVal) -> Result<(), Error> { self.0.apply(i, v) }
            fn undo(&mut self, i: Index, v: TestVal) -> Result<(), Error> { self.0.undo(i, v) }
        }
        impl State<TestVal> for BadGiven {
            fn rows(&self) -> usize { 1 }
            fn cols(&self) -> usize { self.0.cols() }
            fn get(&self, index: Index) -> Option<TestVal> { self.0.get(index) }
            fn given_actions(&self) -> Vec<(Index, TestVal)> { vec![([0, 0], TestVal(3))] }
        }
        #[derive(Debug)]
        struct WrappedEq(AllEqual);
        impl Stateful<TestVal> for WrappedEq {}
        impl Constraint<TestVal, BadGiven> for WrappedEq {
            fn check(&self, puzzle: &BadGiven, grid: &mut DecisionGrid<TestVal>) -> ConstraintResult<TestVal> {
                self.0.check(&puzzle.0, grid)
            }
            fn debug_at(&self, _: &BadGiven, _: Index) -> Option<String> { None }
        }
        let mut puzzle = BadGiven(OneDim::new(2));
        let ranker = StdRanker::new();
        let mut constraint = WrappedEq(AllEqual(1));
        let mut finder = FindFirstSolution::new(&mut puzzle, &ranker, &mut constraint, None);
        let maybe_solution = finder.solve()?;
        assert!(maybe_solution.is_none());
        assert_eq!(finder.solver_state(), DfsSolverState::InitializationFailed);
        Ok(())
    }

    #[test]
    fn test_manual_step_overrides_search() -> Result<(), Error> {
        let mut puzzle = OneDim::new(3);
        let ranker = StdRanker::new();
        let mut constraint = NoAdjacentSame;
        let mut solver = DfsSolver::new(&mut puzzle, &ranker, &mut constraint);
        // Moves can't be injected while the solver is still initializing.
        assert!(solver.manual_step([0, 1], TestVal(4)).is_err());
        solver.step()?;
        assert!(!solver.is_initializing());
        solver.manual_step([0, 1], TestVal(4))?;
        assert_eq!(solver.most_recent_action(), Some(([0, 1], TestVal(4))));
        while !solver.is_done() {
            solver.step()?;
        }
        assert!(solver.is_valid());
        // The injected 4 survives; the neighbors fall to the lowest digits.
        assert_eq!(puzzle.to_string(), "141");
        Ok(())
    }

    #[test]
    fn test_force_backtrack_tries_next_candidate() -> Result<(), Error> {
        let mut puzzle = OneDim::new(4);
        let ranker = StdRanker::new();
        let mut constraint = NoAdjacentSame;
        let mut solver = DfsSolver::new(&mut puzzle, &ranker, &mut constraint);
        solver.step()?;
        solver.step()?;
        assert_eq!(solver.most_recent_action(), Some(([0, 0], TestVal(1))));
        // Rejecting the first branch makes the solver take the second.
        assert!(solver.force_backtrack());
        while !solver.is_done() {
            solver.step()?;
        }
        assert!(solver.is_valid());
        assert_eq!(puzzle.to_string(), "2121");
        Ok(())
    }

    #[test]
    fn test_replay_reports_contradiction() -> Result<(), Error> {
        let mut puzzle = OneDim::new(3);
        puzzle.apply([0, 0], TestVal(1))?;
        puzzle.apply([0, 1], TestVal(1))?;
        let ranker = StdRanker::new();
        let mut constraint = NoAdjacentSame;
        let result = test_util::PuzzleReplay::new(&mut puzzle, &ranker, &mut constraint, None)
            .replay()?;
        assert_contradiction(result, "ADJ_SAME");
        Ok(())
    }

    #[test]
    fn test_retreat_revisits_state() -> Result<(), Error> {
        // First runthrough to collect the solution.
        let expected_solution = {
            let mut puzzle = OneDim::new(5);
            let ranker = StdRanker::new();
            let mut constraint = NoAdjacentSame;
            let mut solver = DfsSolver::new(&mut puzzle, &ranker, &mut constraint);
            while !solver.is_done() {
                solver.step()?;
            }
            assert!(solver.is_valid());
            puzzle.to_string()
        };
        // Next runthrough does a retreat every once in a while.
        let actual_solution = {
            let mut puzzle = OneDim::new(5);
            let ranker = StdRanker::new();
            let mut constraint = NoAdjacentSame;
            let mut i = 1;
            let mut solver = DfsSolver::new(&mut puzzle, &ranker, &mut constraint);
            while !solver.is_done() {
                if i % 5 == 0 && !solver.is_initializing() {
                    solver.retreat()?;
                } else {
                    solver.step()?;
                }
                i += 1;
            }
            puzzle.to_string()
        };
        assert_eq!(actual_solution, expected_solution);
        Ok(())
    }
}
