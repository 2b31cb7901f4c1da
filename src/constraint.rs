use std::fmt::Debug;
use crate::core::{ConstraintResult, DecisionGrid, Error, Index, State, Stateful, Value};

/// Constraints check that the puzzle state is valid. The ideal Constraint
/// will:
/// - Return early when it hits a Contradiction or Certainty.
/// - Be able to provide a useful explanation (for UI or debugging purposes)
///   for any contradictions.
/// - Be able to usefully narrow a full DecisionGrid when neither a
///   Contradiction nor a Certainty has been found.
/// - Keep its internal state updated by implementing Stateful so that the grid
///   computations are not costly.
///
/// However, it's acceptable to use this API for other use-cases as well:
/// 1. Some constraints may not be well-adapted to usefully updating the cells
///    in a DecisionGrid. In these cases, it's certainly legal to implement a
///    constraint that only ever returns a Contradiction (if found) or Ok
///    (otherwise). It just makes the solver's work more difficult.
/// 2. Sometimes you may have a deductive rule for determining the value of
///    cells that doesn't seem like a Constraint at all. It's fine to also
///    implement these as Constraints that only ever return a Certainty (if it
///    can be deduced) or Ok (otherwise).
pub trait Constraint<V: Value, S: State<V>> where Self: Stateful<V> + Debug {
    /// Check that the Constraint is satisfied by the puzzle (and any internal
    /// state from past actions). If a Constraint is able to infer useful
    /// information about what values a cell could take on, it should update
    /// the provided grid (in a way that further constrains it).
    fn check(&self, puzzle: &S, grid: &mut DecisionGrid<V>) -> ConstraintResult<V>;
    /// Provide debug information at a particular cell in the puzzle (if any
    /// is available).
    fn debug_at(&self, puzzle: &S, index: Index) -> Option<String>;
}

pub struct MultiConstraint<V: Value, S: State<V>> {
    constraints: Vec<Box<dyn Constraint<V, S>>>,
}

impl <V: Value, S: State<V>> MultiConstraint<V, S> {
    pub fn new(constraints: Vec<Box<dyn Constraint<V, S>>>) -> Self {
        MultiConstraint { constraints }
    }
}

impl <V: Value, S: State<V>> Debug for MultiConstraint<V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for c in &self.constraints {
            write!(f, "{:?}", c)?
        }
        Ok(())
    }
}

impl <V: Value, S: State<V>> Stateful<V> for MultiConstraint<V, S> {
    fn reset(&mut self) {
        for c in &mut self.constraints {
            c.reset();
        }
    }

    fn apply(&mut self, index: Index, value: V) -> Result<(), Error> {
        let mut res = Ok(());
        for c in &mut self.constraints {
            let maybe_err = c.apply(index, value);
            if maybe_err.is_err() {
                res = maybe_err;
            }
        }
        res
    }

    fn undo(&mut self, index: Index, value: V) -> Result<(), Error> {
        let mut res = Ok(());
        for c in &mut self.constraints {
            let maybe_err = c.undo(index, value);
            if maybe_err.is_err() {
                res = maybe_err;
            }
        }
        res
    }
}

impl <V: Value, S: State<V>> Constraint<V, S> for MultiConstraint<V, S> {
    fn check(&self, puzzle: &S, grid: &mut DecisionGrid<V>) -> ConstraintResult<V> {
        for c in &self.constraints {
            match c.check(puzzle, grid) {
                ConstraintResult::Contradiction(a) => return ConstraintResult::Contradiction(a),
                ConstraintResult::Certainty(d, a) => return ConstraintResult::Certainty(d, a),
                ConstraintResult::Ok => {},
            }
        }
        ConstraintResult::Ok
    }

    fn debug_at(&self, puzzle: &S, index: Index) -> Option<String> {
        let somes = self.constraints.iter()
            .filter_map(|c| c.debug_at(puzzle, index))
            .collect::<Vec<String>>();
        if somes.is_empty() {
            None
        } else {
            Some(somes.join("\n"))
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_util {
    use super::*;

    pub fn assert_contradiction<V: Value>(
        cr: ConstraintResult<V>,
        expected_attribution: &'static str,
    ) {
        if let ConstraintResult::Contradiction(a) = cr {
            let actual_attribution = a.name();
            assert_eq!(
                actual_attribution, expected_attribution,
                "Expected Contradiction to be attributed to {}; got {}",
                expected_attribution, actual_attribution,
            );
        } else {
            panic!("Expected a contradiction; got: {:?}", cr);
        }
    }

    pub fn assert_no_contradiction<V: Value>(
        cr: ConstraintResult<V>,
    ) {
        if let ConstraintResult::Contradiction(a) = cr {
            panic!("Expected no contradiction; got: {:}", a.name());
        }
    }
}
