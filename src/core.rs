use std::collections::HashMap;
use std::sync::Mutex;
use std::{borrow::Cow, marker::PhantomData};
use std::fmt::{Debug, Display};
use bit_set::BitSet;
use num::{PrimInt, Unsigned};

/// Error type. This is used to indicate something wrong with either the
/// puzzle/constraints or with the algorithm itself. Violations of constraints
/// or exhaustion of the search space are not errors.
#[derive(Debug, Clone, PartialEq)]
pub struct Error(Cow<'static, str>);
impl Error {
    pub const fn new_const(s: &'static str) -> Self {
        Error(Cow::Borrowed(s))
    }

    pub fn new<S: Into<String>>(s: S) -> Self {
        Error(Cow::Owned(s.into()))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Puzzles are made up of a grid of cells, each of which has some value drawn
/// from a finite set of possible values. Indices are [row, col].
pub type Index = [usize; 2];

pub trait GridIndex {
    // Is the index still valid or has it gone off the end of the grid?
    fn in_bounds(&self, rows: usize, cols: usize) -> bool;
    // Increment the index (supposing a grid of given dimensions).
    fn increment(&mut self, rows: usize, cols: usize);
}

impl GridIndex for Index {
    fn in_bounds(&self, rows: usize, cols: usize) -> bool {
        self[0] < rows && self[1] < cols
    }

    fn increment(&mut self, rows: usize, cols: usize) {
        let _ = rows;
        self[1] += 1;
        if self[1] >= cols {
            self[1] = 0;
            self[0] += 1;
        }
    }
}

pub trait UInt: PrimInt + Unsigned + TryInto<usize> + Debug {
    fn from_usize(u: usize) -> Self;
    fn as_usize(&self) -> usize;
}
impl UInt for u8 {
    fn from_usize(u: usize) -> Self { u.try_into().unwrap() }
    fn as_usize(&self) -> usize { *self as usize }
}
impl UInt for u16 {
    fn from_usize(u: usize) -> Self { u.try_into().unwrap() }
    fn as_usize(&self) -> usize { *self as usize }
}
impl UInt for u32 {
    fn from_usize(u: usize) -> Self { u.try_into().unwrap() }
    fn as_usize(&self) -> usize { *self as usize }
}

// Values in puzzles are implementation dependent, but they must be convertible
// to and from an unsigned integer type that ranges over some known (and small)
// cardinality. Instead of directly exposing UInts, we use a wrapper to avoid
// accidental misuse: These aren't the values you're looking for! They are just
// for containers that need to store them!
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UVWrapped;
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UVUnwrapped;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UVal<U: UInt, S> {
    u: U,
    _state: PhantomData<S>,
}

impl <U: UInt> UVal<U, UVWrapped> {
    pub fn new(v: U) -> Self {
        UVal { u: v, _state: PhantomData }
    }

    pub(self) fn unwrap(self) -> UVal<U, UVUnwrapped> {
        UVal { u: self.u, _state: PhantomData }
    }
}

impl <U: UInt> UVal<U, UVUnwrapped> {
    pub fn value(&self) -> U {
        self.u
    }
}

/// Values in puzzles are drawn from a finite set of possible values. They are
/// represented as unsigned integers, but it's entirely up to the Value, State,
/// and Constraint implementations to interpret them.
pub trait Value: Copy + Clone + Display + Debug + PartialEq + Eq {
    type U: UInt;

    fn cardinality() -> usize;
    fn possibilities() -> Vec<Self>;
    fn nth(ord: usize) -> Self;
    fn parse(s: &str) -> Result<Self, Error>;

    fn ordinal(&self) -> usize;
    fn from_uval(u: UVal<Self::U, UVUnwrapped>) -> Self;
    fn to_uval(self) -> UVal<Self::U, UVWrapped>;
}

/// This is the underlying grid structure for a puzzle.
#[derive(Debug, Clone, PartialEq)]
pub struct UVGrid<U: UInt> {
    rows: usize,
    cols: usize,
    grid: Box<[Option<U>]>,
}

impl<U: UInt> UVGrid<U> {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            grid: vec![None; rows * cols].into_boxed_slice(),
        }
    }

    pub fn get(&self, index: Index) -> Option<UVal<U, UVWrapped>> {
        self.grid[index[0] * self.cols + index[1]].map(|v| UVal::new(v))
    }

    pub fn set(&mut self, index: Index, value: Option<UVal<U, UVWrapped>>) {
        self.grid[index[0] * self.cols + index[1]] = value.map(|v| v.unwrap().value());
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }
}

/// This a set of values (e.g., that are possible, that have been seen, etc.).
/// They are represented as a bitset of the possible values.
#[derive(Debug, Clone, PartialEq)]
pub struct UVSet<U: UInt> {
    s: BitSet,
    _marker: PhantomData<U>,
}

pub fn empty_set<V: Value>() -> UVSet<V::U> {
    UVSet {
        s: BitSet::with_capacity(V::cardinality()),
        _marker: PhantomData,
    }
}

fn leading_ones(n: usize) -> Vec<u8> {
    let full = n / 8;
    let remaining = n % 8;
    let mut result = vec![u8::MAX; full];
    if remaining > 0 {
        result.push(u8::MAX << (8 - remaining));
    }
    result
}

pub fn full_set<V: Value>() -> UVSet<V::U> {
    let n = V::cardinality();
    let mut s = UVSet {
        s: BitSet::with_capacity(n),
        _marker: PhantomData,
    };
    let ones = leading_ones(n);
    s.s.union_with(&BitSet::from_bytes(ones.as_slice()));
    s
}

pub fn pack_values<V: Value>(vals: &Vec<V>) -> UVSet<V::U> {
    let mut res = empty_set::<V>();
    for v in vals {
        res.insert(v.to_uval());
    }
    res
}

pub fn singleton_set<V: Value>(v: V) -> UVSet<V::U> {
    let mut s = empty_set::<V>();
    s.insert(v.to_uval());
    s
}

pub fn unpack_values<V: Value>(s: &UVSet<V::U>) -> Vec<V> {
    s.iter().map(|u| { to_value::<V>(u) }).collect::<Vec<_>>()
}

pub fn unpack_singleton<V: Value>(s: &UVSet<V::U>) -> Option<V> {
    if s.len() == 1 {
        Some(to_value::<V>(s.iter().next().unwrap()))
    } else {
        None
    }
}

pub fn unpack_first<V: Value>(s: &UVSet<V::U>) -> Option<V> {
    s.iter().next().map(|uv| to_value::<V>(uv))
}

impl <U: UInt> UVSet<U> {
    pub fn insert(&mut self, value: UVal<U, UVWrapped>) {
        self.s.insert(value.unwrap().value().as_usize());
    }

    pub fn remove(&mut self, value: UVal<U, UVWrapped>) {
        self.s.remove(value.unwrap().value().as_usize());
    }

    pub fn contains(&self, value: UVal<U, UVWrapped>) -> bool {
        self.s.contains(value.unwrap().value().as_usize())
    }

    pub fn is_empty(&self) -> bool {
        self.s.is_empty()
    }

    pub fn len(&self) -> usize {
        self.s.len()
    }

    pub fn clear(&mut self) {
        self.s.clear();
    }

    pub fn iter<'a>(&'a self) -> impl Iterator<Item = UVal<U, UVWrapped>> + 'a {
        self.s.iter().map(|i| UVal::new(U::from_usize(i)))
    }

    pub fn intersect_with(&mut self, other: &UVSet<U>) {
        self.s.intersect_with(&other.s);
    }
}

struct ConstStringRegistry {
    mapping: HashMap<&'static str, usize>,
    next_id: usize,
}

impl ConstStringRegistry {
    pub fn new() -> Self { Self { mapping: HashMap::new(), next_id: 0 } }
    pub fn register(&mut self, name: &'static str) -> usize {
        if let Some(id) = self.mapping.get(name) {
            *id
        } else {
            let id = self.next_id;
            self.mapping.insert(name, id);
            self.next_id += 1;
            id
        }
    }
    pub fn name(&self, id: usize) -> Option<&'static str> {
        for (name, registered_id) in self.mapping.iter() {
            if *registered_id == id {
                return Some(name);
            }
        }
        None
    }
}

/// Marker structs to indicate whether a compile-time string has already been
/// interned (or normalized to its usize representation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaybeId;
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithId;

lazy_static::lazy_static! {
    static ref ATTRIBUTION_REGISTRY: Mutex<ConstStringRegistry> = {
        Mutex::new(ConstStringRegistry::new())
    };
}

// NOTE: This is an expensive operation, so only use it for human-interface
// purposes (e.g., debugging, logging, etc.) and not during the solving process.
pub fn readable_attribution(id: usize) -> Option<Attribution<WithId>> {
    let registry = ATTRIBUTION_REGISTRY.lock().unwrap();
    registry.name(id).map(|name| {
        Attribution { name, id: Some(id), _state: PhantomData }
    })
}

/// A label explaining where a contradiction, certainty, or branch decision
/// came from. Attributions are compile-time strings, interned so that they
/// are cheap to copy around during the solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribution<S> {
    name: &'static str,
    id: Option<usize>,
    _state: PhantomData<S>,
}

impl <S> Attribution<S> {
    pub fn name(&self) -> &'static str { self.name }
}

impl Attribution<MaybeId> {
    // Attributions are lazily initialized; the id is set when first used.
    pub fn new(name: &'static str) -> Self {
        Attribution { name, id: None, _state: PhantomData }
    }

    pub fn unwrap(&mut self) -> Attribution<WithId> {
        if let Some(id) = self.id {
            Attribution { name: self.name, id: Some(id), _state: PhantomData }
        } else {
            let id = ATTRIBUTION_REGISTRY.lock().unwrap().register(self.name);
            self.id = Some(id);
            Attribution { name: self.name, id: Some(id), _state: PhantomData }
        }
    }
}

impl Attribution<WithId> {
    pub fn id(&self) -> usize { self.id.unwrap() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertainDecision<V: Value> {
    pub index: Index,
    pub value: V,
}

impl <V: Value> CertainDecision<V> {
    pub fn new(index: Index, value: V) -> Self {
        Self { index, value }
    }
}

/// Constraints and ranking both may return early if they hit upon either a
/// contradiction or a certainty. This is a simple enum to represent this
/// short-circuiting.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintResult<V: Value> {
    Contradiction(Attribution<WithId>),
    Certainty(CertainDecision<V>, Attribution<WithId>),
    Ok,
}

/// When choosing to branch, we can either try all the possible values for a
/// particular cell, or we can try all possible cells for a particular value.
#[derive(Debug, Clone)]
pub enum BranchOver<V: Value> {
    Empty,
    Cell(Index, Vec<V>, usize),
    Value(V, Vec<Index>, usize),
}

/// A decision point in the puzzle. This includes the specific value that was
/// chosen, as well as the index of the cell that was modified, as well as the
/// alternative values/indices that have not been tried yet.
#[derive(Debug, Clone)]
pub struct BranchPoint<V: Value> {
    pub branch_step: usize,
    pub branch_attribution: Attribution<WithId>,
    pub choices: BranchOver<V>,
}

impl <V: Value> BranchPoint<V> {
    pub fn unique(step: usize, attribution: Attribution<WithId>, index: Index, value: V) -> Self {
        Self::for_cell(step, attribution, index, vec![value])
    }

    pub fn empty(step: usize, attribution: Attribution<WithId>) -> Self {
        BranchPoint { branch_step: step, branch_attribution: attribution, choices: BranchOver::Empty }
    }

    pub fn for_cell(step: usize, attribution: Attribution<WithId>, index: Index, values: Vec<V>) -> Self {
        if values.len() > 0 {
            BranchPoint {
                branch_step: step,
                branch_attribution: attribution,
                choices: BranchOver::Cell(index, values, 0),
            }
        } else {
            panic!("Cannot create a BranchPoint for a cell with no values");
        }
    }

    pub fn for_value(step: usize, attribution: Attribution<WithId>, val: V, cells: Vec<Index>) -> Self {
        if cells.len() > 0 {
            BranchPoint {
                branch_step: step,
                branch_attribution: attribution,
                choices: BranchOver::Value(val, cells, 0),
            }
        } else {
            panic!("Cannot create a BranchPoint for a value with no cells");
        }
    }

    pub fn chosen(&self) -> Option<(Index, V)> {
        match &self.choices {
            BranchOver::Empty => None,
            BranchOver::Cell(c, vs, i) => Some((*c, vs[*i])),
            BranchOver::Value(v, cs, i) => Some((cs[*i], *v)),
        }
    }

    pub fn remaining(&self) -> usize {
        match &self.choices {
            BranchOver::Empty => 0,
            BranchOver::Cell(_, vs, i) => vs.len() - 1 - i,
            BranchOver::Value(_, cs, i) => cs.len() - 1 - i,
        }
    }

    pub fn advance(&mut self) -> Option<(Index, V)> {
        match &mut self.choices {
            BranchOver::Empty => None,
            BranchOver::Cell(cell, values, i) => {
                if *i < values.len() - 1 {
                    *i += 1;
                    Some((*cell, values[*i]))
                } else {
                    None
                }
            },
            BranchOver::Value(val, cells, i) => {
                if *i < cells.len() - 1 {
                    *i += 1;
                    Some((cells[*i], *val))
                } else {
                    None
                }
            },
        }
    }

    // Opposite of advance. Returns true if this decision should be re-applied,
    // or false if it should be left off the stack.
    pub fn retreat(&mut self) -> bool {
        match &mut self.choices {
            BranchOver::Empty => false,
            BranchOver::Cell(_, _, i) | BranchOver::Value(_, _, i) => {
                if *i == 0 {
                    false
                } else {
                    *i -= 1;
                    true
                }
            },
        }
    }
}

/// This is a grid of UVSets. It is used to represent the not-yet-ruled-out
/// values for each cell in the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionGrid<V: Value> {
    rows: usize,
    cols: usize,
    grid: Box<[UVSet<V::U>]>,
    _marker: PhantomData<V>,
}

impl<V: Value> DecisionGrid<V> {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            grid: vec![empty_set::<V>(); rows * cols].into_boxed_slice(),
            _marker: PhantomData,
        }
    }

    pub fn full(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            grid: vec![full_set::<V>(); rows * cols].into_boxed_slice(),
            _marker: PhantomData,
        }
    }

    pub fn get(&self, index: Index) -> &UVSet<V::U> {
        &self.grid[index[0] * self.cols + index[1]]
    }

    pub fn get_mut(&mut self, index: Index) -> &mut UVSet<V::U> {
        self.grid.get_mut(index[0] * self.cols + index[1]).unwrap()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }
}

/// This converts an extracted item from a container to a Value, making use of
/// the private API to do so.
pub fn to_value<V: Value>(u: UVal<V::U, UVWrapped>) -> V {
    V::from_uval(u.unwrap())
}

/// The puzzle itself as well as other components can be stateful (i.e., they
/// respond to changes in the grid). The trait provides a default do-nothing
/// implementation so that non-stateful components that are required to be
/// stateful for some reason can be trivially stateful.
pub trait Stateful<V: Value> {
    fn reset(&mut self) {}
    fn apply(&mut self, index: Index, value: V) -> Result<(), Error> {
        let _ = index;
        let _ = value;
        Ok(())
    }
    fn undo(&mut self, index: Index, value: V) -> Result<(), Error> {
        let _ = index;
        let _ = value;
        Ok(())
    }
}

/// Trait for representing whatever puzzle is being solved in its current state
/// of being (partially) filled in. Ultimately this is just wrapping a UVGrid,
/// but it may impose additional meanings on the values of the grid. Dimensions
/// are runtime properties; boards come from user input, not from the type.
pub trait State<V: Value> where Self: Clone + Debug + Stateful<V> {
    fn rows(&self) -> usize;
    fn cols(&self) -> usize;
    fn get(&self, index: Index) -> Option<V>;
    fn given_actions(&self) -> Vec<(Index, V)>;
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_util {
    use super::*;

    /// Values for use in testing: the digits 1 through 4.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct TestVal(pub u8);
    impl Display for TestVal {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }
    impl Value for TestVal {
        type U = u8;
        fn parse(s: &str) -> Result<Self, Error> {
            match s.parse::<u8>() {
                Ok(u) if (1..=4).contains(&u) => Ok(Self(u)),
                _ => Err(Error::new_const("not a digit in 1..=4")),
            }
        }
        fn cardinality() -> usize { 4 }
        fn possibilities() -> Vec<Self> { (1..=4).map(TestVal).collect() }
        fn nth(ord: usize) -> TestVal { TestVal((ord as u8)+1) }
        fn ordinal(&self) -> usize { self.0 as usize - 1 }
        fn from_uval(u: UVal<u8, UVUnwrapped>) -> Self { TestVal(u.value()+1) }
        fn to_uval(self) -> UVal<u8, UVWrapped> { UVal::new(self.0-1) }
    }

    /// Trivial one-row grid of TestVals.
    #[derive(Debug, Clone)]
    pub struct OneDim {
        pub grid: UVGrid<u8>,
    }
    impl OneDim {
        pub fn new(n: usize) -> Self { Self { grid: UVGrid::new(1, n) } }
        pub fn to_string(&self) -> String {
            (0..self.grid.cols()).map(|i| {
                if let Some(v) = self.get([0, i]) {
                    format!("{}", v.0)
                } else {
                    ".".to_string()
                }
            }).collect::<Vec<_>>().join("")
        }
    }
    impl Stateful<TestVal> for OneDim {
        fn reset(&mut self) { self.grid = UVGrid::new(1, self.grid.cols()); }
        fn apply(&mut self, index: Index, value: TestVal) -> Result<(), Error> {
            self.grid.set(index, Some(value.to_uval()));
            Ok(())
        }
        fn undo(&mut self, index: Index, _: TestVal) -> Result<(), Error> {
            self.grid.set(index, None);
            Ok(())
        }
    }
    impl State<TestVal> for OneDim {
        fn rows(&self) -> usize { 1 }
        fn cols(&self) -> usize { self.grid.cols() }
        fn get(&self, index: Index) -> Option<TestVal> { self.grid.get(index).map(to_value) }
        fn given_actions(&self) -> Vec<(Index, TestVal)> { vec![] }
    }

    /// Unwrapping UVals is private to the core module, but it's valuable to
    /// check that the to_uval/from_uval methods successfully round-trip values.
    pub fn round_trip_value<V: Value>(v: V) -> V {
        let u: UVal<V::U, UVWrapped> = v.to_uval();
        V::from_uval(u.unwrap())
    }

    /// Most of the time, you can just rely on the solver to replay given
    /// actions, but for tests, you may want to construct a state and check
    /// that the givens are right.
    pub fn replay_givens<V: Value, S: State<V>>(state: &mut S) {
        for (i, v) in state.given_actions() {
            state.apply(i, v).unwrap();
        }
    }
}
