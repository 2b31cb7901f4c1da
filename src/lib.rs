pub mod core;
pub mod constraint;
pub mod ranker;
pub mod solver;
pub mod debug;
pub mod board;
pub mod pieces;
pub mod placement;
pub mod sums;
pub mod solve;
