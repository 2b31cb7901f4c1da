use domino_sums_dfs::board::Board;
use domino_sums_dfs::debug::{DbgObserver, Sample};
use domino_sums_dfs::pieces::{PiecePart, TilingState};
use domino_sums_dfs::solve::solve_with_observer;

// A 6x6 pip-sum grid with four blocked cells. Dominoes are laid so that the
// top half of each vertical piece counts 1 and the right half of each
// horizontal piece counts 2 toward its row and column.
fn main() {
    let board = Board::new(
        6, 6,
        vec![[0, 3], [1, 1], [3, 4], [4, 2]],
        vec![5, 4, 2, 3, 4, 6],
        vec![2, 5, 3, 5, 3, 6],
    ).expect("well-formed board");
    let mut obs = DbgObserver::<PiecePart, TilingState>::new();
    obs.sample_print(Sample::every_n(100)).sample_stats(Sample::at_end());
    match solve_with_observer(&board, Some(&mut obs)) {
        Ok(labeling) => {
            println!("Found a tiling:\n{}", labeling);
        },
        Err(e) => {
            println!("No tiling: {}", e);
        },
    }
    obs.dump_stats();
}
