//! Branch-and-bound block pruning.
//!
//! A block is prunable once the best score any alignment could still reach by
//! extending through it cannot beat the best score already known. Two
//! strategies share the same bound:
//!
//! * [`GenericPruning`] keeps an `(height + 1) x (width + 1)` mark table and
//!   works with any block scheduling order.
//! * [`DiagonalPruning`] keeps a single window of live blocks and requires
//!   wavefront (anti-diagonal) scheduling.
//!
//! Pruners are not internally synchronized. The manager owns its pruner behind
//! one lock, so block-completion callbacks are serialized against the pruning
//! state of a grid.

pub mod diagonal;
pub mod generic;

pub use diagonal::DiagonalPruning;
pub use generic::GenericPruning;

use crate::grid::Grid;
use crate::matrix::ScoreRecord;
use crate::partition::Partition;
use crate::scores::{RecurrenceMode, Score, ScoreParams, NEG_INF};

pub trait BlockPruning: Send {
    /// Attaches a grid; all internal pruning state is cleared.
    fn set_grid(&mut self, grid: &Grid);

    /// Region whose far corner bounds every extension (usually the whole matrix).
    fn set_super_partition(&mut self, partition: Partition);

    fn set_score_params(&mut self, params: ScoreParams, mode: RecurrenceMode);

    /// Whether the partition's first row and column carry no live score, which
    /// holds for the zero boundaries of a local alignment.
    fn set_border_prunable(&mut self, prunable: bool);

    /// Raises the best score from outside knowledge (e.g. a goal score).
    fn update_best_score(&mut self, score: Score);

    fn best_score(&self) -> Score;

    /// Records the best cell of a computed block.
    fn update_pruning_state(&mut self, bx: usize, by: usize, record: ScoreRecord);

    /// Whether block `(bx, by)` may be skipped. A skipped block counts as pruned
    /// from then on.
    fn is_block_pruned(&mut self, bx: usize, by: usize) -> bool;

    /// Blocks reported as pruned since the grid was attached.
    fn pruned_blocks(&self) -> usize;
}

/// Which pruning strategy a manager installs.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum PruningStrategy {
    None,
    Generic,
    Diagonal
}

impl PruningStrategy {
    pub fn build(&self) -> Option<Box<dyn BlockPruning>> {
        match self {
            PruningStrategy::None => None,
            PruningStrategy::Generic => Some(Box::new(GenericPruning::new())),
            PruningStrategy::Diagonal => Some(Box::new(DiagonalPruning::new()))
        }
    }
}

/// Bound shared by both strategies.
#[derive(Debug, Clone)]
pub struct PruningBounds {
    grid: Option<Grid>,
    super_partition: Option<Partition>,
    params: Option<ScoreParams>,
    mode: RecurrenceMode,
    best: Score,
    border_prunable: bool
}

impl Default for PruningBounds {
    fn default() -> Self {
        Self {
            grid: None,
            super_partition: None,
            params: None,
            mode: RecurrenceMode::Local,
            best: NEG_INF,
            border_prunable: false
        }
    }
}

impl PruningBounds {
    pub fn set_grid(&mut self, grid: &Grid) {
        self.grid = Some(grid.clone());
    }

    pub fn set_super_partition(&mut self, partition: Partition) {
        self.super_partition = Some(partition);
    }

    pub fn set_score_params(&mut self, params: ScoreParams, mode: RecurrenceMode) {
        self.params = Some(params);
        self.mode = mode;
    }

    pub fn set_border_prunable(&mut self, prunable: bool) {
        self.border_prunable = prunable;
    }

    #[inline(always)]
    pub fn border_prunable(&self) -> bool {
        self.border_prunable
    }

    #[inline(always)]
    pub fn best(&self) -> Score {
        self.best
    }

    pub fn raise_best(&mut self, score: Score) {
        self.best = self.best.max(score);
    }

    pub fn grid(&self) -> Option<&Grid> {
        self.grid.as_ref()
    }

    fn far_corner(&self) -> Option<(usize, usize)> {
        let p = match (&self.super_partition, &self.grid) {
            (Some(p), _) => p,
            (None, Some(g)) => g.partition(),
            (None, None) => return None
        };
        Some((p.i1(), p.j1()))
    }

    /// Folds a dispatched block score into the best score.
    ///
    /// In local mode the best is the score itself. In global mode the best is
    /// a guaranteed final score: the record's cell completed to the far corner
    /// either diagonally through mismatches plus one gap run, or purely through
    /// gaps, whichever is better.
    pub fn observe(&mut self, record: &ScoreRecord) {
        let params = match self.params {
            Some(p) => p,
            None => return
        };

        match self.mode {
            RecurrenceMode::Local => self.raise_best(record.score),
            RecurrenceMode::Global => {
                let (i1, j1) = match self.far_corner() {
                    Some(c) => c,
                    None => return
                };
                let dist_i = i1.saturating_sub(record.i);
                let dist_j = j1.saturating_sub(record.j);
                let dist_min = dist_i.min(dist_j) as i64;
                let gaps = dist_i.abs_diff(dist_j);
                let score = record.score as i64;

                let diagonal = score + dist_min * params.mismatch as i64 - params.gap_cost(gaps) as i64;
                let all_gaps = score - params.gap_cost(dist_i) as i64 - params.gap_cost(dist_j) as i64;
                let lower = diagonal.max(all_gaps).max(NEG_INF as i64);
                self.raise_best(lower as Score);
            }
        }
    }

    /// Highest final score reachable through block `(bx, by)` whose best cell
    /// scored `score`.
    pub fn upper_bound(&self, bx: usize, by: usize, score: Score) -> Option<i64> {
        let params = self.params?;
        let grid = self.grid.as_ref()?;
        let block = grid.block_position(bx, by)?;
        let (i1, j1) = self.far_corner()?;

        // remaining rows/columns from the cells of the block, which span
        // (block.i0, block.i1] x (block.j0, block.j1]
        let a_hi = i1.saturating_sub(block.i0() + 1) as i64;
        let a_lo = i1.saturating_sub(block.i1()) as i64;
        let b_hi = j1.saturating_sub(block.j0() + 1) as i64;
        let b_lo = j1.saturating_sub(block.j1()) as i64;
        let m = params.match_score as i64;

        let reach = match self.mode {
            RecurrenceMode::Local => a_hi.min(b_hi) * m,
            RecurrenceMode::Global => {
                // pick the cell whose remaining distance is closest to square
                let common = a_hi.min(b_hi);
                if common >= a_lo.max(b_lo) {
                    common * m
                } else if a_hi < b_lo {
                    a_hi * m - params.gap_cost((b_lo - a_hi) as usize) as i64
                } else {
                    b_hi * m - params.gap_cost((a_lo - b_hi) as usize) as i64
                }
            }
        };

        Some(score as i64 + reach + grid.block_adjustment() as i64)
    }

    /// A block is prunable only when its bound is strictly below the best, so
    /// a later cell tying the best is still computed and reported.
    pub fn is_prunable(&self, bx: usize, by: usize, score: Score) -> bool {
        match self.upper_bound(bx, by, score) {
            Some(bound) => bound < self.best as i64,
            None => false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(mode: RecurrenceMode) -> PruningBounds {
        let mut b = PruningBounds::default();
        let grid = Grid::with_block_size(Partition::new(0, 0, 100, 100), 10, 10).unwrap();
        b.set_grid(&grid);
        b.set_score_params(ScoreParams::new(1, -3, 3, 2).unwrap(), mode);
        b
    }

    #[test]
    fn test_local_bound() {
        let b = bounds(RecurrenceMode::Local);
        // cells of block (9, 9) lie within 9 rows/cols of the corner
        assert_eq!(b.upper_bound(9, 9, 5), Some(14));
        assert_eq!(b.upper_bound(0, 9, 5), Some(14));
        assert_eq!(b.upper_bound(0, 0, 0), Some(99));
        assert_eq!(b.upper_bound(10, 0, 0), None);
    }

    #[test]
    fn test_global_bound() {
        let b = bounds(RecurrenceMode::Global);
        // block (9, 0): rows 91..=100, columns 1..=10; best cell is
        // (91, 10) with 9 rows and 90 columns left
        assert_eq!(b.upper_bound(0, 9, 0), Some(9 - (3 + 81 * 2)));
        assert_eq!(b.upper_bound(4, 4, 0), Some(59));
    }

    #[test]
    fn test_global_observe() {
        let mut b = bounds(RecurrenceMode::Global);
        b.observe(&ScoreRecord::new(90, 95, 50));
        // diagonal: 50 + 5 * -3 - (3 + 5 * 2) = 22; all gaps: 50 - 23 - 13 = 14
        assert_eq!(b.best(), 22);
        b.observe(&ScoreRecord::new(0, 0, 0));
        assert_eq!(b.best(), 22);
    }

    #[test]
    fn test_prunable_strictness() {
        let mut local = bounds(RecurrenceMode::Local);
        local.raise_best(14);
        // a bound of exactly 14 may still reach a tie
        assert!(!local.is_prunable(9, 9, 5));
        assert!(local.is_prunable(9, 9, 4));

        let mut global = bounds(RecurrenceMode::Global);
        global.raise_best(14);
        assert!(!global.is_prunable(9, 9, 5));
        assert!(global.is_prunable(9, 9, 4));
    }
}
