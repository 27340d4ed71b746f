use crate::grid::Grid;
use crate::matrix::ScoreRecord;
use crate::partition::Partition;
use crate::scores::{RecurrenceMode, Score, ScoreParams};

use super::{BlockPruning, PruningBounds};

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
enum Mark {
    Live,
    /// computed, and its outputs cannot beat the best score
    Prunable,
    /// never computed
    Skipped
}

/// Table-based pruning for arbitrary block scheduling.
///
/// The mark table has one extra leading row and column standing for the
/// partition's first row and column. A block is reported pruned only when its
/// top, left and top-left neighbours are all dead, so pruning spreads
/// contiguously and no skipped block could have been fed a live score.
#[derive(Debug, Clone, Default)]
pub struct GenericPruning {
    bounds: PruningBounds,
    width: usize,
    height: usize,
    marks: Vec<Mark>,
    scores: Vec<Option<Score>>,
    pruned: usize
}

impl GenericPruning {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    fn table_idx(&self, tx: usize, ty: usize) -> usize {
        ty * (self.width + 1) + tx
    }

    /// Whether table entry `(tx, ty)` is dead, upgrading computed blocks that
    /// became prunable after the best score rose.
    fn is_dead(&mut self, tx: usize, ty: usize) -> bool {
        if tx == 0 || ty == 0 {
            return self.bounds.border_prunable();
        }

        let idx = self.table_idx(tx, ty);
        if self.marks[idx] != Mark::Live {
            return true;
        }

        let (bx, by) = (tx - 1, ty - 1);
        match self.scores[by * self.width + bx] {
            Some(score) if self.bounds.is_prunable(bx, by, score) => {
                self.marks[idx] = Mark::Prunable;
                true
            },
            _ => false
        }
    }

    /// Whether block `(bx, by)` has been computed and marked, or skipped.
    pub fn is_marked(&mut self, bx: usize, by: usize) -> bool {
        if bx >= self.width || by >= self.height {
            return false;
        }
        self.is_dead(bx + 1, by + 1)
    }
}

impl BlockPruning for GenericPruning {
    fn set_grid(&mut self, grid: &Grid) {
        self.bounds.set_grid(grid);
        self.width = grid.width();
        self.height = grid.height();
        self.marks = vec![Mark::Live; (self.width + 1) * (self.height + 1)];
        self.scores = vec![None; self.width * self.height];
        self.pruned = 0;
    }

    fn set_super_partition(&mut self, partition: Partition) {
        self.bounds.set_super_partition(partition);
    }

    fn set_score_params(&mut self, params: ScoreParams, mode: RecurrenceMode) {
        self.bounds.set_score_params(params, mode);
    }

    fn set_border_prunable(&mut self, prunable: bool) {
        self.bounds.set_border_prunable(prunable);
    }

    fn update_best_score(&mut self, score: Score) {
        self.bounds.raise_best(score);
    }

    fn best_score(&self) -> Score {
        self.bounds.best()
    }

    fn update_pruning_state(&mut self, bx: usize, by: usize, record: ScoreRecord) {
        if bx >= self.width || by >= self.height {
            log::trace!("ignoring score for block ({}, {}) outside {}x{} grid", bx, by, self.width, self.height);
            return;
        }

        self.bounds.observe(&record);
        let slot = &mut self.scores[by * self.width + bx];
        *slot = Some(slot.map_or(record.score, |s| s.max(record.score)));
        // evaluates the block against the new best
        self.is_dead(bx + 1, by + 1);
    }

    fn is_block_pruned(&mut self, bx: usize, by: usize) -> bool {
        if bx >= self.width || by >= self.height {
            return false;
        }

        let idx = self.table_idx(bx + 1, by + 1);
        match self.marks[idx] {
            Mark::Skipped => return true,
            Mark::Prunable => return false,
            Mark::Live => ()
        }

        // the first block has no computed neighbour whose bound covers it
        if bx == 0 && by == 0 {
            return false;
        }

        let pruned = self.is_dead(bx, by) && self.is_dead(bx + 1, by) && self.is_dead(bx, by + 1);
        if pruned {
            self.marks[idx] = Mark::Skipped;
            self.pruned += 1;
        }
        pruned
    }

    fn pruned_blocks(&self) -> usize {
        self.pruned
    }
}
