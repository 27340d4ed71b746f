use crate::grid::Grid;
use crate::matrix::ScoreRecord;
use crate::partition::Partition;
use crate::scores::{RecurrenceMode, Score, ScoreParams};

use super::{BlockPruning, PruningBounds};

/// Window-based pruning for wavefront scheduling.
///
/// Instead of a mark per block, this keeps the first live block column `W`
/// and the first live block row `V`. On every diagonal, blocks with
/// `bx < W` or `by < V` are dead. Both only ever grow, and once the live
/// window of a diagonal is empty every later block is pruned too.
///
/// Queries must come in diagonal order. A query for a later diagonal closes
/// the current one; a query for an earlier diagonal is answered conservatively.
#[derive(Debug, Clone, Default)]
pub struct DiagonalPruning {
    bounds: PruningBounds,
    width: usize,
    height: usize,
    diagonal: usize,
    first_col: usize,
    first_row: usize,
    // first live column/row found on the previous diagonal
    prev_col: usize,
    prev_row: usize,
    // best score of each computed block on the current diagonal, by column
    scores: Vec<Option<Score>>,
    counted: Vec<bool>,
    collapsed: bool,
    pruned: usize
}

impl DiagonalPruning {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block columns still live on the current diagonal, or `None` once the
    /// window is empty.
    pub fn window(&self) -> Option<(usize, usize)> {
        if self.collapsed || self.width == 0 || self.height == 0 {
            return None;
        }
        let (lo, hi) = self.diagonal_bounds(self.diagonal)?;
        let start = self.first_col.max(lo);
        let end = hi.min(self.diagonal.checked_sub(self.first_row)?);
        if start > end { None } else { Some((start, end)) }
    }

    /// Current `(W, V)`: first live block column and first live block row.
    pub fn live_bounds(&self) -> (usize, usize) {
        (self.first_col, self.first_row)
    }

    fn diagonal_bounds(&self, d: usize) -> Option<(usize, usize)> {
        if d + 1 >= self.width + self.height {
            return None;
        }
        let lo = (d + 1).saturating_sub(self.height);
        let hi = d.min(self.width - 1);
        Some((lo, hi))
    }

    fn is_dead_on_current(&self, bx: usize) -> bool {
        let by = self.diagonal - bx;
        if bx < self.first_col || by < self.first_row {
            return true;
        }
        match self.scores[bx] {
            Some(score) => self.bounds.is_prunable(bx, by, score),
            None => false
        }
    }

    /// Closes the current diagonal and moves the window onto the next one.
    fn finalize(&mut self) {
        let d = self.diagonal;
        let next = d + 1;

        if let (false, Some((lo, hi))) = (self.collapsed, self.diagonal_bounds(d)) {
            let mut p = self.first_col.max(lo);
            while p <= hi && self.is_dead_on_current(p) {
                p += 1;
            }

            let (lo_by, hi_by) = (d - hi, d - lo);
            let mut q = self.first_row.max(lo_by);
            while q <= hi_by && self.is_dead_on_current(d - q) {
                q += 1;
            }

            // a block is only dead if its top-left neighbour, one diagonal
            // further back, is dead as well
            let mut w = p.min(self.prev_col + 1);
            let mut v = q.min(self.prev_row + 1);

            if !self.bounds.border_prunable() {
                if (next + 1).saturating_sub(self.height) == 0 {
                    w = 0;
                }
                if (next + 1).saturating_sub(self.width) == 0 {
                    v = 0;
                }
            }

            self.first_col = self.first_col.max(w);
            self.first_row = self.first_row.max(v);
            self.prev_col = p;
            self.prev_row = q;

            if let Some((next_lo, next_hi)) = self.diagonal_bounds(next) {
                let start = self.first_col.max(next_lo);
                let empty = match next.checked_sub(self.first_row) {
                    Some(end) => start > end.min(next_hi),
                    None => true
                };
                if empty {
                    log::debug!("pruning window collapsed on diagonal {} (W = {}, V = {})", next, self.first_col, self.first_row);
                    self.collapsed = true;
                }
            }
        }

        self.diagonal = next;
        self.scores.iter_mut().for_each(|s| *s = None);
        self.counted.iter_mut().for_each(|c| *c = false);
    }

    fn advance_to(&mut self, d: usize) {
        while self.diagonal < d {
            self.finalize();
        }
    }
}

impl BlockPruning for DiagonalPruning {
    fn set_grid(&mut self, grid: &Grid) {
        self.bounds.set_grid(grid);
        self.width = grid.width();
        self.height = grid.height();
        self.diagonal = 0;
        self.first_col = 0;
        self.first_row = 0;
        self.prev_col = 0;
        self.prev_row = 0;
        self.scores = vec![None; self.width];
        self.counted = vec![false; self.width];
        self.collapsed = false;
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
        self.bounds.observe(&record);
        if bx >= self.width || by >= self.height {
            return;
        }

        let d = bx + by;
        if d < self.diagonal {
            log::trace!("late score for block ({}, {}) on closed diagonal {}", bx, by, d);
            return;
        }
        self.advance_to(d);

        let slot = &mut self.scores[bx];
        *slot = Some(slot.map_or(record.score, |s| s.max(record.score)));
    }

    fn is_block_pruned(&mut self, bx: usize, by: usize) -> bool {
        if bx >= self.width || by >= self.height {
            return false;
        }

        let d = bx + by;
        if d < self.diagonal {
            return false;
        }
        self.advance_to(d);

        let pruned = self.collapsed || bx < self.first_col || by < self.first_row;
        if pruned && !self.counted[bx] {
            self.counted[bx] = true;
            self.pruned += 1;
        }
        pruned
    }

    fn pruned_blocks(&self) -> usize {
        self.pruned
    }
}
