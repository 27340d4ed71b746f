//! Tiling of a partition into blocks.
//!
//! Geometry is kept as two split arrays of absolute boundary positions, so
//! uniform and uneven tilings share one representation. Block `(bx, by)` spans
//! `[row_splits[by], row_splits[by + 1]) x [col_splits[bx], col_splits[bx + 1])`.

use std::ops::RangeInclusive;

use crate::error::{Error, Result};
use crate::partition::Partition;
use crate::scores::Score;

#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    partition: Partition,
    row_splits: Vec<usize>,
    col_splits: Vec<usize>,
    block_adjustment: Score
}

impl Grid {
    /// Fixed block size; the last row and column of blocks are truncated to fit.
    pub fn with_block_size(partition: Partition, block_height: usize, block_width: usize) -> Result<Self> {
        if block_height == 0 || block_width == 0 {
            return Err(Error::InvalidGrid {
                partition,
                msg: format!("block size {}x{} must be non-zero", block_height, block_width)
            });
        }

        let row_splits = uniform_splits(partition.i0(), partition.i1(), block_height);
        let col_splits = uniform_splits(partition.j0(), partition.j1(), block_width);
        Ok(Self { partition, row_splits, col_splits, block_adjustment: 0 })
    }

    /// Explicit boundary positions, `count + 1` per axis.
    pub fn with_splits(partition: Partition, row_splits: Vec<usize>, col_splits: Vec<usize>) -> Result<Self> {
        check_splits(&partition, &row_splits, partition.i0(), partition.i1(), "row")?;
        check_splits(&partition, &col_splits, partition.j0(), partition.j1(), "column")?;
        Ok(Self { partition, row_splits, col_splits, block_adjustment: 0 })
    }

    /// Splits each axis evenly into roughly the requested number of blocks.
    ///
    /// Counts are clamped to `dimension / min_block_size` (at least 1) so small
    /// partitions never produce degenerate blocks.
    pub fn with_block_count(partition: Partition, rows: usize, cols: usize, min_block_size: usize) -> Self {
        let min_block_size = min_block_size.max(1);
        let row_splits = even_splits(partition.i0(), partition.i1(), rows, min_block_size);
        let col_splits = even_splits(partition.j0(), partition.j1(), cols, min_block_size);
        Self { partition, row_splits, col_splits, block_adjustment: 0 }
    }

    #[inline(always)]
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Number of blocks along the rows axis (sequence 1).
    #[inline(always)]
    pub fn height(&self) -> usize {
        self.row_splits.len() - 1
    }

    /// Number of blocks along the columns axis (sequence 2).
    #[inline(always)]
    pub fn width(&self) -> usize {
        self.col_splits.len() - 1
    }

    #[inline(always)]
    pub fn block_count(&self) -> usize {
        self.height() * self.width()
    }

    #[inline(always)]
    pub fn row_splits(&self) -> &[usize] {
        &self.row_splits
    }

    #[inline(always)]
    pub fn col_splits(&self) -> &[usize] {
        &self.col_splits
    }

    /// Score slack added to every pruning bound computed for this grid.
    #[inline(always)]
    pub fn block_adjustment(&self) -> Score {
        self.block_adjustment
    }

    pub fn set_block_adjustment(&mut self, adjustment: Score) {
        self.block_adjustment = adjustment;
    }

    /// Region of block `(bx, by)`, or `None` outside the grid.
    #[inline]
    pub fn block_position(&self, bx: usize, by: usize) -> Option<Partition> {
        if bx >= self.width() || by >= self.height() {
            return None;
        }
        Some(Partition::new(
                self.row_splits[by],
                self.col_splits[bx],
                self.row_splits[by + 1],
                self.col_splits[bx + 1]))
    }

    /// Number of block anti-diagonals, `width + height - 1` for a non-empty grid.
    #[inline]
    pub fn diagonal_count(&self) -> usize {
        if self.block_count() == 0 { 0 } else { self.width() + self.height() - 1 }
    }

    /// Block columns present on anti-diagonal `d` (where `bx + by == d`).
    #[inline]
    pub fn diagonal(&self, d: usize) -> RangeInclusive<usize> {
        let lo = (d + 1).saturating_sub(self.height());
        let hi = d.min(self.width().saturating_sub(1));
        lo..=hi
    }

    /// Blocks in row-major order.
    pub fn blocks(&self) -> impl Iterator<Item = (usize, usize, Partition)> + '_ {
        (0..self.height()).flat_map(move |by| {
            (0..self.width()).filter_map(move |bx| self.block_position(bx, by).map(|p| (bx, by, p)))
        })
    }
}

fn uniform_splits(start: usize, end: usize, size: usize) -> Vec<usize> {
    let mut splits: Vec<usize> = (start..end).step_by(size).collect();
    splits.push(end);
    splits
}

fn even_splits(start: usize, end: usize, count: usize, min_block_size: usize) -> Vec<usize> {
    let dim = end - start;
    if dim == 0 {
        return vec![start];
    }
    let count = count.min(dim / min_block_size).max(1);
    (0..=count).map(|k| start + dim * k / count).collect()
}

fn check_splits(partition: &Partition, splits: &[usize], start: usize, end: usize, axis: &str) -> Result<()> {
    let err = |msg: String| Err(Error::InvalidGrid { partition: *partition, msg });

    match (splits.first(), splits.last()) {
        (Some(&first), Some(&last)) if first == start && last == end => (),
        _ => return err(format!("{} splits {:?} must start at {} and end at {}", axis, splits, start, end))
    }
    if splits.windows(2).any(|w| w[0] >= w[1]) {
        return err(format!("{} splits {:?} must be strictly increasing", axis, splits));
    }
    Ok(())
}
