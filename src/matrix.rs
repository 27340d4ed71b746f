use std::cmp::Ordering;
use std::fmt;

use crate::scores::{Score, NEG_INF};

/// DP state of one matrix cell.
///
/// `gap` is the affine gap score that accompanies `h` in the direction the
/// cell is being exchanged: F (vertical gap) for cells of a boundary row, and
/// E (horizontal gap) for cells of a boundary column.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct Cell {
    pub h: Score,
    pub gap: Score
}

impl Cell {
    /// A cell that no alignment can reach.
    pub const DEAD: Cell = Cell { h: NEG_INF, gap: NEG_INF };

    #[inline(always)]
    pub fn new(h: Score, gap: Score) -> Self {
        Self { h, gap }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::DEAD
    }
}

/// A score observed at one matrix coordinate.
///
/// Records order best first: higher score, then the later coordinate, so the
/// first element of an ordered collection is the best record.
#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub struct ScoreRecord {
    pub i: usize,
    pub j: usize,
    pub score: Score
}

impl ScoreRecord {
    #[inline(always)]
    pub fn new(i: usize, j: usize, score: Score) -> Self {
        Self { i, j, score }
    }

    pub fn translate(&self, di: isize, dj: isize) -> Option<Self> {
        Some(Self {
            i: self.i.checked_add_signed(di)?,
            j: self.j.checked_add_signed(dj)?,
            score: self.score
        })
    }

    /// Manhattan distance components to another record.
    #[inline]
    pub fn delta(&self, other: &ScoreRecord) -> (usize, usize) {
        (self.i.abs_diff(other.i), self.j.abs_diff(other.j))
    }
}

impl Ord for ScoreRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        other.score.cmp(&self.score)
            .then_with(|| other.i.cmp(&self.i))
            .then_with(|| other.j.cmp(&self.j))
    }
}

impl PartialOrd for ScoreRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ScoreRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@({},{})", self.score, self.i, self.j)
    }
}
