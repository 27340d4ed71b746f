use std::fmt;

use crate::matrix::ScoreRecord;
use crate::scores::Score;

/// Which recurrence term produced the score at a crosspoint.
#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub enum CrosspointType {
    /// H term: the path goes through the cell diagonally or ends there
    Match,
    /// the path crosses the boundary inside a run of gaps in sequence 1,
    /// i.e. a horizontal run consuming sequence 2
    GapInSeq1,
    /// the path crosses the boundary inside a vertical run consuming sequence 1
    GapInSeq2
}

impl CrosspointType {
    #[inline(always)]
    pub fn as_char(&self) -> char {
        match self {
            CrosspointType::Match => 'M',
            CrosspointType::GapInSeq1 => 'D',
            CrosspointType::GapInSeq2 => 'I'
        }
    }
}

/// A cell known to lie on an optimal alignment path.
#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub struct Crosspoint {
    pub i: usize,
    pub j: usize,
    pub score: Score,
    pub kind: CrosspointType
}

impl Crosspoint {
    #[inline(always)]
    pub fn new(i: usize, j: usize, score: Score, kind: CrosspointType) -> Self {
        Self { i, j, score, kind }
    }

    /// Crosspoint at the cell of a score record.
    #[inline]
    pub fn at(record: &ScoreRecord, kind: CrosspointType) -> Self {
        Self::new(record.i, record.j, record.score, kind)
    }

    pub fn record(&self) -> ScoreRecord {
        ScoreRecord::new(self.i, self.j, self.score)
    }

    pub fn translate(&self, di: isize, dj: isize) -> Option<Self> {
        Some(Self {
            i: self.i.checked_add_signed(di)?,
            j: self.j.checked_add_signed(dj)?,
            ..*self
        })
    }

    /// The same matrix boundary seen from the reversed sequences: row `i`
    /// becomes row `len1 - i`, and likewise for columns.
    pub fn reversed(&self, len1: usize, len2: usize) -> Option<Self> {
        Some(Self {
            i: len1.checked_sub(self.i)?,
            j: len2.checked_sub(self.j)?,
            ..*self
        })
    }
}

impl fmt::Display for Crosspoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}@({},{})", self.score, self.kind.as_char(), self.i, self.j)
    }
}
