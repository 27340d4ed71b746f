use crate::error::{Error, Result};

pub type Score = i32;

/// Sentinel for unreachable cells.
///
/// Small enough to lose every max, large enough that adding two of them
/// together with any realistic penalty does not overflow.
pub const NEG_INF: Score = Score::MIN / 4;

/// Which recurrence the backend evaluates.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum RecurrenceMode {
    /// Smith-Waterman: scores are floored at zero, alignments may start anywhere
    Local,
    /// Needleman-Wunsch: alignments span the whole region
    Global
}

/// Match/mismatch/affine gap scores for one alignment run.
///
/// Penalties are stored as non-negative magnitudes. A gap of length `k`
/// costs `gap_open + k * gap_ext`.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct ScoreParams {
    pub match_score: Score,
    pub mismatch: Score,
    pub gap_open: Score,
    pub gap_ext: Score
}

impl ScoreParams {
    pub fn new(match_score: Score, mismatch: Score, gap_open: Score, gap_ext: Score) -> Result<Self> {
        if match_score < 0 {
            return Err(Error::InvalidScoreParams(format!("match score {} must be >= 0", match_score)));
        }
        if mismatch > 0 {
            return Err(Error::InvalidScoreParams(format!("mismatch score {} must be <= 0", mismatch)));
        }
        if gap_open < 0 || gap_ext < 0 {
            return Err(Error::InvalidScoreParams(
                    format!("gap penalties ({}, {}) must be >= 0", gap_open, gap_ext)));
        }
        Ok(Self { match_score, mismatch, gap_open, gap_ext })
    }

    #[inline(always)]
    pub fn substitution(&self, a: u8, b: u8) -> Score {
        if a == b { self.match_score } else { self.mismatch }
    }

    /// Cost of a gap run of `len` cells; zero for an empty run.
    #[inline(always)]
    pub fn gap_cost(&self, len: usize) -> Score {
        if len == 0 { 0 } else { self.gap_open + (len as Score) * self.gap_ext }
    }
}
