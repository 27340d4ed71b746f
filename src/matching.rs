//! Goal-score matching between a forward and a backward boundary vector.
//!
//! The forward vector holds the last row (or column) of a partition computed
//! from the start of the matrix. The backward vector holds the same boundary
//! computed by running the recurrence over the reversed remainder. An optimal
//! path with score `goal` crosses the boundary at the first index where the
//! two halves add up to `goal`.

use crate::error::{Error, Result};
use crate::matrix::Cell;
use crate::scores::{Score, ScoreParams};

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum MatchKind {
    /// the halves meet in the H term
    Match,
    /// the halves meet inside a gap run crossing the boundary
    Gapped
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct BoundaryMatch {
    /// index into the boundary vector
    pub index: usize,
    pub kind: MatchKind
}

#[derive(Debug, Clone)]
pub struct GoalMatcher {
    goal: Score,
    gap_open: Score,
    gap_ext: Score,
    full_gap: Option<usize>
}

impl GoalMatcher {
    pub fn new(goal: Score, params: &ScoreParams) -> Self {
        Self { goal, gap_open: params.gap_open, gap_ext: params.gap_ext, full_gap: None }
    }

    /// Also accept a single gap run of `len` cells starting at the first
    /// boundary cell, with no matching cell in between.
    pub fn with_full_gap(mut self, len: usize) -> Self {
        self.full_gap = Some(len);
        self
    }

    #[inline(always)]
    pub fn goal(&self) -> Score {
        self.goal
    }

    #[inline(always)]
    pub fn full_gap(&self) -> Option<usize> {
        self.full_gap
    }

    /// Closed-form check of the full gap case against the first cell of the
    /// forward vector.
    pub fn check_full_gap(&self, first: &Cell) -> Option<BoundaryMatch> {
        let len = self.full_gap? as i64;
        let (go, ge, goal) = (self.gap_open as i64, self.gap_ext as i64, self.goal as i64);

        let opened = first.h as i64 - (go + len * ge);
        let extended = first.gap as i64 - len * ge;
        if opened == goal || extended == goal {
            Some(BoundaryMatch { index: 0, kind: MatchKind::Gapped })
        } else {
            None
        }
    }

    /// Scans aligned slices of the two vectors whose first element sits at
    /// boundary index `start`. Returns the first hit, `None` if the slices
    /// hold none, and an error if the goal was jumped over.
    pub fn scan(&self, start: usize, forward: &[Cell], backward: &[Cell]) -> Result<Option<BoundaryMatch>> {
        let goal = self.goal as i64;

        for (k, (f, b)) in forward.iter().zip(backward).enumerate() {
            let h = f.h as i64 + b.h as i64;
            if h == goal {
                return Ok(Some(BoundaryMatch { index: start + k, kind: MatchKind::Match }));
            }

            let gap = f.gap as i64 + b.gap as i64 + self.gap_open as i64;
            if gap == goal {
                return Ok(Some(BoundaryMatch { index: start + k, kind: MatchKind::Gapped }));
            }

            if h > goal && gap > goal {
                return Err(Error::GoalOvershoot {
                    goal: self.goal,
                    index: start + k,
                    forward: *f,
                    backward: *b,
                    gap_open: self.gap_open
                });
            }
        }

        Ok(None)
    }
}

/// Runs the full gap check and then a scan over whole vectors.
pub fn find_goal(matcher: &GoalMatcher, forward: &[Cell], backward: &[Cell]) -> Result<Option<BoundaryMatch>> {
    if let Some(m) = forward.first().and_then(|f| matcher.check_full_gap(f)) {
        return Ok(Some(m));
    }
    matcher.scan(0, forward, backward)
}
