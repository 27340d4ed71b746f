//! Error taxonomy for partition alignment.
//!
//! Configuration errors are caller mistakes, consistency errors are defects in
//! the score bookkeeping upstream of the matching procedure, and resource errors
//! come from boundary collaborators. None of them are retried.

use thiserror::Error;

use crate::matrix::Cell;
use crate::partition::Partition;
use crate::scores::Score;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Score parameters with the wrong sign or magnitude
    #[error("invalid score parameters: {0}")]
    InvalidScoreParams(String),

    /// Block geometry that cannot tile its partition
    #[error("invalid grid for partition {partition}: {msg}")]
    InvalidGrid { partition: Partition, msg: String },

    /// Configuration values out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A capability was requested without the boundary source or sink it needs
    #[error("missing boundary {what} required by {needed_by}")]
    MissingBoundary { what: &'static str, needed_by: &'static str },

    /// Operation attempted in the wrong manager state
    #[error("invalid manager state: expected {expected}, found {found}")]
    InvalidState { expected: &'static str, found: String },

    /// A combined boundary score jumped past the goal before matching it
    #[error(
        "goal score {goal} skipped at boundary index {index} (forward {forward:?}, backward {backward:?}, gap open {gap_open})"
    )]
    GoalOvershoot { goal: Score, index: usize, forward: Cell, backward: Cell, gap_open: Score },

    /// The goal score was required but never observed
    #[error("goal score {goal} not found in partition {partition}")]
    GoalNotFound { goal: Score, partition: Partition },

    /// Reader does not support random access
    #[error("boundary reader of type {0:?} is not seekable")]
    NotSeekable(crate::boundary::BoundaryType),

    /// Boundary source or sink failed
    #[error("boundary I/O failed: {0}")]
    BoundaryIo(String),

    /// The other end of a streaming boundary went away
    #[error("boundary stream closed after {0} cells")]
    BoundaryClosed(usize),

    /// Failure reported by a compute backend
    #[error("backend {backend} failed: {msg}")]
    Backend { backend: String, msg: String }
}
