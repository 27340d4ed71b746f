//! Partition-level core of a pairwise affine-gap aligner.
//!
//! A partition of the dynamic programming matrix is tiled into blocks and
//! computed anti-diagonal by anti-diagonal by an [`Aligner`] backend, under the
//! control of a [`Manager`]. The manager streams boundary rows and columns in
//! and out, prunes blocks that cannot beat the best known score, keeps a list
//! of the best local alignment ends, and finds the cell where a goal score is
//! met so a traceback can split the matrix in linear space.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod scores;
pub mod error;
pub mod matrix;
pub mod partition;
pub mod grid;
pub mod config;
pub mod crosspoint;
pub mod boundary;
pub mod matching;
pub mod best_score;
pub mod pruning;
pub mod aligner;
pub mod scan_block;
pub mod manager;
pub mod simulate;

pub use aligner::{Aligner, AlignerCapabilities, EventSink, PartitionCallbacks, PartitionJob};
pub use best_score::BestScoreList;
pub use boundary::{boundary_channel, BoundaryReader, BoundaryType, BoundaryWriter};
pub use config::AlignerConfig;
pub use crosspoint::{Crosspoint, CrosspointType};
pub use error::{Error, Result};
pub use grid::Grid;
pub use manager::{GoalLocation, Manager, ManagerState, PartitionOutcome, ScoreLocation, StartType};
pub use matrix::{Cell, ScoreRecord};
pub use partition::Partition;
pub use pruning::PruningStrategy;
pub use scan_block::ScanBlockAligner;
pub use scores::{RecurrenceMode, Score, ScoreParams, NEG_INF};

/// Locks `m`, carrying on with the data if another thread panicked while
/// holding it.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
