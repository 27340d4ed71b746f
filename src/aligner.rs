//! The seam between the manager and compute backends.
//!
//! A backend computes one partition at a time. It pulls the first row and
//! column through [`PartitionCallbacks`], asks before computing each block
//! whether the block may be skipped, and pushes the last row and column,
//! special rows and block scores back as it goes. Callbacks take `&self`, but
//! boundary reads and writes may block on a streaming peer, so a backend makes
//! them from the thread that called [`Aligner::align_partition`] rather than
//! from a pool worker.

use std::sync::{Arc, Mutex};

use crate::crosspoint::Crosspoint;
use crate::error::Result;
use crate::grid::Grid;
use crate::lock;
use crate::matrix::{Cell, ScoreRecord};
use crate::partition::Partition;
use crate::scores::{RecurrenceMode, ScoreParams};

/// What a backend can report back.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct AlignerCapabilities {
    /// scores are dispatched per block, with block coordinates
    pub block_scores: bool,
    /// blocks are skipped when the manager asks
    pub block_pruning: bool,
    /// interior rows are dispatched at a fixed interval
    pub special_rows: bool
}

/// Everything a backend needs to compute one partition.
#[derive(Debug, Clone)]
pub struct PartitionJob<'a> {
    pub partition: Partition,
    pub grid: &'a Grid,
    pub seq1: &'a [u8],
    pub seq2: &'a [u8],
    pub params: ScoreParams,
    pub mode: RecurrenceMode
}

pub trait PartitionCallbacks: Sync {
    /// Fills `buf` with the next cells of the first row. Index 0 of the row
    /// is the partition corner.
    fn receive_first_row(&self, buf: &mut [Cell]) -> Result<()>;

    /// Fills `buf` with the next cells of the first column.
    fn receive_first_column(&self, buf: &mut [Cell]) -> Result<()>;

    /// Cells of the last row starting at index `start`. Chunks may arrive out
    /// of order.
    fn dispatch_row(&self, start: usize, cells: &[Cell]) -> Result<()>;

    /// Cells of the last column starting at index `start`.
    fn dispatch_column(&self, start: usize, cells: &[Cell]) -> Result<()>;

    /// Interior row `i`, from column `j0` on.
    fn dispatch_special_row(&self, i: usize, j0: usize, cells: &[Cell]) -> Result<()>;

    /// Best cell of a block, or of the partition when `block` is `None`.
    fn dispatch_score(&self, record: ScoreRecord, block: Option<(usize, usize)>);

    fn must_continue(&self) -> bool;

    fn must_prune_block(&self, bx: usize, by: usize) -> bool;

    fn special_row_interval(&self) -> Option<usize>;
}

/// A compute backend.
pub trait Aligner: Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> AlignerCapabilities;

    /// Block tiling the backend wants for a partition.
    fn grid(&self, partition: &Partition) -> Result<Grid>;

    fn align_partition(&self, job: &PartitionJob<'_>, callbacks: &dyn PartitionCallbacks) -> Result<()>;
}

/// Observer of the data flowing out of a partition. Every method defaults to
/// doing nothing.
pub trait EventSink: Send + Sync {
    fn on_row(&self, _start: usize, _cells: &[Cell]) {}

    fn on_column(&self, _start: usize, _cells: &[Cell]) {}

    fn on_special_row(&self, _i: usize, _j0: usize, _cells: &[Cell]) {}

    fn on_score(&self, _record: &ScoreRecord) {}

    fn on_crosspoint(&self, _crosspoint: &Crosspoint) {}
}

#[derive(Debug, Copy, Clone, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {}

#[derive(Debug, PartialEq, Clone)]
pub enum SinkEvent {
    Row { start: usize, cells: Vec<Cell> },
    Column { start: usize, cells: Vec<Cell> },
    SpecialRow { i: usize, j0: usize, cells: Vec<Cell> },
    Score(ScoreRecord),
    Crosspoint(Crosspoint)
}

/// Keeps every event, for inspection after a partition finishes.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        lock(&self.events).clone()
    }

    pub fn crosspoints(&self) -> Vec<Crosspoint> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Crosspoint(c) => Some(*c),
                _ => None
            })
            .collect()
    }

    pub fn special_rows(&self) -> Vec<usize> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                SinkEvent::SpecialRow { i, .. } => Some(*i),
                _ => None
            })
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }

    fn push(&self, event: SinkEvent) {
        lock(&self.events).push(event);
    }
}

impl EventSink for RecordingSink {
    fn on_row(&self, start: usize, cells: &[Cell]) {
        self.push(SinkEvent::Row { start, cells: cells.to_vec() });
    }

    fn on_column(&self, start: usize, cells: &[Cell]) {
        self.push(SinkEvent::Column { start, cells: cells.to_vec() });
    }

    fn on_special_row(&self, i: usize, j0: usize, cells: &[Cell]) {
        self.push(SinkEvent::SpecialRow { i, j0, cells: cells.to_vec() });
    }

    fn on_score(&self, record: &ScoreRecord) {
        self.push(SinkEvent::Score(*record));
    }

    fn on_crosspoint(&self, crosspoint: &Crosspoint) {
        self.push(SinkEvent::Crosspoint(*crosspoint));
    }
}

/// Passes every event to each of its sinks in order.
#[derive(Clone, Default)]
pub struct ForwardingSink {
    sinks: Vec<Arc<dyn EventSink>>
}

impl ForwardingSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for ForwardingSink {
    fn on_row(&self, start: usize, cells: &[Cell]) {
        self.sinks.iter().for_each(|s| s.on_row(start, cells));
    }

    fn on_column(&self, start: usize, cells: &[Cell]) {
        self.sinks.iter().for_each(|s| s.on_column(start, cells));
    }

    fn on_special_row(&self, i: usize, j0: usize, cells: &[Cell]) {
        self.sinks.iter().for_each(|s| s.on_special_row(i, j0, cells));
    }

    fn on_score(&self, record: &ScoreRecord) {
        self.sinks.iter().for_each(|s| s.on_score(record));
    }

    fn on_crosspoint(&self, crosspoint: &Crosspoint) {
        self.sinks.iter().for_each(|s| s.on_crosspoint(crosspoint));
    }
}
