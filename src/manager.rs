//! Drives the alignment of one partition at a time.
//!
//! The manager is configured with a partition, its boundaries and an optional
//! goal score, then hands the partition to a backend. While the backend runs,
//! the manager serves boundary reads, stages the last row and column back into
//! index order, feeds block scores to the pruner and the best score list, and
//! looks for the goal score. Finding the goal stops the backend early.
//!
//! ```text
//! Idle -> Configuring -> Active -> GoalFound | BoundaryComplete -> Configuring ...
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::aligner::{Aligner, EventSink, NoopSink, PartitionCallbacks, PartitionJob};
use crate::best_score::BestScoreList;
use crate::boundary::{
    read_exact, write_all, BoundaryReader, BoundaryType, BoundaryWriter, GapBoundaryReader, ZeroBoundaryReader
};
use crate::config::AlignerConfig;
use crate::crosspoint::{Crosspoint, CrosspointType};
use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::lock;
use crate::matching::{GoalMatcher, MatchKind};
use crate::matrix::{Cell, ScoreRecord};
use crate::partition::Partition;
use crate::pruning::{BlockPruning, PruningStrategy};
use crate::scores::{RecurrenceMode, Score, ScoreParams};

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ManagerState {
    Idle,
    Configuring,
    Active,
    GoalFound,
    BoundaryComplete
}

/// How the path enters the partition.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum StartType {
    Plain,
    /// inside a horizontal gap, so the first row pays no gap open
    GapInRow,
    /// inside a vertical gap, so the first column pays no gap open
    GapInColumn
}

/// Where in the partition a score is looked for.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ScoreLocation {
    Nowhere,
    /// any computed cell
    Anywhere,
    /// the last row
    Seq1Edge,
    /// the last column
    Seq2Edge,
    /// the last row or the last column
    Either,
    /// the far corner, on both edges at once
    Both
}

pub type GoalLocation = ScoreLocation;

impl ScoreLocation {
    #[inline]
    fn includes(&self, edge: Edge) -> bool {
        match (self, edge) {
            (ScoreLocation::Either, _) => true,
            (ScoreLocation::Seq1Edge, Edge::Seq1) => true,
            (ScoreLocation::Seq2Edge, Edge::Seq2) => true,
            _ => false
        }
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
enum Edge {
    /// rows; the last one is the sequence 1 edge
    Seq1,
    /// columns; the last one is the sequence 2 edge
    Seq2
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub struct PartitionStats {
    pub blocks_computed: usize,
    pub blocks_pruned: usize,
    pub cells_computed: usize
}

/// Result of one partition. Coordinates are translated by the manager's
/// coordinate offset.
#[derive(Debug, PartialEq, Clone)]
pub struct PartitionOutcome {
    pub partition: Partition,
    pub state: ManagerState,
    pub crosspoint: Option<Crosspoint>,
    /// best dispatched block score
    pub best: Option<ScoreRecord>,
    /// best cell of the last row
    pub seq1_edge_best: Option<ScoreRecord>,
    /// best cell of the last column
    pub seq2_edge_best: Option<ScoreRecord>,
    pub stats: PartitionStats
}

pub struct Manager {
    config: AlignerConfig,
    params: ScoreParams,
    mode: RecurrenceMode,
    state: ManagerState,
    partition: Option<Partition>,
    start_type: StartType,
    first_row: Option<Box<dyn BoundaryReader>>,
    first_column: Option<Box<dyn BoundaryReader>>,
    last_row: Option<Box<dyn BoundaryWriter>>,
    last_column: Option<Box<dyn BoundaryWriter>>,
    matching_row: Option<Box<dyn BoundaryReader>>,
    matching_column: Option<Box<dyn BoundaryReader>>,
    goal: Option<(Score, GoalLocation)>,
    goal_full_gap: Option<usize>,
    best_location: ScoreLocation,
    super_partition: Option<Partition>,
    offset: (isize, isize),
    sink: Arc<dyn EventSink>,
    best_list: Arc<BestScoreList>,
    pruning: PruningStrategy,
    crosspoint: Option<Crosspoint>
}

impl Manager {
    pub fn new(params: ScoreParams, mode: RecurrenceMode, config: AlignerConfig) -> Result<Self> {
        config.validate()?;
        let best_list = Arc::new(BestScoreList::new(params, config.best_list_size, config.best_min_score));
        let best_location = match mode {
            RecurrenceMode::Local => ScoreLocation::Anywhere,
            RecurrenceMode::Global => ScoreLocation::Both
        };

        Ok(Self {
            pruning: config.pruning,
            config,
            params,
            mode,
            state: ManagerState::Idle,
            partition: None,
            start_type: StartType::Plain,
            first_row: None,
            first_column: None,
            last_row: None,
            last_column: None,
            matching_row: None,
            matching_column: None,
            goal: None,
            goal_full_gap: None,
            best_location,
            super_partition: None,
            offset: (0, 0),
            sink: Arc::new(NoopSink),
            best_list,
            crosspoint: None
        })
    }

    #[inline(always)]
    pub fn state(&self) -> ManagerState {
        self.state
    }

    #[inline(always)]
    pub fn params(&self) -> &ScoreParams {
        &self.params
    }

    #[inline(always)]
    pub fn mode(&self) -> RecurrenceMode {
        self.mode
    }

    fn configure(&mut self) {
        if self.state != ManagerState::Configuring {
            log::debug!("manager: {:?} -> Configuring", self.state);
            self.state = ManagerState::Configuring;
        }
    }

    /// Starts configuring a new partition. The crosspoint of the previous
    /// partition is discarded.
    pub fn set_partition(&mut self, partition: Partition) {
        self.configure();
        self.partition = Some(partition);
        self.crosspoint = None;
    }

    pub fn set_start_type(&mut self, start_type: StartType) {
        self.configure();
        self.start_type = start_type;
    }

    pub fn set_first_row_reader(&mut self, reader: Box<dyn BoundaryReader>) {
        self.configure();
        self.first_row = Some(reader);
    }

    pub fn set_first_column_reader(&mut self, reader: Box<dyn BoundaryReader>) {
        self.configure();
        self.first_column = Some(reader);
    }

    pub fn set_last_row_writer(&mut self, writer: Box<dyn BoundaryWriter>) {
        self.configure();
        self.last_row = Some(writer);
    }

    pub fn set_last_column_writer(&mut self, writer: Box<dyn BoundaryWriter>) {
        self.configure();
        self.last_column = Some(writer);
    }

    /// Backward boundary matched against the last row when the goal is looked
    /// for on the sequence 1 edge.
    pub fn set_matching_row_reader(&mut self, reader: Box<dyn BoundaryReader>) {
        self.configure();
        self.matching_row = Some(reader);
    }

    /// Backward boundary matched against the last column.
    pub fn set_matching_column_reader(&mut self, reader: Box<dyn BoundaryReader>) {
        self.configure();
        self.matching_column = Some(reader);
    }

    /// Score the next partition must produce at `location`. Also used as a
    /// pruning floor.
    pub fn set_goal_score(&mut self, score: Score, location: GoalLocation) {
        self.configure();
        self.goal = Some((score, location));
    }

    pub fn clear_goal_score(&mut self) {
        self.configure();
        self.goal = None;
        self.goal_full_gap = None;
    }

    /// Lets the goal be met by a single gap run of `len` cells from the first
    /// boundary cell.
    pub fn set_goal_full_gap(&mut self, len: usize) {
        self.configure();
        self.goal_full_gap = Some(len);
    }

    pub fn set_best_score_location(&mut self, location: ScoreLocation) {
        self.configure();
        self.best_location = location;
    }

    /// Region whose far corner bounds pruning, when the partition is only part
    /// of the matrix.
    pub fn set_super_partition(&mut self, partition: Partition) {
        self.configure();
        self.super_partition = Some(partition);
    }

    /// Offset added to every coordinate reported outward.
    pub fn set_coordinate_offset(&mut self, di: isize, dj: isize) {
        self.configure();
        self.offset = (di, dj);
    }

    pub fn set_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.configure();
        self.sink = sink;
    }

    /// Shares a best score list, e.g. between the managers of several partitions.
    pub fn set_best_score_list(&mut self, list: Arc<BestScoreList>) {
        self.configure();
        self.best_list = list;
    }

    pub fn best_score_list(&self) -> Arc<BestScoreList> {
        Arc::clone(&self.best_list)
    }

    pub fn set_pruning_strategy(&mut self, strategy: PruningStrategy) {
        self.configure();
        self.pruning = strategy;
    }

    /// Crosspoint found by the last partition.
    pub fn get_next_crosspoint(&self) -> Option<Crosspoint> {
        self.crosspoint
    }

    pub fn is_found_crosspoint(&self) -> bool {
        self.crosspoint.is_some()
    }

    /// Drops all per-partition configuration.
    pub fn reset(&mut self) {
        self.state = ManagerState::Idle;
        self.partition = None;
        self.first_row = None;
        self.first_column = None;
        self.last_row = None;
        self.last_column = None;
        self.matching_row = None;
        self.matching_column = None;
        self.goal = None;
        self.goal_full_gap = None;
        self.crosspoint = None;
    }

    fn fail(&mut self, e: Error) -> Result<PartitionOutcome> {
        log::debug!("manager: partition failed: {}", e);
        self.state = ManagerState::Idle;
        Err(e)
    }

    fn default_reader(&self, edge: Edge) -> Box<dyn BoundaryReader> {
        match self.mode {
            RecurrenceMode::Local => Box::new(ZeroBoundaryReader::new()),
            RecurrenceMode::Global => {
                let already_open = match (self.start_type, edge) {
                    (StartType::GapInRow, Edge::Seq1) => true,
                    (StartType::GapInColumn, Edge::Seq2) => true,
                    _ => false
                };
                if already_open {
                    Box::new(GapBoundaryReader::already_open(&self.params))
                } else {
                    Box::new(GapBoundaryReader::new(&self.params))
                }
            }
        }
    }

    /// Aligns the configured partition with `aligner`. Boundaries, matching
    /// readers and the goal are consumed by the call.
    pub fn align(&mut self, aligner: &dyn Aligner, seq1: &[u8], seq2: &[u8]) -> Result<PartitionOutcome> {
        let partition = match (self.state, self.partition) {
            (ManagerState::Configuring, Some(p)) => p,
            (state, _) => {
                return Err(Error::InvalidState { expected: "Configuring with a partition", found: format!("{:?}", state) });
            }
        };
        let outward = match partition.translate(self.offset.0, self.offset.1) {
            Some(p) => p,
            None => {
                let e = Error::InvalidConfig(format!("offset {:?} moves partition {} out of range", self.offset, partition));
                return self.fail(e);
            }
        };

        let goal = self.goal.take();
        let full_gap = self.goal_full_gap.take();
        let first_row = self.first_row.take();
        let first_column = self.first_column.take();
        let last_row = self.last_row.take();
        let last_column = self.last_column.take();
        let matching_row = self.matching_row.take();
        let matching_column = self.matching_column.take();

        self.state = ManagerState::Active;

        if partition.is_empty() {
            log::warn!("partition {} has zero area; nothing to align", partition);
            self.state = ManagerState::BoundaryComplete;
            return Ok(PartitionOutcome {
                partition: outward,
                state: self.state,
                crosspoint: None,
                best: None,
                seq1_edge_best: None,
                seq2_edge_best: None,
                stats: PartitionStats::default()
            });
        }

        if let Some((_, location)) = goal {
            if location.includes(Edge::Seq1) && matching_row.is_none() {
                return self.fail(Error::MissingBoundary { what: "matching row reader", needed_by: "goal on the sequence 1 edge" });
            }
            if location.includes(Edge::Seq2) && matching_column.is_none() {
                return self.fail(Error::MissingBoundary { what: "matching column reader", needed_by: "goal on the sequence 2 edge" });
            }
        }

        let grid = match aligner.grid(&partition) {
            Ok(g) => g,
            Err(e) => return self.fail(e)
        };

        let first_row = first_row.unwrap_or_else(|| self.default_reader(Edge::Seq1));
        let first_column = first_column.unwrap_or_else(|| self.default_reader(Edge::Seq2));
        let border_prunable = self.mode == RecurrenceMode::Local
            && first_row.boundary_type() == BoundaryType::Zero
            && first_column.boundary_type() == BoundaryType::Zero;

        let pruner = if aligner.capabilities().block_pruning { self.pruning.build() } else { None };
        let pruner = pruner.map(|mut p| {
            p.set_grid(&grid);
            p.set_super_partition(self.super_partition.unwrap_or(partition));
            p.set_score_params(self.params, self.mode);
            p.set_border_prunable(border_prunable);
            if let Some((score, _)) = goal {
                p.update_best_score(score.saturating_sub(1));
            }
            Mutex::new(p)
        });

        let goal = goal.map(|(score, location)| {
            let matcher = GoalMatcher::new(score, &self.params);
            let matcher = match full_gap {
                Some(len) => matcher.with_full_gap(len),
                None => matcher
            };
            Goal { score, location, matcher }
        });

        log::info!(
            "aligning partition {} ({} cells, {}x{} blocks) with {}",
            partition,
            partition.area(),
            grid.height(),
            grid.width(),
            aligner.name()
        );

        let best_list = Arc::clone(&self.best_list);
        let sink = Arc::clone(&self.sink);
        let run = PartitionRun {
            partition,
            grid: &grid,
            offset: self.offset,
            first_row: Mutex::new(first_row),
            first_column: Mutex::new(first_column),
            seq1_edge: Mutex::new(EdgeStage::new(partition.width() + 1, last_row, matching_row)),
            seq2_edge: Mutex::new(EdgeStage::new(partition.height() + 1, last_column, matching_column)),
            pruner,
            best_list: &best_list,
            best_location: self.best_location,
            goal,
            sink: sink.as_ref(),
            special_row_interval: self.config.special_row_interval,
            stop: AtomicBool::new(false),
            crosspoint: Mutex::new(None),
            error: Mutex::new(None),
            best: Mutex::new(None),
            blocks_computed: AtomicUsize::new(0),
            cells_computed: AtomicUsize::new(0)
        };

        let job = PartitionJob { partition, grid: &grid, seq1, seq2, params: self.params, mode: self.mode };
        let result = aligner.align_partition(&job, &run);
        let latched = lock(&run.error).take();
        match (latched, result) {
            (Some(e), _) | (None, Err(e)) => return self.fail(e),
            (None, Ok(())) => ()
        }

        let stopped = run.stop.load(Ordering::Acquire);
        let mut edge_bests = [None, None];
        for (k, stage) in [&run.seq1_edge, &run.seq2_edge].into_iter().enumerate() {
            let mut stage = lock(stage);
            if !stopped && stage.next != stage.len {
                log::warn!("partition {}: edge {} of {} cells incomplete at {}", partition, k + 1, stage.len, stage.next);
            }
            if let Some(mut w) = stage.writer.take() {
                if let Err(e) = w.close() {
                    drop(stage);
                    return self.fail(e);
                }
            }
            edge_bests[k] = stage.best.map(|r| run.outward(r));
        }

        let crosspoint = *lock(&run.crosspoint);
        let best = (*lock(&run.best)).map(|r| run.outward(r));
        let stats = PartitionStats {
            blocks_computed: run.blocks_computed.load(Ordering::Relaxed),
            blocks_pruned: run.pruner.as_ref().map_or(0, |p| lock(p).pruned_blocks()),
            cells_computed: run.cells_computed.load(Ordering::Relaxed)
        };

        if let (Some(g), None) = (&run.goal, crosspoint) {
            if g.location != ScoreLocation::Nowhere {
                let e = Error::GoalNotFound { goal: g.score, partition: outward };
                return self.fail(e);
            }
        }

        self.crosspoint = crosspoint.map(|c| run.outward_crosspoint(c));
        self.state = if self.crosspoint.is_some() { ManagerState::GoalFound } else { ManagerState::BoundaryComplete };

        log::info!(
            "partition {} finished as {:?}: {} blocks computed, {} pruned",
            partition,
            self.state,
            stats.blocks_computed,
            stats.blocks_pruned
        );

        Ok(PartitionOutcome {
            partition: outward,
            state: self.state,
            crosspoint: self.crosspoint,
            best,
            seq1_edge_best: edge_bests[0],
            seq2_edge_best: edge_bests[1],
            stats
        })
    }
}

struct Goal {
    score: Score,
    location: GoalLocation,
    matcher: GoalMatcher
}

/// Reorders the chunks of one output edge and processes them in index order.
struct EdgeStage {
    pending: BTreeMap<usize, Vec<Cell>>,
    next: usize,
    len: usize,
    writer: Option<Box<dyn BoundaryWriter>>,
    matching: Option<Box<dyn BoundaryReader>>,
    best: Option<ScoreRecord>
}

impl EdgeStage {
    fn new(len: usize, writer: Option<Box<dyn BoundaryWriter>>, matching: Option<Box<dyn BoundaryReader>>) -> Self {
        Self { pending: BTreeMap::new(), next: 0, len, writer, matching, best: None }
    }
}

/// State shared with the backend while a partition runs.
struct PartitionRun<'a> {
    partition: Partition,
    grid: &'a Grid,
    offset: (isize, isize),
    first_row: Mutex<Box<dyn BoundaryReader>>,
    first_column: Mutex<Box<dyn BoundaryReader>>,
    seq1_edge: Mutex<EdgeStage>,
    seq2_edge: Mutex<EdgeStage>,
    pruner: Option<Mutex<Box<dyn BlockPruning>>>,
    best_list: &'a BestScoreList,
    best_location: ScoreLocation,
    goal: Option<Goal>,
    sink: &'a dyn EventSink,
    special_row_interval: Option<usize>,
    stop: AtomicBool,
    crosspoint: Mutex<Option<Crosspoint>>,
    error: Mutex<Option<Error>>,
    best: Mutex<Option<ScoreRecord>>,
    blocks_computed: AtomicUsize,
    cells_computed: AtomicUsize
}

impl<'a> PartitionRun<'a> {
    /// Moves a record into the caller's coordinates. `align` checked that the
    /// whole partition translates, so no cell of it can fall out of range.
    fn outward(&self, r: ScoreRecord) -> ScoreRecord {
        let translated = r.translate(self.offset.0, self.offset.1);
        debug_assert!(translated.is_some(), "cell ({}, {}) of partition {} leaves the offset range", r.i, r.j, self.partition);
        translated.unwrap_or(r)
    }

    fn outward_crosspoint(&self, c: Crosspoint) -> Crosspoint {
        let r = self.outward(c.record());
        Crosspoint::new(r.i, r.j, c.score, c.kind)
    }

    #[inline]
    fn edge_cell(&self, edge: Edge, k: usize) -> (usize, usize) {
        match edge {
            Edge::Seq1 => (self.partition.i1(), self.partition.j0() + k),
            Edge::Seq2 => (self.partition.i0() + k, self.partition.j1())
        }
    }

    /// Latches the first callback failure and stops the backend. The backend
    /// gets a copy of the message; the original is returned from `align`.
    fn abort(&self, e: Error) -> Result<()> {
        let msg = e.to_string();
        log::warn!("partition {}: stopping after callback failure: {}", self.partition, msg);
        let mut latched = lock(&self.error);
        if latched.is_none() {
            *latched = Some(e);
        }
        self.stop.store(true, Ordering::Release);
        Err(Error::Backend { backend: "manager".to_string(), msg })
    }

    fn found(&self, c: Crosspoint) {
        let mut crosspoint = lock(&self.crosspoint);
        if crosspoint.is_some() {
            return;
        }
        log::debug!("partition {}: crosspoint {}", self.partition, c);
        *crosspoint = Some(c);
        self.sink.on_crosspoint(&self.outward_crosspoint(c));
        self.stop.store(true, Ordering::Release);
    }

    fn is_found(&self) -> bool {
        lock(&self.crosspoint).is_some()
    }

    fn add_best(&self, record: ScoreRecord) {
        self.best_list.add(self.outward(record));
    }

    fn dispatch_edge(&self, edge: Edge, start: usize, cells: &[Cell]) -> Result<()> {
        if cells.is_empty() {
            return Ok(());
        }
        let stage = match edge {
            Edge::Seq1 => &self.seq1_edge,
            Edge::Seq2 => &self.seq2_edge
        };
        let mut stage = lock(stage);

        if start < stage.next || start + cells.len() > stage.len {
            let e = Error::BoundaryIo(format!(
                    "chunk [{}, {}) of edge {:?} overlaps processed cells or exceeds {} cells",
                    start, start + cells.len(), edge, stage.len));
            return self.abort(e);
        }
        log::trace!("partition {}: edge {:?} chunk at {} of {} cells", self.partition, edge, start, cells.len());
        stage.pending.insert(start, cells.to_vec());

        loop {
            let next = stage.next;
            let chunk = match stage.pending.remove(&next) {
                Some(c) => c,
                None => break
            };
            stage.next += chunk.len();
            if let Err(e) = self.process_edge(edge, &mut stage, next, &chunk) {
                return self.abort(e);
            }
        }
        Ok(())
    }

    /// Handles an edge chunk whose predecessors have all been handled.
    fn process_edge(&self, edge: Edge, stage: &mut EdgeStage, start: usize, chunk: &[Cell]) -> Result<()> {
        if let Some(w) = stage.writer.as_mut() {
            write_all(&mut **w, chunk)?;
        }
        match edge {
            Edge::Seq1 => self.sink.on_row(start, chunk),
            Edge::Seq2 => self.sink.on_column(start, chunk)
        }

        let chunk_best = chunk
            .iter()
            .enumerate()
            .map(|(k, c)| {
                let (i, j) = self.edge_cell(edge, start + k);
                ScoreRecord::new(i, j, c.h)
            })
            .min();
        if let Some(b) = chunk_best {
            if stage.best.map_or(true, |s| b < s) {
                stage.best = Some(b);
            }
            if self.best_location.includes(edge) {
                self.add_best(b);
            }
        }

        // far corner
        let corner = match (edge, chunk.last()) {
            (Edge::Seq1, Some(c)) if start + chunk.len() == stage.len => {
                Some(ScoreRecord::new(self.partition.i1(), self.partition.j1(), c.h))
            },
            _ => None
        };
        if let Some(c) = corner {
            if self.best_location == ScoreLocation::Both {
                self.add_best(c);
            }
            if let Some(g) = &self.goal {
                if g.location == ScoreLocation::Both && c.score == g.score {
                    self.found(Crosspoint::at(&c, CrosspointType::Match));
                }
            }
        }

        let goal = match &self.goal {
            Some(g) if g.location.includes(edge) => g,
            _ => return Ok(())
        };
        let reader = match stage.matching.as_mut() {
            Some(r) => r,
            None => return Ok(())
        };
        if self.is_found() {
            return Ok(());
        }

        let mut backward = vec![Cell::DEAD; chunk.len()];
        read_exact(&mut **reader, &mut backward)?;

        let full_gap = if start == 0 { goal.matcher.check_full_gap(&chunk[0]) } else { None };
        let hit = match full_gap {
            Some(m) => Some(m),
            None => goal.matcher.scan(start, chunk, &backward)?
        };

        if let Some(m) = hit {
            let (i, j) = self.edge_cell(edge, m.index);
            let kind = match (m.kind, edge) {
                (MatchKind::Match, _) => CrosspointType::Match,
                // a gap crossing the last row is vertical
                (MatchKind::Gapped, Edge::Seq1) => CrosspointType::GapInSeq2,
                (MatchKind::Gapped, Edge::Seq2) => CrosspointType::GapInSeq1
            };
            self.found(Crosspoint::new(i, j, goal.score, kind));
        }
        Ok(())
    }
}

impl<'a> PartitionCallbacks for PartitionRun<'a> {
    fn receive_first_row(&self, buf: &mut [Cell]) -> Result<()> {
        let mut reader = lock(&self.first_row);
        match read_exact(&mut **reader, buf) {
            Ok(()) => Ok(()),
            Err(e) => self.abort(e)
        }
    }

    fn receive_first_column(&self, buf: &mut [Cell]) -> Result<()> {
        let mut reader = lock(&self.first_column);
        match read_exact(&mut **reader, buf) {
            Ok(()) => Ok(()),
            Err(e) => self.abort(e)
        }
    }

    fn dispatch_row(&self, start: usize, cells: &[Cell]) -> Result<()> {
        self.dispatch_edge(Edge::Seq1, start, cells)
    }

    fn dispatch_column(&self, start: usize, cells: &[Cell]) -> Result<()> {
        self.dispatch_edge(Edge::Seq2, start, cells)
    }

    fn dispatch_special_row(&self, i: usize, j0: usize, cells: &[Cell]) -> Result<()> {
        let first = self.outward(ScoreRecord::new(i, j0, 0));
        self.sink.on_special_row(first.i, first.j, cells);
        Ok(())
    }

    fn dispatch_score(&self, record: ScoreRecord, block: Option<(usize, usize)>) {
        if let Some((bx, by)) = block {
            self.blocks_computed.fetch_add(1, Ordering::Relaxed);
            if let Some(b) = self.grid.block_position(bx, by) {
                self.cells_computed.fetch_add(b.area(), Ordering::Relaxed);
            }
            if let Some(p) = &self.pruner {
                lock(p).update_pruning_state(bx, by, record);
            }
        }

        {
            let mut best = lock(&self.best);
            if (*best).map_or(true, |b| record < b) {
                *best = Some(record);
            }
        }

        self.sink.on_score(&self.outward(record));
        if self.best_location == ScoreLocation::Anywhere {
            self.add_best(record);
        }
        if let Some(g) = &self.goal {
            if g.location == ScoreLocation::Anywhere && record.score == g.score {
                self.found(Crosspoint::at(&record, CrosspointType::Match));
            }
        }
    }

    fn must_continue(&self) -> bool {
        !self.stop.load(Ordering::Acquire)
    }

    fn must_prune_block(&self, bx: usize, by: usize) -> bool {
        match &self.pruner {
            Some(p) => lock(p).is_block_pruned(bx, by),
            None => false
        }
    }

    fn special_row_interval(&self) -> Option<usize> {
        self.special_row_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aligner::{RecordingSink, SinkEvent};
    use crate::boundary::BufferBoundaryWriter;
    use crate::scan_block::ScanBlockAligner;

    const A: &[u8] = b"ACGTACGT";
    const B: &[u8] = b"ACGTTCGT";

    fn manager(mode: RecurrenceMode) -> Manager {
        let params = ScoreParams::new(1, -3, 3, 2).unwrap();
        let config = AlignerConfig { block_height: 3, block_width: 3, ..Default::default() };
        Manager::new(params, mode, config).unwrap()
    }

    #[test]
    fn test_local_best() {
        let mut m = manager(RecurrenceMode::Local);
        m.set_partition(Partition::whole(A.len(), B.len()));
        let out = m.align(&ScanBlockAligner::new(3, 3), A, B).unwrap();

        assert_eq!(out.state, ManagerState::BoundaryComplete);
        assert_eq!(m.state(), ManagerState::BoundaryComplete);
        assert_eq!(out.best, Some(ScoreRecord::new(8, 8, 4)));
        assert_eq!(out.stats.blocks_computed + out.stats.blocks_pruned, 9);
        assert_eq!(m.best_score_list().best().map(|r| r.score), Some(4));
        assert!(!m.is_found_crosspoint());
    }

    #[test]
    fn test_goal_anywhere() {
        let mut m = manager(RecurrenceMode::Local);
        m.set_partition(Partition::whole(A.len(), B.len()));
        m.set_goal_score(4, ScoreLocation::Anywhere);
        let out = m.align(&ScanBlockAligner::new(3, 3), A, B).unwrap();

        assert_eq!(out.state, ManagerState::GoalFound);
        let c = m.get_next_crosspoint().unwrap();
        assert_eq!(c.score, 4);
        assert_eq!(c.kind, CrosspointType::Match);
        assert_eq!(out.crosspoint, Some(c));

        // the goal applies to one partition only
        m.set_partition(Partition::whole(A.len(), B.len()));
        assert!(!m.is_found_crosspoint());
        let out = m.align(&ScanBlockAligner::new(3, 3), A, B).unwrap();
        assert_eq!(out.state, ManagerState::BoundaryComplete);
    }

    #[test]
    fn test_goal_not_found() {
        let mut m = manager(RecurrenceMode::Local);
        m.set_partition(Partition::whole(A.len(), B.len()));
        m.set_goal_score(100, ScoreLocation::Anywhere);
        let res = m.align(&ScanBlockAligner::new(3, 3), A, B);
        assert!(matches!(res, Err(Error::GoalNotFound { goal: 100, .. })));
        assert_eq!(m.state(), ManagerState::Idle);
    }

    #[test]
    fn test_configuration_errors() {
        let aligner = ScanBlockAligner::new(3, 3);
        let mut m = manager(RecurrenceMode::Local);
        assert!(matches!(m.align(&aligner, A, B), Err(Error::InvalidState { .. })));

        m.set_partition(Partition::whole(A.len(), B.len()));
        m.set_goal_score(4, ScoreLocation::Seq1Edge);
        assert!(matches!(m.align(&aligner, A, B), Err(Error::MissingBoundary { .. })));

        m.set_partition(Partition::whole(A.len(), B.len()));
        m.set_coordinate_offset(-1, 0);
        assert!(matches!(m.align(&aligner, A, B), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_partition() {
        let mut m = manager(RecurrenceMode::Local);
        m.set_partition(Partition::new(3, 3, 3, 8));
        let out = m.align(&ScanBlockAligner::new(3, 3), A, B).unwrap();
        assert_eq!(out.state, ManagerState::BoundaryComplete);
        assert_eq!(out.stats, PartitionStats::default());
        assert_eq!(out.best, None);
    }

    #[test]
    fn test_global_corner_with_offset() {
        let mut m = manager(RecurrenceMode::Global);
        let writer = BufferBoundaryWriter::new();
        let row = writer.handle();
        m.set_partition(Partition::whole(A.len(), B.len()));
        m.set_last_row_writer(Box::new(writer));
        m.set_coordinate_offset(10, 20);
        let out = m.align(&ScanBlockAligner::new(3, 3), A, B).unwrap();

        assert_eq!(out.partition, Partition::new(10, 20, 18, 28));
        let row = lock(&row).clone();
        assert_eq!(row.len(), B.len() + 1);
        assert_eq!(row[B.len()].h, 4);
        assert_eq!(m.best_score_list().best(), Some(ScoreRecord::new(18, 28, 4)));
    }

    #[test]
    fn test_sink_sees_edges_in_order() {
        let sink = Arc::new(RecordingSink::new());
        let mut m = manager(RecurrenceMode::Local);
        m.set_partition(Partition::whole(A.len(), B.len()));
        m.set_sink(sink.clone());
        m.align(&ScanBlockAligner::new(3, 3), A, B).unwrap();

        let mut next_row = 0;
        let mut next_col = 0;
        for e in sink.events() {
            match e {
                SinkEvent::Row { start, cells } => {
                    assert_eq!(start, next_row);
                    next_row += cells.len();
                },
                SinkEvent::Column { start, cells } => {
                    assert_eq!(start, next_col);
                    next_col += cells.len();
                },
                _ => ()
            }
        }
        assert_eq!(next_row, B.len() + 1);
        assert_eq!(next_col, A.len() + 1);
    }

    #[test]
    fn test_offset_applies_to_every_report() {
        let sink = Arc::new(RecordingSink::new());
        let params = ScoreParams::new(1, -3, 3, 2).unwrap();
        let config = AlignerConfig { block_height: 3, block_width: 3, special_row_interval: Some(3), ..Default::default() };
        let mut m = Manager::new(params, RecurrenceMode::Local, config).unwrap();
        m.set_partition(Partition::whole(A.len(), B.len()));
        m.set_coordinate_offset(100, 200);
        m.set_sink(sink.clone());
        let out = m.align(&ScanBlockAligner::new(3, 3), A, B).unwrap();
        assert_eq!(out.best, Some(ScoreRecord::new(108, 208, 4)));

        let mut special = Vec::new();
        for e in sink.events() {
            match e {
                SinkEvent::SpecialRow { i, j0, cells } => {
                    assert!(j0 > 200 && j0 + cells.len() <= 209);
                    special.push(i);
                },
                SinkEvent::Score(r) => assert!(r.i > 100 && r.j > 200),
                _ => ()
            }
        }
        special.sort();
        special.dedup();
        assert_eq!(special, vec![103, 106]);

        m.set_partition(Partition::whole(A.len(), B.len()));
        m.set_goal_score(4, ScoreLocation::Anywhere);
        m.align(&ScanBlockAligner::new(3, 3), A, B).unwrap();
        let c = m.get_next_crosspoint().unwrap();
        assert!(c.i > 100 && c.j > 200);
        assert_eq!(c.score, 4);
        assert!(sink.events().iter().any(|e| *e == SinkEvent::Crosspoint(c)));
    }
}
