use rayon::prelude::*;

use crate::aligner::{Aligner, AlignerCapabilities, PartitionCallbacks, PartitionJob};
use crate::config::AlignerConfig;
use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::matrix::{Cell, ScoreRecord};
use crate::partition::Partition;
use crate::scores::*;

// Notes:
//
// E[i][j] = max(E[i][j - 1] - gap_extend, H[i][j - 1] - gap_open - gap_extend)
// F[i][j] = max(F[i - 1][j] - gap_extend, H[i - 1][j] - gap_open - gap_extend)
// H[i][j] = max(H[i - 1][j - 1] + s(seq1[i], seq2[j]), E[i][j], F[i][j] [, 0 when local])
//
// A block at [bi0, bi1) x [bj0, bj1) reads the row above it (H and F at row
// bi0, columns bj0..=bj1) and the column to its left (H and E at column bj0,
// rows bi0..=bi1). It writes the same two vectors for its bottom and right
// edges. Index 0 of every vector is the shared corner, whose gap is unknown to
// the block and left dead.

/// Portable scalar backend. Blocks on the same anti-diagonal are independent
/// and are computed in parallel; every callback is made from the thread that
/// called [`Aligner::align_partition`], in block column order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScanBlockAligner {
    block_height: usize,
    block_width: usize
}

impl ScanBlockAligner {
    pub fn new(block_height: usize, block_width: usize) -> Self {
        Self { block_height, block_width }
    }

    pub fn from_config(config: &AlignerConfig) -> Self {
        Self::new(config.block_height, config.block_width)
    }
}

impl Default for ScanBlockAligner {
    fn default() -> Self {
        Self::from_config(&AlignerConfig::default())
    }
}

impl Aligner for ScanBlockAligner {
    fn name(&self) -> &str {
        "scan_block"
    }

    fn capabilities(&self) -> AlignerCapabilities {
        AlignerCapabilities { block_scores: true, block_pruning: true, special_rows: true }
    }

    fn grid(&self, partition: &Partition) -> Result<Grid> {
        Grid::with_block_size(*partition, self.block_height, self.block_width)
    }

    fn align_partition(&self, job: &PartitionJob<'_>, callbacks: &dyn PartitionCallbacks) -> Result<()> {
        let p = job.partition;
        let grid = job.grid;
        if p.i1() > job.seq1.len() || p.j1() > job.seq2.len() {
            return Err(Error::Backend {
                backend: self.name().to_string(),
                msg: format!("partition {} exceeds sequences of length {} and {}", p, job.seq1.len(), job.seq2.len())
            });
        }
        if grid.block_count() == 0 {
            return Ok(());
        }

        let (w, h) = (grid.width(), grid.height());
        let special = callbacks.special_row_interval();

        // edges handed from one diagonal to the next
        let mut tops: Vec<Vec<Cell>> = vec![Vec::new(); w];
        let mut lefts: Vec<Vec<Cell>> = vec![Vec::new(); h];
        let mut row_tail = None;
        let mut col_tail = None;

        for d in 0..grid.diagonal_count() {
            if !callbacks.must_continue() {
                log::debug!("{}: stopped before diagonal {} of {}", self.name(), d, grid.diagonal_count());
                return Ok(());
            }

            let mut blocks = Vec::new();
            for bx in grid.diagonal(d) {
                let by = d - bx;
                let position = grid.block_position(bx, by).ok_or_else(|| Error::Backend {
                    backend: self.name().to_string(),
                    msg: format!("block ({}, {}) outside grid", bx, by)
                })?;

                if by == 0 {
                    tops[bx] = read_edge(|buf| callbacks.receive_first_row(buf), &mut row_tail, position.width())?;
                }
                if bx == 0 {
                    lefts[by] = read_edge(|buf| callbacks.receive_first_column(buf), &mut col_tail, position.height())?;
                }

                let pruned = callbacks.must_prune_block(bx, by);
                let top = std::mem::take(&mut tops[bx]);
                let left = std::mem::take(&mut lefts[by]);
                blocks.push((bx, by, position, top, left, pruned));
            }

            let outputs: Vec<_> = blocks
                .into_par_iter()
                .map(|(bx, by, position, top, left, pruned)| {
                    let block = Block { seq1: job.seq1, seq2: job.seq2, params: job.params, mode: job.mode, position };
                    let res = if pruned { block.dead(&top, &left) } else { block.align(&top, &left, special, p.i0(), p.i1()) };
                    (bx, by, position, res)
                })
                .collect();

            // Callbacks stay on the driving thread. A boundary writer may block
            // on a full channel, and a pool worker stuck there can hold the
            // job its reader is waiting for.
            for (bx, by, position, res) in outputs {
                if let Some(best) = res.best {
                    callbacks.dispatch_score(best, Some((bx, by)));
                }
                for (i, cells) in res.special_rows.iter() {
                    callbacks.dispatch_special_row(*i, position.j0() + 1, cells)?;
                }
                if by == h - 1 {
                    let start = position.j0() - p.j0();
                    if bx == 0 {
                        callbacks.dispatch_row(start, &res.bottom)?;
                    } else {
                        callbacks.dispatch_row(start + 1, &res.bottom[1..])?;
                    }
                }
                if bx == w - 1 {
                    let start = position.i0() - p.i0();
                    if by == 0 {
                        callbacks.dispatch_column(start, &res.right)?;
                    } else {
                        callbacks.dispatch_column(start + 1, &res.right[1..])?;
                    }
                }
                tops[bx] = res.bottom;
                lefts[by] = res.right;
            }
        }

        Ok(())
    }
}

/// Reads the next `len` cells of a first row or column, prefixed by the last
/// cell of the previous chunk.
fn read_edge(read: impl Fn(&mut [Cell]) -> Result<()>, tail: &mut Option<Cell>, len: usize) -> Result<Vec<Cell>> {
    let mut v = vec![Cell::DEAD; len + 1];
    match *tail {
        Some(c) => {
            v[0] = c;
            read(&mut v[1..])?;
        },
        None => read(&mut v)?
    }
    *tail = v.last().copied();
    Ok(v)
}

#[inline(always)]
fn floor(x: Score) -> Score {
    cmp_max(x, NEG_INF)
}

#[inline(always)]
fn cmp_max(a: Score, b: Score) -> Score {
    if a > b { a } else { b }
}

struct Block<'a> {
    seq1: &'a [u8],
    seq2: &'a [u8],
    params: ScoreParams,
    mode: RecurrenceMode,
    position: Partition
}

struct BlockResult {
    bottom: Vec<Cell>,
    right: Vec<Cell>,
    best: Option<ScoreRecord>,
    special_rows: Vec<(usize, Vec<Cell>)>
}

impl<'a> Block<'a> {
    /// Computes the block from its top row and left column.
    ///
    /// `i0` and `i1` are the rows bounding the partition, used to place
    /// special rows.
    fn align(&self, top: &[Cell], left: &[Cell], special: Option<usize>, i0: usize, i1: usize) -> BlockResult {
        let (bi0, bj0) = (self.position.i0(), self.position.j0());
        let (bh, bw) = (self.position.height(), self.position.width());
        let gap_open_ext = self.params.gap_open + self.params.gap_ext;
        let gap_ext = self.params.gap_ext;
        let local = self.mode == RecurrenceMode::Local;

        let mut h_prev: Vec<Score> = top.iter().map(|c| c.h).collect();
        let mut f: Vec<Score> = top.iter().map(|c| c.gap).collect();
        let mut right = vec![Cell::DEAD; bh + 1];
        right[0] = Cell::new(top[bw].h, NEG_INF);

        let mut best = ScoreRecord::new(bi0, bj0, NEG_INF);
        let mut special_rows = Vec::new();
        let reference = &self.seq2[bj0..bj0 + bw];

        for r in 1..=bh {
            let i = bi0 + r;
            let a = self.seq1[i - 1];
            let mut h_diag = h_prev[0];
            let mut h_left = left[r].h;
            let mut e = left[r].gap;

            for (c, &b) in (1..=bw).zip(reference.iter()) {
                e = floor(cmp_max(e - gap_ext, h_left - gap_open_ext));
                f[c] = floor(cmp_max(f[c] - gap_ext, h_prev[c] - gap_open_ext));
                let mut h = cmp_max(floor(h_diag + self.params.substitution(a, b)), cmp_max(e, f[c]));
                if local {
                    h = cmp_max(h, 0);
                }

                // ties go to the later cell
                if h >= best.score {
                    best = ScoreRecord::new(i, bj0 + c, h);
                }

                h_diag = h_prev[c];
                h_prev[c] = h;
                h_left = h;
            }

            h_prev[0] = left[r].h;
            right[r] = Cell::new(h_left, e);

            if let Some(n) = special {
                if i < i1 && (i - i0) % n == 0 {
                    let cells = (1..=bw).map(|c| Cell::new(h_prev[c], f[c])).collect();
                    special_rows.push((i, cells));
                }
            }
        }

        let mut bottom = Vec::with_capacity(bw + 1);
        bottom.push(Cell::new(left[bh].h, NEG_INF));
        bottom.extend((1..=bw).map(|c| Cell::new(h_prev[c], f[c])));

        BlockResult { bottom, right, best: Some(best), special_rows }
    }

    /// Edges of a skipped block. Only the corners, which belong to the
    /// neighbouring blocks, are kept.
    fn dead(&self, top: &[Cell], left: &[Cell]) -> BlockResult {
        let (bh, bw) = (self.position.height(), self.position.width());
        let mut bottom = vec![Cell::DEAD; bw + 1];
        bottom[0] = Cell::new(left[bh].h, NEG_INF);
        let mut right = vec![Cell::DEAD; bh + 1];
        right[0] = Cell::new(top[bw].h, NEG_INF);
        BlockResult { bottom, right, best: None, special_rows: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::thread::{self, ThreadId};

    use rand::prelude::*;

    use crate::boundary::{BoundaryReader, GapBoundaryReader, ZeroBoundaryReader};
    use crate::lock;
    use crate::simulate::*;

    use super::*;

    struct Collect {
        first_row: Mutex<Box<dyn BoundaryReader>>,
        first_col: Mutex<Box<dyn BoundaryReader>>,
        last_row: Mutex<Vec<Cell>>,
        last_col: Mutex<Vec<Cell>>,
        best: Mutex<Option<ScoreRecord>>,
        special: Mutex<Vec<usize>>,
        threads: Mutex<HashSet<ThreadId>>,
        interval: Option<usize>,
        prune: Vec<(usize, usize)>
    }

    impl Collect {
        fn new(params: &ScoreParams, mode: RecurrenceMode, len1: usize, len2: usize) -> Self {
            let reader = || -> Box<dyn BoundaryReader> {
                match mode {
                    RecurrenceMode::Local => Box::new(ZeroBoundaryReader::new()),
                    RecurrenceMode::Global => Box::new(GapBoundaryReader::new(params))
                }
            };
            Self {
                first_row: Mutex::new(reader()),
                first_col: Mutex::new(reader()),
                last_row: Mutex::new(vec![Cell::DEAD; len2 + 1]),
                last_col: Mutex::new(vec![Cell::DEAD; len1 + 1]),
                best: Mutex::new(None),
                special: Mutex::new(Vec::new()),
                threads: Mutex::new(HashSet::new()),
                interval: None,
                prune: Vec::new()
            }
        }
    }

    impl PartitionCallbacks for Collect {
        fn receive_first_row(&self, buf: &mut [Cell]) -> Result<()> {
            let mut r = lock(&self.first_row);
            crate::boundary::read_exact(&mut **r, buf)
        }

        fn receive_first_column(&self, buf: &mut [Cell]) -> Result<()> {
            let mut r = lock(&self.first_col);
            crate::boundary::read_exact(&mut **r, buf)
        }

        fn dispatch_row(&self, start: usize, cells: &[Cell]) -> Result<()> {
            lock(&self.threads).insert(thread::current().id());
            lock(&self.last_row)[start..start + cells.len()].copy_from_slice(cells);
            Ok(())
        }

        fn dispatch_column(&self, start: usize, cells: &[Cell]) -> Result<()> {
            lock(&self.threads).insert(thread::current().id());
            lock(&self.last_col)[start..start + cells.len()].copy_from_slice(cells);
            Ok(())
        }

        fn dispatch_special_row(&self, i: usize, _j0: usize, _cells: &[Cell]) -> Result<()> {
            lock(&self.special).push(i);
            Ok(())
        }

        fn dispatch_score(&self, record: ScoreRecord, _block: Option<(usize, usize)>) {
            lock(&self.threads).insert(thread::current().id());
            let mut best = lock(&self.best);
            if best.map_or(true, |b| record < b) {
                *best = Some(record);
            }
        }

        fn must_continue(&self) -> bool {
            true
        }

        fn must_prune_block(&self, bx: usize, by: usize) -> bool {
            self.prune.contains(&(bx, by))
        }

        fn special_row_interval(&self) -> Option<usize> {
            self.interval
        }
    }

    // straightforward full-matrix Gotoh, returning (best, last row, last column)
    fn full_dp(a: &[u8], b: &[u8], params: &ScoreParams, mode: RecurrenceMode) -> (ScoreRecord, Vec<Score>, Vec<Score>) {
        let (n, m) = (a.len(), b.len());
        let mut hm = vec![vec![0; m + 1]; n + 1];
        let mut em = vec![vec![NEG_INF; m + 1]; n + 1];
        let mut fm = vec![vec![NEG_INF; m + 1]; n + 1];
        if mode == RecurrenceMode::Global {
            for j in 1..=m {
                hm[0][j] = -params.gap_cost(j);
            }
            for i in 1..=n {
                hm[i][0] = -params.gap_cost(i);
            }
        }

        let go = params.gap_open + params.gap_ext;
        let mut best = ScoreRecord::new(0, 0, NEG_INF);
        for i in 1..=n {
            for j in 1..=m {
                em[i][j] = (em[i][j - 1] - params.gap_ext).max(hm[i][j - 1] - go).max(NEG_INF);
                fm[i][j] = (fm[i - 1][j] - params.gap_ext).max(hm[i - 1][j] - go).max(NEG_INF);
                let mut h = (hm[i - 1][j - 1] + params.substitution(a[i - 1], b[j - 1])).max(em[i][j]).max(fm[i][j]);
                if mode == RecurrenceMode::Local {
                    h = h.max(0);
                }
                hm[i][j] = h;
                if h >= best.score {
                    best = ScoreRecord::new(i, j, h);
                }
            }
        }
        let col = (0..=n).map(|i| hm[i][m]).collect();
        (best, hm[n].clone(), col)
    }

    fn run(a: &[u8], b: &[u8], params: ScoreParams, mode: RecurrenceMode, bh: usize, bw: usize) -> Collect {
        let aligner = ScanBlockAligner::new(bh, bw);
        let partition = Partition::whole(a.len(), b.len());
        let grid = aligner.grid(&partition).unwrap();
        let job = PartitionJob { partition, grid: &grid, seq1: a, seq2: b, params, mode };
        let cb = Collect::new(&params, mode, a.len(), b.len());
        aligner.align_partition(&job, &cb).unwrap();
        cb
    }

    #[test]
    fn test_small_local() {
        let params = ScoreParams::new(1, -3, 3, 2).unwrap();
        let cb = run(b"ACGTACGT", b"ACGTTCGT", params, RecurrenceMode::Local, 3, 3);
        assert_eq!(*lock(&cb.best), Some(ScoreRecord::new(8, 8, 4)));
    }

    #[test]
    fn test_matches_full_dp() {
        let mut rng = StdRng::seed_from_u64(1234);
        let params = ScoreParams::new(2, -3, 5, 1).unwrap();

        for &(len, bh, bw) in [(2, 1, 1), (17, 4, 5), (40, 7, 3), (64, 64, 64), (50, 16, 9)].iter() {
            let a = rand_str(len, &NUC, &mut rng);
            let b = rand_mutate(&a, len / 5 + 1, &NUC, &mut rng);

            for &mode in [RecurrenceMode::Local, RecurrenceMode::Global].iter() {
                let (best, row, col) = full_dp(&a, &b, &params, mode);
                let cb = run(&a, &b, params, mode, bh, bw);

                let got_row: Vec<Score> = lock(&cb.last_row).iter().map(|c| c.h).collect();
                let got_col: Vec<Score> = lock(&cb.last_col).iter().map(|c| c.h).collect();
                assert_eq!(got_row, row, "last row, len {} mode {:?}", len, mode);
                assert_eq!(got_col, col, "last column, len {} mode {:?}", len, mode);
                if mode == RecurrenceMode::Local {
                    assert_eq!(*lock(&cb.best), Some(best));
                }
            }
        }
    }

    #[test]
    fn test_special_rows_and_pruned_blocks() {
        let params = ScoreParams::new(1, -1, 1, 1).unwrap();
        let a = b"ACGTACGTACGT";
        let aligner = ScanBlockAligner::new(4, 4);
        let partition = Partition::whole(a.len(), a.len());
        let grid = aligner.grid(&partition).unwrap();
        let job = PartitionJob { partition, grid: &grid, seq1: a, seq2: a, params, mode: RecurrenceMode::Local };

        let mut cb = Collect::new(&params, RecurrenceMode::Local, a.len(), a.len());
        cb.interval = Some(5);
        cb.prune = vec![(2, 0)];
        aligner.align_partition(&job, &cb).unwrap();

        let mut special = lock(&cb.special).clone();
        special.sort();
        special.dedup();
        assert_eq!(special, vec![5, 10]);

        // the pruned block only feeds dead cells into the last column
        let col = lock(&cb.last_col);
        assert_eq!(col[1].h, NEG_INF);
        assert_eq!(col[12].h, 12);
    }

    #[test]
    fn test_callbacks_on_calling_thread() {
        let mut rng = StdRng::seed_from_u64(5);
        let params = ScoreParams::new(2, -3, 5, 1).unwrap();
        let a = rand_str(200, &NUC, &mut rng);
        let b = rand_mutate(&a, 20, &NUC, &mut rng);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();

        let cb = pool.install(|| run(&a, &b, params, RecurrenceMode::Global, 4, 4));
        let threads = lock(&cb.threads);
        assert_eq!(threads.len(), 1);
    }
}
