//! Sources and sinks for the boundary rows and columns of a partition.
//!
//! A reader supplies the first row (or column) of a partition; a writer
//! receives the last one. Cells of row vectors carry F in `gap`, cells of
//! column vectors carry E. Index 0 of every vector is the partition corner.

use std::sync::{Arc, Mutex};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::{Error, Result};
use crate::lock;
use crate::matrix::Cell;
use crate::scores::{Score, ScoreParams, NEG_INF};

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum BoundaryType {
    /// every cell scores zero, as in local alignment
    Zero,
    /// cells pay for a gap run from the corner
    Gap,
    /// cells extend a gap that was opened before the partition
    GapAlreadyOpen,
    /// cells come from another computation
    External
}

pub trait BoundaryReader: Send {
    /// Fills a prefix of `buf` with the next cells, returning how many were
    /// read. Zero means the boundary is exhausted.
    fn read(&mut self, buf: &mut [Cell]) -> Result<usize>;

    /// Moves to an absolute index. Streaming readers cannot seek.
    fn seek(&mut self, _offset: usize) -> Result<()> {
        Err(Error::NotSeekable(self.boundary_type()))
    }

    /// Index of the next cell to be read.
    fn offset(&self) -> usize;

    fn boundary_type(&self) -> BoundaryType;
}

pub trait BoundaryWriter: Send {
    /// Appends cells, returning how many were accepted.
    fn write(&mut self, cells: &[Cell]) -> Result<usize>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Reads until `buf` is full, failing if the boundary ends first.
pub fn read_exact(reader: &mut dyn BoundaryReader, buf: &mut [Cell]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            return Err(Error::BoundaryClosed(reader.offset()));
        }
        filled += n;
    }
    Ok(())
}

/// Writes all of `cells`, failing if the writer stops accepting them.
pub fn write_all(writer: &mut dyn BoundaryWriter, cells: &[Cell]) -> Result<()> {
    let mut written = 0;
    while written < cells.len() {
        let n = writer.write(&cells[written..])?;
        if n == 0 {
            return Err(Error::BoundaryIo(format!("writer accepted {} of {} cells", written, cells.len())));
        }
        written += n;
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct ZeroBoundaryReader {
    offset: usize
}

impl ZeroBoundaryReader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BoundaryReader for ZeroBoundaryReader {
    fn read(&mut self, buf: &mut [Cell]) -> Result<usize> {
        buf.fill(Cell::new(0, NEG_INF));
        self.offset += buf.len();
        Ok(buf.len())
    }

    fn seek(&mut self, offset: usize) -> Result<()> {
        self.offset = offset;
        Ok(())
    }

    fn offset(&self) -> usize {
        self.offset
    }

    fn boundary_type(&self) -> BoundaryType {
        BoundaryType::Zero
    }
}

/// Boundary of a global alignment: cell `k` pays for a gap of length `k`.
#[derive(Debug, Clone)]
pub struct GapBoundaryReader {
    gap_open: Score,
    gap_ext: Score,
    already_open: bool,
    offset: usize
}

impl GapBoundaryReader {
    pub fn new(params: &ScoreParams) -> Self {
        Self { gap_open: params.gap_open, gap_ext: params.gap_ext, already_open: false, offset: 0 }
    }

    /// Variant for a partition entered through a gap, which pays no open penalty.
    pub fn already_open(params: &ScoreParams) -> Self {
        Self { already_open: true, ..Self::new(params) }
    }

    #[inline]
    pub fn cell(&self, k: usize) -> Cell {
        if k == 0 {
            return Cell::new(0, NEG_INF);
        }
        let open = if self.already_open { 0 } else { self.gap_open as i64 };
        let h = -(open + k as i64 * self.gap_ext as i64);
        Cell::new(h.max(NEG_INF as i64) as Score, NEG_INF)
    }
}

impl BoundaryReader for GapBoundaryReader {
    fn read(&mut self, buf: &mut [Cell]) -> Result<usize> {
        for (k, c) in buf.iter_mut().enumerate() {
            *c = self.cell(self.offset + k);
        }
        self.offset += buf.len();
        Ok(buf.len())
    }

    fn seek(&mut self, offset: usize) -> Result<()> {
        self.offset = offset;
        Ok(())
    }

    fn offset(&self) -> usize {
        self.offset
    }

    fn boundary_type(&self) -> BoundaryType {
        if self.already_open { BoundaryType::GapAlreadyOpen } else { BoundaryType::Gap }
    }
}

/// In-memory boundary, e.g. a row kept from an earlier computation.
#[derive(Debug, Clone)]
pub struct BufferBoundaryReader {
    cells: Vec<Cell>,
    offset: usize
}

impl BufferBoundaryReader {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells, offset: 0 }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl BoundaryReader for BufferBoundaryReader {
    fn read(&mut self, buf: &mut [Cell]) -> Result<usize> {
        let n = buf.len().min(self.cells.len() - self.offset);
        buf[..n].copy_from_slice(&self.cells[self.offset..self.offset + n]);
        self.offset += n;
        Ok(n)
    }

    fn seek(&mut self, offset: usize) -> Result<()> {
        if offset > self.cells.len() {
            return Err(Error::BoundaryIo(format!("seek to {} past end of {} cells", offset, self.cells.len())));
        }
        self.offset = offset;
        Ok(())
    }

    fn offset(&self) -> usize {
        self.offset
    }

    fn boundary_type(&self) -> BoundaryType {
        BoundaryType::External
    }
}

/// Collects written cells in a shared vector.
#[derive(Debug, Clone, Default)]
pub struct BufferBoundaryWriter {
    cells: Arc<Mutex<Vec<Cell>>>,
    closed: bool
}

impl BufferBoundaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the written cells, readable after the writer is
    /// handed to a manager.
    pub fn handle(&self) -> Arc<Mutex<Vec<Cell>>> {
        Arc::clone(&self.cells)
    }

    pub fn cells(&self) -> Vec<Cell> {
        lock(&self.cells).clone()
    }
}

impl BoundaryWriter for BufferBoundaryWriter {
    fn write(&mut self, cells: &[Cell]) -> Result<usize> {
        if self.closed {
            return Err(Error::BoundaryIo("write to closed buffer".to_string()));
        }
        lock(&self.cells).extend_from_slice(cells);
        Ok(cells.len())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Creates a bounded ring buffer of cell chunks between a partition that
/// writes a boundary and one that reads it. Writes block while `capacity`
/// chunks are pending and reads block until a chunk arrives. Closing or
/// dropping the writer ends the stream.
pub fn boundary_channel(capacity: usize) -> (ChannelBoundaryWriter, ChannelBoundaryReader) {
    let (sender, receiver) = bounded(capacity.max(1));
    let writer = ChannelBoundaryWriter { sender: Some(sender), written: 0 };
    let reader = ChannelBoundaryReader { receiver, pending: Vec::new(), pos: 0, offset: 0 };
    (writer, reader)
}

#[derive(Debug)]
pub struct ChannelBoundaryWriter {
    sender: Option<Sender<Vec<Cell>>>,
    written: usize
}

impl BoundaryWriter for ChannelBoundaryWriter {
    fn write(&mut self, cells: &[Cell]) -> Result<usize> {
        let sender = match &self.sender {
            Some(s) => s,
            None => return Err(Error::BoundaryIo("write to closed channel".to_string()))
        };
        if cells.is_empty() {
            return Ok(0);
        }
        sender.send(cells.to_vec()).map_err(|_| Error::BoundaryClosed(self.written))?;
        self.written += cells.len();
        Ok(cells.len())
    }

    fn close(&mut self) -> Result<()> {
        self.sender = None;
        Ok(())
    }
}

#[derive(Debug)]
pub struct ChannelBoundaryReader {
    receiver: Receiver<Vec<Cell>>,
    pending: Vec<Cell>,
    pos: usize,
    offset: usize
}

impl BoundaryReader for ChannelBoundaryReader {
    fn read(&mut self, buf: &mut [Cell]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.pending.len() {
            match self.receiver.recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.pos = 0;
                },
                // writer closed
                Err(_) => return Ok(0)
            }
        }

        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        self.offset += n;
        Ok(n)
    }

    fn offset(&self) -> usize {
        self.offset
    }

    fn boundary_type(&self) -> BoundaryType {
        BoundaryType::External
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ScoreParams {
        ScoreParams::new(1, -3, 3, 2).unwrap()
    }

    #[test]
    fn test_gap_reader() {
        let mut r = GapBoundaryReader::new(&params());
        let mut buf = [Cell::DEAD; 4];
        assert_eq!(r.read(&mut buf).unwrap(), 4);
        let h: Vec<Score> = buf.iter().map(|c| c.h).collect();
        assert_eq!(h, vec![0, -5, -7, -9]);
        assert!(buf.iter().all(|c| c.gap == NEG_INF));
        assert_eq!(r.offset(), 4);

        let mut r = GapBoundaryReader::already_open(&params());
        r.seek(2).unwrap();
        r.read(&mut buf[..2]).unwrap();
        assert_eq!((buf[0].h, buf[1].h), (-4, -6));
        assert_eq!(r.boundary_type(), BoundaryType::GapAlreadyOpen);
    }

    #[test]
    fn test_zero_and_buffer_readers() {
        let mut buf = [Cell::DEAD; 3];
        ZeroBoundaryReader::new().read(&mut buf).unwrap();
        assert!(buf.iter().all(|&c| c == Cell::new(0, NEG_INF)));

        let cells: Vec<Cell> = (0..5).map(|k| Cell::new(k, -k)).collect();
        let mut r = BufferBoundaryReader::new(cells.clone());
        r.seek(3).unwrap();
        assert_eq!(r.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &cells[3..]);
        assert_eq!(r.read(&mut buf).unwrap(), 0);
        assert!(r.seek(6).is_err());

        r.seek(0).unwrap();
        let mut all = [Cell::DEAD; 5];
        read_exact(&mut r, &mut all).unwrap();
        assert_eq!(&all[..], &cells[..]);
        assert!(matches!(read_exact(&mut r, &mut all), Err(Error::BoundaryClosed(5))));
    }

    #[test]
    fn test_buffer_writer() {
        let mut w = BufferBoundaryWriter::new();
        let handle = w.handle();
        write_all(&mut w, &[Cell::new(1, 2), Cell::new(3, 4)]).unwrap();
        w.close().unwrap();
        assert!(w.write(&[Cell::DEAD]).is_err());
        assert_eq!(lock(&handle).len(), 2);
        assert_eq!(w.cells()[1], Cell::new(3, 4));
    }

    #[test]
    fn test_channel_streams_across_threads() {
        let (mut w, mut r) = boundary_channel(2);
        assert!(matches!(r.seek(0), Err(Error::NotSeekable(BoundaryType::External))));

        let producer = std::thread::spawn(move || {
            for k in 0..10 {
                w.write(&[Cell::new(k, 0), Cell::new(k, 1)]).unwrap();
            }
            w.close().unwrap();
        });

        let mut out = Vec::new();
        let mut buf = [Cell::DEAD; 3];
        loop {
            let n = r.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        producer.join().unwrap();

        assert_eq!(out.len(), 20);
        assert_eq!(out[19], Cell::new(9, 1));
        assert_eq!(r.offset(), 20);
    }

    #[test]
    fn test_channel_reader_gone() {
        let (mut w, r) = boundary_channel(1);
        drop(r);
        assert!(matches!(w.write(&[Cell::DEAD]), Err(Error::BoundaryClosed(0))));
    }
}
