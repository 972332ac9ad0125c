//! External sort orchestrator.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log;
use tempfile;

use crate::config::CostModel;
use crate::tape::{FileSink, FileSource, RecordSink, RecordSource, Tape, TapeError};
use crate::window::{RamWindow, WindowError};

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Chunk directory creation error.
    ChunkDir(io::Error),
    /// Tape operation error (I/O or malformed input data).
    Tape(TapeError),
    /// RAM window contract violation.
    Window(WindowError),
    /// The RAM window is too small for the run.
    WindowExceeded { capacity: usize, required: usize },
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::ChunkDir(err) => Some(err),
            SortError::Tape(err) => Some(err),
            SortError::Window(err) => Some(err),
            SortError::WindowExceeded { .. } => None,
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::ChunkDir(err) => write!(f, "chunk directory not created: {}", err),
            SortError::Tape(err) => write!(f, "tape operation failed: {}", err),
            SortError::Window(err) => write!(f, "RAM window operation failed: {}", err),
            SortError::WindowExceeded { capacity, required } => write!(
                f,
                "RAM window holds {} cells but the run needs {}",
                capacity, required
            ),
        }
    }
}

impl From<TapeError> for SortError {
    fn from(err: TapeError) -> Self {
        SortError::Tape(err)
    }
}

impl From<WindowError> for SortError {
    fn from(err: WindowError) -> Self {
        SortError::Window(err)
    }
}

/// Where chunk files live for the duration of a run.
enum ChunkDir {
    /// Removed automatically when the sorter is dropped.
    Temp(tempfile::TempDir),
    /// Caller-supplied directory, recreated clean per run and left in place
    /// so prepared chunks outlive the sorter.
    Persistent(PathBuf),
}

impl ChunkDir {
    fn path(&self) -> &Path {
        match self {
            ChunkDir::Temp(dir) => dir.path(),
            ChunkDir::Persistent(path) => path,
        }
    }
}

/// Outcome of the partition phase: the sorted chunk artifacts of one run.
#[derive(Debug)]
pub struct Partition {
    /// Chunk file paths, ordered by chunk index.
    pub chunks: Vec<PathBuf>,
    /// Total number of input records.
    pub records: u64,
    /// Simulated time charged while partitioning.
    pub elapsed_time: f64,
}

/// Outcome of a completed sort run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortSummary {
    /// Total number of records sorted.
    pub records: u64,
    /// Number of sorted chunks produced by the partition phase.
    pub chunks: usize,
    /// Total simulated time charged across every tape of the run.
    pub elapsed_time: f64,
}

/// Tape sorter builder. Provides methods for [`TapeSorter`] initialization.
#[derive(Clone, Default)]
pub struct TapeSorterBuilder {
    /// Device cost model shared by every tape of a run.
    costs: CostModel,
    /// Directory to be used to store chunk files.
    chunk_dir: Option<Box<Path>>,
}

impl TapeSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        TapeSorterBuilder::default()
    }

    /// Sets the device cost model.
    pub fn with_costs(mut self, costs: CostModel) -> TapeSorterBuilder {
        self.costs = costs;
        return self;
    }

    /// Sets the directory to be used to store chunk files. The directory is
    /// recreated clean per partition run and its chunks are left in place.
    /// Without it chunks live in a temporary directory removed on drop.
    pub fn with_chunk_dir(mut self, path: &Path) -> TapeSorterBuilder {
        self.chunk_dir = Some(path.into());
        return self;
    }

    /// Builds a [`TapeSorter`] instance using the provided configuration.
    pub fn build(self) -> Result<TapeSorter, SortError> {
        TapeSorter::new(self.costs, self.chunk_dir.as_deref())
    }
}

/// Two-phase external sort orchestrator.
///
/// Drives one source tape, `k` chunk tapes and one shared [`RamWindow`]
/// through a partition phase (cut the input into window-sized sorted chunks)
/// and a merge phase (k-way merge of the chunks into a single output),
/// charging every device operation to the simulated clock.
pub struct TapeSorter {
    costs: CostModel,
    chunk_dir: ChunkDir,
}

impl TapeSorter {
    /// Creates a new tape sorter instance.
    ///
    /// # Arguments
    /// * `costs` - Device cost model shared by every tape of a run.
    /// * `chunk_dir` - Directory to be used to store chunk files. If the
    ///   parameter is [`None`] a temporary directory removed on drop is used.
    pub fn new(costs: CostModel, chunk_dir: Option<&Path>) -> Result<Self, SortError> {
        let chunk_dir = match chunk_dir {
            Some(path) => ChunkDir::Persistent(path.to_path_buf()),
            None => ChunkDir::Temp(tempfile::tempdir().map_err(SortError::ChunkDir)?),
        };
        log::info!("using {} as the chunk directory", chunk_dir.path().display());

        return Ok(TapeSorter { costs, chunk_dir });
    }

    /// Deterministic chunk file path for a chunk index.
    fn chunk_path(&self, index: usize) -> PathBuf {
        self.chunk_dir.path().join(format!("chunk_{}.txt", index))
    }

    fn reset_chunk_dir(&self) -> Result<(), SortError> {
        if let ChunkDir::Persistent(path) = &self.chunk_dir {
            if path.exists() {
                fs::remove_dir_all(path).map_err(SortError::ChunkDir)?;
            }
            fs::create_dir_all(path).map_err(SortError::ChunkDir)?;
        }
        Ok(())
    }

    /// Partition phase: cuts the source tape into `ceil(T / C)` sorted chunks,
    /// where `T` is the record count and `C` the window capacity. Each chunk is
    /// read through the window via `read_next`, sorted in place and flushed to
    /// its own chunk file. The source tape is rewound afterwards.
    ///
    /// Zero input records is a valid degenerate case producing zero chunks.
    pub fn partition<S: RecordSource>(
        &self,
        source: &mut Tape<S>,
        ram: &mut RamWindow,
    ) -> Result<Partition, SortError> {
        self.reset_chunk_dir()?;

        let started_at = source.elapsed_time();
        let total = source.count_records()?;
        let capacity = ram.capacity() as u64;

        if total == 0 {
            log::info!("input holds no records, nothing to partition");
            return Ok(Partition {
                chunks: Vec::new(),
                records: 0,
                elapsed_time: 0.0,
            });
        }
        if capacity == 0 {
            return Err(SortError::WindowExceeded {
                capacity: 0,
                required: 1,
            });
        }

        let chunk_count = total.div_ceil(capacity) as usize;
        log::info!(
            "partitioning {} records into {} chunks of at most {} records",
            total,
            chunk_count,
            capacity
        );

        let sink_base = source.sink_count();
        let mut chunks = Vec::with_capacity(chunk_count);
        for index in 0..chunk_count {
            let path = self.chunk_path(index);
            source.add_sink(Box::new(FileSink::create(&path)?));
            chunks.push(path);
        }

        for index in 0..chunk_count {
            let chunk_records = capacity.min(total - index as u64 * capacity);

            ram.clear();
            for _ in 0..chunk_records {
                source.read_next(ram)?;
            }
            ram.sort();
            for slot in 0..chunk_records as usize {
                source.write_from(ram, slot, sink_base + index)?;
            }

            log::debug!("chunk {} holds {} sorted records", index, chunk_records);
        }

        source.flush()?;
        source.rewind();

        return Ok(Partition {
            chunks,
            records: total,
            elapsed_time: source.elapsed_time() - started_at,
        });
    }

    /// Merge phase: opens one lane tape per chunk, primes the shared window
    /// with one cell per lane, then repeatedly emits the window minimum to the
    /// merge output and refills only the consumed lane. Lane 0 carries the
    /// single merge-output sink. Terminates after exactly `records` writes;
    /// exhausted lanes hold the end-of-stream marker and never win against a
    /// remaining record.
    pub fn merge(
        &self,
        partition: &Partition,
        ram: &mut RamWindow,
        output: Box<dyn RecordSink>,
    ) -> Result<SortSummary, SortError> {
        if partition.chunks.is_empty() {
            log::info!("no chunks to merge");
            return Ok(SortSummary {
                records: 0,
                chunks: 0,
                elapsed_time: partition.elapsed_time,
            });
        }
        if ram.capacity() < partition.chunks.len() {
            return Err(SortError::WindowExceeded {
                capacity: ram.capacity(),
                required: partition.chunks.len(),
            });
        }

        log::info!(
            "merging {} chunks ({} records)",
            partition.chunks.len(),
            partition.records
        );

        let mut lanes = Vec::with_capacity(partition.chunks.len());
        for path in &partition.chunks {
            lanes.push(Tape::new(FileSource::open(path)?, self.costs));
        }
        lanes[0].add_sink(output);

        // one live-or-exhausted cell per lane, at every step boundary
        ram.clear();
        for lane in lanes.iter_mut() {
            lane.read_next(ram)?;
        }

        for _ in 0..partition.records {
            let (cell, winner) = ram.minimum()?;
            log::debug!("lane {} holds the minimum {}", winner, cell);

            let (first, rest) = lanes.split_at_mut(1);
            first[0].write_from(ram, winner, 0)?;
            // only the lane that supplied the minimum may touch the window
            // in this step
            let consumed = if winner == 0 {
                &mut first[0]
            } else {
                &mut rest[winner - 1]
            };
            consumed.read_into(ram, winner)?;
        }

        lanes[0].flush()?;

        let elapsed_time =
            partition.elapsed_time + lanes.iter().map(|lane| lane.elapsed_time()).sum::<f64>();
        return Ok(SortSummary {
            records: partition.records,
            chunks: partition.chunks.len(),
            elapsed_time,
        });
    }

    /// Runs the full sort: partition phase followed by the merge phase,
    /// writing the ascending result to `output`.
    pub fn sort<S: RecordSource>(
        &self,
        source: &mut Tape<S>,
        ram: &mut RamWindow,
        output: Box<dyn RecordSink>,
    ) -> Result<SortSummary, SortError> {
        let partition = self.partition(source, ram)?;
        self.merge(&partition, ram, output)
    }
}
