//! `tape-sort` simulates external (tape-based) sorting of unsigned integers
//! under a hard RAM budget, modeling the physical costs of a sequential
//! storage device.
//!
//! A sequential tape only reaches a record by moving its head across every
//! record before it, so rearranging data that does not fit in RAM is dominated
//! by device motion rather than comparisons. Sorting runs in two phases: a
//! partition phase cuts the input into RAM-window-sized chunks and writes each
//! out sorted, then a merge phase performs a k-way merge across the chunks by
//! repeatedly emitting the global minimum. Every device operation charges its
//! configured cost (read, write, head-shift, rewind) to a per-tape simulated
//! clock, so the total logical time of a run can be inspected afterwards.
//!
//! # Overview
//!
//! `tape-sort` is built from three cooperating pieces:
//!
//! * **RAM window:**
//!   a fixed-capacity buffer of [`Cell`]s sized from a byte budget, the only
//!   memory the sort is allowed to use.
//! * **Tape:**
//!   a sequential record stream with a movable head, an elapsed-time
//!   accumulator, one input source and any number of output sinks. File-backed
//!   and in-memory sources and sinks are provided.
//! * **Orchestrator:**
//!   [`TapeSorter`] drives the tapes and the shared window through the
//!   partition and merge phases.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use tape_sort::{CostModel, FileSink, FileSource, RamWindow, Tape, TapeSorterBuilder};
//!
//! fn main() {
//!     let costs = CostModel::load(Path::new("configurations.txt")).unwrap();
//!     let mut ram = RamWindow::new(32);
//!     let mut source = Tape::new(FileSource::open(Path::new("input.txt")).unwrap(), costs);
//!     let output = FileSink::create(Path::new("output.txt")).unwrap();
//!
//!     let sorter = TapeSorterBuilder::new().with_costs(costs).build().unwrap();
//!     let summary = sorter.sort(&mut source, &mut ram, Box::new(output)).unwrap();
//!
//!     println!(
//!         "sorted {} records in {} simulated time units",
//!         summary.records, summary.elapsed_time
//!     );
//! }
//! ```

pub mod config;
pub mod sort;
pub mod tape;
pub mod window;

pub use config::{ConfigError, CostModel};
pub use sort::{Partition, SortError, SortSummary, TapeSorter, TapeSorterBuilder};
pub use tape::{
    DataError, FileSink, FileSource, MemorySink, MemorySource, RecordSink, RecordSource, Tape,
    TapeError,
};
pub use window::{Cell, RamWindow, WindowError, RECORD_BYTES};
