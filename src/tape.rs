//! Sequential tape device model.
//!
//! A [`Tape`] couples one read-only sequential input with any number of
//! append-only output sinks, a head position measured in logical records and
//! an elapsed-time accumulator fed by the [`CostModel`]. Reads land in a
//! [`RamWindow`] passed by handle; writes are sourced from it. The head is an
//! abstract cursor over fixed-size logical records, so the cost model is
//! independent of the physical byte layout of the backing store.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::io::SeekFrom;
use std::path::Path;

use log;

use crate::config::CostModel;
use crate::window::{Cell, RamWindow};

/// Malformed input line error. Carries enough context to diagnose the line.
#[derive(Debug)]
pub struct DataError {
    /// 1-based line number of the offending line.
    pub line_number: u64,
    /// Offending line content.
    pub content: String,
}

impl Error for DataError {}

impl Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {} is not an unsigned integer: '{}'",
            self.line_number, self.content
        )
    }
}

/// Tape operation error.
#[derive(Debug)]
pub enum TapeError {
    /// Underlying storage I/O error.
    Io(io::Error),
    /// Malformed record on the input.
    Data(DataError),
}

impl Error for TapeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            TapeError::Io(err) => Some(err),
            TapeError::Data(err) => Some(err),
        }
    }
}

impl Display for TapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            TapeError::Io(err) => write!(f, "tape I/O operation failed: {}", err),
            TapeError::Data(err) => write!(f, "tape data format error: {}", err),
        }
    }
}

impl From<io::Error> for TapeError {
    fn from(err: io::Error) -> Self {
        TapeError::Io(err)
    }
}

/// Random-access view over a sequence of logical records backing a tape input.
///
/// Implementations may be genuinely random-access (memory) or sequential with
/// repositioning (files); the tape only ever asks for monotonically close
/// indices, so a sequential implementation stays cheap.
pub trait RecordSource {
    /// Reads the record at the given logical index.
    /// Returns [`None`] when the index is past the last record.
    fn read_record(&mut self, index: u64) -> Result<Option<u32>, TapeError>;
}

/// Append-only record consumer backing a tape output.
pub trait RecordSink {
    /// Appends one record.
    fn append(&mut self, value: u32) -> Result<(), TapeError>;

    /// Flushes buffered records to the backing store.
    fn flush(&mut self) -> Result<(), TapeError>;
}

/// File-backed record source: one unsigned decimal integer per line.
///
/// Keeps its own line cursor; asking for an earlier index rewinds the file
/// and skips forward, so logical indices map to lines without assuming a
/// fixed physical record width.
pub struct FileSource {
    reader: io::BufReader<fs::File>,
    cursor: u64,
}

impl FileSource {
    /// Opens an input file.
    pub fn open(path: &Path) -> Result<Self, TapeError> {
        let file = fs::File::open(path)?;
        return Ok(FileSource {
            reader: io::BufReader::new(file),
            cursor: 0,
        });
    }

    fn next_line(&mut self) -> Result<Option<String>, TapeError> {
        let mut line = String::new();
        let bytes = self.reader.read_line(&mut line)?;
        if bytes == 0 {
            return Ok(None);
        }
        self.cursor += 1;
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        return Ok(Some(line));
    }
}

impl RecordSource for FileSource {
    fn read_record(&mut self, index: u64) -> Result<Option<u32>, TapeError> {
        if index < self.cursor {
            self.reader.seek(SeekFrom::Start(0))?;
            self.cursor = 0;
        }
        while self.cursor < index {
            if self.next_line()?.is_none() {
                return Ok(None);
            }
        }

        match self.next_line()? {
            None => Ok(None),
            Some(line) => {
                let value = line.trim().parse().map_err(|_| {
                    TapeError::Data(DataError {
                        line_number: index + 1,
                        content: line.clone(),
                    })
                })?;
                Ok(Some(value))
            }
        }
    }
}

/// In-memory record source.
pub struct MemorySource {
    records: Vec<u32>,
}

impl MemorySource {
    pub fn new(records: Vec<u32>) -> Self {
        MemorySource { records }
    }
}

impl RecordSource for MemorySource {
    fn read_record(&mut self, index: u64) -> Result<Option<u32>, TapeError> {
        Ok(self.records.get(index as usize).copied())
    }
}

/// File-backed record sink: one unsigned decimal integer per line.
pub struct FileSink {
    writer: io::BufWriter<fs::File>,
}

impl FileSink {
    /// Creates (or truncates) an output file.
    pub fn create(path: &Path) -> Result<Self, TapeError> {
        let file = fs::File::create(path)?;
        return Ok(FileSink {
            writer: io::BufWriter::new(file),
        });
    }
}

impl RecordSink for FileSink {
    fn append(&mut self, value: u32) -> Result<(), TapeError> {
        writeln!(self.writer, "{}", value)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TapeError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// In-memory record sink sharing its storage with the creator through a
/// cloneable handle, so written records stay observable after the sink has
/// been handed to a tape.
#[derive(Clone, Default)]
pub struct MemorySink {
    records: std::rc::Rc<std::cell::RefCell<Vec<u32>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        MemorySink::default()
    }

    /// Snapshot of the records written so far.
    pub fn records(&self) -> Vec<u32> {
        self.records.borrow().clone()
    }
}

impl RecordSink for MemorySink {
    fn append(&mut self, value: u32) -> Result<(), TapeError> {
        self.records.borrow_mut().push(value);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TapeError> {
        Ok(())
    }
}

/// Sequential-access tape with a movable head and a logical time cost.
///
/// Every operation that touches the device charges the matching [`CostModel`]
/// cost to the elapsed-time accumulator; planning queries charge nothing.
pub struct Tape<S: RecordSource> {
    source: S,
    sinks: Vec<Box<dyn RecordSink>>,
    head: u64,
    elapsed_time: f64,
    costs: CostModel,
}

impl<S: RecordSource> Tape<S> {
    /// Creates a tape over the given input source.
    pub fn new(source: S, costs: CostModel) -> Self {
        Tape {
            source,
            sinks: Vec::new(),
            head: 0,
            elapsed_time: 0.0,
            costs,
        }
    }

    /// Attaches an output sink and returns its index.
    pub fn add_sink(&mut self, sink: Box<dyn RecordSink>) -> usize {
        self.sinks.push(sink);
        self.sinks.len() - 1
    }

    /// Number of attached output sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Current head position, in records.
    pub fn position(&self) -> u64 {
        self.head
    }

    /// Total simulated time charged so far. Monotonically non-decreasing.
    pub fn elapsed_time(&self) -> f64 {
        self.elapsed_time
    }

    /// Reads the record at the head and appends it to the window, advancing
    /// the head and charging `read + shift`. On exhaustion the end-of-stream
    /// marker is appended instead, with no head motion and no charge:
    /// exhaustion is the tape's encoding of "nothing more here", not an error.
    pub fn read_next(&mut self, ram: &mut RamWindow) -> Result<(), TapeError> {
        match self.source.read_record(self.head)? {
            Some(value) => {
                ram.append(Cell::Value(value));
                self.head += 1;
                self.elapsed_time += self.costs.read + self.costs.shift;
            }
            None => ram.append(Cell::EndOfStream),
        }
        Ok(())
    }

    /// Same read semantics as [`Tape::read_next`], but the result overwrites
    /// window slot `lane` in place. Used during merge to refill exactly the
    /// lane that supplied the previous minimum.
    pub fn read_into(&mut self, ram: &mut RamWindow, lane: usize) -> Result<(), TapeError> {
        match self.source.read_record(self.head)? {
            Some(value) => {
                ram.set(lane, Cell::Value(value));
                self.head += 1;
                self.elapsed_time += self.costs.read + self.costs.shift;
            }
            None => ram.set(lane, Cell::EndOfStream),
        }
        Ok(())
    }

    /// Writes the window's most-recently appended cell to the given sink and
    /// charges `write`. An end-of-stream marker (or an empty window) is
    /// silently suppressed: nothing is written and nothing is charged.
    pub fn write_last(&mut self, ram: &RamWindow, sink: usize) -> Result<(), TapeError> {
        let value = ram.last().and_then(|cell| cell.value());
        self.write_value(value, sink)
    }

    /// Same as [`Tape::write_last`], sourcing an explicit window slot.
    pub fn write_from(&mut self, ram: &RamWindow, slot: usize, sink: usize) -> Result<(), TapeError> {
        let value = ram.get(slot).and_then(|cell| cell.value());
        self.write_value(value, sink)
    }

    fn write_value(&mut self, value: Option<u32>, sink: usize) -> Result<(), TapeError> {
        let value = match value {
            Some(value) => value,
            None => return Ok(()),
        };
        match self.sinks.get_mut(sink) {
            Some(output) => {
                output.append(value)?;
                self.elapsed_time += self.costs.write;
            }
            None => log::warn!("tape has no output sink {}", sink),
        }
        Ok(())
    }

    /// Moves the head one record towards the beginning, charging `shift`.
    /// At position 0 this is a reported no-op.
    pub fn shift_left(&mut self) {
        if self.head == 0 {
            log::warn!("head is at the beginning of the tape, cannot shift left");
            return;
        }
        self.head -= 1;
        self.elapsed_time += self.costs.shift;
    }

    /// Moves the head one record towards the end, charging `shift`.
    /// At the last record this is a reported no-op.
    pub fn shift_right(&mut self) -> Result<(), TapeError> {
        if self.source.read_record(self.head + 1)?.is_none() {
            log::warn!("head is at the end of the tape, cannot shift right");
            return Ok(());
        }
        self.head += 1;
        self.elapsed_time += self.costs.shift;
        Ok(())
    }

    /// Resets the head to the beginning and charges `rewind`.
    /// The record order of the input is unaffected.
    pub fn rewind(&mut self) {
        self.head = 0;
        self.elapsed_time += self.costs.rewind;
    }

    /// Counts the records remaining from the current head position, restoring
    /// the head afterwards. A planning query: charges no simulated time.
    pub fn count_records(&mut self) -> Result<u64, TapeError> {
        let mut count = 0;
        while self.source.read_record(self.head + count)?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    /// Flushes every attached output sink.
    pub fn flush(&mut self) -> Result<(), TapeError> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use rstest::*;

    use super::{
        FileSource, MemorySink, MemorySource, RecordSink, RecordSource, Tape, TapeError,
    };
    use crate::config::CostModel;
    use crate::window::{Cell, RamWindow};

    fn memory_tape(records: Vec<u32>, costs: CostModel) -> Tape<MemorySource> {
        Tape::new(MemorySource::new(records), costs)
    }

    #[test]
    fn test_read_next_charges_read_and_shift() {
        let mut ram = RamWindow::new(32);
        let mut tape = memory_tape(vec![7, 8], CostModel::new(1.0, 10.0, 0.25, 100.0));

        tape.read_next(&mut ram).unwrap();

        assert_eq!(ram.get(0), Some(Cell::Value(7)));
        assert_eq!(tape.position(), 1);
        assert_eq!(tape.elapsed_time(), 1.25);
    }

    #[test]
    fn test_read_next_exhaustion_appends_marker_for_free() {
        let mut ram = RamWindow::new(32);
        let mut tape = memory_tape(vec![7], CostModel::new(1.0, 1.0, 1.0, 1.0));

        tape.read_next(&mut ram).unwrap();
        let elapsed = tape.elapsed_time();
        tape.read_next(&mut ram).unwrap();

        assert_eq!(ram.get(1), Some(Cell::EndOfStream));
        assert_eq!(tape.position(), 1);
        assert_eq!(tape.elapsed_time(), elapsed);
    }

    #[test]
    fn test_read_into_refills_single_lane() {
        let mut ram = RamWindow::new(32);
        ram.append(Cell::Value(1));
        ram.append(Cell::Value(2));

        let mut tape = memory_tape(vec![9], CostModel::free());
        tape.read_into(&mut ram, 0).unwrap();

        assert_eq!(ram.get(0), Some(Cell::Value(9)));
        assert_eq!(ram.get(1), Some(Cell::Value(2)));

        // exhausted now: the lane turns into an end-of-stream marker
        tape.read_into(&mut ram, 0).unwrap();
        assert_eq!(ram.get(0), Some(Cell::EndOfStream));
    }

    #[test]
    fn test_write_from_suppresses_end_of_stream() {
        let mut ram = RamWindow::new(32);
        ram.append(Cell::Value(5));
        ram.append(Cell::EndOfStream);

        let sink = MemorySink::new();
        let mut tape = memory_tape(vec![], CostModel::new(0.0, 3.0, 0.0, 0.0));
        tape.add_sink(Box::new(sink.clone()));

        tape.write_from(&ram, 0, 0).unwrap();
        tape.write_from(&ram, 1, 0).unwrap();

        assert_eq!(sink.records(), vec![5]);
        assert_eq!(tape.elapsed_time(), 3.0);
    }

    #[test]
    fn test_write_last_uses_most_recently_appended() {
        let mut ram = RamWindow::new(32);
        ram.append(Cell::Value(5));
        ram.append(Cell::Value(6));
        ram.set(0, Cell::Value(42));

        let sink = MemorySink::new();
        let mut tape = memory_tape(vec![], CostModel::free());
        tape.add_sink(Box::new(sink.clone()));

        tape.write_last(&ram, 0).unwrap();

        assert_eq!(sink.records(), vec![6]);
    }

    #[test]
    fn test_shift_left_at_beginning_is_noop() {
        let mut tape = memory_tape(vec![1, 2], CostModel::new(0.0, 0.0, 1.0, 0.0));

        tape.shift_left();

        assert_eq!(tape.position(), 0);
        assert_eq!(tape.elapsed_time(), 0.0);
    }

    #[test]
    fn test_shift_right_at_last_record_is_noop() {
        let mut ram = RamWindow::new(32);
        let mut tape = memory_tape(vec![1, 2], CostModel::new(0.0, 0.0, 1.0, 0.0));
        tape.read_next(&mut ram).unwrap();
        assert_eq!(tape.position(), 1);

        // head is at the last record, shifting right must not move it
        tape.shift_right().unwrap();
        assert_eq!(tape.position(), 1);
        assert_eq!(tape.elapsed_time(), 1.0);

        tape.shift_left();
        assert_eq!(tape.position(), 0);

        tape.shift_right().unwrap();
        assert_eq!(tape.position(), 1);
    }

    #[test]
    fn test_rewind_restores_read_order() {
        let mut ram = RamWindow::new(32);
        let costs = CostModel::new(0.0, 0.0, 0.0, 7.0);
        let mut tape = memory_tape(vec![3, 1, 2], costs);

        for _ in 0..3 {
            tape.read_next(&mut ram).unwrap();
        }
        tape.rewind();
        assert_eq!(tape.position(), 0);
        assert_eq!(tape.elapsed_time(), 7.0);

        ram.clear();
        for _ in 0..3 {
            tape.read_next(&mut ram).unwrap();
        }
        let reread: Vec<_> = (0..3).map(|i| ram.get(i).unwrap()).collect();
        assert_eq!(
            reread,
            vec![Cell::Value(3), Cell::Value(1), Cell::Value(2)]
        );
    }

    #[test]
    fn test_count_records_is_free_and_restores_head() {
        let mut ram = RamWindow::new(32);
        let mut tape = memory_tape(vec![1, 2, 3, 4], CostModel::new(1.0, 1.0, 1.0, 1.0));
        tape.read_next(&mut ram).unwrap();
        let elapsed = tape.elapsed_time();

        assert_eq!(tape.count_records().unwrap(), 3);
        assert_eq!(tape.position(), 1);
        assert_eq!(tape.elapsed_time(), elapsed);

        // the scan must not disturb subsequent reads
        tape.read_next(&mut ram).unwrap();
        assert_eq!(ram.get(1), Some(Cell::Value(2)));
    }

    #[rstest]
    #[case(&[5u32, 10, 0, u32::MAX])]
    #[case(&[])]
    fn test_file_source_reads_lines(#[case] records: &[u32]) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for record in records {
            writeln!(file, "{}", record).unwrap();
        }
        file.flush().unwrap();

        let mut source = FileSource::open(file.path()).unwrap();
        for (index, record) in records.iter().enumerate() {
            assert_eq!(source.read_record(index as u64).unwrap(), Some(*record));
        }
        assert_eq!(source.read_record(records.len() as u64).unwrap(), None);
    }

    #[test]
    fn test_file_source_rereads_earlier_records() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "10\n20\n30\n").unwrap();
        file.flush().unwrap();

        let mut source = FileSource::open(file.path()).unwrap();
        assert_eq!(source.read_record(2).unwrap(), Some(30));
        assert_eq!(source.read_record(0).unwrap(), Some(10));
        assert_eq!(source.read_record(1).unwrap(), Some(20));
    }

    #[test]
    fn test_file_source_reports_malformed_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "1\nnot-a-number\n3\n").unwrap();
        file.flush().unwrap();

        let mut source = FileSource::open(file.path()).unwrap();
        assert_eq!(source.read_record(0).unwrap(), Some(1));

        match source.read_record(1) {
            Err(TapeError::Data(err)) => {
                assert_eq!(err.line_number, 2);
                assert_eq!(err.content, "not-a-number");
            }
            other => panic!("expected a data error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_file_sink_writes_one_record_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");

        let mut sink = super::FileSink::create(&path).unwrap();
        sink.append(1).unwrap();
        sink.append(2).unwrap();
        sink.flush().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1\n2\n");
    }
}
