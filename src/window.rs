//! Fixed-capacity RAM window.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::mem;

use log;

/// Number of bytes one record occupies in the RAM budget.
pub const RECORD_BYTES: usize = mem::size_of::<u32>();

/// A single RAM cell: either a real record or the explicit end-of-stream
/// marker a tape leaves behind once its input is exhausted.
///
/// The derived ordering ranks `EndOfStream` strictly greater than every real
/// value, so markers always lose ties against records and sort last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Cell {
    /// A real record value.
    Value(u32),
    /// No more records on the originating tape.
    EndOfStream,
}

impl Cell {
    /// Returns the record value, or [`None`] for the end-of-stream marker.
    pub fn value(&self) -> Option<u32> {
        match self {
            Cell::Value(value) => Some(*value),
            Cell::EndOfStream => None,
        }
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Value(value) => write!(f, "{}", value),
            Cell::EndOfStream => write!(f, "end-of-stream"),
        }
    }
}

/// RAM window error.
#[derive(Debug, PartialEq, Eq)]
pub enum WindowError {
    /// An operation that needs at least one populated slot ran on an empty window.
    Empty,
}

impl Error for WindowError {}

impl Display for WindowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            WindowError::Empty => write!(f, "RAM window is empty"),
        }
    }
}

/// A fixed-capacity buffer of [`Cell`]s simulating a bounded RAM.
///
/// Capacity is derived from a byte budget at construction time and never
/// changes. The window is mutated only through its operations; slots exist
/// only once explicitly written, so "never populated" is represented by the
/// window length, not by a cell state.
pub struct RamWindow {
    cells: Vec<Cell>,
    capacity: usize,
    last_appended: Option<usize>,
}

impl RamWindow {
    /// Creates a window sized for the given RAM budget in bytes.
    /// Capacity is `ceil(byte_budget / 4)` cells.
    pub fn new(byte_budget: usize) -> Self {
        let capacity = byte_budget.div_ceil(RECORD_BYTES);
        RamWindow {
            cells: Vec::with_capacity(capacity),
            capacity,
            last_appended: None,
        }
    }

    /// Number of cells the window can hold. Constant for the window's lifetime.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of populated slots.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Checks whether no slot is populated.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Appends a cell. A full window is cleared first and the new cell becomes
    /// its sole element; the overflow is lossy by contract.
    pub fn append(&mut self, cell: Cell) {
        if self.cells.len() >= self.capacity {
            log::warn!("RAM window overflow, dropping {} cells", self.cells.len());
            self.cells.clear();
        }
        self.cells.push(cell);
        self.last_appended = Some(self.cells.len() - 1);
    }

    /// Returns the first minimal cell and its index. End-of-stream markers are
    /// strictly greater than every real value, so a record always wins.
    ///
    /// Fails on an empty window: there is no meaningful minimum to report.
    pub fn minimum(&self) -> Result<(Cell, usize), WindowError> {
        let mut min: Option<(Cell, usize)> = None;
        for (index, cell) in self.cells.iter().enumerate() {
            match min {
                Some((best, _)) if *cell >= best => {}
                _ => min = Some((*cell, index)),
            }
        }
        min.ok_or(WindowError::Empty)
    }

    /// Bounds-checked read. Out-of-range access is reported and yields nothing.
    pub fn get(&self, index: usize) -> Option<Cell> {
        if index >= self.cells.len() {
            log::warn!(
                "RAM window index {} out of range (length {})",
                index,
                self.cells.len()
            );
            return None;
        }
        Some(self.cells[index])
    }

    /// The most-recently appended cell, if any. Tracks append order only;
    /// in-place overwrites via [`RamWindow::set`] do not move it.
    pub fn last(&self) -> Option<Cell> {
        self.last_appended.map(|index| self.cells[index])
    }

    /// Bounds-checked in-place overwrite. A reported no-op when the window is
    /// empty or the index is out of range.
    pub fn set(&mut self, index: usize, cell: Cell) {
        if self.cells.is_empty() {
            log::warn!("RAM window is empty, nothing to overwrite");
            return;
        }
        if index >= self.cells.len() {
            log::warn!(
                "RAM window index {} out of range (length {})",
                index,
                self.cells.len()
            );
            return;
        }
        self.cells[index] = cell;
    }

    /// Sorts the populated slots ascending; end-of-stream markers sort last.
    pub fn sort(&mut self) {
        self.cells.sort();
    }

    /// Empties the window.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.last_appended = None;
    }
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::{Cell, RamWindow, WindowError};

    #[rstest]
    #[case(32, 8)]
    #[case(30, 8)]
    #[case(4, 1)]
    #[case(1, 1)]
    #[case(0, 0)]
    fn test_capacity(#[case] byte_budget: usize, #[case] expected: usize) {
        let window = RamWindow::new(byte_budget);
        assert_eq!(window.capacity(), expected);
    }

    #[test]
    fn test_minimum_skips_end_of_stream() {
        let mut window = RamWindow::new(32);
        window.append(Cell::Value(5));
        window.append(Cell::EndOfStream);
        window.append(Cell::Value(2));

        assert_eq!(window.minimum(), Ok((Cell::Value(2), 2)));
    }

    #[test]
    fn test_minimum_returns_first_of_equals() {
        let mut window = RamWindow::new(32);
        window.append(Cell::Value(7));
        window.append(Cell::Value(3));
        window.append(Cell::Value(3));

        assert_eq!(window.minimum(), Ok((Cell::Value(3), 1)));
    }

    #[test]
    fn test_minimum_all_end_of_stream() {
        let mut window = RamWindow::new(32);
        window.append(Cell::EndOfStream);
        window.append(Cell::EndOfStream);

        assert_eq!(window.minimum(), Ok((Cell::EndOfStream, 0)));
    }

    #[test]
    fn test_minimum_on_empty_window_fails() {
        let window = RamWindow::new(32);
        assert_eq!(window.minimum(), Err(WindowError::Empty));
    }

    #[test]
    fn test_append_overflow_clears_window() {
        let mut window = RamWindow::new(12);
        window.append(Cell::Value(1));
        window.append(Cell::Value(2));
        window.append(Cell::Value(3));
        assert_eq!(window.len(), 3);

        window.append(Cell::Value(9));

        assert_eq!(window.len(), 1);
        assert_eq!(window.get(0), Some(Cell::Value(9)));
        assert_eq!(window.last(), Some(Cell::Value(9)));
    }

    #[test]
    fn test_sort_orders_end_of_stream_last() {
        let mut window = RamWindow::new(32);
        window.append(Cell::EndOfStream);
        window.append(Cell::Value(4));
        window.append(Cell::Value(1));

        window.sort();

        assert_eq!(window.get(0), Some(Cell::Value(1)));
        assert_eq!(window.get(1), Some(Cell::Value(4)));
        assert_eq!(window.get(2), Some(Cell::EndOfStream));
    }

    #[test]
    fn test_get_out_of_range() {
        let mut window = RamWindow::new(32);
        window.append(Cell::Value(1));

        assert_eq!(window.get(1), None);
    }

    #[test]
    fn test_set_overwrites_in_place() {
        let mut window = RamWindow::new(32);
        window.append(Cell::Value(1));
        window.append(Cell::Value(2));

        window.set(0, Cell::Value(10));

        assert_eq!(window.get(0), Some(Cell::Value(10)));
        assert_eq!(window.len(), 2);
        // overwrites do not move the last-appended slot
        assert_eq!(window.last(), Some(Cell::Value(2)));
    }

    #[test]
    fn test_set_on_empty_window_is_noop() {
        let mut window = RamWindow::new(32);
        window.set(0, Cell::Value(1));
        assert!(window.is_empty());
    }

    #[test]
    fn test_clear_resets_last_appended() {
        let mut window = RamWindow::new(32);
        window.append(Cell::Value(1));
        window.clear();

        assert!(window.is_empty());
        assert_eq!(window.last(), None);
    }
}
