//! Memory-bounded writing for large sheets
//!
//! [`BigExcelWriter`] writes through a windowed workbook: each sheet keeps
//! the last rows in memory (100 by default) and spills older rows to a temp
//! file as inline-string XML. Spilled rows can no longer be read or changed.
//!
//! The package can be written once. Later flushes are no-ops, since the
//! spilled rows are consumed by the first one as far as the caller is
//! concerned.
//!
//! The writer holds `Rc`-shared styles and is therefore neither `Send` nor
//! `Sync`; the flush state is never shared between threads.

use std::io::Write;
use std::ops::{Deref, DerefMut};
use std::path::Path;

use crate::book::{Workbook, DEFAULT_WINDOW_SIZE};
use crate::error::{ExcelError, Result};
use crate::writer::{ExcelWriter, ExcelWriterBuilder};

/// Whether the package has been written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushState {
    Pending,
    Flushed,
}

/// Streaming Excel writer with a one-shot flush
///
/// Dereferences to [`ExcelWriter`] for the row API.
///
/// # Examples
///
/// ```no_run
/// use excelkit::streaming_writer::BigExcelWriter;
///
/// let mut writer = BigExcelWriter::create("big.xlsx").unwrap();
/// writer.write_head_row(["id", "value"]).unwrap();
/// for i in 0..1_000_000 {
///     writer.write_row([i as i64, i as i64 * 2]).unwrap();
/// }
/// writer.close().unwrap();
/// ```
pub struct BigExcelWriter {
    inner: ExcelWriter,
    state: FlushState,
}

impl BigExcelWriter {
    /// Streaming writer without a destination, keeping the default window
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW_SIZE)
    }

    /// Streaming writer without a destination keeping `rows` rows per sheet
    pub fn with_window(rows: usize) -> Self {
        Self::from_writer(ExcelWriter::from_workbook(Workbook::streaming(rows)))
    }

    /// Streaming writer saving to `path`; an existing xlsx file is loaded
    /// and its rows spill as new rows arrive
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        ExcelWriterBuilder::new(path).build_streaming()
    }

    /// Streaming writer over a loaded workbook. Legacy `.xls` workbooks are
    /// refused with [`ExcelError::Unsupported`].
    pub fn from_workbook(book: Workbook, rows: usize) -> Result<Self> {
        let book = book.into_streaming(rows)?;
        Ok(Self::from_writer(ExcelWriter::from_workbook(book)))
    }

    pub(crate) fn from_writer(inner: ExcelWriter) -> Self {
        BigExcelWriter {
            inner,
            state: FlushState::Pending,
        }
    }

    pub fn state(&self) -> FlushState {
        self.state
    }

    pub fn is_flushed(&self) -> bool {
        self.state == FlushState::Flushed
    }

    /// Record widths of `col` as its rows spill
    pub fn track_column(&mut self, col: usize) -> Result<()> {
        self.inner.sheet_mut()?.track_column(col)
    }

    /// Record widths of every column as rows spill. Call before writing so
    /// that spilled rows count towards auto-sizing.
    pub fn track_all_columns(&mut self) -> Result<()> {
        self.inner.sheet_mut()?.track_all_columns()
    }

    pub fn untrack_column(&mut self, col: usize) -> Result<()> {
        self.inner.sheet_mut()?.untrack_column(col)
    }

    /// Size a column from its tracked spilled widths and the rows still in
    /// the window, then stop tracking it
    pub fn autosize_column(&mut self, col: usize) -> Result<()> {
        let sheet = self.inner.sheet_mut()?;
        sheet.track_column(col)?;
        sheet.auto_size_column(col)?;
        sheet.untrack_column(col)
    }

    /// Size every column seen so far, then stop tracking
    pub fn autosize_column_all(&mut self) -> Result<()> {
        let sheet = self.inner.sheet_mut()?;
        sheet.track_all_columns()?;
        for col in 0..sheet.column_span() {
            sheet.auto_size_column(col)?;
        }
        sheet.untrack_all_columns()
    }

    /// Write the package to `out` unless it was already written
    pub fn flush_to<W: Write>(&mut self, out: &mut W) -> Result<()> {
        if self.is_flushed() {
            log::debug!("streaming workbook already flushed, skipping");
            return Ok(());
        }
        self.inner.flush_to(out)?;
        self.state = FlushState::Flushed;
        Ok(())
    }

    /// Write the package to the destination file, once
    pub fn flush(&mut self) -> Result<()> {
        if self.is_flushed() {
            log::debug!("streaming workbook already flushed, skipping");
            return Ok(());
        }
        let dest = self
            .inner
            .dest()
            .map(Path::to_path_buf)
            .ok_or(ExcelError::MissingDestination)?;
        self.flush_to_file(dest)
    }

    /// Write the package to `path`, once
    pub fn flush_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        if self.is_flushed() {
            log::debug!("streaming workbook already flushed, skipping");
            return Ok(());
        }
        self.inner.flush_to_file(path)?;
        self.state = FlushState::Flushed;
        Ok(())
    }

    /// Flush to the destination if one is set and nothing was written yet,
    /// then remove the spill files. The flush result is returned after
    /// cleanup.
    pub fn close(mut self) -> Result<()> {
        let result = if self.inner.dest().is_some() {
            self.flush()
        } else {
            Ok(())
        };
        self.inner.workbook_mut().dispose();
        log::debug!("streaming workbook disposed");
        result
    }
}

impl Default for BigExcelWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for BigExcelWriter {
    type Target = ExcelWriter;

    fn deref(&self) -> &ExcelWriter {
        &self.inner
    }
}

impl DerefMut for BigExcelWriter {
    fn deref_mut(&mut self) -> &mut ExcelWriter {
        &mut self.inner
    }
}

impl std::fmt::Debug for BigExcelWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigExcelWriter")
            .field("state", &self.state)
            .field("inner", &self.inner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::BookFormat;
    use crate::reader::ExcelReader;
    use crate::types::CellValue;
    use std::io::Cursor;

    #[test]
    fn test_flush_once() {
        let mut writer = BigExcelWriter::with_window(10);
        writer.write_row(["a", "b"]).unwrap();

        let mut first = Vec::new();
        writer.flush_to(&mut first).unwrap();
        assert!(!first.is_empty());
        assert_eq!(writer.state(), FlushState::Flushed);

        let mut second = Vec::new();
        writer.flush_to(&mut second).unwrap();
        assert!(second.is_empty());
        writer.close().unwrap();
    }

    #[test]
    fn test_window_spills() {
        let mut writer = BigExcelWriter::with_window(3);
        for i in 0..10 {
            writer.write_row([CellValue::Int(i)]).unwrap();
        }
        let sheet = writer.sheet().unwrap();
        assert_eq!(sheet.rows().count(), 3);
        assert_eq!(sheet.physical_row_count(), 10);
        assert!(matches!(
            writer.write_cell_value(0, 0, "late"),
            Err(ExcelError::RowAlreadyFlushed { row: 0 })
        ));

        let mut buf = Vec::new();
        writer.flush_to(&mut buf).unwrap();
        writer.close().unwrap();

        let reader = ExcelReader::from_reader(Cursor::new(buf)).unwrap();
        let rows = reader.read();
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0], vec![CellValue::Int(0)]);
        assert_eq!(rows[9], vec![CellValue::Int(9)]);
    }

    #[test]
    fn test_autosize_uses_tracked_widths() {
        let mut writer = BigExcelWriter::with_window(2);
        writer.track_all_columns().unwrap();
        writer.write_row(["a much longer value"]).unwrap();
        for _ in 0..5 {
            writer.write_row(["short"]).unwrap();
        }
        writer.autosize_column_all().unwrap();
        assert_eq!(writer.sheet().unwrap().column_width(0), Some(20.0));
        assert!(!writer.sheet().unwrap().is_column_tracked(0));
        writer.close().unwrap();
    }

    #[test]
    fn test_untracked_spills_are_not_measured() {
        let mut writer = BigExcelWriter::with_window(1);
        writer.write_row(["a much longer value"]).unwrap();
        writer.write_row(["short"]).unwrap();
        writer.autosize_column(0).unwrap();
        assert_eq!(writer.sheet().unwrap().column_width(0), Some(6.0));
        writer.close().unwrap();
    }

    #[test]
    fn test_legacy_workbook_refused() {
        let book = Workbook::with_format(BookFormat::Xls);
        assert!(matches!(
            BigExcelWriter::from_workbook(book, 10),
            Err(ExcelError::Unsupported(_))
        ));
    }

    #[test]
    fn test_flush_needs_destination() {
        let mut writer = BigExcelWriter::new();
        assert!(matches!(writer.flush(), Err(ExcelError::MissingDestination)));
        assert_eq!(writer.state(), FlushState::Pending);
    }
}
