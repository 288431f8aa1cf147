//! Row window of a streaming sheet: rows leaving the window spill to a temp file

use std::collections::{BTreeSet, HashMap};
use std::io::{self, BufWriter, Write};

use tempfile::NamedTempFile;

use super::{Cell, Row, StyleTable};
use crate::coerce::display_text;
use crate::error::Result;
use crate::types::{CellLocation, Hyperlink};
use crate::xlsx::sheet_xml::{RowSerializer, StringSink};
use crate::xlsx::xml_writer::XmlWriter;

/// Default number of rows kept in memory per streaming sheet
pub const DEFAULT_WINDOW_SIZE: usize = 100;

/// Upper bound of a column width, in characters
pub(crate) const MAX_COLUMN_WIDTH: f64 = 255.0;

pub(crate) struct RowWindow {
    size: usize,
    spill: Option<BufWriter<NamedTempFile>>,
    serializer: RowSerializer,
    first_flushed: Option<usize>,
    flushed_through: Option<usize>,
    flushed_count: usize,
    links: Vec<(CellLocation, Hyperlink)>,
    tracker: ColumnTracker,
}

impl RowWindow {
    pub fn new(size: usize) -> Self {
        RowWindow {
            size: size.max(1),
            spill: None,
            serializer: RowSerializer::new(),
            first_flushed: None,
            flushed_through: None,
            flushed_count: 0,
            links: Vec::new(),
            tracker: ColumnTracker::default(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Lowest spilled row index
    pub fn first_flushed(&self) -> Option<usize> {
        self.first_flushed
    }

    /// Highest spilled row index
    pub fn flushed_through(&self) -> Option<usize> {
        self.flushed_through
    }

    pub fn flushed_count(&self) -> usize {
        self.flushed_count
    }

    pub fn is_flushed(&self, y: usize) -> bool {
        self.flushed_through.is_some_and(|last| y <= last)
    }

    /// Hyperlinks of rows that already left memory
    pub fn spilled_links(&self) -> &[(CellLocation, Hyperlink)] {
        &self.links
    }

    pub fn tracker(&self) -> &ColumnTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut ColumnTracker {
        &mut self.tracker
    }

    /// Serialize a row to the spill file
    pub fn spill_row(&mut self, y: usize, row: &Row, styles: &StyleTable) -> Result<()> {
        if self.spill.is_none() {
            let file = NamedTempFile::new()?;
            log::debug!("row window spilling to {}", file.path().display());
            self.spill = Some(BufWriter::with_capacity(64 * 1024, file));
        }
        if let Some(spill) = self.spill.as_mut() {
            let mut xml = XmlWriter::new(spill);
            self.serializer
                .write_row(&mut xml, y, row, styles, &mut StringSink::Inline)?;
            xml.finish()?;
        }

        for (x, cell) in row.cells() {
            if let Some(link) = cell.hyperlink() {
                self.links.push((CellLocation::new(x, y), link.clone()));
            }
            if self.tracker.is_tracked(x) {
                self.tracker.record(x, cell_width(cell));
            }
        }
        self.first_flushed.get_or_insert(y);
        self.flushed_through = Some(y);
        self.flushed_count += 1;
        Ok(())
    }

    /// Append every spilled `<row>` to `out`; can be repeated
    pub fn copy_spilled_to<W: Write>(&mut self, out: &mut W) -> Result<()> {
        if let Some(spill) = self.spill.as_mut() {
            spill.flush()?;
            let mut file = spill.get_ref().reopen()?;
            io::copy(&mut file, out)?;
        }
        Ok(())
    }

    /// Delete the spill file
    pub fn dispose(&mut self) {
        if let Some(spill) = self.spill.take() {
            match spill.into_inner() {
                Ok(file) => {
                    if let Err(e) = file.close() {
                        log::warn!("failed to remove spill file: {}", e);
                    }
                }
                Err(e) => log::warn!("failed to flush spill file before removal: {}", e),
            }
        }
    }
}

/// Widths observed for columns tracked for auto-sizing
#[derive(Debug, Default)]
pub struct ColumnTracker {
    all: bool,
    columns: BTreeSet<usize>,
    untracked: BTreeSet<usize>,
    widths: HashMap<usize, f64>,
}

impl ColumnTracker {
    pub fn track(&mut self, col: usize) {
        self.untracked.remove(&col);
        self.columns.insert(col);
    }

    pub fn track_all(&mut self) {
        self.all = true;
        self.untracked.clear();
    }

    pub fn untrack(&mut self, col: usize) {
        self.columns.remove(&col);
        if self.all {
            self.untracked.insert(col);
        }
        self.widths.remove(&col);
    }

    pub fn untrack_all(&mut self) {
        self.all = false;
        self.columns.clear();
        self.untracked.clear();
        self.widths.clear();
    }

    pub fn is_tracked(&self, col: usize) -> bool {
        (self.all && !self.untracked.contains(&col)) || self.columns.contains(&col)
    }

    /// Widest value seen in spilled rows of a column
    pub fn width(&self, col: usize) -> Option<f64> {
        self.widths.get(&col).copied()
    }

    /// Columns with a recorded width
    pub fn measured_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.widths.keys().copied()
    }

    fn record(&mut self, col: usize, width: f64) {
        let entry = self.widths.entry(col).or_insert(0.0);
        if width > *entry {
            *entry = width;
        }
    }
}

/// Estimated display width of a cell in characters.
///
/// Wide (non-ASCII) characters count double; the font size scales the result
/// relative to 11pt, bold adds a tenth.
pub(crate) fn cell_width(cell: &Cell) -> f64 {
    let text = display_text(cell);
    let chars = text
        .lines()
        .map(|line| {
            line.chars()
                .map(|c| if c.is_ascii() { 1.0 } else { 2.0 })
                .sum::<f64>()
        })
        .fold(0.0, f64::max);
    if chars == 0.0 {
        return 0.0;
    }
    let (size, bold) = cell
        .style()
        .map(|s| s.with(|s| (s.font.size, s.font.bold)))
        .unwrap_or((11.0, false));
    let mut width = chars * size / 11.0;
    if bold {
        width *= 1.1;
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellValue;

    #[test]
    fn test_tracker() {
        let mut tracker = ColumnTracker::default();
        tracker.track(2);
        assert!(tracker.is_tracked(2));
        assert!(!tracker.is_tracked(3));

        tracker.track_all();
        tracker.untrack(4);
        assert!(tracker.is_tracked(3));
        assert!(!tracker.is_tracked(4));

        tracker.record(2, 5.0);
        tracker.record(2, 3.0);
        assert_eq!(tracker.width(2), Some(5.0));

        tracker.untrack_all();
        assert!(!tracker.is_tracked(2));
        assert_eq!(tracker.width(2), None);
    }

    #[test]
    fn test_spill_and_copy() {
        let mut window = RowWindow::new(2);
        window.tracker_mut().track(0);

        let mut row = Row::default();
        row.get_or_create_cell(0).set_value(CellValue::from("wide text"));
        window.spill_row(0, &row, &StyleTable::new()).unwrap();

        assert!(window.is_flushed(0));
        assert!(!window.is_flushed(1));
        assert_eq!(window.tracker().width(0), Some(9.0));

        let mut first = Vec::new();
        window.copy_spilled_to(&mut first).unwrap();
        let mut second = Vec::new();
        window.copy_spilled_to(&mut second).unwrap();
        assert_eq!(first, second);
        assert!(String::from_utf8(first).unwrap().contains("inlineStr"));

        window.dispose();
    }

    #[test]
    fn test_cell_width() {
        let mut cell = Cell::default();
        cell.set_value(CellValue::from("ab\nabcd"));
        assert_eq!(cell_width(&cell), 4.0);
        cell.set_value(CellValue::from("表格"));
        assert_eq!(cell_width(&cell), 4.0);
    }
}
