//! Sheets, rows and cell ranges

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

use super::window::{cell_width, RowWindow, MAX_COLUMN_WIDTH};
use super::{Cell, StyleTable};
use crate::error::{ExcelError, Result};
use crate::types::{to_location, CellLocation, Hyperlink, MAX_COLUMNS};

/// Rectangular, inclusive range of cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub first_row: usize,
    pub last_row: usize,
    pub first_col: usize,
    pub last_col: usize,
}

/// Merged cells share the value of their top-left anchor
pub type MergedRegion = CellRange;

impl CellRange {
    /// Range with normalized bounds
    pub fn new(first_row: usize, last_row: usize, first_col: usize, last_col: usize) -> Self {
        CellRange {
            first_row: first_row.min(last_row),
            last_row: first_row.max(last_row),
            first_col: first_col.min(last_col),
            last_col: first_col.max(last_col),
        }
    }

    /// Parse `"A1:C3"` or a single `"B2"`
    pub fn parse(reference: &str) -> Result<Self> {
        let (start, end) = match reference.split_once(':') {
            Some((a, b)) => (to_location(a)?, to_location(b)?),
            None => {
                let loc = to_location(reference)?;
                (loc, loc)
            }
        };
        Ok(CellRange::new(start.y, end.y, start.x, end.x))
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        (self.first_col..=self.last_col).contains(&x) && (self.first_row..=self.last_row).contains(&y)
    }

    pub fn intersects(&self, other: &CellRange) -> bool {
        self.first_row <= other.last_row
            && other.first_row <= self.last_row
            && self.first_col <= other.last_col
            && other.first_col <= self.last_col
    }

    /// Top-left cell
    pub fn anchor(&self) -> CellLocation {
        CellLocation::new(self.first_col, self.first_row)
    }

    pub fn is_single_cell(&self) -> bool {
        self.first_row == self.last_row && self.first_col == self.last_col
    }

    pub fn reference(&self) -> String {
        let start = self.anchor().reference();
        if self.is_single_cell() {
            return start;
        }
        format!(
            "{}:{}",
            start,
            CellLocation::new(self.last_col, self.last_row).reference()
        )
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reference())
    }
}

/// One sheet row: cells keyed by column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: BTreeMap<usize, Cell>,
    height: Option<f64>,
}

impl Row {
    pub fn cell(&self, x: usize) -> Option<&Cell> {
        self.cells.get(&x)
    }

    pub fn cell_mut(&mut self, x: usize) -> Option<&mut Cell> {
        self.cells.get_mut(&x)
    }

    pub fn get_or_create_cell(&mut self, x: usize) -> &mut Cell {
        self.cells.entry(x).or_default()
    }

    pub fn remove_cell(&mut self, x: usize) -> Option<Cell> {
        self.cells.remove(&x)
    }

    /// Cells in column order
    pub fn cells(&self) -> impl Iterator<Item = (usize, &Cell)> {
        self.cells.iter().map(|(x, c)| (*x, c))
    }

    /// One past the last populated column, 0 for an empty row
    pub fn last_cell_num(&self) -> usize {
        self.cells.keys().next_back().map_or(0, |x| x + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Height in points
    pub fn height(&self) -> Option<f64> {
        self.height
    }

    pub fn set_height(&mut self, height: Option<f64>) {
        self.height = height;
    }
}

/// Frozen leading columns and rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreezePane {
    pub cols: usize,
    pub rows: usize,
}

/// Drop-down list validation over a range
#[derive(Debug, Clone, PartialEq)]
pub struct ListValidation {
    pub range: CellRange,
    pub values: Vec<String>,
}

/// A worksheet.
///
/// A streaming sheet keeps only a window of rows in memory; rows pushed out
/// of the window are serialized to a temp file and can no longer be read or
/// modified.
pub struct Sheet {
    name: String,
    rows: BTreeMap<usize, Row>,
    merged: Vec<MergedRegion>,
    column_widths: BTreeMap<usize, f64>,
    default_column_width: Option<f64>,
    default_row_height: Option<f64>,
    freeze: Option<FreezePane>,
    validations: Vec<ListValidation>,
    window: Option<RowWindow>,
    styles: StyleTable,
}

impl Sheet {
    pub(crate) fn new(name: String, styles: StyleTable) -> Self {
        Sheet {
            name,
            rows: BTreeMap::new(),
            merged: Vec::new(),
            column_widths: BTreeMap::new(),
            default_column_width: None,
            default_row_height: None,
            freeze: None,
            validations: Vec::new(),
            window: None,
            styles,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_window(&mut self, size: usize) {
        self.window = Some(RowWindow::new(size));
    }

    /// Whether rows spill out of memory
    pub fn is_streaming(&self) -> bool {
        self.window.is_some()
    }

    pub fn row(&self, y: usize) -> Option<&Row> {
        self.rows.get(&y)
    }

    pub fn row_mut(&mut self, y: usize) -> Option<&mut Row> {
        self.rows.get_mut(&y)
    }

    /// Row at `y`, created when missing.
    ///
    /// On a streaming sheet creating a row may spill the lowest rows below
    /// `y`; asking for a spilled row fails with `RowAlreadyFlushed`.
    pub fn get_or_create_row(&mut self, y: usize) -> Result<&mut Row> {
        if let Some(window) = self.window.as_mut() {
            if window.is_flushed(y) {
                return Err(ExcelError::RowAlreadyFlushed { row: y });
            }
            if !self.rows.contains_key(&y) {
                while self.rows.len() >= window.size() {
                    match self.rows.first_key_value() {
                        Some((first, _)) if *first < y => {}
                        _ => break,
                    }
                    if let Some((idx, row)) = self.rows.pop_first() {
                        window.spill_row(idx, &row, &self.styles)?;
                    }
                }
            }
        }
        Ok(self.rows.entry(y).or_default())
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<&Cell> {
        self.rows.get(&y).and_then(|r| r.cell(x))
    }

    pub fn cell_mut(&mut self, x: usize, y: usize) -> Option<&mut Cell> {
        self.rows.get_mut(&y).and_then(|r| r.cell_mut(x))
    }

    /// Fails with `InvalidCell` for a column past `XFD`
    pub fn get_or_create_cell(&mut self, x: usize, y: usize) -> Result<&mut Cell> {
        if x >= MAX_COLUMNS {
            return Err(ExcelError::InvalidCell(CellLocation::new(x, y).reference()));
        }
        Ok(self.get_or_create_row(y)?.get_or_create_cell(x))
    }

    /// Rows still in memory, in row order
    pub fn rows(&self) -> impl Iterator<Item = (usize, &Row)> {
        self.rows.iter().map(|(y, r)| (*y, r))
    }

    pub fn first_row_num(&self) -> Option<usize> {
        let spilled = self.window.as_ref().and_then(|w| w.first_flushed());
        let in_memory = self.rows.keys().next().copied();
        match (spilled, in_memory) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn last_row_num(&self) -> Option<usize> {
        let spilled = self.window.as_ref().and_then(|w| w.flushed_through());
        let in_memory = self.rows.keys().next_back().copied();
        spilled.max(in_memory)
    }

    /// Rows holding data, spilled ones included
    pub fn physical_row_count(&self) -> usize {
        self.rows.len() + self.window.as_ref().map_or(0, |w| w.flushed_count())
    }

    /// Register a merged region; regions may not overlap
    pub fn add_merged_region(&mut self, region: MergedRegion) -> Result<usize> {
        if region.last_col >= MAX_COLUMNS {
            return Err(ExcelError::InvalidCell(region.reference()));
        }
        if let Some(existing) = self.merged.iter().find(|m| m.intersects(&region)) {
            return Err(ExcelError::OverlappingMergedRegion {
                new: region.reference(),
                existing: existing.reference(),
            });
        }
        self.merged.push(region);
        Ok(self.merged.len() - 1)
    }

    pub fn merged_regions(&self) -> &[MergedRegion] {
        &self.merged
    }

    pub fn merged_region_at(&self, x: usize, y: usize) -> Option<&MergedRegion> {
        self.merged.iter().find(|m| m.contains(x, y))
    }

    pub fn is_merged(&self, x: usize, y: usize) -> bool {
        self.merged_region_at(x, y).is_some()
    }

    /// Width in characters
    pub fn column_width(&self, col: usize) -> Option<f64> {
        self.column_widths.get(&col).copied()
    }

    pub fn column_widths(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.column_widths.iter().map(|(c, w)| (*c, *w))
    }

    pub fn set_column_width(&mut self, col: usize, width: f64) {
        self.column_widths
            .insert(col, width.clamp(0.0, MAX_COLUMN_WIDTH));
    }

    pub fn default_column_width(&self) -> Option<f64> {
        self.default_column_width
    }

    pub fn set_default_column_width(&mut self, width: f64) {
        self.default_column_width = Some(width.clamp(0.0, MAX_COLUMN_WIDTH));
    }

    /// Height in points
    pub fn set_row_height(&mut self, y: usize, height: f64) -> Result<()> {
        self.get_or_create_row(y)?.set_height(Some(height));
        Ok(())
    }

    pub fn default_row_height(&self) -> Option<f64> {
        self.default_row_height
    }

    pub fn set_default_row_height(&mut self, height: f64) {
        self.default_row_height = Some(height);
    }

    pub fn freeze_pane(&self) -> Option<FreezePane> {
        self.freeze
    }

    /// Freeze leading columns and rows; `(0, 0)` unfreezes
    pub fn set_freeze_pane(&mut self, cols: usize, rows: usize) {
        self.freeze = if cols == 0 && rows == 0 {
            None
        } else {
            Some(FreezePane { cols, rows })
        };
    }

    pub fn add_list_validation(&mut self, range: CellRange, values: Vec<String>) {
        self.validations.push(ListValidation { range, values });
    }

    pub fn validations(&self) -> &[ListValidation] {
        &self.validations
    }

    /// Start recording widths of `col` as rows spill
    pub fn track_column(&mut self, col: usize) -> Result<()> {
        self.window_mut()?.tracker_mut().track(col);
        Ok(())
    }

    pub fn track_all_columns(&mut self) -> Result<()> {
        self.window_mut()?.tracker_mut().track_all();
        Ok(())
    }

    pub fn untrack_column(&mut self, col: usize) -> Result<()> {
        self.window_mut()?.tracker_mut().untrack(col);
        Ok(())
    }

    pub fn untrack_all_columns(&mut self) -> Result<()> {
        self.window_mut()?.tracker_mut().untrack_all();
        Ok(())
    }

    pub fn is_column_tracked(&self, col: usize) -> bool {
        self.window
            .as_ref()
            .is_some_and(|w| w.tracker().is_tracked(col))
    }

    fn window_mut(&mut self) -> Result<&mut RowWindow> {
        self.window.as_mut().ok_or_else(|| {
            ExcelError::Unsupported("column tracking needs a streaming sheet".to_string())
        })
    }

    /// Size a column to fit its widest value.
    ///
    /// Cells spanning several columns through a merged region are ignored.
    /// On a streaming sheet the column must be tracked; widths of spilled
    /// rows only count if they were tracked when they spilled.
    pub fn auto_size_column(&mut self, col: usize) -> Result<()> {
        let mut width = match &self.window {
            Some(window) if !window.tracker().is_tracked(col) => {
                return Err(ExcelError::ColumnNotTracked(col));
            }
            Some(window) => window.tracker().width(col).unwrap_or(0.0),
            None => 0.0,
        };
        for (y, row) in &self.rows {
            if let Some(cell) = row.cell(col) {
                let spans = self
                    .merged_region_at(col, *y)
                    .is_some_and(|m| m.first_col != m.last_col);
                if !spans {
                    width = width.max(cell_width(cell));
                }
            }
        }
        if width > 0.0 {
            // one character of padding like the spreadsheet UI adds
            self.set_column_width(col, width + 1.0);
        }
        Ok(())
    }

    /// One past the widest populated column, spilled tracked widths included
    pub fn column_span(&self) -> usize {
        let in_memory = self.rows.values().map(Row::last_cell_num).max().unwrap_or(0);
        let tracked = self
            .window
            .as_ref()
            .and_then(|w| w.tracker().measured_columns().max())
            .map_or(0, |c| c + 1);
        in_memory.max(tracked)
    }

    pub(crate) fn spilled_links(&self) -> &[(CellLocation, Hyperlink)] {
        self.window.as_ref().map_or(&[], |w| w.spilled_links())
    }

    pub(crate) fn copy_spilled_rows<W: Write>(&mut self, out: &mut W) -> Result<()> {
        match self.window.as_mut() {
            Some(window) => window.copy_spilled_to(out),
            None => Ok(()),
        }
    }

    pub(crate) fn dispose(&mut self) {
        if let Some(window) = self.window.as_mut() {
            window.dispose();
        }
    }

    /// Copy of an in-memory sheet under a new name; styles stay shared
    pub(crate) fn duplicate(&self, name: String) -> Result<Sheet> {
        if self.window.is_some() {
            return Err(ExcelError::Unsupported(
                "streaming sheets cannot be cloned".to_string(),
            ));
        }
        Ok(Sheet {
            name,
            rows: self.rows.clone(),
            merged: self.merged.clone(),
            column_widths: self.column_widths.clone(),
            default_column_width: self.default_column_width,
            default_row_height: self.default_row_height,
            freeze: self.freeze,
            validations: self.validations.clone(),
            window: None,
            styles: self.styles.clone(),
        })
    }
}

impl fmt::Debug for Sheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sheet")
            .field("name", &self.name)
            .field("rows", &self.rows.len())
            .field("merged", &self.merged)
            .field("streaming", &self.is_streaming())
            .finish()
    }
}
