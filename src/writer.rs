//! Excel writing with a sequential row cursor
//!
//! [`ExcelWriter`] owns a [`Workbook`] and writes rows at its current row,
//! styling each cell through a [`StyleSet`] and mapping record fields to
//! headers through a [`HeaderAlias`]. Nothing touches the disk until
//! [`ExcelWriter::flush`] (or [`ExcelWriter::close`]) is called.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::alias::{HeaderAlias, IntoRecord, Record};
use crate::book::{BookFormat, CellRange, Sheet, StyleHandle, Workbook, DEFAULT_SHEET_NAME};
use crate::coerce::CellEditor;
use crate::error::{ExcelError, Result};
use crate::row;
use crate::style_set::StyleSet;
use crate::types::{to_location, CellValue, MAX_COLUMNS};

/// MIME type of an xlsx package
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Excel writer over an in-memory (or windowed) workbook
///
/// # Examples
///
/// ```no_run
/// use excelkit::writer::ExcelWriter;
///
/// let mut writer = ExcelWriter::create("output.xlsx").unwrap();
/// writer.write_head_row(["Name", "Age"]).unwrap();
/// writer.write_row(["Alice", "30"]).unwrap();
/// writer.close().unwrap();
/// ```
pub struct ExcelWriter {
    book: Workbook,
    sheet: usize,
    current_row: usize,
    alias: HeaderAlias,
    style_set: Option<StyleSet>,
    head_locations: Option<HashMap<String, usize>>,
    editor: Option<Box<dyn CellEditor>>,
    dest: Option<PathBuf>,
}

impl ExcelWriter {
    /// In-memory writer without a destination; use [`ExcelWriter::flush_to`]
    pub fn new() -> Self {
        Self::with_book(Workbook::new(), 0, None)
    }

    /// Writer that saves to `path` on flush. An existing xlsx file at
    /// `path` is loaded first.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        ExcelWriterBuilder::new(path).build()
    }

    /// Writer over an existing workbook, positioned on its first sheet
    pub fn from_workbook(book: Workbook) -> Self {
        Self::with_book(book, 0, None)
    }

    pub(crate) fn with_book(book: Workbook, sheet: usize, dest: Option<PathBuf>) -> Self {
        ExcelWriter {
            book,
            sheet,
            current_row: 0,
            alias: HeaderAlias::new(),
            style_set: Some(StyleSet::new()),
            head_locations: None,
            editor: None,
            dest,
        }
    }

    pub fn workbook(&self) -> &Workbook {
        &self.book
    }

    pub fn workbook_mut(&mut self) -> &mut Workbook {
        &mut self.book
    }

    /// Unwrap the workbook without flushing
    pub fn into_workbook(self) -> Workbook {
        self.book
    }

    /// Current sheet, if it has been created yet
    pub fn sheet(&self) -> Option<&Sheet> {
        self.book.sheet(self.sheet)
    }

    /// Current sheet, created on first use
    pub fn sheet_mut(&mut self) -> Result<&mut Sheet> {
        target_sheet(&mut self.book, self.sheet)
    }

    pub fn sheet_index(&self) -> usize {
        self.sheet
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.book.sheet_names()
    }

    /// Switch to the named sheet, creating it if absent. The row cursor and
    /// header locations are reset.
    pub fn set_sheet(&mut self, name: &str) -> Result<()> {
        let index = self.book.get_or_create_sheet(name)?;
        self.switch_to(index);
        Ok(())
    }

    /// Switch to the sheet at `index`, creating sheets up to it
    pub fn set_sheet_at(&mut self, index: usize) -> Result<()> {
        let index = self.book.get_or_create_sheet_at(index)?;
        self.switch_to(index);
        Ok(())
    }

    fn switch_to(&mut self, index: usize) {
        self.sheet = index;
        self.reset();
    }

    /// Rename the current sheet
    pub fn rename_sheet(&mut self, name: &str) -> Result<()> {
        self.sheet_mut()?;
        self.book.set_sheet_name(self.sheet, name)
    }

    /// Rewind the row cursor and forget header locations
    pub fn reset(&mut self) -> &mut Self {
        self.reset_row();
        self.head_locations = None;
        self
    }

    pub fn current_row(&self) -> usize {
        self.current_row
    }

    /// Move the row cursor. Writes by coordinate never move it; keeping the
    /// two in step is up to the caller.
    pub fn set_current_row(&mut self, row: usize) -> &mut Self {
        self.current_row = row;
        self
    }

    /// Skip the current row
    pub fn pass_current_row(&mut self) -> &mut Self {
        self.current_row += 1;
        self
    }

    pub fn pass_rows(&mut self, rows: usize) -> &mut Self {
        self.current_row += rows;
        self
    }

    pub fn reset_row(&mut self) -> &mut Self {
        self.current_row = 0;
        self
    }

    pub fn set_dest<P: AsRef<Path>>(&mut self, path: P) -> &mut Self {
        self.dest = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn dest(&self) -> Option<&Path> {
        self.dest.as_deref()
    }

    /// Hook run on every value before it is stored
    pub fn set_cell_editor<E: CellEditor + 'static>(&mut self, editor: E) -> &mut Self {
        self.editor = Some(Box::new(editor));
        self
    }

    pub fn clear_cell_editor(&mut self) -> &mut Self {
        self.editor = None;
        self
    }

    /// Styles applied to written cells; `None` when styling is off
    pub fn style_set(&self) -> Option<&StyleSet> {
        self.style_set.as_ref()
    }

    pub fn style_set_mut(&mut self) -> Option<&mut StyleSet> {
        self.style_set.as_mut()
    }

    /// Replace the style set; `None` writes unstyled cells
    pub fn set_style_set(&mut self, style_set: Option<StyleSet>) -> &mut Self {
        self.style_set = style_set;
        self
    }

    pub fn head_style(&self) -> Option<&StyleHandle> {
        self.style_set.as_ref().map(StyleSet::head_style)
    }

    pub fn cell_style(&self) -> Option<&StyleHandle> {
        self.style_set.as_ref().map(StyleSet::cell_style)
    }

    pub fn alias(&self) -> &HeaderAlias {
        &self.alias
    }

    pub fn alias_mut(&mut self) -> &mut HeaderAlias {
        &mut self.alias
    }

    pub fn add_header_alias(&mut self, field: &str, alias: &str) -> &mut Self {
        self.alias.add(field, alias);
        self
    }

    /// Replace all header aliases
    pub fn set_header_alias<I, K, V>(&mut self, aliases: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.alias.set(aliases);
        self
    }

    pub fn clear_header_alias(&mut self) -> &mut Self {
        self.alias.clear();
        self
    }

    /// Drop record fields that have no alias
    pub fn set_only_alias(&mut self, only_alias: bool) -> &mut Self {
        self.alias.set_only_alias(only_alias);
        self
    }

    /// Freeze leading columns and rows; `(0, 0)` unfreezes
    pub fn set_freeze_pane(&mut self, cols: usize, rows: usize) -> Result<()> {
        self.sheet_mut()?.set_freeze_pane(cols, rows);
        Ok(())
    }

    /// Width of a column in characters
    pub fn set_column_width(&mut self, col: usize, width: f64) -> Result<()> {
        self.sheet_mut()?.set_column_width(col, width);
        Ok(())
    }

    /// Width of columns without an explicit width
    pub fn set_default_column_width(&mut self, width: f64) -> Result<()> {
        self.sheet_mut()?.set_default_column_width(width);
        Ok(())
    }

    /// Height of a row in points
    pub fn set_row_height(&mut self, y: usize, height: f64) -> Result<()> {
        self.sheet_mut()?.set_row_height(y, height)
    }

    pub fn set_default_row_height(&mut self, height: f64) -> Result<()> {
        self.sheet_mut()?.set_default_row_height(height);
        Ok(())
    }

    /// Size a column to its content
    pub fn autosize_column(&mut self, col: usize) -> Result<()> {
        self.sheet_mut()?.auto_size_column(col)
    }

    /// Size every populated column to its content
    pub fn autosize_column_all(&mut self) -> Result<()> {
        let sheet = self.sheet_mut()?;
        for col in 0..sheet.column_span() {
            sheet.auto_size_column(col)?;
        }
        Ok(())
    }

    /// Merge the current row from column 0 through `last_column` and write
    /// `content` into it. The cursor moves down when content is written.
    pub fn merge(&mut self, last_column: usize, content: Option<CellValue>, is_header: bool) -> Result<()> {
        let y = self.current_row;
        let advance = content.is_some();
        let style = self.style_for(content.as_ref(), is_header);
        self.merge_region(CellRange::new(y, y, 0, last_column), content, style)?;
        if advance {
            self.current_row += 1;
        }
        Ok(())
    }

    /// Merge a region, style every cell in it and write `content` into its
    /// anchor
    pub fn merge_region(
        &mut self,
        region: CellRange,
        content: Option<CellValue>,
        style: Option<StyleHandle>,
    ) -> Result<()> {
        let sheet = target_sheet(&mut self.book, self.sheet)?;
        sheet.add_merged_region(region)?;
        if let Some(style) = &style {
            for y in region.first_row..=region.last_row {
                for x in region.first_col..=region.last_col {
                    sheet.get_or_create_cell(x, y)?.set_style(Some(style.clone()));
                }
            }
        }
        if let Some(value) = content {
            let cell = sheet.get_or_create_cell(region.first_col, region.first_row)?;
            let value = match self.editor.as_deref() {
                Some(editor) => editor.edit(Some(&*cell), value),
                None => value,
            };
            cell.set_blank();
            cell.set_value(value);
        }
        Ok(())
    }

    fn style_for(&self, value: Option<&CellValue>, is_header: bool) -> Option<StyleHandle> {
        let styles = self.style_set.as_ref()?;
        Some(match value {
            Some(value) => styles.for_value(value, is_header),
            None if is_header => styles.head_style().clone(),
            None => styles.cell_style().clone(),
        })
    }

    /// Write values at the current row and move the cursor down
    pub fn write_row<I, V>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        let y = self.current_row;
        let sheet = target_sheet(&mut self.book, self.sheet)?;
        row::write_row(sheet, y, values, self.style_set.as_ref(), false, self.editor.as_deref())?;
        self.current_row += 1;
        Ok(())
    }

    /// Write several rows
    pub fn write_rows<I, R, V>(&mut self, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        for values in rows {
            self.write_row(values)?;
        }
        Ok(())
    }

    /// Write a header row and remember which column each header landed in;
    /// later records are placed by these locations
    pub fn write_head_row<I, V>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        let y = self.current_row;
        let values: Vec<CellValue> = values.into_iter().map(Into::into).collect();
        let locations: HashMap<String, usize> = values
            .iter()
            .enumerate()
            .map(|(x, v)| (v.as_string(), x))
            .collect();

        let sheet = target_sheet(&mut self.book, self.sheet)?;
        row::write_row(sheet, y, values, self.style_set.as_ref(), true, self.editor.as_deref())?;
        self.head_locations = Some(locations);
        self.current_row += 1;
        Ok(())
    }

    /// Second header line under a header whose cells were merged downwards:
    /// values fill the cells of the current row that do not exist yet, left
    /// to right
    pub fn write_sec_head_row<I, V>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        let y = self.current_row;
        let occupied = self.sheet_mut()?.get_or_create_row(y)?.last_cell_num() != 0;
        if !occupied {
            return self.write_head_row(values);
        }

        let sheet = target_sheet(&mut self.book, self.sheet)?;
        let mut values = values.into_iter();
        for x in 0..MAX_COLUMNS {
            if sheet.cell(x, y).is_some() {
                continue;
            }
            let Some(value) = values.next() else {
                break;
            };
            row::write_cell(
                sheet,
                x,
                y,
                value.into(),
                self.style_set.as_ref(),
                true,
                self.editor.as_deref(),
            )?;
        }
        self.current_row += 1;
        Ok(())
    }

    /// Write one record.
    ///
    /// Fields are aliased and ordered by the header aliases. With
    /// `write_key_as_head` a header row goes out first. Once a header has
    /// been written, values are placed under the column of their field name
    /// or alias, and fields without a column are skipped. An empty record
    /// leaves an empty row.
    pub fn write_record<R: IntoRecord>(&mut self, record: R, write_key_as_head: bool) -> Result<()> {
        let record = self.alias.order(record.into_record());
        if record.is_empty() {
            self.pass_current_row();
            return Ok(());
        }
        self.write_ordered_record(record, write_key_as_head)
    }

    fn write_ordered_record(&mut self, record: Record, write_key_as_head: bool) -> Result<()> {
        let fields = self.alias.project(record);
        if write_key_as_head {
            self.write_head_row(fields.iter().map(|f| CellValue::from(f.header.as_str())))?;
            let locations = self.head_locations.get_or_insert_with(HashMap::new);
            for (x, field) in fields.iter().enumerate() {
                locations.entry(field.name.clone()).or_insert(x);
            }
        }

        let locations = match &self.head_locations {
            Some(locations) if !locations.is_empty() => locations,
            _ => return self.write_row(fields.into_iter().map(|f| f.value)),
        };
        let placed: Vec<(usize, CellValue)> = fields
            .into_iter()
            .filter_map(|f| {
                let x = locations.get(&f.name).or_else(|| locations.get(&f.header))?;
                Some((*x, f.value))
            })
            .collect();

        let y = self.current_row;
        let sheet = target_sheet(&mut self.book, self.sheet)?;
        sheet.get_or_create_row(y)?;
        for (x, value) in placed {
            row::write_cell(sheet, x, y, value, self.style_set.as_ref(), false, self.editor.as_deref())?;
        }
        self.current_row += 1;
        Ok(())
    }

    /// Write records; the first one also writes its keys as a header when
    /// the cursor is on the first row
    pub fn write<I, R>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = R>,
        R: IntoRecord,
    {
        let head = self.current_row == 0;
        self.write_with_head(records, head)
    }

    /// Write records, forcing (or suppressing) the header of the first one
    pub fn write_with_head<I, R>(&mut self, records: I, write_key_as_head: bool) -> Result<()>
    where
        I: IntoIterator<Item = R>,
        R: IntoRecord,
    {
        for (i, record) in records.into_iter().enumerate() {
            self.write_record(record, i == 0 && write_key_as_head)?;
        }
        Ok(())
    }

    /// Write records with fields ordered by `compare` instead of alias
    /// order; the first record writes a header
    pub fn write_sorted<I, R, F>(&mut self, records: I, mut compare: F) -> Result<()>
    where
        I: IntoIterator<Item = R>,
        R: IntoRecord,
        F: FnMut(&str, &str) -> Ordering,
    {
        for (i, record) in records.into_iter().enumerate() {
            let mut record = record.into_record();
            if record.is_empty() {
                self.pass_current_row();
                continue;
            }
            record.sort_by(|a, _, b, _| compare(a, b));
            self.write_ordered_record(record, i == 0)?;
        }
        Ok(())
    }

    /// Write a value at `(x, y)` with the default cell style
    pub fn write_cell_value(&mut self, x: usize, y: usize, value: impl Into<CellValue>) -> Result<()> {
        let sheet = target_sheet(&mut self.book, self.sheet)?;
        row::write_cell(
            sheet,
            x,
            y,
            value.into(),
            self.style_set.as_ref(),
            false,
            self.editor.as_deref(),
        )
    }

    /// Write a value at an A1-style reference such as `"B3"`
    pub fn write_cell_at(&mut self, reference: &str, value: impl Into<CellValue>) -> Result<()> {
        let loc = to_location(reference)?;
        self.write_cell_value(loc.x, loc.y, value)
    }

    /// Give the cell at `(x, y)` a style, creating the cell if needed
    pub fn set_style(&mut self, style: &StyleHandle, x: usize, y: usize) -> Result<()> {
        self.sheet_mut()?
            .get_or_create_cell(x, y)?
            .set_style(Some(style.clone()));
        Ok(())
    }

    /// Give every existing cell of row `y` a style
    pub fn set_row_style(&mut self, y: usize, style: &StyleHandle) -> Result<()> {
        let sheet = self.sheet_mut()?;
        if let Some(row) = sheet.row_mut(y) {
            let columns: Vec<usize> = row.cells().map(|(x, _)| x).collect();
            for x in columns {
                row.get_or_create_cell(x).set_style(Some(style.clone()));
            }
        }
        Ok(())
    }

    /// Drop-down list on the cell at `(x, y)`
    pub fn add_select<I, S>(&mut self, x: usize, y: usize, values: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_select_range(CellRange::new(y, y, x, x), values)
    }

    /// Drop-down list over a range
    pub fn add_select_range<I, S>(&mut self, range: CellRange, values: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.sheet_mut()?.add_list_validation(range, values);
        Ok(())
    }

    /// MIME type of the written package
    pub fn content_type(&self) -> &'static str {
        XLSX_CONTENT_TYPE
    }

    /// Write the workbook as xlsx to `out`
    pub fn flush_to<W: Write>(&mut self, out: &mut W) -> Result<()> {
        self.check_writable()?;
        self.book.write_to_stream(out)
    }

    /// Write the workbook to the destination file
    pub fn flush(&mut self) -> Result<()> {
        let dest = self.dest.clone().ok_or(ExcelError::MissingDestination)?;
        self.flush_to_file(dest)
    }

    /// Write the workbook to `path`, leaving the destination unchanged
    pub fn flush_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.check_writable()?;
        log::debug!("writing workbook to {}", path.as_ref().display());
        self.book.save(path)
    }

    fn check_writable(&self) -> Result<()> {
        match self.book.format() {
            BookFormat::Xlsx => Ok(()),
            BookFormat::Xls => Err(ExcelError::Unsupported(
                "writing .xls workbooks is not supported".to_string(),
            )),
        }
    }

    /// Flush to the destination, if any, and release the workbook
    pub fn close(mut self) -> Result<()> {
        let result = match self.dest {
            Some(_) => self.flush(),
            None => Ok(()),
        };
        self.book.dispose();
        result
    }
}

impl Default for ExcelWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExcelWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExcelWriter")
            .field("sheet", &self.sheet)
            .field("current_row", &self.current_row)
            .field("dest", &self.dest)
            .field("alias", &self.alias)
            .finish()
    }
}

pub(crate) fn target_sheet(book: &mut Workbook, index: usize) -> Result<&mut Sheet> {
    let index = book.get_or_create_sheet_at(index)?;
    match book.sheet_mut(index) {
        Some(sheet) => Ok(sheet),
        None => Err(ExcelError::SheetNotFound {
            sheet: index.to_string(),
            available: String::new(),
        }),
    }
}

/// Existing file with content; a zero-length file counts as new
fn has_content(path: &Path) -> bool {
    path.metadata().map(|m| m.len() > 0).unwrap_or(false)
}

pub(crate) fn is_xls_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xls"))
}

/// Builder for creating configured Excel writers
pub struct ExcelWriterBuilder {
    path: Option<PathBuf>,
    sheet_name: Option<String>,
    aliases: Vec<(String, String)>,
    only_alias: bool,
    default_styles: bool,
    window: Option<usize>,
}

impl ExcelWriterBuilder {
    /// Create a new builder writing to `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ExcelWriterBuilder {
            path: Some(path.as_ref().to_path_buf()),
            ..Self::in_memory()
        }
    }

    /// Create a builder without a destination file
    pub fn in_memory() -> Self {
        ExcelWriterBuilder {
            path: None,
            sheet_name: None,
            aliases: Vec::new(),
            only_alias: false,
            default_styles: true,
            window: None,
        }
    }

    /// Set the sheet to write into
    pub fn with_sheet_name(mut self, name: &str) -> Self {
        self.sheet_name = Some(name.to_string());
        self
    }

    /// Add a header alias
    pub fn with_alias(mut self, field: &str, alias: &str) -> Self {
        self.aliases.push((field.to_string(), alias.to_string()));
        self
    }

    /// Drop record fields without an alias
    pub fn with_only_alias(mut self, only_alias: bool) -> Self {
        self.only_alias = only_alias;
        self
    }

    /// Write unstyled cells
    pub fn without_default_styles(mut self) -> Self {
        self.default_styles = false;
        self
    }

    /// Rows kept in memory per sheet by [`ExcelWriterBuilder::build_streaming`]
    pub fn with_window(mut self, rows: usize) -> Self {
        self.window = Some(rows);
        self
    }

    /// Build an in-memory writer
    pub fn build(self) -> Result<ExcelWriter> {
        self.build_with_window(None)
    }

    /// Build a streaming writer keeping a window of rows in memory
    pub fn build_streaming(self) -> Result<crate::streaming_writer::BigExcelWriter> {
        let window = self.window.unwrap_or(crate::book::DEFAULT_WINDOW_SIZE);
        let writer = self.build_with_window(Some(window))?;
        Ok(crate::streaming_writer::BigExcelWriter::from_writer(writer))
    }

    fn build_with_window(self, window: Option<usize>) -> Result<ExcelWriter> {
        let mut book = match &self.path {
            Some(path) if is_xls_path(path) => {
                return Err(ExcelError::Unsupported(
                    "writing .xls workbooks is not supported".to_string(),
                ));
            }
            Some(path) if has_content(path) => Workbook::open(path)?,
            _ => Workbook::new(),
        };
        if let Some(window) = window {
            book = book.into_streaming(window)?;
        }

        let sheet = match &self.sheet_name {
            Some(name) => book.get_or_create_sheet(name)?,
            None if book.is_empty() => book.get_or_create_sheet(DEFAULT_SHEET_NAME)?,
            None => 0,
        };

        let mut writer = ExcelWriter::with_book(book, sheet, self.path);
        writer.set_header_alias(self.aliases);
        writer.set_only_alias(self.only_alias);
        if !self.default_styles {
            writer.set_style_set(None);
        }
        Ok(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::CellType;
    use crate::reader::ExcelReader;
    use indexmap::IndexMap;
    use tempfile::NamedTempFile;

    fn read_back(writer: &mut ExcelWriter) -> ExcelReader {
        let mut buf = Vec::new();
        writer.flush_to(&mut buf).unwrap();
        ExcelReader::from_reader(std::io::Cursor::new(buf)).unwrap()
    }

    #[test]
    fn test_row_cursor() {
        let mut writer = ExcelWriter::new();
        writer.write_row(["a"]).unwrap();
        writer.write_row(["b"]).unwrap();
        assert_eq!(writer.current_row(), 2);

        writer.pass_rows(3).pass_current_row();
        assert_eq!(writer.current_row(), 6);

        // coordinate writes leave the cursor alone
        writer.write_cell_value(0, 20, "x").unwrap();
        assert_eq!(writer.current_row(), 6);

        writer.set_sheet("Other").unwrap();
        assert_eq!(writer.current_row(), 0);
        assert_eq!(writer.sheet_names(), vec!["Sheet1", "Other"]);
    }

    #[test]
    fn test_builder() {
        let temp = NamedTempFile::new().unwrap();
        let path = temp.path().with_extension("xlsx");
        let mut writer = ExcelWriterBuilder::new(&path)
            .with_sheet_name("CustomSheet")
            .with_alias("id", "ID")
            .with_only_alias(true)
            .without_default_styles()
            .build()
            .unwrap();

        assert_eq!(writer.sheet_names(), vec!["CustomSheet"]);
        assert!(writer.style_set().is_none());
        writer
            .write_record([("id", CellValue::Int(1)), ("x", CellValue::Int(2))], true)
            .unwrap();
        writer.close().unwrap();

        let reader = ExcelReader::open(&path).unwrap();
        assert_eq!(
            reader.read(),
            vec![vec![CellValue::from("ID")], vec![CellValue::Int(1)]]
        );
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_columns_past_xfd_refused() {
        let mut writer = ExcelWriter::new();
        writer.write_cell_value(MAX_COLUMNS - 1, 0, "last").unwrap();
        assert!(matches!(
            writer.write_cell_value(MAX_COLUMNS, 0, "past"),
            Err(ExcelError::InvalidCell(_))
        ));
        assert!(matches!(
            writer.write_cell_at("XFE1", "past"),
            Err(ExcelError::InvalidCell(_))
        ));
        assert!(ExcelWriter::new()
            .write_row(vec!["x"; MAX_COLUMNS + 1])
            .is_err());

        let rows = read_back(&mut writer).read();
        assert_eq!(rows[0].len(), MAX_COLUMNS);
        assert_eq!(rows[0][MAX_COLUMNS - 1], CellValue::from("last"));
    }

    #[test]
    fn test_xls_destination_refused() {
        let err = ExcelWriterBuilder::new("out.xls").build().unwrap_err();
        assert!(matches!(err, ExcelError::Unsupported(_)));
    }

    #[test]
    fn test_flush_without_destination() {
        let mut writer = ExcelWriter::new();
        writer.write_row(["a"]).unwrap();
        assert!(matches!(writer.flush(), Err(ExcelError::MissingDestination)));
    }

    #[test]
    fn test_records_follow_header_locations() {
        let mut writer = ExcelWriter::new();
        writer.add_header_alias("id", "ID").add_header_alias("name", "Name");

        let first: IndexMap<&str, CellValue> =
            [("name", "Ann".into()), ("id", 1.into())].into_iter().collect();
        writer.write_record(first, true).unwrap();

        // alias key and an unknown key
        let second = vec![
            ("Name", CellValue::from("Bob")),
            ("id", CellValue::Int(2)),
            ("zzz", CellValue::from("dropped")),
        ];
        writer.write_record(second, false).unwrap();
        writer.write_record(Vec::<(String, CellValue)>::new(), false).unwrap();
        assert_eq!(writer.current_row(), 4);

        let rows = read_back(&mut writer).read();
        assert_eq!(
            rows,
            vec![
                vec![CellValue::from("ID"), CellValue::from("Name")],
                vec![CellValue::Int(1), CellValue::from("Ann")],
                vec![CellValue::Int(2), CellValue::from("Bob")],
            ]
        );
    }

    #[test]
    fn test_write_sorted() {
        let mut writer = ExcelWriter::new();
        let records = vec![
            vec![("b", CellValue::Int(2)), ("a", CellValue::Int(1))],
            vec![("a", CellValue::Int(3)), ("b", CellValue::Int(4))],
        ];
        writer.write_sorted(records, |x, y| y.cmp(x)).unwrap();

        let rows = read_back(&mut writer).read();
        assert_eq!(rows[0], vec![CellValue::from("b"), CellValue::from("a")]);
        assert_eq!(rows[2], vec![CellValue::Int(4), CellValue::Int(3)]);
    }

    #[test]
    fn test_merge_and_sec_head() {
        let mut writer = ExcelWriter::new();
        writer.merge(2, Some("Title".into()), true).unwrap();
        assert_eq!(writer.current_row(), 1);

        // "Group" spans both header rows
        let head = writer.head_style().cloned();
        writer
            .merge_region(CellRange::new(1, 2, 0, 0), Some("Group".into()), head)
            .unwrap();
        writer.write_cell_value(1, 1, "A").unwrap();
        writer.write_cell_value(2, 1, "B").unwrap();
        writer.set_current_row(2);
        writer.write_sec_head_row(["a1", "b1"]).unwrap();

        let sheet = writer.sheet().unwrap();
        assert!(sheet.is_merged(2, 0));
        assert_eq!(sheet.cell(0, 2).unwrap().cell_type(), CellType::Blank);
        assert_eq!(sheet.cell(1, 2).unwrap().string_value(), "a1");
        assert_eq!(sheet.cell(2, 2).unwrap().string_value(), "b1");

        let reader = read_back(&mut writer);
        assert_eq!(reader.read_cell_value(1, 0), CellValue::from("Title"));
        assert_eq!(reader.read_cell_value(0, 2), CellValue::from("Group"));
    }

    #[test]
    fn test_layout_settings() {
        let mut writer = ExcelWriter::new();
        writer.write_row(["a fairly long value", "b"]).unwrap();
        writer.set_freeze_pane(0, 1).unwrap();
        writer.set_row_height(0, 30.0).unwrap();
        writer.autosize_column_all().unwrap();
        writer.add_select(1, 1, ["yes", "no"]).unwrap();
        writer.rename_sheet("Data").unwrap();

        let sheet = writer.sheet().unwrap();
        assert_eq!(sheet.name(), "Data");
        assert_eq!(sheet.column_width(0), Some(20.0));
        assert_eq!(sheet.row(0).unwrap().height(), Some(30.0));
        assert_eq!(sheet.validations()[0].values, vec!["yes", "no"]);
        assert_eq!(writer.content_type(), XLSX_CONTENT_TYPE);
    }
}
