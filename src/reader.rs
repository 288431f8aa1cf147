//! Excel reading over a loaded workbook
//!
//! [`ExcelReader`] loads a whole xlsx (or, with the `xls` feature, xls)
//! workbook and reads one sheet at a time as rows, single cells or keyed
//! records. Header aliases rename headers on the way out. For files too big
//! to load, see [`crate::streaming_reader`].

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use crate::alias::{HeaderAlias, Record};
use crate::book::{Cell, Sheet, Workbook};
use crate::coerce::{cell_value, display_text, CellEditor};
use crate::error::{ExcelError, Result};
use crate::row;
use crate::types::{CellLocation, CellValue};
use crate::writer::ExcelWriter;

/// Excel file reader
///
/// # Examples
///
/// ```no_run
/// use excelkit::reader::ExcelReader;
///
/// let mut reader = ExcelReader::open("data.xlsx").unwrap();
/// reader.add_header_alias("姓名", "name");
/// for record in reader.read_all().unwrap() {
///     println!("{:?}", record.get("name"));
/// }
/// ```
pub struct ExcelReader {
    book: Workbook,
    sheet: usize,
    alias: HeaderAlias,
    ignore_empty_row: bool,
    editor: Option<Box<dyn CellEditor>>,
    source: Option<PathBuf>,
}

impl ExcelReader {
    /// Open a workbook file positioned on its first sheet.
    ///
    /// The format is sniffed from the file content, not its extension.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = Self::from_reader(BufReader::new(file))?;
        reader.source = Some(path.as_ref().to_path_buf());
        Ok(reader)
    }

    /// Open a workbook file positioned on the named sheet
    pub fn open_sheet<P: AsRef<Path>>(path: P, sheet: &str) -> Result<Self> {
        let mut reader = Self::open(path)?;
        reader.set_sheet(sheet)?;
        Ok(reader)
    }

    /// Load a workbook from any seekable source
    pub fn from_reader<R: Read + Seek>(source: R) -> Result<Self> {
        Self::from_workbook(Workbook::from_reader(source)?)
    }

    /// Reader over a workbook; fails when it has no sheets
    pub fn from_workbook(book: Workbook) -> Result<Self> {
        if book.is_empty() {
            return Err(book.sheet_not_found(0));
        }
        Ok(ExcelReader {
            book,
            sheet: 0,
            alias: HeaderAlias::new(),
            ignore_empty_row: true,
            editor: None,
            source: None,
        })
    }

    pub fn workbook(&self) -> &Workbook {
        &self.book
    }

    pub fn into_workbook(self) -> Workbook {
        self.book
    }

    /// Sheet being read
    pub fn sheet(&self) -> &Sheet {
        &self.book.sheets()[self.sheet]
    }

    pub fn sheet_index(&self) -> usize {
        self.sheet
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.book.sheet_names()
    }

    pub fn sheet_count(&self) -> usize {
        self.book.sheet_count()
    }

    /// Switch to the named sheet
    pub fn set_sheet(&mut self, name: &str) -> Result<()> {
        self.sheet = self
            .book
            .sheet_index(name)
            .ok_or_else(|| self.book.sheet_not_found(name))?;
        Ok(())
    }

    /// Switch to the sheet at `index`
    pub fn set_sheet_at(&mut self, index: usize) -> Result<()> {
        if index >= self.book.sheet_count() {
            return Err(self.book.sheet_not_found(index));
        }
        self.sheet = index;
        Ok(())
    }

    pub fn ignore_empty_row(&self) -> bool {
        self.ignore_empty_row
    }

    /// Keep or drop rows whose values are all empty (dropped by default)
    pub fn set_ignore_empty_row(&mut self, ignore: bool) -> &mut Self {
        self.ignore_empty_row = ignore;
        self
    }

    /// Hook run on every value read
    pub fn set_cell_editor<E: CellEditor + 'static>(&mut self, editor: E) -> &mut Self {
        self.editor = Some(Box::new(editor));
        self
    }

    pub fn clear_cell_editor(&mut self) -> &mut Self {
        self.editor = None;
        self
    }

    pub fn alias(&self) -> &HeaderAlias {
        &self.alias
    }

    pub fn alias_mut(&mut self) -> &mut HeaderAlias {
        &mut self.alias
    }

    /// Rename header `header` to `alias` when reading
    pub fn add_header_alias(&mut self, header: &str, alias: &str) -> &mut Self {
        self.alias.add(header, alias);
        self
    }

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

    fn editor(&self) -> Option<&dyn CellEditor> {
        self.editor.as_deref()
    }

    /// Clamp `[start, end]` to the populated rows
    fn bounds(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        let sheet = self.sheet();
        let first = sheet.first_row_num()?;
        let last = sheet.last_row_num()?;
        let (start, end) = (start.max(first), end.min(last));
        (start <= end).then_some((start, end))
    }

    /// Every row of the sheet
    pub fn read(&self) -> Vec<Vec<CellValue>> {
        self.read_range(0, usize::MAX)
    }

    /// Rows from `start` to the end of the sheet
    pub fn read_from(&self, start: usize) -> Vec<Vec<CellValue>> {
        self.read_range(start, usize::MAX)
    }

    /// Rows `start..=end`. With header aliases set, the first row returned
    /// is treated as a header and aliased.
    pub fn read_range(&self, start: usize, end: usize) -> Vec<Vec<CellValue>> {
        let Some((start, end)) = self.bounds(start, end) else {
            return Vec::new();
        };
        let mut rows = Vec::new();
        for y in start..=end {
            let values = self.read_row(y);
            if values.is_empty() && self.ignore_empty_row {
                continue;
            }
            if rows.is_empty() && !self.alias.is_empty() {
                rows.push(
                    self.alias
                        .alias_headers(&values)
                        .into_iter()
                        .map(CellValue::String)
                        .collect(),
                );
            } else {
                rows.push(values);
            }
        }
        rows
    }

    /// Visit every cell of every row in `start..=end`, absent cells inside a
    /// row included
    pub fn read_cells<F>(&self, start: usize, end: usize, mut handler: F)
    where
        F: FnMut(CellLocation, Option<&Cell>, CellValue),
    {
        let Some((start, end)) = self.bounds(start, end) else {
            return;
        };
        let sheet = self.sheet();
        for y in start..=end {
            let Some(row) = sheet.row(y) else {
                continue;
            };
            for x in 0..row.last_cell_num() {
                let value = cell_value(sheet, x, y, self.editor());
                handler(CellLocation::new(x, y), row.cell(x), value);
            }
        }
    }

    /// Rows `start..=end` as records keyed by the (aliased) header row.
    ///
    /// Missing values are padded with [`CellValue::Empty`]; an empty header
    /// is named after its column letters. The header row itself is skipped.
    pub fn read_records(&self, header: usize, start: usize, end: usize) -> Result<Vec<Record>> {
        let sheet = self.sheet();
        let (first, last) = match (sheet.first_row_num(), sheet.last_row_num()) {
            (Some(first), Some(last)) => (first, last),
            _ => (0, 0),
        };
        if sheet.first_row_num().is_none() || header < first || header > last {
            return Err(ExcelError::IndexOutOfBounds {
                index: header,
                first,
                last,
            });
        }

        let headers = self.alias.alias_headers(&self.read_row(header));
        let mut records = Vec::new();
        let Some((start, end)) = self.bounds(start, end) else {
            return Ok(records);
        };
        for y in (start..=end).filter(|y| *y != header) {
            let values = self.read_row(y);
            if values.is_empty() && self.ignore_empty_row {
                continue;
            }
            let mut values = values.into_iter();
            let record: Record = headers
                .iter()
                .map(|h| (h.clone(), values.next().unwrap_or(CellValue::Empty)))
                .collect();
            records.push(record);
        }
        Ok(records)
    }

    /// Every row after the first as a record keyed by the first row
    pub fn read_all(&self) -> Result<Vec<Record>> {
        self.read_records(0, 1, usize::MAX)
    }

    /// Records deserialized into `T`
    #[cfg(feature = "serde")]
    pub fn read_records_as<T: serde::de::DeserializeOwned>(
        &self,
        header: usize,
        start: usize,
        end: usize,
    ) -> Result<Vec<T>> {
        self.read_records(header, start, end)?
            .iter()
            .map(crate::alias::from_record)
            .collect()
    }

    /// [`ExcelReader::read_all`] deserialized into `T`
    #[cfg(feature = "serde")]
    pub fn read_all_as<T: serde::de::DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.read_records_as(0, 1, usize::MAX)
    }

    /// Values of row `y`; empty when the row is absent or blank
    pub fn read_row(&self, y: usize) -> Vec<CellValue> {
        row::read_row(self.sheet(), y, self.editor())
    }

    /// Value at `(x, y)`; merged cells read their anchor
    pub fn read_cell_value(&self, x: usize, y: usize) -> CellValue {
        cell_value(self.sheet(), x, y, self.editor())
    }

    /// Tab-separated text of every sheet, one line per row
    pub fn read_as_text(&self, with_sheet_names: bool) -> String {
        let mut out = String::new();
        for sheet in self.book.sheets() {
            if with_sheet_names {
                out.push_str(sheet.name());
                out.push('\n');
            }
            for (_, row) in sheet.rows() {
                let line: Vec<String> = (0..row.last_cell_num())
                    .map(|x| row.cell(x).map(display_text).unwrap_or_default())
                    .collect();
                out.push_str(&line.join("\t"));
                out.push('\n');
            }
        }
        out
    }

    /// One past the last populated row
    pub fn row_count(&self) -> usize {
        self.sheet().last_row_num().map_or(0, |last| last + 1)
    }

    /// Rows that hold cells
    pub fn physical_row_count(&self) -> usize {
        self.sheet().physical_row_count()
    }

    /// One past the widest populated column
    pub fn column_count(&self) -> usize {
        self.sheet().column_span()
    }

    /// Writer over the same workbook and sheet, saving back to the file the
    /// reader was opened from
    pub fn into_writer(self) -> ExcelWriter {
        ExcelWriter::with_book(self.book, self.sheet, self.source)
    }
}

impl std::fmt::Debug for ExcelReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExcelReader")
            .field("sheet", &self.sheet)
            .field("ignore_empty_row", &self.ignore_empty_row)
            .field("source", &self.source)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{CellKind, CellRange};
    use crate::coerce::TrimEditor;

    fn sample() -> ExcelReader {
        let mut book = Workbook::new();
        let idx = book.get_or_create_sheet("People").unwrap();
        let sheet = book.sheet_mut(idx).unwrap();
        // B1 left absent
        row::write_cell(sheet, 0, 0, "姓名".into(), None, false, None).unwrap();
        row::write_cell(sheet, 2, 0, "age".into(), None, false, None).unwrap();
        let ann = [CellValue::from(" Ann "), CellValue::Int(1)];
        row::write_row(sheet, 1, ann, None, false, None).unwrap();
        let bob = [CellValue::from("Bob"), CellValue::Int(2), CellValue::Int(40)];
        row::write_row(sheet, 3, bob, None, false, None).unwrap();
        book.get_or_create_sheet("Empty").unwrap();
        ExcelReader::from_workbook(book).unwrap()
    }

    #[test]
    fn test_read_skips_empty_rows() {
        let mut reader = sample();
        assert_eq!(reader.read().len(), 3);
        assert_eq!(reader.read_range(1, 1), vec![vec![CellValue::from(" Ann "), CellValue::Int(1)]]);

        reader.set_ignore_empty_row(false);
        assert_eq!(reader.read().len(), 4);
        assert!(reader.read()[2].is_empty());
    }

    #[test]
    fn test_read_records_pads_and_aliases() {
        let mut reader = sample();
        reader.add_header_alias("姓名", "name").set_cell_editor(TrimEditor);

        let records = reader.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].keys().collect::<Vec<_>>(), vec!["name", "B", "age"]);
        assert_eq!(records[0]["name"], CellValue::from("Ann"));
        assert_eq!(records[0]["age"], CellValue::Empty);
        assert_eq!(records[1]["age"], CellValue::Int(40));

        // first row aliased when reading lists
        assert_eq!(reader.read()[0][0], CellValue::from("name"));
    }

    #[test]
    fn test_header_out_of_bounds() {
        let reader = sample();
        assert!(matches!(
            reader.read_records(9, 0, 10),
            Err(ExcelError::IndexOutOfBounds { index: 9, first: 0, last: 3 })
        ));
    }

    #[test]
    fn test_sheet_selection() {
        let mut reader = sample();
        reader.set_sheet("Empty").unwrap();
        assert!(reader.read().is_empty());
        assert_eq!(reader.row_count(), 0);
        assert!(reader.read_records(0, 0, 5).is_err());

        assert!(matches!(
            reader.set_sheet("Missing"),
            Err(ExcelError::SheetNotFound { .. })
        ));
        assert!(reader.set_sheet_at(2).is_err());
        reader.set_sheet_at(0).unwrap();
        assert_eq!(reader.row_count(), 4);
        assert_eq!(reader.physical_row_count(), 3);
        assert_eq!(reader.column_count(), 3);
    }

    #[test]
    fn test_read_cells_and_text() {
        let mut book = Workbook::new();
        let idx = book.get_or_create_sheet("S").unwrap();
        let sheet = book.sheet_mut(idx).unwrap();
        sheet.get_or_create_cell(0, 0).unwrap().set_kind(CellKind::Text("t".into()));
        sheet.get_or_create_cell(2, 0).unwrap().set_kind(CellKind::Numeric(1.5));
        sheet.add_merged_region(CellRange::new(0, 1, 0, 0)).unwrap();
        sheet.get_or_create_cell(0, 1).unwrap();

        let reader = ExcelReader::from_workbook(book).unwrap();
        let mut seen = Vec::new();
        reader.read_cells(0, usize::MAX, |loc, cell, value| {
            seen.push((loc.reference(), cell.is_some(), value));
        });
        assert_eq!(
            seen,
            vec![
                ("A1".to_string(), true, CellValue::from("t")),
                ("B1".to_string(), false, CellValue::Empty),
                ("C1".to_string(), true, CellValue::Float(1.5)),
                ("A2".to_string(), true, CellValue::from("t")),
            ]
        );
        assert_eq!(reader.read_as_text(true), "S\nt\t\t1.5\n\n");
    }

    #[test]
    fn test_into_writer_keeps_sheet() {
        let mut reader = sample();
        reader.set_sheet_at(1).unwrap();
        let writer = reader.into_writer();
        assert_eq!(writer.sheet_index(), 1);
        assert!(writer.dest().is_none());
    }
}
