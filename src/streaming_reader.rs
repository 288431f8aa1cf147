//! Event-driven reading for very large workbooks
//!
//! [`SaxReader`] pulls worksheet XML straight out of the zip entry with
//! `quick-xml` and hands each row to a [`RowHandler`] as soon as its closing
//! tag is seen. Only the shared strings and the number-format table are held
//! in memory.
//!
//! Row values follow the coercion rules of [`crate::coerce`]: numbers under a
//! date format become dates, integral numbers without a decimal format
//! become `Int`. Missing cells inside a row are filled with empty strings,
//! and every row is padded to the width of the first row.
//!
//! Legacy `.xls` input (feature `xls`) is loaded in full and its rows are
//! replayed through the same handler.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::book::{BookFormat, CellKind, FormulaResult};
use crate::coerce::number_value;
use crate::error::{ExcelError, Result};
use crate::types::CellValue;
use crate::xlsx::load::cell_kind;
use crate::xlsx::parts::{
    attr, cell_column, open_archive, part_reader, read_shared_strings, read_sheet_entries,
    read_styles, shared_strings_path, styles_path, RichText, StylesPart,
};

/// Receives rows as they are read
pub trait RowHandler {
    /// One row; `row_index` is zero-based
    fn handle(&mut self, sheet_index: usize, row_index: usize, row: &[CellValue]);

    /// Called once after the last selected sheet
    fn done_all(&mut self) {}
}

impl<F> RowHandler for F
where
    F: FnMut(usize, usize, &[CellValue]),
{
    fn handle(&mut self, sheet_index: usize, row_index: usize, row: &[CellValue]) {
        self(sheet_index, row_index, row)
    }
}

/// Which sheets to read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelector {
    All,
    First,
    /// Zero-based position in the workbook
    Index(usize),
    Name(String),
    /// Relationship id of the sheet, such as `"rId2"`
    RelationId(String),
}

impl From<usize> for SheetSelector {
    fn from(index: usize) -> Self {
        SheetSelector::Index(index)
    }
}

/// `"rIdN"` selects by relationship id, anything else by name
impl From<&str> for SheetSelector {
    fn from(s: &str) -> Self {
        if s.starts_with("rId") {
            SheetSelector::RelationId(s.to_string())
        } else {
            SheetSelector::Name(s.to_string())
        }
    }
}

/// Sheet identity used for selection
struct SheetKey<'a> {
    name: &'a str,
    rel_id: &'a str,
}

fn select(sheets: &[SheetKey<'_>], selector: &SheetSelector) -> Result<Vec<usize>> {
    let not_found = |sheet: String| ExcelError::SheetNotFound {
        sheet,
        available: sheets
            .iter()
            .map(|s| s.name)
            .collect::<Vec<_>>()
            .join(", "),
    };
    let found = match selector {
        SheetSelector::All => return Ok((0..sheets.len()).collect()),
        SheetSelector::First => (!sheets.is_empty()).then_some(0),
        SheetSelector::Index(i) => (*i < sheets.len()).then_some(*i),
        SheetSelector::Name(name) => sheets.iter().position(|s| s.name == name),
        SheetSelector::RelationId(id) => sheets.iter().position(|s| s.rel_id == id),
    };
    match found {
        Some(index) => Ok(vec![index]),
        None => Err(not_found(match selector {
            SheetSelector::Name(s) | SheetSelector::RelationId(s) => s.clone(),
            SheetSelector::Index(i) => i.to_string(),
            _ => "first sheet".to_string(),
        })),
    }
}

/// Streaming reader driving a [`RowHandler`]
///
/// # Examples
///
/// ```no_run
/// use excelkit::streaming_reader::{SaxReader, SheetSelector};
/// use excelkit::CellValue;
///
/// let mut count = 0;
/// let mut reader = SaxReader::new(|_sheet: usize, _row: usize, _values: &[CellValue]| {
///     count += 1;
/// });
/// reader.read_path("large.xlsx", SheetSelector::First).unwrap();
/// ```
pub struct SaxReader<H> {
    handler: H,
}

impl<H: RowHandler> SaxReader<H> {
    pub fn new(handler: H) -> Self {
        SaxReader { handler }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Read a workbook file
    pub fn read_path<P: AsRef<Path>>(&mut self, path: P, selector: SheetSelector) -> Result<()> {
        let file = File::open(path.as_ref())?;
        self.read(BufReader::new(file), selector)
    }

    /// Read a workbook from any seekable source, sniffing its format
    pub fn read<R: Read + Seek>(&mut self, mut source: R, selector: SheetSelector) -> Result<()> {
        match BookFormat::detect(&mut source)? {
            BookFormat::Xlsx => self.read_xlsx(source, &selector)?,
            BookFormat::Xls => self.read_xls(source, &selector)?,
        }
        self.handler.done_all();
        Ok(())
    }

    fn read_xlsx<R: Read + Seek>(&mut self, source: R, selector: &SheetSelector) -> Result<()> {
        let mut archive = open_archive(source)?;
        let entries = read_sheet_entries(&mut archive)?;
        let keys: Vec<SheetKey<'_>> = entries
            .iter()
            .map(|e| SheetKey {
                name: &e.name,
                rel_id: &e.rel_id,
            })
            .collect();
        let selected = select(&keys, selector)?;

        let sst_path = shared_strings_path(&mut archive)?;
        let strings = read_shared_strings(&mut archive, &sst_path)?;
        let styles_part = styles_path(&mut archive)?;
        let styles = read_styles(&mut archive, &styles_part)?;
        let mut formats = FormatCache::new(&styles);

        for index in selected {
            let entry = &entries[index];
            log::debug!("streaming rows of sheet '{}' from {}", entry.name, entry.path);
            match part_reader(&mut archive, &entry.path)? {
                Some(reader) => stream_rows(
                    reader,
                    &entry.path,
                    index,
                    &strings,
                    &mut formats,
                    &mut self.handler,
                )?,
                None => log::warn!("sheet '{}' has no part at {}", entry.name, entry.path),
            }
        }
        Ok(())
    }

    #[cfg(feature = "xls")]
    fn read_xls<R: Read + Seek>(&mut self, source: R, selector: &SheetSelector) -> Result<()> {
        let book = crate::legacy::load(source)?;
        let names = book.sheet_names();
        let rel_ids: Vec<String> = (1..=names.len()).map(|i| format!("rId{}", i)).collect();
        let keys: Vec<SheetKey<'_>> = names
            .iter()
            .zip(&rel_ids)
            .map(|(name, rel_id)| SheetKey { name, rel_id })
            .collect();

        for index in select(&keys, selector)? {
            let Some(sheet) = book.sheet(index) else {
                continue;
            };
            let mut rows = RowBuffer::default();
            for (y, row) in sheet.rows() {
                for x in 0..row.last_cell_num() {
                    let value = match crate::coerce::cell_value(sheet, x, y, None) {
                        CellValue::Empty => CellValue::String(String::new()),
                        value => value,
                    };
                    rows.set(x, value);
                }
                rows.emit(index, y, &mut self.handler);
            }
        }
        Ok(())
    }

    #[cfg(not(feature = "xls"))]
    fn read_xls<R: Read + Seek>(&mut self, _source: R, _selector: &SheetSelector) -> Result<()> {
        Err(crate::legacy_disabled())
    }
}

/// Number format per `cellXfs` index, looked up once per index
struct FormatCache<'a> {
    styles: &'a StylesPart,
    formats: HashMap<usize, (u32, String)>,
}

impl<'a> FormatCache<'a> {
    fn new(styles: &'a StylesPart) -> Self {
        FormatCache {
            styles,
            formats: HashMap::new(),
        }
    }

    fn get(&mut self, xf: usize) -> &(u32, String) {
        let styles = self.styles;
        self.formats
            .entry(xf)
            .or_insert_with(|| styles.number_format(xf))
    }
}

/// Cells of the row being read
#[derive(Default)]
struct RowBuffer {
    cells: Vec<CellValue>,
    width: Option<usize>,
}

impl RowBuffer {
    fn set(&mut self, x: usize, value: CellValue) {
        if x < self.cells.len() {
            self.cells[x] = value;
            return;
        }
        self.cells.resize(x, CellValue::String(String::new()));
        self.cells.push(value);
    }

    /// Pad to the first row's width, hand the row over and start a new one
    fn emit<H: RowHandler>(&mut self, sheet_index: usize, row_index: usize, handler: &mut H) {
        let width = *self.width.get_or_insert(self.cells.len());
        if self.cells.len() < width {
            self.cells.resize(width, CellValue::String(String::new()));
        }
        handler.handle(sheet_index, row_index, &self.cells);
        self.cells.clear();
    }
}

struct PendingCell {
    x: usize,
    xf: usize,
    cell_type: Option<String>,
    value: String,
    inline: RichText,
}

fn stream_rows<B: BufRead, H: RowHandler>(
    mut reader: Reader<B>,
    part: &str,
    sheet_index: usize,
    strings: &[String],
    formats: &mut FormatCache<'_>,
    handler: &mut H,
) -> Result<()> {
    let mut rows = RowBuffer::default();
    let mut row_index = 0usize;
    let mut next_row = 0usize;
    let mut cell: Option<PendingCell> = None;
    let mut in_value = false;
    let mut in_inline = false;
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| ExcelError::xml(part, e))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let empty = matches!(event, Event::Empty(_));
                match e.local_name().as_ref() {
                    b"row" => {
                        row_index = attr(e, b"r")
                            .and_then(|r| r.trim().parse::<usize>().ok())
                            .and_then(|r| r.checked_sub(1))
                            .unwrap_or(next_row);
                        if empty {
                            rows.emit(sheet_index, row_index, handler);
                            next_row = row_index + 1;
                        }
                    }
                    b"c" => match cell_column(e, rows.cells.len()) {
                        Some(x) => {
                            let pending = PendingCell {
                                x,
                                xf: attr(e, b"s")
                                    .and_then(|s| s.parse().ok())
                                    .unwrap_or(0),
                                cell_type: attr(e, b"t"),
                                value: String::new(),
                                inline: RichText::default(),
                            };
                            if empty {
                                finish_cell(pending, strings, formats, &mut rows);
                            } else {
                                cell = Some(pending);
                            }
                        }
                        None => log::warn!(
                            "{}: skipping cell {:?} in row {}: bad column",
                            part,
                            attr(e, b"r").unwrap_or_default(),
                            row_index + 1
                        ),
                    },
                    b"v" if !empty => in_value = true,
                    b"is" if !empty => in_inline = true,
                    local if in_inline => {
                        if let Some(pending) = cell.as_mut() {
                            pending.inline.start(local);
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(ref t) if in_value || in_inline => {
                let text = t.unescape().map_err(|e| ExcelError::xml(part, e))?;
                if let Some(pending) = cell.as_mut() {
                    if in_value {
                        pending.value.push_str(&text);
                    } else {
                        pending.inline.text(&text);
                    }
                }
            }
            Event::CData(ref t) if in_value => {
                if let Some(pending) = cell.as_mut() {
                    pending.value.push_str(&String::from_utf8_lossy(t));
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"v" => in_value = false,
                b"is" => in_inline = false,
                b"c" => {
                    if let Some(pending) = cell.take() {
                        finish_cell(pending, strings, formats, &mut rows);
                    }
                }
                b"row" => {
                    rows.emit(sheet_index, row_index, handler);
                    next_row = row_index + 1;
                }
                b"sheetData" => break,
                local if in_inline => {
                    if let Some(pending) = cell.as_mut() {
                        pending.inline.end(local);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn finish_cell(
    mut pending: PendingCell,
    strings: &[String],
    formats: &mut FormatCache<'_>,
    rows: &mut RowBuffer,
) {
    let inline = pending.inline.take();
    let kind = cell_kind(
        pending.cell_type.as_deref(),
        pending.value,
        None,
        inline,
        strings,
    );
    let value = stream_value(kind, pending.xf, formats);
    rows.set(pending.x, value);
}

fn stream_value(kind: CellKind, xf: usize, formats: &mut FormatCache<'_>) -> CellValue {
    match kind {
        CellKind::Blank => CellValue::String(String::new()),
        CellKind::Numeric(n) => {
            let (id, code) = formats.get(xf);
            number_value(n, *id, code)
        }
        CellKind::Text(s) => CellValue::String(s),
        CellKind::Bool(b) => CellValue::Bool(b),
        CellKind::Error(code) => CellValue::Error(code.as_str().to_string()),
        CellKind::Formula { cached, .. } => match cached {
            FormulaResult::None => CellValue::String(String::new()),
            FormulaResult::Numeric(n) => stream_value(CellKind::Numeric(n), xf, formats),
            FormulaResult::Text(s) => CellValue::String(s),
            FormulaResult::Bool(b) => CellValue::Bool(b),
            FormulaResult::Error(code) => CellValue::Error(code.as_str().to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    struct Collect {
        rows: Vec<(usize, usize, Vec<CellValue>)>,
        done: bool,
    }

    impl RowHandler for Collect {
        fn handle(&mut self, sheet_index: usize, row_index: usize, row: &[CellValue]) {
            self.rows.push((sheet_index, row_index, row.to_vec()));
        }

        fn done_all(&mut self) {
            self.done = true;
        }
    }

    fn styles_with_date() -> StylesPart {
        let xml = r#"<styleSheet>
            <numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy-mm-dd"/></numFmts>
            <cellXfs count="3">
                <xf numFmtId="0"/>
                <xf numFmtId="164" applyNumberFormat="1"/>
                <xf numFmtId="2" applyNumberFormat="1"/>
            </cellXfs>
        </styleSheet>"#;
        let mut reader = Reader::from_reader(xml.as_bytes());
        reader.config_mut().trim_text(true);
        crate::xlsx::parts::parse_styles(reader, "styles.xml").unwrap()
    }

    #[test]
    fn test_stream_rows_fills_gaps() {
        let xml = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="s"><v>0</v></c><c r="C1" t="s"><v>1</v></c><c r="D1"><v>4</v></c></row>
            <row r="3"><c r="B3" s="1"><v>45366</v></c><c r="C3" s="2"><v>3</v></c></row>
            <row r="4"><c r="A4" t="inlineStr"><is><t>in</t><rPh><t>x</t></rPh></is></c><c r="B4" t="b"><v>1</v></c><c r="C4" t="e"><v>#N/A</v></c><c r="D4" t="str"><v>calc</v></c></row>
            <row r="5"/>
        </sheetData></worksheet>"#;
        let strings = vec!["name".to_string(), "tail".to_string()];
        let styles = styles_with_date();
        let mut formats = FormatCache::new(&styles);
        let mut handler = Collect {
            rows: Vec::new(),
            done: false,
        };

        stream_rows(
            Reader::from_str(xml),
            "sheet1.xml",
            0,
            &strings,
            &mut formats,
            &mut handler,
        )
        .unwrap();

        let empty = || CellValue::String(String::new());
        let date = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(
            handler.rows,
            vec![
                (0, 0, vec!["name".into(), empty(), "tail".into(), CellValue::Int(4)]),
                (0, 2, vec![empty(), CellValue::Date(date), CellValue::Float(3.0), empty()]),
                (
                    0,
                    3,
                    vec![
                        "in".into(),
                        CellValue::Bool(true),
                        CellValue::Error("#N/A".into()),
                        "calc".into()
                    ]
                ),
                (0, 4, vec![empty(), empty(), empty(), empty()]),
            ]
        );
        assert!(!handler.done);
    }

    #[test]
    fn test_stream_rows_skips_columns_past_xfd() {
        let xml = r#"<worksheet><sheetData>
            <row r="1"><c r="ZZZZZZZZZZ1"><v>1</v></c><c r="XFE1" t="inlineStr"><is><t>x</t></is></c><c r="A1"><v>2</v></c></row>
        </sheetData></worksheet>"#;
        let styles = styles_with_date();
        let mut formats = FormatCache::new(&styles);
        let mut handler = Collect {
            rows: Vec::new(),
            done: false,
        };

        stream_rows(
            Reader::from_str(xml),
            "sheet1.xml",
            0,
            &[],
            &mut formats,
            &mut handler,
        )
        .unwrap();

        assert_eq!(handler.rows, vec![(0, 0, vec![CellValue::Int(2)])]);
    }

    #[test]
    fn test_selector() {
        let keys = [
            SheetKey {
                name: "a",
                rel_id: "rId1",
            },
            SheetKey {
                name: "b",
                rel_id: "rId2",
            },
        ];
        assert_eq!(select(&keys, &SheetSelector::All).unwrap(), vec![0, 1]);
        assert_eq!(select(&keys, &SheetSelector::First).unwrap(), vec![0]);
        assert_eq!(select(&keys, &"b".into()).unwrap(), vec![1]);
        assert_eq!(select(&keys, &"rId2".into()).unwrap(), vec![1]);
        assert_eq!(select(&keys, &1usize.into()).unwrap(), vec![1]);
        assert!(matches!(
            select(&keys, &SheetSelector::Index(5)),
            Err(ExcelError::SheetNotFound { .. })
        ));
        assert!(select(&[], &SheetSelector::First).is_err());
    }

    #[test]
    fn test_closure_handler() {
        let mut seen = 0;
        {
            let mut handler = |_: usize, _: usize, row: &[CellValue]| seen += row.len();
            RowHandler::handle(&mut handler, 0, 0, &[CellValue::Int(1), CellValue::Int(2)]);
        }
        assert_eq!(seen, 2);
    }
}
