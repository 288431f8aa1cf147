//! Integration tests for excelkit

use std::io::Cursor;

use chrono::NaiveDate;
use excelkit::book::{CellKind, CellRange, CellStyle, Font, FormulaResult};
use excelkit::types::{col_name_to_index, index_to_col_name, to_location, CellLocation};
use excelkit::{
    get_big_writer, BigExcelWriter, CellValue, ExcelError, ExcelReader, ExcelWriter,
    ExcelWriterBuilder, SaxReader, SheetSelector, StyleHandle, TrimEditor, Workbook,
};
use tempfile::NamedTempFile;

fn to_bytes(writer: &mut ExcelWriter) -> Vec<u8> {
    let mut buf = Vec::new();
    writer.flush_to(&mut buf).unwrap();
    buf
}

#[test]
fn test_write_and_read_roundtrip() {
    let temp = NamedTempFile::new().unwrap();

    {
        let mut writer = ExcelWriterBuilder::new(temp.path()).build().unwrap();
        writer.write_head_row(["Name", "Age", "City"]).unwrap();
        writer.write_row(["Alice", "30", "NYC"]).unwrap();
        writer.write_row(["Bob", "25", "SF"]).unwrap();
        writer.close().unwrap();
    }

    let reader = ExcelReader::open(temp.path()).unwrap();
    let rows = reader.read();
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows[0],
        vec![
            CellValue::from("Name"),
            CellValue::from("Age"),
            CellValue::from("City")
        ]
    );
    assert_eq!(
        rows[1],
        vec![
            CellValue::from("Alice"),
            CellValue::from("30"),
            CellValue::from("NYC")
        ]
    );
}

#[test]
fn test_typed_cells() {
    let mut writer = ExcelWriter::new();
    writer
        .write_row([
            CellValue::from("x"),
            CellValue::Float(3.5),
            CellValue::Bool(true),
        ])
        .unwrap();
    let bytes = to_bytes(&mut writer);

    let reader = ExcelReader::from_reader(Cursor::new(bytes)).unwrap();
    assert_eq!(
        reader.read(),
        vec![vec![
            CellValue::from("x"),
            CellValue::Float(3.5),
            CellValue::Bool(true)
        ]]
    );
}

#[test]
fn test_integral_numbers_read_as_int() {
    let mut writer = ExcelWriterBuilder::in_memory()
        .without_default_styles()
        .build()
        .unwrap();
    writer
        .write_row([CellValue::Float(3.0), CellValue::Float(0.1 + 0.2), CellValue::Int(-7)])
        .unwrap();
    let bytes = to_bytes(&mut writer);

    let reader = ExcelReader::from_reader(Cursor::new(bytes)).unwrap();
    assert_eq!(
        reader.read_row(0),
        vec![CellValue::Int(3), CellValue::Float(0.3), CellValue::Int(-7)]
    );
}

#[test]
fn test_alias_round_trip() {
    let mut writer = ExcelWriterBuilder::in_memory()
        .with_alias("id", "ID")
        .with_alias("name", "Name")
        .build()
        .unwrap();
    writer
        .write([
            vec![("name", CellValue::from("Ann")), ("id", CellValue::Int(1))],
            vec![("name", CellValue::from("Bob")), ("id", CellValue::Int(2))],
        ])
        .unwrap();
    let bytes = to_bytes(&mut writer);

    let mut reader = ExcelReader::from_reader(Cursor::new(bytes)).unwrap();
    assert_eq!(
        reader.read_row(0),
        vec![CellValue::from("ID"), CellValue::from("Name")]
    );

    reader.add_header_alias("ID", "id").add_header_alias("Name", "name");
    let records = reader.read_all().unwrap();
    assert_eq!(records.len(), 2);
    let keys: Vec<&str> = records[0].keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["id", "name"]);
    assert_eq!(records[0]["id"], CellValue::Int(1));
    assert_eq!(records[1]["name"], CellValue::from("Bob"));
}

#[test]
fn test_only_alias_drops_unaliased_fields() {
    let mut writer = ExcelWriterBuilder::in_memory()
        .with_alias("id", "ID")
        .with_only_alias(true)
        .build()
        .unwrap();
    writer
        .write([[("id", CellValue::Int(1)), ("secret", CellValue::from("x"))]])
        .unwrap();
    let bytes = to_bytes(&mut writer);

    let reader = ExcelReader::from_reader(Cursor::new(bytes)).unwrap();
    assert_eq!(
        reader.read(),
        vec![vec![CellValue::from("ID")], vec![CellValue::Int(1)]]
    );
}

#[test]
fn test_merged_members_read_as_anchor() {
    let mut writer = ExcelWriter::new();
    writer
        .merge_region(CellRange::new(0, 1, 0, 2), Some("Group".into()), None)
        .unwrap();
    writer.write_cell_value(0, 2, "below").unwrap();
    let bytes = to_bytes(&mut writer);

    let reader = ExcelReader::from_reader(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.sheet().merged_regions().len(), 1);
    let anchor = reader.read_cell_value(0, 0);
    assert_eq!(anchor, CellValue::from("Group"));
    for (x, y) in [(1, 0), (2, 0), (0, 1), (2, 1)] {
        assert_eq!(reader.read_cell_value(x, y), anchor);
    }
    assert_eq!(reader.read_cell_value(0, 2), CellValue::from("below"));
}

#[test]
fn test_flush_is_idempotent() {
    let temp = NamedTempFile::new().unwrap();
    let mut writer = get_big_writer(temp.path()).unwrap();
    writer.write_row(["a", "b"]).unwrap();
    writer.flush().unwrap();
    let first = std::fs::read(temp.path()).unwrap();

    writer.write_row(["ignored"]).unwrap();
    writer.flush().unwrap();
    writer.close().unwrap();
    assert_eq!(std::fs::read(temp.path()).unwrap(), first);
}

#[test]
fn test_big_writer_round_trip() {
    let mut writer = BigExcelWriter::with_window(50);
    writer.write_head_row(["id", "label"]).unwrap();
    for i in 0..500i64 {
        writer
            .write_row([CellValue::Int(i), CellValue::from(format!("row {}", i))])
            .unwrap();
    }
    let mut buf = Vec::new();
    writer.flush_to(&mut buf).unwrap();
    writer.close().unwrap();

    let reader = ExcelReader::from_reader(Cursor::new(buf)).unwrap();
    let rows = reader.read();
    assert_eq!(rows.len(), 501);
    assert_eq!(
        rows[500],
        vec![CellValue::Int(499), CellValue::from("row 499")]
    );
}

#[test]
fn test_address_conversions() {
    assert_eq!(index_to_col_name(0), "A");
    assert_eq!(index_to_col_name(25), "Z");
    assert_eq!(index_to_col_name(26), "AA");
    assert_eq!(index_to_col_name(701), "ZZ");
    assert_eq!(index_to_col_name(702), "AAA");
    assert_eq!(col_name_to_index("AA"), Some(26));
    assert_eq!(col_name_to_index("zz"), Some(701));
    assert_eq!(to_location("$B$3").unwrap(), CellLocation::new(1, 2));
    assert_eq!(CellLocation::new(27, 9).reference(), "AB10");
    assert!(matches!(to_location("3B"), Err(ExcelError::InvalidCell(_))));
}

#[test]
fn test_workbook_save_load_keeps_formulas_and_styles() {
    let temp = NamedTempFile::new().unwrap();
    let bold = StyleHandle::new(CellStyle::default().with_font(Font {
        bold: true,
        ..Font::default()
    }));

    {
        let mut book = Workbook::new();
        let index = book.create_sheet("Data").unwrap();
        let sheet = book.sheet_mut(index).unwrap();
        let cell = sheet.get_or_create_cell(0, 0).unwrap();
        cell.set_kind(CellKind::Numeric(2.0));
        cell.set_style(Some(bold.clone()));
        sheet.get_or_create_cell(1, 0).unwrap().set_kind(CellKind::Formula {
            expr: "A1*2".into(),
            cached: FormulaResult::Numeric(4.0),
        });
        sheet.add_merged_region(CellRange::new(2, 3, 0, 1)).unwrap();
        book.save(temp.path()).unwrap();
    }

    let book = Workbook::open(temp.path()).unwrap();
    let sheet = book.sheet(0).unwrap();
    assert_eq!(sheet.name(), "Data");
    assert_eq!(
        sheet.cell(1, 0).unwrap().kind(),
        &CellKind::Formula {
            expr: "A1*2".into(),
            cached: FormulaResult::Numeric(4.0)
        }
    );
    let style = sheet.cell(0, 0).unwrap().style().unwrap();
    assert!(style.with(|s| s.font.bold));
    assert_eq!(sheet.merged_regions(), &[CellRange::new(2, 3, 0, 1)]);

    let reader = ExcelReader::from_workbook(book).unwrap();
    assert_eq!(reader.read_cell_value(1, 0), CellValue::Int(4));
}

#[test]
fn test_sax_reader_fills_gaps_and_resolves_values() {
    let date = NaiveDate::from_ymd_opt(2024, 3, 15)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    let mut writer = ExcelWriter::new();
    writer.write_cell_value(0, 0, "first").unwrap();
    writer.write_cell_value(2, 0, "third").unwrap();
    writer.write_cell_value(0, 1, date).unwrap();
    writer.write_cell_value(1, 1, 42).unwrap();
    writer.write_cell_value(0, 3, true).unwrap();
    let bytes = to_bytes(&mut writer);

    let mut rows = Vec::new();
    let mut reader = SaxReader::new(|sheet: usize, row: usize, values: &[CellValue]| {
        rows.push((sheet, row, values.to_vec()))
    });
    reader
        .read(Cursor::new(bytes), SheetSelector::First)
        .unwrap();
    drop(reader);

    let blank = || CellValue::from("");
    assert_eq!(
        rows,
        vec![
            (
                0,
                0,
                vec![CellValue::from("first"), blank(), CellValue::from("third")]
            ),
            (0, 1, vec![CellValue::Date(date), CellValue::Int(42), blank()]),
            (0, 3, vec![CellValue::Bool(true), blank(), blank()]),
        ]
    );
}

#[test]
fn test_sax_reader_unknown_sheet() {
    let mut writer = ExcelWriter::new();
    writer.write_row(["a"]).unwrap();
    let bytes = to_bytes(&mut writer);

    let mut reader = SaxReader::new(|_: usize, _: usize, _: &[CellValue]| {});
    let err = reader
        .read(Cursor::new(bytes), SheetSelector::from("Missing"))
        .unwrap_err();
    assert!(matches!(err, ExcelError::SheetNotFound { .. }));
}

#[test]
fn test_read_records_pads_missing_values() {
    let mut writer = ExcelWriter::new();
    writer.write_head_row(["a", "b", "c"]).unwrap();
    writer.write_row([CellValue::Int(1)]).unwrap();
    let bytes = to_bytes(&mut writer);

    let reader = ExcelReader::from_reader(Cursor::new(bytes)).unwrap();
    let records = reader.read_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["a"], CellValue::Int(1));
    assert_eq!(records[0]["b"], CellValue::Empty);
    assert_eq!(records[0]["c"], CellValue::Empty);
}

#[test]
fn test_trim_editor() {
    let mut writer = ExcelWriter::new();
    writer.write_row(["  padded  ", "plain"]).unwrap();
    let bytes = to_bytes(&mut writer);

    let mut reader = ExcelReader::from_reader(Cursor::new(bytes)).unwrap();
    reader.set_cell_editor(TrimEditor);
    assert_eq!(
        reader.read_row(0),
        vec![CellValue::from("padded"), CellValue::from("plain")]
    );
}

#[test]
fn test_style_handles_share_until_duplicated() {
    let shared = StyleHandle::new(CellStyle::default());
    let alias = shared.clone();
    let copy = shared.duplicate();

    alias.edit(|s| s.font.italic = true);
    assert!(shared.with(|s| s.font.italic));
    assert!(!copy.with(|s| s.font.italic));
    assert_eq!(shared, alias);
    assert_ne!(shared, copy);
}

#[test]
fn test_xls_output_refused() {
    let err = ExcelWriterBuilder::new("report.xls").build().unwrap_err();
    assert!(matches!(err, ExcelError::Unsupported(_)));
}
