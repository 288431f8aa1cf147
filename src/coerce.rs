//! Cell value coercion: stored cells to host values
//!
//! Resolution order for a location:
//!
//! 1. a location inside a merged region resolves to the region's anchor;
//! 2. an absent cell is [`CellValue::Empty`] (or the editor's take on it);
//! 3. the raw type picks the conversion, formula cells going through their
//!    cached result once;
//! 4. the optional [`CellEditor`] sees the result last.
//!
//! Coercion never fails: unreadable content degrades to its text form.

use crate::book::{Cell, CellType, Sheet, StyleHandle};
use crate::book::cell::{number_to_text, round_significant};
use crate::book::style::is_date_format;
use crate::types::{excel_serial_to_datetime, CellValue};

/// Hook applied to every coerced value.
///
/// `cell` is `None` for absent cells.
pub trait CellEditor {
    fn edit(&self, cell: Option<&Cell>, value: CellValue) -> CellValue;
}

impl<F> CellEditor for F
where
    F: Fn(Option<&Cell>, CellValue) -> CellValue,
{
    fn edit(&self, cell: Option<&Cell>, value: CellValue) -> CellValue {
        self(cell, value)
    }
}

/// Trims surrounding whitespace from string values
#[derive(Debug, Clone, Copy, Default)]
pub struct TrimEditor;

impl CellEditor for TrimEditor {
    fn edit(&self, _cell: Option<&Cell>, value: CellValue) -> CellValue {
        match value {
            CellValue::String(s) => CellValue::String(s.trim().to_string()),
            other => other,
        }
    }
}

/// Value at `(x, y)` of a sheet
pub fn cell_value(sheet: &Sheet, x: usize, y: usize, editor: Option<&dyn CellEditor>) -> CellValue {
    resolve(sheet, x, y, None, editor)
}

/// Value at `(x, y)`, optionally reading the raw content as `type_override`.
///
/// The override is dropped when the location is a non-anchor member of a
/// merged region, since the anchor's own type then applies.
pub fn resolve(
    sheet: &Sheet,
    x: usize,
    y: usize,
    type_override: Option<CellType>,
    editor: Option<&dyn CellEditor>,
) -> CellValue {
    let (x, y, type_override) = match sheet.merged_region_at(x, y) {
        Some(region) if region.anchor().x != x || region.anchor().y != y => {
            (region.anchor().x, region.anchor().y, None)
        }
        _ => (x, y, type_override),
    };

    match sheet.cell(x, y) {
        None => match editor {
            Some(editor) => editor.edit(None, CellValue::Empty),
            None => CellValue::Empty,
        },
        Some(cell) => resolve_cell(cell, type_override, editor),
    }
}

/// Value of a single cell without merged-region context
pub fn resolve_cell(
    cell: &Cell,
    type_override: Option<CellType>,
    editor: Option<&dyn CellEditor>,
) -> CellValue {
    let cell_type = type_override.unwrap_or_else(|| cell.cell_type());
    let value = value_of_type(cell, cell_type, true);
    match editor {
        Some(editor) => editor.edit(Some(cell), value),
        None => value,
    }
}

fn value_of_type(cell: &Cell, cell_type: CellType, follow_formula: bool) -> CellValue {
    match cell_type {
        CellType::Numeric => match cell.numeric_value() {
            Some(n) => numeric_value(n, cell.style()),
            None => CellValue::String(cell.string_value()),
        },
        CellType::Boolean => match cell.bool_value() {
            Some(b) => CellValue::Bool(b),
            None => CellValue::String(cell.string_value()),
        },
        CellType::Formula if follow_formula => match cell.cached_result_type() {
            Some(cached) => value_of_type(cell, cached, false),
            None => CellValue::String(cell.string_value()),
        },
        CellType::Blank => CellValue::String(String::new()),
        CellType::Error => match cell.error_code() {
            Some(code) => CellValue::Error(code.as_str().to_string()),
            None => CellValue::String(cell.string_value()),
        },
        _ => CellValue::String(cell.string_value()),
    }
}

fn numeric_value(n: f64, style: Option<&StyleHandle>) -> CellValue {
    let (format_id, format_code) = match style {
        Some(style) => style.with(|s| {
            (
                s.number_format.builtin_id().unwrap_or(u32::MAX),
                s.number_format.format_string().to_string(),
            )
        }),
        None => (0, "General".to_string()),
    };
    number_value(n, format_id, &format_code)
}

/// Normalize a number under a number format.
///
/// Date formats give [`CellValue::Date`] (falling back to `Float` when the
/// serial is out of range). Otherwise a value is `Int` when it is integral
/// and the format shows no decimal point, `Float` rounded to 15 significant
/// digits when not.
pub fn number_value(n: f64, format_id: u32, format_code: &str) -> CellValue {
    if is_date_format(format_id, format_code) {
        if let Some(dt) = excel_serial_to_datetime(n) {
            return CellValue::Date(dt);
        }
    }
    if !format_code.contains('.') && n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        return CellValue::Int(n as i64);
    }
    CellValue::Float(round_significant(n))
}

/// Value of the merged region covering `(x, y)`, read from its anchor.
///
/// `None` when the location is not merged.
pub fn merged_region_value(sheet: &Sheet, x: usize, y: usize) -> Option<CellValue> {
    let anchor = sheet.merged_region_at(x, y)?.anchor();
    Some(resolve(sheet, anchor.x, anchor.y, None, None))
}

/// Text a cell shows, used for width estimates and text dumps
pub fn display_text(cell: &Cell) -> String {
    match resolve_cell(cell, None, None) {
        CellValue::Float(f) => number_to_text(f),
        other => other.as_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{
        CellKind, CellRange, CellStyle, ErrorCode, FormulaResult, NumberFormat, Workbook,
    };
    use chrono::NaiveDate;

    fn book_with_sheet() -> (Workbook, usize) {
        let mut book = Workbook::new();
        let idx = book.get_or_create_sheet("Sheet1").unwrap();
        (book, idx)
    }

    fn put(sheet: &mut Sheet, x: usize, y: usize, kind: CellKind) {
        sheet.get_or_create_cell(x, y).unwrap().set_kind(kind);
    }

    #[test]
    fn test_numeric_normalization() {
        let (mut book, idx) = book_with_sheet();
        let sheet = book.sheet_mut(idx).unwrap();
        put(sheet, 0, 0, CellKind::Numeric(3.0));
        put(sheet, 1, 0, CellKind::Numeric(3.5));
        put(sheet, 2, 0, CellKind::Numeric(0.1 + 0.2));

        assert_eq!(cell_value(sheet, 0, 0, None), CellValue::Int(3));
        assert_eq!(cell_value(sheet, 1, 0, None), CellValue::Float(3.5));
        assert_eq!(cell_value(sheet, 2, 0, None), CellValue::Float(0.3));
    }

    #[test]
    fn test_decimal_format_keeps_float() {
        let (mut book, idx) = book_with_sheet();
        let style = StyleHandle::new(
            CellStyle::default().with_number_format(NumberFormat::BuiltIn(2)),
        );
        let sheet = book.sheet_mut(idx).unwrap();
        let cell = sheet.get_or_create_cell(0, 0).unwrap();
        cell.set_kind(CellKind::Numeric(3.0));
        cell.set_style(Some(style));

        assert_eq!(cell_value(sheet, 0, 0, None), CellValue::Float(3.0));
    }

    #[test]
    fn test_date_format() {
        let (mut book, idx) = book_with_sheet();
        let style = StyleHandle::new(
            CellStyle::default().with_number_format(NumberFormat::Custom("yyyy-mm-dd".into())),
        );
        let sheet = book.sheet_mut(idx).unwrap();
        let cell = sheet.get_or_create_cell(0, 0).unwrap();
        cell.set_kind(CellKind::Numeric(45366.0));
        cell.set_style(Some(style));

        let expected = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(cell_value(sheet, 0, 0, None), CellValue::Date(expected));
    }

    #[test]
    fn test_other_types() {
        let (mut book, idx) = book_with_sheet();
        let sheet = book.sheet_mut(idx).unwrap();
        put(sheet, 0, 0, CellKind::Blank);
        put(sheet, 1, 0, CellKind::Bool(true));
        put(sheet, 2, 0, CellKind::Error(ErrorCode::Div0));
        put(sheet, 3, 0, CellKind::Text("abc".into()));
        put(
            sheet,
            4,
            0,
            CellKind::Formula {
                expr: "1/0".into(),
                cached: FormulaResult::Error(ErrorCode::Div0),
            },
        );
        put(
            sheet,
            5,
            0,
            CellKind::Formula {
                expr: "2*3".into(),
                cached: FormulaResult::Numeric(6.0),
            },
        );

        assert_eq!(cell_value(sheet, 0, 0, None), CellValue::String(String::new()));
        assert_eq!(cell_value(sheet, 1, 0, None), CellValue::Bool(true));
        assert_eq!(
            cell_value(sheet, 2, 0, None),
            CellValue::Error("#DIV/0!".into())
        );
        assert_eq!(cell_value(sheet, 3, 0, None), CellValue::from("abc"));
        assert_eq!(
            cell_value(sheet, 4, 0, None),
            CellValue::Error("#DIV/0!".into())
        );
        assert_eq!(cell_value(sheet, 5, 0, None), CellValue::Int(6));
        assert_eq!(cell_value(sheet, 9, 9, None), CellValue::Empty);
    }

    #[test]
    fn test_type_override() {
        let (mut book, idx) = book_with_sheet();
        let sheet = book.sheet_mut(idx).unwrap();
        put(sheet, 0, 0, CellKind::Numeric(12.0));
        assert_eq!(
            resolve(sheet, 0, 0, Some(CellType::String), None),
            CellValue::from("12")
        );
    }

    #[test]
    fn test_merged_region_resolves_to_anchor() {
        let (mut book, idx) = book_with_sheet();
        let sheet = book.sheet_mut(idx).unwrap();
        put(sheet, 0, 0, CellKind::Text("title".into()));
        put(sheet, 1, 0, CellKind::Blank);
        sheet.add_merged_region(CellRange::new(0, 1, 0, 2)).unwrap();

        let anchor = cell_value(sheet, 0, 0, None);
        for y in 0..=1 {
            for x in 0..=2 {
                assert_eq!(cell_value(sheet, x, y, None), anchor);
            }
        }
        assert_eq!(resolve(sheet, 1, 0, Some(CellType::Blank), None), anchor);
        assert_eq!(merged_region_value(sheet, 2, 1), Some(anchor));
        assert_eq!(merged_region_value(sheet, 3, 0), None);
    }

    #[test]
    fn test_editor_sees_every_value() {
        let (mut book, idx) = book_with_sheet();
        let sheet = book.sheet_mut(idx).unwrap();
        put(sheet, 0, 0, CellKind::Text("  padded ".into()));

        assert_eq!(
            cell_value(sheet, 0, 0, Some(&TrimEditor)),
            CellValue::from("padded")
        );

        let missing = |cell: Option<&Cell>, value: CellValue| {
            if cell.is_none() {
                CellValue::from("n/a")
            } else {
                value
            }
        };
        assert_eq!(cell_value(sheet, 3, 3, Some(&missing)), CellValue::from("n/a"));
    }

    #[test]
    fn test_display_text() {
        let mut cell = Cell::default();
        cell.set_kind(CellKind::Numeric(1.25));
        assert_eq!(display_text(&cell), "1.25");
        cell.set_kind(CellKind::Bool(false));
        assert_eq!(display_text(&cell), "false");
    }
}
