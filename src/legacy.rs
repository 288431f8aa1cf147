//! Legacy `.xls` (BIFF8) loading through calamine
//!
//! The binary format is read only: the loaded [`Workbook`] carries
//! [`BookFormat::Xls`] and refuses to be written or streamed. Cell values,
//! cached formula results and merged regions are kept; styles are not,
//! except that date cells get a date number format so they coerce to dates.

use std::io::{Read, Seek};

use calamine::{Data, Range, Reader, Xls};

use crate::book::{
    BookFormat, CellKind, CellRange, CellStyle, ErrorCode, FormulaResult, NumberFormat, Sheet,
    StyleHandle, Workbook,
};
use crate::error::Result;

/// Built-in `m/d/yyyy`
const DATE_FORMAT: u32 = 14;
/// Built-in `m/d/yyyy h:mm`
const DATETIME_FORMAT: u32 = 22;

/// Load every sheet of an `.xls` workbook
pub(crate) fn load<R: Read + Seek>(reader: R) -> Result<Workbook> {
    let mut xls = Xls::new(reader)?;
    let mut book = Workbook::with_format(BookFormat::Xls);
    let styles = DateStyles::new();

    for name in xls.sheet_names() {
        let index = book.create_sheet(&name)?;
        let range = xls.worksheet_range(&name)?;
        let formulas = match xls.worksheet_formula(&name) {
            Ok(formulas) => Some(formulas),
            Err(e) => {
                log::warn!("formulas of sheet '{}' could not be read: {}", name, e);
                None
            }
        };
        let merges = xls.worksheet_merge_cells(&name).unwrap_or_default();

        let Some(sheet) = book.sheet_mut(index) else {
            continue;
        };
        fill_sheet(sheet, &range, formulas.as_ref(), &styles)?;
        for dims in merges {
            let region = CellRange::new(
                dims.start.0 as usize,
                dims.end.0 as usize,
                dims.start.1 as usize,
                dims.end.1 as usize,
            );
            if let Err(e) = sheet.add_merged_region(region) {
                log::warn!("skipping merged region in sheet '{}': {}", name, e);
            }
        }
        log::debug!(
            "loaded xls sheet '{}' with {} rows",
            name,
            sheet.physical_row_count()
        );
    }
    Ok(book)
}

/// Shared number-format styles for date cells
struct DateStyles {
    date: StyleHandle,
    datetime: StyleHandle,
}

impl DateStyles {
    fn new() -> Self {
        let builtin = |id| {
            StyleHandle::new(CellStyle::default().with_number_format(NumberFormat::BuiltIn(id)))
        };
        DateStyles {
            date: builtin(DATE_FORMAT),
            datetime: builtin(DATETIME_FORMAT),
        }
    }

    fn for_serial(&self, serial: f64) -> StyleHandle {
        if serial.fract() == 0.0 {
            self.date.clone()
        } else {
            self.datetime.clone()
        }
    }
}

fn fill_sheet(
    sheet: &mut Sheet,
    range: &Range<Data>,
    formulas: Option<&Range<String>>,
    styles: &DateStyles,
) -> Result<()> {
    let (row0, col0) = range.start().unwrap_or((0, 0));
    for (r, c, data) in range.used_cells() {
        let (row, col) = (row0 + r as u32, col0 + c as u32);
        let kind = data_to_kind(data);
        let formula = formulas
            .and_then(|f| f.get_value((row, col)))
            .filter(|f| !f.is_empty());
        let cell = sheet.get_or_create_cell(col as usize, row as usize)?;
        if let Data::DateTime(dt) = data {
            cell.set_style(Some(styles.for_serial(dt.as_f64())));
        }
        cell.set_kind(match formula {
            Some(expr) => CellKind::Formula {
                expr: expr.clone(),
                cached: cached_result(kind),
            },
            None => kind,
        });
    }
    Ok(())
}

fn data_to_kind(data: &Data) -> CellKind {
    match data {
        Data::Empty => CellKind::Blank,
        Data::Int(i) => CellKind::Numeric(*i as f64),
        Data::Float(f) => CellKind::Numeric(*f),
        Data::Bool(b) => CellKind::Bool(*b),
        Data::String(s) => CellKind::Text(s.clone()),
        Data::DateTime(dt) => CellKind::Numeric(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellKind::Text(s.clone()),
        Data::Error(e) => match ErrorCode::parse(&e.to_string()) {
            Some(code) => CellKind::Error(code),
            None => CellKind::Text(e.to_string()),
        },
    }
}

fn cached_result(kind: CellKind) -> FormulaResult {
    match kind {
        CellKind::Numeric(n) => FormulaResult::Numeric(n),
        CellKind::Text(s) => FormulaResult::Text(s),
        CellKind::Bool(b) => FormulaResult::Bool(b),
        CellKind::Error(e) => FormulaResult::Error(e),
        CellKind::Blank | CellKind::Formula { .. } => FormulaResult::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::CellErrorType;

    #[test]
    fn test_data_to_kind() {
        assert_eq!(
            data_to_kind(&Data::String("test".to_string())),
            CellKind::Text("test".to_string())
        );
        assert_eq!(data_to_kind(&Data::Int(42)), CellKind::Numeric(42.0));
        assert_eq!(data_to_kind(&Data::Bool(true)), CellKind::Bool(true));
        assert_eq!(data_to_kind(&Data::Empty), CellKind::Blank);
        assert_eq!(
            data_to_kind(&Data::Error(CellErrorType::Div0)),
            CellKind::Error(ErrorCode::Div0)
        );
    }

    #[test]
    fn test_cached_result() {
        assert_eq!(
            cached_result(CellKind::Numeric(2.5)),
            FormulaResult::Numeric(2.5)
        );
        assert_eq!(cached_result(CellKind::Blank), FormulaResult::None);
    }

    #[test]
    fn test_fill_sheet_offsets_formulas() {
        let mut range = Range::new((2, 1), (2, 2));
        range.set_value((2, 1), Data::Float(1.5));
        range.set_value((2, 2), Data::Int(7));
        let mut formulas = Range::new((2, 1), (2, 1));
        formulas.set_value((2, 1), "3/2".to_string());

        let mut book = Workbook::with_format(BookFormat::Xls);
        let index = book.create_sheet("Sheet1").unwrap();
        let sheet = book.sheet_mut(index).unwrap();
        fill_sheet(sheet, &range, Some(&formulas), &DateStyles::new()).unwrap();

        assert_eq!(
            sheet.cell(1, 2).unwrap().kind(),
            &CellKind::Formula {
                expr: "3/2".into(),
                cached: FormulaResult::Numeric(1.5)
            }
        );
        assert_eq!(
            crate::coerce::cell_value(sheet, 2, 2, None),
            crate::types::CellValue::Int(7)
        );
        assert!(sheet.cell(0, 0).is_none());
    }

    #[test]
    fn test_date_styles_by_serial() {
        let styles = DateStyles::new();
        let date = styles.for_serial(45366.0);
        let datetime = styles.for_serial(45366.25);
        assert_eq!(
            date.with(|s| s.number_format.builtin_id()),
            Some(DATE_FORMAT)
        );
        assert_eq!(
            datetime.with(|s| s.number_format.builtin_id()),
            Some(DATETIME_FORMAT)
        );
    }
}
