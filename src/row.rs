//! Row-level write and read helpers

use crate::book::Sheet;
use crate::coerce::{cell_value, CellEditor};
use crate::error::Result;
use crate::style_set::StyleSet;
use crate::types::CellValue;

/// Write one value into `(x, y)`.
///
/// With a style set the value-type style is applied first. A non-blank cell
/// is cleared before the new value lands, and the editor sees the value
/// before it is stored.
pub fn write_cell(
    sheet: &mut Sheet,
    x: usize,
    y: usize,
    value: CellValue,
    style_set: Option<&StyleSet>,
    is_header: bool,
    editor: Option<&dyn CellEditor>,
) -> Result<()> {
    let cell = sheet.get_or_create_cell(x, y)?;
    if let Some(styles) = style_set {
        cell.set_style(Some(styles.for_value(&value, is_header)));
    }
    if !cell.is_blank() {
        cell.set_blank();
    }
    let value = match editor {
        Some(editor) => editor.edit(Some(&*cell), value),
        None => value,
    };
    cell.set_value(value);
    Ok(())
}

/// Write values into row `y`, starting at column 0
pub fn write_row<I, V>(
    sheet: &mut Sheet,
    y: usize,
    values: I,
    style_set: Option<&StyleSet>,
    is_header: bool,
    editor: Option<&dyn CellEditor>,
) -> Result<()>
where
    I: IntoIterator<Item = V>,
    V: Into<CellValue>,
{
    sheet.get_or_create_row(y)?;
    for (x, value) in values.into_iter().enumerate() {
        write_cell(sheet, x, y, value.into(), style_set, is_header, editor)?;
    }
    Ok(())
}

/// Values of row `y` from column 0 to its last populated column.
///
/// An absent row, or one whose values are all empty, yields an empty vector.
pub fn read_row(sheet: &Sheet, y: usize, editor: Option<&dyn CellEditor>) -> Vec<CellValue> {
    let Some(row) = sheet.row(y) else {
        return Vec::new();
    };
    let values: Vec<CellValue> = (0..row.last_cell_num())
        .map(|x| cell_value(sheet, x, y, editor))
        .collect();
    if values.iter().all(CellValue::is_empty) {
        return Vec::new();
    }
    values
}
