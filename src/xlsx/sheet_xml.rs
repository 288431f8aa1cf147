//! `<row>`/`<c>` serialization shared by the package writer and row spilling

use std::io::Write;

use super::shared_strings::SharedStrings;
use super::xml_writer::XmlWriter;
use crate::book::cell::{CellKind, FormulaResult};
use crate::book::{Cell, Row, StyleTable};
use crate::error::Result;
use crate::types::index_to_col_name;

/// Where string cell content goes
pub(crate) enum StringSink<'a> {
    /// `t="s"` with an index into the shared strings part
    Shared(&'a mut SharedStrings),
    /// `t="inlineStr"`, used for spilled rows written before the table exists
    Inline,
}

/// Serializes rows, caching column letters between calls
pub(crate) struct RowSerializer {
    col_names: Vec<String>,
    row_buf: itoa::Buffer,
}

impl RowSerializer {
    pub fn new() -> Self {
        RowSerializer {
            col_names: Vec::with_capacity(64),
            row_buf: itoa::Buffer::new(),
        }
    }

    fn cell_ref(&mut self, x: usize, y: usize) -> String {
        while self.col_names.len() <= x {
            self.col_names.push(index_to_col_name(self.col_names.len()));
        }
        let mut r = String::with_capacity(8);
        r.push_str(&self.col_names[x]);
        r.push_str(self.row_buf.format(y + 1));
        r
    }

    pub fn write_row<W: Write>(
        &mut self,
        xml: &mut XmlWriter<W>,
        y: usize,
        row: &Row,
        styles: &StyleTable,
        strings: &mut StringSink<'_>,
    ) -> Result<()> {
        let has_content = row
            .cells()
            .any(|(_, c)| !c.is_blank() || c.style().is_some());
        if !has_content && row.height().is_none() {
            return Ok(());
        }
        xml.start_element("row")?;
        xml.attribute_int("r", y + 1)?;
        if let Some(height) = row.height() {
            xml.attribute_f64("ht", height)?;
            xml.attribute("customHeight", "1")?;
        }
        xml.close_start_tag()?;
        for (x, cell) in row.cells() {
            self.write_cell(xml, x, y, cell, styles, strings)?;
        }
        xml.end_element("row")
    }

    fn write_cell<W: Write>(
        &mut self,
        xml: &mut XmlWriter<W>,
        x: usize,
        y: usize,
        cell: &Cell,
        styles: &StyleTable,
        strings: &mut StringSink<'_>,
    ) -> Result<()> {
        let style = cell.style().map(|s| styles.index_of(s));
        if cell.is_blank() && style.is_none() {
            return Ok(());
        }

        let reference = self.cell_ref(x, y);
        xml.start_element("c")?;
        xml.attribute("r", &reference)?;
        if let Some(idx) = style {
            xml.attribute_int("s", idx as usize)?;
        }

        match cell.kind() {
            CellKind::Blank => xml.close_empty_tag()?,
            CellKind::Numeric(n) => {
                if n.is_finite() {
                    xml.close_start_tag()?;
                    xml.text_element("v", &n.to_string())?;
                } else {
                    xml.attribute("t", "e")?;
                    xml.close_start_tag()?;
                    xml.text_element("v", "#NUM!")?;
                }
                xml.end_element("c")?;
            }
            CellKind::Text(s) => {
                match strings {
                    StringSink::Shared(table) => {
                        let idx = table.add_string(s);
                        xml.attribute("t", "s")?;
                        xml.close_start_tag()?;
                        xml.text_element("v", itoa::Buffer::new().format(idx))?;
                    }
                    StringSink::Inline => {
                        xml.attribute("t", "inlineStr")?;
                        xml.close_start_tag()?;
                        xml.write_str("<is>")?;
                        xml.text_element("t", s)?;
                        xml.write_str("</is>")?;
                    }
                }
                xml.end_element("c")?;
            }
            CellKind::Bool(b) => {
                xml.attribute("t", "b")?;
                xml.close_start_tag()?;
                xml.text_element("v", if *b { "1" } else { "0" })?;
                xml.end_element("c")?;
            }
            CellKind::Error(code) => {
                xml.attribute("t", "e")?;
                xml.close_start_tag()?;
                xml.text_element("v", code.as_str())?;
                xml.end_element("c")?;
            }
            CellKind::Formula { expr, cached } => {
                let (t, value) = match cached {
                    FormulaResult::None => (None, None),
                    FormulaResult::Numeric(n) => (None, Some(n.to_string())),
                    FormulaResult::Text(s) => (Some("str"), Some(s.clone())),
                    FormulaResult::Bool(b) => (Some("b"), Some(if *b { "1" } else { "0" }.to_string())),
                    FormulaResult::Error(e) => (Some("e"), Some(e.as_str().to_string())),
                };
                if let Some(t) = t {
                    xml.attribute("t", t)?;
                }
                xml.close_start_tag()?;
                xml.text_element("f", expr)?;
                if let Some(value) = value {
                    xml.text_element("v", &value)?;
                }
                xml.end_element("c")?;
            }
        }
        Ok(())
    }
}
