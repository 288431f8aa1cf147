//! Load an xlsx package into an in-memory [`Workbook`]

use std::collections::HashMap;
use std::io::{BufRead, Read, Seek};

use chrono::{NaiveDate, NaiveDateTime};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::parts::{
    attr, cell_column, open_archive, part_reader, read_relationships, read_shared_strings,
    read_sheet_entries, read_styles, rels_path, shared_strings_path, styles_path, Relationship,
    RichText,
};
use crate::book::{
    BookFormat, CellKind, CellRange, ErrorCode, FormulaResult, Sheet, StyleHandle, Workbook,
};
use crate::error::{ExcelError, Result};
use crate::types::{datetime_to_excel_serial, Hyperlink, HyperlinkKind};

/// Read every sheet of an xlsx package with its styles, merged regions,
/// hyperlinks and layout
pub(crate) fn load<R: Read + Seek>(reader: R) -> Result<Workbook> {
    let mut archive = open_archive(reader)?;
    let entries = read_sheet_entries(&mut archive)?;
    let sst_path = shared_strings_path(&mut archive)?;
    let strings = read_shared_strings(&mut archive, &sst_path)?;
    let styles_part = styles_path(&mut archive)?;
    let styles = read_styles(&mut archive, &styles_part)?;

    let mut book = Workbook::with_format(BookFormat::Xlsx);
    // xf 0 is the default look and stays unstyled
    let handles: Vec<Option<StyleHandle>> = (0..styles.xfs.len())
        .map(|i| (i > 0).then(|| StyleHandle::new(styles.cell_style(i))))
        .collect();
    for handle in handles.iter().flatten() {
        book.styles().index_of(handle);
    }

    for entry in &entries {
        let index = book.create_sheet(&entry.name)?;
        let rels = read_relationships(&mut archive, &rels_path(&entry.path))?;
        let Some(sheet) = book.sheet_mut(index) else {
            continue;
        };
        match part_reader(&mut archive, &entry.path)? {
            Some(reader) => {
                let ctx = SheetContext {
                    part: &entry.path,
                    strings: &strings,
                    styles: &handles,
                    rels: &rels,
                };
                parse_sheet(reader, sheet, &ctx)?;
            }
            None => log::warn!("sheet '{}' has no part at {}", entry.name, entry.path),
        }
    }
    log::debug!("loaded {} sheets", book.sheet_count());
    Ok(book)
}

pub(crate) struct SheetContext<'a> {
    pub part: &'a str,
    pub strings: &'a [String],
    pub styles: &'a [Option<StyleHandle>],
    pub rels: &'a HashMap<String, Relationship>,
}

#[derive(Clone, Copy, PartialEq)]
enum Capture {
    None,
    Value,
    Formula,
    ValidationList,
}

#[derive(Default)]
struct PendingCell {
    x: usize,
    y: usize,
    style: Option<usize>,
    cell_type: Option<String>,
    value: String,
    formula: Option<String>,
    inline: RichText,
}

struct PendingLink {
    reference: String,
    rel_id: Option<String>,
    location: Option<String>,
    display: Option<String>,
}

/// `<col>` ranges this wide are whole-sheet defaults, not sized columns
const MAX_COL_RANGE: usize = 256;

pub(crate) fn parse_sheet<B: BufRead>(
    mut reader: Reader<B>,
    sheet: &mut Sheet,
    ctx: &SheetContext<'_>,
) -> Result<()> {
    let mut next_row = 0usize;
    let mut next_col = 0usize;
    let mut cell: Option<PendingCell> = None;
    let mut capture = Capture::None;
    let mut in_inline = false;
    let mut validation: Option<(String, String)> = None;
    let mut links = Vec::new();
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| ExcelError::xml(ctx.part, e))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let empty = matches!(event, Event::Empty(_));
                match e.local_name().as_ref() {
                    b"sheetFormatPr" => {
                        if let Some(w) = attr_f64(e, b"defaultColWidth") {
                            sheet.set_default_column_width(w);
                        }
                        if let Some(h) = attr_f64(e, b"defaultRowHeight") {
                            sheet.set_default_row_height(h);
                        }
                    }
                    b"pane" => {
                        if matches!(attr(e, b"state").as_deref(), Some("frozen" | "frozenSplit")) {
                            let cols = attr_f64(e, b"xSplit").unwrap_or(0.0) as usize;
                            let rows = attr_f64(e, b"ySplit").unwrap_or(0.0) as usize;
                            sheet.set_freeze_pane(cols, rows);
                        }
                    }
                    b"col" => {
                        let min = attr_usize(e, b"min").unwrap_or(1).max(1);
                        let max = attr_usize(e, b"max").unwrap_or(min).max(min);
                        if let Some(width) = attr_f64(e, b"width") {
                            if max - min < MAX_COL_RANGE {
                                for col in min..=max {
                                    sheet.set_column_width(col - 1, width);
                                }
                            }
                        }
                    }
                    b"row" => {
                        let y = attr_usize(e, b"r")
                            .and_then(|r| r.checked_sub(1))
                            .unwrap_or(next_row);
                        next_row = y + 1;
                        next_col = 0;
                        if attr(e, b"customHeight").is_some_and(|v| v == "1" || v == "true") {
                            if let Some(height) = attr_f64(e, b"ht") {
                                sheet.set_row_height(y, height)?;
                            }
                        }
                    }
                    b"c" => {
                        let y = next_row.saturating_sub(1);
                        match cell_column(e, next_col) {
                            Some(x) => {
                                next_col = x + 1;
                                let pending = PendingCell {
                                    x,
                                    y,
                                    style: attr_usize(e, b"s"),
                                    cell_type: attr(e, b"t"),
                                    ..PendingCell::default()
                                };
                                if empty {
                                    store_cell(sheet, pending, ctx)?;
                                } else {
                                    cell = Some(pending);
                                }
                            }
                            None => log::warn!(
                                "{}: skipping cell {:?} in row {}: bad column",
                                ctx.part,
                                attr(e, b"r").unwrap_or_default(),
                                y + 1
                            ),
                        }
                    }
                    b"v" if !empty => capture = Capture::Value,
                    b"f" if !empty => {
                        if let Some(c) = cell.as_mut() {
                            c.formula.get_or_insert_with(String::new);
                        }
                        capture = Capture::Formula;
                    }
                    b"is" if !empty => in_inline = true,
                    b"mergeCell" => match attr(e, b"ref").map(|r| CellRange::parse(&r)) {
                        Some(Ok(region)) => {
                            if let Err(err) = sheet.add_merged_region(region) {
                                log::warn!("{}: skipping merged region: {}", ctx.part, err);
                            }
                        }
                        Some(Err(err)) => log::warn!("{}: bad merged region: {}", ctx.part, err),
                        None => {}
                    },
                    b"hyperlink" => {
                        if let Some(reference) = attr(e, b"ref") {
                            links.push(PendingLink {
                                reference,
                                rel_id: attr(e, b"id"),
                                location: attr(e, b"location"),
                                display: attr(e, b"display"),
                            });
                        }
                    }
                    b"dataValidation" if !empty => {
                        if attr(e, b"type").as_deref() == Some("list") {
                            validation = attr(e, b"sqref").map(|r| (r, String::new()));
                        }
                    }
                    b"formula1" if !empty && validation.is_some() => {
                        capture = Capture::ValidationList
                    }
                    local if in_inline => {
                        if let Some(c) = cell.as_mut() {
                            c.inline.start(local);
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(ref t) => {
                let text = t.unescape().map_err(|e| ExcelError::xml(ctx.part, e))?;
                push_text(&mut cell, &mut validation, capture, in_inline, &text);
            }
            Event::CData(ref t) => {
                let text = String::from_utf8_lossy(t);
                push_text(&mut cell, &mut validation, capture, in_inline, &text);
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"v" | b"f" | b"formula1" => capture = Capture::None,
                b"is" => in_inline = false,
                b"c" => {
                    if let Some(pending) = cell.take() {
                        store_cell(sheet, pending, ctx)?;
                    }
                }
                b"dataValidation" => {
                    if let Some((sqref, list)) = validation.take() {
                        add_validation(sheet, &sqref, &list, ctx.part);
                    }
                }
                local if in_inline => {
                    if let Some(c) = cell.as_mut() {
                        c.inline.end(local);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    for link in links {
        apply_link(sheet, link, ctx)?;
    }
    Ok(())
}

fn attr_usize(e: &BytesStart<'_>, name: &[u8]) -> Option<usize> {
    attr(e, name).and_then(|v| v.trim().parse().ok())
}

fn attr_f64(e: &BytesStart<'_>, name: &[u8]) -> Option<f64> {
    attr(e, name).and_then(|v| v.trim().parse().ok())
}

fn push_text(
    cell: &mut Option<PendingCell>,
    validation: &mut Option<(String, String)>,
    capture: Capture,
    in_inline: bool,
    text: &str,
) {
    match capture {
        Capture::Value => {
            if let Some(c) = cell.as_mut() {
                c.value.push_str(text);
            }
        }
        Capture::Formula => {
            if let Some(f) = cell.as_mut().and_then(|c| c.formula.as_mut()) {
                f.push_str(text);
            }
        }
        Capture::ValidationList => {
            if let Some((_, list)) = validation.as_mut() {
                list.push_str(text);
            }
        }
        Capture::None if in_inline => {
            if let Some(c) = cell.as_mut() {
                c.inline.text(text);
            }
        }
        Capture::None => {}
    }
}

fn store_cell(sheet: &mut Sheet, mut pending: PendingCell, ctx: &SheetContext<'_>) -> Result<()> {
    let inline = pending.inline.take();
    let kind = cell_kind(
        pending.cell_type.as_deref(),
        pending.value,
        pending.formula,
        inline,
        ctx.strings,
    );
    let style = pending
        .style
        .and_then(|s| ctx.styles.get(s).cloned().flatten());
    if matches!(kind, CellKind::Blank) && style.is_none() {
        return Ok(());
    }
    let cell = sheet.get_or_create_cell(pending.x, pending.y)?;
    cell.set_kind(kind);
    cell.set_style(style);
    Ok(())
}

/// Raw cell content from the `t` attribute, `<v>`, `<f>` and inline text
pub(crate) fn cell_kind(
    cell_type: Option<&str>,
    value: String,
    formula: Option<String>,
    inline: String,
    strings: &[String],
) -> CellKind {
    let plain = match cell_type {
        Some("s") => match value.trim().parse::<usize>().ok().and_then(|i| strings.get(i)) {
            Some(s) => CellKind::Text(s.clone()),
            None if value.trim().is_empty() => CellKind::Blank,
            None => {
                log::warn!("shared string index {} out of range", value.trim());
                CellKind::Text(String::new())
            }
        },
        Some("inlineStr") => CellKind::Text(inline),
        Some("str") => CellKind::Text(value),
        Some("b") => CellKind::Bool(matches!(value.trim(), "1" | "true" | "TRUE")),
        Some("e") => match ErrorCode::parse(&value) {
            Some(code) => CellKind::Error(code),
            None => CellKind::Text(value),
        },
        Some("d") => match parse_iso_datetime(&value) {
            Some(dt) => CellKind::Numeric(datetime_to_excel_serial(&dt)),
            None => CellKind::Text(value),
        },
        _ if value.trim().is_empty() => CellKind::Blank,
        _ => match value.trim().parse::<f64>() {
            Ok(n) => CellKind::Numeric(n),
            Err(_) => CellKind::Text(value),
        },
    };
    match formula.filter(|f| !f.is_empty()) {
        Some(expr) => CellKind::Formula {
            expr,
            cached: match plain {
                CellKind::Numeric(n) => FormulaResult::Numeric(n),
                CellKind::Text(s) => FormulaResult::Text(s),
                CellKind::Bool(b) => FormulaResult::Bool(b),
                CellKind::Error(e) => FormulaResult::Error(e),
                CellKind::Blank | CellKind::Formula { .. } => FormulaResult::None,
            },
        },
        None => plain,
    }
}

fn parse_iso_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn add_validation(sheet: &mut Sheet, sqref: &str, list: &str, part: &str) {
    let list = list.trim();
    let Some(quoted) = list.strip_prefix('"').and_then(|l| l.strip_suffix('"')) else {
        // range-backed lists are not kept
        return;
    };
    let values = quoted.split(',').map(str::to_string).collect();
    match sqref.split_whitespace().next().map(CellRange::parse) {
        Some(Ok(range)) => sheet.add_list_validation(range, values),
        Some(Err(err)) => log::warn!("{}: bad validation range: {}", part, err),
        None => {}
    }
}

fn apply_link(sheet: &mut Sheet, link: PendingLink, ctx: &SheetContext<'_>) -> Result<()> {
    let range = match CellRange::parse(&link.reference) {
        Ok(range) => range,
        Err(err) => {
            log::warn!("{}: bad hyperlink reference: {}", ctx.part, err);
            return Ok(());
        }
    };
    let external = link
        .rel_id
        .as_ref()
        .and_then(|id| ctx.rels.get(id))
        .map(|rel| rel.target.clone());
    let mut hyperlink = match (external, link.location) {
        (Some(target), _) => {
            let kind = if target.starts_with("mailto:") {
                HyperlinkKind::Email
            } else if target.starts_with("file:") {
                HyperlinkKind::File
            } else {
                HyperlinkKind::Url
            };
            Hyperlink {
                kind,
                address: target,
                label: None,
            }
        }
        (None, Some(location)) => Hyperlink::document(location),
        (None, None) => return Ok(()),
    };
    if let Some(display) = link.display {
        hyperlink = hyperlink.with_label(display);
    }
    let anchor = range.anchor();
    sheet
        .get_or_create_cell(anchor.x, anchor.y)?
        .set_hyperlink(Some(hyperlink));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::Workbook;
    use crate::coerce::cell_value;
    use crate::types::CellValue;

    fn parse(xml: &str, strings: &[String]) -> Workbook {
        let mut book = Workbook::new();
        let idx = book.create_sheet("Sheet1").unwrap();
        let rels = HashMap::from([(
            "rId1".to_string(),
            Relationship {
                rel_type: "hyperlink".to_string(),
                target: "https://example.com".to_string(),
                external: true,
            },
        )]);
        let date_style = StyleHandle::new(crate::book::CellStyle::default().with_number_format(
            crate::book::NumberFormat::BuiltIn(crate::book::NumberFormat::ID_DATE_SHORT),
        ));
        let styles = vec![None, Some(date_style)];
        let ctx = SheetContext {
            part: "xl/worksheets/sheet1.xml",
            strings,
            styles: &styles,
            rels: &rels,
        };
        let mut reader = Reader::from_reader(xml.as_bytes());
        reader.config_mut().trim_text(false);
        parse_sheet(reader, book.sheet_mut(idx).unwrap(), &ctx).unwrap();
        book
    }

    #[test]
    fn test_parse_cells() {
        let strings = vec!["name".to_string(), "age".to_string()];
        let book = parse(
            r#"<worksheet><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
<row r="3"><c r="A3" t="inlineStr"><is><t xml:space="preserve"> Ann </t></is></c><c r="B3"><v>30</v></c>
<c r="C3" s="1"><v>45366</v></c><c r="D3" t="b"><v>1</v></c><c r="E3" t="e"><v>#N/A</v></c>
<c r="F3"><f>B3*2</f><v>60</v></c><c r="G3" t="str"><f>A3&amp;"!"</f><v> Ann !</v></c></row>
</sheetData></worksheet>"#,
            &strings,
        );
        let sheet = book.sheet(0).unwrap();

        assert_eq!(cell_value(sheet, 0, 0, None), CellValue::from("name"));
        assert!(sheet.row(1).is_none());
        assert_eq!(cell_value(sheet, 0, 2, None), CellValue::from(" Ann "));
        assert_eq!(cell_value(sheet, 1, 2, None), CellValue::Int(30));
        assert!(matches!(cell_value(sheet, 2, 2, None), CellValue::Date(_)));
        assert_eq!(cell_value(sheet, 3, 2, None), CellValue::Bool(true));
        assert_eq!(cell_value(sheet, 4, 2, None), CellValue::Error("#N/A".into()));
        assert_eq!(sheet.cell(5, 2).unwrap().formula(), Some("B3*2"));
        assert_eq!(cell_value(sheet, 5, 2, None), CellValue::Int(60));
        assert_eq!(sheet.cell(6, 2).unwrap().formula(), Some("A3&\"!\""));
        assert_eq!(cell_value(sheet, 6, 2, None), CellValue::from(" Ann !"));
    }

    #[test]
    fn test_parse_skips_columns_past_xfd() {
        let book = parse(
            r#"<worksheet><sheetData>
<row r="1"><c r="ZZZZZZZZZZ1"><v>1</v></c><c r="XFE1"><v>2</v></c><c r="A1"><v>3</v></c></row>
<row r="2"><c r="XFD2"><v>4</v></c><c r="9Z"><v>5</v></c></row>
</sheetData></worksheet>"#,
            &[],
        );
        let sheet = book.sheet(0).unwrap();

        assert_eq!(sheet.row(0).unwrap().last_cell_num(), 1);
        assert_eq!(cell_value(sheet, 0, 0, None), CellValue::Int(3));
        assert_eq!(sheet.row(1).unwrap().last_cell_num(), 16_384);
        assert_eq!(cell_value(sheet, 16_383, 1, None), CellValue::Int(4));
    }

    #[test]
    fn test_parse_layout_and_links() {
        let book = parse(
            r#"<worksheet>
<sheetViews><sheetView workbookViewId="0"><pane xSplit="1" ySplit="2" topLeftCell="B3" state="frozen"/></sheetView></sheetViews>
<sheetFormatPr defaultRowHeight="15"/>
<cols><col min="2" max="3" width="20.5" customWidth="1"/><col min="4" max="16384" width="9"/></cols>
<sheetData><row r="1" ht="30" customHeight="1"><c r="A1"><v>1</v></c></row>
<row r="2"><c r="B2" t="inlineStr"><is><t>site</t></is></c></row></sheetData>
<mergeCells count="1"><mergeCell ref="A1:C1"/></mergeCells>
<dataValidations count="1"><dataValidation type="list" sqref="D2:D9"><formula1>"yes,no"</formula1></dataValidation></dataValidations>
<hyperlinks><hyperlink ref="B2" r:id="rId1"/><hyperlink ref="A5" location="Sheet2!A1" display="jump"/></hyperlinks>
</worksheet>"#,
            &[],
        );
        let sheet = book.sheet(0).unwrap();

        assert_eq!(sheet.freeze_pane().map(|p| (p.cols, p.rows)), Some((1, 2)));
        assert_eq!(sheet.column_width(1), Some(20.5));
        assert_eq!(sheet.column_width(2), Some(20.5));
        assert_eq!(sheet.column_width(5), None);
        assert_eq!(sheet.row(0).unwrap().height(), Some(30.0));
        assert_eq!(sheet.merged_regions(), &[CellRange::new(0, 0, 0, 2)]);
        assert_eq!(sheet.validations()[0].values, vec!["yes", "no"]);
        assert_eq!(
            sheet.cell(1, 1).unwrap().hyperlink().map(|h| h.address.as_str()),
            Some("https://example.com")
        );
        let doc = sheet.cell(0, 4).unwrap().hyperlink().unwrap();
        assert_eq!(doc.kind, HyperlinkKind::Document);
        assert_eq!(doc.text(), "jump");
    }
}
