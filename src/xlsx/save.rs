//! Write a [`Workbook`] as an xlsx package

use std::io::{Seek, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::shared_strings::SharedStrings;
use super::sheet_xml::{RowSerializer, StringSink};
use super::xml_writer::XmlWriter;
use crate::book::{
    Border, BorderStyle, Color, Font, HorizontalAlign, NumberFormat, Sheet, StyleTable,
    VerticalAlign, Workbook,
};
use crate::error::Result;
use crate::types::{CellLocation, Hyperlink, HyperlinkKind};

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PACKAGE_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const HYPERLINK_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";

/// First id available to custom number formats
const FIRST_CUSTOM_NUM_FMT: u32 = 164;

pub(crate) fn save<W: Write + Seek>(book: &mut Workbook, out: W) -> Result<()> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(out);
    let mut strings = SharedStrings::new();
    let styles = book.styles().clone();
    let names = book.sheet_names();

    for (i, sheet) in book.sheets_mut().iter_mut().enumerate() {
        let sheet_id = i + 1;
        zip.start_file(format!("xl/worksheets/sheet{}.xml", sheet_id), options)?;
        let external = write_sheet(&mut zip, sheet, i == 0, &styles, &mut strings)?;
        if !external.is_empty() {
            zip.start_file(
                format!("xl/worksheets/_rels/sheet{}.xml.rels", sheet_id),
                options,
            )?;
            write_sheet_rels(&mut zip, &external)?;
        }
    }

    // after the sheets: serializing cells registers their styles
    zip.start_file("xl/styles.xml", options)?;
    write_styles(&mut zip, &styles)?;

    zip.start_file("xl/sharedStrings.xml", options)?;
    strings.write_xml(&mut XmlWriter::new(&mut zip))?;

    zip.start_file("xl/workbook.xml", options)?;
    write_workbook_xml(&mut zip, &names)?;

    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    write_workbook_rels(&mut zip, names.len())?;

    zip.start_file("[Content_Types].xml", options)?;
    write_content_types(&mut zip, names.len())?;

    zip.start_file("_rels/.rels", options)?;
    zip.write_all(ROOT_RELS.as_bytes())?;

    zip.start_file("docProps/core.xml", options)?;
    write_core_props(&mut zip)?;

    zip.start_file("docProps/app.xml", options)?;
    zip.write_all(APP_PROPS.as_bytes())?;

    let mut out = zip.finish()?;
    out.flush()?;
    log::debug!(
        "wrote {} sheets, {} styles, {} shared strings",
        names.len(),
        styles.len(),
        strings.unique_count()
    );
    Ok(())
}

/// Write one worksheet part; returns the external hyperlink targets by
/// relationship id
fn write_sheet<W: Write>(
    out: &mut W,
    sheet: &mut Sheet,
    selected: bool,
    styles: &StyleTable,
    strings: &mut SharedStrings,
) -> Result<Vec<(String, String)>> {
    let mut xml = XmlWriter::new(&mut *out);
    xml.declaration()?;
    xml.start_element("worksheet")?;
    xml.attribute("xmlns", MAIN_NS)?;
    xml.attribute("xmlns:r", REL_NS)?;
    xml.close_start_tag()?;

    xml.start_element("dimension")?;
    xml.attribute("ref", &dimension(sheet))?;
    xml.close_empty_tag()?;

    xml.start_element("sheetViews")?;
    xml.close_start_tag()?;
    xml.start_element("sheetView")?;
    if selected {
        xml.attribute("tabSelected", "1")?;
    }
    xml.attribute("workbookViewId", "0")?;
    match sheet.freeze_pane() {
        Some(pane) => {
            xml.close_start_tag()?;
            xml.start_element("pane")?;
            if pane.cols > 0 {
                xml.attribute_int("xSplit", pane.cols)?;
            }
            if pane.rows > 0 {
                xml.attribute_int("ySplit", pane.rows)?;
            }
            xml.attribute(
                "topLeftCell",
                &CellLocation::new(pane.cols, pane.rows).reference(),
            )?;
            let active = match (pane.cols > 0, pane.rows > 0) {
                (true, true) => "bottomRight",
                (false, true) => "bottomLeft",
                _ => "topRight",
            };
            xml.attribute("activePane", active)?;
            xml.attribute("state", "frozen")?;
            xml.close_empty_tag()?;
            xml.end_element("sheetView")?;
        }
        None => xml.close_empty_tag()?,
    }
    xml.end_element("sheetViews")?;

    xml.start_element("sheetFormatPr")?;
    if let Some(width) = sheet.default_column_width() {
        xml.attribute_f64("defaultColWidth", width)?;
    }
    match sheet.default_row_height() {
        Some(height) => {
            xml.attribute_f64("defaultRowHeight", height)?;
            xml.attribute("customHeight", "1")?;
        }
        None => xml.attribute("defaultRowHeight", "15")?,
    }
    xml.close_empty_tag()?;

    let widths: Vec<(usize, f64)> = sheet.column_widths().collect();
    if !widths.is_empty() {
        xml.start_element("cols")?;
        xml.close_start_tag()?;
        for (col, width) in widths {
            xml.start_element("col")?;
            xml.attribute_int("min", col + 1)?;
            xml.attribute_int("max", col + 1)?;
            xml.attribute_f64("width", width)?;
            xml.attribute("customWidth", "1")?;
            xml.close_empty_tag()?;
        }
        xml.end_element("cols")?;
    }

    xml.start_element("sheetData")?;
    xml.close_start_tag()?;
    xml.finish()?;

    // spilled rows are already serialized and come first
    sheet.copy_spilled_rows(out)?;

    let mut xml = XmlWriter::new(&mut *out);
    let mut serializer = RowSerializer::new();
    let mut sink = StringSink::Shared(strings);
    for (y, row) in sheet.rows() {
        serializer.write_row(&mut xml, y, row, styles, &mut sink)?;
    }
    xml.end_element("sheetData")?;

    let merged = sheet.merged_regions();
    if !merged.is_empty() {
        xml.start_element("mergeCells")?;
        xml.attribute_int("count", merged.len())?;
        xml.close_start_tag()?;
        for region in merged {
            xml.start_element("mergeCell")?;
            xml.attribute("ref", &region.reference())?;
            xml.close_empty_tag()?;
        }
        xml.end_element("mergeCells")?;
    }

    let validations = sheet.validations();
    if !validations.is_empty() {
        xml.start_element("dataValidations")?;
        xml.attribute_int("count", validations.len())?;
        xml.close_start_tag()?;
        for validation in validations {
            xml.start_element("dataValidation")?;
            xml.attribute("type", "list")?;
            xml.attribute("allowBlank", "1")?;
            xml.attribute("showErrorMessage", "1")?;
            xml.attribute("sqref", &validation.range.reference())?;
            xml.close_start_tag()?;
            xml.text_element("formula1", &format!("\"{}\"", validation.values.join(",")))?;
            xml.end_element("dataValidation")?;
        }
        xml.end_element("dataValidations")?;
    }

    let mut links: Vec<(CellLocation, Hyperlink)> = sheet.spilled_links().to_vec();
    for (y, row) in sheet.rows() {
        for (x, cell) in row.cells() {
            if let Some(link) = cell.hyperlink() {
                links.push((CellLocation::new(x, y), link.clone()));
            }
        }
    }
    let mut external = Vec::new();
    if !links.is_empty() {
        xml.start_element("hyperlinks")?;
        xml.close_start_tag()?;
        for (location, link) in &links {
            xml.start_element("hyperlink")?;
            xml.attribute("ref", &location.reference())?;
            if link.kind == HyperlinkKind::Document {
                xml.attribute("location", &link.address)?;
            } else {
                let id = format!("rId{}", external.len() + 1);
                xml.attribute("r:id", &id)?;
                external.push((id, link.target()));
            }
            if let Some(label) = &link.label {
                xml.attribute("display", label)?;
            }
            xml.close_empty_tag()?;
        }
        xml.end_element("hyperlinks")?;
    }

    xml.end_element("worksheet")?;
    xml.finish()?;
    Ok(external)
}

fn dimension(sheet: &Sheet) -> String {
    match (sheet.first_row_num(), sheet.last_row_num()) {
        (Some(first), Some(last)) => {
            let start = CellLocation::new(0, first).reference();
            let end = CellLocation::new(sheet.column_span().saturating_sub(1), last).reference();
            if start == end {
                start
            } else {
                format!("{}:{}", start, end)
            }
        }
        _ => "A1".to_string(),
    }
}

fn write_sheet_rels<W: Write>(out: &mut W, links: &[(String, String)]) -> Result<()> {
    let mut xml = XmlWriter::new(out);
    xml.declaration()?;
    xml.start_element("Relationships")?;
    xml.attribute("xmlns", PACKAGE_REL_NS)?;
    xml.close_start_tag()?;
    for (id, target) in links {
        xml.start_element("Relationship")?;
        xml.attribute("Id", id)?;
        xml.attribute("Type", HYPERLINK_REL_TYPE)?;
        xml.attribute("Target", target)?;
        xml.attribute("TargetMode", "External")?;
        xml.close_empty_tag()?;
    }
    xml.end_element("Relationships")?;
    xml.finish()
}

/// Deduplicated style components, indexed as they will be written
struct StyleParts {
    num_fmts: Vec<(u32, String)>,
    fonts: Vec<Font>,
    fills: Vec<Color>,
    borders: Vec<Border>,
}

impl StyleParts {
    fn new() -> Self {
        StyleParts {
            num_fmts: Vec::new(),
            fonts: vec![Font::default()],
            fills: Vec::new(),
            borders: vec![Border::default()],
        }
    }

    fn num_fmt_id(&mut self, format: &NumberFormat) -> u32 {
        match format {
            NumberFormat::General => 0,
            NumberFormat::BuiltIn(id) => *id,
            NumberFormat::Custom(code) => {
                if let Some((id, _)) = self.num_fmts.iter().find(|(_, c)| c == code) {
                    return *id;
                }
                let id = FIRST_CUSTOM_NUM_FMT + self.num_fmts.len() as u32;
                self.num_fmts.push((id, code.clone()));
                id
            }
        }
    }

    fn font_id(&mut self, font: &Font) -> usize {
        match self.fonts.iter().position(|f| f == font) {
            Some(i) => i,
            None => {
                self.fonts.push(font.clone());
                self.fonts.len() - 1
            }
        }
    }

    /// Fills 0 and 1 are the reserved `none` and `gray125` patterns
    fn fill_id(&mut self, fill: Option<Color>) -> usize {
        let Some(color) = fill else {
            return 0;
        };
        match self.fills.iter().position(|c| *c == color) {
            Some(i) => i + 2,
            None => {
                self.fills.push(color);
                self.fills.len() + 1
            }
        }
    }

    fn border_id(&mut self, border: &Border) -> usize {
        match self.borders.iter().position(|b| b == border) {
            Some(i) => i,
            None => {
                self.borders.push(*border);
                self.borders.len() - 1
            }
        }
    }
}

struct XfRecord {
    num_fmt: u32,
    font: usize,
    fill: usize,
    border: usize,
    horizontal: HorizontalAlign,
    vertical: VerticalAlign,
    wrap_text: bool,
}

fn write_styles<W: Write>(out: &mut W, styles: &StyleTable) -> Result<()> {
    let mut parts = StyleParts::new();
    let xfs: Vec<XfRecord> = styles
        .handles()
        .iter()
        .map(|handle| {
            handle.with(|s| XfRecord {
                num_fmt: parts.num_fmt_id(&s.number_format),
                font: parts.font_id(&s.font),
                fill: parts.fill_id(s.fill),
                border: parts.border_id(&s.border),
                horizontal: s.horizontal,
                vertical: s.vertical,
                wrap_text: s.wrap_text,
            })
        })
        .collect();

    let mut xml = XmlWriter::new(out);
    xml.declaration()?;
    xml.start_element("styleSheet")?;
    xml.attribute("xmlns", MAIN_NS)?;
    xml.close_start_tag()?;

    if !parts.num_fmts.is_empty() {
        xml.start_element("numFmts")?;
        xml.attribute_int("count", parts.num_fmts.len())?;
        xml.close_start_tag()?;
        for (id, code) in &parts.num_fmts {
            xml.start_element("numFmt")?;
            xml.attribute_int("numFmtId", *id as usize)?;
            xml.attribute("formatCode", code)?;
            xml.close_empty_tag()?;
        }
        xml.end_element("numFmts")?;
    }

    xml.start_element("fonts")?;
    xml.attribute_int("count", parts.fonts.len())?;
    xml.close_start_tag()?;
    for font in &parts.fonts {
        write_font(&mut xml, font)?;
    }
    xml.end_element("fonts")?;

    xml.start_element("fills")?;
    xml.attribute_int("count", parts.fills.len() + 2)?;
    xml.close_start_tag()?;
    xml.write_str("<fill><patternFill patternType=\"none\"/></fill>")?;
    xml.write_str("<fill><patternFill patternType=\"gray125\"/></fill>")?;
    for color in &parts.fills {
        xml.write_str("<fill><patternFill patternType=\"solid\"><fgColor")?;
        xml.attribute("rgb", &color.to_hex())?;
        xml.write_str("/><bgColor indexed=\"64\"/></patternFill></fill>")?;
    }
    xml.end_element("fills")?;

    xml.start_element("borders")?;
    xml.attribute_int("count", parts.borders.len())?;
    xml.close_start_tag()?;
    for border in &parts.borders {
        write_border(&mut xml, border)?;
    }
    xml.end_element("borders")?;

    xml.write_str(
        "<cellStyleXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\"/></cellStyleXfs>",
    )?;

    xml.start_element("cellXfs")?;
    xml.attribute_int("count", xfs.len() + 1)?;
    xml.close_start_tag()?;
    xml.write_str("<xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\"/>")?;
    for xf in &xfs {
        write_xf(&mut xml, xf)?;
    }
    xml.end_element("cellXfs")?;

    xml.write_str(
        "<cellStyles count=\"1\"><cellStyle name=\"Normal\" xfId=\"0\" builtinId=\"0\"/></cellStyles>",
    )?;
    xml.end_element("styleSheet")?;
    xml.finish()
}

fn write_font<W: Write>(xml: &mut XmlWriter<W>, font: &Font) -> Result<()> {
    xml.write_str("<font>")?;
    if font.bold {
        xml.empty_element("b")?;
    }
    if font.italic {
        xml.empty_element("i")?;
    }
    if font.underline {
        xml.empty_element("u")?;
    }
    xml.start_element("sz")?;
    xml.attribute_f64("val", font.size)?;
    xml.close_empty_tag()?;
    if let Some(color) = font.color {
        xml.start_element("color")?;
        xml.attribute("rgb", &color.to_hex())?;
        xml.close_empty_tag()?;
    }
    xml.start_element("name")?;
    xml.attribute("val", &font.name)?;
    xml.close_empty_tag()?;
    xml.write_str("</font>")
}

fn write_border<W: Write>(xml: &mut XmlWriter<W>, border: &Border) -> Result<()> {
    xml.write_str("<border>")?;
    for (side, style) in [
        ("left", border.left),
        ("right", border.right),
        ("top", border.top),
        ("bottom", border.bottom),
    ] {
        match BorderStyle::as_str(style) {
            Some(name) => {
                xml.start_element(side)?;
                xml.attribute("style", name)?;
                match border.color {
                    Some(color) => {
                        xml.close_start_tag()?;
                        xml.start_element("color")?;
                        xml.attribute("rgb", &color.to_hex())?;
                        xml.close_empty_tag()?;
                        xml.end_element(side)?;
                    }
                    None => xml.close_empty_tag()?,
                }
            }
            None => xml.empty_element(side)?,
        }
    }
    xml.write_str("<diagonal/></border>")
}

fn write_xf<W: Write>(xml: &mut XmlWriter<W>, xf: &XfRecord) -> Result<()> {
    xml.start_element("xf")?;
    xml.attribute_int("numFmtId", xf.num_fmt as usize)?;
    xml.attribute_int("fontId", xf.font)?;
    xml.attribute_int("fillId", xf.fill)?;
    xml.attribute_int("borderId", xf.border)?;
    xml.attribute("xfId", "0")?;
    if xf.num_fmt != 0 {
        xml.attribute("applyNumberFormat", "1")?;
    }
    if xf.font != 0 {
        xml.attribute("applyFont", "1")?;
    }
    if xf.fill != 0 {
        xml.attribute("applyFill", "1")?;
    }
    if xf.border != 0 {
        xml.attribute("applyBorder", "1")?;
    }

    let horizontal = match xf.horizontal {
        HorizontalAlign::General => None,
        HorizontalAlign::Left => Some("left"),
        HorizontalAlign::Center => Some("center"),
        HorizontalAlign::Right => Some("right"),
    };
    let vertical = match xf.vertical {
        VerticalAlign::Bottom => None,
        VerticalAlign::Center => Some("center"),
        VerticalAlign::Top => Some("top"),
    };
    if horizontal.is_none() && vertical.is_none() && !xf.wrap_text {
        return xml.close_empty_tag();
    }

    xml.attribute("applyAlignment", "1")?;
    xml.close_start_tag()?;
    xml.start_element("alignment")?;
    if let Some(h) = horizontal {
        xml.attribute("horizontal", h)?;
    }
    if let Some(v) = vertical {
        xml.attribute("vertical", v)?;
    }
    if xf.wrap_text {
        xml.attribute("wrapText", "1")?;
    }
    xml.close_empty_tag()?;
    xml.end_element("xf")
}

fn write_workbook_xml<W: Write>(out: &mut W, names: &[String]) -> Result<()> {
    let mut xml = XmlWriter::new(out);
    xml.declaration()?;
    xml.start_element("workbook")?;
    xml.attribute("xmlns", MAIN_NS)?;
    xml.attribute("xmlns:r", REL_NS)?;
    xml.close_start_tag()?;
    xml.write_str("<bookViews><workbookView/></bookViews>")?;
    xml.start_element("sheets")?;
    xml.close_start_tag()?;
    for (i, name) in names.iter().enumerate() {
        xml.start_element("sheet")?;
        xml.attribute("name", name)?;
        xml.attribute_int("sheetId", i + 1)?;
        xml.attribute("r:id", &format!("rId{}", i + 1))?;
        xml.close_empty_tag()?;
    }
    xml.end_element("sheets")?;
    xml.end_element("workbook")?;
    xml.finish()
}

fn write_workbook_rels<W: Write>(out: &mut W, sheet_count: usize) -> Result<()> {
    let mut xml = XmlWriter::new(out);
    xml.declaration()?;
    xml.start_element("Relationships")?;
    xml.attribute("xmlns", PACKAGE_REL_NS)?;
    xml.close_start_tag()?;

    let mut targets: Vec<(&str, String)> = (1..=sheet_count)
        .map(|i| ("worksheet", format!("worksheets/sheet{}.xml", i)))
        .collect();
    targets.push(("styles", "styles.xml".to_string()));
    targets.push(("sharedStrings", "sharedStrings.xml".to_string()));

    for (i, (kind, target)) in targets.iter().enumerate() {
        xml.start_element("Relationship")?;
        xml.attribute("Id", &format!("rId{}", i + 1))?;
        xml.attribute("Type", &format!("{}/{}", REL_NS, kind))?;
        xml.attribute("Target", target)?;
        xml.close_empty_tag()?;
    }
    xml.end_element("Relationships")?;
    xml.finish()
}

fn write_content_types<W: Write>(out: &mut W, sheet_count: usize) -> Result<()> {
    let mut xml = XmlWriter::new(out);
    xml.declaration()?;
    xml.write_str(
        "<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>",
    )?;
    for i in 1..=sheet_count {
        xml.start_element("Override")?;
        xml.attribute("PartName", &format!("/xl/worksheets/sheet{}.xml", i))?;
        xml.attribute(
            "ContentType",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml",
        )?;
        xml.close_empty_tag()?;
    }
    xml.write_str(
        "<Override PartName=\"/xl/styles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml\"/>\
<Override PartName=\"/xl/sharedStrings.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml\"/>\
<Override PartName=\"/docProps/core.xml\" ContentType=\"application/vnd.openxmlformats-package.core-properties+xml\"/>\
<Override PartName=\"/docProps/app.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.extended-properties+xml\"/>\
</Types>",
    )?;
    xml.finish()
}

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/>
</Relationships>"#;

const APP_PROPS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties">
<Application>excelkit</Application>
<DocSecurity>0</DocSecurity>
<ScaleCrop>false</ScaleCrop>
<LinksUpToDate>false</LinksUpToDate>
<SharedDoc>false</SharedDoc>
<HyperlinksChanged>false</HyperlinksChanged>
<AppVersion>1.0</AppVersion>
</Properties>"#;

fn write_core_props<W: Write>(out: &mut W) -> Result<()> {
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let mut xml = XmlWriter::new(out);
    xml.declaration()?;
    xml.write_str(
        "<cp:coreProperties xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\" \
xmlns:dc=\"http://purl.org/dc/elements/1.1/\" xmlns:dcterms=\"http://purl.org/dc/terms/\" \
xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">",
    )?;
    xml.text_element("dc:creator", "excelkit")?;
    for element in ["dcterms:created", "dcterms:modified"] {
        xml.start_element(element)?;
        xml.attribute("xsi:type", "dcterms:W3CDTF")?;
        xml.close_start_tag()?;
        xml.write_str(&now)?;
        xml.end_element(element)?;
    }
    xml.write_str("</cp:coreProperties>")?;
    xml.finish()
}
