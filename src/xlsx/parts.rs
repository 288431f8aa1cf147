//! Readers for the shared package parts: workbook, relationships, shared
//! strings and styles

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Seek};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

use crate::book::style::builtin_format_code;
use crate::book::{
    Border, BorderStyle, CellStyle, Color, Font, HorizontalAlign, NumberFormat, VerticalAlign,
};
use crate::error::{ExcelError, Result};
use crate::types::{to_location, MAX_COLUMNS};

pub(crate) const WORKSHEET_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const OFFICE_DOCUMENT_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";

/// A sheet as listed by `xl/workbook.xml`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SheetEntry {
    pub name: String,
    pub rel_id: String,
    /// Zip path of the worksheet part
    pub path: String,
}

/// One relationship of a `.rels` part
#[derive(Debug, Clone)]
pub(crate) struct Relationship {
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

pub(crate) fn open_archive<R: Read + Seek>(reader: R) -> Result<ZipArchive<R>> {
    ZipArchive::new(reader).map_err(|e| ExcelError::ReadError(format!("not an xlsx package: {}", e)))
}

/// XML reader over a zip entry; `None` when the entry is absent
pub(crate) fn part_reader<'a, R: Read + Seek>(
    archive: &'a mut ZipArchive<R>,
    path: &str,
) -> Result<Option<Reader<impl BufRead + 'a>>> {
    match archive.by_name(path) {
        Ok(file) => {
            let mut reader = Reader::from_reader(BufReader::new(file));
            reader.config_mut().trim_text(false);
            Ok(Some(reader))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Value of an attribute by local name
pub(crate) fn attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Column of a `<c>` element: its `r` reference, else `next`. `None` for
/// an unreadable reference or a column past `XFD`.
pub(crate) fn cell_column(e: &BytesStart<'_>, next: usize) -> Option<usize> {
    let x = match attr(e, b"r") {
        Some(r) => to_location(&r).ok()?.x,
        None => next,
    };
    (x < MAX_COLUMNS).then_some(x)
}

fn attr_u32(e: &BytesStart<'_>, name: &[u8]) -> Option<u32> {
    attr(e, name).and_then(|v| v.trim().parse().ok())
}

/// `true` unless the attribute says `0`/`false`
fn attr_flag(e: &BytesStart<'_>, name: &[u8]) -> bool {
    !matches!(attr(e, name).as_deref(), Some("0") | Some("false"))
}

/// Resolve a relationship target against the directory of its source part
pub(crate) fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

/// `xl/worksheets/_rels/sheet1.xml.rels` for `xl/worksheets/sheet1.xml`
pub(crate) fn rels_path(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

pub(crate) fn part_dir(part: &str) -> &str {
    part.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Relationships of a part, keyed by id
pub(crate) fn read_relationships<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    rels: &str,
) -> Result<HashMap<String, Relationship>> {
    let mut map = HashMap::new();
    let Some(mut reader) = part_reader(archive, rels)? else {
        return Ok(map);
    };
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attr(&e, b"Id"), attr(&e, b"Target")) {
                    map.insert(
                        id,
                        Relationship {
                            rel_type: attr(&e, b"Type").unwrap_or_default(),
                            target,
                            external: attr(&e, b"TargetMode").as_deref() == Some("External"),
                        },
                    );
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExcelError::xml(rels, e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(map)
}

fn workbook_path<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    let root = read_relationships(archive, "_rels/.rels")?;
    Ok(root
        .values()
        .find(|r| r.rel_type == OFFICE_DOCUMENT_REL_TYPE)
        .map(|r| resolve_target("", &r.target))
        .unwrap_or_else(|| "xl/workbook.xml".to_string()))
}

/// Sheets in workbook order with their part paths
pub(crate) fn read_sheet_entries<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Vec<SheetEntry>> {
    let workbook = workbook_path(archive)?;
    let rels = read_relationships(archive, &rels_path(&workbook))?;
    let dir = part_dir(&workbook).to_string();

    let mut reader = part_reader(archive, &workbook)?
        .ok_or_else(|| ExcelError::ReadError(format!("missing workbook part {}", workbook)))?;
    let mut entries = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sheet" => {
                let name = attr(&e, b"name").unwrap_or_default();
                let rel_id = attr(&e, b"id").unwrap_or_default();
                match rels.get(&rel_id) {
                    Some(rel) => entries.push(SheetEntry {
                        name,
                        path: resolve_target(&dir, &rel.target),
                        rel_id,
                    }),
                    None => log::warn!("sheet '{}' has no relationship {}", name, rel_id),
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExcelError::xml(&workbook, e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(entries)
}

/// Collects the text of `<t>` elements, skipping phonetic runs.
///
/// Used for shared string items and inline strings alike.
#[derive(Debug, Default)]
pub(crate) struct RichText {
    in_t: bool,
    in_phonetic: bool,
    pub text: String,
}

impl RichText {
    pub fn start(&mut self, local: &[u8]) {
        match local {
            b"t" if !self.in_phonetic => self.in_t = true,
            b"rPh" => self.in_phonetic = true,
            _ => {}
        }
    }

    pub fn end(&mut self, local: &[u8]) {
        match local {
            b"t" => self.in_t = false,
            b"rPh" => self.in_phonetic = false,
            _ => {}
        }
    }

    pub fn text(&mut self, s: &str) {
        if self.in_t {
            self.text.push_str(s);
        }
    }

    pub fn take(&mut self) -> String {
        self.in_t = false;
        self.in_phonetic = false;
        std::mem::take(&mut self.text)
    }
}

/// Shared strings table; empty when the part is absent
pub(crate) fn read_shared_strings<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<Vec<String>> {
    let Some(mut reader) = part_reader(archive, path)? else {
        return Ok(Vec::new());
    };
    let mut strings = Vec::new();
    let mut item = RichText::default();
    let mut in_si = false;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => in_si = true,
                local if in_si => item.start(local),
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Ok(Event::Text(t)) if in_si => {
                item.text(&t.unescape().map_err(|e| ExcelError::xml(path, e))?)
            }
            Ok(Event::CData(t)) if in_si => item.text(&String::from_utf8_lossy(&t)),
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = false;
                    strings.push(item.take());
                }
                local => item.end(local),
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExcelError::xml(path, e)),
            _ => {}
        }
        buf.clear();
    }
    log::debug!("loaded {} shared strings", strings.len());
    Ok(strings)
}

/// Shared strings part path from the workbook relationships
pub(crate) fn shared_strings_path<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    let workbook = workbook_path(archive)?;
    let rels = read_relationships(archive, &rels_path(&workbook))?;
    Ok(rels
        .values()
        .find(|r| r.rel_type.ends_with("/sharedStrings"))
        .map(|r| resolve_target(part_dir(&workbook), &r.target))
        .unwrap_or_else(|| "xl/sharedStrings.xml".to_string()))
}

/// Styles part path from the workbook relationships
pub(crate) fn styles_path<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    let workbook = workbook_path(archive)?;
    let rels = read_relationships(archive, &rels_path(&workbook))?;
    Ok(rels
        .values()
        .find(|r| r.rel_type.ends_with("/styles"))
        .map(|r| resolve_target(part_dir(&workbook), &r.target))
        .unwrap_or_else(|| "xl/styles.xml".to_string()))
}

/// One `<xf>` of `cellXfs`
#[derive(Debug, Clone, Default)]
pub(crate) struct XfEntry {
    pub num_fmt_id: u32,
    pub font_id: usize,
    pub fill_id: usize,
    pub border_id: usize,
    pub horizontal: HorizontalAlign,
    pub vertical: VerticalAlign,
    pub wrap_text: bool,
}

/// The parts of `xl/styles.xml` cells refer to
#[derive(Debug, Default)]
pub(crate) struct StylesPart {
    pub num_fmts: HashMap<u32, String>,
    pub fonts: Vec<Font>,
    pub fills: Vec<Option<Color>>,
    pub borders: Vec<Border>,
    pub xfs: Vec<XfEntry>,
}

#[derive(Clone, Copy, PartialEq)]
enum StyleSection {
    None,
    NumFmts,
    Fonts,
    Fills,
    Borders,
    CellXfs,
    Other,
}

impl StylesPart {
    /// Number format id and code of a `cellXfs` index
    pub fn number_format(&self, xf: usize) -> (u32, String) {
        let id = self.xfs.get(xf).map_or(0, |x| x.num_fmt_id);
        let code = self
            .num_fmts
            .get(&id)
            .cloned()
            .or_else(|| builtin_format_code(id).map(str::to_string))
            .unwrap_or_else(|| "General".to_string());
        (id, code)
    }

    /// Full style of a `cellXfs` index
    pub fn cell_style(&self, xf: usize) -> CellStyle {
        let Some(entry) = self.xfs.get(xf) else {
            return CellStyle::default();
        };
        CellStyle {
            number_format: NumberFormat::from_parts(
                entry.num_fmt_id,
                self.num_fmts.get(&entry.num_fmt_id).map(String::as_str),
            ),
            font: self.fonts.get(entry.font_id).cloned().unwrap_or_default(),
            fill: self.fills.get(entry.fill_id).copied().flatten(),
            border: self.borders.get(entry.border_id).copied().unwrap_or_default(),
            horizontal: entry.horizontal,
            vertical: entry.vertical,
            wrap_text: entry.wrap_text,
        }
    }
}

fn parse_color(e: &BytesStart<'_>) -> Option<Color> {
    attr(e, b"rgb").and_then(|rgb| Color::from_hex(&rgb))
}

/// Parse the styles part; an absent part gives empty tables
pub(crate) fn read_styles<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<StylesPart> {
    let Some(reader) = part_reader(archive, path)? else {
        return Ok(StylesPart::default());
    };
    parse_styles(reader, path)
}

pub(crate) fn parse_styles<B: BufRead>(mut reader: Reader<B>, path: &str) -> Result<StylesPart> {
    let mut part = StylesPart::default();
    let mut section = StyleSection::None;
    // fills are solid only when patternType says so
    let mut fill_solid = false;
    let mut buf = Vec::new();
    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| ExcelError::xml(path, e))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let local = e.local_name();
                match (section, local.as_ref()) {
                    (StyleSection::None, b"numFmts") => section = StyleSection::NumFmts,
                    (StyleSection::None, b"fonts") => section = StyleSection::Fonts,
                    (StyleSection::None, b"fills") => section = StyleSection::Fills,
                    (StyleSection::None, b"borders") => section = StyleSection::Borders,
                    (StyleSection::None, b"cellXfs") => section = StyleSection::CellXfs,
                    (StyleSection::None, b"cellStyleXfs" | b"dxfs" | b"cellStyles") => {
                        section = StyleSection::Other
                    }
                    (StyleSection::NumFmts, b"numFmt") => {
                        if let (Some(id), Some(code)) = (attr_u32(e, b"numFmtId"), attr(e, b"formatCode")) {
                            part.num_fmts.insert(id, code);
                        }
                    }
                    (StyleSection::Fonts, b"font") => part.fonts.push(Font {
                        name: String::new(),
                        ..Font::default()
                    }),
                    (StyleSection::Fonts, tag) => {
                        if let Some(font) = part.fonts.last_mut() {
                            match tag {
                                b"b" => font.bold = attr_flag(e, b"val"),
                                b"i" => font.italic = attr_flag(e, b"val"),
                                b"u" => font.underline = attr(e, b"val").as_deref() != Some("none"),
                                b"sz" => {
                                    if let Some(size) = attr(e, b"val").and_then(|v| v.parse().ok()) {
                                        font.size = size;
                                    }
                                }
                                b"name" => font.name = attr(e, b"val").unwrap_or_default(),
                                b"color" => font.color = parse_color(e),
                                _ => {}
                            }
                        }
                    }
                    (StyleSection::Fills, b"fill") => {
                        fill_solid = false;
                        part.fills.push(None);
                    }
                    (StyleSection::Fills, b"patternFill") => {
                        fill_solid = attr(e, b"patternType").as_deref() == Some("solid");
                    }
                    (StyleSection::Fills, b"fgColor") if fill_solid => {
                        if let Some(fill) = part.fills.last_mut() {
                            *fill = parse_color(e);
                        }
                    }
                    (StyleSection::Borders, b"border") => part.borders.push(Border::default()),
                    (StyleSection::Borders, side @ (b"left" | b"right" | b"top" | b"bottom")) => {
                        let style = attr(e, b"style").map_or(BorderStyle::None, |s| BorderStyle::parse(&s));
                        if let Some(border) = part.borders.last_mut() {
                            match side {
                                b"left" => border.left = style,
                                b"right" => border.right = style,
                                b"top" => border.top = style,
                                _ => border.bottom = style,
                            }
                        }
                    }
                    (StyleSection::Borders, b"color") => {
                        if let Some(border) = part.borders.last_mut() {
                            if border.color.is_none() {
                                border.color = parse_color(e);
                            }
                        }
                    }
                    (StyleSection::CellXfs, b"xf") => part.xfs.push(XfEntry {
                        num_fmt_id: attr_u32(e, b"numFmtId").unwrap_or(0),
                        font_id: attr_u32(e, b"fontId").unwrap_or(0) as usize,
                        fill_id: attr_u32(e, b"fillId").unwrap_or(0) as usize,
                        border_id: attr_u32(e, b"borderId").unwrap_or(0) as usize,
                        ..XfEntry::default()
                    }),
                    (StyleSection::CellXfs, b"alignment") => {
                        if let Some(xf) = part.xfs.last_mut() {
                            xf.horizontal = match attr(e, b"horizontal").as_deref() {
                                Some("left") => HorizontalAlign::Left,
                                Some("center") | Some("centerContinuous") => HorizontalAlign::Center,
                                Some("right") => HorizontalAlign::Right,
                                _ => HorizontalAlign::General,
                            };
                            xf.vertical = match attr(e, b"vertical").as_deref() {
                                Some("top") => VerticalAlign::Top,
                                Some("center") => VerticalAlign::Center,
                                _ => VerticalAlign::Bottom,
                            };
                            xf.wrap_text = matches!(attr(e, b"wrapText").as_deref(), Some("1") | Some("true"));
                        }
                    }
                    _ => {}
                }
                // an empty container element closes its own section
                if matches!(event, Event::Empty(_))
                    && matches!(
                        local.as_ref(),
                        b"numFmts" | b"fonts" | b"fills" | b"borders" | b"cellXfs" | b"cellStyleXfs" | b"dxfs" | b"cellStyles"
                    )
                {
                    section = StyleSection::None;
                }
            }
            Event::End(ref e) => {
                if matches!(
                    e.local_name().as_ref(),
                    b"numFmts" | b"fonts" | b"fills" | b"borders" | b"cellXfs" | b"cellStyleXfs" | b"dxfs" | b"cellStyles"
                ) {
                    section = StyleSection::None;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    for font in &mut part.fonts {
        if font.name.is_empty() {
            font.name = Font::default().name;
        }
    }
    Ok(part)
}
