//! In-memory workbook model
//!
//! A [`Workbook`] owns its sheets and a [`StyleTable`]. Sheets of a streaming
//! workbook keep a bounded window of rows and spill older rows to temporary
//! files; see [`Workbook::streaming`].

pub mod cell;
pub mod sheet;
pub mod style;
pub(crate) mod window;

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

pub use cell::{Cell, CellKind, CellType, ErrorCode, FormulaResult};
pub use sheet::{CellRange, FreezePane, ListValidation, MergedRegion, Row, Sheet};
pub use style::{
    Border, BorderStyle, CellStyle, Color, Font, HorizontalAlign, NumberFormat, StyleHandle,
    StyleTable, VerticalAlign,
};
pub use window::DEFAULT_WINDOW_SIZE;

use crate::error::{ExcelError, Result};

/// Name given to a sheet created without one
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Container format a workbook came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookFormat {
    /// Office Open XML (zip)
    Xlsx,
    /// Legacy binary workbook, read only
    Xls,
}

impl BookFormat {
    /// Detect the format from the first bytes of a file
    pub fn sniff(header: &[u8]) -> Option<BookFormat> {
        if header.starts_with(&ZIP_MAGIC) {
            Some(BookFormat::Xlsx)
        } else if header.starts_with(&OLE_MAGIC) {
            Some(BookFormat::Xls)
        } else {
            None
        }
    }

    /// Read the magic bytes and rewind
    pub fn detect<R: Read + Seek>(reader: &mut R) -> Result<BookFormat> {
        let mut header = [0u8; 8];
        let mut filled = 0;
        while filled < header.len() {
            let n = reader.read(&mut header[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        reader.seek(SeekFrom::Start(0))?;
        BookFormat::sniff(&header[..filled]).ok_or_else(|| {
            ExcelError::InvalidFormat("input is neither an xlsx nor an xls workbook".to_string())
        })
    }
}

/// A workbook: ordered sheets sharing one style table
pub struct Workbook {
    sheets: Vec<Sheet>,
    styles: StyleTable,
    format: BookFormat,
    window: Option<usize>,
}

impl Workbook {
    /// Empty in-memory xlsx workbook
    pub fn new() -> Self {
        Workbook {
            sheets: Vec::new(),
            styles: StyleTable::new(),
            format: BookFormat::Xlsx,
            window: None,
        }
    }

    /// Empty streaming workbook keeping `window` rows per sheet in memory
    pub fn streaming(window: usize) -> Self {
        Workbook {
            window: Some(window.max(1)),
            ..Workbook::new()
        }
    }

    /// Open an xlsx (or, with the `xls` feature, xls) file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    /// Load a workbook from any seekable source, sniffing its format
    pub fn from_reader<R: Read + Seek>(mut reader: R) -> Result<Self> {
        match BookFormat::detect(&mut reader)? {
            BookFormat::Xlsx => crate::xlsx::load::load(reader),
            BookFormat::Xls => Self::load_legacy(reader),
        }
    }

    #[cfg(feature = "xls")]
    fn load_legacy<R: Read + Seek>(reader: R) -> Result<Self> {
        crate::legacy::load(reader)
    }

    #[cfg(not(feature = "xls"))]
    fn load_legacy<R: Read + Seek>(_reader: R) -> Result<Self> {
        Err(crate::legacy_disabled())
    }

    pub(crate) fn with_format(format: BookFormat) -> Self {
        Workbook {
            format,
            ..Workbook::new()
        }
    }

    /// Turn a loaded xlsx workbook into a streaming one; existing rows spill
    /// first as new rows arrive
    pub fn into_streaming(mut self, window: usize) -> Result<Self> {
        if self.format != BookFormat::Xlsx {
            return Err(ExcelError::Unsupported(
                "The input is not a [xlsx] format".to_string(),
            ));
        }
        let window = window.max(1);
        for sheet in &mut self.sheets {
            sheet.set_window(window);
        }
        self.window = Some(window);
        Ok(self)
    }

    pub fn format(&self) -> BookFormat {
        self.format
    }

    pub fn is_streaming(&self) -> bool {
        self.window.is_some()
    }

    pub fn window_size(&self) -> Option<usize> {
        self.window
    }

    pub fn styles(&self) -> &StyleTable {
        &self.styles
    }

    /// New unregistered style handle with default formatting
    pub fn create_style(&self) -> StyleHandle {
        StyleHandle::new(CellStyle::default())
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    pub fn sheet_mut(&mut self, index: usize) -> Option<&mut Sheet> {
        self.sheets.get_mut(index)
    }

    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets.iter().position(|s| s.name() == name)
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        self.sheet_index(name).and_then(|i| self.sheets.get(i))
    }

    pub(crate) fn sheet_not_found(&self, sheet: impl ToString) -> ExcelError {
        ExcelError::SheetNotFound {
            sheet: sheet.to_string(),
            available: self.sheet_names().join(", "),
        }
    }

    /// Append a sheet; names must be unique
    pub fn create_sheet(&mut self, name: &str) -> Result<usize> {
        validate_sheet_name(name)?;
        if self.sheet_index(name).is_some() {
            return Err(ExcelError::InvalidFormat(format!(
                "sheet '{}' already exists",
                name
            )));
        }
        let mut sheet = Sheet::new(name.to_string(), self.styles.clone());
        if let Some(window) = self.window {
            sheet.set_window(window);
        }
        self.sheets.push(sheet);
        Ok(self.sheets.len() - 1)
    }

    /// Index of the named sheet, creating it if absent. A blank name means
    /// [`DEFAULT_SHEET_NAME`].
    pub fn get_or_create_sheet(&mut self, name: &str) -> Result<usize> {
        let name = if name.trim().is_empty() {
            DEFAULT_SHEET_NAME
        } else {
            name
        };
        match self.sheet_index(name) {
            Some(index) => Ok(index),
            None => self.create_sheet(name),
        }
    }

    /// Sheet at `index`, appending `SheetN` sheets until it exists
    pub fn get_or_create_sheet_at(&mut self, index: usize) -> Result<usize> {
        while self.sheets.len() <= index {
            let mut n = self.sheets.len() + 1;
            let mut name = format!("Sheet{}", n);
            while self.sheet_index(&name).is_some() {
                n += 1;
                name = format!("Sheet{}", n);
            }
            self.create_sheet(&name)?;
        }
        Ok(index)
    }

    pub fn set_sheet_name(&mut self, index: usize, name: &str) -> Result<()> {
        validate_sheet_name(name)?;
        if self.sheet_index(name).is_some_and(|i| i != index) {
            return Err(ExcelError::InvalidFormat(format!(
                "sheet '{}' already exists",
                name
            )));
        }
        let sheet = self
            .sheets
            .get_mut(index)
            .ok_or_else(|| ExcelError::SheetNotFound {
                sheet: index.to_string(),
                available: String::new(),
            })?;
        sheet.set_name(name.to_string());
        Ok(())
    }

    /// Copy a sheet under a new name; cell styles stay shared
    pub fn clone_sheet(&mut self, index: usize, name: &str) -> Result<usize> {
        validate_sheet_name(name)?;
        if self.sheet_index(name).is_some() {
            return Err(ExcelError::InvalidFormat(format!(
                "sheet '{}' already exists",
                name
            )));
        }
        let copy = self
            .sheets
            .get(index)
            .ok_or_else(|| self.sheet_not_found(index))?
            .duplicate(name.to_string())?;
        self.sheets.push(copy);
        Ok(self.sheets.len() - 1)
    }

    /// Write the workbook as xlsx to a seekable sink
    pub fn write_to<W: Write + Seek>(&mut self, out: W) -> Result<()> {
        if self.sheets.is_empty() {
            self.get_or_create_sheet(DEFAULT_SHEET_NAME)?;
        }
        crate::xlsx::save::save(self, out)
    }

    /// Write the workbook as xlsx to any sink.
    ///
    /// The package is assembled in memory, or in a temp file for streaming
    /// workbooks, then copied to `out`.
    pub fn write_to_stream<W: Write>(&mut self, out: &mut W) -> Result<()> {
        if self.is_streaming() {
            let mut spool = tempfile::tempfile()?;
            self.write_to(BufWriter::new(&mut spool))?;
            spool.seek(SeekFrom::Start(0))?;
            std::io::copy(&mut spool, out)?;
        } else {
            let mut buf = Cursor::new(Vec::new());
            self.write_to(&mut buf)?;
            out.write_all(buf.get_ref())?;
        }
        out.flush()?;
        Ok(())
    }

    /// Write the workbook as xlsx to a file
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::with_capacity(64 * 1024, file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub(crate) fn sheets_mut(&mut self) -> &mut [Sheet] {
        &mut self.sheets
    }

    /// Remove temp files backing streaming sheets
    pub fn dispose(&mut self) {
        for sheet in &mut self.sheets {
            sheet.dispose();
        }
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Workbook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workbook")
            .field("format", &self.format)
            .field("window", &self.window)
            .field("sheets", &self.sheets)
            .finish()
    }
}

fn validate_sheet_name(name: &str) -> Result<()> {
    let bad = name.trim().is_empty()
        || name.chars().count() > 31
        || name.contains(['[', ']', ':', '*', '?', '/', '\\'])
        || name.starts_with('\'')
        || name.ends_with('\'');
    if bad {
        return Err(ExcelError::InvalidFormat(format!(
            "invalid sheet name '{}'",
            name
        )));
    }
    Ok(())
}
