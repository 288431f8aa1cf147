//! Host-side values and cell addressing

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

use crate::error::{ExcelError, Result};

/// Milliseconds in one spreadsheet day
const MS_PER_DAY: f64 = 86_400_000.0;
/// Serial number of 1970-01-01 in the 1900 date system
const UNIX_EPOCH_SERIAL: f64 = 25_569.0;
/// Serial number of 9999-12-31, the last representable day
const MAX_SERIAL: f64 = 2_958_465.999_999;

/// Column count of an xlsx sheet; the last column is `XFD`
pub const MAX_COLUMNS: usize = 16_384;

/// A value written to or read from a cell.
///
/// Coercion of stored cells only ever produces `Empty`, `String`, `Int`,
/// `Float`, `Bool`, `Date` and `Error`. `Hyperlink` and `Formula` are
/// accepted on the write path.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// No value (absent cell)
    Empty,
    /// String value
    String(String),
    /// Integral number
    Int(i64),
    /// Fractional number
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// Date/time, stored as a 1900-system serial in the sheet
    Date(NaiveDateTime),
    /// Error marker such as `#DIV/0!`
    Error(String),
    /// Hyperlink with its display label
    Hyperlink(Hyperlink),
    /// Formula text (e.g. "SUM(A1:A10)", a leading '=' is stripped on write)
    Formula(String),
}

impl CellValue {
    /// Convert cell value to string
    pub fn as_string(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::String(s) => s.clone(),
            CellValue::Int(i) => i.to_string(),
            CellValue::Float(f) => f.to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Date(d) => d.format("%Y-%m-%d %H:%M:%S").to_string(),
            CellValue::Error(e) => e.clone(),
            CellValue::Hyperlink(h) => h.text().to_string(),
            CellValue::Formula(f) => f.clone(),
        }
    }

    /// `Empty` or an empty string
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Try to convert to integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Int(i) => Some(*i),
            CellValue::Float(f) => Some(*f as i64),
            CellValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Try to convert to float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(f) => Some(*f),
            CellValue::Int(i) => Some(*i as f64),
            CellValue::Date(d) => Some(datetime_to_excel_serial(d)),
            CellValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Try to convert to boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            CellValue::Int(i) => Some(*i != 0),
            CellValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Try to read as date/time
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<&String> for CellValue {
    fn from(s: &String) -> Self {
        CellValue::String(s.clone())
    }
}

macro_rules! int_into_cell_value {
    ($($t:ty),*) => {
        $(impl From<$t> for CellValue {
            fn from(i: $t) -> Self {
                CellValue::Int(i as i64)
            }
        })*
    };
}

int_into_cell_value!(i8, i16, i32, i64, u8, u16, u32, usize);

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Float(f)
    }
}

impl From<f32> for CellValue {
    fn from(f: f32) -> Self {
        CellValue::Float(f as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(d: NaiveDateTime) -> Self {
        CellValue::Date(d)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(d: NaiveDate) -> Self {
        CellValue::Date(d.and_time(chrono::NaiveTime::MIN))
    }
}

impl From<Hyperlink> for CellValue {
    fn from(h: Hyperlink) -> Self {
        CellValue::Hyperlink(h)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(CellValue::Empty)
    }
}

/// Target kind of a hyperlink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HyperlinkKind {
    Url,
    Email,
    File,
    /// Location inside the workbook, e.g. `Sheet2!A1`
    Document,
}

/// Hyperlink cell content
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hyperlink {
    pub kind: HyperlinkKind,
    pub address: String,
    pub label: Option<String>,
}

impl Hyperlink {
    pub fn url(address: impl Into<String>) -> Self {
        Hyperlink {
            kind: HyperlinkKind::Url,
            address: address.into(),
            label: None,
        }
    }

    pub fn document(location: impl Into<String>) -> Self {
        Hyperlink {
            kind: HyperlinkKind::Document,
            address: location.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Text shown in the cell
    pub fn text(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.address)
    }

    /// Target as stored in the relationship part
    pub(crate) fn target(&self) -> String {
        match self.kind {
            HyperlinkKind::Email if !self.address.starts_with("mailto:") => {
                format!("mailto:{}", self.address)
            }
            _ => self.address.clone(),
        }
    }
}

/// Zero-based cell coordinate: `x` is the column, `y` the row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellLocation {
    pub x: usize,
    pub y: usize,
}

impl CellLocation {
    pub fn new(x: usize, y: usize) -> Self {
        CellLocation { x, y }
    }

    /// A1-style reference (e.g. "B5")
    pub fn reference(&self) -> String {
        let mut s = index_to_col_name(self.x);
        let mut buf = itoa::Buffer::new();
        s.push_str(buf.format(self.y + 1));
        s
    }
}

impl fmt::Display for CellLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reference())
    }
}

/// Convert column index to letters (0 -> A, 25 -> Z, 26 -> AA)
pub fn index_to_col_name(index: usize) -> String {
    let mut result = Vec::with_capacity(3);
    let mut col = index + 1;

    while col > 0 {
        col -= 1;
        result.push(b'A' + (col % 26) as u8);
        col /= 26;
    }

    result.reverse();
    String::from_utf8(result).unwrap_or_default()
}

/// Convert column letters to a zero-based index ("A" -> 0, "AA" -> 26).
///
/// Letters are case-insensitive; anything else yields `None`.
pub fn col_name_to_index(name: &str) -> Option<usize> {
    if name.is_empty() {
        return None;
    }
    let mut index: usize = 0;
    for c in name.chars() {
        let c = c.to_ascii_uppercase();
        if !c.is_ascii_uppercase() {
            return None;
        }
        index = index
            .checked_mul(26)?
            .checked_add((c as u8 - b'A') as usize + 1)?;
    }
    Some(index - 1)
}

/// Parse an A1-style reference ("B5", "$B$5") into a location (1, 4)
pub fn to_location(reference: &str) -> Result<CellLocation> {
    let invalid = || ExcelError::InvalidCell(reference.to_string());
    let cleaned: String = reference.trim().chars().filter(|c| *c != '$').collect();
    let split = cleaned
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (letters, digits) = cleaned.split_at(split);

    let x = col_name_to_index(letters)
        .filter(|x| *x < MAX_COLUMNS)
        .ok_or_else(invalid)?;
    let row: usize = digits.parse().map_err(|_| invalid())?;
    if row == 0 {
        return Err(invalid());
    }
    Ok(CellLocation { x, y: row - 1 })
}

/// Convert a 1900-system serial number to a date/time.
///
/// Returns `None` for negative, non-finite or out-of-range serials.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(0.0..=MAX_SERIAL).contains(&serial) {
        return None;
    }
    let ms = ((serial - UNIX_EPOCH_SERIAL) * MS_PER_DAY).round() as i64;
    DateTime::UNIX_EPOCH
        .naive_utc()
        .checked_add_signed(Duration::milliseconds(ms))
}

/// Convert a date/time to its 1900-system serial number
pub fn datetime_to_excel_serial(dt: &NaiveDateTime) -> f64 {
    let delta = *dt - DateTime::UNIX_EPOCH.naive_utc();
    UNIX_EPOCH_SERIAL + delta.num_milliseconds() as f64 / MS_PER_DAY
}
