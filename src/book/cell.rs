//! Raw cell content as stored in a sheet

use std::fmt;

use super::style::StyleHandle;
use crate::types::{datetime_to_excel_serial, CellValue, Hyperlink};

/// Raw type tag of a stored cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellType {
    Numeric,
    String,
    Formula,
    Blank,
    Boolean,
    Error,
}

/// Spreadsheet error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Null,
    Div0,
    Value,
    Ref,
    Name,
    Num,
    NA,
    GettingData,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Null => "#NULL!",
            ErrorCode::Div0 => "#DIV/0!",
            ErrorCode::Value => "#VALUE!",
            ErrorCode::Ref => "#REF!",
            ErrorCode::Name => "#NAME?",
            ErrorCode::Num => "#NUM!",
            ErrorCode::NA => "#N/A",
            ErrorCode::GettingData => "#GETTING_DATA",
        }
    }

    pub fn parse(s: &str) -> Option<ErrorCode> {
        Some(match s.trim() {
            "#NULL!" => ErrorCode::Null,
            "#DIV/0!" => ErrorCode::Div0,
            "#VALUE!" => ErrorCode::Value,
            "#REF!" => ErrorCode::Ref,
            "#NAME?" => ErrorCode::Name,
            "#NUM!" => ErrorCode::Num,
            "#N/A" => ErrorCode::NA,
            "#GETTING_DATA" => ErrorCode::GettingData,
            _ => return None,
        })
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last computed value of a formula cell
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaResult {
    /// Not computed yet
    None,
    Numeric(f64),
    Text(String),
    Bool(bool),
    Error(ErrorCode),
}

impl FormulaResult {
    pub fn cell_type(&self) -> CellType {
        match self {
            FormulaResult::None => CellType::Blank,
            FormulaResult::Numeric(_) => CellType::Numeric,
            FormulaResult::Text(_) => CellType::String,
            FormulaResult::Bool(_) => CellType::Boolean,
            FormulaResult::Error(_) => CellType::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellKind {
    #[default]
    Blank,
    Numeric(f64),
    Text(String),
    Bool(bool),
    Formula {
        expr: String,
        cached: FormulaResult,
    },
    Error(ErrorCode),
}

/// A stored cell: raw content plus optional style and hyperlink
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    kind: CellKind,
    style: Option<StyleHandle>,
    hyperlink: Option<Hyperlink>,
}

impl Cell {
    pub fn new(kind: CellKind) -> Self {
        Cell {
            kind,
            style: None,
            hyperlink: None,
        }
    }

    pub fn kind(&self) -> &CellKind {
        &self.kind
    }

    pub fn set_kind(&mut self, kind: CellKind) {
        self.kind = kind;
    }

    pub fn cell_type(&self) -> CellType {
        match &self.kind {
            CellKind::Blank => CellType::Blank,
            CellKind::Numeric(_) => CellType::Numeric,
            CellKind::Text(_) => CellType::String,
            CellKind::Bool(_) => CellType::Boolean,
            CellKind::Formula { .. } => CellType::Formula,
            CellKind::Error(_) => CellType::Error,
        }
    }

    /// Type of the cached result, for formula cells only
    pub fn cached_result_type(&self) -> Option<CellType> {
        match &self.kind {
            CellKind::Formula { cached, .. } => Some(cached.cell_type()),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self.kind, CellKind::Blank)
    }

    pub fn numeric_value(&self) -> Option<f64> {
        match &self.kind {
            CellKind::Numeric(n)
            | CellKind::Formula {
                cached: FormulaResult::Numeric(n),
                ..
            } => Some(*n),
            _ => None,
        }
    }

    pub fn bool_value(&self) -> Option<bool> {
        match &self.kind {
            CellKind::Bool(b)
            | CellKind::Formula {
                cached: FormulaResult::Bool(b),
                ..
            } => Some(*b),
            _ => None,
        }
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match &self.kind {
            CellKind::Error(e)
            | CellKind::Formula {
                cached: FormulaResult::Error(e),
                ..
            } => Some(*e),
            _ => None,
        }
    }

    /// Text form of the raw content (formula cells yield their cached value)
    pub fn string_value(&self) -> String {
        match &self.kind {
            CellKind::Blank => String::new(),
            CellKind::Numeric(n) => number_to_text(*n),
            CellKind::Text(s) => s.clone(),
            CellKind::Bool(b) => bool_text(*b).to_string(),
            CellKind::Error(e) => e.as_str().to_string(),
            CellKind::Formula { cached, .. } => match cached {
                FormulaResult::None => String::new(),
                FormulaResult::Numeric(n) => number_to_text(*n),
                FormulaResult::Text(s) => s.clone(),
                FormulaResult::Bool(b) => bool_text(*b).to_string(),
                FormulaResult::Error(e) => e.as_str().to_string(),
            },
        }
    }

    pub fn formula(&self) -> Option<&str> {
        match &self.kind {
            CellKind::Formula { expr, .. } => Some(expr),
            _ => None,
        }
    }

    pub fn style(&self) -> Option<&StyleHandle> {
        self.style.as_ref()
    }

    pub fn set_style(&mut self, style: Option<StyleHandle>) {
        self.style = style;
    }

    pub fn hyperlink(&self) -> Option<&Hyperlink> {
        self.hyperlink.as_ref()
    }

    pub fn set_hyperlink(&mut self, link: Option<Hyperlink>) {
        self.hyperlink = link;
    }

    /// Clear the content, keeping the style
    pub fn set_blank(&mut self) {
        self.kind = CellKind::Blank;
        self.hyperlink = None;
    }

    /// Store a host value.
    ///
    /// Dates become serial numbers, so they only read back as dates when the
    /// cell carries a date number format. Unknown error markers are stored
    /// as text.
    pub fn set_value(&mut self, value: CellValue) {
        self.kind = match value {
            CellValue::Empty => CellKind::Blank,
            CellValue::String(s) => CellKind::Text(s),
            CellValue::Int(i) => CellKind::Numeric(i as f64),
            CellValue::Float(f) => CellKind::Numeric(f),
            CellValue::Bool(b) => CellKind::Bool(b),
            CellValue::Date(d) => CellKind::Numeric(datetime_to_excel_serial(&d)),
            CellValue::Error(e) => match ErrorCode::parse(&e) {
                Some(code) => CellKind::Error(code),
                None => CellKind::Text(e),
            },
            CellValue::Hyperlink(link) => {
                let text = link.text().to_string();
                self.hyperlink = Some(link);
                CellKind::Text(text)
            }
            CellValue::Formula(f) => CellKind::Formula {
                expr: f.trim_start_matches('=').to_string(),
                cached: FormulaResult::None,
            },
        };
    }
}

pub(crate) fn bool_text(b: bool) -> &'static str {
    if b {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Round to the 15 significant digits a spreadsheet displays
pub(crate) fn round_significant(n: f64) -> f64 {
    if !n.is_finite() || n == 0.0 {
        return n;
    }
    format!("{:.14e}", n).parse().unwrap_or(n)
}

/// Text of a number as a spreadsheet shows it in General format
pub(crate) fn number_to_text(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        let mut buf = itoa::Buffer::new();
        return buf.format(n as i64).to_string();
    }
    round_significant(n).to_string()
}
