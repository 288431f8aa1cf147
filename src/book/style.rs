//! Cell styles and shared style handles

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// ARGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(pub u32);

impl Color {
    pub const BLACK: Color = Color(0xFF00_0000);
    pub const WHITE: Color = Color(0xFFFF_FFFF);
    pub const BLUE: Color = Color(0xFF00_00FF);
    pub const RED: Color = Color(0xFFFF_0000);
    pub const GREY_25_PERCENT: Color = Color(0xFFC0_C0C0);
    pub const YELLOW: Color = Color(0xFFFF_FF00);

    /// Parse `"FFC0C0C0"` or `"C0C0C0"` (alpha defaults to opaque)
    pub fn from_hex(hex: &str) -> Option<Color> {
        let value = u32::from_str_radix(hex.trim_start_matches('#'), 16).ok()?;
        match hex.trim_start_matches('#').len() {
            6 => Some(Color(0xFF00_0000 | value)),
            8 => Some(Color(value)),
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        format!("{:08X}", self.0)
    }
}

/// Number format of a style
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum NumberFormat {
    #[default]
    General,
    /// Built-in format by ID
    BuiltIn(u32),
    /// Custom format string
    Custom(String),
}

impl NumberFormat {
    /// 2 - 0.00
    pub const ID_NUMBER_DEC2: u32 = 2;
    /// 14 - m/d/yy
    pub const ID_DATE_SHORT: u32 = 14;
    /// 22 - m/d/yy h:mm
    pub const ID_DATETIME: u32 = 22;

    /// Format for a given number-format id and optional custom code
    pub fn from_parts(id: u32, code: Option<&str>) -> Self {
        match (id, code) {
            (0, _) => NumberFormat::General,
            (_, Some(code)) if id >= 164 || builtin_format_code(id).is_none() => {
                NumberFormat::Custom(code.to_string())
            }
            _ => NumberFormat::BuiltIn(id),
        }
    }

    /// Get the format string
    pub fn format_string(&self) -> &str {
        match self {
            NumberFormat::General => "General",
            NumberFormat::BuiltIn(id) => builtin_format_code(*id).unwrap_or("General"),
            NumberFormat::Custom(s) => s,
        }
    }

    /// Built-in id, if any
    pub fn builtin_id(&self) -> Option<u32> {
        match self {
            NumberFormat::General => Some(0),
            NumberFormat::BuiltIn(id) => Some(*id),
            NumberFormat::Custom(_) => None,
        }
    }

    /// Check if this is a date/time format
    pub fn is_date_format(&self) -> bool {
        match self {
            NumberFormat::General => false,
            NumberFormat::BuiltIn(id) => is_date_format(*id, self.format_string()),
            NumberFormat::Custom(code) => is_date_format(u32::MAX, code),
        }
    }
}

/// Code of a built-in number format
pub fn builtin_format_code(id: u32) -> Option<&'static str> {
    Some(match id {
        0 => "General",
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        12 => "# ?/?",
        13 => "# ??/??",
        14 => "m/d/yy",
        15 => "d-mmm-yy",
        16 => "d-mmm",
        17 => "mmm-yy",
        18 => "h:mm AM/PM",
        19 => "h:mm:ss AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "m/d/yy h:mm",
        37 => "#,##0 ;(#,##0)",
        38 => "#,##0 ;[Red](#,##0)",
        39 => "#,##0.00;(#,##0.00)",
        40 => "#,##0.00;[Red](#,##0.00)",
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mmss.0",
        48 => "##0.0E+0",
        49 => "@",
        _ => return None,
    })
}

/// Whether a number format renders dates or times.
///
/// Built-in ids 14-22, 27-36, 45-47 and 50-58 are dates. Custom codes are
/// dates when a date/time token survives after quoted literals, escapes and
/// bracketed sections (other than elapsed `[h]`, `[m]`, `[s]`) are removed.
pub fn is_date_format(format_id: u32, format_code: &str) -> bool {
    if matches!(format_id, 14..=22 | 27..=36 | 45..=47 | 50..=58) {
        return true;
    }
    if format_code.is_empty() || format_code.eq_ignore_ascii_case("general") {
        return false;
    }
    if format_code.contains('周') || format_code.contains("星期") || format_code.contains("aa") {
        return true;
    }

    let mut stripped = String::with_capacity(format_code.len());
    let mut chars = format_code.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                for q in chars.by_ref() {
                    if q == '"' {
                        break;
                    }
                }
            }
            '\\' | '_' | '*' => {
                chars.next();
            }
            '[' => {
                let mut section = String::new();
                for b in chars.by_ref() {
                    if b == ']' {
                        break;
                    }
                    section.push(b);
                }
                let lower = section.to_ascii_lowercase();
                if !lower.is_empty() && lower.chars().all(|b| matches!(b, 'h' | 'm' | 's')) {
                    stripped.push_str(&lower);
                }
            }
            // only the first section decides
            ';' => break,
            _ => stripped.push(c.to_ascii_lowercase()),
        }
    }
    if stripped.contains('#') || (stripped.contains('0') && !stripped.contains(':')) {
        return false;
    }
    stripped
        .chars()
        .any(|c| matches!(c, 'y' | 'm' | 'd' | 'h' | 's'))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub name: String,
    pub size: f64,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub color: Option<Color>,
}

impl Default for Font {
    fn default() -> Self {
        Font {
            name: "Calibri".to_string(),
            size: 11.0,
            bold: false,
            italic: false,
            underline: false,
            color: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BorderStyle {
    #[default]
    None,
    Thin,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
}

impl BorderStyle {
    pub(crate) fn as_str(self) -> Option<&'static str> {
        match self {
            BorderStyle::None => None,
            BorderStyle::Thin => Some("thin"),
            BorderStyle::Medium => Some("medium"),
            BorderStyle::Thick => Some("thick"),
            BorderStyle::Dashed => Some("dashed"),
            BorderStyle::Dotted => Some("dotted"),
            BorderStyle::Double => Some("double"),
        }
    }

    pub(crate) fn parse(s: &str) -> BorderStyle {
        match s {
            "thin" | "hair" => BorderStyle::Thin,
            "medium" => BorderStyle::Medium,
            "thick" => BorderStyle::Thick,
            "dashed" | "mediumDashed" => BorderStyle::Dashed,
            "dotted" => BorderStyle::Dotted,
            "double" => BorderStyle::Double,
            _ => BorderStyle::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Border {
    pub left: BorderStyle,
    pub right: BorderStyle,
    pub top: BorderStyle,
    pub bottom: BorderStyle,
    pub color: Option<Color>,
}

impl Border {
    /// Same line on all four sides
    pub fn all(style: BorderStyle, color: Option<Color>) -> Self {
        Border {
            left: style,
            right: style,
            top: style,
            bottom: style,
            color,
        }
    }

    pub fn is_none(&self) -> bool {
        *self == Border::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HorizontalAlign {
    #[default]
    General,
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VerticalAlign {
    #[default]
    Bottom,
    Center,
    Top,
}

/// Formatting applied to a cell
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellStyle {
    pub number_format: NumberFormat,
    pub font: Font,
    /// Solid background fill
    pub fill: Option<Color>,
    pub border: Border,
    pub horizontal: HorizontalAlign,
    pub vertical: VerticalAlign,
    pub wrap_text: bool,
}

impl CellStyle {
    pub fn with_number_format(mut self, format: NumberFormat) -> Self {
        self.number_format = format;
        self
    }

    pub fn with_fill(mut self, color: Color) -> Self {
        self.fill = Some(color);
        self
    }

    pub fn with_border(mut self, border: Border) -> Self {
        self.border = border;
        self
    }

    pub fn with_align(mut self, horizontal: HorizontalAlign, vertical: VerticalAlign) -> Self {
        self.horizontal = horizontal;
        self.vertical = vertical;
        self
    }

    pub fn with_font(mut self, font: Font) -> Self {
        self.font = font;
        self
    }
}

/// Shared, mutable reference to a [`CellStyle`].
///
/// Cloning a handle shares the style: editing it through any clone restyles
/// every cell that holds the handle. Use [`StyleHandle::duplicate`] for an
/// independent copy. Equality is identity.
#[derive(Clone)]
pub struct StyleHandle(Rc<RefCell<CellStyle>>);

impl StyleHandle {
    pub fn new(style: CellStyle) -> Self {
        StyleHandle(Rc::new(RefCell::new(style)))
    }

    /// Mutate the shared style in place
    pub fn edit<R>(&self, f: impl FnOnce(&mut CellStyle) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    /// Read the shared style
    pub fn with<R>(&self, f: impl FnOnce(&CellStyle) -> R) -> R {
        f(&self.0.borrow())
    }

    /// Copy of the current style value
    pub fn snapshot(&self) -> CellStyle {
        self.0.borrow().clone()
    }

    /// Independent handle holding a copy of this style
    pub fn duplicate(&self) -> StyleHandle {
        StyleHandle::new(self.snapshot())
    }

    pub fn ptr_eq(&self, other: &StyleHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_date_format(&self) -> bool {
        self.0.borrow().number_format.is_date_format()
    }

    fn key(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl PartialEq for StyleHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for StyleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StyleHandle").field(&self.0.borrow()).finish()
    }
}

#[derive(Default)]
struct StyleRegistry {
    handles: Vec<StyleHandle>,
    index: HashMap<usize, u32>,
}

/// Workbook-wide registry assigning `cellXfs` indices to style handles.
///
/// Index 0 is the unstyled default; registered handles start at 1. The
/// registry keeps every handle alive, so indices stay stable for the life of
/// the workbook.
#[derive(Clone, Default)]
pub struct StyleTable {
    inner: Rc<RefCell<StyleRegistry>>,
}

impl StyleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of a handle, registering it on first sight
    pub fn index_of(&self, handle: &StyleHandle) -> u32 {
        let mut reg = self.inner.borrow_mut();
        if let Some(idx) = reg.index.get(&handle.key()) {
            return *idx;
        }
        reg.handles.push(handle.clone());
        let idx = reg.handles.len() as u32;
        reg.index.insert(handle.key(), idx);
        idx
    }

    /// Registered handles in index order (index 1 first)
    pub fn handles(&self) -> Vec<StyleHandle> {
        self.inner.borrow().handles.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_handle_mutation() {
        let handle = StyleHandle::new(CellStyle::default());
        let shared = handle.clone();
        let copy = handle.duplicate();

        shared.edit(|s| s.fill = Some(Color::YELLOW));

        assert_eq!(handle.snapshot().fill, Some(Color::YELLOW));
        assert_eq!(copy.snapshot().fill, None);
        assert!(handle.ptr_eq(&shared));
        assert!(!handle.ptr_eq(&copy));
    }

    #[test]
    fn test_style_table_indices() {
        let table = StyleTable::new();
        let a = StyleHandle::new(CellStyle::default());
        let b = a.duplicate();

        assert_eq!(table.index_of(&a), 1);
        assert_eq!(table.index_of(&b), 2);
        assert_eq!(table.index_of(&a.clone()), 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_date_formats() {
        assert!(is_date_format(14, "m/d/yy"));
        assert!(is_date_format(22, "m/d/yy h:mm"));
        assert!(is_date_format(164, "yyyy-mm-dd"));
        assert!(is_date_format(164, "[$-409]mmmm d, yyyy"));
        assert!(is_date_format(164, "[h]:mm:ss"));
        assert!(is_date_format(164, "yyyy\"年\"m\"月\"d\"日\" aaaa"));

        assert!(!is_date_format(0, "General"));
        assert!(!is_date_format(2, "0.00"));
        assert!(!is_date_format(164, "#,##0.00"));
        assert!(!is_date_format(164, "\"days\" 0"));
        assert!(!is_date_format(164, "[Red]0.00"));
        assert!(!is_date_format(49, "@"));
    }

    #[test]
    fn test_number_format_parts() {
        assert_eq!(NumberFormat::from_parts(0, None), NumberFormat::General);
        assert_eq!(NumberFormat::from_parts(2, None).format_string(), "0.00");
        assert_eq!(
            NumberFormat::from_parts(164, Some("yyyy")),
            NumberFormat::Custom("yyyy".to_string())
        );
        assert!(NumberFormat::BuiltIn(22).is_date_format());
    }

    #[test]
    fn test_color_hex() {
        assert_eq!(Color::from_hex("C0C0C0"), Some(Color::GREY_25_PERCENT));
        assert_eq!(Color::from_hex("FF0000FF"), Some(Color::BLUE));
        assert_eq!(Color::BLUE.to_hex(), "FF0000FF");
        assert_eq!(Color::from_hex("zz"), None);
    }
}
