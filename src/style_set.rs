//! Reusable set of cell styles picked by value type

use crate::book::{
    Border, BorderStyle, CellStyle, Color, Font, HorizontalAlign, NumberFormat, StyleHandle,
    VerticalAlign,
};
use crate::types::CellValue;

/// Five shared styles applied by the row writer.
///
/// Every handle is shared with the cells it styles, so the bulk mutators
/// below restyle cells that were already written.
#[derive(Debug, Clone)]
pub struct StyleSet {
    head: StyleHandle,
    cell: StyleHandle,
    number: StyleHandle,
    date: StyleHandle,
    hyperlink: StyleHandle,
}

impl StyleSet {
    /// Centered cells with thin borders; grey header; `0.00` numbers;
    /// `m/d/yy h:mm` dates; blue underlined hyperlinks
    pub fn new() -> Self {
        let base = CellStyle::default()
            .with_align(HorizontalAlign::Center, VerticalAlign::Center)
            .with_border(Border::all(BorderStyle::Thin, Some(Color::BLACK)));

        let head = base.clone().with_fill(Color::GREY_25_PERCENT);
        let number = base
            .clone()
            .with_number_format(NumberFormat::BuiltIn(NumberFormat::ID_NUMBER_DEC2));
        let date = base
            .clone()
            .with_number_format(NumberFormat::BuiltIn(NumberFormat::ID_DATETIME));
        let hyperlink = base.clone().with_font(Font {
            underline: true,
            color: Some(Color::BLUE),
            ..Font::default()
        });

        StyleSet {
            head: StyleHandle::new(head),
            cell: StyleHandle::new(base),
            number: StyleHandle::new(number),
            date: StyleHandle::new(date),
            hyperlink: StyleHandle::new(hyperlink),
        }
    }

    pub fn head_style(&self) -> &StyleHandle {
        &self.head
    }

    pub fn cell_style(&self) -> &StyleHandle {
        &self.cell
    }

    pub fn number_style(&self) -> &StyleHandle {
        &self.number
    }

    pub fn date_style(&self) -> &StyleHandle {
        &self.date
    }

    pub fn hyperlink_style(&self) -> &StyleHandle {
        &self.hyperlink
    }

    fn all(&self) -> [&StyleHandle; 5] {
        [&self.head, &self.cell, &self.number, &self.date, &self.hyperlink]
    }

    /// Style for a value: header or plain cell style first, then dates,
    /// fractional numbers and hyperlinks override it. Integers keep the
    /// plain style.
    pub fn for_value(&self, value: &CellValue, is_header: bool) -> StyleHandle {
        let base = if is_header { &self.head } else { &self.cell };
        match value {
            CellValue::Date(_) => &self.date,
            CellValue::Float(_) => &self.number,
            CellValue::Hyperlink(_) => &self.hyperlink,
            _ => base,
        }
        .clone()
    }

    pub fn set_border(&mut self, style: BorderStyle, color: Option<Color>) -> &mut Self {
        for handle in self.all() {
            handle.edit(|s| s.border = Border::all(style, color));
        }
        self
    }

    pub fn set_align(&mut self, horizontal: HorizontalAlign, vertical: VerticalAlign) -> &mut Self {
        for handle in self.all() {
            handle.edit(|s| {
                s.horizontal = horizontal;
                s.vertical = vertical;
            });
        }
        self
    }

    /// Background for data cells, and for the header too when `with_head`
    pub fn set_background_color(&mut self, color: Color, with_head: bool) -> &mut Self {
        for handle in self.all() {
            if with_head || !handle.ptr_eq(&self.head) {
                handle.edit(|s| s.fill = Some(color));
            }
        }
        self
    }

    /// Font for every style; `ignore_head` leaves the header font alone.
    /// Hyperlinks keep their underline and color.
    pub fn set_font(&mut self, font: Font, ignore_head: bool) -> &mut Self {
        for handle in self.all() {
            if ignore_head && handle.ptr_eq(&self.head) {
                continue;
            }
            if handle.ptr_eq(&self.hyperlink) {
                handle.edit(|s| {
                    s.font = Font {
                        underline: true,
                        color: s.font.color,
                        ..font.clone()
                    }
                });
            } else {
                handle.edit(|s| s.font = font.clone());
            }
        }
        self
    }

    pub fn set_wrap_text(&mut self) -> &mut Self {
        for handle in self.all() {
            handle.edit(|s| s.wrap_text = true);
        }
        self
    }
}

impl Default for StyleSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Hyperlink;
    use chrono::NaiveDate;

    #[test]
    fn test_style_precedence() {
        let set = StyleSet::new();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        assert!(set.for_value(&CellValue::from("x"), true).ptr_eq(set.head_style()));
        assert!(set.for_value(&CellValue::from("x"), false).ptr_eq(set.cell_style()));
        assert!(set.for_value(&CellValue::Int(1), false).ptr_eq(set.cell_style()));
        assert!(set.for_value(&CellValue::Float(1.5), false).ptr_eq(set.number_style()));
        assert!(set.for_value(&CellValue::Date(date), true).ptr_eq(set.date_style()));
        assert!(set
            .for_value(&CellValue::Hyperlink(Hyperlink::url("https://a.b")), false)
            .ptr_eq(set.hyperlink_style()));
    }

    #[test]
    fn test_defaults() {
        let set = StyleSet::new();
        assert_eq!(set.head_style().snapshot().fill, Some(Color::GREY_25_PERCENT));
        assert_eq!(set.number_style().snapshot().number_format.format_string(), "0.00");
        assert!(set.date_style().is_date_format());
        assert!(set.hyperlink_style().snapshot().font.underline);
        assert_eq!(
            set.cell_style().snapshot().border.left,
            BorderStyle::Thin
        );
    }

    #[test]
    fn test_bulk_mutation_reaches_shared_handles() {
        let mut set = StyleSet::new();
        let written = set.for_value(&CellValue::Int(1), false);

        set.set_background_color(Color::YELLOW, false);
        assert_eq!(written.snapshot().fill, Some(Color::YELLOW));
        assert_eq!(set.head_style().snapshot().fill, Some(Color::GREY_25_PERCENT));

        set.set_font(
            Font {
                bold: true,
                ..Font::default()
            },
            true,
        );
        assert!(written.snapshot().font.bold);
        assert!(!set.head_style().snapshot().font.bold);
        assert!(set.hyperlink_style().snapshot().font.underline);
    }
}
