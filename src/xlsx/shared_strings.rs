//! Shared strings table for string deduplication

use indexmap::IndexSet;
use std::io::Write;

use super::xml_writer::XmlWriter;
use crate::error::Result;

/// Shared strings table that deduplicates strings across the workbook
#[derive(Debug, Default)]
pub struct SharedStrings {
    strings: IndexSet<String>,
    /// Total references, including repeats
    count: usize,
}

impl SharedStrings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a string and get its index
    pub fn add_string(&mut self, s: &str) -> usize {
        self.count += 1;
        if let Some(index) = self.strings.get_index_of(s) {
            return index;
        }
        self.strings.insert_full(s.to_string()).0
    }

    pub fn unique_count(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Write `xl/sharedStrings.xml`
    pub fn write_xml<W: Write>(&self, writer: &mut XmlWriter<W>) -> Result<()> {
        writer.declaration()?;
        writer.start_element("sst")?;
        writer.attribute(
            "xmlns",
            "http://schemas.openxmlformats.org/spreadsheetml/2006/main",
        )?;
        writer.attribute_int("count", self.count)?;
        writer.attribute_int("uniqueCount", self.strings.len())?;
        writer.close_start_tag()?;

        for s in &self.strings {
            writer.write_str("<si>")?;
            writer.text_element("t", s)?;
            writer.write_str("</si>")?;
        }

        writer.end_element("sst")?;
        writer.flush()
    }
}
