//! # excelkit
//!
//! Reading and writing Excel workbooks through typed host values.
//!
//! ## Features
//!
//! - **Typed cells**: stored cells coerce to [`CellValue`] with date, integer
//!   and merged-region handling
//! - **Header aliases**: records keyed by field names map onto display headers
//! - **Streaming write**: [`BigExcelWriter`] keeps a bounded row window and
//!   spills older rows to temp files
//! - **Streaming read**: [`SaxReader`] hands rows to a callback as they are
//!   parsed
//! - **Formats**: `.xlsx` read and write, `.xls` read (feature `xls`)
//!
//! ## Quick Start
//!
//! ### Writing
//!
//! ```rust,no_run
//! use excelkit::{get_writer, CellValue};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut writer = get_writer("people.xlsx")?;
//! writer.write_head_row(["Name", "Age"])?;
//! writer.write_row([CellValue::from("Alice"), CellValue::Int(30)])?;
//! writer.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading
//!
//! ```rust,no_run
//! use excelkit::get_reader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = get_reader("people.xlsx")?;
//! for row in reader.read() {
//!     println!("{:?}", row);
//! }
//! for record in reader.read_all()? {
//!     println!("{:?}", record.get("Name"));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading very large files
//!
//! ```rust,no_run
//! use excelkit::{read_by_sax, CellValue, SheetSelector};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut total = 0.0;
//! read_by_sax("big.xlsx", SheetSelector::First, |_: usize, row: usize, values: &[CellValue]| {
//!     if row > 0 {
//!         total += values.get(1).and_then(CellValue::as_f64).unwrap_or(0.0);
//!     }
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod alias;
pub mod book;
pub mod coerce;
pub mod error;
pub mod reader;
pub mod row;
pub mod streaming_reader;
pub mod streaming_writer;
pub mod style_set;
pub mod types;
pub mod writer;

#[cfg(feature = "xls")]
mod legacy;
pub(crate) mod xlsx;

use std::path::Path;

pub use alias::{HeaderAlias, IntoRecord, Record};
pub use book::{Cell, CellRange, CellStyle, CellType, Sheet, StyleHandle, Workbook};
pub use coerce::{CellEditor, TrimEditor};
pub use error::{ExcelError, Result};
pub use reader::ExcelReader;
pub use streaming_reader::{RowHandler, SaxReader, SheetSelector};
pub use streaming_writer::BigExcelWriter;
pub use style_set::StyleSet;
pub use types::{CellLocation, CellValue};
pub use writer::{ExcelWriter, ExcelWriterBuilder};

#[cfg(not(feature = "xls"))]
pub(crate) fn legacy_disabled() -> ExcelError {
    ExcelError::FeatureDisabled {
        feature: "xls",
        hint: "enable the `xls` feature of excelkit to read .xls workbooks",
    }
}

/// Reader over the first sheet of an `.xlsx` or `.xls` file
pub fn get_reader<P: AsRef<Path>>(path: P) -> Result<ExcelReader> {
    ExcelReader::open(path)
}

/// Writer saving to `path` on close; an existing `.xlsx` file is loaded
/// and extended. `.xls` destinations are refused.
pub fn get_writer<P: AsRef<Path>>(path: P) -> Result<ExcelWriter> {
    ExcelWriter::create(path)
}

/// Streaming writer saving to `path` on close
pub fn get_big_writer<P: AsRef<Path>>(path: P) -> Result<BigExcelWriter> {
    BigExcelWriter::create(path)
}

/// Stream the rows of the selected sheets into `handler`, returning it
/// once every row was seen
pub fn read_by_sax<P, H>(path: P, selector: SheetSelector, handler: H) -> Result<H>
where
    P: AsRef<Path>,
    H: RowHandler,
{
    let mut reader = SaxReader::new(handler);
    reader.read_path(path, selector)?;
    Ok(reader.into_handler())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_selectors_and_locations() {
        assert!(matches!(
            SheetSelector::from("rId2"),
            SheetSelector::RelationId(id) if id == "rId2"
        ));
        assert!(matches!(
            SheetSelector::from("Data"),
            SheetSelector::Name(n) if n == "Data"
        ));
        assert!(matches!(SheetSelector::from(3usize), SheetSelector::Index(3)));
        assert_eq!(CellLocation::new(27, 9).reference(), "AB10");
        assert_eq!(CellRange::parse("A1:B2").unwrap(), CellRange::new(0, 1, 0, 1));
    }

    #[test]
    fn test_facade_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facade.xlsx");

        let mut writer = get_writer(&path).unwrap();
        writer.write_row(["x", "y"]).unwrap();
        writer.write_row([CellValue::Int(1), CellValue::Float(2.5)]).unwrap();
        writer.close().unwrap();

        let reader = get_reader(&path).unwrap();
        assert_eq!(reader.read().len(), 2);

        let mut rows = Vec::new();
        read_by_sax(&path, SheetSelector::All, |_: usize, _: usize, row: &[CellValue]| {
            rows.push(row.to_vec())
        })
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec![CellValue::Int(1), CellValue::Float(2.5)]);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            get_reader("/nonexistent/missing.xlsx"),
            Err(ExcelError::IoError(_))
        ));
    }
}
