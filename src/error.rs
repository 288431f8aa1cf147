//! Error types for excelkit

use thiserror::Error;

/// Result type alias for excelkit operations
pub type Result<T> = std::result::Result<T, ExcelError>;

/// Main error type for all workbook operations
#[derive(Error, Debug)]
pub enum ExcelError {
    /// Error occurred while reading a workbook
    #[error("Failed to read workbook: {0}")]
    ReadError(String),

    /// Sheet name or index did not resolve
    #[error("Sheet '{sheet}' not found. Available sheets: {available}")]
    SheetNotFound { sheet: String, available: String },

    /// Invalid cell reference such as `"1A"` or `""`
    #[error("Invalid cell reference: {0}")]
    InvalidCell(String),

    /// Malformed package part
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// IO error wrapper
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Zip container error
    #[error("Zip error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    /// XML part could not be parsed
    #[error("XML error in {part}: {message}")]
    XmlError { part: String, message: String },

    /// Calamine error wrapper (legacy .xls input)
    #[error("Calamine error: {0}")]
    CalamineError(String),

    /// Operation is not available for this kind of workbook
    #[error("Unsupported workbook: {0}")]
    Unsupported(String),

    /// An optional backend was compiled out
    #[error("Feature `{feature}` is disabled: {hint}")]
    FeatureDisabled {
        feature: &'static str,
        hint: &'static str,
    },

    /// Flush without a destination file
    #[error("No destination file configured for this writer")]
    MissingDestination,

    /// Row already spilled out of the streaming window
    #[error("Row {row} has already been flushed to disk and cannot be accessed")]
    RowAlreadyFlushed { row: usize },

    /// A merged region would overlap an existing one
    #[error("Merged region {new} overlaps existing region {existing}")]
    OverlappingMergedRegion { new: String, existing: String },

    /// Index outside the populated rows of a sheet
    #[error("Index {index} out of bounds, sheet rows span {first}..={last}")]
    IndexOutOfBounds {
        index: usize,
        first: usize,
        last: usize,
    },

    /// Auto-sizing requested for a column that is not tracked
    #[error("Column {0} is not tracked for auto-sizing")]
    ColumnNotTracked(usize),
}

impl ExcelError {
    pub(crate) fn xml(part: &str, err: impl std::fmt::Display) -> Self {
        ExcelError::XmlError {
            part: part.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "xls")]
impl From<calamine::Error> for ExcelError {
    fn from(err: calamine::Error) -> Self {
        ExcelError::CalamineError(err.to_string())
    }
}

#[cfg(feature = "xls")]
impl From<calamine::XlsError> for ExcelError {
    fn from(err: calamine::XlsError) -> Self {
        ExcelError::CalamineError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ExcelError::SheetNotFound {
            sheet: "Data".to_string(),
            available: "Sheet1, Sheet2".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Sheet 'Data' not found. Available sheets: Sheet1, Sheet2"
        );

        let err = ExcelError::IndexOutOfBounds {
            index: 9,
            first: 0,
            last: 3,
        };
        assert!(err.to_string().contains("9"));

        let err = ExcelError::InvalidCell("XFE1".to_string());
        assert_eq!(err.to_string(), "Invalid cell reference: XFE1");
    }

    #[test]
    fn test_write_failures_surface_as_io() {
        let mut writer = crate::ExcelWriter::new();
        writer.set_dest("/nonexistent/dir/out.xlsx");
        writer.write_row(["a"]).unwrap();
        assert!(matches!(writer.flush(), Err(ExcelError::IoError(_))));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ExcelError = io.into();
        assert!(matches!(err, ExcelError::IoError(_)));
    }
}
