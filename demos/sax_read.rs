//! Stream rows out of a workbook without loading it
//!
//! Usage: cargo run --example sax_read -- <file.xlsx>

use excelkit::{read_by_sax, CellValue, RowHandler, SheetSelector};

#[derive(Default)]
struct Summary {
    rows: usize,
    numbers: usize,
    total: f64,
}

impl RowHandler for Summary {
    fn handle(&mut self, _sheet_index: usize, _row_index: usize, row: &[CellValue]) {
        self.rows += 1;
        for value in row {
            if let Some(n) = value.as_f64() {
                self.numbers += 1;
                self.total += n;
            }
        }
    }

    fn done_all(&mut self) {
        println!("done");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/streaming_output.xlsx".to_string());

    let summary = read_by_sax(&path, SheetSelector::All, Summary::default())?;
    println!(
        "{} rows, {} numeric cells, sum {}",
        summary.rows, summary.numbers, summary.total
    );
    Ok(())
}
