//! Write a large sheet with a bounded row window

use std::time::Instant;

use excelkit::{get_big_writer, CellValue};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = "demos/streaming_output.xlsx";
    let rows = 200_000i64;
    let start = Instant::now();

    let mut writer = get_big_writer(path)?;
    writer.track_all_columns()?;
    writer.write_head_row(["ID", "Name", "Score", "Active"])?;
    for i in 0..rows {
        writer.write_row([
            CellValue::Int(i),
            CellValue::String(format!("user_{}", i)),
            CellValue::Float(i as f64 * 0.25),
            CellValue::Bool(i % 3 == 0),
        ])?;
    }
    writer.autosize_column_all()?;
    writer.close()?;

    println!("Wrote {} rows to {} in {:?}", rows, path, start.elapsed());
    Ok(())
}
