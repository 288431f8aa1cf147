//! Basic example of writing and reading back an Excel file

use excelkit::{get_reader, get_writer, CellRange, CellValue};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = "demos/output.xlsx";
    let mut writer = get_writer(path)?;

    // Title across the table, then aliased records
    writer.merge_region(CellRange::new(0, 0, 0, 2), Some("Staff".into()), None)?;
    writer.pass_current_row();
    writer
        .add_header_alias("id", "ID")
        .add_header_alias("name", "Name")
        .add_header_alias("salary", "Salary");

    writer.write_with_head(
        [
            vec![
                ("name", CellValue::from("Alice Johnson")),
                ("id", CellValue::Int(1)),
                ("salary", CellValue::Float(75000.5)),
            ],
            vec![
                ("name", CellValue::from("Bob Smith")),
                ("id", CellValue::Int(2)),
                ("salary", CellValue::Float(65000.0)),
            ],
        ],
        true,
    )?;

    writer.set_column_width(0, 5.0)?;
    writer.set_column_width(1, 20.0)?;
    writer.set_freeze_pane(0, 2)?;
    writer.close()?;
    println!("Excel file created successfully: {}", path);

    let mut reader = get_reader(path)?;
    reader
        .add_header_alias("ID", "id")
        .add_header_alias("Name", "name")
        .add_header_alias("Salary", "salary");
    for record in reader.read_records(1, 2, usize::MAX)? {
        println!("{:?}", record);
    }
    Ok(())
}
