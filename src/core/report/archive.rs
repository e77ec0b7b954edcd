use crate::errors::Result;
use chrono::NaiveDate;
use std::io::{Cursor, Write};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

/// File stem shared by every output, e.g. `Expense Report 2024-03-31`.
#[must_use]
pub fn report_base_name(label: &str, latest_date: NaiveDate) -> String {
    format!("{label} {}", latest_date.format("%Y-%m-%d"))
}

/// Packs the spreadsheet and the document into one deflated zip.
pub fn package(base_name: &str, spreadsheet: &[u8], document: &[u8]) -> Result<Vec<u8>> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    writer.start_file(format!("{base_name}.xlsx"), options)?;
    writer.write_all(spreadsheet)?;
    writer.start_file(format!("{base_name}.pdf"), options)?;
    writer.write_all(document)?;

    Ok(writer.finish()?.into_inner())
}
