//! Spreadsheet output - a single `Report` worksheet.
//!
//! Layout, top to bottom: title (and logo), summary block, financial block, then one
//! detail section per invoice status. Each section ends with a `SUM` formula over its
//! own rows, written with its cached result so readers that do not recalculate still
//! show the value.

use super::ReportContext;
use crate::{
    core::aggregation::InvoiceGroup,
    errors::Result,
    models::{ExpenseRecord, InvoiceStatus},
};
use rust_xlsxwriter::{Color, Format, Formula, Image, Url, Workbook, Worksheet, XlsxError};
use tracing::debug;

const MONEY: &str = "$#,##0.00";
const AMOUNT_COLUMN: u16 = 3;

struct Formats {
    plain: Format,
    title: Format,
    bold: Format,
    header: Format,
    money: Format,
    bold_money: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            plain: Format::new(),
            title: Format::new().set_bold().set_font_size(16),
            bold: Format::new().set_bold(),
            header: Format::new().set_bold().set_background_color(Color::RGB(0x00D9_E1F2)),
            money: Format::new().set_num_format(MONEY),
            bold_money: Format::new().set_bold().set_num_format(MONEY),
        }
    }
}

/// Builds the `.xlsx` workbook. `logo` is an image file's bytes.
pub fn build_spreadsheet(context: &ReportContext<'_>, logo: Option<&[u8]>) -> Result<Vec<u8>> {
    let formats = Formats::new();
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Report")?;
    for (column, width) in [(0, 24.0), (1, 14.0), (2, 42.0), (3, 14.0), (4, 16.0)] {
        sheet.set_column_width(column, width)?;
    }

    sheet.write_string_with_format(0, 0, context.label, &formats.title)?;
    if let Some(logo) = logo {
        let image = Image::new_from_buffer(logo)?;
        sheet.insert_image(0, 4, &image)?;
    }

    let mut row = 2;
    for (label, value) in context.summary_lines() {
        sheet.write_string_with_format(row, 0, label, &formats.bold)?;
        sheet.write_string(row, 1, value)?;
        row += 1;
    }

    row += 1;
    sheet.write_string_with_format(row, 0, "Financial summary", &formats.header)?;
    row += 1;
    for (label, amount, emphasised) in context.financial_lines() {
        let (label_format, amount_format) = if emphasised {
            (&formats.bold, &formats.bold_money)
        } else {
            (&formats.plain, &formats.money)
        };
        sheet.write_string_with_format(row, 0, label, label_format)?;
        sheet.write_number_with_format(row, AMOUNT_COLUMN, amount, amount_format)?;
        row += 1;
    }

    for status in [InvoiceStatus::WithReceipt, InvoiceStatus::WithoutReceipt] {
        row += 1;
        row = write_section(sheet, &formats, row, status, context.grouped.group(status))?;
    }

    let bytes = workbook.save_to_buffer()?;
    debug!("Spreadsheet built: {} bytes, {row} rows", bytes.len());
    Ok(bytes)
}

/// Writes one detail section and returns the row after it.
fn write_section(
    sheet: &mut Worksheet,
    formats: &Formats,
    mut row: u32,
    status: InvoiceStatus,
    group: Option<&InvoiceGroup>,
) -> std::result::Result<u32, XlsxError> {
    sheet.write_string_with_format(row, 0, status.label(), &formats.header)?;
    row += 1;
    for (column, title) in (0_u16..).zip(["Date", "Category", "Concept", "Amount", "Receipt"]) {
        sheet.write_string_with_format(row, column, title, &formats.bold)?;
    }
    row += 1;

    let records: Vec<&ExpenseRecord> = group.map(|g| g.records().collect()).unwrap_or_default();
    let first = row;
    for record in &records {
        sheet.write_string(row, 0, record.date.format("%Y-%m-%d").to_string())?;
        sheet.write_string(row, 1, record.category.as_str())?;
        sheet.write_string(row, 2, &record.concept)?;
        sheet.write_number_with_format(row, AMOUNT_COLUMN, record.amount, &formats.money)?;
        if let Some(url) = record.receipt() {
            sheet.write_url_with_text(row, 4, Url::new(url), "View receipt")?;
        }
        row += 1;
    }

    let subtotal = group.map_or(0.0, |g| g.subtotal);
    sheet.write_string_with_format(row, 2, "Subtotal", &formats.bold)?;
    if records.is_empty() {
        sheet.write_number_with_format(row, AMOUNT_COLUMN, 0.0, &formats.bold_money)?;
    } else {
        // Formula rows are 1-based.
        let formula = Formula::new(format!("=SUM(D{}:D{})", first + 1, row))
            .set_result(format!("{subtotal:.2}"));
        sheet.write_formula_with_format(row, AMOUNT_COLUMN, formula, &formats.bold_money)?;
    }
    Ok(row + 1)
}
