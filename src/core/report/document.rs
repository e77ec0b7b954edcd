//! Paginated report pages: cover, grouped detail listing and receipt index.
//!
//! Only the generated pages live here; the linked request and receipt documents are
//! spliced around them by [`super::merge`].

use super::ReportContext;
use crate::{
    core::pdf::PdfWriter,
    errors::Result,
    models::{ExpenseRecord, format_usd},
};

/// Renders the generated pages. `receipts` feeds the index page and is skipped when
/// empty.
pub fn render_document(context: &ReportContext<'_>, receipts: &[&ExpenseRecord]) -> Result<Vec<u8>> {
    let mut pdf = PdfWriter::new(context.label)?;
    cover_page(&mut pdf, context);

    pdf.new_page();
    detail_listing(&mut pdf, context);

    if !receipts.is_empty() {
        pdf.new_page();
        receipt_index(&mut pdf, receipts);
    }
    pdf.finish()
}

fn cover_page(pdf: &mut PdfWriter, context: &ReportContext<'_>) {
    pdf.gap(20.0);
    pdf.title(context.label, 26.0);
    pdf.gap(12.0);
    for (label, value) in context.summary_lines() {
        pdf.row(0.0, &format!("{label}:"), &value, 12.0, false);
    }

    pdf.gap(10.0);
    pdf.text(0.0, "Financial summary", 14.0, true);
    pdf.gap(2.0);
    for (label, amount, emphasised) in context.financial_lines() {
        pdf.row(4.0, label, &format_usd(amount), 12.0, emphasised);
    }
}

fn detail_listing(pdf: &mut PdfWriter, context: &ReportContext<'_>) {
    pdf.text(0.0, "Expense detail", 16.0, true);
    pdf.gap(4.0);

    let mut running_total = 0.0;
    for group in &context.grouped.groups {
        pdf.gap(3.0);
        pdf.row(0.0, group.status.label(), &format_usd(group.subtotal), 13.0, true);
        for category in &group.categories {
            pdf.row(5.0, category.category.as_str(), &format_usd(category.subtotal), 11.0, true);
            for date in &category.dates {
                pdf.row(
                    10.0,
                    &date.date.format("%Y-%m-%d").to_string(),
                    &format_usd(date.subtotal),
                    10.0,
                    false,
                );
                for record in &date.records {
                    running_total += record.amount;
                    pdf.row(15.0, &record.concept, &format_usd(record.amount), 9.0, false);
                }
            }
        }
    }

    pdf.gap(6.0);
    pdf.row(0.0, "Grand total", &format_usd(running_total), 13.0, true);
}

fn receipt_index(pdf: &mut PdfWriter, receipts: &[&ExpenseRecord]) {
    pdf.text(0.0, "Receipt index", 16.0, true);
    pdf.gap(4.0);
    for (position, record) in receipts.iter().enumerate() {
        pdf.row(
            0.0,
            &format!("{}. {}", position + 1, record.concept),
            &record.date.format("%Y-%m-%d").to_string(),
            10.0,
            false,
        );
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::aggregation::group_expenses;
    use crate::core::report::figures::ReportFigures;
    use crate::errors::Error;
    use crate::models::Category;
    use crate::test_utils::*;

    fn page_count(bytes: &[u8]) -> usize {
        lopdf::Document::load_mem(bytes)
            .map_err(Error::pdf)
            .unwrap()
            .get_pages()
            .len()
    }

    #[test]
    fn test_index_page_only_with_receipts() -> Result<()> {
        let mut lunch = record(1, "2024-03-02", "Lunch", 20.0, Category::Food);
        lunch.receipt_url = Some("https://files/lunch.pdf".to_string());
        let records = vec![lunch, record(2, "2024-03-01", "Taxi", 100.0, Category::Transport)];
        let grouped = group_expenses(&records);
        let figures = ReportFigures::compute(&records, None);
        let context = ReportContext {
            label: "Expense Report",
            start_date: None,
            end_date: None,
            linked_request: None,
            figures: &figures,
            grouped: &grouped,
        };

        let with_index = render_document(&context, &grouped.receipts_in_order())?;
        assert_eq!(page_count(&with_index), 3);

        let without_index = render_document(&context, &[])?;
        assert_eq!(page_count(&without_index), 2);
        Ok(())
    }

    #[test]
    fn test_long_listing_spans_pages() -> Result<()> {
        let records: Vec<_> = (1..=120)
            .map(|i| record(i, "2024-03-01", &format!("Item {i}"), 1.0, Category::Other))
            .collect();
        let grouped = group_expenses(&records);
        let figures = ReportFigures::compute(&records, None);
        let context = ReportContext {
            label: "Expense Report",
            start_date: None,
            end_date: None,
            linked_request: None,
            figures: &figures,
            grouped: &grouped,
        };

        let bytes = render_document(&context, &[])?;
        assert!(page_count(&bytes) > 3);
        Ok(())
    }
}
