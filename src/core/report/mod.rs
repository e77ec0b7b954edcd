//! Report compiler - turns a period of expenses into a spreadsheet and a PDF, zipped.
//!
//! Pipeline for [`ReportCompiler::compile`]:
//!
//! 1. filter the records to the period; an empty set stops here with `Ok(None)`
//! 2. compute the financial figures
//! 3. fetch the linked request's PDF and every receipt (failures become warnings)
//! 4. build the spreadsheet and the generated PDF pages, then merge the PDFs
//! 5. zip both outputs and write the archive to the output directory
//! 6. with a linked request, upload the archive and finalize the request
//! 7. archive every included record
//!
//! Steps 6 and 7 run as a saga: if archiving fails, the records already archived are
//! restored and the request goes back to its previous status and report URL.

pub mod archive;
pub mod document;
pub mod figures;
pub mod merge;
pub mod spreadsheet;

use self::figures::ReportFigures;
use super::{
    aggregation::{ExpenseFilter, GroupedExpenses, filter_expenses, group_expenses},
    saga::Saga,
};
use crate::{
    config::ReportConfig,
    errors::{Error, Result},
    hosting::{DocumentFetcher, FileHost, ResourceType, UploadRequest},
    models::{
        ExpenseId, ExpensePatch, ExpenseRecord, RequestPatch, RequestStatus, ResourceRequest,
    },
    store::RecordStore,
};
use chrono::NaiveDate;
use futures::future::join_all;
use lopdf::Document;
use std::path::PathBuf;
use tracing::{info, instrument, warn};

/// What to compile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportInput {
    /// First day included
    pub start_date: Option<NaiveDate>,
    /// Last day included
    pub end_date: Option<NaiveDate>,
    /// Request the report settles
    pub linked_request: Option<ResourceRequest>,
}

impl ReportInput {
    /// A report over an explicit period with no linked request.
    #[must_use]
    pub const fn period(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> Self {
        Self {
            start_date,
            end_date,
            linked_request: None,
        }
    }

    /// A report settling `request`, covering the request's own period.
    #[must_use]
    pub fn for_request(request: ResourceRequest) -> Self {
        Self {
            start_date: Some(request.start_date),
            end_date: Some(request.end_date),
            linked_request: Some(request),
        }
    }
}

/// Everything the output builders read.
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    /// Report title and file name prefix
    pub label: &'a str,
    /// First day included
    pub start_date: Option<NaiveDate>,
    /// Last day included
    pub end_date: Option<NaiveDate>,
    /// Request the report settles
    pub linked_request: Option<&'a ResourceRequest>,
    /// Summary figures
    pub figures: &'a ReportFigures,
    /// Grouped records
    pub grouped: &'a GroupedExpenses,
}

impl ReportContext<'_> {
    fn period_text(&self) -> String {
        let day = |date: Option<NaiveDate>| {
            date.map_or_else(|| "open".to_string(), |d| d.format("%Y-%m-%d").to_string())
        };
        format!("{} to {}", day(self.start_date), day(self.end_date))
    }

    /// Label/value pairs of the summary block.
    #[must_use]
    pub fn summary_lines(&self) -> Vec<(&'static str, String)> {
        let mut lines = Vec::new();
        if let Some(request) = self.linked_request {
            lines.push(("Requester", request.requester.clone()));
            lines.push(("Project", request.project.clone()));
        }
        lines.push(("Period", self.period_text()));
        lines
    }

    /// Label, amount and emphasis of each financial row.
    #[must_use]
    pub fn financial_lines(&self) -> Vec<(&'static str, f64, bool)> {
        let figures = self.figures;
        let mut lines = Vec::new();
        if let Some(received) = figures.received_amount {
            lines.push(("Received", received, false));
        }
        lines.push(("Invoiced (with receipt)", figures.sum_with_receipt, false));
        lines.push(("Not invoiced", figures.sum_without_receipt, false));
        lines.push(("Total spent", figures.grand_total, true));
        if let Some(balance) = figures.balance() {
            lines.push((balance.label(), balance.amount(), true));
        }
        lines
    }
}

/// Result of a successful compilation.
#[derive(Debug, Clone)]
pub struct CompiledReport {
    /// `<label> <latest date>`
    pub base_name: String,
    /// Where the archive was written
    pub archive_path: PathBuf,
    /// Zip archive holding the spreadsheet and the PDF
    pub archive: Vec<u8>,
    /// Hosted archive URL, when a request was linked
    pub uploaded_url: Option<String>,
    /// Summary figures
    pub figures: ReportFigures,
    /// Pages in the merged PDF
    pub page_count: usize,
    /// Records flagged as archived
    pub archived_ids: Vec<ExpenseId>,
    /// Degraded-output notes (unreadable receipts, missing logo, ...)
    pub warnings: Vec<String>,
}

/// Compiles reports against a store, a file host and a document fetcher.
pub struct ReportCompiler<'a> {
    store: &'a dyn RecordStore,
    host: &'a dyn FileHost,
    fetcher: &'a dyn DocumentFetcher,
    config: &'a ReportConfig,
}

impl<'a> ReportCompiler<'a> {
    /// Wires the compiler to its collaborators.
    #[must_use]
    pub fn new(
        store: &'a dyn RecordStore,
        host: &'a dyn FileHost,
        fetcher: &'a dyn DocumentFetcher,
        config: &'a ReportConfig,
    ) -> Self {
        Self {
            store,
            host,
            fetcher,
            config,
        }
    }

    /// Runs the whole pipeline over `records`.
    ///
    /// Archived records never count. Receipt and request documents that cannot be fetched
    /// or parsed are left out of the merged PDF and reported in
    /// [`CompiledReport::warnings`]; every other failure aborts the compilation. Once the
    /// archive is on disk, finalizing the linked request and archiving the records either
    /// both succeed or are both rolled back.
    ///
    /// # Arguments
    /// * `records` - Current expense snapshot; filtered to the input's period here
    /// * `input` - Period and optional request the report settles
    ///
    /// Returns `Ok(None)` without side effects when no record falls inside the period.
    #[instrument(skip(self, records, input), fields(records = records.len()))]
    pub async fn compile(
        &self,
        records: &[ExpenseRecord],
        input: &ReportInput,
    ) -> Result<Option<CompiledReport>> {
        let filter = ExpenseFilter::period(input.start_date, input.end_date);
        let included = filter_expenses(records, &filter);
        let Some(latest_date) = included.iter().map(|record| record.date).max() else {
            info!("No expenses in the selected period; nothing to compile");
            return Ok(None);
        };

        let grouped = group_expenses(&included);
        let linked_request = input.linked_request.as_ref();
        let figures = ReportFigures::compute(&included, linked_request);
        let mut warnings = Vec::new();

        let logo = self.load_logo(&mut warnings).await;
        let request_pdf = match linked_request {
            Some(request) => {
                self.fetch_pdf(
                    &request.request_document_url,
                    &format!("request {}", request.id),
                    &mut warnings,
                )
                .await
            }
            None => None,
        };
        let receipts = grouped.receipts_in_order();
        let receipt_pdfs = self.fetch_receipts(&receipts, &mut warnings).await;

        let context = ReportContext {
            label: &self.config.label,
            start_date: input.start_date,
            end_date: input.end_date,
            linked_request,
            figures: &figures,
            grouped: &grouped,
        };
        let xlsx = spreadsheet::build_spreadsheet(&context, logo.as_deref())?;
        let generated = merge::parse_pdf(&document::render_document(&context, &receipts)?)?;

        let mut parts: Vec<Document> = request_pdf.into_iter().collect();
        parts.push(generated);
        parts.extend(receipt_pdfs);
        let pdf = merge::merge_documents(parts)?;

        let base_name = archive::report_base_name(&self.config.label, latest_date);
        let zipped = archive::package(&base_name, &xlsx, &pdf.bytes)?;
        let archive_path = self.save_archive(&base_name, &zipped).await?;

        let mut saga = Saga::new("finalize report");
        let uploaded_url = match linked_request {
            Some(request) => Some(self.finalize_request(&mut saga, request, &zipped).await?),
            None => None,
        };
        let archived_ids = self.archive_records(&mut saga, &included).await?;
        saga.commit();

        info!(
            "Compiled '{base_name}': {} records, {} pages, {} warnings",
            archived_ids.len(),
            pdf.page_count,
            warnings.len()
        );
        Ok(Some(CompiledReport {
            base_name,
            archive_path,
            archive: zipped,
            uploaded_url,
            figures,
            page_count: pdf.page_count,
            archived_ids,
            warnings,
        }))
    }

    async fn load_logo(&self, warnings: &mut Vec<String>) -> Option<Vec<u8>> {
        let path = self.config.logo_path.as_ref()?;
        match tokio::fs::read(path).await {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                let message = format!("Logo {} could not be read: {err}", path.display());
                warn!("{message}");
                warnings.push(message);
                None
            }
        }
    }

    async fn fetch_pdf(
        &self,
        url: &str,
        what: &str,
        warnings: &mut Vec<String>,
    ) -> Option<Document> {
        let parsed = match self.fetcher.fetch(url).await {
            Ok(bytes) => merge::parse_pdf(&bytes),
            Err(err) => Err(err),
        };
        match parsed {
            Ok(document) => Some(document),
            Err(err) => {
                let message = format!("Skipped {what}: {err}");
                warn!("{message}");
                warnings.push(message);
                None
            }
        }
    }

    async fn fetch_receipts(
        &self,
        receipts: &[&ExpenseRecord],
        warnings: &mut Vec<String>,
    ) -> Vec<Document> {
        let downloads = join_all(
            receipts
                .iter()
                .map(|record| self.fetcher.fetch(record.receipt().unwrap_or_default())),
        )
        .await;

        let mut documents = Vec::with_capacity(receipts.len());
        for (record, download) in receipts.iter().zip(downloads) {
            match download.and_then(|bytes| merge::parse_pdf(&bytes)) {
                Ok(document) => documents.push(document),
                Err(err) => {
                    let message = format!(
                        "Skipped receipt of '{}' ({}): {err}",
                        record.concept, record.date
                    );
                    warn!("{message}");
                    warnings.push(message);
                }
            }
        }
        documents
    }

    async fn save_archive(&self, base_name: &str, archive: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        let path = self.config.output_dir.join(format!("{base_name}.zip"));
        tokio::fs::write(&path, archive).await?;
        info!("Report archive written to {}", path.display());
        Ok(path)
    }

    async fn finalize_request(
        &self,
        saga: &mut Saga<'a>,
        request: &ResourceRequest,
        archive: &[u8],
    ) -> Result<String> {
        let id = request.id;
        let upload = UploadRequest::from_bytes(
            archive.to_vec(),
            format!("report_request_{id}.zip"),
            ResourceType::Raw,
        )?
        .with_target_name(format!("report_request_{id}"));
        let uploaded = saga.run(self.host.upload(upload)).await?;
        let url = uploaded.url;
        let orphan = url.clone();
        saga.on_failure(format!("upload report of request {id}"), move || async move {
            warn!("Uploaded report {orphan} is left on the host");
            Ok(())
        });

        let store = self.store;
        saga.run(store.update_request(
            id,
            RequestPatch {
                status: Some(RequestStatus::Finalized),
                report_document_url: Some(Some(url.clone())),
            },
        ))
        .await?;
        let previous = RequestPatch {
            status: Some(request.status),
            report_document_url: Some(request.report_document_url.clone()),
        };
        saga.on_failure(format!("finalize request {id}"), move || {
            store.update_request(id, previous)
        });
        info!("Request {id} finalized with report {url}");
        Ok(url)
    }

    async fn archive_records(
        &self,
        saga: &mut Saga<'a>,
        included: &[ExpenseRecord],
    ) -> Result<Vec<ExpenseId>> {
        let store = self.store;
        let results = join_all(
            included
                .iter()
                .map(|record| store.update_expense(record.id, ExpensePatch::archived(true))),
        )
        .await;

        let mut archived = Vec::with_capacity(included.len());
        let mut failure: Option<Error> = None;
        for (record, result) in included.iter().zip(results) {
            match result {
                Ok(()) => {
                    let id = record.id;
                    archived.push(id);
                    saga.on_failure(format!("archive expense {id}"), move || {
                        store.update_expense(id, ExpensePatch::archived(false))
                    });
                }
                Err(err) => {
                    warn!("Could not archive expense {}: {err}", record.id);
                    failure.get_or_insert(err);
                }
            }
        }

        match failure {
            Some(err) => saga.fail(err).await,
            None => Ok(archived),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::models::{Category, NewExpense, NewResourceRequest};
    use crate::store::SeaOrmStore;
    use crate::test_utils::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    const LUNCH_URL: &str = "https://files.test/receipts/lunch.pdf";
    const HOTEL_URL: &str = "https://files.test/receipts/hotel.pdf";
    const REQUEST_URL: &str = "https://files.test/requests/request_1.pdf";

    fn report_config(dir: &TempDir) -> ReportConfig {
        ReportConfig {
            output_dir: dir.path().join("reports"),
            ..ReportConfig::default()
        }
    }

    async fn add_expense(
        store: &SeaOrmStore,
        day: &str,
        concept: &str,
        amount: f64,
        receipt: Option<&str>,
    ) -> Result<ExpenseId> {
        store
            .create_expense(NewExpense {
                receipt_url: receipt.map(str::to_string),
                ..new_expense(day, concept, amount, Category::Other)
            })
            .await
    }

    async fn linked_request(store: &SeaOrmStore) -> Result<ResourceRequest> {
        let id = store
            .create_request(NewResourceRequest {
                request_document_url: REQUEST_URL.to_string(),
                ..new_request("2024-03-01", "2024-03-03")
            })
            .await?;
        Ok(store.get_request(id).await?.unwrap())
    }

    #[tokio::test]
    async fn test_empty_period_is_a_no_op() -> Result<()> {
        let store = setup_test_store().await?;
        add_expense(&store, "2024-01-15", "Old taxi", 10.0, None).await?;
        let host = FakeFileHost::default();
        let fetcher = FakeFetcher::default();
        let dir = TempDir::new()?;
        let config = report_config(&dir);

        let compiler = ReportCompiler::new(&store, &host, &fetcher, &config);
        let input = ReportInput::period(Some(date("2024-03-01")), Some(date("2024-03-31")));
        let report = compiler.compile(&store.list_expenses().await?, &input).await?;

        assert!(report.is_none());
        assert!(host.uploads().is_empty());
        assert!(store.list_expenses().await?.iter().all(|r| !r.archived));
        assert!(!config.output_dir.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_compile_without_request() -> Result<()> {
        init_test_tracing();
        let store = setup_test_store().await?;
        add_expense(&store, "2024-03-02", "Lunch", 20.0, Some(LUNCH_URL)).await?;
        add_expense(&store, "2024-03-01", "Taxi", 100.0, None).await?;
        add_expense(&store, "2024-04-01", "Later", 7.0, None).await?;
        let host = FakeFileHost::default();
        let fetcher = FakeFetcher::default().with(LUNCH_URL, sample_pdf(2, "lunch"));
        let dir = TempDir::new()?;
        let config = report_config(&dir);

        let compiler = ReportCompiler::new(&store, &host, &fetcher, &config);
        let input = ReportInput::period(Some(date("2024-03-01")), Some(date("2024-03-31")));
        let report = compiler
            .compile(&store.list_expenses().await?, &input)
            .await?
            .unwrap();

        assert_eq!(report.base_name, "Expense Report 2024-03-02");
        assert_eq!(report.figures.grand_total, 120.0);
        assert!(report.warnings.is_empty());
        // cover + detail + index + two receipt pages
        assert_eq!(report.page_count, 5);
        assert_eq!(report.uploaded_url, None);
        assert!(host.uploads().is_empty());

        let archive = zip::ZipArchive::new(Cursor::new(report.archive.clone()))?;
        assert_eq!(archive.len(), 2);
        let on_disk = tokio::fs::read(&report.archive_path).await?;
        assert_eq!(on_disk, report.archive);
        assert!(report.archive_path.ends_with("Expense Report 2024-03-02.zip"));

        let records = store.list_expenses().await?;
        assert_eq!(report.archived_ids.len(), 2);
        for record in &records {
            assert_eq!(record.archived, record.concept != "Later");
        }

        let again = compiler.compile(&records, &input).await?;
        assert!(again.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_settled_request_is_finalized() -> Result<()> {
        let store = setup_test_store().await?;
        let request = linked_request(&store).await?;
        add_expense(&store, "2024-03-02", "Hotel", 3900.0, Some(HOTEL_URL)).await?;
        let host = FakeFileHost::default();
        let fetcher = FakeFetcher::default()
            .with(REQUEST_URL, sample_pdf(1, "request"))
            .with(HOTEL_URL, sample_pdf(1, "hotel"));
        let dir = TempDir::new()?;
        let config = report_config(&dir);

        let compiler = ReportCompiler::new(&store, &host, &fetcher, &config);
        let report = compiler
            .compile(
                &store.list_expenses().await?,
                &ReportInput::for_request(request.clone()),
            )
            .await?
            .unwrap();

        assert_eq!(report.figures.received_amount, Some(3900.0));
        assert_eq!(report.figures.reimburse_to_person, 0.0);
        assert_eq!(report.figures.refund_to_org, 0.0);
        // request + cover + detail + index + receipt
        assert_eq!(report.page_count, 5);

        let uploads = host.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(
            uploads[0].target_name.as_deref(),
            Some(format!("report_request_{}", request.id).as_str())
        );
        assert_eq!(uploads[0].resource_type, ResourceType::Raw);

        let stored = store.get_request(request.id).await?.unwrap();
        assert_eq!(stored.status, RequestStatus::Finalized);
        assert_eq!(stored.report_document_url, report.uploaded_url);

        Ok(())
    }

    #[tokio::test]
    async fn test_unfetchable_documents_degrade_to_warnings() -> Result<()> {
        let store = setup_test_store().await?;
        let request = linked_request(&store).await?;
        add_expense(&store, "2024-03-01", "Lunch", 20.0, Some(LUNCH_URL)).await?;
        add_expense(&store, "2024-03-02", "Hotel", 80.0, Some(HOTEL_URL)).await?;
        let host = FakeFileHost::default();
        let fetcher = FakeFetcher::default()
            .with(REQUEST_URL, b"not a pdf".to_vec())
            .with(LUNCH_URL, sample_pdf(1, "lunch"));
        let dir = TempDir::new()?;
        let config = report_config(&dir);

        let compiler = ReportCompiler::new(&store, &host, &fetcher, &config);
        let report = compiler
            .compile(
                &store.list_expenses().await?,
                &ReportInput::for_request(request),
            )
            .await?
            .unwrap();

        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings.iter().any(|w| w.contains("Hotel")));
        // cover + detail + index (both receipts listed) + the one readable receipt
        assert_eq!(report.page_count, 4);
        assert_eq!(report.archived_ids.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_failed_archiving_restores_records_and_request() -> Result<()> {
        let inner = setup_test_store().await?;
        let request = linked_request(&inner).await?;
        add_expense(&inner, "2024-03-01", "Taxi", 10.0, None).await?;
        let failing = add_expense(&inner, "2024-03-02", "Bus", 5.0, None).await?;
        add_expense(&inner, "2024-03-03", "Metro", 2.0, None).await?;
        let store = FlakyStore::new(inner).fail_updates_of(failing);
        let host = FakeFileHost::default();
        let fetcher = FakeFetcher::default().with(REQUEST_URL, sample_pdf(1, "request"));
        let dir = TempDir::new()?;
        let config = report_config(&dir);

        let compiler = ReportCompiler::new(&store, &host, &fetcher, &config);
        let result = compiler
            .compile(
                &store.list_expenses().await?,
                &ReportInput::for_request(request.clone()),
            )
            .await;

        assert!(result.is_err());
        assert!(store.list_expenses().await?.iter().all(|r| !r.archived));
        let stored = store.get_request(request.id).await?.unwrap();
        assert_eq!(stored.status, RequestStatus::Sent);
        assert_eq!(stored.report_document_url, None);

        Ok(())
    }
}
