//! Shared test utilities for `ExpenseBuddy`.
//!
//! This module provides the in-memory store setup, record builders with sensible
//! defaults, and in-process fakes for the file host, the document fetcher and a store
//! that fails on demand.

#![allow(clippy::unwrap_used)]

use crate::{
    core::{pdf::PdfWriter, resource_request::compute_request},
    errors::{Error, Result},
    hosting::{DocumentFetcher, FileHost, UploadRequest, UploadedFile},
    models::{
        Category, ExpenseId, ExpensePatch, ExpenseRecord, NewExpense, NewResourceRequest,
        RequestId, RequestPatch, RequestStatus, ResourceRequest,
    },
    store::{RecordStore, SeaOrmStore, SortDirection, Subscription},
};
use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use sea_orm::{DatabaseConnection, DbErr};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Creates an in-memory `SQLite` database with all tables initialized.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a record store over a fresh in-memory database.
/// This is the standard setup for store-backed tests.
pub async fn setup_test_store() -> Result<SeaOrmStore> {
    SeaOrmStore::new(setup_test_db().await?).await
}

/// Installs a debug-level subscriber writing to the test output. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Parses a `YYYY-MM-DD` literal.
pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

/// A new expense without receipt.
pub fn new_expense(day: &str, concept: &str, amount: f64, category: Category) -> NewExpense {
    NewExpense {
        date: date(day),
        concept: concept.to_string(),
        amount,
        category,
        receipt_url: None,
    }
}

/// A new `Sent` request with per-diem totals for the range.
///
/// # Defaults
/// * requester: `"Test Requester"`
/// * project: `"Test Project"`
pub fn new_request(start: &str, end: &str) -> NewResourceRequest {
    let totals = compute_request(date(start), date(end));
    NewResourceRequest {
        requester: "Test Requester".to_string(),
        project: "Test Project".to_string(),
        start_date: date(start),
        end_date: date(end),
        day_count: totals.day_count,
        transport_total: totals.transport_total,
        food_total: totals.food_total,
        request_document_url: format!("https://files.test/requests/request_{start}_{end}.pdf"),
        status: RequestStatus::Sent,
    }
}

/// A stored expense built in memory, for pure-function tests.
pub fn record(
    id: ExpenseId,
    day: &str,
    concept: &str,
    amount: f64,
    category: Category,
) -> ExpenseRecord {
    ExpenseRecord {
        id,
        date: date(day),
        concept: concept.to_string(),
        amount,
        category,
        receipt_url: None,
        created_at: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
        linked_tip_id: None,
        archived: false,
    }
}

/// A stored request built in memory with the given requested total.
pub fn request_record(id: RequestId, requested_total: f64) -> ResourceRequest {
    ResourceRequest {
        id,
        requester: "Test Requester".to_string(),
        project: "Test Project".to_string(),
        start_date: date("2024-03-01"),
        end_date: date("2024-03-03"),
        day_count: 3,
        transport_total: requested_total / 2.0,
        food_total: requested_total / 2.0,
        requested_total,
        request_document_url: "https://files.test/requests/request.pdf".to_string(),
        status: RequestStatus::Sent,
        report_document_url: None,
        created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    }
}

/// A valid PDF with `pages` pages of text.
pub fn sample_pdf(pages: usize, label: &str) -> Vec<u8> {
    let mut pdf = PdfWriter::new(label).unwrap();
    for page in 1..=pages {
        if page > 1 {
            pdf.new_page();
        }
        pdf.text(0.0, &format!("{label} page {page}"), 12.0, false);
    }
    pdf.finish().unwrap()
}

/// File host that records uploads instead of sending them.
#[derive(Debug, Default)]
pub struct FakeFileHost {
    uploads: Mutex<Vec<UploadRequest>>,
    failure: Option<String>,
}

impl FakeFileHost {
    /// A host that rejects every upload with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            uploads: Mutex::default(),
            failure: Some(message.to_string()),
        }
    }

    /// Every accepted upload, in order.
    pub fn uploads(&self) -> Vec<UploadRequest> {
        self.uploads.lock().unwrap().clone()
    }

    /// The URL this host hands out for `request`.
    pub fn url_for(&self, request: &UploadRequest) -> String {
        let name = request.target_name.as_ref().unwrap_or(&request.file_name);
        match &request.folder {
            Some(folder) => format!("https://files.test/{folder}/{name}"),
            None => format!("https://files.test/{name}"),
        }
    }
}

#[async_trait]
impl FileHost for FakeFileHost {
    async fn upload(&self, request: UploadRequest) -> Result<UploadedFile> {
        if let Some(message) = &self.failure {
            return Err(Error::Upload {
                message: message.clone(),
            });
        }
        let url = self.url_for(&request);
        self.uploads.lock().unwrap().push(request);
        Ok(UploadedFile { url })
    }
}

/// Document fetcher serving canned bodies; unknown URLs fail.
#[derive(Debug, Default)]
pub struct FakeFetcher {
    documents: HashMap<String, Vec<u8>>,
}

impl FakeFetcher {
    /// Serves `body` for `url`.
    pub fn with(mut self, url: &str, body: Vec<u8>) -> Self {
        self.documents.insert(url.to_string(), body);
        self
    }
}

#[async_trait]
impl DocumentFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.documents.get(url).cloned().ok_or_else(|| Error::Fetch {
            url: url.to_string(),
            message: "server answered 404 Not Found".to_string(),
        })
    }
}

/// Expense write operations a [`FlakyStore`] can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// `create_expense`
    Create,
    /// `update_expense`
    Update,
    /// `delete_expense`
    Delete,
}

/// Store wrapper that injects database errors into expense writes.
pub struct FlakyStore {
    inner: SeaOrmStore,
    fail_nth: Option<(StoreOp, usize)>,
    fail_updates_of: Option<ExpenseId>,
    calls: Mutex<HashMap<StoreOp, usize>>,
}

impl FlakyStore {
    /// Wraps `inner` without any failure configured.
    pub fn new(inner: SeaOrmStore) -> Self {
        Self {
            inner,
            fail_nth: None,
            fail_updates_of: None,
            calls: Mutex::default(),
        }
    }

    /// Fails the `nth` call (1-based) of `op`; every other call goes through.
    pub fn fail_nth(mut self, op: StoreOp, nth: usize) -> Self {
        self.fail_nth = Some((op, nth));
        self
    }

    /// Fails every update of expense `id`.
    pub fn fail_updates_of(mut self, id: ExpenseId) -> Self {
        self.fail_updates_of = Some(id);
        self
    }

    fn check(&self, op: StoreOp, id: Option<ExpenseId>) -> Result<()> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(op).or_default();
            *count += 1;
            *count
        };
        let nth_hit = self.fail_nth == Some((op, call));
        let id_hit = op == StoreOp::Update && id.is_some() && id == self.fail_updates_of;
        if nth_hit || id_hit {
            return Err(Error::Database(DbErr::Custom(format!(
                "injected failure on {op:?} call {call}"
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn subscribe_expenses(
        &self,
        direction: SortDirection,
    ) -> Result<Subscription<ExpenseRecord>> {
        self.inner.subscribe_expenses(direction).await
    }

    async fn subscribe_requests(
        &self,
        direction: SortDirection,
    ) -> Result<Subscription<ResourceRequest>> {
        self.inner.subscribe_requests(direction).await
    }

    async fn list_expenses(&self) -> Result<Vec<ExpenseRecord>> {
        self.inner.list_expenses().await
    }

    async fn get_expense(&self, id: ExpenseId) -> Result<Option<ExpenseRecord>> {
        self.inner.get_expense(id).await
    }

    async fn create_expense(&self, expense: NewExpense) -> Result<ExpenseId> {
        self.check(StoreOp::Create, None)?;
        self.inner.create_expense(expense).await
    }

    async fn update_expense(&self, id: ExpenseId, patch: ExpensePatch) -> Result<()> {
        self.check(StoreOp::Update, Some(id))?;
        self.inner.update_expense(id, patch).await
    }

    async fn delete_expense(&self, id: ExpenseId) -> Result<()> {
        self.check(StoreOp::Delete, Some(id))?;
        self.inner.delete_expense(id).await
    }

    async fn list_requests(&self) -> Result<Vec<ResourceRequest>> {
        self.inner.list_requests().await
    }

    async fn get_request(&self, id: RequestId) -> Result<Option<ResourceRequest>> {
        self.inner.get_request(id).await
    }

    async fn create_request(&self, request: NewResourceRequest) -> Result<RequestId> {
        self.inner.create_request(request).await
    }

    async fn update_request(&self, id: RequestId, patch: RequestPatch) -> Result<()> {
        self.inner.update_request(id, patch).await
    }

    async fn delete_request(&self, id: RequestId) -> Result<()> {
        self.inner.delete_request(id).await
    }
}
