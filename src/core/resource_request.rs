//! Resource requests - per-diem budgets computed from a date range.

use super::pdf::PdfWriter;
use crate::{
    config::{AppConfig, RequesterConfig},
    errors::{Error, Result},
    hosting::{FileHost, ResourceType, UploadRequest},
    models::{
        NewResourceRequest, RequestId, RequestPatch, RequestStatus, ResourceRequest, format_usd,
    },
    store::RecordStore,
};
use chrono::NaiveDate;
use tracing::{info, instrument};

/// Transport allowance per day in USD.
pub const TRANSPORT_PER_DAY: f64 = 700.0;
/// Food allowance per day in USD.
pub const FOOD_PER_DAY: f64 = 600.0;

/// Derived figures of a request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestTotals {
    /// Inclusive number of days, zero for an inverted range
    pub day_count: i64,
    /// `day_count * TRANSPORT_PER_DAY`
    pub transport_total: f64,
    /// `day_count * FOOD_PER_DAY`
    pub food_total: f64,
    /// `transport_total + food_total`
    pub requested_total: f64,
}

impl RequestTotals {
    /// All-zero totals of a range that cannot be submitted.
    pub const ZERO: Self = Self {
        day_count: 0,
        transport_total: 0.0,
        food_total: 0.0,
        requested_total: 0.0,
    };

    /// Whether a request with these totals may be persisted.
    #[must_use]
    pub const fn is_submittable(&self) -> bool {
        self.day_count >= 1
    }
}

/// Per-diem totals for `start..=end`. An inverted range yields [`RequestTotals::ZERO`].
#[must_use]
pub fn compute_request(start: NaiveDate, end: NaiveDate) -> RequestTotals {
    if start > end {
        return RequestTotals::ZERO;
    }
    let day_count = (end - start).num_days() + 1;
    let transport_total = day_count as f64 * TRANSPORT_PER_DAY;
    let food_total = day_count as f64 * FOOD_PER_DAY;
    RequestTotals {
        day_count,
        transport_total,
        food_total,
        requested_total: transport_total + food_total,
    }
}

/// Renders the one-page request summary.
pub fn render_request_pdf(
    requester: &RequesterConfig,
    start: NaiveDate,
    end: NaiveDate,
    totals: &RequestTotals,
) -> Result<Vec<u8>> {
    let mut pdf = PdfWriter::new("Resource Request")?;
    pdf.gap(10.0);
    pdf.title("Resource Request", 24.0);
    pdf.gap(10.0);

    pdf.row(0.0, "Requester:", &requester.name, 12.0, false);
    pdf.row(0.0, "Project:", &requester.project, 12.0, false);
    pdf.row(
        0.0,
        "Period:",
        &format!(
            "{} to {} ({} days)",
            start.format("%d/%m/%Y"),
            end.format("%d/%m/%Y"),
            totals.day_count
        ),
        12.0,
        false,
    );
    pdf.gap(8.0);

    pdf.text(0.0, "Breakdown", 14.0, true);
    pdf.gap(2.0);
    pdf.row(
        7.0,
        &format!("Transport ({}/day):", format_usd(TRANSPORT_PER_DAY)),
        &format_usd(totals.transport_total),
        12.0,
        false,
    );
    pdf.row(
        7.0,
        &format!("Food ({}/day):", format_usd(FOOD_PER_DAY)),
        &format_usd(totals.food_total),
        12.0,
        false,
    );
    pdf.gap(4.0);
    pdf.row(0.0, "Total requested:", &format_usd(totals.requested_total), 14.0, true);

    pdf.footer(&format!(
        "Resource request for project {} covering {start} through {end}",
        requester.project
    ));
    pdf.finish()
}

/// Renders, uploads and persists a new request with status `Sent`.
///
/// Day count and per-diem totals come from [`compute_request`]. Inverted ranges are
/// rejected with [`Error::InvalidDateRange`] before anything is rendered. The summary PDF
/// is uploaded as a raw file named `request_<start>_<end>.pdf`, and the request is only
/// stored once the upload has succeeded.
///
/// # Arguments
/// * `store` - Record store the request is written to
/// * `host` - File host receiving the summary PDF
/// * `config` - Application settings; the requester section names who asks and for what
/// * `start` - First day covered by the request
/// * `end` - Last day covered by the request, inclusive
#[instrument(skip(store, host, config))]
pub async fn submit_request(
    store: &dyn RecordStore,
    host: &dyn FileHost,
    config: &AppConfig,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<ResourceRequest> {
    let totals = compute_request(start, end);
    if !totals.is_submittable() {
        return Err(Error::InvalidDateRange { start, end });
    }

    let pdf = render_request_pdf(&config.requester, start, end, &totals)?;
    let file_name = format!("request_{start}_{end}.pdf");
    let upload = UploadRequest::from_bytes(pdf, file_name.clone(), ResourceType::Raw)?
        .with_target_name(file_name.trim_end_matches(".pdf"));
    let uploaded = host.upload(upload).await?;

    let id = store
        .create_request(NewResourceRequest {
            requester: config.requester.name.clone(),
            project: config.requester.project.clone(),
            start_date: start,
            end_date: end,
            day_count: totals.day_count,
            transport_total: totals.transport_total,
            food_total: totals.food_total,
            request_document_url: uploaded.url,
            status: RequestStatus::Sent,
        })
        .await?;
    info!(
        "Submitted resource request {id} for {} ({} days)",
        format_usd(totals.requested_total),
        totals.day_count
    );

    store
        .get_request(id)
        .await?
        .ok_or(Error::RequestNotFound { id })
}

/// Requests a report can still be linked to, newest start date first.
#[must_use]
pub fn open_requests(requests: &[ResourceRequest]) -> Vec<ResourceRequest> {
    let mut open: Vec<_> = requests
        .iter()
        .filter(|request| request.status != RequestStatus::Finalized)
        .cloned()
        .collect();
    open.sort_by(|a, b| b.start_date.cmp(&a.start_date).then(b.id.cmp(&a.id)));
    open
}

/// Reads the store and returns [`open_requests`].
pub async fn list_open_requests(store: &dyn RecordStore) -> Result<Vec<ResourceRequest>> {
    Ok(open_requests(&store.list_requests().await?))
}

/// Records that the requested funds arrived. Finalized requests stay finalized.
#[instrument(skip(store))]
pub async fn mark_received(store: &dyn RecordStore, id: RequestId) -> Result<()> {
    let request = store
        .get_request(id)
        .await?
        .ok_or(Error::RequestNotFound { id })?;
    match request.status {
        RequestStatus::Finalized => Err(Error::Validation {
            message: format!("Request {id} is already finalized"),
        }),
        RequestStatus::Received => Ok(()),
        RequestStatus::Sent => {
            store
                .update_request(
                    id,
                    RequestPatch {
                        status: Some(RequestStatus::Received),
                        report_document_url: None,
                    },
                )
                .await?;
            info!("Request {id} marked as received");
            Ok(())
        }
    }
}

/// Deletes a request. Linked expenses are not touched.
#[instrument(skip(store))]
pub async fn delete_request(store: &dyn RecordStore, id: RequestId) -> Result<()> {
    store.delete_request(id).await?;
    info!("Deleted resource request {id}");
    Ok(())
}
