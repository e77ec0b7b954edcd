//! Domain types shared by the store adapter, the business logic and the report compiler.
//!
//! Entities stored by SeaORM keep categories and statuses as plain strings; the types
//! here are the parsed, validated view every other layer works with.

use crate::errors::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use num_format::{Locale, ToFormattedString as _};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Identifier assigned by the store on creation.
pub type ExpenseId = i64;
/// Identifier assigned by the store on creation.
pub type RequestId = i64;

/// Expense category. Declaration order is the render priority (Food first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Meals; the only category that can carry a tip
    Food,
    /// Taxis, fuel, tickets
    Transport,
    /// Everything else
    Other,
}

impl Category {
    /// All categories in render priority order.
    pub const ALL: [Self; 3] = [Self::Food, Self::Transport, Self::Other];

    /// Stable label used for storage and display.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Food => "Food",
            Self::Transport => "Transport",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        // Records written by the first release used Spanish labels.
        match s.trim().to_lowercase().as_str() {
            "food" | "comida" => Ok(Self::Food),
            "transport" | "transporte" => Ok(Self::Transport),
            "other" | "otros" => Ok(Self::Other),
            _ => Err(Error::UnknownCategory {
                value: s.to_string(),
            }),
        }
    }
}

/// First grouping level: whether the expense has a receipt document attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InvoiceStatus {
    /// `receipt_url` is present and non-empty
    WithReceipt,
    /// No receipt document
    WithoutReceipt,
}

impl InvoiceStatus {
    /// Display label of the group.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::WithReceipt => "With Receipt",
            Self::WithoutReceipt => "Without Receipt",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle of a resource request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Submitted, funds not yet received
    Sent,
    /// Funds received
    Received,
    /// A compiled report has been generated against it
    Finalized,
}

impl RequestStatus {
    /// Stable label used for storage and display.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "Sent",
            Self::Received => "Received",
            Self::Finalized => "Finalized",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sent" | "enviada" => Ok(Self::Sent),
            "received" | "recibida" => Ok(Self::Received),
            "finalized" | "finalizada" => Ok(Self::Finalized),
            _ => Err(Error::UnknownStatus {
                value: s.to_string(),
            }),
        }
    }
}

/// A single logged expenditure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    /// Store-assigned identifier
    pub id: ExpenseId,
    /// Day the expense happened (not the creation time)
    pub date: NaiveDate,
    /// Free-text description
    pub concept: String,
    /// Positive amount in USD
    pub amount: f64,
    /// Expense category
    pub category: Category,
    /// Hosted receipt document, if any
    pub receipt_url: Option<String>,
    /// Server-assigned creation timestamp, the authoritative sort key
    pub created_at: DateTime<Utc>,
    /// Dependent tip record, only ever set on Food expenses
    pub linked_tip_id: Option<ExpenseId>,
    /// Set once the record has been included in a finalized report
    pub archived: bool,
}

impl ExpenseRecord {
    /// Receipt URL, treating an empty string as absent.
    #[must_use]
    pub fn receipt(&self) -> Option<&str> {
        self.receipt_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Grouping status derived from the receipt URL.
    #[must_use]
    pub fn invoice_status(&self) -> InvoiceStatus {
        if self.receipt().is_some() {
            InvoiceStatus::WithReceipt
        } else {
            InvoiceStatus::WithoutReceipt
        }
    }
}

/// Fields for a new expense. The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    /// Day the expense happened
    pub date: NaiveDate,
    /// Free-text description
    pub concept: String,
    /// Positive amount in USD
    pub amount: f64,
    /// Expense category
    pub category: Category,
    /// Hosted receipt document, if any
    pub receipt_url: Option<String>,
}

/// Partial update of an expense. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpensePatch {
    /// New date
    pub date: Option<NaiveDate>,
    /// New concept
    pub concept: Option<String>,
    /// New amount
    pub amount: Option<f64>,
    /// New category
    pub category: Option<Category>,
    /// New receipt URL (`Some(None)` clears it)
    pub receipt_url: Option<Option<String>>,
    /// New archived flag
    pub archived: Option<bool>,
    /// Tip link; only the tip rule writes it
    pub(crate) linked_tip_id: Option<Option<ExpenseId>>,
}

impl ExpensePatch {
    /// Patch that only flips the archived flag.
    #[must_use]
    pub fn archived(value: bool) -> Self {
        Self {
            archived: Some(value),
            ..Self::default()
        }
    }

    /// Patch that only rewrites the tip link.
    pub(crate) fn tip_link(tip_id: Option<ExpenseId>) -> Self {
        Self {
            linked_tip_id: Some(tip_id),
            ..Self::default()
        }
    }

    /// Tip link requested by this patch, if any.
    #[must_use]
    pub const fn linked_tip_id(&self) -> Option<Option<ExpenseId>> {
        self.linked_tip_id
    }

    /// Patch restoring every user-editable field of `record`, including its tip link.
    pub(crate) fn restore(record: &ExpenseRecord) -> Self {
        Self {
            date: Some(record.date),
            concept: Some(record.concept.clone()),
            amount: Some(record.amount),
            category: Some(record.category),
            receipt_url: Some(record.receipt_url.clone()),
            archived: Some(record.archived),
            linked_tip_id: Some(record.linked_tip_id),
        }
    }
}

/// A pre-authorized per-diem budget for a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequest {
    /// Store-assigned identifier
    pub id: RequestId,
    /// Person receiving the funds
    pub requester: String,
    /// Project the trip belongs to
    pub project: String,
    /// First day covered
    pub start_date: NaiveDate,
    /// Last day covered
    pub end_date: NaiveDate,
    /// Inclusive day count, always at least 1
    pub day_count: i64,
    /// Transport per-diem total
    pub transport_total: f64,
    /// Food per-diem total
    pub food_total: f64,
    /// `transport_total + food_total`
    pub requested_total: f64,
    /// Hosted one-page request summary
    pub request_document_url: String,
    /// Lifecycle state
    pub status: RequestStatus,
    /// Hosted compiled report archive, once finalized
    pub report_document_url: Option<String>,
    /// Server-assigned creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Fields for a new resource request.
#[derive(Debug, Clone, PartialEq)]
pub struct NewResourceRequest {
    /// Person receiving the funds
    pub requester: String,
    /// Project the trip belongs to
    pub project: String,
    /// First day covered
    pub start_date: NaiveDate,
    /// Last day covered
    pub end_date: NaiveDate,
    /// Inclusive day count
    pub day_count: i64,
    /// Transport per-diem total
    pub transport_total: f64,
    /// Food per-diem total
    pub food_total: f64,
    /// Hosted one-page request summary
    pub request_document_url: String,
    /// Initial lifecycle state
    pub status: RequestStatus,
}

/// The only mutable parts of a resource request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestPatch {
    /// New status
    pub status: Option<RequestStatus>,
    /// New report URL (`Some(None)` clears it)
    pub report_document_url: Option<Option<String>>,
}

/// Rounds a currency value to whole cents.
#[must_use]
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Formats an amount as fixed `en-US` USD, e.g. `$1,234.50` or `-$5.00`.
#[must_use]
pub fn format_usd(amount: f64) -> String {
    // Cast safety: report amounts are far below i64::MAX cents.
    #[allow(clippy::cast_possible_truncation)]
    let cents = (amount.abs() * 100.0).round() as i64;
    let whole = (cents / 100).to_formatted_string(&Locale::en);
    let sign = if amount < 0.0 && cents != 0 { "-" } else { "" };
    format!("{sign}${whole}.{:02}", cents % 100)
}
