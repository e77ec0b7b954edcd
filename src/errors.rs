use chrono::NaiveDate;
use thiserror::Error;

/// Every failure the crate surfaces. The `Display` text is the message shown to the user.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: f64 },

    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Expense not found: {id}")]
    ExpenseNotFound { id: i64 },

    #[error("Resource request not found: {id}")]
    RequestNotFound { id: i64 },

    #[error("Tip records are managed through their parent expense {parent_id}")]
    TipManagedByParent { parent_id: i64 },

    #[error("Unknown category: {value}")]
    UnknownCategory { value: String },

    #[error("Unknown request status: {value}")]
    UnknownStatus { value: String },

    #[error("Upload failed: {message}")]
    Upload { message: String },

    #[error("Could not fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("PDF error: {message}")]
    Pdf { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wraps any PDF library error into [`Error::Pdf`].
    pub fn pdf(err: impl std::fmt::Display) -> Self {
        Self::Pdf {
            message: err.to_string(),
        }
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
