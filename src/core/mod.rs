//! Framework-agnostic business logic.

/// Filtering and grouping of expenses
pub mod aggregation;
/// Expense create/edit/delete with receipt upload and tip upkeep
pub mod expense;
/// A4 text page writer shared by the PDF outputs
pub mod pdf;
/// Report compilation: spreadsheet, PDF, merge, zip, finalization
pub mod report;
/// Per-diem resource requests
pub mod resource_request;
/// Compensating actions for multi-record writes
pub mod saga;
/// Tip derivation and linking
pub mod tip;
