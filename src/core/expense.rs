//! Expense lifecycle - create, edit and delete with receipt upload and tip upkeep.

use super::saga::Saga;
use super::tip;
use crate::{
    config::HostingConfig,
    errors::{Error, Result},
    hosting::{FileHost, ResourceType, UploadRequest},
    models::{Category, ExpenseId, ExpensePatch, ExpenseRecord, NewExpense, round_cents},
    store::RecordStore,
};
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::{info, instrument, warn};

/// Where the receipt of a draft comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReceiptInput {
    /// No receipt; clears an existing one on edit
    #[default]
    None,
    /// Already hosted document
    Url(String),
    /// Local file uploaded before the record is written
    File(PathBuf),
}

/// Form state of an expense being created or edited.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseDraft {
    /// Day the expense happened
    pub date: NaiveDate,
    /// Free-text description
    pub concept: String,
    /// Positive amount in USD
    pub amount: f64,
    /// Expense category
    pub category: Category,
    /// Receipt source
    pub receipt: ReceiptInput,
    /// Keep a 10% tip linked to this expense (Food only)
    pub add_tip: bool,
}

impl ExpenseDraft {
    /// Pre-fills a draft from a stored record, as the edit form does.
    #[must_use]
    pub fn from_record(record: &ExpenseRecord) -> Self {
        Self {
            date: record.date,
            concept: record.concept.clone(),
            amount: record.amount,
            category: record.category,
            receipt: record
                .receipt()
                .map_or(ReceiptInput::None, |url| ReceiptInput::Url(url.to_string())),
            add_tip: record.linked_tip_id.is_some(),
        }
    }
}

/// Checks the draft before anything leaves the process.
pub fn validate(draft: &ExpenseDraft) -> Result<()> {
    if draft.concept.trim().is_empty() {
        return Err(Error::Validation {
            message: "Concept is required".to_string(),
        });
    }
    // The store keeps whole cents, so a sub-cent amount would land as zero.
    if !draft.amount.is_finite() || round_cents(draft.amount) <= 0.0 {
        return Err(Error::InvalidAmount {
            amount: draft.amount,
        });
    }
    match &draft.receipt {
        ReceiptInput::File(path) if path.as_os_str().is_empty() => Err(Error::Validation {
            message: "Receipt file path is empty".to_string(),
        }),
        _ => Ok(()),
    }
}

/// Turns the receipt input into a hosted URL, uploading local files.
pub async fn resolve_receipt(
    host: &dyn FileHost,
    hosting: &HostingConfig,
    receipt: &ReceiptInput,
) -> Result<Option<String>> {
    match receipt {
        ReceiptInput::None => Ok(None),
        ReceiptInput::Url(url) => {
            let url = url.trim();
            Ok((!url.is_empty()).then(|| url.to_string()))
        }
        ReceiptInput::File(path) => {
            let request = UploadRequest::from_path(path, ResourceType::Raw)
                .await?
                .with_folder(hosting.receipt_folder.clone());
            let uploaded = host.upload(request).await?;
            Ok(Some(uploaded.url))
        }
    }
}

/// Creates an expense and, when requested on a Food expense, its tip.
///
/// The draft is validated first and a local receipt file is uploaded before anything is
/// written, so a bad amount or a failed upload leaves the store untouched. A tip is only
/// derived for Food expenses with `add_tip` set; for other categories the flag is ignored.
/// If the tip cannot be created or linked, the parent is deleted again.
///
/// # Arguments
/// * `store` - Record store the expense (and tip) are written to
/// * `host` - File host receiving a local receipt file
/// * `hosting` - Hosting settings; receipts go to `receipt_folder`
/// * `draft` - Form state of the new expense
///
/// Returns the id of the parent expense.
#[instrument(skip(store, host, hosting, draft), fields(concept = %draft.concept))]
pub async fn create_expense(
    store: &dyn RecordStore,
    host: &dyn FileHost,
    hosting: &HostingConfig,
    draft: &ExpenseDraft,
) -> Result<ExpenseId> {
    validate(draft)?;
    let receipt_url = resolve_receipt(host, hosting, &draft.receipt).await?;

    let mut saga = Saga::new("create expense");
    let parent_id = saga
        .run(store.create_expense(NewExpense {
            date: draft.date,
            concept: draft.concept.trim().to_string(),
            amount: draft.amount,
            category: draft.category,
            receipt_url,
        }))
        .await?;
    saga.on_failure(format!("create expense {parent_id}"), move || {
        store.delete_expense(parent_id)
    });

    if draft.add_tip {
        let parent = saga
            .run(store.get_expense(parent_id))
            .await?
            .ok_or(Error::ExpenseNotFound { id: parent_id })?;
        if tip::sync_tip(store, &mut saga, &parent, true).await? == tip::TipTransition::None {
            warn!(
                "Tip ignored for expense {parent_id}: category is {}",
                draft.category
            );
        }
    }

    saga.commit();
    info!("Created expense {parent_id}");
    Ok(parent_id)
}

/// Saves a draft over an existing expense and reconciles its tip.
///
/// Tips cannot be edited on their own: editing one fails with
/// [`Error::TipManagedByParent`] naming the parent to edit instead. After the parent is
/// saved its tip is created, refreshed from the new amount, concept and date, or removed
/// when the expense leaves the Food category or the tip is no longer wanted. If the tip
/// cannot be brought in line, the parent's previous fields are restored.
///
/// # Arguments
/// * `store` - Record store holding the expense
/// * `host` - File host receiving a new local receipt file
/// * `hosting` - Hosting settings; receipts go to `receipt_folder`
/// * `id` - The expense to overwrite; must not be a tip
/// * `draft` - New form state; [`ReceiptInput::None`] clears the receipt
#[instrument(skip(store, host, hosting, draft))]
pub async fn edit_expense(
    store: &dyn RecordStore,
    host: &dyn FileHost,
    hosting: &HostingConfig,
    id: ExpenseId,
    draft: &ExpenseDraft,
) -> Result<()> {
    validate(draft)?;
    let records = store.list_expenses().await?;
    tip::ensure_not_tip(&records, id)?;
    let before = records
        .into_iter()
        .find(|record| record.id == id)
        .ok_or(Error::ExpenseNotFound { id })?;

    let receipt_url = resolve_receipt(host, hosting, &draft.receipt).await?;

    let mut saga = Saga::new("edit expense");
    let patch = ExpensePatch {
        date: Some(draft.date),
        concept: Some(draft.concept.trim().to_string()),
        amount: Some(draft.amount),
        category: Some(draft.category),
        receipt_url: Some(receipt_url),
        ..ExpensePatch::default()
    };
    saga.run(store.update_expense(id, patch)).await?;
    saga.on_failure(format!("edit expense {id}"), move || {
        store.update_expense(id, ExpensePatch::restore(&before))
    });

    let after = saga
        .run(store.get_expense(id))
        .await?
        .ok_or(Error::ExpenseNotFound { id })?;
    tip::sync_tip(store, &mut saga, &after, draft.add_tip).await?;

    saga.commit();
    info!("Updated expense {id}");
    Ok(())
}

/// Deletes an expense together with its tip.
///
/// The tip goes first; if the parent then cannot be deleted, the tip is re-created and
/// relinked.
#[instrument(skip(store))]
pub async fn delete_expense(store: &dyn RecordStore, id: ExpenseId) -> Result<()> {
    let records = store.list_expenses().await?;
    tip::ensure_not_tip(&records, id)?;
    let record = records
        .iter()
        .find(|record| record.id == id)
        .ok_or(Error::ExpenseNotFound { id })?;

    let mut saga = Saga::new("delete expense");
    if let Some(tip_id) = record.linked_tip_id {
        match records.iter().find(|candidate| candidate.id == tip_id).cloned() {
            Some(tip_record) => {
                saga.run(store.delete_expense(tip_id)).await?;
                saga.on_failure(format!("delete tip {tip_id}"), move || {
                    restore_tip(store, id, tip_record)
                });
            }
            None => warn!("Expense {id} links missing tip {tip_id}"),
        }
    }

    saga.run(store.delete_expense(id)).await?;
    saga.commit();
    info!("Deleted expense {id}");
    Ok(())
}

async fn restore_tip(
    store: &dyn RecordStore,
    parent_id: ExpenseId,
    tip_record: ExpenseRecord,
) -> Result<()> {
    let tip_id = store
        .create_expense(NewExpense {
            date: tip_record.date,
            concept: tip_record.concept.clone(),
            amount: tip_record.amount,
            category: tip_record.category,
            receipt_url: tip_record.receipt_url.clone(),
        })
        .await?;
    if tip_record.archived {
        store
            .update_expense(tip_id, ExpensePatch::archived(true))
            .await?;
    }
    store
        .update_expense(parent_id, ExpensePatch::tip_link(Some(tip_id)))
        .await
}
