//! Tip derivation - the 10% gratuity record kept linked to a Food expense.
//!
//! Every write to `linked_tip_id` goes through this module. A parent holds at most one
//! tip, only Food parents hold one, and a tip never links a tip of its own.

use super::saga::Saga;
use crate::{
    errors::{Error, Result},
    models::{Category, ExpenseId, ExpensePatch, ExpenseRecord, NewExpense, round_cents},
    store::RecordStore,
};
use chrono::NaiveDate;
use tracing::{debug, info, warn};

/// Share of the parent amount paid as tip.
pub const TIP_RATE: f64 = 0.10;

/// Tip owed on a parent amount, rounded to the cent.
#[must_use]
pub fn tip_amount(parent_amount: f64) -> f64 {
    round_cents(parent_amount * TIP_RATE)
}

/// Generated concept of a tip record, e.g. `Tip => Dinner @ 2024-03-01`.
#[must_use]
pub fn tip_concept(parent_concept: &str, parent_date: NaiveDate) -> String {
    format!("Tip => {parent_concept} @ {}", parent_date.format("%Y-%m-%d"))
}

/// The tip record derived from a parent's current fields.
#[must_use]
pub fn derive_tip(parent_date: NaiveDate, parent_concept: &str, parent_amount: f64) -> NewExpense {
    NewExpense {
        date: parent_date,
        concept: tip_concept(parent_concept, parent_date),
        amount: tip_amount(parent_amount),
        category: Category::Food,
        receipt_url: None,
    }
}

/// What a save has to do with the parent's tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipTransition {
    /// Delete the tip and clear the link
    Remove,
    /// Rewrite the tip's amount, concept and date from the parent
    Refresh,
    /// Create a tip and link it
    Create,
    /// Nothing to do
    None,
}

impl TipTransition {
    /// Decides the transition from the parent's state after the save.
    ///
    /// A non-Food category disqualifies the tip even when it is still wanted.
    #[must_use]
    pub fn decide(had_tip: bool, wants_tip: bool, category: Category) -> Self {
        let keeps_tip = wants_tip && category == Category::Food;
        match (had_tip, keeps_tip) {
            (true, false) => Self::Remove,
            (true, true) => Self::Refresh,
            (false, true) => Self::Create,
            (false, false) => Self::None,
        }
    }
}

/// The record whose tip is `tip_id`, if any.
#[must_use]
pub fn parent_of(records: &[ExpenseRecord], tip_id: ExpenseId) -> Option<&ExpenseRecord> {
    records
        .iter()
        .find(|record| record.linked_tip_id == Some(tip_id))
}

/// The record an editor should open for `id`: the parent when `id` is a tip.
#[must_use]
pub fn editable_target(records: &[ExpenseRecord], id: ExpenseId) -> ExpenseId {
    parent_of(records, id).map_or(id, |parent| parent.id)
}

/// Fails with [`Error::TipManagedByParent`] when `id` is somebody's tip.
pub fn ensure_not_tip(records: &[ExpenseRecord], id: ExpenseId) -> Result<()> {
    match parent_of(records, id) {
        Some(parent) => Err(Error::TipManagedByParent {
            parent_id: parent.id,
        }),
        None => Ok(()),
    }
}

/// Brings the tip of `parent` in line with `wants_tip`.
///
/// `parent` must reflect the saved parent fields. Each completed write registers its
/// undo action on `saga`.
pub(crate) async fn sync_tip<'a>(
    store: &'a dyn RecordStore,
    saga: &mut Saga<'a>,
    parent: &ExpenseRecord,
    wants_tip: bool,
) -> Result<TipTransition> {
    let transition =
        TipTransition::decide(parent.linked_tip_id.is_some(), wants_tip, parent.category);
    debug!("Tip transition for expense {}: {transition:?}", parent.id);

    match (transition, parent.linked_tip_id) {
        (TipTransition::Remove, Some(tip_id)) => remove_tip(store, saga, parent.id, tip_id).await?,
        (TipTransition::Refresh, Some(tip_id)) => {
            refresh_tip(store, saga, parent, tip_id).await?;
        }
        (TipTransition::Create, _) => {
            create_tip(store, saga, parent).await?;
        }
        _ => {}
    }
    Ok(transition)
}

/// Creates the tip for `parent` and links it. Returns the tip id.
pub(crate) async fn create_tip<'a>(
    store: &'a dyn RecordStore,
    saga: &mut Saga<'a>,
    parent: &ExpenseRecord,
) -> Result<ExpenseId> {
    let tip = derive_tip(parent.date, &parent.concept, parent.amount);
    let tip_id = saga.run(store.create_expense(tip)).await?;
    saga.on_failure(format!("create tip {tip_id}"), move || {
        store.delete_expense(tip_id)
    });

    link(store, saga, parent, Some(tip_id)).await?;
    info!("Created tip {tip_id} for expense {}", parent.id);
    Ok(tip_id)
}

async fn refresh_tip<'a>(
    store: &'a dyn RecordStore,
    saga: &mut Saga<'a>,
    parent: &ExpenseRecord,
    tip_id: ExpenseId,
) -> Result<()> {
    let Some(previous) = saga.run(store.get_expense(tip_id)).await? else {
        warn!(
            "Expense {} links missing tip {tip_id}; creating a new one",
            parent.id
        );
        create_tip(store, saga, parent).await?;
        return Ok(());
    };

    let derived = derive_tip(parent.date, &parent.concept, parent.amount);
    let patch = ExpensePatch {
        date: Some(derived.date),
        concept: Some(derived.concept),
        amount: Some(derived.amount),
        ..ExpensePatch::default()
    };
    saga.run(store.update_expense(tip_id, patch)).await?;
    saga.on_failure(format!("refresh tip {tip_id}"), move || {
        store.update_expense(tip_id, ExpensePatch::restore(&previous))
    });
    debug!("Refreshed tip {tip_id} of expense {}", parent.id);
    Ok(())
}

async fn remove_tip<'a>(
    store: &'a dyn RecordStore,
    saga: &mut Saga<'a>,
    parent_id: ExpenseId,
    tip_id: ExpenseId,
) -> Result<()> {
    saga.run(store.update_expense(parent_id, ExpensePatch::tip_link(None)))
        .await?;
    saga.on_failure(format!("unlink tip {tip_id}"), move || {
        store.update_expense(parent_id, ExpensePatch::tip_link(Some(tip_id)))
    });

    match store.delete_expense(tip_id).await {
        Ok(()) => info!("Removed tip {tip_id} of expense {parent_id}"),
        Err(Error::ExpenseNotFound { .. }) => {
            warn!("Tip {tip_id} of expense {parent_id} was already gone");
        }
        Err(err) => return saga.fail(err).await,
    }
    Ok(())
}

async fn link<'a>(
    store: &'a dyn RecordStore,
    saga: &mut Saga<'a>,
    parent: &ExpenseRecord,
    tip_id: Option<ExpenseId>,
) -> Result<()> {
    let parent_id = parent.id;
    let previous = parent.linked_tip_id;
    saga.run(store.update_expense(parent_id, ExpensePatch::tip_link(tip_id)))
        .await?;
    saga.on_failure(format!("link tip of {parent_id}"), move || {
        store.update_expense(parent_id, ExpensePatch::tip_link(previous))
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_tip_amount_rounds_to_cents() {
        assert_eq!(tip_amount(50.0), 5.0);
        assert_eq!(tip_amount(33.33), 3.33);
        assert_eq!(tip_amount(0.05), 0.01);
    }

    #[test]
    fn test_tip_concept_format() {
        assert_eq!(
            tip_concept("Dinner", date("2024-03-01")),
            "Tip => Dinner @ 2024-03-01"
        );
    }

    #[test]
    fn test_transition_table() {
        use TipTransition as T;
        assert_eq!(T::decide(true, false, Category::Food), T::Remove);
        assert_eq!(T::decide(true, true, Category::Food), T::Refresh);
        assert_eq!(T::decide(false, true, Category::Food), T::Create);
        assert_eq!(T::decide(false, false, Category::Food), T::None);
        assert_eq!(T::decide(true, true, Category::Other), T::Remove);
        assert_eq!(T::decide(false, true, Category::Transport), T::None);
    }

    #[test]
    fn test_editable_target_redirects_tips_to_parent() {
        let mut parent = record(1, "2024-03-01", "Dinner", 50.0, Category::Food);
        parent.linked_tip_id = Some(2);
        let tip = record(2, "2024-03-01", "Tip => Dinner @ 2024-03-01", 5.0, Category::Food);
        let records = vec![tip, parent];

        assert_eq!(editable_target(&records, 2), 1);
        assert_eq!(editable_target(&records, 1), 1);
        assert!(matches!(
            ensure_not_tip(&records, 2),
            Err(Error::TipManagedByParent { parent_id: 1 })
        ));
        assert!(ensure_not_tip(&records, 1).is_ok());
    }

    #[tokio::test]
    async fn test_create_tip_links_parent() -> Result<()> {
        let store = setup_test_store().await?;
        let parent_id = store
            .create_expense(new_expense("2024-03-01", "Dinner", 50.0, Category::Food))
            .await?;
        let parent = store.get_expense(parent_id).await?.unwrap();

        let mut saga = Saga::new("test");
        let tip_id = create_tip(&store, &mut saga, &parent).await?;
        saga.commit();

        let parent = store.get_expense(parent_id).await?.unwrap();
        assert_eq!(parent.linked_tip_id, Some(tip_id));
        let tip = store.get_expense(tip_id).await?.unwrap();
        assert_eq!(tip.amount, 5.0);
        assert_eq!(tip.category, Category::Food);
        assert_eq!(tip.date, parent.date);
        assert!(tip.concept.starts_with("Tip => "));
        assert_eq!(tip.receipt(), None);
        assert_eq!(tip.linked_tip_id, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_sync_removes_tip_when_category_leaves_food() -> Result<()> {
        let store = setup_test_store().await?;
        let parent_id = store
            .create_expense(new_expense("2024-03-01", "Dinner", 50.0, Category::Food))
            .await?;
        let parent = store.get_expense(parent_id).await?.unwrap();
        let mut saga = Saga::new("test");
        let tip_id = create_tip(&store, &mut saga, &parent).await?;
        saga.commit();

        store
            .update_expense(
                parent_id,
                ExpensePatch {
                    category: Some(Category::Other),
                    ..ExpensePatch::default()
                },
            )
            .await?;
        let parent = store.get_expense(parent_id).await?.unwrap();

        let mut saga = Saga::new("test");
        let transition = sync_tip(&store, &mut saga, &parent, true).await?;
        saga.commit();

        assert_eq!(transition, TipTransition::Remove);
        assert!(store.get_expense(tip_id).await?.is_none());
        assert_eq!(store.get_expense(parent_id).await?.unwrap().linked_tip_id, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_sync_refresh_overwrites_tip_fields() -> Result<()> {
        let store = setup_test_store().await?;
        let parent_id = store
            .create_expense(new_expense("2024-03-01", "Dinner", 50.0, Category::Food))
            .await?;
        let parent = store.get_expense(parent_id).await?.unwrap();
        let mut saga = Saga::new("test");
        let tip_id = create_tip(&store, &mut saga, &parent).await?;
        saga.commit();

        store
            .update_expense(
                parent_id,
                ExpensePatch {
                    amount: Some(80.0),
                    concept: Some("Team dinner".to_string()),
                    date: Some(date("2024-03-02")),
                    ..ExpensePatch::default()
                },
            )
            .await?;
        let parent = store.get_expense(parent_id).await?.unwrap();

        let mut saga = Saga::new("test");
        let transition = sync_tip(&store, &mut saga, &parent, true).await?;
        saga.commit();

        assert_eq!(transition, TipTransition::Refresh);
        let tip = store.get_expense(tip_id).await?.unwrap();
        assert_eq!(tip.amount, 8.0);
        assert_eq!(tip.concept, "Tip => Team dinner @ 2024-03-02");
        assert_eq!(tip.date, date("2024-03-02"));
        Ok(())
    }

    #[tokio::test]
    async fn test_refresh_recreates_missing_tip() -> Result<()> {
        let store = setup_test_store().await?;
        let parent_id = store
            .create_expense(new_expense("2024-03-01", "Dinner", 50.0, Category::Food))
            .await?;
        store
            .update_expense(parent_id, ExpensePatch::tip_link(Some(999)))
            .await?;
        let parent = store.get_expense(parent_id).await?.unwrap();

        let mut saga = Saga::new("test");
        sync_tip(&store, &mut saga, &parent, true).await?;
        saga.commit();

        let tip_id = store
            .get_expense(parent_id)
            .await?
            .unwrap()
            .linked_tip_id
            .unwrap();
        assert_ne!(tip_id, 999);
        assert_eq!(store.get_expense(tip_id).await?.unwrap().amount, 5.0);
        Ok(())
    }
}
