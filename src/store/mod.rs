//! Record store adapter - realtime collections of expenses and resource requests.
//!
//! The store owns canonical storage. Consumers hold [`Subscription`] handles that yield
//! full ordered snapshots after every committed write; snapshots are read-only copies
//! and are rebuilt on every notification.

mod sea;

pub use sea::SeaOrmStore;

use crate::{
    errors::Result,
    models::{
        ExpenseId, ExpensePatch, ExpenseRecord, NewExpense, NewResourceRequest, RequestId,
        RequestPatch, ResourceRequest,
    },
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

/// Order in which a subscription yields records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Oldest first
    Ascending,
    /// Newest first
    #[default]
    Descending,
}

/// Canonical storage for both collections.
///
/// Expenses are ordered by `created_at` (ties by id) and requests by `start_date`.
/// A client observes its own writes in program order: every write returns only after
/// the new snapshot has been published.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Live view of the `expenses` collection.
    async fn subscribe_expenses(
        &self,
        direction: SortDirection,
    ) -> Result<Subscription<ExpenseRecord>>;

    /// Live view of the `resourceRequests` collection.
    async fn subscribe_requests(
        &self,
        direction: SortDirection,
    ) -> Result<Subscription<ResourceRequest>>;

    /// One-shot read of every expense, newest first.
    async fn list_expenses(&self) -> Result<Vec<ExpenseRecord>>;

    /// Looks up a single expense.
    async fn get_expense(&self, id: ExpenseId) -> Result<Option<ExpenseRecord>>;

    /// Inserts an expense and returns the generated id.
    async fn create_expense(&self, expense: NewExpense) -> Result<ExpenseId>;

    /// Applies a partial update. Fails with `ExpenseNotFound` for unknown ids.
    async fn update_expense(&self, id: ExpenseId, patch: ExpensePatch) -> Result<()>;

    /// Removes an expense. Fails with `ExpenseNotFound` for unknown ids.
    async fn delete_expense(&self, id: ExpenseId) -> Result<()>;

    /// One-shot read of every request, newest start date first.
    async fn list_requests(&self) -> Result<Vec<ResourceRequest>>;

    /// Looks up a single request.
    async fn get_request(&self, id: RequestId) -> Result<Option<ResourceRequest>>;

    /// Inserts a request and returns the generated id.
    async fn create_request(&self, request: NewResourceRequest) -> Result<RequestId>;

    /// Applies a status/report URL update. Fails with `RequestNotFound` for unknown ids.
    async fn update_request(&self, id: RequestId, patch: RequestPatch) -> Result<()>;

    /// Removes a request. Fails with `RequestNotFound` for unknown ids.
    async fn delete_request(&self, id: RequestId) -> Result<()>;
}

/// Cancellable handle onto a live collection.
///
/// The first call to [`Subscription::next`] yields the current snapshot; later calls wait
/// for the next committed change. Dropping the handle (or calling
/// [`Subscription::unsubscribe`]) releases it.
#[derive(Debug)]
pub struct Subscription<T> {
    receiver: watch::Receiver<Arc<Vec<T>>>,
    direction: SortDirection,
    primed: bool,
}

impl<T: Clone> Subscription<T> {
    /// Wraps a snapshot channel whose values are ordered newest first.
    pub(crate) fn new(
        receiver: watch::Receiver<Arc<Vec<T>>>,
        direction: SortDirection,
    ) -> Self {
        Self {
            receiver,
            direction,
            primed: false,
        }
    }

    /// Waits for the next snapshot. Returns `None` once the store has shut down.
    pub async fn next(&mut self) -> Option<Vec<T>> {
        if self.primed {
            self.receiver.changed().await.ok()?;
        }
        self.primed = true;
        Some(self.current())
    }

    /// The latest snapshot, without waiting.
    #[must_use]
    pub fn current(&mut self) -> Vec<T> {
        let snapshot = Arc::clone(&self.receiver.borrow_and_update());
        let mut records = snapshot.as_ref().clone();
        if self.direction == SortDirection::Ascending {
            records.reverse();
        }
        records
    }

    /// Releases the subscription.
    pub fn unsubscribe(self) {
        drop(self);
    }
}
