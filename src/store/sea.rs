//! `SeaORM` implementation of [`RecordStore`].
//!
//! Each collection keeps a `watch` channel holding its latest ordered snapshot. Every
//! successful write re-reads the collection and publishes before returning, which gives
//! writers read-your-writes ordering on their own subscriptions.

use super::{RecordStore, SortDirection, Subscription};
use crate::{
    entities::{Expense, ResourceRequest as RequestEntity, expense, resource_request},
    errors::{Error, Result},
    models::{
        ExpenseId, ExpensePatch, ExpenseRecord, NewExpense, NewResourceRequest, RequestId,
        RequestPatch, ResourceRequest, round_cents,
    },
};
use async_trait::async_trait;
use sea_orm::{ActiveValue::NotSet, QueryOrder, Set, prelude::*};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, instrument};

/// Record store backed by a `SeaORM` connection.
pub struct SeaOrmStore {
    db: DatabaseConnection,
    expenses: watch::Sender<Arc<Vec<ExpenseRecord>>>,
    requests: watch::Sender<Arc<Vec<ResourceRequest>>>,
}

impl SeaOrmStore {
    /// Wraps a connection whose tables already exist and loads the initial snapshots.
    pub async fn new(db: DatabaseConnection) -> Result<Self> {
        let expenses = load_expenses(&db).await?;
        let requests = load_requests(&db).await?;
        debug!(
            "Record store opened with {} expenses and {} requests",
            expenses.len(),
            requests.len()
        );
        Ok(Self {
            db,
            expenses: watch::Sender::new(Arc::new(expenses)),
            requests: watch::Sender::new(Arc::new(requests)),
        })
    }

    /// Number of live expense subscriptions.
    #[must_use]
    pub fn expense_subscriber_count(&self) -> usize {
        self.expenses.receiver_count()
    }

    async fn publish_expenses(&self) -> Result<()> {
        let snapshot = load_expenses(&self.db).await?;
        self.expenses.send_replace(Arc::new(snapshot));
        Ok(())
    }

    async fn publish_requests(&self) -> Result<()> {
        let snapshot = load_requests(&self.db).await?;
        self.requests.send_replace(Arc::new(snapshot));
        Ok(())
    }
}

async fn load_expenses(db: &DatabaseConnection) -> Result<Vec<ExpenseRecord>> {
    Expense::find()
        .order_by_desc(expense::Column::CreatedAt)
        .order_by_desc(expense::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(ExpenseRecord::try_from)
        .collect()
}

async fn load_requests(db: &DatabaseConnection) -> Result<Vec<ResourceRequest>> {
    RequestEntity::find()
        .order_by_desc(resource_request::Column::StartDate)
        .order_by_desc(resource_request::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(ResourceRequest::try_from)
        .collect()
}

#[async_trait]
impl RecordStore for SeaOrmStore {
    async fn subscribe_expenses(
        &self,
        direction: SortDirection,
    ) -> Result<Subscription<ExpenseRecord>> {
        Ok(Subscription::new(self.expenses.subscribe(), direction))
    }

    async fn subscribe_requests(
        &self,
        direction: SortDirection,
    ) -> Result<Subscription<ResourceRequest>> {
        Ok(Subscription::new(self.requests.subscribe(), direction))
    }

    async fn list_expenses(&self) -> Result<Vec<ExpenseRecord>> {
        load_expenses(&self.db).await
    }

    async fn get_expense(&self, id: ExpenseId) -> Result<Option<ExpenseRecord>> {
        Expense::find_by_id(id)
            .one(&self.db)
            .await?
            .map(ExpenseRecord::try_from)
            .transpose()
    }

    #[instrument(skip(self))]
    async fn create_expense(&self, new: NewExpense) -> Result<ExpenseId> {
        let model = expense::ActiveModel {
            id: NotSet,
            date: Set(new.date),
            concept: Set(new.concept),
            amount: Set(round_cents(new.amount)),
            category: Set(new.category.as_str().to_string()),
            receipt_url: Set(new.receipt_url),
            created_at: Set(chrono::Utc::now()),
            linked_tip_id: Set(None),
            archived: Set(false),
        }
        .insert(&self.db)
        .await?;

        self.publish_expenses().await?;
        Ok(model.id)
    }

    #[instrument(skip(self))]
    async fn update_expense(&self, id: ExpenseId, patch: ExpensePatch) -> Result<()> {
        let existing = Expense::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(Error::ExpenseNotFound { id })?;

        let mut active: expense::ActiveModel = existing.into();
        if let Some(date) = patch.date {
            active.date = Set(date);
        }
        if let Some(concept) = patch.concept {
            active.concept = Set(concept);
        }
        if let Some(amount) = patch.amount {
            active.amount = Set(round_cents(amount));
        }
        if let Some(category) = patch.category {
            active.category = Set(category.as_str().to_string());
        }
        if let Some(receipt_url) = patch.receipt_url {
            active.receipt_url = Set(receipt_url);
        }
        if let Some(archived) = patch.archived {
            active.archived = Set(archived);
        }
        if let Some(linked_tip_id) = patch.linked_tip_id {
            active.linked_tip_id = Set(linked_tip_id);
        }
        active.update(&self.db).await?;

        self.publish_expenses().await
    }

    #[instrument(skip(self))]
    async fn delete_expense(&self, id: ExpenseId) -> Result<()> {
        let result = Expense::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(Error::ExpenseNotFound { id });
        }
        self.publish_expenses().await
    }

    async fn list_requests(&self) -> Result<Vec<ResourceRequest>> {
        load_requests(&self.db).await
    }

    async fn get_request(&self, id: RequestId) -> Result<Option<ResourceRequest>> {
        RequestEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(ResourceRequest::try_from)
            .transpose()
    }

    #[instrument(skip(self))]
    async fn create_request(&self, new: NewResourceRequest) -> Result<RequestId> {
        let model = resource_request::ActiveModel {
            id: NotSet,
            requester: Set(new.requester),
            project: Set(new.project),
            start_date: Set(new.start_date),
            end_date: Set(new.end_date),
            day_count: Set(new.day_count),
            transport_total: Set(new.transport_total),
            food_total: Set(new.food_total),
            requested_total: Set(new.transport_total + new.food_total),
            request_document_url: Set(new.request_document_url),
            status: Set(new.status.as_str().to_string()),
            report_document_url: Set(None),
            created_at: Set(chrono::Utc::now()),
        }
        .insert(&self.db)
        .await?;

        self.publish_requests().await?;
        Ok(model.id)
    }

    #[instrument(skip(self))]
    async fn update_request(&self, id: RequestId, patch: RequestPatch) -> Result<()> {
        let existing = RequestEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(Error::RequestNotFound { id })?;

        let mut active: resource_request::ActiveModel = existing.into();
        if let Some(status) = patch.status {
            active.status = Set(status.as_str().to_string());
        }
        if let Some(url) = patch.report_document_url {
            active.report_document_url = Set(url);
        }
        active.update(&self.db).await?;

        self.publish_requests().await
    }

    #[instrument(skip(self))]
    async fn delete_request(&self, id: RequestId) -> Result<()> {
        let result = RequestEntity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(Error::RequestNotFound { id });
        }
        self.publish_requests().await
    }
}
