//! Expense entity - Represents every logged expenditure, tips included.
//!
//! Categories are stored as their text label and parsed into [`Category`] on read.
//! `linked_tip_id` points at the dependent tip record of a Food expense.

use crate::{
    errors::Error,
    models::{Category, ExpenseRecord},
};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Expense database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    /// Unique identifier for the expense
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Day the expense happened
    pub date: Date,
    /// Free-text description
    pub concept: String,
    /// Amount in dollars
    pub amount: f64,
    /// Category label (`"Food"`, `"Transport"`, `"Other"`)
    pub category: String,
    /// Hosted receipt document
    pub receipt_url: Option<String>,
    /// When the record was created
    pub created_at: DateTimeUtc,
    /// Dependent tip record
    pub linked_tip_id: Option<i64>,
    /// Included in a finalized report
    pub archived: bool,
}

/// Expenses have no relationships enforced by the database
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for ExpenseRecord {
    type Error = Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            date: model.date,
            concept: model.concept,
            amount: model.amount,
            category: model.category.parse::<Category>()?,
            receipt_url: model.receipt_url,
            created_at: model.created_at,
            linked_tip_id: model.linked_tip_id,
            archived: model.archived,
        })
    }
}
