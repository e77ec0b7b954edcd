//! Resource request entity - Per-diem budget requests for a date range.

use crate::{
    errors::Error,
    models::{RequestStatus, ResourceRequest},
};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Resource request database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "resource_requests")]
pub struct Model {
    /// Unique identifier for the request
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Person receiving the funds
    pub requester: String,
    /// Project name
    pub project: String,
    /// First day covered
    pub start_date: Date,
    /// Last day covered
    pub end_date: Date,
    /// Inclusive day count
    pub day_count: i64,
    /// Transport per-diem total
    pub transport_total: f64,
    /// Food per-diem total
    pub food_total: f64,
    /// Sum of both per-diem totals
    pub requested_total: f64,
    /// Hosted request summary PDF
    pub request_document_url: String,
    /// Status label (`"Sent"`, `"Received"`, `"Finalized"`)
    pub status: String,
    /// Hosted compiled report, once finalized
    pub report_document_url: Option<String>,
    /// When the request was created
    pub created_at: DateTimeUtc,
}

/// `ResourceRequest` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for ResourceRequest {
    type Error = Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            requester: model.requester,
            project: model.project,
            start_date: model.start_date,
            end_date: model.end_date,
            day_count: model.day_count,
            transport_total: model.transport_total,
            food_total: model.food_total,
            requested_total: model.requested_total,
            request_document_url: model.request_document_url,
            status: model.status.parse::<RequestStatus>()?,
            report_document_url: model.report_document_url,
            created_at: model.created_at,
        })
    }
}
