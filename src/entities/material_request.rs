use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::material_request::{RequestStatus, RequestType, TransportMode};

/// Persisted material request. Line items live in the `items` JSON column;
/// they are patched as a unit, while scalar fields support per-field partial
/// updates through the active model.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "material_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    pub request_type: RequestType,
    pub items: Json,
    pub requested_by: String,
    pub requester_email: Option<String>,
    pub requester_id: Option<String>,
    pub ticket_number: Option<String>,
    pub zone: Option<String>,
    pub description: Option<String>,
    pub status: RequestStatus,
    pub transport_mode: Option<TransportMode>,
    pub edt: Option<DateTimeUtc>,
    pub tracking_no: Option<String>,
    pub sent_at: Option<DateTimeUtc>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTimeUtc>,
    pub approved_by_email: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
