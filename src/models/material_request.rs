use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;

/// Remark appended to line items that were not checked off on receipt.
pub const MISSING_ON_RECEIPT: &str = "Missing on receipt";

/// Separator used when appending generated annotations to an existing remark.
pub const REMARK_SEPARATOR: &str = " | ";

/// Request status lifecycle.
///
/// `pending → approved → in-transit → delivered` with `pending → rejected`
/// as the terminal escape. `in-process` is a fulfillment sub-state between
/// approval and dispatch; nothing requires passing through it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
    strum::EnumString,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "kebab-case")]
pub enum RequestStatus {
    #[sea_orm(string_value = "pending")]
    #[strum(serialize = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    #[strum(serialize = "approved")]
    Approved,
    #[sea_orm(string_value = "in-process")]
    #[strum(serialize = "in-process")]
    InProcess,
    #[sea_orm(string_value = "in-transit")]
    #[strum(serialize = "in-transit")]
    InTransit,
    #[sea_orm(string_value = "delivered")]
    #[strum(serialize = "delivered")]
    Delivered,
    #[sea_orm(string_value = "rejected")]
    #[strum(serialize = "rejected")]
    Rejected,
}

impl RequestStatus {
    /// Validates a status transition against the lifecycle table.
    ///
    /// Transitioning to the same status is a no-op and always allowed;
    /// everything not in the table is rejected, which closes the unguarded
    /// direct-status-set gap.
    pub fn can_transition(self, to: RequestStatus) -> bool {
        use RequestStatus::*;
        match (self, to) {
            (Pending, Approved) => true,
            (Pending, Rejected) => true,
            (Approved, InProcess) => true,
            (Approved, InTransit) => true,
            (InProcess, InTransit) => true,
            (InTransit, Delivered) => true,
            (from, to) if from == to => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Delivered | RequestStatus::Rejected)
    }
}

/// Ticket flavor: a plain material request or a material return/correction,
/// which has its own notification routing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum RequestType {
    #[sea_orm(string_value = "MR")]
    #[serde(rename = "MR")]
    Mr,
    #[sea_orm(string_value = "MRC")]
    #[serde(rename = "MRC")]
    Mrc,
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestType::Mr => write!(f, "MR"),
            RequestType::Mrc => write!(f, "MRC"),
        }
    }
}

/// Mode of transport for a dispatched request.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
    strum::EnumString,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum TransportMode {
    #[sea_orm(string_value = "Train")]
    #[strum(serialize = "Train")]
    Train,
    #[sea_orm(string_value = "Bus")]
    #[strum(serialize = "Bus")]
    Bus,
    #[sea_orm(string_value = "Courier")]
    #[strum(serialize = "Courier")]
    Courier,
}

/// Where a line item is sourced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum SourceOption {
    Store,
    #[serde(rename = "CSD")]
    Csd,
    #[serde(rename = "Site Purchase")]
    SitePurchase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum UrgencyOption {
    Low,
    Medium,
    High,
}

/// One line item within a material request.
///
/// `id` is unique within the request and stable for its lifetime; rows are
/// only appended or patched, never reordered by background sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MaterialItemRow {
    pub id: String,
    pub description: String,
    pub quantity: i32,
    pub source: SourceOption,
    pub urgency: UrgencyOption,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_qty: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_qty: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mrf_no: Option<String>,
    /// Material-issue form number; meaningful only when `source` is `Store`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mif_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_qty: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_qty: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mrc_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_mode_row: Option<TransportMode>,
}

/// Full material request record as read by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MaterialRequest {
    pub id: Uuid,
    pub title: String,
    pub request_type: RequestType,
    pub items: Vec<MaterialItemRow>,
    pub requested_by: String,
    pub requester_email: Option<String>,
    pub requester_id: Option<String>,
    pub ticket_number: Option<String>,
    pub zone: Option<String>,
    pub description: Option<String>,
    pub status: RequestStatus,
    pub transport_mode: Option<TransportMode>,
    pub edt: Option<DateTime<Utc>>,
    pub tracking_no: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<crate::entities::material_request::Model> for MaterialRequest {
    type Error = ServiceError;

    fn try_from(model: crate::entities::material_request::Model) -> Result<Self, Self::Error> {
        let items = parse_items(&model.items)?;
        Ok(MaterialRequest {
            id: model.id,
            title: model.title,
            request_type: model.request_type,
            items,
            requested_by: model.requested_by,
            requester_email: model.requester_email,
            requester_id: model.requester_id,
            ticket_number: model.ticket_number,
            zone: model.zone,
            description: model.description,
            status: model.status,
            transport_mode: model.transport_mode,
            edt: model.edt,
            tracking_no: model.tracking_no,
            sent_at: model.sent_at,
            approved_by: model.approved_by,
            approved_at: model.approved_at,
            approved_by_email: model.approved_by_email,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

/// Decodes the JSON items column into typed rows.
pub fn parse_items(value: &serde_json::Value) -> Result<Vec<MaterialItemRow>, ServiceError> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(value.clone()).map_err(|e| {
        ServiceError::SerializationError(format!("malformed items payload: {}", e))
    })
}

pub fn items_to_value(items: &[MaterialItemRow]) -> Result<serde_json::Value, ServiceError> {
    serde_json::to_value(items).map_err(ServiceError::from)
}

/// Shipment details collected at the mark-sent step.
///
/// The courier name participates in validation only; it is never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShipmentConfirmation {
    pub transport_mode: TransportMode,
    pub edt: Option<DateTime<Utc>>,
    pub courier_name: Option<String>,
    pub tracking_no: Option<String>,
}

impl ShipmentConfirmation {
    /// Pure client-side rules for the in-transit transition: Train/Bus need
    /// an estimated delivery date, Courier needs a courier name and a
    /// tracking number. A failure blocks the transition before any write.
    pub fn validate(&self) -> Result<(), ServiceError> {
        match self.transport_mode {
            TransportMode::Train | TransportMode::Bus => {
                if self.edt.is_none() {
                    return Err(ServiceError::ValidationError(format!(
                        "edt is required for {} shipments",
                        self.transport_mode
                    )));
                }
            }
            TransportMode::Courier => {
                if self
                    .courier_name
                    .as_deref()
                    .map_or(true, |name| name.trim().is_empty())
                {
                    return Err(ServiceError::ValidationError(
                        "courier_name is required for Courier shipments".to_string(),
                    ));
                }
                if self
                    .tracking_no
                    .as_deref()
                    .map_or(true, |no| no.trim().is_empty())
                {
                    return Err(ServiceError::ValidationError(
                        "tracking_no is required for Courier shipments".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Appends the missing-on-receipt annotation to a remark, preserving any
/// prior content. Idempotent: a remark that already carries the annotation
/// is returned unchanged, so a retried confirmation cannot double-append.
pub fn append_missing_remark(remarks: Option<&str>) -> String {
    match remarks {
        Some(existing) if existing.contains(MISSING_ON_RECEIPT) => existing.to_string(),
        Some(existing) if !existing.trim().is_empty() => {
            format!("{}{}{}", existing, REMARK_SEPARATOR, MISSING_ON_RECEIPT)
        }
        _ => MISSING_ON_RECEIPT.to_string(),
    }
}

/// Receipt reconciliation: annotates every row whose id is not in the
/// received set. Row order and ids are untouched; received rows keep their
/// remarks verbatim. Returns the number of missing rows.
pub fn annotate_missing_items(
    items: &mut [MaterialItemRow],
    received_ids: &HashSet<String>,
) -> usize {
    let mut missing = 0;
    for row in items.iter_mut() {
        if !received_ids.contains(&row.id) {
            row.remarks = Some(append_missing_remark(row.remarks.as_deref()));
            missing += 1;
        }
    }
    missing
}
