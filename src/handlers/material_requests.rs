use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    commands::requests::RequestPatch,
    errors::ServiceError,
    models::material_request::{
        MaterialItemRow, MaterialRequest, RequestStatus, RequestType, ShipmentConfirmation,
        SourceOption, TransportMode, UrgencyOption,
    },
    services::{reports, NewRequestInput},
    ApiResponse, ApiResult, AppState,
};

/// Line item as submitted on a new request; the row id is generated when
/// the client does not supply one.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewItemRow {
    pub id: Option<String>,
    #[validate(length(min = 1, message = "item description is required"))]
    pub description: String,
    pub quantity: u32,
    pub source: SourceOption,
    pub urgency: UrgencyOption,
    pub approved_qty: Option<i32>,
    pub sent_qty: Option<i32>,
    pub mrf_no: Option<String>,
    pub mif_no: Option<String>,
    pub remarks: Option<String>,
    pub return_qty: Option<i32>,
    pub received_qty: Option<i32>,
    pub mrc_no: Option<String>,
    pub transport_mode_row: Option<TransportMode>,
}

impl From<NewItemRow> for MaterialItemRow {
    fn from(row: NewItemRow) -> Self {
        MaterialItemRow {
            id: row
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| format!("itm_{}", Uuid::new_v4().simple())),
            description: row.description,
            quantity: row.quantity as i32,
            source: row.source,
            urgency: row.urgency,
            approved_qty: row.approved_qty,
            sent_qty: row.sent_qty,
            mrf_no: row.mrf_no,
            mif_no: row.mif_no,
            remarks: row.remarks,
            return_qty: row.return_qty,
            received_qty: row.received_qty,
            mrc_no: row.mrc_no,
            transport_mode_row: row.transport_mode_row,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRequestPayload {
    #[validate(length(min = 1, max = 200, message = "title must not be empty"))]
    pub title: String,
    pub request_type: Option<RequestType>,
    #[validate(length(min = 1, message = "at least one line item is required"))]
    pub items: Vec<NewItemRow>,
    pub ticket_number: Option<String>,
    pub zone: Option<String>,
    pub description: Option<String>,
    pub initial_status: Option<RequestStatus>,
    pub transport_mode: Option<TransportMode>,
    pub edt: Option<DateTime<Utc>>,
    pub tracking_no: Option<String>,
}

/// Partial update; absent fields stay untouched.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateRequestPayload {
    pub title: Option<String>,
    pub items: Option<Vec<MaterialItemRow>>,
    pub ticket_number: Option<String>,
    pub zone: Option<String>,
    pub description: Option<String>,
    pub transport_mode: Option<TransportMode>,
    pub edt: Option<DateTime<Utc>>,
    pub tracking_no: Option<String>,
}

impl From<UpdateRequestPayload> for RequestPatch {
    fn from(payload: UpdateRequestPayload) -> Self {
        RequestPatch {
            title: payload.title,
            items: payload.items,
            ticket_number: payload.ticket_number,
            zone: payload.zone,
            description: payload.description,
            transport_mode: payload.transport_mode,
            edt: payload.edt,
            tracking_no: payload.tracking_no,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusPayload {
    pub status: RequestStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmReceiptPayload {
    /// Ids of the line items actually received; everything else is
    /// annotated as missing.
    #[serde(default)]
    pub received_item_ids: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReceiptResponse {
    pub request: MaterialRequest,
    pub missing_items: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListRequestsQuery {
    /// Force an invalidate-and-refetch instead of serving the cached list.
    #[serde(default)]
    pub refresh: bool,
}

fn validation_error(err: validator::ValidationErrors) -> ServiceError {
    ServiceError::ValidationError(err.to_string())
}

#[utoipa::path(
    get,
    path = "/api/v1/material-requests",
    params(("refresh" = Option<bool>, Query, description = "Bypass the cache and refetch")),
    responses((status = 200, description = "All material requests, newest first", body = [MaterialRequest])),
    tag = "material-requests"
)]
pub async fn list_requests(
    State(state): State<AppState>,
    Query(params): Query<ListRequestsQuery>,
) -> ApiResult<Vec<MaterialRequest>> {
    let requests = if params.refresh {
        state.services.query.invalidate().await;
        state.services.query.refresh().await?
    } else {
        state.services.query.list_requests().await?
    };
    Ok(Json(ApiResponse::success(requests)))
}

#[utoipa::path(
    get,
    path = "/api/v1/material-requests/{id}",
    responses(
        (status = 200, description = "The material request", body = MaterialRequest),
        (status = 404, description = "Unknown request id")
    ),
    tag = "material-requests"
)]
pub async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<MaterialRequest> {
    let request = state
        .services
        .query
        .get_request(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Material request {} not found", id)))?;
    Ok(Json(ApiResponse::success(request)))
}

#[utoipa::path(
    post,
    path = "/api/v1/material-requests",
    request_body = CreateRequestPayload,
    responses(
        (status = 201, description = "Request created", body = MaterialRequest),
        (status = 400, description = "Validation failure")
    ),
    tag = "material-requests"
)]
pub async fn create_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateRequestPayload>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate().map_err(validation_error)?;

    let input = NewRequestInput {
        title: payload.title,
        request_type: payload.request_type,
        items: payload.items.into_iter().map(MaterialItemRow::from).collect(),
        ticket_number: payload.ticket_number,
        zone: payload.zone,
        description: payload.description,
        initial_status: payload.initial_status,
        transport_mode: payload.transport_mode,
        edt: payload.edt,
        tracking_no: payload.tracking_no,
    };

    let created = state.services.requests.create_request(&user, input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

#[utoipa::path(
    put,
    path = "/api/v1/material-requests/{id}",
    request_body = UpdateRequestPayload,
    responses((status = 200, description = "Request updated", body = MaterialRequest)),
    tag = "material-requests"
)]
pub async fn update_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<UpdateRequestPayload>,
) -> ApiResult<MaterialRequest> {
    let updated = state
        .services
        .requests
        .update_request(&user, id, payload.into())
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    post,
    path = "/api/v1/material-requests/{id}/approve",
    responses(
        (status = 200, description = "Request approved", body = MaterialRequest),
        (status = 400, description = "Request is not pending"),
        (status = 403, description = "Caller is not a regional manager")
    ),
    tag = "material-requests"
)]
pub async fn approve_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<MaterialRequest> {
    let approved = state.services.requests.approve_request(&user, id).await?;
    Ok(Json(ApiResponse::success(approved)))
}

#[utoipa::path(
    post,
    path = "/api/v1/material-requests/{id}/reject",
    responses(
        (status = 200, description = "Request rejected", body = MaterialRequest),
        (status = 403, description = "Caller is not a regional manager")
    ),
    tag = "material-requests"
)]
pub async fn reject_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<MaterialRequest> {
    let rejected = state.services.requests.reject_request(&user, id).await?;
    Ok(Json(ApiResponse::success(rejected)))
}

#[utoipa::path(
    put,
    path = "/api/v1/material-requests/{id}/status",
    request_body = UpdateStatusPayload,
    responses(
        (status = 200, description = "Status updated", body = MaterialRequest),
        (status = 400, description = "Transition not allowed by the lifecycle table")
    ),
    tag = "material-requests"
)]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<UpdateStatusPayload>,
) -> ApiResult<MaterialRequest> {
    let updated = state
        .services
        .requests
        .update_status(&user, id, payload.status)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    post,
    path = "/api/v1/material-requests/{id}/send",
    request_body = ShipmentConfirmation,
    responses(
        (status = 200, description = "Request dispatched", body = MaterialRequest),
        (status = 400, description = "Missing transport-mode-specific fields"),
        (status = 403, description = "Caller is not a store manager")
    ),
    tag = "material-requests"
)]
pub async fn mark_sent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(confirmation): Json<ShipmentConfirmation>,
) -> ApiResult<MaterialRequest> {
    let sent = state
        .services
        .requests
        .mark_sent(&user, id, confirmation)
        .await?;
    Ok(Json(ApiResponse::success(sent)))
}

#[utoipa::path(
    post,
    path = "/api/v1/material-requests/{id}/receive",
    request_body = ConfirmReceiptPayload,
    responses(
        (status = 200, description = "Receipt confirmed", body = ReceiptResponse),
        (status = 400, description = "Request is not in transit")
    ),
    tag = "material-requests"
)]
pub async fn confirm_receipt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ConfirmReceiptPayload>,
) -> ApiResult<ReceiptResponse> {
    let (request, missing_items) = state
        .services
        .requests
        .confirm_receipt(&user, id, payload.received_item_ids)
        .await?;
    Ok(Json(ApiResponse::success(ReceiptResponse {
        request,
        missing_items,
    })))
}

#[utoipa::path(
    delete,
    path = "/api/v1/material-requests/{id}",
    responses(
        (status = 200, description = "Request deleted"),
        (status = 403, description = "Caller is not a regional manager"),
        (status = 404, description = "Unknown request id")
    ),
    tag = "material-requests"
)]
pub async fn delete_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<serde_json::Value> {
    state.services.requests.delete_request(&user, id).await?;
    Ok(Json(ApiResponse::success(serde_json::json!({
        "deleted": id.to_string()
    }))))
}

#[utoipa::path(
    get,
    path = "/api/v1/material-requests/stats",
    responses((status = 200, description = "Status-count summary", body = reports::RequestStats)),
    tag = "material-requests"
)]
pub async fn request_stats(State(state): State<AppState>) -> ApiResult<reports::RequestStats> {
    let requests = state.services.query.list_requests().await?;
    Ok(Json(ApiResponse::success(reports::summarize(&requests))))
}
