use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::material_requests as request_handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "MatFlow API",
        version = "0.3.0",
        description = "Material request workflow service: engineers raise \
requests, regional managers approve them, store managers fulfill and ship \
them, and engineers confirm receipt. All endpoints under /api/v1 require a \
bearer token carrying the caller's department."
    ),
    paths(
        request_handlers::list_requests,
        request_handlers::get_request,
        request_handlers::create_request,
        request_handlers::update_request,
        request_handlers::approve_request,
        request_handlers::reject_request,
        request_handlers::update_status,
        request_handlers::mark_sent,
        request_handlers::confirm_receipt,
        request_handlers::delete_request,
        request_handlers::request_stats,
    ),
    components(schemas(
        crate::models::material_request::MaterialRequest,
        crate::models::material_request::MaterialItemRow,
        crate::models::material_request::RequestStatus,
        crate::models::material_request::RequestType,
        crate::models::material_request::TransportMode,
        crate::models::material_request::SourceOption,
        crate::models::material_request::UrgencyOption,
        crate::models::material_request::ShipmentConfirmation,
        request_handlers::CreateRequestPayload,
        request_handlers::UpdateRequestPayload,
        request_handlers::UpdateStatusPayload,
        request_handlers::ConfirmReceiptPayload,
        request_handlers::ReceiptResponse,
        request_handlers::NewItemRow,
        crate::services::reports::RequestStats,
        crate::errors::ErrorResponse,
    )),
    tags((name = "material-requests", description = "Material request workflow"))
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
