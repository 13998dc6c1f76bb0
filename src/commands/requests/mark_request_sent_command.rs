use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    commands::Command,
    db::DbPool,
    entities::material_request,
    errors::ServiceError,
    events::{Event, EventSender},
    models::material_request::{parse_items, RequestStatus, ShipmentConfirmation},
};

/// Dispatch step: validates the transport-mode-specific fields, then lands
/// the transport metadata, `sent_at` stamp and the in-transit status in a
/// single persistence write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkRequestSentCommand {
    pub request_id: Uuid,
    pub confirmation: ShipmentConfirmation,
}

#[async_trait::async_trait]
impl Command for MarkRequestSentCommand {
    type Result = material_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.confirmation.validate()?;

        let (sent, old_status) = self.mark_sent(&db_pool).await?;
        self.log_and_trigger_event(event_sender, &sent, old_status)
            .await?;
        Ok(sent)
    }
}

impl MarkRequestSentCommand {
    async fn mark_sent(
        &self,
        db: &sea_orm::DatabaseConnection,
    ) -> Result<(material_request::Model, RequestStatus), ServiceError> {
        let request = material_request::Entity::find_by_id(self.request_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Material request {} not found",
                    self.request_id
                ))
            })?;

        if !matches!(
            request.status,
            RequestStatus::Approved | RequestStatus::InProcess
        ) {
            return Err(ServiceError::InvalidStatus(format!(
                "only approved requests can be marked as sent (current status: {})",
                request.status
            )));
        }

        if parse_items(&request.items)?.is_empty() {
            return Err(ServiceError::ValidationError(
                "request has no line items to send".to_string(),
            ));
        }

        let old_status = request.status;
        let mut active: material_request::ActiveModel = request.into();
        active.transport_mode = Set(Some(self.confirmation.transport_mode));
        active.edt = Set(self.confirmation.edt);
        active.tracking_no = Set(self
            .confirmation
            .tracking_no
            .as_deref()
            .map(|no| no.trim().to_string())
            .filter(|no| !no.is_empty()));
        active.sent_at = Set(Some(Utc::now()));
        active.status = Set(RequestStatus::InTransit);
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await.map_err(|e| {
            error!("Failed to mark request {} as sent: {}", self.request_id, e);
            ServiceError::DatabaseError(e)
        })?;

        info!(
            request_id = %updated.id,
            transport_mode = %self.confirmation.transport_mode,
            from = %old_status,
            "material request dispatched"
        );

        Ok((updated, old_status))
    }

    async fn log_and_trigger_event(
        &self,
        event_sender: Arc<EventSender>,
        request: &material_request::Model,
        old_status: RequestStatus,
    ) -> Result<(), ServiceError> {
        event_sender
            .send(Event::RequestSent(request.id))
            .await
            .map_err(|e| ServiceError::EventError(e))?;
        event_sender
            .send(Event::RequestStatusChanged {
                request_id: request.id,
                old_status: old_status.to_string(),
                new_status: RequestStatus::InTransit.to_string(),
            })
            .await
            .map_err(ServiceError::EventError)
    }
}
