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
    models::material_request::RequestStatus,
};

/// Guarded status transition. When the target is `in-transit` the dispatch
/// timestamp lands in the same write as the status so no reader ever
/// observes a half-updated record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequestStatusCommand {
    pub request_id: Uuid,
    pub new_status: RequestStatus,
}

#[async_trait::async_trait]
impl Command for UpdateRequestStatusCommand {
    type Result = material_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id, new_status = %self.new_status))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let request = material_request::Entity::find_by_id(self.request_id)
            .one(&*db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Material request {} not found",
                    self.request_id
                ))
            })?;

        let old_status = request.status;

        if old_status == self.new_status {
            // no-op transition, nothing to write
            return Ok(request);
        }

        if !old_status.can_transition(self.new_status) {
            return Err(ServiceError::InvalidStatus(format!(
                "cannot transition from {} to {}",
                old_status, self.new_status
            )));
        }

        let mut active: material_request::ActiveModel = request.clone().into();
        active.status = Set(self.new_status);
        active.updated_at = Set(Some(Utc::now()));

        if self.new_status == RequestStatus::InTransit {
            if request.transport_mode.is_none() {
                return Err(ServiceError::ValidationError(
                    "transport_mode must be set before a request can be dispatched".to_string(),
                ));
            }
            if request.sent_at.is_none() {
                active.sent_at = Set(Some(Utc::now()));
            }
        }

        let updated = active.update(&*db_pool).await.map_err(|e| {
            error!(
                "Failed to update status of request {}: {}",
                self.request_id, e
            );
            ServiceError::DatabaseError(e)
        })?;

        self.log_and_trigger_event(event_sender, &updated, old_status)
            .await?;

        Ok(updated)
    }
}

impl UpdateRequestStatusCommand {
    async fn log_and_trigger_event(
        &self,
        event_sender: Arc<EventSender>,
        request: &material_request::Model,
        old_status: RequestStatus,
    ) -> Result<(), ServiceError> {
        info!(
            request_id = %request.id,
            from = %old_status,
            to = %self.new_status,
            "material request status updated"
        );

        match self.new_status {
            RequestStatus::InTransit => {
                event_sender
                    .send(Event::RequestSent(request.id))
                    .await
                    .map_err(|e| ServiceError::EventError(e))?;
            }
            RequestStatus::Delivered => {
                event_sender
                    .send(Event::RequestDelivered(request.id))
                    .await
                    .map_err(|e| ServiceError::EventError(e))?;
            }
            _ => {}
        }

        event_sender
            .send(Event::RequestStatusChanged {
                request_id: request.id,
                old_status: old_status.to_string(),
                new_status: self.new_status.to_string(),
            })
            .await
            .map_err(ServiceError::EventError)
    }
}
