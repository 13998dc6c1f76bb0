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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectRequestCommand {
    pub request_id: Uuid,
}

#[async_trait::async_trait]
impl Command for RejectRequestCommand {
    type Result = material_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let rejected = self.reject_request(&db_pool).await?;
        self.log_and_trigger_event(event_sender, &rejected).await?;
        Ok(rejected)
    }
}

impl RejectRequestCommand {
    async fn reject_request(
        &self,
        db: &sea_orm::DatabaseConnection,
    ) -> Result<material_request::Model, ServiceError> {
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

        if request.status != RequestStatus::Pending {
            return Err(ServiceError::InvalidStatus(format!(
                "only pending requests can be rejected (current status: {})",
                request.status
            )));
        }

        let mut active: material_request::ActiveModel = request.into();
        active.status = Set(RequestStatus::Rejected);
        active.updated_at = Set(Some(Utc::now()));

        active.update(db).await.map_err(|e| {
            error!("Failed to reject request {}: {}", self.request_id, e);
            ServiceError::DatabaseError(e)
        })
    }

    async fn log_and_trigger_event(
        &self,
        event_sender: Arc<EventSender>,
        request: &material_request::Model,
    ) -> Result<(), ServiceError> {
        info!(request_id = %request.id, "material request rejected");
        event_sender
            .send(Event::RequestRejected(request.id))
            .await
            .map_err(|e| ServiceError::EventError(e))?;
        event_sender
            .send(Event::RequestStatusChanged {
                request_id: request.id,
                old_status: RequestStatus::Pending.to_string(),
                new_status: RequestStatus::Rejected.to_string(),
            })
            .await
            .map_err(ServiceError::EventError)
    }
}
