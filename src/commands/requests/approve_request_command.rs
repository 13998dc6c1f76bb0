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
    models::material_request::{parse_items, RequestStatus},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveRequestCommand {
    pub request_id: Uuid,
    /// Display name of the approving manager
    pub approved_by: String,
    pub approved_by_email: Option<String>,
}

#[async_trait::async_trait]
impl Command for ApproveRequestCommand {
    type Result = material_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let approved = self.approve_request(&db_pool).await?;
        self.log_and_trigger_event(event_sender, &approved).await?;
        Ok(approved)
    }
}

impl ApproveRequestCommand {
    async fn approve_request(
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
                "only pending requests can be approved (current status: {})",
                request.status
            )));
        }

        if parse_items(&request.items)?.is_empty() {
            return Err(ServiceError::ValidationError(
                "request has no line items to approve".to_string(),
            ));
        }

        let mut active: material_request::ActiveModel = request.into();
        active.status = Set(RequestStatus::Approved);
        active.approved_by = Set(Some(self.approved_by.clone()));
        active.approved_by_email = Set(self.approved_by_email.clone());
        active.approved_at = Set(Some(Utc::now()));
        active.updated_at = Set(Some(Utc::now()));

        active.update(db).await.map_err(|e| {
            error!("Failed to approve request {}: {}", self.request_id, e);
            ServiceError::DatabaseError(e)
        })
    }

    async fn log_and_trigger_event(
        &self,
        event_sender: Arc<EventSender>,
        request: &material_request::Model,
    ) -> Result<(), ServiceError> {
        info!(
            request_id = %request.id,
            approved_by = %self.approved_by,
            "material request approved"
        );
        event_sender
            .send(Event::RequestApproved(request.id))
            .await
            .map_err(|e| ServiceError::EventError(e))?;
        event_sender
            .send(Event::RequestStatusChanged {
                request_id: request.id,
                old_status: RequestStatus::Pending.to_string(),
                new_status: RequestStatus::Approved.to_string(),
            })
            .await
            .map_err(ServiceError::EventError)
    }
}
