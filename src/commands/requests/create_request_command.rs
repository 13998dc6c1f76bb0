use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    commands::Command,
    db::DbPool,
    entities::material_request,
    errors::ServiceError,
    events::{Event, EventSender},
    models::material_request::{items_to_value, MaterialItemRow, RequestStatus, RequestType, TransportMode},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequestCommand {
    pub title: String,
    pub request_type: RequestType,
    pub items: Vec<MaterialItemRow>,
    pub requested_by: String,
    pub requester_email: Option<String>,
    pub requester_id: Option<String>,
    pub ticket_number: Option<String>,
    pub zone: Option<String>,
    pub description: Option<String>,
    pub initial_status: Option<RequestStatus>,
    pub transport_mode: Option<TransportMode>,
    pub edt: Option<DateTime<Utc>>,
    pub tracking_no: Option<String>,
}

#[async_trait::async_trait]
impl Command for CreateRequestCommand {
    type Result = material_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(title = %self.title))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let created = self.insert_request(&db_pool).await?;
        self.log_and_trigger_event(event_sender, &created).await?;
        Ok(created)
    }
}

impl CreateRequestCommand {
    async fn insert_request(
        &self,
        db: &sea_orm::DatabaseConnection,
    ) -> Result<material_request::Model, ServiceError> {
        let request = material_request::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(self.title.clone()),
            request_type: Set(self.request_type),
            items: Set(items_to_value(&self.items)?),
            requested_by: Set(self.requested_by.clone()),
            requester_email: Set(self.requester_email.clone()),
            requester_id: Set(self.requester_id.clone()),
            ticket_number: Set(self.ticket_number.clone()),
            zone: Set(self.zone.clone()),
            description: Set(self.description.clone()),
            status: Set(self.initial_status.unwrap_or(RequestStatus::Pending)),
            transport_mode: Set(self.transport_mode),
            edt: Set(self.edt),
            tracking_no: Set(self.tracking_no.clone()),
            sent_at: Set(None),
            approved_by: Set(None),
            approved_at: Set(None),
            approved_by_email: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };

        request.insert(db).await.map_err(|e| {
            error!("Failed to create material request: {}", e);
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
            request_type = %request.request_type,
            "material request created"
        );
        event_sender
            .send(Event::RequestCreated(request.id))
            .await
            .map_err(|e| {
                error!(
                    "Failed to send RequestCreated event for request {}: {}",
                    request.id, e
                );
                ServiceError::EventError(e)
            })
    }
}
