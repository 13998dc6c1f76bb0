use std::sync::Arc;

use chrono::{DateTime, Utc};
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
    models::material_request::{items_to_value, MaterialItemRow, TransportMode},
};

/// Field-level patch. Only fields present in the patch are written; absent
/// fields are never overwritten, so concurrent edits to other fields on the
/// same record are not clobbered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestPatch {
    pub title: Option<String>,
    pub items: Option<Vec<MaterialItemRow>>,
    pub ticket_number: Option<String>,
    pub zone: Option<String>,
    pub description: Option<String>,
    pub transport_mode: Option<TransportMode>,
    pub edt: Option<DateTime<Utc>>,
    pub tracking_no: Option<String>,
}

impl RequestPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.items.is_none()
            && self.ticket_number.is_none()
            && self.zone.is_none()
            && self.description.is_none()
            && self.transport_mode.is_none()
            && self.edt.is_none()
            && self.tracking_no.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequestCommand {
    pub request_id: Uuid,
    pub patch: RequestPatch,
}

#[async_trait::async_trait]
impl Command for UpdateRequestCommand {
    type Result = material_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        if self.patch.is_empty() {
            return Err(ServiceError::ValidationError(
                "patch contains no fields to update".to_string(),
            ));
        }

        let updated = self.apply_patch(&db_pool).await?;
        self.log_and_trigger_event(event_sender, &updated).await?;
        Ok(updated)
    }
}

impl UpdateRequestCommand {
    async fn apply_patch(
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

        let mut active: material_request::ActiveModel = request.into();

        if let Some(title) = &self.patch.title {
            active.title = Set(title.clone());
        }
        if let Some(items) = &self.patch.items {
            active.items = Set(items_to_value(items)?);
        }
        if let Some(ticket_number) = &self.patch.ticket_number {
            active.ticket_number = Set(Some(ticket_number.clone()));
        }
        if let Some(zone) = &self.patch.zone {
            active.zone = Set(Some(zone.clone()));
        }
        if let Some(description) = &self.patch.description {
            active.description = Set(Some(description.clone()));
        }
        if let Some(transport_mode) = self.patch.transport_mode {
            active.transport_mode = Set(Some(transport_mode));
        }
        if let Some(edt) = self.patch.edt {
            active.edt = Set(Some(edt));
        }
        if let Some(tracking_no) = &self.patch.tracking_no {
            active.tracking_no = Set(Some(tracking_no.clone()));
        }
        active.updated_at = Set(Some(Utc::now()));

        active.update(db).await.map_err(|e| {
            error!("Failed to update request {}: {}", self.request_id, e);
            ServiceError::DatabaseError(e)
        })
    }

    async fn log_and_trigger_event(
        &self,
        event_sender: Arc<EventSender>,
        request: &material_request::Model,
    ) -> Result<(), ServiceError> {
        info!(request_id = %request.id, "material request updated");
        event_sender
            .send(Event::RequestUpdated(request.id))
            .await
            .map_err(ServiceError::EventError)
    }
}
