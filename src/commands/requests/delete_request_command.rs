use std::sync::Arc;

use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    commands::Command,
    db::DbPool,
    entities::material_request,
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Hard delete. Authorization (regional manager only) is checked by the
/// service before this command is ever constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequestCommand {
    pub request_id: Uuid,
}

#[async_trait::async_trait]
impl Command for DeleteRequestCommand {
    type Result = ();

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let result = material_request::Entity::delete_by_id(self.request_id)
            .exec(&*db_pool)
            .await
            .map_err(|e| {
                error!("Failed to delete request {}: {}", self.request_id, e);
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Material request {} not found",
                self.request_id
            )));
        }

        info!(request_id = %self.request_id, "material request deleted");
        event_sender
            .send(Event::RequestDeleted(self.request_id))
            .await
            .map_err(ServiceError::EventError)
    }
}
