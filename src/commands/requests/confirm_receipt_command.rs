use std::collections::HashSet;
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
    models::material_request::{
        annotate_missing_items, items_to_value, parse_items, RequestStatus,
    },
};

/// Receipt reconciliation: rows not in the received checklist get the
/// missing-on-receipt annotation, then the record moves to delivered. The
/// annotation is deduplicated, so re-running the confirmation with the same
/// checklist produces identical remark content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmReceiptCommand {
    pub request_id: Uuid,
    pub received_item_ids: Vec<String>,
}

pub struct ReceiptOutcome {
    pub request: material_request::Model,
    pub missing_items: usize,
    old_status: RequestStatus,
}

#[async_trait::async_trait]
impl Command for ConfirmReceiptCommand {
    type Result = ReceiptOutcome;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let outcome = self.reconcile(&db_pool).await?;
        self.log_and_trigger_event(event_sender, &outcome).await?;
        Ok(outcome)
    }
}

impl ConfirmReceiptCommand {
    async fn reconcile(
        &self,
        db: &sea_orm::DatabaseConnection,
    ) -> Result<ReceiptOutcome, ServiceError> {
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

        // delivered is accepted again so a retried confirmation stays safe
        if !matches!(
            request.status,
            RequestStatus::InTransit | RequestStatus::Delivered
        ) {
            return Err(ServiceError::InvalidStatus(format!(
                "only in-transit requests can be received (current status: {})",
                request.status
            )));
        }

        let mut items = parse_items(&request.items)?;
        if items.is_empty() {
            return Err(ServiceError::ValidationError(
                "request has no line items to receive".to_string(),
            ));
        }

        let received: HashSet<String> = self.received_item_ids.iter().cloned().collect();
        let missing = annotate_missing_items(&mut items, &received);
        let old_status = request.status;

        let mut active: material_request::ActiveModel = request.into();
        active.items = Set(items_to_value(&items)?);
        active.status = Set(RequestStatus::Delivered);
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await.map_err(|e| {
            error!(
                "Failed to confirm receipt of request {}: {}",
                self.request_id, e
            );
            ServiceError::DatabaseError(e)
        })?;

        info!(
            request_id = %updated.id,
            missing_items = missing,
            from = %old_status,
            "material request receipt confirmed"
        );

        Ok(ReceiptOutcome {
            request: updated,
            missing_items: missing,
            old_status,
        })
    }

    async fn log_and_trigger_event(
        &self,
        event_sender: Arc<EventSender>,
        outcome: &ReceiptOutcome,
    ) -> Result<(), ServiceError> {
        event_sender
            .send(Event::RequestDelivered(outcome.request.id))
            .await
            .map_err(|e| ServiceError::EventError(e))?;
        event_sender
            .send(Event::RequestStatusChanged {
                request_id: outcome.request.id,
                old_status: outcome.old_status.to_string(),
                new_status: RequestStatus::Delivered.to_string(),
            })
            .await
            .map_err(ServiceError::EventError)
    }
}
