use std::sync::Arc;

use chrono::{DateTime, Utc};
use slog::{warn, Logger};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{authorize, AuthUser, Operation},
    commands::requests::{
        ApproveRequestCommand, ConfirmReceiptCommand, CreateRequestCommand, DeleteRequestCommand,
        MarkRequestSentCommand, RejectRequestCommand, RequestPatch, UpdateRequestCommand,
        UpdateRequestStatusCommand,
    },
    commands::Command,
    db::DbPool,
    errors::ServiceError,
    events::EventSender,
    models::material_request::{
        MaterialItemRow, MaterialRequest, RequestStatus, RequestType, ShipmentConfirmation,
        TransportMode,
    },
    notifications::{NotificationBuilder, NotificationRequest, Notifier},
};

/// Input for raising a new request. Requester identity comes from the
/// authenticated actor, never from the payload.
#[derive(Debug, Clone, Default)]
pub struct NewRequestInput {
    pub title: String,
    pub request_type: Option<RequestType>,
    pub items: Vec<MaterialItemRow>,
    pub ticket_number: Option<String>,
    pub zone: Option<String>,
    pub description: Option<String>,
    pub initial_status: Option<RequestStatus>,
    pub transport_mode: Option<TransportMode>,
    pub edt: Option<DateTime<Utc>>,
    pub tracking_no: Option<String>,
}

/// The request store: every mutation checks the actor's capability, writes
/// through to persistence via a command, and only then fans out
/// notifications. Notification failures are logged and swallowed; the
/// business transition has already committed and must not be rolled back.
#[derive(Clone)]
pub struct MaterialRequestService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    notifier: Arc<dyn Notifier>,
    logger: Logger,
}

impl MaterialRequestService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        notifier: Arc<dyn Notifier>,
        logger: Logger,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            notifier,
            logger,
        }
    }

    /// Creates a new request; the creation notification is routed by the
    /// creator's department and the ticket flavor.
    #[instrument(skip(self, actor, input), fields(actor = %actor.user_id))]
    pub async fn create_request(
        &self,
        actor: &AuthUser,
        input: NewRequestInput,
    ) -> Result<MaterialRequest, ServiceError> {
        authorize(actor.department, Operation::Create)?;

        let command = CreateRequestCommand {
            title: input.title,
            request_type: input.request_type.unwrap_or(RequestType::Mr),
            items: input.items,
            requested_by: actor.name.clone(),
            requester_email: actor.email.clone(),
            requester_id: Some(actor.user_id.clone()),
            ticket_number: input.ticket_number,
            zone: input.zone,
            description: input.description,
            initial_status: input.initial_status,
            transport_mode: input.transport_mode,
            edt: input.edt,
            tracking_no: input.tracking_no,
        };

        let created = command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await?;

        self.notify_best_effort(NotificationBuilder::created(&created, actor.department))
            .await;

        MaterialRequest::try_from(created)
    }

    /// Guarded `pending → approved` edge; records the approver's identity
    /// and timestamp in the same write.
    #[instrument(skip(self, actor), fields(request_id = %id))]
    pub async fn approve_request(
        &self,
        actor: &AuthUser,
        id: Uuid,
    ) -> Result<MaterialRequest, ServiceError> {
        authorize(actor.department, Operation::Approve)?;

        let command = ApproveRequestCommand {
            request_id: id,
            approved_by: actor.name.clone(),
            approved_by_email: actor.email.clone(),
        };

        let approved = command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await?;

        self.notify_best_effort(NotificationBuilder::approved(&approved))
            .await;
        self.notify_best_effort(NotificationBuilder::status_changed(
            &approved,
            RequestStatus::Approved,
        ))
        .await;

        MaterialRequest::try_from(approved)
    }

    /// Guarded `pending → rejected` edge. The requester is told directly;
    /// there is no department fan-out for rejections.
    #[instrument(skip(self, actor), fields(request_id = %id))]
    pub async fn reject_request(
        &self,
        actor: &AuthUser,
        id: Uuid,
    ) -> Result<MaterialRequest, ServiceError> {
        authorize(actor.department, Operation::Reject)?;

        let command = RejectRequestCommand { request_id: id };
        let rejected = command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await?;

        self.notify_best_effort(NotificationBuilder::status_changed(
            &rejected,
            RequestStatus::Rejected,
        ))
        .await;

        MaterialRequest::try_from(rejected)
    }

    /// Table-guarded status transition. An in-transit target stamps
    /// `sent_at` in the same persistence write.
    #[instrument(skip(self, actor), fields(request_id = %id, new_status = %new_status))]
    pub async fn update_status(
        &self,
        actor: &AuthUser,
        id: Uuid,
        new_status: RequestStatus,
    ) -> Result<MaterialRequest, ServiceError> {
        authorize(actor.department, Operation::Update)?;

        let command = UpdateRequestStatusCommand {
            request_id: id,
            new_status,
        };
        let updated = command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await?;

        if new_status == RequestStatus::InTransit {
            self.notify_best_effort(NotificationBuilder::items_sent(&updated))
                .await;
        }
        self.notify_best_effort(NotificationBuilder::status_changed(&updated, new_status))
            .await;

        MaterialRequest::try_from(updated)
    }

    /// Dispatch step: validated shipment details, `sent_at` stamp and the
    /// in-transit status all land in one write.
    #[instrument(skip(self, actor, confirmation), fields(request_id = %id))]
    pub async fn mark_sent(
        &self,
        actor: &AuthUser,
        id: Uuid,
        confirmation: ShipmentConfirmation,
    ) -> Result<MaterialRequest, ServiceError> {
        authorize(actor.department, Operation::MarkSent)?;

        let command = MarkRequestSentCommand {
            request_id: id,
            confirmation,
        };
        let sent = command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await?;

        self.notify_best_effort(NotificationBuilder::items_sent(&sent))
            .await;
        self.notify_best_effort(NotificationBuilder::status_changed(
            &sent,
            RequestStatus::InTransit,
        ))
        .await;

        MaterialRequest::try_from(sent)
    }

    /// Field-level patch; absent fields are left untouched.
    #[instrument(skip(self, actor, patch), fields(request_id = %id))]
    pub async fn update_request(
        &self,
        actor: &AuthUser,
        id: Uuid,
        patch: RequestPatch,
    ) -> Result<MaterialRequest, ServiceError> {
        authorize(actor.department, Operation::Update)?;

        let command = UpdateRequestCommand {
            request_id: id,
            patch,
        };
        let updated = command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await?;

        MaterialRequest::try_from(updated)
    }

    /// Receipt reconciliation: unreceived rows are annotated, the record
    /// moves to delivered, and one delivery notification fires.
    #[instrument(skip(self, actor), fields(request_id = %id))]
    pub async fn confirm_receipt(
        &self,
        actor: &AuthUser,
        id: Uuid,
        received_item_ids: Vec<String>,
    ) -> Result<(MaterialRequest, usize), ServiceError> {
        authorize(actor.department, Operation::ConfirmReceipt)?;

        let command = ConfirmReceiptCommand {
            request_id: id,
            received_item_ids,
        };
        let outcome = command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await?;

        self.notify_best_effort(NotificationBuilder::status_changed(
            &outcome.request,
            RequestStatus::Delivered,
        ))
        .await;

        Ok((
            MaterialRequest::try_from(outcome.request)?,
            outcome.missing_items,
        ))
    }

    /// Hard delete, regional managers only. The capability check runs
    /// before any persistence call.
    #[instrument(skip(self, actor), fields(request_id = %id))]
    pub async fn delete_request(&self, actor: &AuthUser, id: Uuid) -> Result<(), ServiceError> {
        authorize(actor.department, Operation::Delete)?;

        let command = DeleteRequestCommand { request_id: id };
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    async fn notify_best_effort(&self, notification: NotificationRequest) {
        if let Err(err) = self.notifier.dispatch(&notification).await {
            warn!(self.logger, "notification dispatch failed";
                "event_type" => format!("{:?}", notification.event_type),
                "request_id" => notification.request.id.to_string(),
                "error" => err.to_string(),
            );
        }
    }
}
