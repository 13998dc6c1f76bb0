use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use slog::{info, Logger};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Department;
use crate::entities::material_request;
use crate::models::material_request::{RequestStatus, RequestType};

/// Event types understood by the notification relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum NotificationKind {
    #[serde(rename = "MR_CREATED_BY_ENGINEER")]
    MrCreatedByEngineer,
    #[serde(rename = "MR_CREATED_BY_RM")]
    MrCreatedByRm,
    #[serde(rename = "MRC_CREATED")]
    MrcCreated,
    #[serde(rename = "MR_APPROVED")]
    MrApproved,
    #[serde(rename = "MR_ITEMS_SENT")]
    MrItemsSent,
    #[serde(rename = "MR_STATUS_CHANGED")]
    MrStatusChanged,
}

/// Compact request payload shipped with every notification. Line items are
/// deliberately omitted; recipients follow the link into the app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RequestDigest {
    pub id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: RequestStatus,
    pub requested_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester_email: Option<String>,
}

impl From<&material_request::Model> for RequestDigest {
    fn from(model: &material_request::Model) -> Self {
        Self {
            id: model.id,
            title: model.title.clone(),
            ticket_number: model.ticket_number.clone(),
            zone: model.zone.clone(),
            description: model.description.clone(),
            status: model.status,
            requested_by: model.requested_by.clone(),
            requester_email: model.requester_email.clone(),
        }
    }
}

/// One notification hand-off to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NotificationRequest {
    pub event_type: NotificationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    pub request: RequestDigest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_departments: Option<Vec<Department>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_recipients: Option<Vec<String>>,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Relay rejected notification: {0}")]
    Relay(String),
}

/// Outbound notification delivery. Delivery is best-effort by contract:
/// callers log failures and never propagate them into the triggering
/// business operation.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch(&self, notification: &NotificationRequest) -> Result<(), NotificationError>;
}

/// Posts notifications to the configured relay endpoint.
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: String,
    logger: Logger,
}

impl WebhookNotifier {
    pub fn new(endpoint: String, logger: Logger) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            logger,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn dispatch(&self, notification: &NotificationRequest) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(notification)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Relay(format!("{}: {}", status, body)));
        }

        info!(self.logger, "notification relayed";
            "event_type" => format!("{:?}", notification.event_type),
            "request_id" => notification.request.id.to_string(),
        );
        Ok(())
    }
}

/// Fallback used when no relay endpoint is configured: notifications are
/// logged and considered delivered.
pub struct LogNotifier {
    logger: Logger,
}

impl LogNotifier {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn dispatch(&self, notification: &NotificationRequest) -> Result<(), NotificationError> {
        info!(self.logger, "notification (no relay configured)";
            "event_type" => format!("{:?}", notification.event_type),
            "request_id" => notification.request.id.to_string(),
            "targets" => format!("{:?}", notification.target_departments),
        );
        Ok(())
    }
}

/// Builds routed notifications for each workflow transition.
pub struct NotificationBuilder;

impl NotificationBuilder {
    /// Creation fan-out depends on who raised the ticket: engineer-created
    /// requests go to the regional manager, RM-created ones to the store
    /// manager, and MRC tickets to both.
    pub fn created(request: &material_request::Model, creator: Department) -> NotificationRequest {
        let (event_type, targets) = match request.request_type {
            RequestType::Mrc => (
                NotificationKind::MrcCreated,
                vec![Department::RegionalManager, Department::StoreManager],
            ),
            RequestType::Mr => match creator {
                Department::RegionalManager => (
                    NotificationKind::MrCreatedByRm,
                    vec![Department::StoreManager],
                ),
                _ => (
                    NotificationKind::MrCreatedByEngineer,
                    vec![Department::RegionalManager],
                ),
            },
        };

        NotificationRequest {
            event_type,
            zone: request.zone.clone(),
            request: RequestDigest::from(request),
            target_departments: Some(targets),
            extra_recipients: None,
        }
    }

    pub fn approved(request: &material_request::Model) -> NotificationRequest {
        NotificationRequest {
            event_type: NotificationKind::MrApproved,
            zone: request.zone.clone(),
            request: RequestDigest::from(request),
            target_departments: Some(vec![Department::StoreManager, Department::Engineer]),
            extra_recipients: request.requester_email.clone().map(|email| vec![email]),
        }
    }

    pub fn items_sent(request: &material_request::Model) -> NotificationRequest {
        let targets = match request.request_type {
            RequestType::Mrc => vec![Department::RegionalManager],
            RequestType::Mr => vec![Department::Engineer, Department::RegionalManager],
        };

        NotificationRequest {
            event_type: NotificationKind::MrItemsSent,
            zone: request.zone.clone(),
            request: RequestDigest::from(request),
            target_departments: Some(targets),
            extra_recipients: None,
        }
    }

    /// Status-change notice to the individuals involved: the requester and,
    /// once an approval has been recorded, the approving manager.
    pub fn status_changed(
        request: &material_request::Model,
        status: RequestStatus,
    ) -> NotificationRequest {
        let mut digest = RequestDigest::from(request);
        digest.status = status;

        let mut recipients = Vec::new();
        if let Some(email) = &request.requester_email {
            recipients.push(email.clone());
        }
        if let Some(email) = &request.approved_by_email {
            if !recipients.contains(email) {
                recipients.push(email.clone());
            }
        }

        NotificationRequest {
            event_type: NotificationKind::MrStatusChanged,
            zone: request.zone.clone(),
            request: digest,
            target_departments: None,
            extra_recipients: Some(recipients),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn model(request_type: RequestType) -> material_request::Model {
        material_request::Model {
            id: Uuid::new_v4(),
            title: "Cable drums".to_string(),
            request_type,
            items: serde_json::json!([]),
            requested_by: "Asha".to_string(),
            requester_email: Some("asha@example.com".to_string()),
            requester_id: Some("user-1".to_string()),
            ticket_number: Some("TKT-00123".to_string()),
            zone: Some("Zone B".to_string()),
            description: None,
            status: RequestStatus::Pending,
            transport_mode: None,
            edt: None,
            tracking_no: None,
            sent_at: None,
            approved_by: None,
            approved_at: None,
            approved_by_email: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn creation_routes_by_creator_and_type() {
        let n = NotificationBuilder::created(&model(RequestType::Mr), Department::Engineer);
        assert_eq!(n.event_type, NotificationKind::MrCreatedByEngineer);
        assert_eq!(
            n.target_departments,
            Some(vec![Department::RegionalManager])
        );

        let n = NotificationBuilder::created(&model(RequestType::Mr), Department::RegionalManager);
        assert_eq!(n.event_type, NotificationKind::MrCreatedByRm);
        assert_eq!(n.target_departments, Some(vec![Department::StoreManager]));

        let n = NotificationBuilder::created(&model(RequestType::Mrc), Department::Engineer);
        assert_eq!(n.event_type, NotificationKind::MrcCreated);
        assert_eq!(
            n.target_departments,
            Some(vec![Department::RegionalManager, Department::StoreManager])
        );
    }

    #[test]
    fn items_sent_routes_by_request_type() {
        let n = NotificationBuilder::items_sent(&model(RequestType::Mr));
        assert_eq!(
            n.target_departments,
            Some(vec![Department::Engineer, Department::RegionalManager])
        );

        let n = NotificationBuilder::items_sent(&model(RequestType::Mrc));
        assert_eq!(
            n.target_departments,
            Some(vec![Department::RegionalManager])
        );
    }

    #[test]
    fn status_change_reaches_requester_and_approver_once() {
        let mut m = model(RequestType::Mr);
        m.approved_by_email = Some("rm@example.com".to_string());

        let n = NotificationBuilder::status_changed(&m, RequestStatus::InTransit);
        assert_eq!(n.request.status, RequestStatus::InTransit);
        assert_eq!(
            n.extra_recipients,
            Some(vec![
                "asha@example.com".to_string(),
                "rm@example.com".to_string()
            ])
        );

        // approver == requester must not produce a duplicate recipient
        m.approved_by_email = m.requester_email.clone();
        let n = NotificationBuilder::status_changed(&m, RequestStatus::Delivered);
        assert_eq!(
            n.extra_recipients,
            Some(vec!["asha@example.com".to_string()])
        );
    }

    #[test]
    fn event_types_use_relay_names() {
        assert_eq!(
            serde_json::to_value(NotificationKind::MrCreatedByEngineer).unwrap(),
            serde_json::json!("MR_CREATED_BY_ENGINEER")
        );
        assert_eq!(
            serde_json::to_value(NotificationKind::MrItemsSent).unwrap(),
            serde_json::json!("MR_ITEMS_SENT")
        );
        assert_eq!(
            serde_json::to_value(NotificationKind::MrcCreated).unwrap(),
            serde_json::json!("MRC_CREATED")
        );
    }
}
