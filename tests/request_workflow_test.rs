//! End-to-end tests for the material request lifecycle over the HTTP API:
//! create → approve → mark-sent → confirm-receipt, the rejection escape,
//! guard rails on transitions and capabilities, and cache behavior when
//! persistence fails.

mod common;

use axum::http::{Method, StatusCode};
use common::{expect_json, TestApp};
use sea_orm::{ConnectionTrait, DbBackend, Statement};
use serde_json::{json, Value};

fn two_item_payload() -> Value {
    json!({
        "title": "Site cabling materials",
        "zone": "Zone A",
        "description": "Replacement drums for sector 7",
        "items": [
            {"id": "a", "description": "Cable drum 11kV", "quantity": 5, "source": "Store", "urgency": "High"},
            {"id": "b", "description": "Joint kit", "quantity": 3, "source": "CSD", "urgency": "Medium"}
        ]
    })
}

async fn create_request(app: &TestApp, token: &str, payload: Value) -> Value {
    let response = app
        .request(Method::POST, "/api/v1/material-requests", Some(token), Some(payload))
        .await;
    let body = expect_json(response, StatusCode::CREATED).await;
    body["data"].clone()
}

fn item<'a>(request: &'a Value, id: &str) -> &'a Value {
    request["items"]
        .as_array()
        .expect("items array")
        .iter()
        .find(|row| row["id"] == id)
        .unwrap_or_else(|| panic!("item {} not found", id))
}

#[tokio::test]
async fn full_lifecycle_from_creation_to_receipt() {
    let app = TestApp::new().await;
    let engineer = app.engineer_token();
    let rm = app.regional_manager_token();
    let sm = app.store_manager_token();

    // Create: round-trip of title/zone/items, status defaults to pending
    let created = create_request(&app, &engineer, two_item_payload()).await;
    let id = created["id"].as_str().expect("request id").to_string();
    assert_eq!(created["status"], "pending");
    assert_eq!(created["title"], "Site cabling materials");
    assert_eq!(created["zone"], "Zone A");
    assert_eq!(created["requested_by"], "Asha");
    assert_eq!(item(&created, "a")["quantity"], 5);
    assert_eq!(item(&created, "b")["quantity"], 3);
    assert!(created["sent_at"].is_null());

    // Approve: records the approver identity and timestamp
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/material-requests/{}/approve", id),
            Some(&rm),
            None,
        )
        .await;
    let approved = expect_json(response, StatusCode::OK).await;
    assert_eq!(approved["data"]["status"], "approved");
    assert_eq!(approved["data"]["approved_by"], "Ravi");
    assert!(!approved["data"]["approved_at"].is_null());

    // Mark sent by courier: status, transport fields and sent_at land together
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/material-requests/{}/send", id),
            Some(&sm),
            Some(json!({
                "transport_mode": "Courier",
                "courier_name": "BlueDart",
                "tracking_no": "TRK1"
            })),
        )
        .await;
    let sent = expect_json(response, StatusCode::OK).await;
    assert_eq!(sent["data"]["status"], "in-transit");
    assert_eq!(sent["data"]["transport_mode"], "Courier");
    assert_eq!(sent["data"]["tracking_no"], "TRK1");
    assert!(!sent["data"]["sent_at"].is_null());

    // Confirm receipt with only item "a" checked
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/material-requests/{}/receive", id),
            Some(&engineer),
            Some(json!({"received_item_ids": ["a"]})),
        )
        .await;
    let received = expect_json(response, StatusCode::OK).await;
    assert_eq!(received["data"]["missing_items"], 1);
    let request = &received["data"]["request"];
    assert_eq!(request["status"], "delivered");
    assert!(item(request, "a")["remarks"].is_null());
    assert_eq!(item(request, "b")["remarks"], "Missing on receipt");

    // Retrying the confirmation with the same checklist must not
    // double-append the annotation
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/material-requests/{}/receive", id),
            Some(&engineer),
            Some(json!({"received_item_ids": ["a"]})),
        )
        .await;
    let retried = expect_json(response, StatusCode::OK).await;
    assert_eq!(
        retried["data"]["request"]["items"]
            .as_array()
            .unwrap()
            .iter()
            .find(|row| row["id"] == "b")
            .unwrap()["remarks"],
        "Missing on receipt"
    );
}

#[tokio::test]
async fn list_serves_newest_first() {
    let app = TestApp::new().await;
    let engineer = app.engineer_token();

    let mut first = two_item_payload();
    first["title"] = json!("First request");
    create_request(&app, &engineer, first).await;

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let mut second = two_item_payload();
    second["title"] = json!("Second request");
    create_request(&app, &engineer, second).await;

    let response = app
        .request(
            Method::GET,
            "/api/v1/material-requests?refresh=true",
            Some(&engineer),
            None,
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    let titles: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Second request", "First request"]);
}

#[tokio::test]
async fn shipment_validation_blocks_the_transition() {
    let app = TestApp::new().await;
    let engineer = app.engineer_token();
    let rm = app.regional_manager_token();
    let sm = app.store_manager_token();

    let created = create_request(&app, &engineer, two_item_payload()).await;
    let id = created["id"].as_str().unwrap().to_string();
    app.request(
        Method::POST,
        &format!("/api/v1/material-requests/{}/approve", id),
        Some(&rm),
        None,
    )
    .await;

    // Courier without a tracking number is rejected with no partial write
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/material-requests/{}/send", id),
            Some(&sm),
            Some(json!({"transport_mode": "Courier", "courier_name": "BlueDart"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Train without an estimated delivery date is rejected as well
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/material-requests/{}/send", id),
            Some(&sm),
            Some(json!({"transport_mode": "Train"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Nothing was written: still approved, no shipment metadata
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/material-requests/{}", id),
            Some(&sm),
            None,
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body["data"]["status"], "approved");
    assert!(body["data"]["transport_mode"].is_null());
    assert!(body["data"]["sent_at"].is_null());

    // With the edt supplied the train dispatch goes through
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/material-requests/{}/send", id),
            Some(&sm),
            Some(json!({"transport_mode": "Train", "edt": "2026-09-01T00:00:00Z"})),
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body["data"]["status"], "in-transit");
    assert_eq!(body["data"]["transport_mode"], "Train");
    assert!(body["data"]["tracking_no"].is_null());
    assert!(!body["data"]["edt"].is_null());
}

#[tokio::test]
async fn lifecycle_guards_reject_bad_transitions() {
    let app = TestApp::new().await;
    let engineer = app.engineer_token();
    let rm = app.regional_manager_token();
    let sm = app.store_manager_token();

    let created = create_request(&app, &engineer, two_item_payload()).await;
    let id = created["id"].as_str().unwrap().to_string();

    // Cannot dispatch or receive a pending request
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/material-requests/{}/send", id),
            Some(&sm),
            Some(json!({"transport_mode": "Bus", "edt": "2026-09-01T00:00:00Z"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/material-requests/{}/receive", id),
            Some(&engineer),
            Some(json!({"received_item_ids": []})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Engineers cannot approve
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/material-requests/{}/approve", id),
            Some(&engineer),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Approve, then approving again fails: the edge is pending-only
    app.request(
        Method::POST,
        &format!("/api/v1/material-requests/{}/approve", id),
        Some(&rm),
        None,
    )
    .await;
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/material-requests/{}/approve", id),
            Some(&rm),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Status cannot move backwards
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/material-requests/{}/status", id),
            Some(&rm),
            Some(json!({"status": "pending"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The in-process fulfillment sub-state is accepted, and dispatch still
    // works from it
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/material-requests/{}/status", id),
            Some(&sm),
            Some(json!({"status": "in-process"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/material-requests/{}/send", id),
            Some(&sm),
            Some(json!({"transport_mode": "Bus", "edt": "2026-09-01T00:00:00Z"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn rejection_is_terminal_and_notifies_the_requester() {
    let app = TestApp::new().await;
    let engineer = app.engineer_token();
    let rm = app.regional_manager_token();

    let created = create_request(&app, &engineer, two_item_payload()).await;
    let id = created["id"].as_str().unwrap().to_string();
    app.clear_notifications();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/material-requests/{}/reject", id),
            Some(&rm),
            None,
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body["data"]["status"], "rejected");

    let dispatched = app.dispatched();
    assert_eq!(dispatched.len(), 1);
    let notice = &dispatched[0];
    assert_eq!(
        serde_json::to_value(notice.event_type).unwrap(),
        json!("MR_STATUS_CHANGED")
    );
    assert_eq!(
        notice.extra_recipients.as_deref(),
        Some(&["asha@example.com".to_string()][..])
    );

    // No edges lead out of rejected
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/material-requests/{}/approve", id),
            Some(&rm),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_is_gated_to_regional_managers() {
    let app = TestApp::new().await;
    let engineer = app.engineer_token();
    let rm = app.regional_manager_token();

    let created = create_request(&app, &engineer, two_item_payload()).await;
    let id = created["id"].as_str().unwrap().to_string();

    // Engineers are refused before any persistence call; the record survives
    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/material-requests/{}", id),
            Some(&engineer),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/material-requests/{}", id),
            Some(&engineer),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Regional managers can hard-delete
    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/material-requests/{}", id),
            Some(&rm),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/material-requests/{}", id),
            Some(&rm),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn creation_notifications_route_by_creator_and_flavor() {
    let app = TestApp::new().await;
    let engineer = app.engineer_token();
    let rm = app.regional_manager_token();

    create_request(&app, &engineer, two_item_payload()).await;
    let dispatched = app.dispatched();
    assert_eq!(dispatched.len(), 1);
    assert_eq!(
        serde_json::to_value(dispatched[0].event_type).unwrap(),
        json!("MR_CREATED_BY_ENGINEER")
    );
    assert_eq!(
        serde_json::to_value(dispatched[0].target_departments.as_ref().unwrap()).unwrap(),
        json!(["regional_manager"])
    );
    app.clear_notifications();

    let mut rm_payload = two_item_payload();
    rm_payload["title"] = json!("RM-raised request");
    create_request(&app, &rm, rm_payload).await;
    let dispatched = app.dispatched();
    assert_eq!(
        serde_json::to_value(dispatched[0].event_type).unwrap(),
        json!("MR_CREATED_BY_RM")
    );
    assert_eq!(
        serde_json::to_value(dispatched[0].target_departments.as_ref().unwrap()).unwrap(),
        json!(["store_manager"])
    );
    app.clear_notifications();

    let mut mrc_payload = two_item_payload();
    mrc_payload["request_type"] = json!("MRC");
    create_request(&app, &engineer, mrc_payload).await;
    let dispatched = app.dispatched();
    assert_eq!(
        serde_json::to_value(dispatched[0].event_type).unwrap(),
        json!("MRC_CREATED")
    );
    assert_eq!(
        serde_json::to_value(dispatched[0].target_departments.as_ref().unwrap()).unwrap(),
        json!(["regional_manager", "store_manager"])
    );
}

#[tokio::test]
async fn partial_update_leaves_absent_fields_untouched() {
    let app = TestApp::new().await;
    let engineer = app.engineer_token();
    let rm = app.regional_manager_token();

    let created = create_request(&app, &engineer, two_item_payload()).await;
    let id = created["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/material-requests/{}", id),
            Some(&rm),
            Some(json!({"ticket_number": "TKT-00042"})),
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body["data"]["ticket_number"], "TKT-00042");
    assert_eq!(body["data"]["zone"], "Zone A");
    assert_eq!(body["data"]["description"], "Replacement drums for sector 7");
    assert_eq!(body["data"]["title"], "Site cabling materials");

    // An empty patch is refused
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/material-requests/{}", id),
            Some(&rm),
            Some(json!({})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn persistence_failure_leaves_cached_state_unchanged() {
    let app = TestApp::new().await;
    let engineer = app.engineer_token();
    let rm = app.regional_manager_token();

    let created = create_request(&app, &engineer, two_item_payload()).await;
    let id = created["id"].as_str().unwrap().to_string();

    // Warm the cache with the pending request
    let response = app
        .request(
            Method::GET,
            "/api/v1/material-requests?refresh=true",
            Some(&engineer),
            None,
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body["data"][0]["status"], "pending");

    // Break persistence underneath the service
    app.state
        .db
        .execute(Statement::from_string(
            DbBackend::Sqlite,
            "DROP TABLE material_requests;".to_string(),
        ))
        .await
        .expect("failed to drop table");

    // The write fails and surfaces to the caller...
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/material-requests/{}/approve", id),
            Some(&rm),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // ...and the cached list still shows the state from before the call
    let response = app
        .request(
            Method::GET,
            "/api/v1/material-requests",
            Some(&engineer),
            None,
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body["data"][0]["status"], "pending");
    assert_eq!(body["data"][0]["id"], id.as_str());
}

#[tokio::test]
async fn requests_without_a_token_are_refused() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/material-requests", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(
            Method::POST,
            "/api/v1/material-requests",
            None,
            Some(two_item_payload()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn creation_requires_at_least_one_item() {
    let app = TestApp::new().await;
    let engineer = app.engineer_token();

    let response = app
        .request(
            Method::POST,
            "/api/v1/material-requests",
            Some(&engineer),
            Some(json!({"title": "Empty request", "items": []})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stats_reflect_the_request_list() {
    let app = TestApp::new().await;
    let engineer = app.engineer_token();
    let rm = app.regional_manager_token();

    let first = create_request(&app, &engineer, two_item_payload()).await;
    let mut second_payload = two_item_payload();
    second_payload["zone"] = json!("Zone B");
    create_request(&app, &engineer, second_payload).await;

    let id = first["id"].as_str().unwrap().to_string();
    app.request(
        Method::POST,
        &format!("/api/v1/material-requests/{}/approve", id),
        Some(&rm),
        None,
    )
    .await;

    // Refresh so the stats read sees the approved state
    app.request(
        Method::GET,
        "/api/v1/material-requests?refresh=true",
        Some(&engineer),
        None,
    )
    .await;

    let response = app
        .request(
            Method::GET,
            "/api/v1/material-requests/stats",
            Some(&engineer),
            None,
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["pending"], 1);
    assert_eq!(body["data"]["approved"], 1);
    assert_eq!(body["data"]["by_zone"]["Zone A"], 1);
    assert_eq!(body["data"]["by_zone"]["Zone B"], 1);
}
