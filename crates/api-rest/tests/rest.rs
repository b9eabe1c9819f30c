//! End-to-end tests for the REST router, driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use api_rest::{router, AppState, USER_EMAIL_HEADER, USER_NAME_HEADER, USER_ROLE_HEADER};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use vigil_core::{CoreConfig, GlycemicPolicy};

fn app(tmp: &TempDir) -> Router {
    let cfg = CoreConfig::new(tmp.path().to_path_buf(), GlycemicPolicy::Legacy, 7).unwrap();
    router(AppState::new(Arc::new(cfg)))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_as(app, method, uri, body, None).await
}

async fn send_as(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    role: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(role) = role {
        builder = builder
            .header(USER_NAME_HEADER, "Dr Ana Ruiz")
            .header(USER_EMAIL_HEADER, "ana.ruiz@clinic.org")
            .header(USER_ROLE_HEADER, role);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
}

async fn create_patient(app: &Router, extra: Value) -> String {
    let mut body = json!({
        "first_name": "Carmen",
        "last_name": "Ibarra",
        "date_of_birth": "1958-03-14",
        "gender": "FEMALE",
        "baseline_ldl": 160.0,
        "baseline_lvef": 45.0
    });
    if let (Some(base), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    let (status, created) = send(app, Method::POST, "/patients", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    created["patient"]["id"].as_str().unwrap().to_string()
}

fn vitals() -> Value {
    json!({ "weight": 72.5, "systolic_bp": 128.0, "diastolic_bp": 82.0, "ldl": 95.0 })
}

#[tokio::test]
async fn health_reports_alive() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = send(&app(&tmp), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn patient_lifecycle_over_http() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp);
    let id = create_patient(&app, json!({})).await;

    let (status, body) = send(&app, Method::GET, &format!("/patients/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["patient"]["status"], "ACTIVE");

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/patients/{id}"),
        Some(json!({ "phone": "+34 600 000 000" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["patient"]["phone"], "+34 600 000 000");
    assert_eq!(body["patient"]["first_name"], "Carmen");

    let (status, body) = send(&app, Method::DELETE, &format!("/patients/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["patient"]["status"], "INACTIVE");

    let (_, active) = send(&app, Method::GET, "/patients?status=ACTIVE", None).await;
    assert_eq!(active["patients"].as_array().map(Vec::len), Some(0));
    let (_, all) = send(&app, Method::GET, "/patients", None).await;
    assert_eq!(all["patients"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn unknown_and_malformed_ids_are_distinguished() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp);

    let (status, _) = send(&app, Method::GET, "/patients/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = "0123456789abcdef0123456789abcdef";
    let (status, _) = send(&app, Method::GET, &format!("/patients/{missing}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_create_request_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let (status, _) = send(
        &app(&tmp),
        Method::POST,
        "/patients",
        Some(json!({
            "first_name": "Carmen",
            "last_name": "Ibarra",
            "date_of_birth": "14/03/1958",
            "gender": "FEMALE"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn adding_a_visit_returns_its_risk_analysis() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp);
    let id = create_patient(&app, json!({})).await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/patients/{id}/visits"),
        Some(json!({ "ldl": 60.0, "lvef": 35.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["visit"]["visit_number"], 1);
    assert_eq!(body["risk_analysis"]["lipid_control"], true);
    // Non-diabetic patients are never glycemically controlled under the legacy policy.
    assert_eq!(body["risk_analysis"]["glycemic_status"], "not_evaluated");
    assert_eq!(body["risk_analysis"]["risk_level"], "MEDIUM");

    let (_, visits) = send(&app, Method::GET, &format!("/patients/{id}/visits"), None).await;
    assert_eq!(visits["visits"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn standalone_risk_evaluation() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp);

    let (status, body) = send(
        &app,
        Method::POST,
        "/risk/evaluate",
        Some(json!({
            "baseline_ldl": 150.0,
            "current_ldl": 120.0,
            "is_diabetic": true,
            "current_hba1c": 8.1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lipid_status"], "uncontrolled");
    assert_eq!(body["glycemic_status"], "uncontrolled");
    assert_eq!(body["risk_level"], "HIGH");

    let (status, _) = send(
        &app,
        Method::POST,
        "/risk/evaluate",
        Some(json!({ "baseline_ldl": -1.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn population_statistics_over_snapshots() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = send(
        &app(&tmp),
        Method::POST,
        "/risk/population",
        Some(json!({ "snapshots": [
            { "baseline_ldl": 100.0, "current_ldl": 40.0 },
            { "baseline_ldl": 100.0, "current_ldl": 90.0 }
        ] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["in_target"], 1);
    assert_eq!(body["percentage_in_target"], 50.0);
}

#[tokio::test]
async fn dashboard_counts_active_patients() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp);
    create_patient(&app, json!({})).await;
    let second = create_patient(&app, json!({ "first_name": "Luis" })).await;
    send(&app, Method::DELETE, &format!("/patients/{second}"), None).await;

    let (status, body) = send(&app, Method::GET, "/dashboard/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active_patients"], 1);
    assert_eq!(body["chart_data"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn protocol_steps_are_listed() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = send(&app(&tmp), Method::GET, "/protocol/steps", None).await;
    assert_eq!(status, StatusCode::OK);
    let steps = body["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 7);
    assert_eq!(steps[6]["month"], 12);
}

#[tokio::test]
async fn protocol_progression_over_http() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp);
    let id = create_patient(&app, json!({})).await;
    let step0 = format!("/patients/{id}/protocol/steps/0");

    // Completing without every critical field fails validation.
    let (status, _) = send_as(
        &app,
        Method::POST,
        &format!("{step0}/complete"),
        Some(json!({ "form": { "weight": 70.0 } })),
        Some("RESIDENT"),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Advancing from an unsaved step is refused.
    let (status, _) = send(&app, Method::POST, &format!("{step0}/advance"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Step 1 is out of sequence until the baseline is completed.
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/patients/{id}/protocol/steps/1"),
        Some(json!({ "form": vitals() })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        Method::PUT,
        &step0,
        Some(json!({ "form": vitals(), "notes": "stable" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["step"]["completed"], false);

    // Saving the same payload again has nothing to save.
    let (status, _) = send(
        &app,
        Method::PUT,
        &step0,
        Some(json!({ "form": vitals(), "notes": "stable" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Completion needs caller headers.
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("{step0}/complete"),
        Some(json!({ "form": vitals() })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send_as(
        &app,
        Method::POST,
        &format!("{step0}/complete"),
        Some(json!({ "form": vitals() })),
        Some("RESIDENT"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["step"]["completed"], true);
    assert_eq!(body["step"]["completed_by"], "ana.ruiz@clinic.org");

    let (status, body) = send(&app, Method::POST, &format!("{step0}/advance"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["step_id"], 1);

    let (status, body) = send(&app, Method::GET, &format!("/patients/{id}/protocol"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["completed"], 1);
    assert_eq!(body["total"], 7);
    assert_eq!(body["active_step"], 1);
}

#[tokio::test]
async fn only_admins_may_unlock_the_protocol() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp);
    let id = create_patient(&app, json!({})).await;
    let unlock = format!("/patients/{id}/protocol/unlock");

    let (status, _) = send_as(&app, Method::POST, &unlock, None, Some("RESIDENT")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send_as(&app, Method::POST, &unlock, None, Some("ADMIN")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["unlocked"], true);
    assert_eq!(body["unlocked_by"], "ana.ruiz@clinic.org");

    // With the override set, a later step is writable straight away.
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/patients/{id}/protocol/steps/6"),
        Some(json!({ "form": { "outcomes": "no events" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send_as(
        &app,
        Method::POST,
        &format!("/patients/{id}/protocol/lock"),
        None,
        Some("ADMIN"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unlocked"], false);
}

#[tokio::test]
async fn out_of_range_step_is_a_bad_request() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp);
    let id = create_patient(&app, json!({})).await;
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/patients/{id}/protocol/steps/9"),
        Some(json!({ "form": vitals() })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
