//! # API REST
//!
//! REST API implementation for Vigil.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON bodies, CORS, caller headers, status codes)
//!
//! Request and response bodies are the `pb` types from `api-shared`, so REST and gRPC share one
//! wire model.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::{IntoParams, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use api_shared::{auth, convert, pb, HealthService};
use vigil_core::protocol::{ProtocolError, PROTOCOL_STEPS};
use vigil_core::{
    aggregate_population_with, dashboard_stats, Actor, CoreConfig, PatientError,
    PatientRepository, PatientSnapshot,
};

/// Header carrying the caller's display name.
pub const USER_NAME_HEADER: &str = "x-user-name";
/// Header carrying the caller's email, used in audit fields.
pub const USER_EMAIL_HEADER: &str = "x-user-email";
/// Header carrying the caller's role (`ADMIN` or `RESIDENT`).
pub const USER_ROLE_HEADER: &str = "x-user-role";

type ApiError = (StatusCode, String);
type ApiResult<T> = Result<T, ApiError>;

/// Application state shared by all request handlers.
#[derive(Clone)]
pub struct AppState {
    cfg: Arc<CoreConfig>,
    patients: PatientRepository,
}

impl AppState {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self {
            patients: PatientRepository::new(cfg.clone()),
            cfg,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        list_patients,
        create_patient,
        get_patient,
        update_patient,
        deactivate_patient,
        list_visits,
        add_visit,
        evaluate_risk,
        population_stats,
        dashboard,
        list_steps,
        get_protocol,
        save_step,
        complete_step,
        advance_step,
        unlock_protocol,
        lock_protocol,
    ),
    components(schemas(
        pb::HealthRes,
        pb::Patient,
        pb::PatientRes,
        pb::ListPatientsRes,
        pb::CreatePatientReq,
        pb::UpdatePatientReq,
        pb::Visit,
        pb::Medication,
        pb::AddVisitReq,
        pb::AddVisitRes,
        pb::ListVisitsRes,
        pb::PatientSnapshot,
        pb::RiskResult,
        pb::PopulationStatsReq,
        pb::PopulationStatsRes,
        pb::ChartSeries,
        pb::DashboardRes,
        pb::StepForm,
        pb::StepSubmission,
        pb::ProtocolStep,
        pb::StepStatus,
        pb::ProtocolRes,
        pb::StepRes,
        pb::AdvanceRes,
        pb::FieldDescriptor,
        pb::StepDefinition,
        pb::ListStepsRes,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router with Swagger UI mounted at `/swagger-ui`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/patients", get(list_patients).post(create_patient))
        .route(
            "/patients/:id",
            get(get_patient).put(update_patient).delete(deactivate_patient),
        )
        .route("/patients/:id/visits", get(list_visits).post(add_visit))
        .route("/patients/:id/protocol", get(get_protocol))
        .route("/patients/:id/protocol/steps/:step", put(save_step))
        .route(
            "/patients/:id/protocol/steps/:step/complete",
            post(complete_step),
        )
        .route(
            "/patients/:id/protocol/steps/:step/advance",
            post(advance_step),
        )
        .route("/patients/:id/protocol/unlock", post(unlock_protocol))
        .route("/patients/:id/protocol/lock", post(lock_protocol))
        .route("/protocol/steps", get(list_steps))
        .route("/risk/evaluate", post(evaluate_risk))
        .route("/risk/population", post(population_stats))
        .route("/dashboard/stats", get(dashboard))
        .merge(
            SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Maps core errors onto HTTP status codes.
///
/// Storage and serialisation failures are logged and reported as a generic 500.
fn api_error(err: PatientError) -> ApiError {
    let status = match &err {
        PatientError::NotFound(_) => StatusCode::NOT_FOUND,
        PatientError::InvalidInput(_) | PatientError::Uuid(_) | PatientError::Text(_) => {
            StatusCode::BAD_REQUEST
        }
        PatientError::Protocol(p) => match p {
            ProtocolError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ProtocolError::Gate { .. }
            | ProtocolError::NoUnsavedChanges(_)
            | ProtocolError::EndOfProtocol(_) => StatusCode::CONFLICT,
            ProtocolError::Forbidden => StatusCode::FORBIDDEN,
            ProtocolError::StepOutOfRange(_)
            | ProtocolError::NotActiveStep { .. }
            | ProtocolError::FormMismatch { .. } => StatusCode::BAD_REQUEST,
        },
        _ => {
            tracing::error!("request failed: {:?}", err);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into());
        }
    };
    (status, err.to_string())
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> ApiResult<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("missing {} header", name)))
}

/// Reads the caller identity from the `x-user-*` headers.
fn actor_from_headers(headers: &HeaderMap) -> ApiResult<Actor> {
    auth::actor_from_parts(
        header(headers, USER_NAME_HEADER)?,
        header(headers, USER_EMAIL_HEADER)?,
        header(headers, USER_ROLE_HEADER)?,
    )
    .map_err(api_error)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = pb::HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
async fn health() -> Json<pb::HealthRes> {
    Json(HealthService::check_health())
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct ListPatientsQuery {
    /// `ACTIVE`, `INACTIVE` or `DISCHARGED`; omit for all patients.
    status: Option<String>,
}

#[utoipa::path(
    get,
    path = "/patients",
    params(ListPatientsQuery),
    responses(
        (status = 200, description = "Patients sorted by name", body = pb::ListPatientsRes),
        (status = 400, description = "Unknown status filter"),
        (status = 500, description = "Internal server error")
    )
)]
/// List patients, optionally filtered by status.
async fn list_patients(
    State(state): State<AppState>,
    Query(query): Query<ListPatientsQuery>,
) -> ApiResult<Json<pb::ListPatientsRes>> {
    let status = convert::parse_status(query.status.as_deref()).map_err(api_error)?;
    let patients = state.patients.list(status).map_err(api_error)?;
    Ok(Json(pb::ListPatientsRes {
        patients: patients.iter().map(pb::Patient::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/patients",
    request_body = pb::CreatePatientReq,
    responses(
        (status = 201, description = "Patient created", body = pb::PatientRes),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Internal server error")
    )
)]
/// Register a new patient.
async fn create_patient(
    State(state): State<AppState>,
    Json(req): Json<pb::CreatePatientReq>,
) -> ApiResult<(StatusCode, Json<pb::PatientRes>)> {
    let new = req.into_new_patient().map_err(api_error)?;
    let patient = state.patients.create(new, Utc::now()).map_err(api_error)?;
    tracing::info!(patient_id = %patient.id, "patient registered");
    Ok((
        StatusCode::CREATED,
        Json(pb::PatientRes {
            patient: Some((&patient).into()),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient id (32 lowercase hex characters)")),
    responses(
        (status = 200, description = "Patient record", body = pb::PatientRes),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "Patient not found")
    )
)]
async fn get_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<pb::PatientRes>> {
    let patient = state.patients.get(&id).map_err(api_error)?;
    Ok(Json(pb::PatientRes {
        patient: Some((&patient).into()),
    }))
}

#[utoipa::path(
    put,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient id")),
    request_body = pb::UpdatePatientReq,
    responses(
        (status = 200, description = "Updated patient", body = pb::PatientRes),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Patient not found")
    )
)]
/// Partially update a patient. The `id` in the body is ignored in favour of the path.
async fn update_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<pb::UpdatePatientReq>,
) -> ApiResult<Json<pb::PatientRes>> {
    let update = req.into_update().map_err(api_error)?;
    let patient = state
        .patients
        .update(&id, update, Utc::now())
        .map_err(api_error)?;
    Ok(Json(pb::PatientRes {
        patient: Some((&patient).into()),
    }))
}

#[utoipa::path(
    delete,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Patient marked inactive", body = pb::PatientRes),
        (status = 404, description = "Patient not found")
    )
)]
/// Soft delete: the patient is marked inactive and kept on disk.
async fn deactivate_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<pb::PatientRes>> {
    let patient = state
        .patients
        .deactivate(&id, Utc::now())
        .map_err(api_error)?;
    Ok(Json(pb::PatientRes {
        patient: Some((&patient).into()),
    }))
}

#[utoipa::path(
    get,
    path = "/patients/{id}/visits",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Visit history, oldest first", body = pb::ListVisitsRes),
        (status = 404, description = "Patient not found")
    )
)]
async fn list_visits(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<pb::ListVisitsRes>> {
    let patient = state.patients.get(&id).map_err(api_error)?;
    Ok(Json(pb::ListVisitsRes {
        visits: patient.visits.iter().map(pb::Visit::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/visits",
    params(("id" = String, Path, description = "Patient id")),
    request_body = pb::AddVisitReq,
    responses(
        (status = 201, description = "Visit recorded with risk analysis", body = pb::AddVisitRes),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Patient not found")
    )
)]
/// Record a visit and evaluate risk against the patient's baselines.
async fn add_visit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<pb::AddVisitReq>,
) -> ApiResult<(StatusCode, Json<pb::AddVisitRes>)> {
    let input = req.into_visit_input().map_err(api_error)?;
    let (visit, risk) = state
        .patients
        .add_visit(&id, input, Utc::now())
        .map_err(api_error)?;
    Ok((
        StatusCode::CREATED,
        Json(pb::AddVisitRes {
            visit: Some((&visit).into()),
            risk_analysis: Some((&risk).into()),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/risk/evaluate",
    request_body = pb::PatientSnapshot,
    responses(
        (status = 200, description = "Risk evaluation", body = pb::RiskResult),
        (status = 400, description = "Non-finite or negative values")
    )
)]
/// Evaluate a standalone snapshot without touching stored patients.
async fn evaluate_risk(
    State(state): State<AppState>,
    Json(req): Json<pb::PatientSnapshot>,
) -> ApiResult<Json<pb::RiskResult>> {
    let snapshot = PatientSnapshot::from(req);
    vigil_core::validation::validate_snapshot(&snapshot).map_err(api_error)?;
    let risk = state.cfg.risk_evaluator().evaluate(&snapshot);
    Ok(Json((&risk).into()))
}

#[utoipa::path(
    post,
    path = "/risk/population",
    request_body = pb::PopulationStatsReq,
    responses(
        (status = 200, description = "Population statistics", body = pb::PopulationStatsRes),
        (status = 400, description = "Non-finite or negative values")
    )
)]
async fn population_stats(
    State(state): State<AppState>,
    Json(req): Json<pb::PopulationStatsReq>,
) -> ApiResult<Json<pb::PopulationStatsRes>> {
    let snapshots: Vec<PatientSnapshot> =
        req.snapshots.into_iter().map(PatientSnapshot::from).collect();
    for snapshot in &snapshots {
        vigil_core::validation::validate_snapshot(snapshot).map_err(api_error)?;
    }
    let stats = aggregate_population_with(&state.cfg.risk_evaluator(), &snapshots);
    Ok(Json((&stats).into()))
}

#[utoipa::path(
    get,
    path = "/dashboard/stats",
    responses(
        (status = 200, description = "Dashboard statistics", body = pb::DashboardRes),
        (status = 500, description = "Internal server error")
    )
)]
async fn dashboard(State(state): State<AppState>) -> ApiResult<Json<pb::DashboardRes>> {
    let patients = state.patients.list(None).map_err(api_error)?;
    let stats = dashboard_stats(
        &state.cfg.risk_evaluator(),
        &patients,
        Utc::now(),
        state.cfg.appointment_window_days(),
    );
    Ok(Json((&stats).into()))
}

#[utoipa::path(
    get,
    path = "/protocol/steps",
    responses(
        (status = 200, description = "Protocol steps and form fields", body = pb::ListStepsRes)
    )
)]
async fn list_steps() -> Json<pb::ListStepsRes> {
    Json(pb::ListStepsRes {
        steps: PROTOCOL_STEPS.iter().map(pb::StepDefinition::from).collect(),
    })
}

#[utoipa::path(
    get,
    path = "/patients/{id}/protocol",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Protocol progress and availability", body = pb::ProtocolRes),
        (status = 404, description = "Patient not found")
    )
)]
async fn get_protocol(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<pb::ProtocolRes>> {
    let view = state.patients.protocol(&id, Utc::now()).map_err(api_error)?;
    Ok(Json((&view).into()))
}

#[utoipa::path(
    put,
    path = "/patients/{id}/protocol/steps/{step}",
    params(
        ("id" = String, Path, description = "Patient id"),
        ("step" = u32, Path, description = "Step id, 0-6")
    ),
    request_body = pb::StepSubmission,
    responses(
        (status = 200, description = "Step saved without completing it", body = pb::StepRes),
        (status = 404, description = "Patient not found"),
        (status = 409, description = "Step not accessible or nothing to save")
    )
)]
/// Save progress on a step.
async fn save_step(
    State(state): State<AppState>,
    Path((id, step)): Path<(String, u32)>,
    Json(req): Json<pb::StepSubmission>,
) -> ApiResult<Json<pb::StepRes>> {
    let step = convert::step_id(step).map_err(api_error)?;
    let form = req
        .form
        .unwrap_or_default()
        .into_step_form(step)
        .map_err(api_error)?;
    let record = state
        .patients
        .save_step(&id, step, form, req.notes, Utc::now())
        .map_err(api_error)?;
    Ok(Json(pb::StepRes {
        step: Some((&record).into()),
    }))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/protocol/steps/{step}/complete",
    params(
        ("id" = String, Path, description = "Patient id"),
        ("step" = u32, Path, description = "Step id, 0-6")
    ),
    request_body = pb::StepSubmission,
    responses(
        (status = 200, description = "Step completed", body = pb::StepRes),
        (status = 400, description = "Missing caller headers"),
        (status = 409, description = "Step not accessible"),
        (status = 422, description = "Critical fields missing")
    )
)]
/// Complete a step. Requires the `x-user-*` headers.
async fn complete_step(
    State(state): State<AppState>,
    Path((id, step)): Path<(String, u32)>,
    headers: HeaderMap,
    Json(req): Json<pb::StepSubmission>,
) -> ApiResult<Json<pb::StepRes>> {
    let actor = actor_from_headers(&headers)?;
    let step = convert::step_id(step).map_err(api_error)?;
    let form = req
        .form
        .unwrap_or_default()
        .into_step_form(step)
        .map_err(api_error)?;
    let record = state
        .patients
        .complete_step(&id, step, form, req.notes, &actor, Utc::now())
        .map_err(api_error)?;
    Ok(Json(pb::StepRes {
        step: Some((&record).into()),
    }))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/protocol/steps/{step}/advance",
    params(
        ("id" = String, Path, description = "Patient id"),
        ("step" = u32, Path, description = "Step being left")
    ),
    responses(
        (status = 200, description = "Next step and its form", body = pb::AdvanceRes),
        (status = 409, description = "Current step not saved or not completed")
    )
)]
async fn advance_step(
    State(state): State<AppState>,
    Path((id, step)): Path<(String, u32)>,
) -> ApiResult<Json<pb::AdvanceRes>> {
    let from = convert::step_id(step).map_err(api_error)?;
    let (next, form) = state
        .patients
        .advance_step(&id, from, Utc::now())
        .map_err(api_error)?;
    Ok(Json(pb::AdvanceRes {
        step_id: next.into(),
        form: Some((&form).into()),
    }))
}

async fn set_lock(
    state: AppState,
    id: String,
    headers: HeaderMap,
    unlocked: bool,
) -> ApiResult<Json<pb::ProtocolRes>> {
    let actor = actor_from_headers(&headers)?;
    let now = Utc::now();
    state
        .patients
        .set_protocol_lock(&id, unlocked, &actor, now)
        .map_err(api_error)?;
    let view = state.patients.protocol(&id, now).map_err(api_error)?;
    Ok(Json((&view).into()))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/protocol/unlock",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Date and sequence gating lifted", body = pb::ProtocolRes),
        (status = 403, description = "Caller is not an administrator")
    )
)]
/// Lift all gating for the patient. Admin only.
async fn unlock_protocol(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<pb::ProtocolRes>> {
    set_lock(state, id, headers, true).await
}

#[utoipa::path(
    post,
    path = "/patients/{id}/protocol/lock",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Gating restored", body = pb::ProtocolRes),
        (status = 403, description = "Caller is not an administrator")
    )
)]
async fn lock_protocol(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<pb::ProtocolRes>> {
    set_lock(state, id, headers, false).await
}
