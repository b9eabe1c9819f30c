// Re-export the proto module from the shared `api-shared` crate so callers
// can reference `api_grpc::pb`.
pub use api_shared::pb;

use std::sync::Arc;

use api_shared::pb::vigil_server::Vigil;
use api_shared::{auth, convert, HealthService};
use chrono::Utc;
use tonic::service::Interceptor;
use tonic::{Request, Response, Status};
use vigil_core::protocol::{ProtocolError, PROTOCOL_STEPS};
use vigil_core::{
    aggregate_population_with, dashboard_stats, validation, Actor, CoreConfig, PatientError,
    PatientRepository, PatientSnapshot,
};

/// Metadata key carrying the shared API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Authentication interceptor for gRPC requests.
///
/// Compares the `x-api-key` metadata against the key resolved at startup.
#[derive(Clone)]
pub struct ApiKeyInterceptor {
    expected: Arc<str>,
}

impl ApiKeyInterceptor {
    pub fn new(expected: impl Into<Arc<str>>) -> Self {
        Self {
            expected: expected.into(),
        }
    }
}

impl Interceptor for ApiKeyInterceptor {
    fn call(&mut self, req: Request<()>) -> Result<Request<()>, Status> {
        auth_interceptor(req, &self.expected)
    }
}

#[allow(clippy::result_large_err)]
pub fn auth_interceptor(req: Request<()>, expected: &str) -> Result<Request<()>, Status> {
    let api_key = req
        .metadata()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Status::unauthenticated("Missing x-api-key header"))?;

    auth::validate_api_key(api_key, expected)?;
    Ok(req)
}

/// Maps core errors onto gRPC status codes.
fn status_from_error(err: PatientError) -> Status {
    match &err {
        PatientError::NotFound(_) => Status::not_found(err.to_string()),
        PatientError::InvalidInput(_) | PatientError::Uuid(_) | PatientError::Text(_) => {
            Status::invalid_argument(err.to_string())
        }
        PatientError::Protocol(p) => match p {
            ProtocolError::Forbidden => Status::permission_denied(err.to_string()),
            ProtocolError::StepOutOfRange(_)
            | ProtocolError::NotActiveStep { .. }
            | ProtocolError::FormMismatch { .. }
            | ProtocolError::Validation { .. } => Status::invalid_argument(err.to_string()),
            ProtocolError::Gate { .. }
            | ProtocolError::NoUnsavedChanges(_)
            | ProtocolError::EndOfProtocol(_) => Status::failed_precondition(err.to_string()),
        },
        _ => {
            tracing::error!("request failed: {:?}", err);
            Status::internal("Internal error")
        }
    }
}

#[allow(clippy::result_large_err)]
fn actor(actor: Option<pb::Actor>) -> Result<Actor, Status> {
    let actor = actor.ok_or_else(|| Status::invalid_argument("actor is required"))?;
    auth::actor_from_parts(&actor.name, &actor.email, &actor.role).map_err(status_from_error)
}

#[derive(Clone)]
pub struct VigilService {
    cfg: Arc<CoreConfig>,
    patients: PatientRepository,
}

impl VigilService {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self {
            patients: PatientRepository::new(cfg.clone()),
            cfg,
        }
    }

    #[allow(clippy::result_large_err)]
    fn protocol_res(&self, id: &str) -> Result<pb::ProtocolRes, Status> {
        let view = self
            .patients
            .protocol(id, Utc::now())
            .map_err(status_from_error)?;
        Ok((&view).into())
    }
}

#[tonic::async_trait]
impl Vigil for VigilService {
    async fn health(&self, _req: Request<()>) -> Result<Response<pb::HealthRes>, Status> {
        Ok(Response::new(HealthService::check_health()))
    }

    async fn create_patient(
        &self,
        req: Request<pb::CreatePatientReq>,
    ) -> Result<Response<pb::PatientRes>, Status> {
        let new = req.into_inner().into_new_patient().map_err(status_from_error)?;
        let patient = self
            .patients
            .create(new, Utc::now())
            .map_err(status_from_error)?;
        tracing::info!(patient_id = %patient.id, "patient registered");
        Ok(Response::new(pb::PatientRes {
            patient: Some((&patient).into()),
        }))
    }

    async fn get_patient(
        &self,
        req: Request<pb::PatientIdReq>,
    ) -> Result<Response<pb::PatientRes>, Status> {
        let patient = self
            .patients
            .get(&req.into_inner().id)
            .map_err(status_from_error)?;
        Ok(Response::new(pb::PatientRes {
            patient: Some((&patient).into()),
        }))
    }

    async fn list_patients(
        &self,
        req: Request<pb::ListPatientsReq>,
    ) -> Result<Response<pb::ListPatientsRes>, Status> {
        let req = req.into_inner();
        let status = convert::parse_status(req.status.as_deref()).map_err(status_from_error)?;
        let patients = self.patients.list(status).map_err(status_from_error)?;
        Ok(Response::new(pb::ListPatientsRes {
            patients: patients.iter().map(pb::Patient::from).collect(),
        }))
    }

    async fn update_patient(
        &self,
        req: Request<pb::UpdatePatientReq>,
    ) -> Result<Response<pb::PatientRes>, Status> {
        let req = req.into_inner();
        let id = req.id.clone();
        let update = req.into_update().map_err(status_from_error)?;
        let patient = self
            .patients
            .update(&id, update, Utc::now())
            .map_err(status_from_error)?;
        Ok(Response::new(pb::PatientRes {
            patient: Some((&patient).into()),
        }))
    }

    async fn deactivate_patient(
        &self,
        req: Request<pb::PatientIdReq>,
    ) -> Result<Response<pb::PatientRes>, Status> {
        let patient = self
            .patients
            .deactivate(&req.into_inner().id, Utc::now())
            .map_err(status_from_error)?;
        Ok(Response::new(pb::PatientRes {
            patient: Some((&patient).into()),
        }))
    }

    async fn add_visit(
        &self,
        req: Request<pb::AddVisitReq>,
    ) -> Result<Response<pb::AddVisitRes>, Status> {
        let req = req.into_inner();
        let id = req.patient_id.clone();
        let input = req.into_visit_input().map_err(status_from_error)?;
        let (visit, risk) = self
            .patients
            .add_visit(&id, input, Utc::now())
            .map_err(status_from_error)?;
        Ok(Response::new(pb::AddVisitRes {
            visit: Some((&visit).into()),
            risk_analysis: Some((&risk).into()),
        }))
    }

    async fn list_visits(
        &self,
        req: Request<pb::PatientIdReq>,
    ) -> Result<Response<pb::ListVisitsRes>, Status> {
        let patient = self
            .patients
            .get(&req.into_inner().id)
            .map_err(status_from_error)?;
        Ok(Response::new(pb::ListVisitsRes {
            visits: patient.visits.iter().map(pb::Visit::from).collect(),
        }))
    }

    async fn evaluate_risk(
        &self,
        req: Request<pb::PatientSnapshot>,
    ) -> Result<Response<pb::RiskResult>, Status> {
        let snapshot = PatientSnapshot::from(req.into_inner());
        validation::validate_snapshot(&snapshot).map_err(status_from_error)?;
        let risk = self.cfg.risk_evaluator().evaluate(&snapshot);
        Ok(Response::new((&risk).into()))
    }

    async fn population_stats(
        &self,
        req: Request<pb::PopulationStatsReq>,
    ) -> Result<Response<pb::PopulationStatsRes>, Status> {
        let snapshots: Vec<PatientSnapshot> = req
            .into_inner()
            .snapshots
            .into_iter()
            .map(PatientSnapshot::from)
            .collect();
        for snapshot in &snapshots {
            validation::validate_snapshot(snapshot).map_err(status_from_error)?;
        }
        let stats = aggregate_population_with(&self.cfg.risk_evaluator(), &snapshots);
        Ok(Response::new((&stats).into()))
    }

    async fn dashboard_stats(
        &self,
        _req: Request<()>,
    ) -> Result<Response<pb::DashboardRes>, Status> {
        let patients = self.patients.list(None).map_err(status_from_error)?;
        let stats = dashboard_stats(
            &self.cfg.risk_evaluator(),
            &patients,
            Utc::now(),
            self.cfg.appointment_window_days(),
        );
        Ok(Response::new((&stats).into()))
    }

    async fn list_steps(&self, _req: Request<()>) -> Result<Response<pb::ListStepsRes>, Status> {
        Ok(Response::new(pb::ListStepsRes {
            steps: PROTOCOL_STEPS.iter().map(pb::StepDefinition::from).collect(),
        }))
    }

    async fn get_protocol(
        &self,
        req: Request<pb::PatientIdReq>,
    ) -> Result<Response<pb::ProtocolRes>, Status> {
        Ok(Response::new(self.protocol_res(&req.into_inner().id)?))
    }

    async fn save_step(&self, req: Request<pb::StepReq>) -> Result<Response<pb::StepRes>, Status> {
        let req = req.into_inner();
        let step = convert::step_id(req.step_id).map_err(status_from_error)?;
        let submission = req.submission.unwrap_or_default();
        let form = submission
            .form
            .unwrap_or_default()
            .into_step_form(step)
            .map_err(status_from_error)?;
        let record = self
            .patients
            .save_step(&req.patient_id, step, form, submission.notes, Utc::now())
            .map_err(status_from_error)?;
        Ok(Response::new(pb::StepRes {
            step: Some((&record).into()),
        }))
    }

    async fn complete_step(
        &self,
        req: Request<pb::StepReq>,
    ) -> Result<Response<pb::StepRes>, Status> {
        let req = req.into_inner();
        let actor = actor(req.actor)?;
        let step = convert::step_id(req.step_id).map_err(status_from_error)?;
        let submission = req.submission.unwrap_or_default();
        let form = submission
            .form
            .unwrap_or_default()
            .into_step_form(step)
            .map_err(status_from_error)?;
        let record = self
            .patients
            .complete_step(
                &req.patient_id,
                step,
                form,
                submission.notes,
                &actor,
                Utc::now(),
            )
            .map_err(status_from_error)?;
        Ok(Response::new(pb::StepRes {
            step: Some((&record).into()),
        }))
    }

    async fn advance_step(
        &self,
        req: Request<pb::AdvanceReq>,
    ) -> Result<Response<pb::AdvanceRes>, Status> {
        let req = req.into_inner();
        let from = convert::step_id(req.from_step).map_err(status_from_error)?;
        let (next, form) = self
            .patients
            .advance_step(&req.patient_id, from, Utc::now())
            .map_err(status_from_error)?;
        Ok(Response::new(pb::AdvanceRes {
            step_id: next.into(),
            form: Some((&form).into()),
        }))
    }

    async fn set_protocol_lock(
        &self,
        req: Request<pb::ProtocolLockReq>,
    ) -> Result<Response<pb::ProtocolRes>, Status> {
        let req = req.into_inner();
        let actor = actor(req.actor)?;
        self.patients
            .set_protocol_lock(&req.patient_id, req.unlocked, &actor, Utc::now())
            .map_err(status_from_error)?;
        Ok(Response::new(self.protocol_res(&req.patient_id)?))
    }
}
