//! Request handlers

use std::path::PathBuf;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hostforge_core::{CrashReport, ErrorKind, HostOptions, HostRequest, ProvisionError};
use serde::Serialize;

use super::AppState;

/// Body of a successful `POST /create`
#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub status: &'static str,
    pub name: String,
    pub driver_name: String,
    pub machine_dir: PathBuf,
    pub host_options: HostOptions,
}

/// Wire name for a body that is not a valid creation request
pub const MALFORMED_REQUEST: &str = "malformed_request";

/// Body of a failed `POST /create`
///
/// `error` is an [`ErrorKind`] wire name, or [`MALFORMED_REQUEST`].
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
    pub retryable: bool,
    pub orphan_risk: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crash_report: Option<CrashReport>,
}

impl From<&ProvisionError> for ErrorResponse {
    fn from(err: &ProvisionError) -> Self {
        let kind = err.kind();
        Self {
            error: kind.as_str(),
            message: err.to_string(),
            retryable: kind.is_retryable(),
            orphan_risk: err.may_have_orphaned_resource(),
            crash_report: err.crash_report().cloned(),
        }
    }
}

impl From<&JsonRejection> for ErrorResponse {
    fn from(rejection: &JsonRejection) -> Self {
        Self {
            error: MALFORMED_REQUEST,
            message: rejection.body_text(),
            retryable: false,
            orphan_risk: false,
            crash_report: None,
        }
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidIdentity
        | ErrorKind::InvalidSwarmDiscovery
        | ErrorKind::UnknownDriver
        | ErrorKind::MalformedConfig => StatusCode::BAD_REQUEST,
        ErrorKind::HostAlreadyExists => StatusCode::CONFLICT,
        ErrorKind::ConfigRejected => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::CreationFailed => StatusCode::BAD_GATEWAY,
        ErrorKind::PersistFailed => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::StoreUnavailable | ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// GET /health
pub async fn health() -> &'static str {
    "OK"
}

/// POST /create - Create one host
///
/// A body that does not decode as a request is answered with a structured
/// 400 before anything else runs.
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<HostRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(request)) => run_create(state, request).await,
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "Rejected create request body");
            (StatusCode::BAD_REQUEST, Json(ErrorResponse::from(&rejection))).into_response()
        }
    }
}

/// The creation runs in its own task under a per-request token. If the
/// client goes away the handler future is dropped, which cancels the token
/// and lets the workflow stop at its next checkpoint.
#[tracing::instrument(skip_all, fields(name = %request.name, driver = %request.driver_name))]
async fn run_create(state: AppState, request: HostRequest) -> Response {
    let cancel = state.shutdown.child_token();
    let _disconnect = cancel.clone().drop_guard();

    let provisioner = state.provisioner.clone();
    let task = tokio::spawn(async move {
        provisioner
            .create_host(&request, &cancel)
            .await
            .map(|host| CreatedResponse {
                status: "ok",
                machine_dir: provisioner.machine_dir(&host.name),
                name: host.name,
                driver_name: host.driver_name,
                host_options: host.host_options,
            })
    });

    match task.await {
        Ok(Ok(created)) => (StatusCode::OK, Json(created)).into_response(),
        Ok(Err(e)) => {
            let kind = e.kind();
            if kind == ErrorKind::PersistFailed {
                tracing::error!(error = %e, "Host created but not recorded");
            }
            (status_for(kind), Json(ErrorResponse::from(&e))).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Create task aborted");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
