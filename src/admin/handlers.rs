use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::converge::ConvergeStatus;
use crate::haproxy::{read_status, LiveBackendSnapshot};
use crate::lifecycle::Trigger;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct Accepted {
    pub accepted: bool,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, error: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: error.to_string(),
        }),
    )
}

pub async fn get_status(State(state): State<AdminState>) -> Json<ConvergeStatus> {
    Json(ConvergeStatus::clone(&state.board.current()))
}

pub async fn get_backends(
    State(state): State<AdminState>,
) -> Result<Json<LiveBackendSnapshot>, ApiError> {
    match read_status(&state.haproxy.socket, state.socket_deadline).await {
        Ok(Some(live)) => Ok(Json(live)),
        Ok(None) => Err(api_error(StatusCode::NOT_FOUND, "no stats socket found")),
        Err(e) => Err(api_error(StatusCode::BAD_GATEWAY, e)),
    }
}

pub async fn trigger_converge(
    State(state): State<AdminState>,
) -> Result<(StatusCode, Json<Accepted>), ApiError> {
    state
        .triggers
        .send(Trigger::Admin)
        .map_err(|_| api_error(StatusCode::SERVICE_UNAVAILABLE, "scheduler is not running"))?;

    tracing::info!("Convergence requested through admin API");
    Ok((StatusCode::ACCEPTED, Json(Accepted { accepted: true })))
}
