//! Admin API.
//!
//! # Routes
//! - `GET /admin/status`: last convergence result
//! - `GET /admin/backends`: live backend state read from the stats sockets
//! - `POST /admin/converge`: request a convergence
//!
//! Every route requires `Authorization: Bearer <api_key>`.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

use crate::config::HaproxyConfig;
use crate::converge::StatusBoard;
use crate::lifecycle::Trigger;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// Shared state for admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub board: StatusBoard,
    pub haproxy: HaproxyConfig,
    pub socket_deadline: Duration,
    pub api_key: String,
    pub triggers: mpsc::UnboundedSender<Trigger>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/backends", get(get_backends))
        .route("/admin/converge", post(trigger_converge))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(address = %addr, "Admin API listening");
    }
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
