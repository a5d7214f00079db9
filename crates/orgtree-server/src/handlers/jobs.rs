//! Job lookup and the worker's status-report entry point.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use orgtree_core::events::{JobEvent, ADMIN_CHANNEL};
use orgtree_core::principal::Principal;
use orgtree_core::types::Job;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

pub async fn get_job(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(oid): Path<String>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(state.jobs.get(Some(&principal), &oid).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

/// Apply a status report and push the transition to channel subscribers.
pub async fn update_job(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(oid): Path<String>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<Job>, AppError> {
    let job = state
        .jobs
        .update_status(Some(&principal), &oid, &body.status)
        .await?;

    let delivered = state.events.broadcast(
        ADMIN_CHANNEL,
        &JobEvent {
            job_id: job.id.clone(),
            objid: job.objid,
            op: job.op,
            status: job.status,
            last_update: job.last_update,
        },
    );
    tracing::debug!(job_id = %job.id, status = %job.status, delivered, "job status pushed");

    Ok(Json(job))
}
