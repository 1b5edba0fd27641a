//! Job CRUD handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use amssvc_models::{Job, JobId, JobStatus, StatusUpdate};
use amssvc_store::JobFilter;

use crate::error::ApiResult;
use crate::state::AppState;

/// Query parameters for listing jobs.
#[derive(Debug, Default, Deserialize)]
pub struct ListJobsQuery {
    /// Status keyword to filter by
    #[serde(default)]
    pub status: Option<String>,
}

/// Create job request.
#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub source_url: String,
}

/// Status update request.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// List jobs, optionally filtered by status.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> ApiResult<Json<Vec<Job>>> {
    let filter = match query.status.as_deref() {
        Some(raw) if !raw.trim().is_empty() => JobFilter::with_status(JobStatus::parse(raw)?),
        _ => JobFilter::default(),
    };

    Ok(Json(state.store.find_all(&filter).await))
}

/// Create a job in the `created` state.
pub async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<CreateJobRequest>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    let job = Job::create(&request.name, &request.source_url)?;
    let job = state.store.save(job).await?;

    info!(job_id = %job.id, source_url = %job.source_url, "Created job");
    Ok((StatusCode::CREATED, Json(job)))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    let job = state.store.find_by_id(&JobId::from_string(id)).await?;
    Ok(Json(job))
}

/// Set a job's status. The error message is kept only for `failed`.
pub async fn update_job_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<Json<Job>> {
    let update = StatusUpdate::parse(&request.status, request.error_message.as_deref())?;
    let job = state
        .store
        .set_status(&JobId::from_string(id), &update)
        .await?;

    info!(job_id = %job.id, status = %job.status, "Updated job status");
    Ok(Json(job))
}

pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = JobId::from_string(id);
    state.store.delete_by_id(&id).await?;

    info!(job_id = %id, "Deleted job");
    Ok(StatusCode::NO_CONTENT)
}
