use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::scheduler::{allocate_job, sweep, JobAllocation, SweepReport};
use crate::engine::state_machine::{cancel_job, complete_job, create_job, start_job, NewRouteJob};
use crate::error::AppError;
use crate::models::assignment::{AllocationTrigger, Assignment};
use crate::models::job::{JobStatus, RouteJob};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", post(create_route_job).get(list_jobs))
        .route("/jobs/:id", get(get_job))
        .route("/jobs/:id/allocate", post(force_allocate))
        .route("/jobs/:id/cancel", post(cancel_route_job))
        .route("/jobs/:id/start", post(start_route_job))
        .route("/jobs/:id/complete", post(complete_route_job))
        .route("/allocations/sweep", post(run_sweep))
        .route("/assignments", get(list_assignments))
}

#[derive(Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<JobStatus>,
}

#[derive(Deserialize)]
pub struct DriverActionRequest {
    pub driver_id: Uuid,
}

async fn create_route_job(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewRouteJob>,
) -> Result<Json<RouteJob>, AppError> {
    let job = create_job(&state, payload, Utc::now())?;
    Ok(Json(job))
}

async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListJobsQuery>,
) -> Json<Vec<RouteJob>> {
    let mut jobs: Vec<RouteJob> = state
        .jobs
        .iter()
        .filter(|entry| query.status.is_none_or(|status| entry.value().status == status))
        .map(|entry| entry.value().clone())
        .collect();
    jobs.sort_by(|a, b| a.bidding_deadline.cmp(&b.bidding_deadline).then_with(|| a.id.cmp(&b.id)));

    Json(jobs)
}

async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RouteJob>, AppError> {
    Ok(Json(state.job(&id)?))
}

async fn force_allocate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobAllocation>, AppError> {
    let allocation = allocate_job(&state, id, Utc::now(), AllocationTrigger::Forced).await?;
    Ok(Json(allocation))
}

async fn cancel_route_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RouteJob>, AppError> {
    Ok(Json(cancel_job(&state, id, Utc::now()).await?))
}

async fn start_route_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DriverActionRequest>,
) -> Result<Json<RouteJob>, AppError> {
    Ok(Json(start_job(&state, id, payload.driver_id, Utc::now()).await?))
}

async fn complete_route_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DriverActionRequest>,
) -> Result<Json<RouteJob>, AppError> {
    Ok(Json(
        complete_job(&state, id, payload.driver_id, Utc::now()).await?,
    ))
}

async fn run_sweep(State(state): State<Arc<AppState>>) -> Json<SweepReport> {
    Json(sweep(&state, Utc::now()).await)
}

async fn list_assignments(State(state): State<Arc<AppState>>) -> Json<Vec<Assignment>> {
    let mut assignments: Vec<Assignment> = state
        .assignments
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    assignments.sort_by(|a, b| a.assigned_at.cmp(&b.assigned_at));

    Json(assignments)
}
