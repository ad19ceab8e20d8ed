use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{delete, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::intake::{place_bid, withdraw_bid, PlaceBid};
use crate::error::AppError;
use crate::models::bid::Bid;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs/:id/bids", post(create_bid).get(list_job_bids))
        .route("/bids/:id", delete(delete_bid))
}

#[derive(Deserialize)]
pub struct CreateBidRequest {
    pub driver_id: Uuid,
    pub amount: f64,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize)]
pub struct WithdrawBidRequest {
    pub driver_id: Uuid,
}

async fn create_bid(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
    Json(payload): Json<CreateBidRequest>,
) -> Result<Json<Bid>, AppError> {
    let request = PlaceBid {
        job_id,
        driver_id: payload.driver_id,
        amount: payload.amount,
        message: payload.message,
    };

    let bid = place_bid(&state, request, Utc::now()).await?;
    Ok(Json(bid))
}

async fn list_job_bids(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Vec<Bid>>, AppError> {
    state.job(&job_id)?;
    Ok(Json(state.bids_for_job(&job_id)))
}

async fn delete_bid(
    State(state): State<Arc<AppState>>,
    Path(bid_id): Path<Uuid>,
    Json(payload): Json<WithdrawBidRequest>,
) -> Result<Json<Bid>, AppError> {
    let bid = withdraw_bid(&state, bid_id, payload.driver_id, Utc::now()).await?;
    Ok(Json(bid))
}
