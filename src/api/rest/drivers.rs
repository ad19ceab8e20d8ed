use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post, put};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::assignment::AllocationRecord;
use crate::models::driver::{Driver, DriverStatus};
use crate::schedule::AvailabilitySlot;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(create_driver).get(list_drivers))
        .route("/drivers/:id/status", patch(update_driver_status))
        .route("/drivers/:id/availability", put(update_driver_availability))
        .route("/drivers/:id/fairness", get(driver_fairness))
}

#[derive(Deserialize)]
pub struct CreateDriverRequest {
    pub name: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub availability: Vec<AvailabilitySlot>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: DriverStatus,
}

#[derive(Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub availability: Vec<AvailabilitySlot>,
}

fn validate_availability(slots: &[AvailabilitySlot]) -> Result<(), AppError> {
    match slots.iter().find(|slot| !slot.is_valid()) {
        Some(slot) => Err(AppError::BadRequest(format!(
            "availability slot on {} must start before it ends",
            slot.weekday
        ))),
        None => Ok(()),
    }
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDriverRequest>,
) -> Result<Json<Driver>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    if !payload.rating.is_finite() {
        return Err(AppError::BadRequest("rating must be a number".to_string()));
    }

    validate_availability(&payload.availability)?;

    let driver = Driver {
        id: Uuid::new_v4(),
        name: payload.name,
        rating: payload.rating.clamp(0.0, 5.0),
        availability: payload.availability,
        status: DriverStatus::Active,
        updated_at: Utc::now(),
    };

    state.drivers.insert(driver.id, driver.clone());
    Ok(Json(driver))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Json<Vec<Driver>> {
    let drivers = state
        .drivers
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(drivers)
}

async fn update_driver_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Driver>, AppError> {
    let mut driver = state
        .drivers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {} not found", id)))?;

    driver.status = payload.status;
    driver.updated_at = Utc::now();

    Ok(Json(driver.clone()))
}

async fn update_driver_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Driver>, AppError> {
    validate_availability(&payload.availability)?;

    let mut driver = state
        .drivers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {} not found", id)))?;

    driver.availability = payload.availability;
    driver.updated_at = Utc::now();

    Ok(Json(driver.clone()))
}

async fn driver_fairness(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AllocationRecord>, AppError> {
    state.driver(&id)?;

    let snapshot = state.fairness.lock().await.snapshot([id].iter(), Utc::now());
    snapshot
        .record(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::Internal(format!("no fairness record for driver {id}")))
}
