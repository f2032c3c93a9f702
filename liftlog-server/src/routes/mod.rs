pub mod exercises;
pub mod health;
pub mod sets;
pub mod workouts;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, patch, post};
use chrono::{DateTime, NaiveDateTime};

use crate::AppState;
use crate::error::ServerError;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/exercises", get(exercises::list).post(exercises::create))
        .route("/workouts", get(workouts::list).post(workouts::create))
        .route(
            "/workouts/{id}",
            get(workouts::detail)
                .patch(workouts::update)
                .delete(workouts::remove),
        )
        .route("/workouts/{id}/complete", post(workouts::complete))
        .route("/workouts/{id}/exercises", post(workouts::add_exercise))
        .route("/workout-exercises/{id}", delete(workouts::remove_exercise))
        .route("/workout-exercises/{id}/sets", post(sets::create))
        .route("/sets/{id}", patch(sets::update).delete(sets::remove))
        .with_state(state)
}

/// Accepts RFC 3339 or a naive `YYYY-MM-DDTHH:MM[:SS]` timestamp read as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Result<i64, ServerError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.timestamp());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(parsed.and_utc().timestamp());
        }
    }
    Err(ServerError::Validation(format!(
        "unrecognized timestamp: {raw}"
    )))
}
