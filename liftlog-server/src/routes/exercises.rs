use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Deserialize;

use liftlog_core::db::models::Exercise;
use liftlog_core::db::operations as ops;

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::{ServerError, ServerResult};

/// The catalog is shared reference data; no ownership filter applies.
pub async fn list(State(state): State<Arc<AppState>>) -> ServerResult<Json<Vec<Exercise>>> {
    let exercises = ops::get_all_exercises(&state.pool).await?;
    Ok(Json(exercises))
}

#[derive(Deserialize)]
pub struct ExerciseCreate {
    pub name: String,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user_id): CurrentUser,
    Json(body): Json<ExerciseCreate>,
) -> ServerResult<Json<Exercise>> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ServerError::Validation(
            "exercise name must not be empty".to_string(),
        ));
    }

    let exercise = ops::get_or_create_exercise(&state.pool, name).await?;
    Ok(Json(exercise))
}
