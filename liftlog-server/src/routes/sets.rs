use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;

use liftlog_core::db::models::{UpdateSet, WorkoutSet};
use liftlog_core::db::operations as ops;

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::{ServerError, ServerResult};

fn check_reps(reps: i64) -> Result<(), ServerError> {
    if reps < 1 {
        return Err(ServerError::Validation(
            "reps must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn check_weight(weight: f64) -> Result<(), ServerError> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(ServerError::Validation(
            "weight must be zero or greater".to_string(),
        ));
    }
    Ok(())
}

/// The set's parent chain gives the invalidation keys: its entry carries the
/// workout id, the workout carries the owner.
async fn invalidate_for_entry(
    state: &AppState,
    user_id: &str,
    workout_exercise_id: i64,
) -> ServerResult<()> {
    if let Some(entry) =
        ops::get_workout_exercise(&state.pool, workout_exercise_id, user_id).await?
    {
        state.cache.invalidate_workout_views(user_id, entry.workout_id);
    }
    Ok(())
}

#[derive(Deserialize)]
pub struct SetCreate {
    pub reps: i64,
    pub weight: f64,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(workout_exercise_id): Path<i64>,
    Json(body): Json<SetCreate>,
) -> ServerResult<Json<WorkoutSet>> {
    check_reps(body.reps)?;
    check_weight(body.weight)?;

    let set = ops::add_set(&state.pool, workout_exercise_id, &user_id, body.reps, body.weight)
        .await?
        .ok_or(ServerError::NotFound)?;
    invalidate_for_entry(&state, &user_id, set.workout_exercise_id).await?;
    Ok(Json(set))
}

#[derive(Deserialize)]
pub struct SetUpdate {
    pub reps: Option<i64>,
    pub weight: Option<f64>,
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(set_id): Path<i64>,
    Json(body): Json<SetUpdate>,
) -> ServerResult<Json<WorkoutSet>> {
    if let Some(reps) = body.reps {
        check_reps(reps)?;
    }
    if let Some(weight) = body.weight {
        check_weight(weight)?;
    }

    let update = UpdateSet {
        reps: body.reps,
        weight: body.weight,
    };
    let set = ops::update_set(&state.pool, set_id, &user_id, &update)
        .await?
        .ok_or(ServerError::NotFound)?;
    invalidate_for_entry(&state, &user_id, set.workout_exercise_id).await?;
    Ok(Json(set))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(set_id): Path<i64>,
) -> ServerResult<Json<WorkoutSet>> {
    let set = ops::delete_set(&state.pool, set_id, &user_id)
        .await?
        .ok_or(ServerError::NotFound)?;
    invalidate_for_entry(&state, &user_id, set.workout_exercise_id).await?;
    Ok(Json(set))
}
