use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use liftlog_core::db::models::{UpdateWorkout, Workout, WorkoutDetail, WorkoutExercise};
use liftlog_core::db::operations as ops;

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::{ServerError, ServerResult};
use crate::routes::parse_timestamp;

#[derive(Deserialize)]
pub struct WorkoutCreate {
    pub name: String,
    pub started_at: String,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<WorkoutCreate>,
) -> ServerResult<Json<Workout>> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ServerError::Validation(
            "workout name must not be empty".to_string(),
        ));
    }
    let started_at = parse_timestamp(&body.started_at)?;

    let workout = ops::create_workout(&state.pool, &user_id, name, started_at).await?;
    state.cache.invalidate_workout_views(&user_id, workout.id);
    Ok(Json(workout))
}

#[derive(Deserialize)]
pub struct ListQuery {
    /// UTC calendar day, `YYYY-MM-DD`. Absent means all of the caller's
    /// workouts.
    pub date: Option<String>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<ListQuery>,
) -> ServerResult<Json<Vec<Workout>>> {
    let workouts = match query.date.as_deref() {
        Some(raw) => {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                ServerError::Validation(format!("unrecognized date: {raw}"))
            })?;
            ops::get_workouts_for_day(&state.pool, &user_id, date).await?
        }
        None => ops::get_workouts(&state.pool, &user_id).await?,
    };
    Ok(Json(workouts))
}

pub async fn detail(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(workout_id): Path<i64>,
) -> ServerResult<Json<WorkoutDetail>> {
    let detail = ops::get_workout_detail(&state.pool, workout_id, &user_id)
        .await?
        .ok_or(ServerError::NotFound)?;
    Ok(Json(detail))
}

#[derive(Deserialize)]
pub struct WorkoutUpdate {
    pub name: Option<String>,
    pub started_at: Option<String>,
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(workout_id): Path<i64>,
    Json(body): Json<WorkoutUpdate>,
) -> ServerResult<Json<Workout>> {
    if let Some(name) = &body.name {
        if name.trim().is_empty() {
            return Err(ServerError::Validation(
                "workout name must not be empty".to_string(),
            ));
        }
    }
    let started_at = body
        .started_at
        .as_deref()
        .map(parse_timestamp)
        .transpose()?;

    let update = UpdateWorkout {
        name: body.name.map(|n| n.trim().to_string()),
        started_at,
        completed_at: None,
    };
    let workout = ops::update_workout(&state.pool, workout_id, &user_id, &update)
        .await?
        .ok_or(ServerError::NotFound)?;
    state.cache.invalidate_workout_views(&user_id, workout.id);
    Ok(Json(workout))
}

#[derive(Deserialize, Default)]
pub struct WorkoutComplete {
    /// Defaults to the current server time.
    pub completed_at: Option<String>,
}

pub async fn complete(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(workout_id): Path<i64>,
    Json(body): Json<WorkoutComplete>,
) -> ServerResult<Json<Workout>> {
    let completed_at = match body.completed_at.as_deref() {
        Some(raw) => parse_timestamp(raw)?,
        None => Utc::now().timestamp(),
    };

    let workout = ops::complete_workout(&state.pool, workout_id, &user_id, completed_at)
        .await?
        .ok_or(ServerError::NotFound)?;
    state.cache.invalidate_workout_views(&user_id, workout.id);
    Ok(Json(workout))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(workout_id): Path<i64>,
) -> ServerResult<Json<Workout>> {
    let workout = ops::delete_workout(&state.pool, workout_id, &user_id)
        .await?
        .ok_or(ServerError::NotFound)?;
    state.cache.invalidate_workout_views(&user_id, workout.id);
    Ok(Json(workout))
}

#[derive(Deserialize)]
pub struct EntryCreate {
    pub exercise_id: i64,
}

pub async fn add_exercise(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(workout_id): Path<i64>,
    Json(body): Json<EntryCreate>,
) -> ServerResult<Json<WorkoutExercise>> {
    let entry = ops::add_exercise_to_workout(&state.pool, workout_id, body.exercise_id, &user_id)
        .await?
        .ok_or(ServerError::NotFound)?;
    state.cache.invalidate_workout_views(&user_id, entry.workout_id);
    Ok(Json(entry))
}

pub async fn remove_exercise(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(workout_exercise_id): Path<i64>,
) -> ServerResult<Json<WorkoutExercise>> {
    let entry = ops::remove_exercise_from_workout(&state.pool, workout_exercise_id, &user_id)
        .await?
        .ok_or(ServerError::NotFound)?;
    state.cache.invalidate_workout_views(&user_id, entry.workout_id);
    Ok(Json(entry))
}
