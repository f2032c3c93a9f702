//! Ownership-scoped data access.
//!
//! Every function that touches a user-owned row takes the caller's `user_id`
//! and resolves ownership through the chain set -> workout exercise ->
//! workout -> user_id. A failed ownership check and a missing row collapse
//! into the same `Ok(None)` outcome so callers cannot distinguish them.
//! Store failures propagate as errors. Verify-then-mutate always runs on a
//! single transaction.

use anyhow::Result;
use chrono::{NaiveDate, NaiveTime, Utc};
use log::debug;
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use crate::db::models::{
    Exercise, UpdateSet, UpdateWorkout, Workout, WorkoutDetail, WorkoutExercise,
    WorkoutExerciseDetail, WorkoutSet,
};

/// Attempts before giving up when a concurrent insert keeps winning the
/// unique sequence slot.
const SEQUENCE_RETRIES: u32 = 3;

fn now() -> i64 {
    Utc::now().timestamp()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Inclusive unix-second bounds of a UTC calendar day.
pub fn day_bounds(date: NaiveDate) -> (i64, i64) {
    let start = date.and_time(NaiveTime::MIN).and_utc().timestamp();
    (start, start + 86_400 - 1)
}

// Workouts

pub async fn create_workout(
    pool: &SqlitePool,
    user_id: &str,
    name: &str,
    started_at: i64,
) -> Result<Workout> {
    let now = now();
    sqlx::query_as::<_, Workout>(
        "INSERT INTO workouts (user_id, name, started_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         RETURNING *",
    )
    .bind(user_id)
    .bind(name)
    .bind(started_at)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

pub async fn get_workout(
    pool: &SqlitePool,
    workout_id: i64,
    user_id: &str,
) -> Result<Option<Workout>> {
    sqlx::query_as::<_, Workout>("SELECT * FROM workouts WHERE id = ?1 AND user_id = ?2")
        .bind(workout_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
}

pub async fn get_workouts(pool: &SqlitePool, user_id: &str) -> Result<Vec<Workout>> {
    sqlx::query_as::<_, Workout>(
        "SELECT * FROM workouts WHERE user_id = ?1 ORDER BY started_at ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

/// Workouts of `user_id` whose `started_at` falls within the inclusive
/// `[range_start, range_end]`, ordered by `started_at` ascending.
pub async fn get_workouts_in_range(
    pool: &SqlitePool,
    user_id: &str,
    range_start: i64,
    range_end: i64,
) -> Result<Vec<Workout>> {
    sqlx::query_as::<_, Workout>(
        "SELECT * FROM workouts
         WHERE user_id = ?1 AND started_at BETWEEN ?2 AND ?3
         ORDER BY started_at ASC",
    )
    .bind(user_id)
    .bind(range_start)
    .bind(range_end)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

pub async fn get_workouts_for_day(
    pool: &SqlitePool,
    user_id: &str,
    date: NaiveDate,
) -> Result<Vec<Workout>> {
    let (start, end) = day_bounds(date);
    get_workouts_in_range(pool, user_id, start, end).await
}

pub async fn update_workout(
    pool: &SqlitePool,
    workout_id: i64,
    user_id: &str,
    update: &UpdateWorkout,
) -> Result<Option<Workout>> {
    let mut tx = pool.begin().await?;

    let Some(current) =
        sqlx::query_as::<_, Workout>("SELECT * FROM workouts WHERE id = ?1 AND user_id = ?2")
            .bind(workout_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
    else {
        return Ok(None);
    };

    let name = update.name.clone().unwrap_or(current.name);
    let started_at = update.started_at.unwrap_or(current.started_at);
    let completed_at = match update.completed_at {
        Some(value) => value,
        None => current.completed_at,
    };

    let workout = sqlx::query_as::<_, Workout>(
        "UPDATE workouts SET name = ?1, started_at = ?2, completed_at = ?3, updated_at = ?4
         WHERE id = ?5
         RETURNING *",
    )
    .bind(&name)
    .bind(started_at)
    .bind(completed_at)
    .bind(now())
    .bind(workout_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(workout))
}

pub async fn complete_workout(
    pool: &SqlitePool,
    workout_id: i64,
    user_id: &str,
    completed_at: i64,
) -> Result<Option<Workout>> {
    let update = UpdateWorkout {
        completed_at: Some(Some(completed_at)),
        ..Default::default()
    };
    update_workout(pool, workout_id, user_id, &update).await
}

/// Deletes the workout and, through cascades, its entries and their sets.
/// Returns the deleted row so callers can derive invalidation keys.
pub async fn delete_workout(
    pool: &SqlitePool,
    workout_id: i64,
    user_id: &str,
) -> Result<Option<Workout>> {
    let mut tx = pool.begin().await?;

    let Some(workout) =
        sqlx::query_as::<_, Workout>("SELECT * FROM workouts WHERE id = ?1 AND user_id = ?2")
            .bind(workout_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
    else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM workouts WHERE id = ?1")
        .bind(workout_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(Some(workout))
}

// Exercise catalog (shared reference data, no ownership filter)

pub async fn get_all_exercises(pool: &SqlitePool) -> Result<Vec<Exercise>> {
    sqlx::query_as::<_, Exercise>("SELECT * FROM exercises ORDER BY name ASC")
        .fetch_all(pool)
        .await
        .map_err(Into::into)
}

pub async fn get_exercise(pool: &SqlitePool, exercise_id: i64) -> Result<Option<Exercise>> {
    sqlx::query_as::<_, Exercise>("SELECT * FROM exercises WHERE id = ?1")
        .bind(exercise_id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
}

pub async fn create_exercise(pool: &SqlitePool, name: &str) -> Result<Exercise> {
    let now = now();
    sqlx::query_as::<_, Exercise>(
        "INSERT INTO exercises (name, created_at, updated_at)
         VALUES (?1, ?2, ?2)
         RETURNING *",
    )
    .bind(name)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

pub async fn get_or_create_exercise(pool: &SqlitePool, name: &str) -> Result<Exercise> {
    if let Some(exercise) =
        sqlx::query_as::<_, Exercise>("SELECT * FROM exercises WHERE name = ?1")
            .bind(name)
            .fetch_optional(pool)
            .await?
    {
        return Ok(exercise);
    }

    match create_exercise(pool, name).await {
        Ok(exercise) => Ok(exercise),
        // A concurrent caller created it first; the name is unique, so the
        // re-read cannot miss.
        Err(err) => match err.downcast_ref::<sqlx::Error>() {
            Some(sqlx_err) if is_unique_violation(sqlx_err) => {
                sqlx::query_as::<_, Exercise>("SELECT * FROM exercises WHERE name = ?1")
                    .bind(name)
                    .fetch_one(pool)
                    .await
                    .map_err(Into::into)
            }
            _ => Err(err),
        },
    }
}

// Ownership resolution helpers. Each returns proof of ownership (or None)
// from the open transaction so check and mutation cannot be split across
// writers.

async fn workout_owner_matches(
    conn: &mut SqliteConnection,
    workout_id: i64,
    user_id: &str,
) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM workouts WHERE id = ?1 AND user_id = ?2")
            .bind(workout_id)
            .bind(user_id)
            .fetch_one(conn)
            .await?;
    Ok(count > 0)
}

async fn owned_entry(
    conn: &mut SqliteConnection,
    workout_exercise_id: i64,
    user_id: &str,
) -> Result<Option<WorkoutExercise>> {
    sqlx::query_as::<_, WorkoutExercise>(
        "SELECT we.* FROM workout_exercises we
         JOIN workouts w ON w.id = we.workout_id
         WHERE we.id = ?1 AND w.user_id = ?2",
    )
    .bind(workout_exercise_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
    .map_err(Into::into)
}

async fn owned_set(
    conn: &mut SqliteConnection,
    set_id: i64,
    user_id: &str,
) -> Result<Option<WorkoutSet>> {
    sqlx::query_as::<_, WorkoutSet>(
        "SELECT s.* FROM workout_sets s
         JOIN workout_exercises we ON we.id = s.workout_exercise_id
         JOIN workouts w ON w.id = we.workout_id
         WHERE s.id = ?1 AND w.user_id = ?2",
    )
    .bind(set_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
    .map_err(Into::into)
}

// Sequencing helpers: next value is max(existing) + 1 within the parent
// scope. Positions start at 0, set numbers at 1. The UNIQUE constraints on
// (workout_id, position) and (workout_exercise_id, set_number) catch a
// concurrent writer taking the same slot; the insert retries.

async fn next_position(conn: &mut SqliteConnection, workout_id: i64) -> Result<i64> {
    let max: Option<i64> =
        sqlx::query_scalar("SELECT MAX(position) FROM workout_exercises WHERE workout_id = ?1")
            .bind(workout_id)
            .fetch_one(conn)
            .await?;
    Ok(max.map(|p| p + 1).unwrap_or(0))
}

async fn next_set_number(
    conn: &mut SqliteConnection,
    workout_exercise_id: i64,
) -> Result<i64> {
    let max: Option<i64> = sqlx::query_scalar(
        "SELECT MAX(set_number) FROM workout_sets WHERE workout_exercise_id = ?1",
    )
    .bind(workout_exercise_id)
    .fetch_one(conn)
    .await?;
    Ok(max.map(|n| n + 1).unwrap_or(1))
}

// Workout exercises

pub async fn add_exercise_to_workout(
    pool: &SqlitePool,
    workout_id: i64,
    exercise_id: i64,
    user_id: &str,
) -> Result<Option<WorkoutExercise>> {
    for attempt in 0..SEQUENCE_RETRIES {
        let mut tx = pool.begin().await?;

        if !workout_owner_matches(&mut tx, workout_id, user_id).await? {
            return Ok(None);
        }
        if get_exercise_on(&mut tx, exercise_id).await?.is_none() {
            return Ok(None);
        }

        let position = next_position(&mut tx, workout_id).await?;
        let result = sqlx::query_as::<_, WorkoutExercise>(
            "INSERT INTO workout_exercises (workout_id, exercise_id, position, created_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING *",
        )
        .bind(workout_id)
        .bind(exercise_id)
        .bind(position)
        .bind(now())
        .fetch_one(&mut *tx)
        .await;

        match result {
            Ok(entry) => {
                tx.commit().await?;
                return Ok(Some(entry));
            }
            Err(err) if is_unique_violation(&err) => {
                debug!(
                    "position {} in workout {} already taken, retrying (attempt {})",
                    position,
                    workout_id,
                    attempt + 1
                );
                tx.rollback().await?;
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(anyhow::anyhow!(
        "could not assign a unique position in workout {} after {} attempts",
        workout_id,
        SEQUENCE_RETRIES
    ))
}

async fn get_exercise_on(
    conn: &mut SqliteConnection,
    exercise_id: i64,
) -> Result<Option<Exercise>> {
    sqlx::query_as::<_, Exercise>("SELECT * FROM exercises WHERE id = ?1")
        .bind(exercise_id)
        .fetch_optional(conn)
        .await
        .map_err(Into::into)
}

pub async fn get_workout_exercise(
    pool: &SqlitePool,
    workout_exercise_id: i64,
    user_id: &str,
) -> Result<Option<WorkoutExercise>> {
    let mut conn = pool.acquire().await?;
    owned_entry(&mut conn, workout_exercise_id, user_id).await
}

/// Removes the entry; its sets cascade. Returns the deleted row.
pub async fn remove_exercise_from_workout(
    pool: &SqlitePool,
    workout_exercise_id: i64,
    user_id: &str,
) -> Result<Option<WorkoutExercise>> {
    let mut tx = pool.begin().await?;

    let Some(entry) = owned_entry(&mut tx, workout_exercise_id, user_id).await? else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM workout_exercises WHERE id = ?1")
        .bind(workout_exercise_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(Some(entry))
}

// Sets

pub async fn add_set(
    pool: &SqlitePool,
    workout_exercise_id: i64,
    user_id: &str,
    reps: i64,
    weight: f64,
) -> Result<Option<WorkoutSet>> {
    for attempt in 0..SEQUENCE_RETRIES {
        let mut tx = pool.begin().await?;

        if owned_entry(&mut tx, workout_exercise_id, user_id)
            .await?
            .is_none()
        {
            return Ok(None);
        }

        let set_number = next_set_number(&mut tx, workout_exercise_id).await?;
        let result = sqlx::query_as::<_, WorkoutSet>(
            "INSERT INTO workout_sets (workout_exercise_id, set_number, reps, weight, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING *",
        )
        .bind(workout_exercise_id)
        .bind(set_number)
        .bind(reps)
        .bind(weight)
        .bind(now())
        .fetch_one(&mut *tx)
        .await;

        match result {
            Ok(set) => {
                tx.commit().await?;
                return Ok(Some(set));
            }
            Err(err) if is_unique_violation(&err) => {
                debug!(
                    "set number {} in entry {} already taken, retrying (attempt {})",
                    set_number,
                    workout_exercise_id,
                    attempt + 1
                );
                tx.rollback().await?;
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(anyhow::anyhow!(
        "could not assign a unique set number in entry {} after {} attempts",
        workout_exercise_id,
        SEQUENCE_RETRIES
    ))
}

pub async fn get_sets_for_entry(
    pool: &SqlitePool,
    workout_exercise_id: i64,
    user_id: &str,
) -> Result<Vec<WorkoutSet>> {
    sqlx::query_as::<_, WorkoutSet>(
        "SELECT s.* FROM workout_sets s
         JOIN workout_exercises we ON we.id = s.workout_exercise_id
         JOIN workouts w ON w.id = we.workout_id
         WHERE s.workout_exercise_id = ?1 AND w.user_id = ?2
         ORDER BY s.set_number ASC",
    )
    .bind(workout_exercise_id)
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

pub async fn update_set(
    pool: &SqlitePool,
    set_id: i64,
    user_id: &str,
    update: &UpdateSet,
) -> Result<Option<WorkoutSet>> {
    let mut tx = pool.begin().await?;

    let Some(current) = owned_set(&mut tx, set_id, user_id).await? else {
        return Ok(None);
    };

    let reps = update.reps.unwrap_or(current.reps);
    let weight = update.weight.unwrap_or(current.weight);

    let set = sqlx::query_as::<_, WorkoutSet>(
        "UPDATE workout_sets SET reps = ?1, weight = ?2
         WHERE id = ?3
         RETURNING *",
    )
    .bind(reps)
    .bind(weight)
    .bind(set_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(set))
}

pub async fn delete_set(
    pool: &SqlitePool,
    set_id: i64,
    user_id: &str,
) -> Result<Option<WorkoutSet>> {
    let mut tx = pool.begin().await?;

    let Some(set) = owned_set(&mut tx, set_id, user_id).await? else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM workout_sets WHERE id = ?1")
        .bind(set_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(Some(set))
}

// Composite fetch

#[derive(FromRow)]
struct EntryRow {
    id: i64,
    workout_id: i64,
    exercise_id: i64,
    position: i64,
    created_at: i64,
    exercise_name: String,
}

/// The workout detail view: the workout, its entries joined with catalog
/// names in display order, and each entry's sets in set-number order. Absent
/// if the workout does not exist or the caller does not own it.
pub async fn get_workout_detail(
    pool: &SqlitePool,
    workout_id: i64,
    user_id: &str,
) -> Result<Option<WorkoutDetail>> {
    let Some(workout) = get_workout(pool, workout_id, user_id).await? else {
        return Ok(None);
    };

    let entries = sqlx::query_as::<_, EntryRow>(
        "SELECT we.id, we.workout_id, we.exercise_id, we.position, we.created_at,
                e.name AS exercise_name
         FROM workout_exercises we
         JOIN exercises e ON e.id = we.exercise_id
         WHERE we.workout_id = ?1
         ORDER BY we.position ASC",
    )
    .bind(workout_id)
    .fetch_all(pool)
    .await?;

    let sets = sqlx::query_as::<_, WorkoutSet>(
        "SELECT s.* FROM workout_sets s
         JOIN workout_exercises we ON we.id = s.workout_exercise_id
         WHERE we.workout_id = ?1
         ORDER BY s.workout_exercise_id ASC, s.set_number ASC",
    )
    .bind(workout_id)
    .fetch_all(pool)
    .await?;

    let mut sets_by_entry: std::collections::HashMap<i64, Vec<WorkoutSet>> =
        std::collections::HashMap::new();
    for set in sets {
        sets_by_entry
            .entry(set.workout_exercise_id)
            .or_default()
            .push(set);
    }

    let exercises = entries
        .into_iter()
        .map(|row| WorkoutExerciseDetail {
            sets: sets_by_entry.remove(&row.id).unwrap_or_default(),
            exercise_name: row.exercise_name,
            entry: WorkoutExercise {
                id: row.id,
                workout_id: row.workout_id,
                exercise_id: row.exercise_id,
                position: row.position,
                created_at: row.created_at,
            },
        })
        .collect();

    Ok(Some(WorkoutDetail { workout, exercises }))
}
