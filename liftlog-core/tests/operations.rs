use anyhow::Result;
use chrono::NaiveDate;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use liftlog_core::db;
use liftlog_core::db::models::{UpdateSet, UpdateWorkout};
use liftlog_core::db::operations::*;

// A single-connection pool: every pooled connection to an in-memory SQLite
// database would otherwise see its own empty database.
async fn test_pool() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    db::init_database(&pool).await?;
    Ok(pool)
}

fn ts(raw: &str) -> i64 {
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .unwrap()
        .and_utc()
        .timestamp()
}

#[tokio::test]
async fn workout_visible_to_owner_only() -> Result<()> {
    let pool = test_pool().await?;

    let workout = create_workout(&pool, "u1", "Push Day", ts("2024-06-01T08:00")).await?;

    let found = get_workout(&pool, workout.id, "u1").await?;
    assert_eq!(found.map(|w| w.id), Some(workout.id));

    assert!(get_workout(&pool, workout.id, "u2").await?.is_none());
    assert!(get_workout(&pool, workout.id + 1, "u1").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn set_numbers_are_dense_under_serial_inserts() -> Result<()> {
    let pool = test_pool().await?;

    let workout = create_workout(&pool, "u1", "Legs", ts("2024-06-01T08:00")).await?;
    let squat = create_exercise(&pool, "Squat").await?;
    let entry = add_exercise_to_workout(&pool, workout.id, squat.id, "u1")
        .await?
        .unwrap();

    for _ in 0..5 {
        add_set(&pool, entry.id, "u1", 8, 100.0).await?.unwrap();
    }

    let sets = get_sets_for_entry(&pool, entry.id, "u1").await?;
    let numbers: Vec<i64> = sets.iter().map(|s| s.set_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    Ok(())
}

#[tokio::test]
async fn positions_start_at_zero_and_increase() -> Result<()> {
    let pool = test_pool().await?;

    let workout = create_workout(&pool, "u1", "Full Body", ts("2024-06-01T08:00")).await?;
    let squat = create_exercise(&pool, "Squat").await?;
    let bench = create_exercise(&pool, "Bench Press").await?;
    let row = create_exercise(&pool, "Barbell Row").await?;

    let first = add_exercise_to_workout(&pool, workout.id, squat.id, "u1")
        .await?
        .unwrap();
    let second = add_exercise_to_workout(&pool, workout.id, bench.id, "u1")
        .await?
        .unwrap();
    let third = add_exercise_to_workout(&pool, workout.id, row.id, "u1")
        .await?
        .unwrap();

    assert_eq!(first.position, 0);
    assert_eq!(second.position, 1);
    assert_eq!(third.position, 2);
    Ok(())
}

#[tokio::test]
async fn deleting_a_workout_cascades_to_entries_and_sets() -> Result<()> {
    let pool = test_pool().await?;

    let workout = create_workout(&pool, "u1", "Pull Day", ts("2024-06-01T08:00")).await?;
    let deadlift = create_exercise(&pool, "Deadlift").await?;
    let entry = add_exercise_to_workout(&pool, workout.id, deadlift.id, "u1")
        .await?
        .unwrap();
    add_set(&pool, entry.id, "u1", 5, 180.0).await?.unwrap();
    add_set(&pool, entry.id, "u1", 5, 180.0).await?.unwrap();

    let deleted = delete_workout(&pool, workout.id, "u1").await?;
    assert_eq!(deleted.map(|w| w.id), Some(workout.id));

    let entry_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM workout_exercises")
        .fetch_one(&pool)
        .await?;
    let set_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM workout_sets")
        .fetch_one(&pool)
        .await?;
    assert_eq!(entry_count, 0);
    assert_eq!(set_count, 0);

    // The catalog entry is shared reference data and survives.
    assert!(get_exercise(&pool, deadlift.id).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn removing_an_entry_cascades_to_its_sets_only() -> Result<()> {
    let pool = test_pool().await?;

    let workout = create_workout(&pool, "u1", "Legs", ts("2024-06-01T08:00")).await?;
    let squat = create_exercise(&pool, "Squat").await?;
    let press = create_exercise(&pool, "Leg Press").await?;
    let first = add_exercise_to_workout(&pool, workout.id, squat.id, "u1")
        .await?
        .unwrap();
    let second = add_exercise_to_workout(&pool, workout.id, press.id, "u1")
        .await?
        .unwrap();
    add_set(&pool, first.id, "u1", 8, 120.0).await?.unwrap();
    add_set(&pool, second.id, "u1", 10, 200.0).await?.unwrap();

    let removed = remove_exercise_from_workout(&pool, first.id, "u1").await?;
    assert_eq!(removed.map(|e| e.id), Some(first.id));

    assert!(get_sets_for_entry(&pool, first.id, "u1").await?.is_empty());
    assert_eq!(get_sets_for_entry(&pool, second.id, "u1").await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn day_range_returns_only_that_day_in_order() -> Result<()> {
    let pool = test_pool().await?;

    let evening = create_workout(&pool, "u1", "Evening", ts("2024-06-01T19:30")).await?;
    let morning = create_workout(&pool, "u1", "Morning", ts("2024-06-01T06:00")).await?;
    create_workout(&pool, "u1", "Day Before", ts("2024-05-31T23:59")).await?;
    create_workout(&pool, "u1", "Day After", ts("2024-06-02T00:00")).await?;
    create_workout(&pool, "u2", "Someone Else", ts("2024-06-01T12:00")).await?;

    let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let workouts = get_workouts_for_day(&pool, "u1", date).await?;

    let ids: Vec<i64> = workouts.iter().map(|w| w.id).collect();
    assert_eq!(ids, vec![morning.id, evening.id]);
    Ok(())
}

#[tokio::test]
async fn unauthorized_update_is_a_no_op() -> Result<()> {
    let pool = test_pool().await?;

    let workout = create_workout(&pool, "u1", "Legs", ts("2024-06-01T08:00")).await?;
    let squat = create_exercise(&pool, "Squat").await?;
    let entry = add_exercise_to_workout(&pool, workout.id, squat.id, "u1")
        .await?
        .unwrap();
    let set = add_set(&pool, entry.id, "u1", 8, 135.0).await?.unwrap();

    let update = UpdateSet {
        reps: Some(1),
        weight: Some(1.0),
    };
    assert!(update_set(&pool, set.id, "u2", &update).await?.is_none());
    assert!(delete_set(&pool, set.id, "u2").await?.is_none());

    let sets = get_sets_for_entry(&pool, entry.id, "u1").await?;
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].reps, 8);
    assert_eq!(sets[0].weight, 135.0);
    Ok(())
}

#[tokio::test]
async fn unauthorized_child_insert_is_rejected() -> Result<()> {
    let pool = test_pool().await?;

    let workout = create_workout(&pool, "u1", "Legs", ts("2024-06-01T08:00")).await?;
    let squat = create_exercise(&pool, "Squat").await?;

    assert!(
        add_exercise_to_workout(&pool, workout.id, squat.id, "u2")
            .await?
            .is_none()
    );

    let entry = add_exercise_to_workout(&pool, workout.id, squat.id, "u1")
        .await?
        .unwrap();
    assert!(add_set(&pool, entry.id, "u2", 8, 100.0).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn update_workout_merges_partial_fields() -> Result<()> {
    let pool = test_pool().await?;

    let workout = create_workout(&pool, "u1", "Legs", ts("2024-06-01T08:00")).await?;

    let update = UpdateWorkout {
        name: Some("Leg Day".to_string()),
        ..Default::default()
    };
    let updated = update_workout(&pool, workout.id, "u1", &update)
        .await?
        .unwrap();
    assert_eq!(updated.name, "Leg Day");
    assert_eq!(updated.started_at, workout.started_at);
    assert!(updated.completed_at.is_none());

    let done_at = ts("2024-06-01T09:15");
    let completed = complete_workout(&pool, workout.id, "u1", done_at)
        .await?
        .unwrap();
    assert_eq!(completed.completed_at, Some(done_at));
    assert_eq!(completed.name, "Leg Day");
    Ok(())
}

#[tokio::test]
async fn catalog_is_shared_and_sorted_by_name() -> Result<()> {
    let pool = test_pool().await?;

    create_exercise(&pool, "Squat").await?;
    create_exercise(&pool, "Bench Press").await?;
    create_exercise(&pool, "Deadlift").await?;

    let names: Vec<String> = get_all_exercises(&pool)
        .await?
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["Bench Press", "Deadlift", "Squat"]);
    Ok(())
}

#[tokio::test]
async fn get_or_create_exercise_reuses_existing_names() -> Result<()> {
    let pool = test_pool().await?;

    let first = get_or_create_exercise(&pool, "Overhead Press").await?;
    let second = get_or_create_exercise(&pool, "Overhead Press").await?;
    assert_eq!(first.id, second.id);

    assert_eq!(get_all_exercises(&pool).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn store_constraints_reject_invalid_ranges() -> Result<()> {
    let pool = test_pool().await?;

    let workout = create_workout(&pool, "u1", "Legs", ts("2024-06-01T08:00")).await?;
    let squat = create_exercise(&pool, "Squat").await?;
    let entry = add_exercise_to_workout(&pool, workout.id, squat.id, "u1")
        .await?
        .unwrap();

    assert!(add_set(&pool, entry.id, "u1", 0, 100.0).await.is_err());
    assert!(add_set(&pool, entry.id, "u1", 8, -1.0).await.is_err());

    // Nothing was written by the rejected inserts.
    assert!(get_sets_for_entry(&pool, entry.id, "u1").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn range_query_spans_multiple_days() -> Result<()> {
    let pool = test_pool().await?;

    let saturday = create_workout(&pool, "u1", "Saturday", ts("2024-06-01T10:00")).await?;
    let sunday = create_workout(&pool, "u1", "Sunday", ts("2024-06-02T10:00")).await?;
    create_workout(&pool, "u1", "Monday", ts("2024-06-03T10:00")).await?;

    let workouts = get_workouts_in_range(
        &pool,
        "u1",
        ts("2024-06-01T00:00"),
        ts("2024-06-02T23:59"),
    )
    .await?;
    let ids: Vec<i64> = workouts.iter().map(|w| w.id).collect();
    assert_eq!(ids, vec![saturday.id, sunday.id]);
    Ok(())
}

#[tokio::test]
async fn drop_all_tables_leaves_an_empty_database() -> Result<()> {
    let pool = test_pool().await?;

    let workout = create_workout(&pool, "u1", "Legs", ts("2024-06-01T08:00")).await?;
    let squat = create_exercise(&pool, "Squat").await?;
    let entry = add_exercise_to_workout(&pool, workout.id, squat.id, "u1")
        .await?
        .unwrap();
    add_set(&pool, entry.id, "u1", 8, 100.0).await?.unwrap();

    db::drop_all_tables(&pool).await?;

    assert!(get_workouts(&pool, "u1").await?.is_empty());
    assert!(get_all_exercises(&pool).await?.is_empty());
    let set_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM workout_sets")
        .fetch_one(&pool)
        .await?;
    assert_eq!(set_count, 0);
    Ok(())
}

#[tokio::test]
async fn leg_day_end_to_end() -> Result<()> {
    let pool = test_pool().await?;

    let workout = create_workout(&pool, "u1", "Leg Day", ts("2024-06-01T08:00")).await?;

    let squat = create_exercise(&pool, "Squat").await?;
    let lunge = create_exercise(&pool, "Lunge").await?;

    let first = add_exercise_to_workout(&pool, workout.id, squat.id, "u1")
        .await?
        .unwrap();
    assert_eq!(first.position, 0);

    let second = add_exercise_to_workout(&pool, workout.id, lunge.id, "u1")
        .await?
        .unwrap();
    assert_eq!(second.position, 1);

    let set_one = add_set(&pool, first.id, "u1", 8, 135.0).await?.unwrap();
    assert_eq!(set_one.set_number, 1);
    let set_two = add_set(&pool, first.id, "u1", 6, 145.0).await?.unwrap();
    assert_eq!(set_two.set_number, 2);

    let detail = get_workout_detail(&pool, workout.id, "u1").await?.unwrap();
    assert_eq!(detail.workout.name, "Leg Day");
    assert_eq!(detail.exercises.len(), 2);
    assert_eq!(detail.exercises[0].exercise_name, "Squat");
    assert_eq!(detail.exercises[1].exercise_name, "Lunge");

    let squat_sets = &detail.exercises[0].sets;
    assert_eq!(squat_sets.len(), 2);
    assert_eq!((squat_sets[0].reps, squat_sets[0].weight), (8, 135.0));
    assert_eq!((squat_sets[1].reps, squat_sets[1].weight), (6, 145.0));
    assert!(detail.exercises[1].sets.is_empty());

    assert!(get_workout_detail(&pool, workout.id, "u2").await?.is_none());
    Ok(())
}
