use std::fmt;

use serde::Serialize;
use sqlx::FromRow;

/// A logged workout session. `user_id` is the opaque identifier supplied by
/// the identity provider; it never changes after the row is created.
#[derive(FromRow, Debug, Clone, Serialize)]
pub struct Workout {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Catalog entry shared across users.
#[derive(FromRow, Debug, Clone, Serialize)]
pub struct Exercise {
    pub id: i64,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One exercise slotted into a workout. `position` is unique per workout and
/// assigned monotonically, starting at 0.
#[derive(FromRow, Debug, Clone, Serialize)]
pub struct WorkoutExercise {
    pub id: i64,
    pub workout_id: i64,
    pub exercise_id: i64,
    pub position: i64,
    pub created_at: i64,
}

/// One recorded set. `set_number` is unique per workout exercise and assigned
/// monotonically, starting at 1.
#[derive(FromRow, Debug, Clone, Serialize)]
pub struct WorkoutSet {
    pub id: i64,
    pub workout_exercise_id: i64,
    pub set_number: i64,
    pub reps: i64,
    pub weight: f64,
    pub created_at: i64,
}

impl fmt::Display for WorkoutSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Set {}: {:.1}kg x {} reps",
            self.set_number, self.weight, self.reps
        )
    }
}

/// Partial update for a workout. `None` fields keep their current value.
#[derive(Debug, Default, Clone)]
pub struct UpdateWorkout {
    pub name: Option<String>,
    pub started_at: Option<i64>,
    /// Outer `None` keeps the current value, `Some(None)` clears completion.
    pub completed_at: Option<Option<i64>>,
}

/// Partial update for a set. `None` fields keep their current value.
#[derive(Debug, Default, Clone)]
pub struct UpdateSet {
    pub reps: Option<i64>,
    pub weight: Option<f64>,
}

/// One workout exercise with its catalog name and ordered sets, as shown on
/// the workout detail view.
#[derive(Debug, Clone, Serialize)]
pub struct WorkoutExerciseDetail {
    pub entry: WorkoutExercise,
    pub exercise_name: String,
    pub sets: Vec<WorkoutSet>,
}

/// A workout with its exercises in display order.
#[derive(Debug, Clone, Serialize)]
pub struct WorkoutDetail {
    pub workout: Workout,
    pub exercises: Vec<WorkoutExerciseDetail>,
}
