use std::collections::HashSet;
use std::sync::Mutex;

use log::debug;

/// Registry of page paths whose cached renders have gone stale.
///
/// Handlers mark paths after every successful mutation, deriving the keys
/// from the parent ids on the record the core function returned: the workout
/// detail page and the owning user's listing page. A renderer drains the
/// registry and re-renders.
#[derive(Debug, Default)]
pub struct PageCache {
    stale: Mutex<HashSet<String>>,
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidate(&self, path: impl Into<String>) {
        let path = path.into();
        debug!("invalidating cached path {}", path);
        self.stale
            .lock()
            .expect("page cache lock poisoned")
            .insert(path);
    }

    /// Marks both pages affected by a mutation under `workout_id`.
    pub fn invalidate_workout_views(&self, user_id: &str, workout_id: i64) {
        self.invalidate(format!("/workouts/{workout_id}"));
        self.invalidate(format!("/u/{user_id}/workouts"));
    }

    /// Takes all stale paths, leaving the registry empty.
    pub fn drain(&self) -> Vec<String> {
        let mut stale = self.stale.lock().expect("page cache lock poisoned");
        stale.drain().collect()
    }
}
