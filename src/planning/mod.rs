//! Planning module - auto-scheduling of push/pull/legs weeks
//!
//! Features:
//! - Day filtering by rest and preferred weekdays
//! - Rotation counter that advances on every examined calendar day
//! - Deload weeks replacing the rotation with light "Rest" sessions
//! - Best-effort persistence that skips dates already planned

pub mod deload;
pub mod today;

pub use deload::{should_deload, weeks_since_deload};
pub use today::{WorkoutPlan, workout_plan};

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db::{
    Database, NewPlannedWorkout, PlannedWorkout, Split, StoreError, WorkoutSchedule,
};
use crate::splits::{REST, rotation_split_name};

pub const DELOAD_NOTES: &str = "Deload Week - Light Training";
pub const REST_DAY_NOTES: &str = "Rest Day - Recovery";

#[derive(Debug, thiserror::Error)]
pub enum PlanningError {
    #[error("No workout schedule found for user {user_id}")]
    ConfigurationMissing { user_id: i64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Storage operations the scheduler depends on
pub trait PlanningStore {
    fn workout_schedule(&self, user_id: i64) -> Result<Option<WorkoutSchedule>, StoreError>;
    fn all_splits(&self) -> Result<Vec<Split>, StoreError>;
    /// Must report an occupied date as `StoreError::Conflict`
    fn create_planned_workout(&self, new: &NewPlannedWorkout) -> Result<PlannedWorkout, StoreError>;
}

impl PlanningStore for Database {
    fn workout_schedule(&self, user_id: i64) -> Result<Option<WorkoutSchedule>, StoreError> {
        self.get_workout_schedule(user_id)
    }

    fn all_splits(&self) -> Result<Vec<Split>, StoreError> {
        self.get_all_splits()
    }

    fn create_planned_workout(&self, new: &NewPlannedWorkout) -> Result<PlannedWorkout, StoreError> {
        Database::create_planned_workout(self, new)
    }
}

/// A day the scheduler wants on the calendar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedDay {
    pub date: NaiveDate,
    pub split_id: i64,
    pub split_name: String,
    pub notes: Option<String>,
    pub is_deload: bool,
}

impl PlannedDay {
    fn to_new(&self) -> NewPlannedWorkout {
        NewPlannedWorkout {
            date: self.date,
            split_id: self.split_id,
            notes: self.notes.clone(),
        }
    }
}

/// Pure planner: the entries `weeks` weeks from `start` should produce
pub fn plan_days(
    schedule: &WorkoutSchedule,
    splits: &[Split],
    start: NaiveDate,
    weeks: u32,
) -> Vec<PlannedDay> {
    let mut planned = Vec::new();
    let mut rotation_counter: usize = 0;

    for week in 0..u64::from(weeks) {
        // Nothing past the end of the calendar
        let Some(week_start) = start.checked_add_days(Days::new(week * 7)) else {
            return planned;
        };
        let is_deload = should_deload(week_start, schedule);
        if is_deload {
            debug!("Week of {} is a deload week", week_start);
        }

        for offset in 0..7 {
            let Some(date) = week_start.checked_add_days(Days::new(offset)) else {
                return planned;
            };
            if let Some(day) = plan_day(schedule, splits, date, is_deload, rotation_counter) {
                planned.push(day);
            }
            // Examined days always advance the rotation, planned or not
            rotation_counter += 1;
        }
    }

    planned
}

fn plan_day(
    schedule: &WorkoutSchedule,
    splits: &[Split],
    date: NaiveDate,
    is_deload: bool,
    rotation_counter: usize,
) -> Option<PlannedDay> {
    let weekday = date.weekday().num_days_from_sunday();
    if schedule.rest_days.contains(&weekday) || !schedule.preferred_days.contains(&weekday) {
        return None;
    }

    let split_name = if is_deload {
        REST
    } else {
        rotation_split_name(rotation_counter)
    };
    let Some(split) = splits.iter().find(|s| s.name == split_name) else {
        debug!("Split {} not in catalog, skipping {}", split_name, date);
        return None;
    };

    let notes = if is_deload {
        Some(DELOAD_NOTES.to_string())
    } else if split_name == REST {
        Some(REST_DAY_NOTES.to_string())
    } else {
        None
    };

    Some(PlannedDay {
        date,
        split_id: split.id,
        split_name: split.name.clone(),
        notes,
        is_deload,
    })
}

/// Fill the calendar for `weeks` weeks from `start`.
///
/// Returns only entries created by this call, in date order. Dates that are
/// already planned are skipped, other per-day write failures are logged and
/// skipped. A missing schedule fails the whole call before any write.
pub fn generate_auto_schedule<S: PlanningStore>(
    store: &S,
    user_id: i64,
    start: NaiveDate,
    weeks: u32,
) -> Result<Vec<PlannedWorkout>, PlanningError> {
    let schedule = store
        .workout_schedule(user_id)?
        .ok_or(PlanningError::ConfigurationMissing { user_id })?;
    let splits = store.all_splits()?;

    let mut created = Vec::new();
    for day in plan_days(&schedule, &splits, start, weeks) {
        match store.create_planned_workout(&day.to_new()) {
            Ok(workout) => created.push(workout),
            Err(StoreError::Conflict { date }) => {
                debug!("Workout already planned for {}", date);
            }
            Err(e) => {
                warn!("Failed to plan {} for {}: {}", day.split_name, day.date, e);
            }
        }
    }

    info!(
        "Auto-scheduled {} workouts from {} over {} weeks",
        created.len(),
        start,
        weeks
    );
    Ok(created)
}
