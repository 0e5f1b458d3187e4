//! Database module - SQLite storage for splits, schedules, the calendar, exercises and workouts

pub mod exercises;
pub mod planned;
pub mod workouts;

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params, types::Type};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::splits::DEFAULT_SPLITS;

pub use exercises::{Exercise, ExerciseUpdate, NewExercise};
pub use planned::{NewPlannedWorkout, PlannedWorkout, PlannedWorkoutUpdate, month_bounds};
pub use workouts::{
    ExerciseSets, LoggedExercise, LoggedSet, NewWorkout, PersonalRecord, ProgressMetric,
    ProgressPoint, Workout, WorkoutSet, WorkoutWithSets,
};

/// Owner of the schedule when none is given explicitly
pub const DEFAULT_USER_ID: i64 = 1;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Workout already planned for {date}")]
    Conflict { date: NaiveDate },

    #[error("Planned workout {id} not found")]
    NotFound { id: i64 },

    #[error("Exercise {id} not found")]
    ExerciseNotFound { id: i64 },

    #[error("Workout {id} not found")]
    WorkoutNotFound { id: i64 },

    #[error("Exercise already exists: {0}")]
    DuplicateExercise(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("No fields to update")]
    EmptyUpdate,

    #[error("Unknown split: {0}")]
    UnknownSplit(String),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Workout split from the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Split {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

/// Per-user scheduling preferences
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkoutSchedule {
    pub user_id: i64,
    /// Weekdays eligible for training, 0 = Sunday
    pub preferred_days: BTreeSet<u32>,
    /// Weekdays always skipped, checked before preferred days
    pub rest_days: BTreeSet<u32>,
    /// Weeks between deloads
    pub deload_frequency: u32,
    pub last_deload_date: Option<NaiveDate>,
    pub created_at: String,
}

impl WorkoutSchedule {
    /// Schedule used as the base when a user saves one for the first time
    pub fn defaults(user_id: i64) -> Self {
        Self {
            user_id,
            preferred_days: [1, 2, 3, 4, 5].into_iter().collect(),
            rest_days: [0, 6].into_iter().collect(),
            deload_frequency: 4,
            last_deload_date: None,
            created_at: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if let Some(day) = self
            .preferred_days
            .iter()
            .chain(self.rest_days.iter())
            .find(|d| **d > 6)
        {
            return Err(StoreError::InvalidSchedule(format!(
                "weekday {} is outside 0..=6",
                day
            )));
        }
        if self.deload_frequency == 0 {
            return Err(StoreError::InvalidSchedule(
                "deload frequency must be at least one week".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial schedule change; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct ScheduleUpdate {
    pub preferred_days: Option<BTreeSet<u32>>,
    pub rest_days: Option<BTreeSet<u32>>,
    pub deload_frequency: Option<u32>,
    /// `Some(None)` forgets the last deload
    pub last_deload_date: Option<Option<NaiveDate>>,
}

impl ScheduleUpdate {
    fn apply(&self, schedule: &mut WorkoutSchedule) {
        if let Some(days) = &self.preferred_days {
            schedule.preferred_days = days.clone();
        }
        if let Some(days) = &self.rest_days {
            schedule.rest_days = days.clone();
        }
        if let Some(freq) = self.deload_frequency {
            schedule.deload_frequency = freq;
        }
        if let Some(date) = self.last_deload_date {
            schedule.last_deload_date = date;
        }
    }
}

/// Database wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        info!("Database opened at {}", path);
        Self::with_connection(conn)
    }

    /// Fresh private database, used by tests and previews
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let db = Self { conn };
        db.init_schema()?;
        db.seed_splits()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS workout_splits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS workout_schedule (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL UNIQUE,
                preferred_days TEXT NOT NULL,
                rest_days TEXT NOT NULL,
                deload_frequency INTEGER NOT NULL,
                last_deload_date TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS planned_workouts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL UNIQUE,
                split_id INTEGER NOT NULL REFERENCES workout_splits(id),
                notes TEXT,
                is_completed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS exercises (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                category TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS exercise_splits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                exercise_id INTEGER NOT NULL REFERENCES exercises(id) ON DELETE CASCADE,
                split_id INTEGER NOT NULL REFERENCES workout_splits(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (exercise_id, split_id)
            );

            CREATE TABLE IF NOT EXISTS workouts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                notes TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS workout_sets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workout_id INTEGER NOT NULL REFERENCES workouts(id) ON DELETE CASCADE,
                exercise_id INTEGER NOT NULL REFERENCES exercises(id) ON DELETE CASCADE,
                weight REAL NOT NULL,
                reps INTEGER NOT NULL,
                set_order INTEGER NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );",
        )?;
        Ok(())
    }

    /// Insert catalog splits that are missing, keeping existing ids
    fn seed_splits(&self) -> Result<(), StoreError> {
        let mut stmt = self.conn.prepare(
            "INSERT OR IGNORE INTO workout_splits (name, description) VALUES (?1, ?2)",
        )?;
        for split in DEFAULT_SPLITS {
            let inserted = stmt.execute(params![split.name, split.description])?;
            if inserted > 0 {
                debug!("Seeded split {}", split.name);
            }
        }
        Ok(())
    }

    /// All splits in id order
    pub fn get_all_splits(&self) -> Result<Vec<Split>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, created_at FROM workout_splits ORDER BY id",
        )?;
        let splits = stmt
            .query_map([], split_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(splits)
    }

    pub fn get_split_by_name(&self, name: &str) -> Result<Option<Split>, StoreError> {
        let split = self
            .conn
            .query_row(
                "SELECT id, name, description, created_at FROM workout_splits WHERE name = ?1",
                params![name],
                split_from_row,
            )
            .optional()?;
        Ok(split)
    }

    /// Stored schedule, rejected with `InvalidSchedule` if the row is out of range
    pub fn get_workout_schedule(&self, user_id: i64) -> Result<Option<WorkoutSchedule>, StoreError> {
        let schedule = self.load_workout_schedule(user_id)?;
        if let Some(schedule) = &schedule {
            schedule.validate()?;
        }
        Ok(schedule)
    }

    fn load_workout_schedule(&self, user_id: i64) -> Result<Option<WorkoutSchedule>, StoreError> {
        let schedule = self
            .conn
            .query_row(
                "SELECT user_id, preferred_days, rest_days, deload_frequency, last_deload_date, created_at
                 FROM workout_schedule WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(WorkoutSchedule {
                        user_id: row.get(0)?,
                        preferred_days: weekdays_column(row, 1)?,
                        rest_days: weekdays_column(row, 2)?,
                        deload_frequency: row.get(3)?,
                        last_deload_date: optional_date_column(row, 4)?,
                        created_at: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(schedule)
    }

    /// Create or partially update a user's schedule
    pub fn save_workout_schedule(
        &self,
        user_id: i64,
        update: &ScheduleUpdate,
    ) -> Result<WorkoutSchedule, StoreError> {
        // Unvalidated so a broken row can be repaired by the update
        let mut schedule = self
            .load_workout_schedule(user_id)?
            .unwrap_or_else(|| WorkoutSchedule::defaults(user_id));
        update.apply(&mut schedule);
        schedule.validate()?;

        self.conn.execute(
            "INSERT INTO workout_schedule (user_id, preferred_days, rest_days, deload_frequency, last_deload_date)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
                preferred_days = excluded.preferred_days,
                rest_days = excluded.rest_days,
                deload_frequency = excluded.deload_frequency,
                last_deload_date = excluded.last_deload_date",
            params![
                user_id,
                weekdays_json(&schedule.preferred_days),
                weekdays_json(&schedule.rest_days),
                schedule.deload_frequency,
                schedule.last_deload_date.map(format_date),
            ],
        )?;
        info!("Saved workout schedule for user {}", user_id);

        self.get_workout_schedule(user_id)?
            .ok_or(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(text: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(text, DATE_FORMAT)
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn split_from_row(row: &Row) -> rusqlite::Result<Split> {
    Ok(Split {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn weekdays_json(days: &BTreeSet<u32>) -> String {
    // A set of integers always serializes
    serde_json::to_string(days).unwrap_or_else(|_| "[]".to_string())
}

fn weekdays_column(row: &Row, idx: usize) -> rusqlite::Result<BTreeSet<u32>> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn date_column(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    parse_date(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn optional_date_column(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| parse_date(&t))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
