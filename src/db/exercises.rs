//! Exercise catalog and the exercises assigned to each split

use rusqlite::{OptionalExtension, Row, params, params_from_iter, types::Value};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Database, StoreError, is_unique_violation};

const SELECT_EXERCISE: &str = "SELECT e.id, e.name, e.category, e.created_at FROM exercises e";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Exercise {
    pub id: i64,
    pub name: String,
    /// Free-form muscle group, e.g. "Chest" or "Legs"
    pub category: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewExercise {
    pub name: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExerciseUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
}

impl Database {
    /// All exercises ordered by name
    pub fn get_all_exercises(&self) -> Result<Vec<Exercise>, StoreError> {
        let sql = format!("{} ORDER BY e.name", SELECT_EXERCISE);
        let mut stmt = self.conn.prepare(&sql)?;
        let exercises = stmt
            .query_map([], exercise_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(exercises)
    }

    pub fn get_exercise(&self, id: i64) -> Result<Option<Exercise>, StoreError> {
        let sql = format!("{} WHERE e.id = ?1", SELECT_EXERCISE);
        let exercise = self
            .conn
            .query_row(&sql, params![id], exercise_from_row)
            .optional()?;
        Ok(exercise)
    }

    pub fn get_exercise_by_name(&self, name: &str) -> Result<Option<Exercise>, StoreError> {
        let sql = format!("{} WHERE e.name = ?1", SELECT_EXERCISE);
        let exercise = self
            .conn
            .query_row(&sql, params![name], exercise_from_row)
            .optional()?;
        Ok(exercise)
    }

    /// Case-insensitive substring match on the name
    pub fn search_exercises(&self, query: &str) -> Result<Vec<Exercise>, StoreError> {
        let sql = format!("{} WHERE e.name LIKE ?1 ORDER BY e.name", SELECT_EXERCISE);
        let pattern = format!("%{}%", query);
        let mut stmt = self.conn.prepare(&sql)?;
        let exercises = stmt
            .query_map(params![pattern], exercise_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(exercises)
    }

    pub fn create_exercise(&self, new: &NewExercise) -> Result<Exercise, StoreError> {
        self.conn
            .execute(
                "INSERT INTO exercises (name, category) VALUES (?1, ?2)",
                params![new.name, new.category],
            )
            .map_err(|e| classify_name_error(e, &new.name))?;

        let id = self.conn.last_insert_rowid();
        info!("Added exercise {} ({})", new.name, id);
        self.get_exercise(id)?.ok_or(StoreError::ExerciseNotFound { id })
    }

    pub fn update_exercise(
        &self,
        id: i64,
        update: &ExerciseUpdate,
    ) -> Result<Exercise, StoreError> {
        let mut columns: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(name) = &update.name {
            columns.push("name");
            values.push(Value::Text(name.clone()));
        }
        if let Some(category) = &update.category {
            columns.push("category");
            values.push(Value::Text(category.clone()));
        }
        if columns.is_empty() {
            return Err(StoreError::EmptyUpdate);
        }

        let assignments: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{} = ?{}", col, i + 1))
            .collect();
        let sql = format!(
            "UPDATE exercises SET {} WHERE id = ?{}",
            assignments.join(", "),
            columns.len() + 1
        );
        values.push(Value::Integer(id));

        let changed = self
            .conn
            .execute(&sql, params_from_iter(values))
            .map_err(|e| match &update.name {
                Some(name) => classify_name_error(e, name),
                None => e.into(),
            })?;
        if changed == 0 {
            return Err(StoreError::ExerciseNotFound { id });
        }

        self.get_exercise(id)?.ok_or(StoreError::ExerciseNotFound { id })
    }

    /// Removes the exercise together with its logged sets and split links
    pub fn delete_exercise(&self, id: i64) -> Result<(), StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM exercises WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::ExerciseNotFound { id });
        }
        Ok(())
    }

    /// Link an exercise to a split, a repeated link is a no-op
    pub fn assign_exercise_to_split(
        &self,
        exercise_id: i64,
        split_id: i64,
    ) -> Result<(), StoreError> {
        if self.get_exercise(exercise_id)?.is_none() {
            return Err(StoreError::ExerciseNotFound { id: exercise_id });
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO exercise_splits (exercise_id, split_id) VALUES (?1, ?2)",
            params![exercise_id, split_id],
        )?;
        Ok(())
    }

    /// Returns false when the link did not exist
    pub fn remove_exercise_from_split(
        &self,
        exercise_id: i64,
        split_id: i64,
    ) -> Result<bool, StoreError> {
        let removed = self.conn.execute(
            "DELETE FROM exercise_splits WHERE exercise_id = ?1 AND split_id = ?2",
            params![exercise_id, split_id],
        )?;
        Ok(removed > 0)
    }

    /// Exercises assigned to a split, ordered by name
    pub fn get_exercises_by_split(&self, split_id: i64) -> Result<Vec<Exercise>, StoreError> {
        let sql = format!(
            "{} JOIN exercise_splits es ON es.exercise_id = e.id
             WHERE es.split_id = ?1
             ORDER BY e.name",
            SELECT_EXERCISE
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let exercises = stmt
            .query_map(params![split_id], exercise_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(exercises)
    }

    /// Names of the splits an exercise is assigned to
    pub fn get_splits_for_exercise(&self, exercise_id: i64) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT ws.name FROM exercise_splits es
             JOIN workout_splits ws ON ws.id = es.split_id
             WHERE es.exercise_id = ?1
             ORDER BY ws.id",
        )?;
        let names = stmt
            .query_map(params![exercise_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }
}

fn exercise_from_row(row: &Row) -> rusqlite::Result<Exercise> {
    Ok(Exercise {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn classify_name_error(err: rusqlite::Error, name: &str) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::DuplicateExercise(name.to_string())
    } else {
        StoreError::Sqlite(err)
    }
}
