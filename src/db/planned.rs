//! Planned workouts - calendar entries, at most one per date

use chrono::NaiveDate;
use rusqlite::{OptionalExtension, Row, params, params_from_iter, types::Value};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Database, StoreError, date_column, format_date, is_unique_violation};

const SELECT_PLANNED: &str = "SELECT pw.id, pw.date, pw.split_id, ws.name, pw.notes, pw.is_completed, pw.created_at
     FROM planned_workouts pw
     JOIN workout_splits ws ON pw.split_id = ws.id";

/// Calendar entry joined with its split name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedWorkout {
    pub id: i64,
    pub date: NaiveDate,
    pub split_id: i64,
    pub split_name: String,
    pub notes: Option<String>,
    pub is_completed: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPlannedWorkout {
    pub date: NaiveDate,
    pub split_id: i64,
    pub notes: Option<String>,
}

/// Partial change to a planned workout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlannedWorkoutUpdate {
    pub date: Option<NaiveDate>,
    pub split_id: Option<i64>,
    pub notes: Option<String>,
}

/// First and last day of a calendar month
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

impl Database {
    /// Planned workouts ordered by date, optionally within an inclusive range
    pub fn get_planned_workouts(
        &self,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<PlannedWorkout>, StoreError> {
        let mut sql = SELECT_PLANNED.to_string();
        let mut values: Vec<Value> = Vec::new();
        if let Some((start, end)) = range {
            sql.push_str(" WHERE pw.date BETWEEN ?1 AND ?2");
            values.push(Value::Text(format_date(start)));
            values.push(Value::Text(format_date(end)));
        }
        sql.push_str(" ORDER BY pw.date ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let planned = stmt
            .query_map(params_from_iter(values), planned_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(planned)
    }

    pub fn get_planned_workout_by_date(
        &self,
        date: NaiveDate,
    ) -> Result<Option<PlannedWorkout>, StoreError> {
        let sql = format!("{} WHERE pw.date = ?1", SELECT_PLANNED);
        let planned = self
            .conn
            .query_row(&sql, params![format_date(date)], planned_from_row)
            .optional()?;
        Ok(planned)
    }

    pub fn get_planned_workout(&self, id: i64) -> Result<Option<PlannedWorkout>, StoreError> {
        let sql = format!("{} WHERE pw.id = ?1", SELECT_PLANNED);
        let planned = self
            .conn
            .query_row(&sql, params![id], planned_from_row)
            .optional()?;
        Ok(planned)
    }

    /// Insert a calendar entry; an occupied date yields `StoreError::Conflict`
    pub fn create_planned_workout(
        &self,
        new: &NewPlannedWorkout,
    ) -> Result<PlannedWorkout, StoreError> {
        self.conn
            .execute(
                "INSERT INTO planned_workouts (date, split_id, notes) VALUES (?1, ?2, ?3)",
                params![format_date(new.date), new.split_id, new.notes],
            )
            .map_err(|e| classify_write_error(e, new.date))?;

        let id = self.conn.last_insert_rowid();
        self.get_planned_workout(id)?.ok_or(StoreError::NotFound { id })
    }

    pub fn update_planned_workout(
        &self,
        id: i64,
        update: &PlannedWorkoutUpdate,
    ) -> Result<PlannedWorkout, StoreError> {
        let mut columns: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(date) = update.date {
            columns.push("date");
            values.push(Value::Text(format_date(date)));
        }
        if let Some(split_id) = update.split_id {
            columns.push("split_id");
            values.push(Value::Integer(split_id));
        }
        if let Some(notes) = &update.notes {
            columns.push("notes");
            values.push(Value::Text(notes.clone()));
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
            "UPDATE planned_workouts SET {} WHERE id = ?{}",
            assignments.join(", "),
            columns.len() + 1
        );
        values.push(Value::Integer(id));

        let changed = match self.conn.execute(&sql, params_from_iter(values)) {
            Ok(changed) => changed,
            Err(e) => {
                return Err(match update.date {
                    Some(date) => classify_write_error(e, date),
                    None => e.into(),
                });
            }
        };
        if changed == 0 {
            return Err(StoreError::NotFound { id });
        }

        self.get_planned_workout(id)?.ok_or(StoreError::NotFound { id })
    }

    pub fn mark_workout_completed(&self, id: i64) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE planned_workouts SET is_completed = 1 WHERE id = ?1",
            params![id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound { id });
        }
        Ok(())
    }

    pub fn delete_planned_workout(&self, id: i64) -> Result<(), StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM planned_workouts WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::NotFound { id });
        }
        Ok(())
    }

    /// Delete every entry in an inclusive date range, returns the count
    pub fn clear_planned_workouts(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<usize, StoreError> {
        let deleted = self.conn.execute(
            "DELETE FROM planned_workouts WHERE date BETWEEN ?1 AND ?2",
            params![format_date(start), format_date(end)],
        )?;
        info!("Cleared {} planned workouts between {} and {}", deleted, start, end);
        Ok(deleted)
    }
}

fn planned_from_row(row: &Row) -> rusqlite::Result<PlannedWorkout> {
    Ok(PlannedWorkout {
        id: row.get(0)?,
        date: date_column(row, 1)?,
        split_id: row.get(2)?,
        split_name: row.get(3)?,
        notes: row.get(4)?,
        is_completed: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Only a UNIQUE violation counts as a date conflict
fn classify_write_error(err: rusqlite::Error, date: NaiveDate) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::Conflict { date }
    } else {
        StoreError::Sqlite(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::parse_date;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn split_id(db: &Database, name: &str) -> i64 {
        db.get_split_by_name(name).unwrap().unwrap().id
    }

    fn plan(db: &Database, day: &str, split: &str) -> PlannedWorkout {
        db.create_planned_workout(&NewPlannedWorkout {
            date: date(day),
            split_id: split_id(db, split),
            notes: None,
        })
        .unwrap()
    }

    #[test]
    fn test_create_joins_split_name() {
        let db = Database::open_in_memory().unwrap();
        let created = plan(&db, "2024-01-02", "Pull");
        assert_eq!(created.date, date("2024-01-02"));
        assert_eq!(created.split_name, "Pull");
        assert!(!created.is_completed);
        assert_eq!(created.notes, None);
    }

    #[test]
    fn test_duplicate_date_is_conflict() {
        let db = Database::open_in_memory().unwrap();
        plan(&db, "2024-01-02", "Pull");
        let err = db
            .create_planned_workout(&NewPlannedWorkout {
                date: date("2024-01-02"),
                split_id: split_id(&db, "Legs"),
                notes: None,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { date: d } if d == date("2024-01-02")));
        assert_eq!(db.get_planned_workouts(None).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_split_is_not_conflict() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .create_planned_workout(&NewPlannedWorkout {
                date: date("2024-01-02"),
                split_id: 999,
                notes: None,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)));
    }

    #[test]
    fn test_list_range_and_order() {
        let db = Database::open_in_memory().unwrap();
        plan(&db, "2024-02-01", "Legs");
        plan(&db, "2024-01-15", "Push");
        plan(&db, "2024-01-31", "Pull");

        let all = db.get_planned_workouts(None).unwrap();
        let dates: Vec<_> = all.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![date("2024-01-15"), date("2024-01-31"), date("2024-02-01")]);

        let (start, end) = month_bounds(2024, 1).unwrap();
        assert_eq!(db.get_planned_workouts(Some((start, end))).unwrap().len(), 2);
    }

    #[test]
    fn test_get_by_date() {
        let db = Database::open_in_memory().unwrap();
        plan(&db, "2024-01-03", "Legs");
        let found = db.get_planned_workout_by_date(date("2024-01-03")).unwrap().unwrap();
        assert_eq!(found.split_name, "Legs");
        assert!(db.get_planned_workout_by_date(date("2024-01-04")).unwrap().is_none());
    }

    #[test]
    fn test_update_fields() {
        let db = Database::open_in_memory().unwrap();
        let created = plan(&db, "2024-01-03", "Legs");
        let updated = db
            .update_planned_workout(
                created.id,
                &PlannedWorkoutUpdate {
                    split_id: Some(split_id(&db, "Push")),
                    notes: Some("Heavy bench".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.split_name, "Push");
        assert_eq!(updated.notes.as_deref(), Some("Heavy bench"));
        assert_eq!(updated.date, date("2024-01-03"));
    }

    #[test]
    fn test_update_onto_occupied_date_conflicts() {
        let db = Database::open_in_memory().unwrap();
        plan(&db, "2024-01-03", "Legs");
        let other = plan(&db, "2024-01-04", "Push");
        let err = db
            .update_planned_workout(
                other.id,
                &PlannedWorkoutUpdate {
                    date: Some(date("2024-01-03")),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[test]
    fn test_update_errors() {
        let db = Database::open_in_memory().unwrap();
        let created = plan(&db, "2024-01-03", "Legs");
        assert!(matches!(
            db.update_planned_workout(created.id, &PlannedWorkoutUpdate::default()),
            Err(StoreError::EmptyUpdate)
        ));
        assert!(matches!(
            db.update_planned_workout(
                created.id + 100,
                &PlannedWorkoutUpdate {
                    notes: Some("x".to_string()),
                    ..Default::default()
                }
            ),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_mark_completed() {
        let db = Database::open_in_memory().unwrap();
        let created = plan(&db, "2024-01-03", "Legs");
        db.mark_workout_completed(created.id).unwrap();
        assert!(db.get_planned_workout(created.id).unwrap().unwrap().is_completed);
        assert!(matches!(
            db.mark_workout_completed(created.id + 1),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete() {
        let db = Database::open_in_memory().unwrap();
        let created = plan(&db, "2024-01-03", "Legs");
        db.delete_planned_workout(created.id).unwrap();
        assert!(db.get_planned_workout(created.id).unwrap().is_none());
        assert!(matches!(
            db.delete_planned_workout(created.id),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_clear_month_only_touches_month() {
        let db = Database::open_in_memory().unwrap();
        plan(&db, "2023-12-31", "Rest");
        plan(&db, "2024-01-01", "Push");
        plan(&db, "2024-01-31", "Pull");
        plan(&db, "2024-02-01", "Legs");

        let (start, end) = month_bounds(2024, 1).unwrap();
        assert_eq!(db.clear_planned_workouts(start, end).unwrap(), 2);

        let remaining: Vec<_> = db
            .get_planned_workouts(None)
            .unwrap()
            .into_iter()
            .map(|p| p.date)
            .collect();
        assert_eq!(remaining, vec![date("2023-12-31"), date("2024-02-01")]);
    }

    #[test]
    fn test_month_bounds() {
        assert_eq!(
            month_bounds(2024, 2),
            Some((date("2024-02-01"), date("2024-02-29")))
        );
        assert_eq!(
            month_bounds(2023, 12),
            Some((date("2023-12-01"), date("2023-12-31")))
        );
        assert_eq!(month_bounds(2024, 13), None);
        assert_eq!(month_bounds(2024, 0), None);
    }

    #[test]
    fn test_serializes_api_shape() {
        let db = Database::open_in_memory().unwrap();
        let created = plan(&db, "2024-01-03", "Legs");
        let json = serde_json::to_value(&created).unwrap();
        assert_eq!(json["date"], "2024-01-03");
        assert_eq!(json["split_name"], "Legs");
        assert_eq!(json["notes"], serde_json::Value::Null);
        assert_eq!(json["is_completed"], false);
    }
}
