//! Daily plan - the split for a date and a shuffled pick of its exercises

use chrono::{Datelike, NaiveDate};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::db::{Database, Exercise, PlannedWorkout, StoreError};
use crate::splits::{REST, default_split_for_weekday, next_split_after};

/// Recommended exercises shown per day
pub const MAX_RECOMMENDED: usize = 9;

/// Where the day's split came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Selected,
    Planned,
    Default,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkoutPlan {
    pub date: NaiveDate,
    pub split_name: String,
    pub source: PlanSource,
    pub planned: Option<PlannedWorkout>,
    pub is_rest_day: bool,
    pub next_split: &'static str,
    pub recommended_exercises: Vec<Exercise>,
}

/// Plan for `date`: an explicit split wins, then the calendar, then the weekday default
pub fn workout_plan<R: Rng + ?Sized>(
    db: &Database,
    date: NaiveDate,
    selected: Option<&str>,
    rng: &mut R,
) -> Result<WorkoutPlan, StoreError> {
    let planned = db.get_planned_workout_by_date(date)?;

    let (split_name, source) = match (selected, &planned) {
        (Some(name), _) => (name.to_string(), PlanSource::Selected),
        (None, Some(p)) => (p.split_name.clone(), PlanSource::Planned),
        (None, None) => (
            default_split_for_weekday(date.weekday().num_days_from_sunday()).to_string(),
            PlanSource::Default,
        ),
    };
    let split = db
        .get_split_by_name(&split_name)?
        .ok_or_else(|| StoreError::UnknownSplit(split_name.clone()))?;

    let is_rest_day = split.name == REST;
    let mut recommended_exercises = Vec::new();
    if !is_rest_day {
        recommended_exercises = db.get_exercises_by_split(split.id)?;
        recommended_exercises.shuffle(rng);
        recommended_exercises.truncate(MAX_RECOMMENDED);
    }

    Ok(WorkoutPlan {
        date,
        next_split: next_split_after(&split.name),
        split_name: split.name,
        source,
        planned,
        is_rest_day,
        recommended_exercises,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewExercise, NewPlannedWorkout, parse_date};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn assign(db: &Database, name: &str, split: &str) {
        let exercise = db
            .create_exercise(&NewExercise {
                name: name.to_string(),
                category: None,
            })
            .unwrap();
        let split_id = db.get_split_by_name(split).unwrap().unwrap().id;
        db.assign_exercise_to_split(exercise.id, split_id).unwrap();
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_weekday_default_without_calendar() {
        let db = Database::open_in_memory().unwrap();
        assign(&db, "Deadlift", "Pull");

        // 2024-01-01 is a Monday
        let plan = workout_plan(&db, date("2024-01-01"), None, &mut rng()).unwrap();
        assert_eq!(plan.split_name, "Pull");
        assert_eq!(plan.source, PlanSource::Default);
        assert_eq!(plan.next_split, "Legs");
        assert_eq!(plan.recommended_exercises.len(), 1);
    }

    #[test]
    fn test_calendar_entry_wins_over_default() {
        let db = Database::open_in_memory().unwrap();
        let legs = db.get_split_by_name("Legs").unwrap().unwrap().id;
        db.create_planned_workout(&NewPlannedWorkout {
            date: date("2024-01-01"),
            split_id: legs,
            notes: None,
        })
        .unwrap();

        let plan = workout_plan(&db, date("2024-01-01"), None, &mut rng()).unwrap();
        assert_eq!(plan.split_name, "Legs");
        assert_eq!(plan.source, PlanSource::Planned);
        assert!(plan.planned.is_some());

        let chosen = workout_plan(&db, date("2024-01-01"), Some("Push"), &mut rng()).unwrap();
        assert_eq!(chosen.split_name, "Push");
        assert_eq!(chosen.source, PlanSource::Selected);
    }

    #[test]
    fn test_recommendations_are_capped() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..12 {
            assign(&db, &format!("Press variation {}", i), "Push");
        }
        assign(&db, "Row", "Pull");

        let plan = workout_plan(&db, date("2024-01-02"), Some("Push"), &mut rng()).unwrap();
        assert_eq!(plan.recommended_exercises.len(), MAX_RECOMMENDED);
        assert!(plan.recommended_exercises.iter().all(|e| e.name.starts_with("Press")));
    }

    #[test]
    fn test_rest_day_recommends_nothing() {
        let db = Database::open_in_memory().unwrap();
        assign(&db, "Stretching", "Rest");

        // 2024-01-07 is a Sunday
        let plan = workout_plan(&db, date("2024-01-07"), None, &mut rng()).unwrap();
        assert!(plan.is_rest_day);
        assert!(plan.recommended_exercises.is_empty());
        assert_eq!(plan.next_split, "Push");
    }

    #[test]
    fn test_unknown_selected_split() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            workout_plan(&db, date("2024-01-01"), Some("Cardio"), &mut rng()),
            Err(StoreError::UnknownSplit(_))
        ));
    }
}
