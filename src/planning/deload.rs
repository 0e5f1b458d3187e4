//! Deload policy - decides whether a week is a recovery week

use chrono::NaiveDate;

use crate::db::WorkoutSchedule;

/// Whole 7-day buckets since the last deload, floored toward negative infinity
pub fn weeks_since_deload(reference: NaiveDate, schedule: &WorkoutSchedule) -> Option<i64> {
    let last = schedule.last_deload_date?;
    Some((reference - last).num_days().div_euclid(7))
}

/// True when the week starting at `reference` is due for a deload.
///
/// Never deloads until a first deload has been recorded, and a reference
/// date before the last deload never triggers one.
pub fn should_deload(reference: NaiveDate, schedule: &WorkoutSchedule) -> bool {
    match weeks_since_deload(reference, schedule) {
        Some(weeks) => weeks >= i64::from(schedule.deload_frequency),
        None => false,
    }
}
