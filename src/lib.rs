//! gymplan - Personal workout planner
//!
//! Push/pull/legs calendar with deload-aware auto-scheduling, an exercise
//! catalog and a workout log with personal records

pub mod db;
pub mod planning;
pub mod splits;

pub use db::Database;
pub use planning::generate_auto_schedule;
