//! gymplan - Personal workout planner

use std::collections::BTreeSet;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;

use gymplan::db::{
    Database, Exercise, ExerciseSets, ExerciseUpdate, LoggedSet, NewExercise, NewPlannedWorkout,
    NewWorkout, PlannedWorkout, PlannedWorkoutUpdate, ProgressMetric, ScheduleUpdate, StoreError,
    WorkoutSchedule, WorkoutWithSets, month_bounds, parse_date,
};
use gymplan::planning::{self, PlannedDay, weeks_since_deload};

#[derive(Parser)]
#[command(name = "gymplan")]
#[command(author, version, about = "Personal workout planner")]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "GYMPLAN_DB", default_value = "gymplan.db", global = true)]
    db: String,

    /// Schedule owner
    #[arg(long, env = "GYMPLAN_USER", default_value_t = gymplan::db::DEFAULT_USER_ID, global = true)]
    user: i64,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill the calendar from a start date
    Auto {
        /// First day, YYYY-MM-DD
        #[arg(value_parser = parse_date_arg)]
        start: NaiveDate,

        /// Number of weeks to plan
        #[arg(short, long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
        weeks: u32,
    },

    /// Show what auto-scheduling would plan, without writing
    Preview {
        #[arg(value_parser = parse_date_arg)]
        start: NaiveDate,

        #[arg(short, long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
        weeks: u32,
    },

    /// Show or change the workout schedule
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },

    /// List workout splits
    Splits,

    /// Plan a single date
    Plan {
        #[arg(value_parser = parse_date_arg)]
        date: NaiveDate,

        /// Split name (Push, Pull, Legs, Rest)
        split: String,

        #[arg(short, long)]
        notes: Option<String>,
    },

    /// List planned workouts
    List {
        #[arg(long, value_parser = parse_date_arg, requires = "to", conflicts_with = "month")]
        from: Option<NaiveDate>,

        #[arg(long, value_parser = parse_date_arg, requires = "from")]
        to: Option<NaiveDate>,

        /// Calendar month, YYYY-MM
        #[arg(long, value_parser = parse_month_arg)]
        month: Option<(i32, u32)>,
    },

    /// Show the planned workout for a date
    Show {
        #[arg(value_parser = parse_date_arg)]
        date: NaiveDate,
    },

    /// Today's split, recommended exercises and the next suggestion
    Today {
        /// Another day than today, YYYY-MM-DD
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,

        /// Train this split instead of the planned one
        #[arg(long)]
        split: Option<String>,
    },

    /// Mark a planned workout as completed
    Complete { id: i64 },

    /// Delete a planned workout
    Delete { id: i64 },

    /// Change date, split or notes of a planned workout
    Move {
        id: i64,

        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,

        #[arg(long)]
        split: Option<String>,

        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Delete every planned workout in a month
    ClearMonth {
        /// YYYY-MM
        #[arg(value_parser = parse_month_arg)]
        month: (i32, u32),
    },

    /// Manage the exercise catalog
    Exercise {
        #[command(subcommand)]
        action: ExerciseAction,
    },

    /// Log a workout with its sets
    Log {
        /// Workout day, defaults to today
        #[arg(value_parser = parse_date_arg)]
        date: Option<NaiveDate>,

        /// One set as EXERCISE:WEIGHTxREPS (e.g. "Squat:100x5"), repeatable
        #[arg(short, long = "set", value_parser = parse_set_arg)]
        sets: Vec<SetArg>,

        /// Split to record on the calendar, guessed from exercises if omitted
        #[arg(long)]
        split: Option<String>,

        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Browse and change logged workouts
    Workouts {
        #[command(subcommand)]
        action: WorkoutAction,
    },

    /// Mark every logged workout date as completed on the calendar
    Sync,

    /// Personal records per exercise
    Records,

    /// Progress of one exercise over time
    Progress {
        exercise: String,

        #[arg(short, long, value_enum, default_value_t = MetricArg::MaxWeight)]
        metric: MetricArg,
    },
}

#[derive(Subcommand)]
enum ExerciseAction {
    /// Add an exercise
    Add {
        name: String,

        /// Muscle group (e.g. Chest, Back, Legs)
        #[arg(short, long)]
        category: Option<String>,
    },

    /// List exercises, optionally only those of a split
    List {
        #[arg(long)]
        split: Option<String>,
    },

    /// Find exercises by part of their name
    Search { query: String },

    /// Rename or recategorize an exercise
    Edit {
        id: i64,

        #[arg(long)]
        name: Option<String>,

        #[arg(short, long)]
        category: Option<String>,
    },

    /// Delete an exercise and its logged sets
    Delete { id: i64 },

    /// Recommend an exercise on a split's days
    Assign { exercise: String, split: String },

    /// Stop recommending an exercise on a split's days
    Unassign { exercise: String, split: String },
}

#[derive(Subcommand)]
enum WorkoutAction {
    /// Recent workouts
    List {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Workout with all its sets
    Show { id: i64 },

    /// Replace date, notes or sets of a workout
    Edit {
        id: i64,

        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,

        /// Replaces every set when given
        #[arg(short, long = "set", value_parser = parse_set_arg)]
        sets: Vec<SetArg>,

        #[arg(long)]
        split: Option<String>,

        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Delete a workout, the calendar is left as is
    Delete { id: i64 },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MetricArg {
    /// Heaviest set per day
    MaxWeight,
    /// Sum of weight x reps per day
    TotalVolume,
}

impl From<MetricArg> for ProgressMetric {
    fn from(metric: MetricArg) -> Self {
        match metric {
            MetricArg::MaxWeight => ProgressMetric::MaxWeight,
            MetricArg::TotalVolume => ProgressMetric::TotalVolume,
        }
    }
}

#[derive(Clone, Debug)]
struct SetArg {
    exercise: String,
    weight: f64,
    reps: u32,
}

#[derive(Subcommand)]
enum ScheduleAction {
    /// Print the current schedule
    Show,

    /// Create or update the schedule
    Set {
        /// Preferred weekdays, 0 = Sunday (e.g. 1,2,3,4,5)
        #[arg(long, value_delimiter = ',', value_parser = parse_weekday_arg)]
        preferred: Option<Vec<u32>>,

        /// Rest weekdays, 0 = Sunday (e.g. 0,6)
        #[arg(long, value_delimiter = ',', value_parser = parse_weekday_arg)]
        rest: Option<Vec<u32>>,

        /// Weeks between deloads
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        deload_every: Option<u32>,

        /// Date of the most recent deload, YYYY-MM-DD
        #[arg(long, value_parser = parse_date_arg)]
        last_deload: Option<NaiveDate>,

        /// Forget the most recent deload
        #[arg(long, conflicts_with = "last_deload")]
        clear_last_deload: bool,
    },
}

fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

fn parse_month_arg(s: &str) -> Result<(i32, u32), String> {
    let (year, month) = s
        .split_once('-')
        .ok_or_else(|| "expected YYYY-MM".to_string())?;
    let year: i32 = year.parse().map_err(|_| format!("invalid year: {}", year))?;
    let month: u32 = month.parse().map_err(|_| format!("invalid month: {}", month))?;
    month_bounds(year, month).ok_or_else(|| format!("invalid month: {}", s))?;
    Ok((year, month))
}

fn parse_weekday_arg(s: &str) -> Result<u32, String> {
    match s.trim().parse::<u32>() {
        Ok(day) if day <= 6 => Ok(day),
        _ => Err(format!("weekday must be 0-6 (0 = Sunday), got {}", s)),
    }
}

fn parse_set_arg(s: &str) -> Result<SetArg, String> {
    let usage = || format!("expected EXERCISE:WEIGHTxREPS, got {}", s);
    let (exercise, load) = s.rsplit_once(':').ok_or_else(usage)?;
    let load = load.to_lowercase();
    let (weight, reps) = load.split_once('x').ok_or_else(usage)?;

    let exercise = exercise.trim();
    let weight: f64 = weight.trim().parse().map_err(|_| usage())?;
    let reps: u32 = reps.trim().parse().map_err(|_| usage())?;
    if exercise.is_empty() || !weight.is_finite() || weight < 0.0 || reps == 0 {
        return Err(usage());
    }
    Ok(SetArg {
        exercise: exercise.to_string(),
        weight,
        reps,
    })
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // stdout is reserved for command output
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let db = Database::open(&cli.db).with_context(|| format!("Failed to open {}", cli.db))?;

    match cli.command {
        Commands::Auto { start, weeks } => {
            let created = planning::generate_auto_schedule(&db, cli.user, start, weeks)?;
            if cli.json {
                print_json(&created)?;
            } else {
                println!("Planned {} workouts from {} ({} weeks)", created.len(), start, weeks);
                print_planned(&created);
            }
        }

        Commands::Preview { start, weeks } => {
            let schedule = db
                .get_workout_schedule(cli.user)?
                .ok_or_else(|| anyhow!("No workout schedule found for user {}", cli.user))?;
            let splits = db.get_all_splits()?;
            let days = planning::plan_days(&schedule, &splits, start, weeks);
            if cli.json {
                print_json(&days)?;
            } else {
                print_preview(&days);
            }
        }

        Commands::Schedule { action } => match action {
            ScheduleAction::Show => match db.get_workout_schedule(cli.user)? {
                Some(schedule) if cli.json => print_json(&schedule)?,
                Some(schedule) => print_schedule(&schedule),
                None => println!("No schedule yet. Create one with `gymplan schedule set`."),
            },
            ScheduleAction::Set {
                preferred,
                rest,
                deload_every,
                last_deload,
                clear_last_deload,
            } => {
                let update = ScheduleUpdate {
                    preferred_days: preferred.map(|d| d.into_iter().collect::<BTreeSet<_>>()),
                    rest_days: rest.map(|d| d.into_iter().collect::<BTreeSet<_>>()),
                    deload_frequency: deload_every,
                    last_deload_date: if clear_last_deload {
                        Some(None)
                    } else {
                        last_deload.map(Some)
                    },
                };
                let schedule = db.save_workout_schedule(cli.user, &update)?;
                if cli.json {
                    print_json(&schedule)?;
                } else {
                    print_schedule(&schedule);
                }
            }
        },

        Commands::Splits => {
            let splits = db.get_all_splits()?;
            if cli.json {
                print_json(&splits)?;
            } else {
                for s in &splits {
                    println!("{:>3} | {:6} | {}", s.id, s.name, s.description.as_deref().unwrap_or("-"));
                }
            }
        }

        Commands::Plan { date, split, notes } => {
            let split_id = resolve_split(&db, &split)?;
            let planned = db
                .create_planned_workout(&NewPlannedWorkout { date, split_id, notes })
                .map_err(|e| match e {
                    StoreError::Conflict { date } => anyhow!("Workout already planned for {}", date),
                    other => other.into(),
                })?;
            info!("Planned {} for {}", planned.split_name, planned.date);
            output_one(&planned, cli.json)?;
        }

        Commands::List { from, to, month } => {
            let range = match (from, to, month) {
                (Some(from), Some(to), _) => Some((from, to)),
                (_, _, Some((year, month))) => month_bounds(year, month),
                _ => None,
            };
            let planned = db.get_planned_workouts(range)?;
            if cli.json {
                print_json(&planned)?;
            } else if planned.is_empty() {
                println!("No planned workouts");
            } else {
                print_planned(&planned);
            }
        }

        Commands::Show { date } => match db.get_planned_workout_by_date(date)? {
            Some(planned) => output_one(&planned, cli.json)?,
            None => bail!("No planned workout found for {}", date),
        },

        Commands::Today { date, split } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let plan = planning::workout_plan(&db, date, split.as_deref(), &mut rand::thread_rng())?;

            if cli.json {
                print_json(&plan)?;
            } else {
                println!(
                    "{}: {} [{:?}]",
                    date.format("%A %Y-%m-%d"),
                    plan.split_name,
                    plan.source
                );
                if let Some(notes) = plan.planned.as_ref().and_then(|p| p.notes.as_deref()) {
                    println!("Notes: {}", notes);
                }
                if plan.is_rest_day {
                    println!("Rest day, no exercises");
                } else if plan.recommended_exercises.is_empty() {
                    println!("No exercises assigned to {} yet", plan.split_name);
                } else {
                    println!("{:-<40}", "");
                    for e in &plan.recommended_exercises {
                        println!("  {:24} {}", e.name, e.category.as_deref().unwrap_or("-"));
                    }
                }
                println!("Next up: {}", plan.next_split);
            }
        }

        Commands::Complete { id } => {
            db.mark_workout_completed(id)?;
            println!("Marked planned workout {} as completed", id);
        }

        Commands::Delete { id } => {
            db.delete_planned_workout(id)?;
            println!("Deleted planned workout {}", id);
        }

        Commands::Move { id, date, split, notes } => {
            let split_id = split.as_deref().map(|s| resolve_split(&db, s)).transpose()?;
            let update = PlannedWorkoutUpdate { date, split_id, notes };
            let planned = db.update_planned_workout(id, &update)?;
            output_one(&planned, cli.json)?;
        }

        Commands::ClearMonth { month: (year, month) } => {
            let (start, end) = month_bounds(year, month)
                .ok_or_else(|| anyhow!("invalid month {}-{}", year, month))?;
            let deleted = db.clear_planned_workouts(start, end)?;
            println!("Cleared {} planned workouts in {}", deleted, start.format("%B %Y"));
        }

        Commands::Exercise { action } => match action {
            ExerciseAction::Add { name, category } => {
                let exercise = db.create_exercise(&NewExercise { name, category })?;
                if cli.json {
                    print_json(&exercise)?;
                } else {
                    println!("Added: {} (id: {})", exercise.name, exercise.id);
                }
            }
            ExerciseAction::List { split } => {
                let exercises = match split {
                    Some(name) => db.get_exercises_by_split(resolve_split(&db, &name)?)?,
                    None => db.get_all_exercises()?,
                };
                output_exercises(&exercises, cli.json)?;
            }
            ExerciseAction::Search { query } => {
                output_exercises(&db.search_exercises(&query)?, cli.json)?;
            }
            ExerciseAction::Edit { id, name, category } => {
                let exercise = db.update_exercise(id, &ExerciseUpdate { name, category })?;
                output_exercises(std::slice::from_ref(&exercise), cli.json)?;
            }
            ExerciseAction::Delete { id } => {
                db.delete_exercise(id)?;
                println!("Deleted exercise {}", id);
            }
            ExerciseAction::Assign { exercise, split } => {
                let exercise = resolve_exercise(&db, &exercise)?;
                db.assign_exercise_to_split(exercise.id, resolve_split(&db, &split)?)?;
                println!("{} added to {} days", exercise.name, split);
            }
            ExerciseAction::Unassign { exercise, split } => {
                let exercise = resolve_exercise(&db, &exercise)?;
                if db.remove_exercise_from_split(exercise.id, resolve_split(&db, &split)?)? {
                    println!("{} removed from {} days", exercise.name, split);
                } else {
                    println!("{} was not assigned to {}", exercise.name, split);
                }
            }
        },

        Commands::Log {
            date,
            sets,
            split,
            notes,
        } => {
            let new = NewWorkout {
                date: date.unwrap_or_else(|| Local::now().date_naive()),
                notes,
                split,
                exercises: group_sets(&db, &sets)?,
            };
            let workout = db.create_workout(&new)?;
            if cli.json {
                print_json(&workout)?;
            } else {
                let total: usize = workout.exercises.iter().map(|e| e.sets.len()).sum();
                println!(
                    "Logged: {} - {} exercises, {} sets (id: {})",
                    workout.workout.date,
                    workout.exercises.len(),
                    total,
                    workout.workout.id
                );
            }
        }

        Commands::Workouts { action } => match action {
            WorkoutAction::List { limit } => {
                let workouts = db.get_workouts(None)?;
                let recent: Vec<_> = workouts.into_iter().take(limit).collect();
                if cli.json {
                    print_json(&recent)?;
                } else {
                    println!("Recent workouts:");
                    println!("{:-<60}", "");
                    for w in &recent {
                        println!(
                            "{:>4} | {} {} | {}",
                            w.id,
                            w.date,
                            w.date.format("%a"),
                            w.notes.as_deref().unwrap_or("-")
                        );
                    }
                }
            }
            WorkoutAction::Show { id } => {
                let workout = db
                    .get_workout(id)?
                    .ok_or(StoreError::WorkoutNotFound { id })?;
                output_workout(&workout, cli.json)?;
            }
            WorkoutAction::Edit {
                id,
                date,
                sets,
                split,
                notes,
            } => {
                let current = db
                    .get_workout(id)?
                    .ok_or(StoreError::WorkoutNotFound { id })?;
                let exercises = if sets.is_empty() {
                    current
                        .exercises
                        .iter()
                        .map(|e| ExerciseSets {
                            exercise_id: e.exercise_id,
                            sets: e
                                .sets
                                .iter()
                                .map(|s| LoggedSet {
                                    weight: s.weight,
                                    reps: s.reps,
                                })
                                .collect(),
                        })
                        .collect()
                } else {
                    group_sets(&db, &sets)?
                };
                let new = NewWorkout {
                    date: date.unwrap_or(current.workout.date),
                    notes: notes.or(current.workout.notes),
                    split: split.or(current.split_name),
                    exercises,
                };
                let workout = db.update_workout(id, &new)?;
                output_workout(&workout, cli.json)?;
            }
            WorkoutAction::Delete { id } => {
                db.delete_workout(id)?;
                println!("Deleted workout {}", id);
            }
        },

        Commands::Sync => {
            let synced = db.sync_workouts_with_planned()?;
            println!("Marked {} workout dates as completed", synced);
        }

        Commands::Records => {
            let records = db.get_personal_records()?;
            if cli.json {
                print_json(&records)?;
            } else {
                println!("Personal records");
                println!("{:-<72}", "");
                for r in &records {
                    let weight = r.max_weight.map_or("-".to_string(), |w| format!("{:.1}", w));
                    let reps = r.max_reps.map_or("-".to_string(), |n| n.to_string());
                    let volume = r.max_volume.map_or("-".to_string(), |v| format!("{:.1}", v));
                    let last = r.last_performed.map_or("never".to_string(), |d| d.to_string());
                    println!(
                        "{:24} | {:>7} kg | {:>4} reps | {:>8} vol | {}",
                        r.name, weight, reps, volume, last
                    );
                }
            }
        }

        Commands::Progress { exercise, metric } => {
            let exercise = resolve_exercise(&db, &exercise)?;
            let points = db.get_progress_data(exercise.id, metric.into())?;
            if cli.json {
                print_json(&points)?;
            } else {
                println!("{} ({:?})", exercise.name, metric);
                println!("{:-<40}", "");
                for p in &points {
                    println!("{} | {:>8.1}", p.date, p.value);
                }
            }
        }
    }

    Ok(())
}

fn resolve_split(db: &Database, name: &str) -> Result<i64> {
    let split = db
        .get_split_by_name(name)?
        .ok_or_else(|| StoreError::UnknownSplit(name.to_string()))?;
    Ok(split.id)
}

fn resolve_exercise(db: &Database, name: &str) -> Result<Exercise> {
    db.get_exercise_by_name(name)?
        .ok_or_else(|| anyhow!("Unknown exercise: {} (add it with `gymplan exercise add`)", name))
}

/// Consecutive sets of the same exercise form one entry
fn group_sets(db: &Database, sets: &[SetArg]) -> Result<Vec<ExerciseSets>> {
    let mut grouped: Vec<(String, ExerciseSets)> = Vec::new();
    for set in sets {
        let logged = LoggedSet {
            weight: set.weight,
            reps: set.reps,
        };
        match grouped.last_mut() {
            Some((name, entry)) if *name == set.exercise => entry.sets.push(logged),
            _ => {
                let exercise = resolve_exercise(db, &set.exercise)?;
                grouped.push((
                    set.exercise.clone(),
                    ExerciseSets {
                        exercise_id: exercise.id,
                        sets: vec![logged],
                    },
                ));
            }
        }
    }
    Ok(grouped.into_iter().map(|(_, entry)| entry).collect())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn output_one(planned: &PlannedWorkout, json: bool) -> Result<()> {
    if json {
        print_json(planned)
    } else {
        print_planned(std::slice::from_ref(planned));
        Ok(())
    }
}

fn output_exercises(exercises: &[Exercise], json: bool) -> Result<()> {
    if json {
        return print_json(&exercises);
    }
    if exercises.is_empty() {
        println!("No exercises");
    }
    for e in exercises {
        println!("{:>4} | {:24} | {}", e.id, e.name, e.category.as_deref().unwrap_or("-"));
    }
    Ok(())
}

fn output_workout(workout: &WorkoutWithSets, json: bool) -> Result<()> {
    if json {
        return print_json(workout);
    }
    println!(
        "Workout {} on {} ({})",
        workout.workout.id,
        workout.workout.date,
        workout.split_name.as_deref().unwrap_or("no split")
    );
    if let Some(notes) = &workout.workout.notes {
        println!("Notes: {}", notes);
    }
    println!("{:-<60}", "");
    for e in &workout.exercises {
        let sets: Vec<String> = e
            .sets
            .iter()
            .map(|s| format!("{}x{}", s.weight, s.reps))
            .collect();
        println!("{:24} | {}", e.name, sets.join(", "));
    }
    Ok(())
}

fn print_planned(planned: &[PlannedWorkout]) {
    println!("{:-<72}", "");
    for p in planned {
        println!(
            "{:>4} | {} {} | {:5} | {} | {}",
            p.id,
            p.date,
            p.date.format("%a"),
            p.split_name,
            if p.is_completed { "done" } else { "    " },
            p.notes.as_deref().unwrap_or("-")
        );
    }
}

fn print_preview(days: &[PlannedDay]) {
    println!("{:-<60}", "");
    for d in days {
        println!(
            "{} {} | {:5} | {}",
            d.date,
            d.date.format("%a"),
            d.split_name,
            d.notes.as_deref().unwrap_or("-")
        );
    }
}

fn print_schedule(schedule: &WorkoutSchedule) {
    let names = |days: &BTreeSet<u32>| -> String {
        const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
        days.iter()
            .filter_map(|d| WEEKDAYS.get(*d as usize))
            .copied()
            .collect::<Vec<_>>()
            .join(", ")
    };

    println!("Workout schedule (user {})", schedule.user_id);
    println!("{:-<40}", "");
    println!("Preferred days: {}", names(&schedule.preferred_days));
    println!("Rest days:      {}", names(&schedule.rest_days));
    println!("Deload every:   {} weeks", schedule.deload_frequency);
    match schedule.last_deload_date {
        Some(last) => {
            let today = Local::now().date_naive();
            let weeks = weeks_since_deload(today, schedule).unwrap_or(0);
            println!("Last deload:    {} ({} weeks ago)", last, weeks);
        }
        None => println!("Last deload:    never"),
    }
}
