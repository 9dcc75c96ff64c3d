use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use lift_core::*;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "liftlog")]
#[command(about = "Training progress tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a completed exercise session
    Log {
        /// Exercise id (e.g. bench_press)
        #[arg(long)]
        exercise: String,

        /// Weight per set in kilograms
        #[arg(long)]
        weight: f64,

        /// Reps per set
        #[arg(long)]
        reps: u32,

        /// Number of sets
        #[arg(long, default_value_t = 1)]
        sets: u32,

        /// Workout name for the history entry
        #[arg(long, default_value = "Workout")]
        name: String,

        /// Session date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },

    /// Show personal records
    Prs {
        /// Limit to one exercise
        #[arg(long)]
        exercise: Option<String>,
    },

    /// Show trend direction for an exercise
    Trend {
        #[arg(long)]
        exercise: String,

        /// Metric: weight, volume or 1rm
        #[arg(long, default_value = "weight")]
        metric: String,
    },

    /// Show the current adherence streak
    Streak {
        /// Comma-separated training days, overriding the config schedule
        #[arg(long)]
        days: Option<String>,
    },

    /// Export records and workout history to CSV
    Export {
        /// Output directory, defaults to the data directory
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show cache freshness for the progress documents
    Status,
}

fn main() -> Result<()> {
    // Initialize logging
    lift_core::logging::init();

    let cli = Cli::parse();

    // Determine data directory
    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());

    match cli.command {
        Commands::Log {
            exercise,
            weight,
            reps,
            sets,
            name,
            date,
        } => cmd_log(data_dir, exercise, weight, reps, sets, name, date),
        Commands::Prs { exercise } => cmd_prs(data_dir, exercise),
        Commands::Trend { exercise, metric } => cmd_trend(data_dir, exercise, &metric),
        Commands::Streak { days } => cmd_streak(data_dir, days, &config),
        Commands::Export { output } => cmd_export(data_dir, output),
        Commands::Status => cmd_status(data_dir, &config),
    }
}

fn parse_date_arg(date: Option<String>) -> Result<NaiveDate> {
    match date {
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map_err(|e| Error::Other(format!("Invalid date {:?}: {}", s, e))),
        None => Ok(Local::now().date_naive()),
    }
}

fn cmd_log(
    data_dir: PathBuf,
    exercise: String,
    weight: f64,
    reps: u32,
    sets: u32,
    name: String,
    date: Option<String>,
) -> Result<()> {
    std::fs::create_dir_all(&data_dir)?;
    let store = JsonFileStore::new(&data_dir);
    let date = parse_date_arg(date)?;

    let session_sets: Vec<ExerciseSet> = (0..sets)
        .map(|_| ExerciseSet {
            weight_kg: weight,
            reps,
            is_completed: true,
        })
        .collect();

    let mut record = store.fetch_progress_record()?;

    // Detect records against history before this session lands in it
    let prior = analyze_all(&record.exercise_log)
        .remove(&exercise)
        .unwrap_or_default();
    let new_records = detect_new_records(&exercise, date, &session_sets, &prior);

    let total_volume: f64 = session_sets
        .iter()
        .filter(|s| s.qualifies())
        .map(|s| s.weight_kg * s.reps as f64)
        .sum();

    record
        .exercise_log
        .entry(exercise.clone())
        .or_default()
        .push(ExerciseSession {
            date: Some(date),
            sets: session_sets,
        });
    record.completed_workouts.push(CompletedWorkout {
        id: Uuid::new_v4(),
        date: Some(date),
        workout_name: Some(name.clone()),
        total_volume_kg: Some(total_volume),
        duration_seconds: None,
    });
    store.update_progress_record(&record)?;

    println!(
        "Logged {}: {} set(s) of {} x {:.1}kg on {}",
        exercise, sets, reps, weight, date
    );
    for pr in &new_records {
        match pr.previous_value {
            Some(prev) => println!(
                "  New {} record: {:.1} (was {:.1})",
                kind_label(pr.kind),
                pr.value,
                prev
            ),
            None => println!("  First {} record: {:.1}", kind_label(pr.kind), pr.value),
        }
    }
    Ok(())
}

fn cmd_prs(data_dir: PathBuf, exercise: Option<String>) -> Result<()> {
    let store = JsonFileStore::new(&data_dir);
    let record = store.fetch_progress_record()?;
    let all = analyze_all(&record.exercise_log);

    let mut exercise_ids: Vec<&String> = all
        .keys()
        .filter(|id| exercise.as_ref().map_or(true, |e| e == *id))
        .collect();
    exercise_ids.sort();

    if exercise_ids.is_empty() {
        println!("No personal records yet.");
        return Ok(());
    }

    for id in exercise_ids {
        let prs = &all[id];
        println!("{}", id);
        print_record(&prs.max_weight);
        print_record(&prs.max_reps);
        print_record(&prs.max_volume);
        print_record(&prs.estimated_1rm);
        if let Some(last) = &prs.last_session {
            if let Some(date) = last.date {
                println!("  last session: {}", date);
            }
        }
    }
    Ok(())
}

fn print_record(record: &Option<PersonalRecord>) {
    if let Some(pr) = record {
        println!(
            "  {}: {:.1} ({})",
            kind_label(pr.kind),
            pr.value,
            pr.achieved_on
        );
    }
}

fn kind_label(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Weight => "weight",
        RecordKind::Reps => "reps",
        RecordKind::Volume => "volume",
        RecordKind::OneRepMax => "est. 1RM",
    }
}

fn cmd_trend(data_dir: PathBuf, exercise: String, metric: &str) -> Result<()> {
    let store = JsonFileStore::new(&data_dir);
    let record = store.fetch_progress_record()?;

    let metric = match metric.to_lowercase().as_str() {
        "weight" => TrendMetric::Weight,
        "volume" => TrendMetric::Volume,
        "1rm" | "one-rep-max" | "one_rep_max" => TrendMetric::OneRepMax,
        other => {
            eprintln!("Unknown metric: {}. Using weight.", other);
            TrendMetric::Weight
        }
    };

    let direction = trend(&exercise, &record.exercise_log, metric);
    let label = match direction {
        Trend::Up => "up",
        Trend::Down => "down",
        Trend::Stable => "stable",
    };
    println!("{} trend: {}", exercise, label);
    Ok(())
}

fn cmd_streak(data_dir: PathBuf, days: Option<String>, config: &Config) -> Result<()> {
    let store = JsonFileStore::new(&data_dir);
    let record = store.fetch_progress_record()?;

    let schedule = match days {
        Some(csv) => {
            let names: Vec<&str> = csv.split(',').collect();
            TrainingSchedule::from_names(&names)
        }
        None => config.training_schedule(),
    };

    let count = streak_now(&record.completed_workouts, &schedule);
    println!("Current streak: {} day(s)", count);
    Ok(())
}

fn cmd_export(data_dir: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let store = JsonFileStore::new(&data_dir);
    let record = store.fetch_progress_record()?;
    let out_dir = output.unwrap_or_else(|| data_dir.clone());
    std::fs::create_dir_all(&out_dir)?;

    let records = analyze_all(&record.exercise_log);
    let record_rows = csv_export::export_records(&records, &out_dir.join("records.csv"))?;
    let workout_rows =
        csv_export::export_workouts(&record.completed_workouts, &out_dir.join("workouts.csv"))?;

    println!(
        "Exported {} record row(s) and {} workout row(s) to {:?}",
        record_rows, workout_rows, out_dir
    );
    Ok(())
}

fn cmd_status(data_dir: PathBuf, config: &Config) -> Result<()> {
    let cache = ProgressCache::new(config.cache_policy());
    let updates = cache.subscribe();

    let program_store = JsonFileStore::new(&data_dir);
    let progress_store = JsonFileStore::new(&data_dir);
    let results = cache.refresh_all(vec![
        (
            CacheKey::GeneratedProgram,
            Box::new(move || {
                program_store
                    .fetch_generated_program()
                    .map(Document::Program)
            }),
        ),
        (
            CacheKey::ProgressRecord,
            Box::new(move || {
                progress_store
                    .fetch_progress_record()
                    .map(Document::Progress)
            }),
        ),
    ]);

    for (key, result) in &results {
        match result {
            Ok(outcome) => println!("{}: {:?}, fresh={}", key, outcome, cache.is_fresh(*key)),
            Err(e) => println!("{}: fetch failed ({})", key, e),
        }
    }

    if let Some(progress) = cache
        .read(CacheKey::ProgressRecord)
        .and_then(|doc| doc.as_progress().cloned())
    {
        println!(
            "  {} completed workout(s), {} exercise(s) tracked",
            progress.completed_workouts.len(),
            progress.exercise_log.len()
        );
    }
    if let Some(program) = cache
        .read(CacheKey::GeneratedProgram)
        .and_then(|doc| doc.as_program().cloned())
    {
        println!("  program {:?} with {} day(s)", program.name, program.days.len());
    }
    while let Ok(key) = updates.try_recv() {
        tracing::debug!("Cache updated: {}", key);
    }
    Ok(())
}
