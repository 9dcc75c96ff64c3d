//! CSV export of personal records and workout history.
//!
//! Derived data stays derived: these exports are snapshots for spreadsheets
//! and external analysis, not a persistence format the core reads back.

use crate::{CompletedWorkout, ExercisePrSet, PersonalRecord, Result};
use std::collections::HashMap;
use std::path::Path;

/// A personal-record row in the CSV output
#[derive(Debug, serde::Serialize)]
struct RecordRow {
    exercise_id: String,
    kind: String,
    value: f64,
    achieved_on: String,
    previous_value: Option<f64>,
}

impl RecordRow {
    fn new(exercise_id: &str, record: &PersonalRecord) -> Self {
        RecordRow {
            exercise_id: exercise_id.to_string(),
            kind: format!("{:?}", record.kind).to_lowercase(),
            value: record.value,
            achieved_on: record.achieved_on.to_string(),
            previous_value: record.previous_value,
        }
    }
}

/// A completed-workout row in the CSV output
#[derive(Debug, serde::Serialize)]
struct WorkoutRow {
    id: String,
    date: Option<String>,
    workout_name: Option<String>,
    total_volume_kg: Option<f64>,
    duration_seconds: Option<u32>,
}

impl From<&CompletedWorkout> for WorkoutRow {
    fn from(workout: &CompletedWorkout) -> Self {
        WorkoutRow {
            id: workout.id.to_string(),
            date: workout.date.map(|d| d.to_string()),
            workout_name: workout.workout_name.clone(),
            total_volume_kg: workout.total_volume_kg,
            duration_seconds: workout.duration_seconds,
        }
    }
}

/// Write the personal-record table to a CSV file
///
/// One row per present record, ordered by exercise id for stable diffs.
/// Returns the number of rows written.
pub fn export_records(
    records: &HashMap<String, ExercisePrSet>,
    path: &Path,
) -> Result<usize> {
    let mut exercise_ids: Vec<&String> = records.keys().collect();
    exercise_ids.sort();

    let mut writer = csv::Writer::from_path(path)?;
    let mut count = 0;
    for exercise_id in exercise_ids {
        let prs = &records[exercise_id];
        for record in [
            &prs.max_weight,
            &prs.max_reps,
            &prs.max_volume,
            &prs.estimated_1rm,
        ]
        .into_iter()
        .flatten()
        {
            writer.serialize(RecordRow::new(exercise_id, record))?;
            count += 1;
        }
    }
    writer.flush()?;

    tracing::info!("Exported {} record rows to {:?}", count, path);
    Ok(count)
}

/// Write the completed-workout history to a CSV file
pub fn export_workouts(workouts: &[CompletedWorkout], path: &Path) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)?;
    for workout in workouts {
        writer.serialize(WorkoutRow::from(workout))?;
    }
    writer.flush()?;

    tracing::info!("Exported {} workout rows to {:?}", workouts.len(), path);
    Ok(workouts.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{analyze_all, ExerciseLog, ExerciseSession, ExerciseSet};
    use chrono::NaiveDate;
    use uuid::Uuid;

    #[test]
    fn test_export_records() {
        let mut log = ExerciseLog::new();
        log.insert(
            "bench".into(),
            vec![ExerciseSession {
                date: NaiveDate::from_ymd_opt(2024, 1, 15),
                sets: vec![ExerciseSet {
                    weight_kg: 100.0,
                    reps: 5,
                    is_completed: true,
                }],
            }],
        );
        let records = analyze_all(&log);

        let temp_dir = tempfile::tempdir().unwrap();
        let out = temp_dir.path().join("records.csv");
        let count = export_records(&records, &out).unwrap();

        // All four metrics set by the single session
        assert_eq!(count, 4);
        let contents = std::fs::read_to_string(&out).unwrap();
        assert!(contents.contains("bench"));
        assert!(contents.contains("2024-01-15"));
    }

    #[test]
    fn test_export_workouts() {
        let workouts = vec![CompletedWorkout {
            id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15),
            workout_name: Some("Push A".into()),
            total_volume_kg: Some(4200.0),
            duration_seconds: Some(3600),
        }];

        let temp_dir = tempfile::tempdir().unwrap();
        let out = temp_dir.path().join("workouts.csv");
        assert_eq!(export_workouts(&workouts, &out).unwrap(), 1);

        let contents = std::fs::read_to_string(&out).unwrap();
        assert!(contents.contains("Push A"));
    }

    #[test]
    fn test_export_empty_records() {
        let temp_dir = tempfile::tempdir().unwrap();
        let out = temp_dir.path().join("records.csv");
        assert_eq!(export_records(&HashMap::new(), &out).unwrap(), 0);
    }
}
