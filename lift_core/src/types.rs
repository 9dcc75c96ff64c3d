//! Core domain types for the training progress system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Exercise sets, sessions and the per-exercise log
//! - Personal records and per-exercise record sets
//! - Training schedules and completed-workout history
//! - The two cached per-user documents (program, progress record)

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

// ============================================================================
// Exercise Log Types
// ============================================================================

/// A single set performed within an exercise session
///
/// Fields default when missing so that partially-shaped data from the
/// persistence boundary decodes to a non-qualifying set instead of failing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSet {
    #[serde(default)]
    pub weight_kg: f64,
    #[serde(default)]
    pub reps: u32,
    #[serde(default)]
    pub is_completed: bool,
}

impl ExerciseSet {
    /// Whether this set counts toward any record or volume computation
    pub fn qualifies(&self) -> bool {
        self.is_completed && self.weight_kg.is_finite() && self.weight_kg > 0.0 && self.reps > 0
    }
}

/// One day's work on a single exercise
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSession {
    #[serde(deserialize_with = "crate::decode::lenient_date", default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub sets: Vec<ExerciseSet>,
}

/// Append-only history per exercise, keyed by exercise id
///
/// Storage does not guarantee session order; consumers must sort by date
/// before folding.
pub type ExerciseLog = HashMap<String, Vec<ExerciseSession>>;

// ============================================================================
// Personal Record Types
// ============================================================================

/// The metric a personal record is measured in
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Weight,
    Reps,
    Volume,
    OneRepMax,
}

/// A best-ever observed value for one metric on one exercise
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersonalRecord {
    pub kind: RecordKind,
    pub value: f64,
    pub achieved_on: NaiveDate,
    pub previous_value: Option<f64>,
    pub contributing_sets: Vec<ExerciseSet>,
}

/// The running record set for a single exercise
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExercisePrSet {
    pub max_weight: Option<PersonalRecord>,
    pub max_reps: Option<PersonalRecord>,
    pub max_volume: Option<PersonalRecord>,
    pub estimated_1rm: Option<PersonalRecord>,
    pub last_session: Option<ExerciseSession>,
}

/// Metric selector for trend analysis
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrendMetric {
    Weight,
    Volume,
    OneRepMax,
}

/// Direction of recent change in a session-level metric
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

// ============================================================================
// Schedule and Workout History Types
// ============================================================================

/// The weekdays that count as training days for streak purposes
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrainingSchedule {
    days: HashSet<Weekday>,
}

impl TrainingSchedule {
    /// Build a schedule from weekday names, dropping names that don't parse
    ///
    /// Accepts full names ("monday") and chrono's short forms ("mon"),
    /// case-insensitively.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let days = names
            .iter()
            .filter_map(|n| match crate::streak::parse_weekday(n.as_ref()) {
                Some(day) => Some(day),
                None => {
                    tracing::warn!("Ignoring unrecognized weekday name {:?}", n.as_ref());
                    None
                }
            })
            .collect();
        Self { days }
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.days.contains(&day)
    }
}

/// A workout appended to the history when a session finishes
///
/// Entries arrive from the persistence boundary and may be partial; the
/// streak walk ignores entries missing either the date or the name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletedWorkout {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(deserialize_with = "crate::decode::lenient_date", default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub workout_name: Option<String>,
    #[serde(default)]
    pub total_volume_kg: Option<f64>,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
}

// ============================================================================
// Cached Document Types
// ============================================================================

/// One prescribed training day inside a generated program
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProgramDay {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub exercise_ids: Vec<String>,
}

/// The per-user generated training program document
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GeneratedProgram {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub days: Vec<ProgramDay>,
}

/// The per-user progress record document: exercise log plus workout history
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(default)]
    pub exercise_log: ExerciseLog,
    #[serde(default)]
    pub completed_workouts: Vec<CompletedWorkout>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_qualification() {
        let good = ExerciseSet {
            weight_kg: 100.0,
            reps: 5,
            is_completed: true,
        };
        assert!(good.qualifies());

        let incomplete = ExerciseSet {
            is_completed: false,
            ..good.clone()
        };
        assert!(!incomplete.qualifies());

        let zero_weight = ExerciseSet {
            weight_kg: 0.0,
            ..good.clone()
        };
        assert!(!zero_weight.qualifies());

        let zero_reps = ExerciseSet { reps: 0, ..good };
        assert!(!zero_reps.qualifies());
    }

    #[test]
    fn test_nan_weight_never_qualifies() {
        let set = ExerciseSet {
            weight_kg: f64::NAN,
            reps: 5,
            is_completed: true,
        };
        assert!(!set.qualifies());
    }

    #[test]
    fn test_schedule_from_names_drops_unknown() {
        let schedule =
            TrainingSchedule::from_names(&["monday", "WEDNESDAY", "fri", "someday"]);
        assert!(schedule.contains(Weekday::Mon));
        assert!(schedule.contains(Weekday::Wed));
        assert!(schedule.contains(Weekday::Fri));
        assert!(!schedule.contains(Weekday::Tue));
    }

    #[test]
    fn test_partial_set_decodes_to_non_qualifying() {
        let set: ExerciseSet = serde_json::from_str(r#"{"reps": 5}"#).unwrap();
        assert!(!set.qualifies());
        assert_eq!(set.weight_kg, 0.0);
    }

    #[test]
    fn test_completed_workout_without_fields_decodes() {
        let workout: CompletedWorkout = serde_json::from_str("{}").unwrap();
        assert!(workout.date.is_none());
        assert!(workout.workout_name.is_none());
    }
}
