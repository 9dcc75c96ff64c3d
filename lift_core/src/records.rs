//! Personal-record analysis over the exercise log.
//!
//! This module implements the record-detection logic:
//! - Full-history analysis producing per-exercise record sets
//! - Trend direction over the most recent sessions
//! - Incremental new-record detection seeded from a known record set
//!
//! All functions here are pure and total: malformed sessions decode to
//! non-qualifying sets upstream and are simply excluded, so one exercise's
//! bad data can never abort analysis of the others.

use crate::{
    ExerciseLog, ExercisePrSet, ExerciseSession, ExerciseSet, PersonalRecord, RecordKind, Trend,
    TrendMetric,
};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Relative band within which two session values are considered equal,
/// so small-increment noise doesn't register as a trend.
const TREND_BAND: f64 = 0.05;

/// How many recent qualifying sessions the trend window considers.
const TREND_WINDOW: usize = 3;

/// Epley estimate of one-repetition-maximum strength
///
/// A single rep is its own estimate; otherwise `weight * (1 + reps/30)`.
pub fn epley_1rm(weight_kg: f64, reps: u32) -> f64 {
    if reps <= 1 {
        weight_kg
    } else {
        weight_kg * (1.0 + reps as f64 / 30.0)
    }
}

/// Analyze the full exercise log into per-exercise record sets
///
/// Sessions are sorted by date ascending before folding; sessions without a
/// parseable date or without any qualifying set are skipped entirely (they
/// neither set records nor overwrite `last_session`).
pub fn analyze_all(log: &ExerciseLog) -> HashMap<String, ExercisePrSet> {
    let mut out = HashMap::with_capacity(log.len());

    for (exercise_id, sessions) in log {
        let mut dated: Vec<&ExerciseSession> =
            sessions.iter().filter(|s| s.date.is_some()).collect();
        // Stable sort keeps storage order for same-day sessions
        dated.sort_by_key(|s| s.date);

        let mut prs = ExercisePrSet::default();
        for session in dated {
            if let Some(date) = session.date {
                apply_session(&mut prs, date, &session.sets);
            }
        }

        tracing::debug!(
            "Analyzed {} sessions for exercise {}",
            sessions.len(),
            exercise_id
        );
        out.insert(exercise_id.clone(), prs);
    }

    out
}

/// Detect records set by a single new session, seeded from known records
///
/// Applies the same strict-greater comparison as [`analyze_all`] without
/// replaying history, so a "you just set a record" flag can be raised
/// immediately after one session completes.
pub fn detect_new_records(
    exercise_id: &str,
    date: NaiveDate,
    sets: &[ExerciseSet],
    prior: &ExercisePrSet,
) -> Vec<PersonalRecord> {
    let mut prs = prior.clone();
    let records = apply_session(&mut prs, date, sets);

    if !records.is_empty() {
        tracing::info!(
            "Exercise {} set {} new record(s) on {}",
            exercise_id,
            records.len(),
            date
        );
    }
    records
}

/// Trend direction for a metric over the most recent qualifying sessions
///
/// Fewer than two qualifying sessions yields `Stable`. The two most recent
/// session-level values are compared with a ±5% band.
pub fn trend(exercise_id: &str, log: &ExerciseLog, metric: TrendMetric) -> Trend {
    let Some(sessions) = log.get(exercise_id) else {
        return Trend::Stable;
    };

    let mut values: Vec<(NaiveDate, f64)> = sessions
        .iter()
        .filter_map(|s| Some((s.date?, session_metric(s, metric)?)))
        .collect();
    values.sort_by_key(|(date, _)| *date);

    let recent: Vec<f64> = values
        .iter()
        .rev()
        .take(TREND_WINDOW)
        .map(|(_, v)| *v)
        .collect();
    if recent.len() < 2 {
        return Trend::Stable;
    }

    let latest = recent[0];
    let previous = recent[1];
    if latest > previous * (1.0 + TREND_BAND) {
        Trend::Up
    } else if latest < previous * (1.0 - TREND_BAND) {
        Trend::Down
    } else {
        Trend::Stable
    }
}

/// Fold one session into a record set, returning the records it set
///
/// A session with no qualifying set is a no-op. Otherwise every metric is
/// compared strict-greater against the running maximum, and `last_session`
/// is overwritten whether or not any record was set.
fn apply_session(
    prs: &mut ExercisePrSet,
    date: NaiveDate,
    sets: &[ExerciseSet],
) -> Vec<PersonalRecord> {
    let completed: Vec<&ExerciseSet> = sets.iter().filter(|s| s.qualifies()).collect();
    if completed.is_empty() {
        return Vec::new();
    }

    let mut new_records = Vec::new();

    let best_weight = max_by(&completed, |s| s.weight_kg);
    maybe_update(
        &mut prs.max_weight,
        RecordKind::Weight,
        best_weight.weight_kg,
        date,
        vec![best_weight.clone()],
        &mut new_records,
    );

    let best_reps = max_by(&completed, |s| s.reps as f64);
    maybe_update(
        &mut prs.max_reps,
        RecordKind::Reps,
        best_reps.reps as f64,
        date,
        vec![best_reps.clone()],
        &mut new_records,
    );

    // Volume counts every qualifying set in the session, not just the best one
    let volume: f64 = completed.iter().map(|s| s.weight_kg * s.reps as f64).sum();
    maybe_update(
        &mut prs.max_volume,
        RecordKind::Volume,
        volume,
        date,
        completed.iter().map(|s| (*s).clone()).collect(),
        &mut new_records,
    );

    let best_estimate = max_by(&completed, |s| epley_1rm(s.weight_kg, s.reps));
    maybe_update(
        &mut prs.estimated_1rm,
        RecordKind::OneRepMax,
        epley_1rm(best_estimate.weight_kg, best_estimate.reps),
        date,
        vec![best_estimate.clone()],
        &mut new_records,
    );

    prs.last_session = Some(ExerciseSession {
        date: Some(date),
        sets: sets.to_vec(),
    });

    new_records
}

/// Session-level value of a trend metric, `None` if no set qualifies
fn session_metric(session: &ExerciseSession, metric: TrendMetric) -> Option<f64> {
    let completed: Vec<&ExerciseSet> = session.sets.iter().filter(|s| s.qualifies()).collect();
    if completed.is_empty() {
        return None;
    }

    let value = match metric {
        TrendMetric::Weight => completed
            .iter()
            .map(|s| s.weight_kg)
            .fold(f64::NEG_INFINITY, f64::max),
        TrendMetric::Volume => completed.iter().map(|s| s.weight_kg * s.reps as f64).sum(),
        TrendMetric::OneRepMax => completed
            .iter()
            .map(|s| epley_1rm(s.weight_kg, s.reps))
            .fold(f64::NEG_INFINITY, f64::max),
    };
    Some(value)
}

/// First set with the strictly largest key (ties keep the earlier set)
fn max_by<'a>(sets: &[&'a ExerciseSet], key: impl Fn(&ExerciseSet) -> f64) -> &'a ExerciseSet {
    let mut best = sets[0];
    for &set in &sets[1..] {
        if key(set) > key(best) {
            best = set;
        }
    }
    best
}

/// Replace the running record iff the candidate is strictly greater
fn maybe_update(
    slot: &mut Option<PersonalRecord>,
    kind: RecordKind,
    value: f64,
    date: NaiveDate,
    contributing_sets: Vec<ExerciseSet>,
    out: &mut Vec<PersonalRecord>,
) {
    let previous_value = slot.as_ref().map(|r| r.value);
    if previous_value.map_or(true, |prev| value > prev) {
        let record = PersonalRecord {
            kind,
            value,
            achieved_on: date,
            previous_value,
            contributing_sets,
        };
        *slot = Some(record.clone());
        out.push(record);
    }
}
