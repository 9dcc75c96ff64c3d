//! Adherence-streak computation over the completed-workout history.
//!
//! The streak counts consecutive *scheduled* training days with a logged
//! workout, walking backward from an anchor day. Rest days are transparent:
//! they neither break nor extend the streak. The first scheduled day without
//! a workout ends the walk.

use crate::{CompletedWorkout, TrainingSchedule};
use chrono::{Datelike, Local, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Backward-walk cap; bounds worst-case cost against pathological schedules
/// and far-future anchor dates.
const MAX_WALK_DAYS: usize = 365;

static WEEKDAY_NAMES: Lazy<HashMap<&'static str, Weekday>> = Lazy::new(|| {
    HashMap::from([
        ("monday", Weekday::Mon),
        ("mon", Weekday::Mon),
        ("tuesday", Weekday::Tue),
        ("tue", Weekday::Tue),
        ("wednesday", Weekday::Wed),
        ("wed", Weekday::Wed),
        ("thursday", Weekday::Thu),
        ("thu", Weekday::Thu),
        ("friday", Weekday::Fri),
        ("fri", Weekday::Fri),
        ("saturday", Weekday::Sat),
        ("sat", Weekday::Sat),
        ("sunday", Weekday::Sun),
        ("sun", Weekday::Sun),
    ])
});

/// Parse a weekday name, case-insensitively; `None` for unrecognized names
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    WEEKDAY_NAMES.get(name.trim().to_lowercase().as_str()).copied()
}

/// Current adherence streak, anchored on the local calendar date
pub fn streak_now(workouts: &[CompletedWorkout], schedule: &TrainingSchedule) -> u32 {
    streak(workouts, schedule, Local::now().date_naive())
}

/// Adherence streak as of `today`
///
/// Workout entries missing either a date or a name are ignored. The walk
/// anchors on the later of `today` and the most recent workout day, so a
/// workout logged today is never excluded by clock skew, then steps back one
/// calendar day at a time:
/// - unscheduled weekday: skipped
/// - scheduled weekday with a workout: streak grows
/// - scheduled weekday without one: walk stops
///
/// An empty schedule resolves to 0. This is a display statistic, so date
/// arithmetic failure also resolves to 0 rather than an error.
pub fn streak(
    workouts: &[CompletedWorkout],
    schedule: &TrainingSchedule,
    today: NaiveDate,
) -> u32 {
    if schedule.is_empty() {
        tracing::debug!("Empty training schedule, streak is 0");
        return 0;
    }

    let workout_days: HashSet<NaiveDate> = workouts
        .iter()
        .filter(|w| w.workout_name.is_some())
        .filter_map(|w| w.date)
        .collect();

    let anchor = workout_days
        .iter()
        .max()
        .map_or(today, |latest| (*latest).max(today));
    if anchor > today && (anchor - today).num_days() > MAX_WALK_DAYS as i64 {
        tracing::warn!(
            "Most recent workout date {} is more than a year after {}; streak walk truncates",
            anchor,
            today
        );
    }

    let mut count = 0u32;
    let mut day = anchor;
    for _ in 0..MAX_WALK_DAYS {
        if schedule.contains(day.weekday()) {
            if workout_days.contains(&day) {
                count += 1;
            } else {
                break;
            }
        }
        day = match day.pred_opt() {
            Some(prev) => prev,
            None => {
                tracing::warn!("Calendar underflow walking back from {}", anchor);
                return 0;
            }
        };
    }

    tracing::debug!("Streak of {} anchored on {}", count, anchor);
    count
}
