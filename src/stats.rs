use crate::generator::{format_date, parse_date};
use crate::models::{ActivityStats, CompletionDate, DayPoint};
use chrono::{Duration, Local, NaiveDate};
use std::collections::HashMap;

pub fn build_stats(id: &str, entries: &[CompletionDate]) -> ActivityStats {
    build_stats_at(Local::now().date_naive(), id, entries)
}

/// Only dates on or before `today` count. An open entry for `today` itself
/// does not break the current streak.
pub fn build_stats_at(today: NaiveDate, id: &str, entries: &[CompletionDate]) -> ActivityStats {
    let mut past: Vec<(NaiveDate, bool)> = entries
        .iter()
        .filter_map(|entry| parse_date(&entry.date).map(|date| (date, entry.is_completed)))
        .filter(|(date, _)| *date <= today)
        .collect();
    past.sort_by_key(|(date, _)| *date);
    past.dedup_by_key(|(date, _)| *date);

    let due_so_far = past.len() as u32;
    let completed = past.iter().filter(|(_, done)| *done).count() as u32;
    let completion_rate = if due_so_far == 0 {
        0.0
    } else {
        f64::from(completed) / f64::from(due_so_far)
    };

    let mut best_streak = 0u32;
    let mut run = 0u32;
    for (_, done) in &past {
        if *done {
            run += 1;
            best_streak = best_streak.max(run);
        } else {
            run = 0;
        }
    }

    let mut trailing = past.as_slice();
    if let Some(((date, false), rest)) = trailing.split_last() {
        if *date == today {
            trailing = rest;
        }
    }
    let current_streak = trailing
        .iter()
        .rev()
        .take_while(|(_, done)| *done)
        .count() as u32;

    let by_key: HashMap<&str, bool> = entries
        .iter()
        .map(|entry| (entry.date.as_str(), entry.is_completed))
        .collect();
    let mut last_7_days = Vec::with_capacity(7);
    for offset in (0..7).rev() {
        let date = format_date(today - Duration::days(offset));
        let state = by_key.get(date.as_str()).copied();
        last_7_days.push(DayPoint {
            is_due: state.is_some(),
            is_completed: state.unwrap_or(false),
            date,
        });
    }

    ActivityStats {
        id: id.to_string(),
        due_so_far,
        completed,
        completion_rate,
        current_streak,
        best_streak,
        last_7_days,
    }
}
