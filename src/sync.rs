//! Hydration, merge and horizon extension of the completion-dates map.
//!
//! Every write goes through the full map: there is no partial update at the
//! storage layer, and the last writer wins.

use crate::errors::{RuleError, StorageError};
use crate::generator::{
    end_of_next_month, format_date, generate_at, generate_between, is_last_day_of_month,
    parse_date,
};
use crate::models::{Activity, CompletionDate, CompletionDatesMap};
use crate::recurrence::Recurrence;
use crate::storage::KeyValueStore;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

pub const COMPLETION_DATES_KEY: &str = "completionDates";
pub const LAST_HORIZON_RUN_KEY: &str = "lastHorizonRun";
pub const ACTIVITIES_KEY: &str = "activities";

/// Union of both lists by date. Entries from `existing` always win, so a
/// recorded completion is never reset. Output is ascending by date; keys that
/// do not parse as dates keep their relative order at the end.
pub fn merge(existing: &[CompletionDate], incoming: &[CompletionDate]) -> Vec<CompletionDate> {
    let mut seen = HashSet::with_capacity(existing.len() + incoming.len());
    let mut merged = Vec::with_capacity(existing.len() + incoming.len());
    for entry in existing.iter().chain(incoming) {
        if seen.insert(entry.date.as_str()) {
            merged.push(entry.clone());
        }
    }
    merged.sort_by_key(|entry| {
        let parsed = parse_date(&entry.date);
        (parsed.is_none(), parsed)
    });
    merged
}

/// Materializes the first window of completion dates for a new activity.
/// Single tasks get no entry. Open-ended activities created on the last day
/// of a month also get next month, since that day's horizon run may already
/// be over. Returns the number of generated dates.
pub fn seed_activity(
    map: &mut CompletionDatesMap,
    activity: &Activity,
    today: NaiveDate,
) -> Result<usize, RuleError> {
    if !activity.kind.is_recurring() {
        return Ok(0);
    }
    let rule = Recurrence::for_activity(activity)?;
    let generated = if rule.end_date.is_none() && is_last_day_of_month(today) {
        generate_between(&rule, rule.start_date, end_of_next_month(today))?
    } else {
        generate_at(today, rule.start_date, &rule.frequency, rule.end_date)?
    };
    let entry = map.entry(activity.id.clone()).or_default();
    *entry = merge(entry, &generated);
    Ok(generated.len())
}

/// Flips completion of one materialized date. `None` when the activity or
/// date is not in the map.
pub fn toggle_completion(map: &mut CompletionDatesMap, id: &str, date: &str) -> Option<bool> {
    let entry = map
        .get_mut(id)?
        .iter_mut()
        .find(|entry| entry.date == date)?;
    entry.is_completed = !entry.is_completed;
    Some(entry.is_completed)
}

/// Like [`toggle_completion`], but a due date beyond the materialized
/// horizon is merged in as pending before it is flipped. `None` when the
/// date is not due for `activity`.
pub fn toggle_due_date(
    map: &mut CompletionDatesMap,
    activity: &Activity,
    date: &str,
) -> Option<bool> {
    if let Some(is_completed) = toggle_completion(map, &activity.id, date) {
        return Some(is_completed);
    }
    let day = parse_date(date)?;
    let due = Recurrence::for_activity(activity).and_then(|rule| rule.is_due(day));
    if !due.ok()? {
        return None;
    }
    let key = format_date(day);
    let entry = map.entry(activity.id.clone()).or_default();
    *entry = merge(entry, &[CompletionDate::pending(key.as_str())]);
    debug!(id = %activity.id, date = %key, "materialized due date on toggle");
    toggle_completion(map, &activity.id, &key)
}

pub fn remove_activity(map: &mut CompletionDatesMap, id: &str) -> Option<Vec<CompletionDate>> {
    map.remove(id)
}

/// Appends dates through the end of next month for every open-ended
/// recurring activity. Returns how many activities were extended.
pub fn extend_open_ended(
    activities: &[Activity],
    map: &mut CompletionDatesMap,
    today: NaiveDate,
) -> usize {
    let ceiling = end_of_next_month(today);
    let mut extended = 0;
    for activity in activities
        .iter()
        .filter(|activity| activity.kind.is_recurring() && activity.end_date.is_none())
    {
        let generated = match Recurrence::for_activity(activity)
            .and_then(|rule| generate_between(&rule, today, ceiling))
        {
            Ok(generated) => generated,
            Err(err) => {
                warn!(id = %activity.id, "skipping horizon extension: {err}");
                continue;
            }
        };
        let entry = map.entry(activity.id.clone()).or_default();
        *entry = merge(entry, &generated);
        extended += 1;
    }
    extended
}

/// Completion-dates persistence on top of a [`KeyValueStore`].
#[derive(Debug, Clone)]
pub struct CompletionStore<S> {
    store: S,
}

impl<S: KeyValueStore> CompletionStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// An absent key is an empty map; access or parse failures are errors.
    pub async fn try_load(&self) -> Result<CompletionDatesMap, StorageError> {
        match self.store.get_item(COMPLETION_DATES_KEY).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(CompletionDatesMap::new()),
        }
    }

    pub async fn load(&self) -> CompletionDatesMap {
        match self.try_load().await {
            Ok(map) => map,
            Err(err) => {
                error!("failed to load completion dates: {err}");
                CompletionDatesMap::new()
            }
        }
    }

    pub async fn try_save(&self, map: &CompletionDatesMap) -> Result<(), StorageError> {
        let payload = serde_json::to_string(map)?;
        self.store.set_item(COMPLETION_DATES_KEY, &payload).await
    }

    /// Failures are logged; the in-memory map stays authoritative and the next
    /// successful save rewrites everything.
    pub async fn save(&self, map: &CompletionDatesMap) -> bool {
        match self.try_save(map).await {
            Ok(()) => true,
            Err(err) => {
                error!("failed to persist completion dates: {err}");
                false
            }
        }
    }

    pub async fn try_load_activities(&self) -> Result<Vec<Activity>, StorageError> {
        match self.store.get_item(ACTIVITIES_KEY).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn load_activities(&self) -> Vec<Activity> {
        match self.try_load_activities().await {
            Ok(activities) => activities,
            Err(err) => {
                error!("failed to load activities: {err}");
                Vec::new()
            }
        }
    }

    pub async fn try_save_activities(&self, activities: &[Activity]) -> Result<(), StorageError> {
        let payload = serde_json::to_string(activities)?;
        self.store.set_item(ACTIVITIES_KEY, &payload).await
    }

    pub async fn save_activities(&self, activities: &[Activity]) -> bool {
        match self.try_save_activities(activities).await {
            Ok(()) => true,
            Err(err) => {
                error!("failed to persist activities: {err}");
                false
            }
        }
    }

    /// Calendar day of the last horizon extension. Unreadable values count as
    /// never having run.
    pub async fn last_horizon_run(&self) -> Option<NaiveDate> {
        let raw = match self.store.get_item(LAST_HORIZON_RUN_KEY).await {
            Ok(raw) => raw?,
            Err(err) => {
                warn!("failed to read last horizon run: {err}");
                return None;
            }
        };
        let parsed = parse_run_timestamp(raw.trim());
        if parsed.is_none() {
            warn!(value = %raw, "ignoring unparseable last horizon run");
        }
        parsed
    }

    /// True on the last day of the month unless the job already ran today.
    pub async fn horizon_due(&self, today: NaiveDate) -> bool {
        if !is_last_day_of_month(today) {
            return false;
        }
        self.last_horizon_run()
            .await
            .is_none_or(|last_run| last_run < today)
    }

    /// Monthly job. Safe to call on every foreground: it does nothing unless
    /// [`Self::horizon_due`] holds. The run is only recorded once the extended
    /// map has been written, so a failed write is retried on the next call.
    pub async fn extend_horizon(
        &self,
        activities: &[Activity],
        mut map: CompletionDatesMap,
        today: NaiveDate,
    ) -> CompletionDatesMap {
        if !self.horizon_due(today).await {
            debug!(%today, "horizon extension not due");
            return map;
        }

        let extended = extend_open_ended(activities, &mut map, today);
        info!(%today, extended, "extended completion horizon");

        if !self.save(&map).await {
            return map;
        }
        let stamp = format_run_timestamp(today);
        if let Err(err) = self.store.set_item(LAST_HORIZON_RUN_KEY, &stamp).await {
            error!("failed to record horizon run: {err}");
        }
        map
    }
}

/// Local calendar day, written without an offset.
fn format_run_timestamp(day: NaiveDate) -> String {
    day.and_time(chrono::NaiveTime::MIN)
        .format("%Y-%m-%dT%H:%M:%S%.3f")
        .to_string()
}

/// Stamps carrying an offset (e.g. `toISOString()` output) are converted to
/// the local day; naive stamps are already local.
fn parse_run_timestamp(raw: &str) -> Option<NaiveDate> {
    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.with_timezone(&Local).date_naive());
    }
    if let Ok(stamp) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(stamp.date());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}
