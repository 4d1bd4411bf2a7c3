use crate::generator::format_date;
use crate::models::{Activity, AgendaItem, AgendaResponse, CompletionDatesMap};
use crate::recurrence::Recurrence;
use chrono::NaiveDate;
use tracing::warn;

/// Activities due on `date`, with their completion state for that day.
pub fn build_agenda(
    activities: &[Activity],
    completions: &CompletionDatesMap,
    date: NaiveDate,
) -> AgendaResponse {
    let key = format_date(date);
    let mut items = Vec::new();

    for activity in activities {
        let is_completed = if activity.kind.is_recurring() {
            let due = Recurrence::for_activity(activity).and_then(|rule| rule.is_due(date));
            match due {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    warn!(id = %activity.id, "leaving activity off agenda: {err}");
                    continue;
                }
            }
            completions
                .get(&activity.id)
                .and_then(|dates| dates.iter().find(|entry| entry.date == key))
                .is_some_and(|entry| entry.is_completed)
        } else {
            if activity.due_date != Some(date) {
                continue;
            }
            activity.is_completed
        };

        items.push(AgendaItem {
            id: activity.id.clone(),
            title: activity.title.clone(),
            kind: activity.kind,
            is_completed,
        });
    }

    AgendaResponse { date: key, items }
}
