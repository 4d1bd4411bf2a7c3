use crate::agenda::build_agenda;
use crate::errors::{AppError, RuleError};
use crate::generator::format_date;
use crate::models::{
    Activity, ActivityStats, AgendaQuery, AgendaResponse, CompletionDate, CompletionDatesMap,
    HorizonResponse, NewActivityRequest, ToggleRequest, ToggleResponse,
};
use crate::state::AppState;
use crate::stats::build_stats_at;
use crate::sync::{remove_activity, seed_activity, toggle_due_date};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Local, NaiveDate};
use tracing::info;

pub async fn list_activities(State(state): State<AppState>) -> Json<Vec<Activity>> {
    let data = state.data.lock().await;
    Json(data.activities.clone())
}

pub async fn create_activity(
    State(state): State<AppState>,
    Json(payload): Json<NewActivityRequest>,
) -> Result<(StatusCode, Json<Activity>), AppError> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("title must not be empty"));
    }
    if !payload.kind.is_recurring() && payload.due_date.is_none() {
        return Err(RuleError::MissingDueDate.into());
    }

    let mut data = state.data.lock().await;
    let activity = Activity {
        id: next_id(&data.activities),
        title: title.to_string(),
        kind: payload.kind,
        start_date: payload.start_date,
        end_date: payload.end_date,
        due_date: payload.due_date,
        frequency: payload.frequency,
        is_completed: false,
    };

    let seeded = seed_activity(&mut data.completions, &activity, today())?;
    data.activities.push(activity.clone());
    info!(id = %activity.id, seeded, "created activity");

    state.store.save_activities(&data.activities).await;
    if activity.kind.is_recurring() {
        state.store.save(&data.completions).await;
    }

    Ok((StatusCode::CREATED, Json(activity)))
}

pub async fn delete_activity(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let mut data = state.data.lock().await;
    let index = data
        .activities
        .iter()
        .position(|activity| activity.id == id)
        .ok_or_else(|| unknown_activity(&id))?;
    data.activities.remove(index);
    let had_dates = remove_activity(&mut data.completions, &id).is_some();
    info!(%id, "deleted activity");

    state.store.save_activities(&data.activities).await;
    if had_dates {
        state.store.save(&data.completions).await;
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_completions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<CompletionDate>>, AppError> {
    let data = state.data.lock().await;
    let activity = find_activity(&data.activities, &id)?;
    Ok(Json(completion_entries(activity, &data.completions)))
}

pub async fn toggle(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ToggleRequest>,
) -> Result<Json<ToggleResponse>, AppError> {
    let date = payload.date.trim().to_string();
    let mut data = state.data.lock().await;
    let activity = find_activity(&data.activities, &id)?.clone();

    let response = if activity.kind.is_recurring() {
        let is_completed =
            toggle_due_date(&mut data.completions, &activity, &date).ok_or_else(|| {
                AppError::bad_request(format!("{date} is not a due date of activity {id}"))
            })?;
        state.store.save(&data.completions).await;
        ToggleResponse {
            id,
            date,
            is_completed,
        }
    } else {
        let activity = data
            .activities
            .iter_mut()
            .find(|activity| activity.id == id)
            .ok_or_else(|| unknown_activity(&id))?;
        activity.is_completed = !activity.is_completed;
        let response = ToggleResponse {
            date: activity.due_date.map(format_date).unwrap_or(date),
            is_completed: activity.is_completed,
            id,
        };
        state.store.save_activities(&data.activities).await;
        response
    };

    Ok(Json(response))
}

pub async fn get_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActivityStats>, AppError> {
    let data = state.data.lock().await;
    let activity = find_activity(&data.activities, &id)?;
    let entries = completion_entries(activity, &data.completions);
    Ok(Json(build_stats_at(today(), &id, &entries)))
}

pub async fn get_agenda(
    State(state): State<AppState>,
    Query(query): Query<AgendaQuery>,
) -> Json<AgendaResponse> {
    let date = query.date.unwrap_or_else(today);
    let data = state.data.lock().await;
    Json(build_agenda(&data.activities, &data.completions, date))
}

pub async fn run_horizon(State(state): State<AppState>) -> Json<HorizonResponse> {
    let today = today();
    let mut data = state.data.lock().await;
    let ran = state.store.horizon_due(today).await;
    let completions = std::mem::take(&mut data.completions);
    data.completions = state
        .store
        .extend_horizon(&data.activities, completions, today)
        .await;

    Json(HorizonResponse {
        ran,
        completion_dates: data.completions.values().map(Vec::len).sum(),
    })
}

/// Single tasks carry their own flag; they are reported as one entry on
/// their due date.
fn completion_entries(
    activity: &Activity,
    completions: &CompletionDatesMap,
) -> Vec<CompletionDate> {
    if activity.kind.is_recurring() {
        return completions.get(&activity.id).cloned().unwrap_or_default();
    }
    activity
        .due_date
        .map(|due| CompletionDate {
            date: format_date(due),
            is_completed: activity.is_completed,
        })
        .into_iter()
        .collect()
}

fn find_activity<'a>(activities: &'a [Activity], id: &str) -> Result<&'a Activity, AppError> {
    activities
        .iter()
        .find(|activity| activity.id == id)
        .ok_or_else(|| unknown_activity(id))
}

fn unknown_activity(id: &str) -> AppError {
    AppError::not_found(format!("unknown activity {id}"))
}

fn next_id(existing: &[Activity]) -> String {
    let mut candidate = Local::now().timestamp_micros();
    loop {
        let id = format!("{candidate:x}");
        if existing.iter().all(|activity| activity.id != id) {
            return id;
        }
        candidate += 1;
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
