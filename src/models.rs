use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Weekday with fixed English names, independent of any locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub fn name(self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        }
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
            chrono::Weekday::Sun => Weekday::Sunday,
        }
    }
}

/// Which calendar days a recurring activity is due on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Specific {
        #[serde(rename = "isRepeatedOn", default)]
        is_repeated_on: BTreeSet<Weekday>,
    },
    Repeats {
        /// Kept signed so that zero or negative input survives decoding and is
        /// rejected by validation instead of by the parser.
        #[serde(rename = "isRepeatedEvery")]
        is_repeated_every: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityKind {
    #[serde(rename = "habit")]
    Habit,
    #[serde(rename = "single task")]
    SingleTask,
    #[serde(rename = "recurring task")]
    RecurringTask,
}

impl ActivityKind {
    pub fn is_recurring(self) -> bool {
        !matches!(self, ActivityKind::SingleTask)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Fixed due date of a single task.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub frequency: Option<Frequency>,
    /// Only authoritative for single tasks.
    #[serde(default)]
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionDate {
    pub date: String,
    pub is_completed: bool,
}

impl CompletionDate {
    pub fn pending(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            is_completed: false,
        }
    }
}

pub type CompletionDatesMap = BTreeMap<String, Vec<CompletionDate>>;

/// State owned by the composition root.
#[derive(Debug, Clone, Default)]
pub struct AppData {
    pub activities: Vec<Activity>,
    pub completions: CompletionDatesMap,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivityRequest {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub frequency: Option<Frequency>,
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct AgendaQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaItem {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub is_completed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaResponse {
    pub date: String,
    pub items: Vec<AgendaItem>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResponse {
    pub id: String,
    pub date: String,
    pub is_completed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HorizonResponse {
    pub ran: bool,
    pub completion_dates: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPoint {
    pub date: String,
    pub is_due: bool,
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStats {
    pub id: String,
    pub due_so_far: u32,
    pub completed: u32,
    pub completion_rate: f64,
    pub current_streak: u32,
    pub best_streak: u32,
    pub last_7_days: Vec<DayPoint>,
}
