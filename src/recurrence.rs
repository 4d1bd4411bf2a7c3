use crate::errors::RuleError;
use crate::models::{Activity, Frequency, Weekday};
use chrono::{Datelike, NaiveDate, NaiveDateTime};

impl Frequency {
    pub fn validate(&self) -> Result<(), RuleError> {
        match self {
            Frequency::Daily => Ok(()),
            Frequency::Specific { is_repeated_on } if is_repeated_on.is_empty() => {
                Err(RuleError::EmptyWeekdays)
            }
            Frequency::Specific { .. } => Ok(()),
            Frequency::Repeats { is_repeated_every } if *is_repeated_every <= 0 => {
                Err(RuleError::NonPositiveInterval(*is_repeated_every))
            }
            Frequency::Repeats { .. } => Ok(()),
        }
    }

    /// Rule test for a date already known to be on or after `start`.
    pub(crate) fn matches(&self, start: NaiveDate, date: NaiveDate) -> bool {
        match self {
            Frequency::Daily => true,
            Frequency::Specific { is_repeated_on } => is_repeated_on.contains(&weekday_of(date)),
            Frequency::Repeats { is_repeated_every } => {
                (date - start).num_days().rem_euclid(*is_repeated_every) == 0
            }
        }
    }
}

pub fn weekday_of(date: NaiveDate) -> Weekday {
    Weekday::from(date.weekday())
}

pub fn weekday_name(date: NaiveDate) -> &'static str {
    weekday_of(date).name()
}

/// The part of an activity that decides on which days it is due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recurrence {
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub frequency: Frequency,
}

impl Recurrence {
    pub fn new(
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        frequency: Frequency,
    ) -> Result<Self, RuleError> {
        frequency.validate()?;
        Ok(Self {
            start_date,
            end_date,
            frequency,
        })
    }

    pub fn for_activity(activity: &Activity) -> Result<Self, RuleError> {
        let start_date = activity.start_date.ok_or(RuleError::MissingStartDate)?;
        let frequency = activity
            .frequency
            .clone()
            .ok_or(RuleError::MissingFrequency)?;
        Self::new(start_date, activity.end_date, frequency)
    }

    pub fn in_range(&self, date: NaiveDate) -> bool {
        date >= self.start_date && self.end_date.is_none_or(|end| date <= end)
    }

    pub fn is_due(&self, date: NaiveDate) -> Result<bool, RuleError> {
        self.frequency.validate()?;
        if !self.in_range(date) {
            return Ok(false);
        }
        Ok(self.frequency.matches(self.start_date, date))
    }

    /// Time of day never matters; only the calendar day of `at` is considered.
    pub fn is_due_at(&self, at: NaiveDateTime) -> Result<bool, RuleError> {
        self.is_due(at.date())
    }
}

pub fn is_due(activity: &Activity, date: NaiveDate) -> Result<bool, RuleError> {
    Recurrence::for_activity(activity)?.is_due(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityKind;
    use chrono::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn every(n: i64) -> Frequency {
        Frequency::Repeats {
            is_repeated_every: n,
        }
    }

    #[test]
    fn nothing_is_due_before_start() {
        let start = date(2024, 1, 10);
        for frequency in [
            Frequency::Daily,
            every(2),
            Frequency::Specific {
                is_repeated_on: [Weekday::Tuesday].into_iter().collect(),
            },
        ] {
            let rule = Recurrence::new(start, None, frequency).unwrap();
            for offset in 1..30 {
                assert!(!rule.is_due(start - Duration::days(offset)).unwrap());
            }
        }
    }

    #[test]
    fn nothing_is_due_after_end() {
        let rule = Recurrence::new(date(2024, 1, 1), Some(date(2024, 1, 31)), Frequency::Daily)
            .unwrap();
        assert!(rule.is_due(date(2024, 1, 31)).unwrap());
        assert!(!rule.is_due(date(2024, 2, 1)).unwrap());
    }

    #[test]
    fn daily_is_due_every_day_in_range() {
        let start = date(2024, 2, 20);
        let rule = Recurrence::new(start, None, Frequency::Daily).unwrap();
        for offset in 0..400 {
            assert!(rule.is_due(start + Duration::days(offset)).unwrap());
        }
    }

    #[test]
    fn repeats_counts_from_start() {
        let rule = Recurrence::new(date(2024, 1, 1), None, every(3)).unwrap();
        assert!(rule.is_due(date(2024, 1, 1)).unwrap());
        assert!(!rule.is_due(date(2024, 1, 5)).unwrap());
        assert!(rule.is_due(date(2024, 1, 7)).unwrap());
        assert!(rule.is_due(date(2024, 1, 31)).unwrap());
        assert!(!rule.is_due(date(2024, 2, 1)).unwrap());
    }

    #[test]
    fn specific_matches_weekday_names() {
        let rule = Recurrence::new(
            date(2024, 3, 1),
            None,
            Frequency::Specific {
                is_repeated_on: [Weekday::Monday, Weekday::Friday].into_iter().collect(),
            },
        )
        .unwrap();
        assert_eq!(weekday_name(date(2024, 3, 1)), "Friday");
        assert!(rule.is_due(date(2024, 3, 1)).unwrap());
        assert!(rule.is_due(date(2024, 3, 4)).unwrap());
        assert!(!rule.is_due(date(2024, 3, 5)).unwrap());
    }

    #[test]
    fn time_of_day_is_ignored() {
        let rule = Recurrence::new(date(2024, 1, 1), None, every(2)).unwrap();
        let late = date(2024, 1, 3).and_hms_opt(23, 59, 59).unwrap();
        let early = date(2024, 1, 1).and_hms_opt(0, 0, 1).unwrap();
        assert!(rule.is_due_at(late).unwrap());
        assert!(rule.is_due_at(early).unwrap());
    }

    #[test]
    fn invalid_rules_are_rejected() {
        assert_eq!(
            Recurrence::new(date(2024, 1, 1), None, every(0)),
            Err(RuleError::NonPositiveInterval(0))
        );
        assert_eq!(
            every(-2).validate(),
            Err(RuleError::NonPositiveInterval(-2))
        );
        let rule = Recurrence {
            start_date: date(2024, 1, 1),
            end_date: None,
            frequency: Frequency::Specific {
                is_repeated_on: Default::default(),
            },
        };
        assert_eq!(rule.is_due(date(2024, 1, 1)), Err(RuleError::EmptyWeekdays));
    }

    #[test]
    fn activity_without_start_is_rejected() {
        let activity = Activity {
            id: "a".into(),
            title: "Read".into(),
            kind: ActivityKind::Habit,
            start_date: None,
            end_date: None,
            due_date: None,
            frequency: Some(Frequency::Daily),
            is_completed: false,
        };
        assert_eq!(
            is_due(&activity, date(2024, 1, 1)),
            Err(RuleError::MissingStartDate)
        );
    }
}
