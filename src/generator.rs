use crate::errors::RuleError;
use crate::models::{CompletionDate, Frequency};
use crate::recurrence::Recurrence;
use chrono::{Datelike, Duration, Local, NaiveDate};

/// Day, abbreviated English month, full year: `01 Jan 2024`.
pub const DATE_FORMAT: &str = "%d %b %Y";

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

pub fn end_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

pub fn end_of_next_month(date: NaiveDate) -> NaiveDate {
    end_of_month(date)
        .succ_opt()
        .map(end_of_month)
        .unwrap_or(NaiveDate::MAX)
}

pub fn is_last_day_of_month(date: NaiveDate) -> bool {
    end_of_month(date) == date
}

/// Completion dates for a newly created activity, seeded as not completed.
pub fn generate(
    start_date: NaiveDate,
    frequency: &Frequency,
    end_date: Option<NaiveDate>,
) -> Result<Vec<CompletionDate>, RuleError> {
    generate_at(Local::now().date_naive(), start_date, frequency, end_date)
}

/// Open-ended activities are only materialized through the end of `today`'s month.
pub fn generate_at(
    today: NaiveDate,
    start_date: NaiveDate,
    frequency: &Frequency,
    end_date: Option<NaiveDate>,
) -> Result<Vec<CompletionDate>, RuleError> {
    let rule = Recurrence::new(start_date, end_date, frequency.clone())?;
    let ceiling = end_date.unwrap_or_else(|| end_of_month(today));
    generate_between(&rule, start_date, ceiling)
}

/// Due dates of `rule` within `[from, ceiling]`, clipped to the rule's own range.
/// `repeats` rules stay on their start-date phase whatever `from` is.
pub fn generate_between(
    rule: &Recurrence,
    from: NaiveDate,
    ceiling: NaiveDate,
) -> Result<Vec<CompletionDate>, RuleError> {
    rule.frequency.validate()?;

    let ceiling = match rule.end_date {
        Some(end) => ceiling.min(end),
        None => ceiling,
    };
    let mut cursor = from.max(rule.start_date);

    let step = match &rule.frequency {
        Frequency::Repeats { is_repeated_every } => {
            let offset = (cursor - rule.start_date).num_days().rem_euclid(*is_repeated_every);
            if offset != 0 {
                match cursor.checked_add_signed(Duration::days(is_repeated_every - offset)) {
                    Some(aligned) => cursor = aligned,
                    None => return Ok(Vec::new()),
                }
            }
            *is_repeated_every
        }
        Frequency::Daily | Frequency::Specific { .. } => 1,
    };

    let mut dates = Vec::new();
    while cursor <= ceiling {
        if rule.frequency.matches(rule.start_date, cursor) {
            dates.push(CompletionDate::pending(format_date(cursor)));
        }
        match cursor.checked_add_signed(Duration::days(step)) {
            Some(next) => cursor = next,
            None => break,
        }
    }
    Ok(dates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Weekday;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn labels(dates: &[CompletionDate]) -> Vec<&str> {
        dates.iter().map(|entry| entry.date.as_str()).collect()
    }

    #[test]
    fn month_boundaries() {
        assert_eq!(end_of_month(date(2024, 2, 10)), date(2024, 2, 29));
        assert_eq!(end_of_month(date(2023, 12, 31)), date(2023, 12, 31));
        assert_eq!(end_of_next_month(date(2024, 1, 31)), date(2024, 2, 29));
        assert_eq!(end_of_next_month(date(2024, 12, 5)), date(2025, 1, 31));
        assert!(is_last_day_of_month(date(2024, 4, 30)));
        assert!(!is_last_day_of_month(date(2024, 5, 30)));
    }

    #[test]
    fn format_is_day_month_year() {
        assert_eq!(format_date(date(2024, 1, 1)), "01 Jan 2024");
        assert_eq!(parse_date("29 Feb 2024"), Some(date(2024, 2, 29)));
        assert_eq!(parse_date("2024-02-29"), None);
    }

    #[test]
    fn repeats_steps_through_month() {
        let dates = generate_at(
            date(2024, 1, 15),
            date(2024, 1, 1),
            &Frequency::Repeats {
                is_repeated_every: 3,
            },
            None,
        )
        .unwrap();
        let days: Vec<u32> = dates
            .iter()
            .map(|entry| parse_date(&entry.date).unwrap().day())
            .collect();
        assert_eq!(days, vec![1, 4, 7, 10, 13, 16, 19, 22, 25, 28, 31]);
        assert!(dates.iter().all(|entry| !entry.is_completed));
    }

    #[test]
    fn specific_walks_day_by_day() {
        let dates = generate_at(
            date(2024, 3, 1),
            date(2024, 3, 1),
            &Frequency::Specific {
                is_repeated_on: [Weekday::Monday, Weekday::Friday].into_iter().collect(),
            },
            None,
        )
        .unwrap();
        assert_eq!(
            labels(&dates),
            vec![
                "01 Mar 2024",
                "04 Mar 2024",
                "08 Mar 2024",
                "11 Mar 2024",
                "15 Mar 2024",
                "18 Mar 2024",
                "22 Mar 2024",
                "25 Mar 2024",
                "29 Mar 2024"
            ]
        );
    }

    #[test]
    fn end_date_is_the_ceiling() {
        let dates = generate_at(
            date(2024, 1, 1),
            date(2024, 1, 30),
            &Frequency::Daily,
            Some(date(2024, 2, 2)),
        )
        .unwrap();
        assert_eq!(
            labels(&dates),
            vec!["30 Jan 2024", "31 Jan 2024", "01 Feb 2024", "02 Feb 2024"]
        );
    }

    #[test]
    fn end_before_start_is_empty() {
        let dates = generate_at(
            date(2024, 1, 1),
            date(2024, 1, 10),
            &Frequency::Daily,
            Some(date(2024, 1, 5)),
        )
        .unwrap();
        assert!(dates.is_empty());
    }

    #[test]
    fn generated_dates_are_exactly_the_due_dates() {
        let rule = Recurrence::new(
            date(2024, 1, 3),
            Some(date(2024, 4, 20)),
            Frequency::Repeats {
                is_repeated_every: 5,
            },
        )
        .unwrap();
        let generated: Vec<NaiveDate> = generate_between(&rule, rule.start_date, date(2024, 12, 31))
            .unwrap()
            .iter()
            .map(|entry| parse_date(&entry.date).unwrap())
            .collect();
        let expected: Vec<NaiveDate> = rule
            .start_date
            .iter_days()
            .take_while(|day| *day <= date(2024, 4, 20))
            .filter(|day| rule.is_due(*day).unwrap())
            .collect();
        assert_eq!(generated, expected);
        assert!(generated.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn later_window_keeps_repeat_phase() {
        let rule = Recurrence::new(
            date(2024, 1, 1),
            None,
            Frequency::Repeats {
                is_repeated_every: 3,
            },
        )
        .unwrap();
        let dates = generate_between(&rule, date(2024, 1, 31), date(2024, 2, 10)).unwrap();
        assert_eq!(
            labels(&dates),
            vec!["31 Jan 2024", "03 Feb 2024", "06 Feb 2024", "09 Feb 2024"]
        );
        let dates = generate_between(&rule, date(2024, 2, 1), date(2024, 2, 5)).unwrap();
        assert_eq!(labels(&dates), vec!["03 Feb 2024"]);
    }

    #[test]
    fn zero_step_is_rejected_before_walking() {
        let result = generate_at(
            date(2024, 1, 1),
            date(2024, 1, 1),
            &Frequency::Repeats {
                is_repeated_every: 0,
            },
            None,
        );
        assert_eq!(result, Err(RuleError::NonPositiveInterval(0)));
    }
}
