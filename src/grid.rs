use chrono::{Datelike, Duration, NaiveDate};

use crate::models::Severity;

pub fn severity_for(count: u32) -> Severity {
    match count {
        0 => Severity::Empty,
        1..=5 => Severity::Low,
        6..=15 => Severity::Medium,
        16..=30 => Severity::High,
        _ => Severity::Peak,
    }
}

/// Most recent Sunday on or before `today`.
pub fn end_boundary(today: NaiveDate) -> NaiveDate {
    let weekday = i64::from(today.weekday().num_days_from_monday());
    today - Duration::days((weekday + 1) % 7)
}

pub fn start_date(today: NaiveDate, weeks: u32) -> NaiveDate {
    let weeks = i64::from(weeks.max(1));
    end_boundary(today) - Duration::weeks(weeks - 1)
}

pub fn cell_date(start: NaiveDate, week: u32, day: u32) -> NaiveDate {
    start + Duration::weeks(i64::from(week)) + Duration::days(i64::from(day))
}

/// Every (week, day, date) cell of a `weeks`-wide grid ending in the week of
/// `today`, skipping days after `today`.
pub fn visible_cells(
    today: NaiveDate,
    weeks: u32,
) -> impl Iterator<Item = (u32, u32, NaiveDate)> {
    let start = start_date(today, weeks);
    (0..weeks.max(1))
        .flat_map(move |week| (0..7).map(move |day| (week, day, cell_date(start, week, day))))
        .filter(move |&(_, _, date)| date <= today)
}
