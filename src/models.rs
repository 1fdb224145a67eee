use std::collections::BTreeMap;

use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub date: NaiveDate,
    pub count: u32,
}

impl Observation {
    pub fn single(date: NaiveDate) -> Self {
        Self { date, count: 1 }
    }
}

/// Tests completed per calendar day. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityMap {
    days: BTreeMap<NaiveDate, u32>,
}

impl ActivityMap {
    /// Sums observations that land on the same date.
    pub fn from_observations<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = Observation>,
    {
        let mut days = BTreeMap::new();
        for observation in observations {
            let entry = days.entry(observation.date).or_insert(0u32);
            *entry = entry.saturating_add(observation.count);
        }
        Self { days }
    }

    /// Takes per-day totals as given. A repeated date keeps its last value.
    pub fn from_daily_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, u32)>,
    {
        Self {
            days: counts.into_iter().collect(),
        }
    }

    pub fn get(&self, date: NaiveDate) -> u32 {
        self.days.get(&date).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn total_tests(&self) -> u64 {
        self.days.values().map(|&count| u64::from(count)).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, u32)> + '_ {
        self.days.iter().map(|(&date, &count)| (date, count))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Empty,
    Low,
    Medium,
    High,
    Peak,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Empty,
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Peak,
    ];

    pub fn level(self) -> usize {
        self as usize
    }

    pub fn color(self) -> &'static str {
        match self {
            Severity::Empty => "#2c2e31",
            Severity::Low => "#005a5a",
            Severity::Medium => "#008888",
            Severity::High => "#00b9b9",
            Severity::Peak => "#e2b714",
        }
    }
}
