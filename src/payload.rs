use std::collections::BTreeMap;

use chrono::{Days, NaiveDate, TimeZone};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::fetch::FetchError;
use crate::models::{ActivityMap, Observation};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestRecord {
    #[serde(default, deserialize_with = "lenient_millis")]
    pub timestamp: Option<i64>,
    #[serde(default, deserialize_with = "lenient_millis")]
    pub ts: Option<i64>,
}

/// Accepts integer or fractional epoch millis; anything else reads as absent.
fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|millis| millis.is_finite())
                .map(|millis| millis.trunc() as i64)
        }),
        _ => None,
    };
    Ok(millis)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RecordEntry {
    Record(TestRecord),
    Other(IgnoredAny),
}

impl RecordEntry {
    fn epoch_millis(&self) -> Option<i64> {
        match self {
            RecordEntry::Record(record) => record.timestamp.or(record.ts),
            RecordEntry::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationResults {
    Records(Vec<RecordEntry>),
    Other(IgnoredAny),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ModeStats {
    Durations(BTreeMap<String, DurationResults>),
    Other(IgnoredAny),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestActivity {
    pub last_day: i64,
    pub tests_by_days: Vec<Option<u32>>,
}

/// The upstream response shapes this tool understands. Exactly one is
/// picked per response.
#[derive(Debug, Clone)]
pub enum ActivityPayload {
    PreAggregated(TestActivity),
    NestedByMode(BTreeMap<String, ModeStats>),
    PerTestList(Vec<RecordEntry>),
}

impl ActivityPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            ActivityPayload::PreAggregated(_) => "pre-aggregated testActivity",
            ActivityPayload::NestedByMode(_) => "nested typingStats",
            ActivityPayload::PerTestList(_) => "per-test result list",
        }
    }

    /// Picks the shape from a full response body (the object holding `data`).
    pub fn from_body(body: Value) -> Result<Self, FetchError> {
        let mut body = match body {
            Value::Object(fields) => fields,
            other => {
                return Err(FetchError::Schema(format!(
                    "response body is not an object: {}",
                    fragment(&other)
                )))
            }
        };
        let data = body
            .remove("data")
            .ok_or_else(|| FetchError::Schema("response has no `data` field".to_string()))?;
        Self::from_data(data)
    }

    pub fn from_data(data: Value) -> Result<Self, FetchError> {
        match data {
            Value::Array(records) => {
                let records = serde_json::from_value(Value::Array(records))?;
                Ok(ActivityPayload::PerTestList(records))
            }
            Value::Object(mut fields) => {
                if let Some(activity) = fields.remove("testActivity") {
                    return Ok(ActivityPayload::PreAggregated(serde_json::from_value(
                        activity,
                    )?));
                }
                if fields.contains_key("testsByDays") && fields.contains_key("lastDay") {
                    return Ok(ActivityPayload::PreAggregated(serde_json::from_value(
                        Value::Object(fields),
                    )?));
                }
                if let Some(stats) = fields.remove("typingStats") {
                    return Ok(ActivityPayload::NestedByMode(serde_json::from_value(stats)?));
                }
                let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
                Err(FetchError::Schema(format!(
                    "unrecognized `data` object with fields [{}]",
                    keys.join(", ")
                )))
            }
            other => Err(FetchError::Schema(format!(
                "unrecognized `data` value: {}",
                fragment(&other)
            ))),
        }
    }

    /// Buckets the payload by calendar day in `tz`.
    pub fn into_activity<Tz: TimeZone>(self, tz: &Tz) -> Result<ActivityMap, FetchError> {
        match self {
            ActivityPayload::PerTestList(records) => {
                Ok(count_records(records.iter(), tz))
            }
            ActivityPayload::NestedByMode(modes) => {
                let records = modes
                    .values()
                    .filter_map(|mode| match mode {
                        ModeStats::Durations(durations) => Some(durations.values()),
                        ModeStats::Other(_) => None,
                    })
                    .flatten()
                    .filter_map(|results| match results {
                        DurationResults::Records(records) => Some(records.iter()),
                        DurationResults::Other(_) => None,
                    })
                    .flatten();
                Ok(count_records(records, tz))
            }
            ActivityPayload::PreAggregated(activity) => expand_daily_counts(&activity, tz),
        }
    }
}

pub fn local_date<Tz: TimeZone>(epoch_millis: i64, tz: &Tz) -> Option<NaiveDate> {
    tz.timestamp_millis_opt(epoch_millis)
        .single()
        .map(|instant| instant.date_naive())
}

fn count_records<'a, Tz, I>(records: I, tz: &Tz) -> ActivityMap
where
    Tz: TimeZone,
    I: Iterator<Item = &'a RecordEntry>,
{
    let mut skipped = 0usize;
    let observations: Vec<Observation> = records
        .filter_map(|record| {
            let date = record.epoch_millis().and_then(|ms| local_date(ms, tz));
            if date.is_none() {
                skipped += 1;
            }
            date.map(Observation::single)
        })
        .collect();
    if skipped > 0 {
        tracing::warn!(skipped, "ignored test records without a usable timestamp");
    }
    ActivityMap::from_observations(observations)
}

fn expand_daily_counts<Tz: TimeZone>(
    activity: &TestActivity,
    tz: &Tz,
) -> Result<ActivityMap, FetchError> {
    let last_day = local_date(activity.last_day, tz).ok_or_else(|| {
        FetchError::Schema(format!("lastDay {} is not a valid instant", activity.last_day))
    })?;
    let len = activity.tests_by_days.len();
    let mut counts = Vec::with_capacity(len);
    for (index, count) in activity.tests_by_days.iter().enumerate() {
        let Some(count) = count else {
            continue;
        };
        let back = (len - 1 - index) as u64;
        let date = last_day.checked_sub_days(Days::new(back)).ok_or_else(|| {
            FetchError::Schema(format!("testsByDays reaches {back} days before {last_day}"))
        })?;
        counts.push((date, *count));
    }
    Ok(ActivityMap::from_daily_counts(counts))
}

fn fragment(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() > 200 {
        let head: String = text.chars().take(200).collect();
        format!("{head}...")
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn millis(y: i32, m: u32, d: u32, hour: u32) -> i64 {
        day(y, m, d)
            .and_hms_opt(hour, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis()
    }

    fn has_day(activity: &ActivityMap, date: NaiveDate) -> bool {
        activity.iter().any(|(day, _)| day == date)
    }

    fn decode(body: Value) -> Result<ActivityMap, FetchError> {
        ActivityPayload::from_body(body)?.into_activity(&Utc)
    }

    #[test]
    fn pre_aggregated_nulls_are_absent() {
        let body = json!({
            "data": {
                "testActivity": {
                    "lastDay": millis(2024, 6, 12, 0),
                    "testsByDays": [null, 2, 0, 5]
                }
            }
        });
        let activity = decode(body).unwrap();
        assert_eq!(activity.len(), 3);
        assert!(!has_day(&activity, day(2024, 6, 9)));
        assert_eq!(activity.get(day(2024, 6, 10)), 2);
        assert!(has_day(&activity, day(2024, 6, 11)));
        assert_eq!(activity.get(day(2024, 6, 11)), 0);
        assert_eq!(activity.get(day(2024, 6, 12)), 5);
    }

    #[test]
    fn pre_aggregated_accepted_without_wrapper() {
        let body = json!({
            "data": { "lastDay": millis(2024, 1, 2, 0), "testsByDays": [7, 1] }
        });
        let payload = ActivityPayload::from_body(body).unwrap();
        assert_eq!(payload.kind(), "pre-aggregated testActivity");
        let activity = payload.into_activity(&Utc).unwrap();
        assert_eq!(activity.get(day(2024, 1, 1)), 7);
        assert_eq!(activity.get(day(2024, 1, 2)), 1);
    }

    #[test]
    fn pre_aggregated_wins_over_typing_stats() {
        let body = json!({
            "data": {
                "typingStats": { "time": { "15": [{ "timestamp": millis(2024, 1, 1, 9) }] } },
                "testActivity": { "lastDay": millis(2024, 3, 1, 0), "testsByDays": [4] }
            }
        });
        let activity = decode(body).unwrap();
        assert_eq!(activity.get(day(2024, 3, 1)), 4);
        assert!(!has_day(&activity, day(2024, 1, 1)));
    }

    #[test]
    fn nested_modes_are_flattened() {
        let body = json!({
            "data": {
                "typingStats": {
                    "time": {
                        "15": [
                            { "timestamp": millis(2024, 5, 1, 8) },
                            { "timestamp": millis(2024, 5, 1, 20) }
                        ],
                        "60": [{ "timestamp": millis(2024, 5, 2, 8) }],
                        "completed": 12
                    },
                    "words": { "10": [{ "timestamp": millis(2024, 5, 1, 9) }, { "wpm": 80 }] },
                    "startedTests": 40
                }
            }
        });
        let activity = decode(body).unwrap();
        assert_eq!(activity.get(day(2024, 5, 1)), 3);
        assert_eq!(activity.get(day(2024, 5, 2)), 1);
        assert_eq!(activity.total_tests(), 4);
    }

    #[test]
    fn result_list_counts_timestamp_and_ts() {
        let body = json!({
            "data": [
                { "timestamp": millis(2024, 2, 3, 10), "wpm": 90 },
                { "ts": millis(2024, 2, 3, 11) },
                { "ts": millis(2024, 2, 4, 11) },
                { "wpm": 50 }
            ]
        });
        let activity = decode(body).unwrap();
        assert_eq!(activity.get(day(2024, 2, 3)), 2);
        assert_eq!(activity.get(day(2024, 2, 4)), 1);
        assert_eq!(activity.len(), 2);
    }

    #[test]
    fn bad_timestamp_only_skips_its_own_record() {
        let body = json!({
            "data": {
                "typingStats": {
                    "time": {
                        "15": [
                            { "ts": millis(2024, 6, 12, 8) },
                            { "timestamp": "not a number" },
                            { "ts": millis(2024, 6, 12, 9) }
                        ]
                    }
                }
            }
        });
        let activity = decode(body).unwrap();
        assert_eq!(activity.get(day(2024, 6, 12)), 2);
        assert_eq!(activity.total_tests(), 2);
    }

    #[test]
    fn fractional_timestamps_are_counted() {
        let fractional = millis(2024, 6, 12, 10) as f64 + 0.5;
        let body = json!({
            "data": {
                "typingStats": {
                    "time": {
                        "15": [
                            { "ts": millis(2024, 6, 12, 8) },
                            { "timestamp": fractional },
                            { "ts": millis(2024, 6, 12, 9) }
                        ]
                    }
                }
            }
        });
        let activity = decode(body).unwrap();
        assert_eq!(activity.get(day(2024, 6, 12)), 3);
    }

    #[test]
    fn result_list_survives_unusable_entries() {
        let as_text = millis(2024, 6, 12, 8).to_string();
        let body = json!({
            "data": [
                { "timestamp": millis(2024, 6, 12, 8) },
                { "timestamp": as_text },
                { "timestamp": null, "ts": millis(2024, 6, 11, 8) },
                42
            ]
        });
        let activity = decode(body).unwrap();
        assert_eq!(activity.get(day(2024, 6, 12)), 1);
        assert_eq!(activity.get(day(2024, 6, 11)), 1);
        assert_eq!(activity.total_tests(), 2);
    }

    #[test]
    fn empty_result_list_is_empty_map() {
        let activity = decode(json!({ "data": [] })).unwrap();
        assert!(activity.is_empty());
    }

    #[test]
    fn missing_data_is_schema_error() {
        let err = decode(json!({ "message": "Unauthorized" })).unwrap_err();
        assert!(matches!(err, FetchError::Schema(_)));
    }

    #[test]
    fn unknown_shape_fails_soft() {
        let err = decode(json!({ "data": { "name": "someone", "xp": 10 } })).unwrap_err();
        match err {
            FetchError::Schema(message) => assert!(message.contains("name")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(decode(json!({ "data": null })).is_err());
    }

    #[test]
    fn mistyped_activity_is_json_error() {
        let body = json!({ "data": { "testActivity": { "lastDay": "yesterday" } } });
        assert!(matches!(decode(body).unwrap_err(), FetchError::Json(_)));
    }

    #[test]
    fn local_date_uses_given_zone() {
        let late_evening = millis(2024, 6, 10, 23);
        assert_eq!(local_date(late_evening, &Utc), Some(day(2024, 6, 10)));
        let tokyo = chrono::FixedOffset::east_opt(9 * 3600).unwrap();
        assert_eq!(local_date(late_evening, &tokyo), Some(day(2024, 6, 11)));
    }
}
