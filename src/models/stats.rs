//! Weekly record aggregates for the "my records" view.
//!
//! Computed on read from a user's records: one row per day for the last
//! seven days, with running totals across the week.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::Record;

/// Days covered by the summary, today included.
pub const SUMMARY_DAYS: i64 = 7;

/// One day of the weekly summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DailyRecordSummary {
    pub date: NaiveDate,
    /// Distance run on this day (km)
    pub daily_distance_km: f64,
    /// Distance accumulated from the first day of the window up to this day (km)
    pub week_distance_km: f64,
    /// Calories accumulated from the first day of the window up to this day
    pub week_calories: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct WeeklyRecordSummary {
    pub days: Vec<DailyRecordSummary>,
}

impl WeeklyRecordSummary {
    /// Build the summary ending on `today`. Records outside the window are ignored.
    pub fn from_records(records: &[Record], today: NaiveDate) -> Self {
        let first_day = today - Duration::days(SUMMARY_DAYS - 1);

        // (meters, calories) per day
        let mut by_day: HashMap<NaiveDate, (u64, u64)> = HashMap::new();
        for record in records
            .iter()
            .filter(|r| r.running_start_date >= first_day && r.running_start_date <= today)
        {
            let totals = by_day.entry(record.running_start_date).or_insert((0, 0));
            totals.0 += record.distance_meters;
            totals.1 += record.calories;
        }

        let mut week_distance_km = 0.0;
        let mut week_calories = 0.0;
        let days = first_day
            .iter_days()
            .take(SUMMARY_DAYS as usize)
            .map(|date| {
                let (meters, calories) = by_day.get(&date).copied().unwrap_or((0, 0));
                let daily_distance_km = meters as f64 / 1000.0;
                week_distance_km += daily_distance_km;
                week_calories += calories as f64;
                DailyRecordSummary {
                    date,
                    daily_distance_km,
                    week_distance_km,
                    week_calories,
                }
            })
            .collect();

        Self { days }
    }
}
