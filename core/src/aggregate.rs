//! Per-day totals, range averages and top foods.
//!
//! The SQL side only groups rows by date; zero-filling, averaging and
//! ranking happen here so they can be tested without a database.

use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::metabolic::round2;
use crate::models::DATE_FORMAT;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub water: f64,
    pub exercise_calories: f64,
}

impl Totals {
    pub fn add(&mut self, other: &Totals) {
        self.calories += other.calories;
        self.protein += other.protein;
        self.carbs += other.carbs;
        self.fat += other.fat;
        self.water += other.water;
        self.exercise_calories += other.exercise_calories;
    }

    #[must_use]
    fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            calories: f(self.calories),
            protein: f(self.protein),
            carbs: f(self.carbs),
            fat: f(self.fat),
            water: f(self.water),
            exercise_calories: f(self.exercise_calories),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayStats {
    pub date: String,
    #[serde(flatten)]
    pub totals: Totals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeSummary {
    pub daily_stats: Vec<DayStats>,
    pub averages: Totals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopFood {
    pub food_name: Option<String>,
    pub total_calories: f64,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySummary {
    pub daily_stats: Vec<DayStats>,
    pub average_calories: f64,
    pub top_foods: Vec<TopFood>,
}

/// `days` consecutive dates beginning at `start`.
#[must_use]
pub fn date_range(start: NaiveDate, days: u32) -> Vec<NaiveDate> {
    (0..days)
        .filter_map(|i| start.checked_add_days(Days::new(u64::from(i))))
        .collect()
}

/// One entry per date in `range`, in order; dates without rows are all zero.
#[must_use]
pub fn zero_fill(range: &[NaiveDate], by_date: &HashMap<String, Totals>) -> Vec<DayStats> {
    range
        .iter()
        .map(|date| {
            let key = date.format(DATE_FORMAT).to_string();
            let totals = by_date.get(&key).copied().unwrap_or_default();
            DayStats { date: key, totals }
        })
        .collect()
}

/// Arithmetic mean over every day in the range, empty days included.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average(days: &[DayStats]) -> Totals {
    if days.is_empty() {
        return Totals::default();
    }
    let mut sum = Totals::default();
    for day in days {
        sum.add(&day.totals);
    }
    let len = days.len() as f64;
    sum.map(|v| round2(v / len))
}

#[must_use]
pub fn summarize_range(range: &[NaiveDate], by_date: &HashMap<String, Totals>) -> RangeSummary {
    let daily_stats = zero_fill(range, by_date);
    let averages = average(&daily_stats);
    RangeSummary {
        daily_stats,
        averages,
    }
}

/// Group `(food_name, calories)` rows by name and keep the `n` largest
/// calorie sums. Rows must arrive in storage order; equal sums keep the
/// order in which their name first appeared.
#[must_use]
pub fn top_foods(rows: &[(Option<String>, Option<f64>)], n: usize) -> Vec<TopFood> {
    let mut index: HashMap<Option<&str>, usize> = HashMap::new();
    let mut groups: Vec<TopFood> = Vec::new();
    for (name, calories) in rows {
        let slot = *index.entry(name.as_deref()).or_insert_with(|| {
            groups.push(TopFood {
                food_name: name.clone(),
                total_calories: 0.0,
                count: 0,
            });
            groups.len() - 1
        });
        groups[slot].total_calories += calories.unwrap_or(0.0);
        groups[slot].count += 1;
    }
    groups.sort_by(|a, b| b.total_calories.total_cmp(&a.total_calories));
    groups.truncate(n);
    for group in &mut groups {
        group.total_calories = round2(group.total_calories);
    }
    groups
}
