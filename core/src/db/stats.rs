use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use rusqlite::params;

use super::{Database, date_str};
use crate::aggregate::{
    MonthlySummary, RangeSummary, Totals, date_range, summarize_range, top_foods,
};

pub const WEEK_DAYS: u32 = 7;
pub const MONTH_DAYS: u32 = 30;
pub const TOP_FOODS: usize = 10;

fn days_before(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(date)
}

impl Database {
    /// Per-date sums over `[from, to]` for every log category.
    pub fn totals_by_date(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<HashMap<String, Totals>> {
        let (from, to) = (date_str(from), date_str(to));
        let mut by_date: HashMap<String, Totals> = HashMap::new();

        let mut stmt = self.conn.prepare(
            "SELECT date, COALESCE(SUM(calories), 0.0), COALESCE(SUM(protein), 0.0),
                    COALESCE(SUM(carbs), 0.0), COALESCE(SUM(fat), 0.0)
             FROM daily_logs WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             GROUP BY date",
        )?;
        let rows = stmt.query_map(params![user_id, from, to], |row| {
            Ok((
                row.get::<_, String>(0)?,
                Totals {
                    calories: row.get(1)?,
                    protein: row.get(2)?,
                    carbs: row.get(3)?,
                    fat: row.get(4)?,
                    ..Default::default()
                },
            ))
        })?;
        for row in rows {
            let (date, totals) = row.context("Failed to read food totals")?;
            by_date.entry(date).or_default().add(&totals);
        }

        let mut stmt = self.conn.prepare(
            "SELECT date, COALESCE(SUM(amount), 0.0)
             FROM water_logs WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             GROUP BY date",
        )?;
        let rows = stmt.query_map(params![user_id, from, to], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;
        for row in rows {
            let (date, water) = row.context("Failed to read water totals")?;
            by_date.entry(date).or_default().water += water;
        }

        let mut stmt = self.conn.prepare(
            "SELECT date, COALESCE(SUM(calories_burned), 0.0)
             FROM exercise_logs WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             GROUP BY date",
        )?;
        let rows = stmt.query_map(params![user_id, from, to], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;
        for row in rows {
            let (date, burned) = row.context("Failed to read exercise totals")?;
            by_date.entry(date).or_default().exercise_calories += burned;
        }

        Ok(by_date)
    }

    /// The seven days before `today`, zero-filled, with seven-day averages.
    pub fn weekly_statistics(&self, user_id: i64, today: NaiveDate) -> Result<RangeSummary> {
        let range = date_range(days_before(today, WEEK_DAYS), WEEK_DAYS);
        let by_date = match (range.first(), range.last()) {
            (Some(first), Some(last)) => self.totals_by_date(user_id, *first, *last)?,
            _ => HashMap::new(),
        };
        Ok(summarize_range(&range, &by_date))
    }

    /// Thirty days from `today - 30`, their average calories, and the foods
    /// contributing the most calories from the start date through `today`.
    pub fn monthly_statistics(&self, user_id: i64, today: NaiveDate) -> Result<MonthlySummary> {
        let start = days_before(today, MONTH_DAYS);
        let range = date_range(start, MONTH_DAYS);
        let by_date = self.totals_by_date(user_id, start, today)?;
        let summary = summarize_range(&range, &by_date);

        let mut stmt = self.conn.prepare(
            "SELECT food_name, calories FROM daily_logs
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![user_id, date_str(start), date_str(today)], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MonthlySummary {
            average_calories: summary.averages.calories,
            daily_stats: summary.daily_stats,
            top_foods: top_foods(&rows, TOP_FOODS),
        })
    }
}
