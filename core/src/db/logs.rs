use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::params;
use tracing::debug;

use super::users::{fetch_user, write_user};
use super::{Database, date_str, now_timestamp, today};
use crate::Error;
use crate::aggregate::Totals;
use crate::models::{
    DEFAULT_WATER_ML, DailyLog, DaySheet, ExerciseLog, LogKind, NewDailyLog, NewExerciseLog,
    WaterLog, WeightLog, WeightPoint,
};
use crate::profile::{ProfileUpdate, ReconcileError, reconcile};

const DAILY_COLUMNS: &str = "id, user_id, date, meal_type, food_id, food_name, calories, protein,
     carbs, fat, quantity, created_at";

fn scaled(value: Option<f64>, quantity: f64) -> Option<f64> {
    value.map(|v| v * quantity)
}

impl Database {
    // --- Food logs ---

    /// Log a food entry. With a `food_id`, snapshot fields the caller left
    /// out are copied from the food scaled by quantity.
    pub fn add_daily_log(&self, user_id: i64, entry: &NewDailyLog) -> Result<DailyLog> {
        fetch_user(&self.conn, user_id)?;
        let quantity = entry.quantity.unwrap_or(1.0);
        if quantity <= 0.0 {
            return Err(Error::validation("quantity must be positive").into());
        }

        let mut snapshot = entry.clone();
        if let Some(food_id) = entry.food_id {
            let food = self.get_food(food_id)?;
            snapshot.food_name = snapshot.food_name.or(Some(food.name));
            snapshot.calories = snapshot.calories.or(Some(food.calories * quantity));
            snapshot.protein = snapshot.protein.or(scaled(food.protein, quantity));
            snapshot.carbs = snapshot.carbs.or(scaled(food.carbs, quantity));
            snapshot.fat = snapshot.fat.or(scaled(food.fat, quantity));
        } else if snapshot.calories.is_none() {
            return Err(Error::validation("calories is required when no food_id is given").into());
        }
        if snapshot.calories.is_some_and(|c| c < 0.0) {
            return Err(Error::validation("calories must not be negative").into());
        }

        let date = date_str(entry.date.unwrap_or_else(today));
        self.conn
            .execute(
                "INSERT INTO daily_logs (user_id, date, meal_type, food_id, food_name, calories,
                                         protein, carbs, fat, quantity, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    user_id,
                    date,
                    snapshot.meal_type,
                    snapshot.food_id,
                    snapshot.food_name,
                    snapshot.calories,
                    snapshot.protein,
                    snapshot.carbs,
                    snapshot.fat,
                    quantity,
                    now_timestamp(),
                ],
            )
            .context("Failed to insert daily log")?;
        let id = self.conn.last_insert_rowid();
        self.conn
            .query_row(
                &format!("SELECT {DAILY_COLUMNS} FROM daily_logs WHERE id = ?1"),
                params![id],
                daily_log_from_row,
            )
            .context("Daily log not found after insert")
    }

    /// Food logs, exercises and totals for one date.
    pub fn get_day_sheet(&self, user_id: i64, date: NaiveDate) -> Result<DaySheet> {
        let date = date_str(date);

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DAILY_COLUMNS} FROM daily_logs WHERE user_id = ?1 AND date = ?2
             ORDER BY created_at, id"
        ))?;
        let logs = stmt
            .query_map(params![user_id, date], daily_log_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, date, exercise_name, duration, calories_burned, created_at
             FROM exercise_logs WHERE user_id = ?1 AND date = ?2 ORDER BY created_at, id",
        )?;
        let exercises = stmt
            .query_map(params![user_id, date], exercise_log_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut totals = Totals::default();
        for log in &logs {
            totals.calories += log.calories.unwrap_or(0.0);
            totals.protein += log.protein.unwrap_or(0.0);
            totals.carbs += log.carbs.unwrap_or(0.0);
            totals.fat += log.fat.unwrap_or(0.0);
        }
        totals.exercise_calories = exercises
            .iter()
            .filter_map(|e| e.calories_burned)
            .sum();
        totals.water = self.conn.query_row(
            "SELECT COALESCE(SUM(amount), 0.0) FROM water_logs WHERE user_id = ?1 AND date = ?2",
            params![user_id, date],
            |row| row.get(0),
        )?;

        Ok(DaySheet {
            date,
            logs,
            exercises,
            totals,
        })
    }

    // --- Water, exercise ---

    pub fn add_water(&self, user_id: i64, date: Option<NaiveDate>, amount: Option<f64>) -> Result<WaterLog> {
        fetch_user(&self.conn, user_id)?;
        let amount = amount.unwrap_or(DEFAULT_WATER_ML);
        if amount <= 0.0 {
            return Err(Error::validation("amount must be positive").into());
        }
        let created_at = now_timestamp();
        let date = date_str(date.unwrap_or_else(today));
        self.conn
            .execute(
                "INSERT INTO water_logs (user_id, date, amount, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, date, amount, created_at],
            )
            .context("Failed to insert water log")?;
        Ok(WaterLog {
            id: self.conn.last_insert_rowid(),
            user_id,
            date,
            amount: Some(amount),
            created_at,
        })
    }

    pub fn add_exercise(&self, user_id: i64, entry: &NewExerciseLog) -> Result<ExerciseLog> {
        fetch_user(&self.conn, user_id)?;
        if entry.duration.is_some_and(|d| d < 0) {
            return Err(Error::validation("duration must not be negative").into());
        }
        if entry.calories_burned.is_some_and(|c| c < 0.0) {
            return Err(Error::validation("calories_burned must not be negative").into());
        }
        let created_at = now_timestamp();
        let date = date_str(entry.date.unwrap_or_else(today));
        self.conn
            .execute(
                "INSERT INTO exercise_logs (user_id, date, exercise_name, duration, calories_burned, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user_id,
                    date,
                    entry.exercise_name,
                    entry.duration,
                    entry.calories_burned,
                    created_at,
                ],
            )
            .context("Failed to insert exercise log")?;
        Ok(ExerciseLog {
            id: self.conn.last_insert_rowid(),
            user_id,
            date,
            exercise_name: entry.exercise_name.clone(),
            duration: entry.duration,
            calories_burned: entry.calories_burned,
            created_at,
        })
    }

    // --- Weight ---

    /// Record a weigh-in and make it the user's current weight. Derived
    /// targets follow when the rest of the profile allows a recompute.
    pub fn add_weight(&self, user_id: i64, date: Option<NaiveDate>, weight: f64) -> Result<WeightLog> {
        if weight <= 0.0 {
            return Err(Error::validation("weight must be positive").into());
        }
        let created_at = now_timestamp();
        let date = date_str(date.unwrap_or_else(today));

        let tx = self.conn.unchecked_transaction()?;
        let existing = fetch_user(&tx, user_id)?;
        tx.execute(
            "INSERT INTO weight_logs (user_id, date, weight, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, date, weight, created_at],
        )
        .context("Failed to insert weight log")?;
        let id = tx.last_insert_rowid();

        let update = ProfileUpdate {
            weight: Some(weight),
            ..Default::default()
        };
        let user = match reconcile(&existing, &update) {
            Ok((merged, _)) => merged,
            Err(ReconcileError::MissingInputs { fields }) => {
                debug!(user_id, ?fields, "weight logged without full profile, targets not recomputed");
                let mut user = existing;
                user.weight = Some(weight);
                user
            }
        };
        write_user(&tx, &user)?;
        tx.commit()?;

        Ok(WeightLog {
            id,
            user_id,
            date,
            weight,
            created_at,
        })
    }

    pub fn weight_history(&self, user_id: i64) -> Result<Vec<WeightPoint>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, weight FROM weight_logs WHERE user_id = ?1 ORDER BY date ASC, id ASC",
        )?;
        let points = stmt
            .query_map(params![user_id], |row| {
                Ok(WeightPoint {
                    date: row.get(0)?,
                    weight: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(points)
    }

    // --- Deletion ---

    /// Delete one of the caller's own log rows.
    pub fn delete_log(&self, user_id: i64, kind: LogKind, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute(
                &format!("DELETE FROM {} WHERE id = ?1 AND user_id = ?2", kind.table()),
                params![id, user_id],
            )
            .with_context(|| format!("Failed to delete {} log", kind.as_str()))?;
        if rows == 0 {
            return Err(Error::not_found(format!("{} log not found", kind.as_str())).into());
        }
        Ok(())
    }
}

fn daily_log_from_row(row: &rusqlite::Row) -> rusqlite::Result<DailyLog> {
    Ok(DailyLog {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: row.get(2)?,
        meal_type: row.get(3)?,
        food_id: row.get(4)?,
        food_name: row.get(5)?,
        calories: row.get(6)?,
        protein: row.get(7)?,
        carbs: row.get(8)?,
        fat: row.get(9)?,
        quantity: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn exercise_log_from_row(row: &rusqlite::Row) -> rusqlite::Result<ExerciseLog> {
    Ok(ExerciseLog {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: row.get(2)?,
        exercise_name: row.get(3)?,
        duration: row.get(4)?,
        calories_burned: row.get(5)?,
        created_at: row.get(6)?,
    })
}
