use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};

use super::users::{fetch_user, write_user};
use super::{Database, date_str};
use crate::Error;
use crate::admin_logs::{
    AdminLogEntry, FETCH_WINDOW, LogDetail, LogFilter, LogPage, LogSelection, count_sql,
    merge_feeds, select_sql,
};
use crate::models::{
    ActivityPoint, AdminStats, LogKind, Pagination, RecentActivity, User, UserDetail,
    UserLogCounts, UserSummary,
};
use crate::profile::{ProfileUpdate, Recompute, reconcile};

pub const DEFAULT_USER_PAGE: i64 = 20;

impl Database {
    fn count(&self, sql: &str, params: impl rusqlite::Params) -> Result<i64> {
        self.conn
            .query_row(sql, params, |row| row.get(0))
            .with_context(|| format!("Count query failed: {sql}"))
    }

    /// Dashboard numbers relative to `today`.
    pub fn admin_stats(&self, today: NaiveDate) -> Result<AdminStats> {
        let since = |days: u64| {
            date_str(
                today
                    .checked_sub_days(chrono::Days::new(days))
                    .unwrap_or(today),
            )
        };

        let mut stmt = self.conn.prepare(
            "SELECT date, COUNT(DISTINCT user_id) FROM daily_logs
             WHERE date >= ?1 GROUP BY date ORDER BY date",
        )?;
        let activity_data = stmt
            .query_map(params![since(7)], |row| {
                Ok(ActivityPoint {
                    date: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AdminStats {
            total_users: self.count("SELECT COUNT(*) FROM users WHERE is_admin = 0", [])?,
            active_users: self.count(
                "SELECT COUNT(DISTINCT user_id) FROM daily_logs WHERE date >= ?1",
                params![since(30)],
            )?,
            total_foods: self.count("SELECT COUNT(*) FROM foods", [])?,
            total_logs: self.count("SELECT COUNT(*) FROM daily_logs", [])?,
            today_logs: self.count(
                "SELECT COUNT(*) FROM daily_logs WHERE date = ?1",
                params![date_str(today)],
            )?,
            activity_data,
        })
    }

    /// Non-admin users, newest first, with the total count.
    pub fn admin_list_users(&self, page: Pagination) -> Result<(Vec<UserSummary>, i64)> {
        let total = self.count("SELECT COUNT(*) FROM users WHERE is_admin = 0", [])?;
        let mut stmt = self.conn.prepare(
            "SELECT id, email, name, age, gender, weight, target_weight, goal, daily_calories, created_at
             FROM users WHERE is_admin = 0
             ORDER BY created_at DESC, id DESC
             LIMIT ?1 OFFSET ?2",
        )?;
        let users = stmt
            .query_map(params![page.limit, page.offset()], |row| {
                Ok(UserSummary {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    name: row.get(2)?,
                    age: row.get(3)?,
                    gender: row.get(4)?,
                    weight: row.get(5)?,
                    target_weight: row.get(6)?,
                    goal: row.get(7)?,
                    daily_calories: row.get(8)?,
                    created_at: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok((users, total))
    }

    pub fn admin_get_user(&self, id: i64) -> Result<UserDetail> {
        let user = self.get_user(id)?;
        let per_table = |kind: LogKind| {
            self.count(
                &format!("SELECT COUNT(*) FROM {} WHERE user_id = ?1", kind.table()),
                params![id],
            )
        };
        let stats = UserLogCounts {
            total_logs: per_table(LogKind::Daily)?,
            total_water: per_table(LogKind::Water)?,
            total_exercises: per_table(LogKind::Exercise)?,
            total_weights: per_table(LogKind::Weight)?,
        };

        let mut stmt = self.conn.prepare(
            "SELECT date, COALESCE(SUM(calories), 0.0), COUNT(*) FROM daily_logs
             WHERE user_id = ?1 GROUP BY date ORDER BY date DESC LIMIT 7",
        )?;
        let recent_activities = stmt
            .query_map(params![id], |row| {
                Ok(RecentActivity {
                    date: row.get(0)?,
                    total_calories: row.get(1)?,
                    meal_count: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(UserDetail {
            user,
            stats,
            recent_activities,
        })
    }

    fn find_regular_user(&self, id: i64) -> Result<User> {
        let user = fetch_user(&self.conn, id)?;
        if user.is_admin {
            return Err(Error::not_found("User not found").into());
        }
        Ok(user)
    }

    /// Reconciler-driven edit of a non-admin account.
    pub fn admin_update_user(&self, id: i64, update: &ProfileUpdate) -> Result<(User, Recompute)> {
        if update.is_empty() {
            return Err(Error::validation("No fields to update").into());
        }
        update.validate()?;
        let tx = self.conn.unchecked_transaction()?;
        let existing = self.find_regular_user(id)?;
        let (merged, outcome) = reconcile(&existing, update).map_err(Error::from)?;
        write_user(&tx, &merged)?;
        tx.commit()?;
        Ok((merged, outcome))
    }

    /// Remove a non-admin user and everything they own.
    pub fn admin_delete_user(&self, id: i64) -> Result<()> {
        self.find_regular_user(id)?;
        let tx = self.conn.unchecked_transaction()?;
        for kind in LogKind::ALL {
            tx.execute(
                &format!("DELETE FROM {} WHERE user_id = ?1", kind.table()),
                params![id],
            )?;
        }
        tx.execute("DELETE FROM favorite_foods WHERE user_id = ?1", params![id])?;
        tx.execute("DELETE FROM users WHERE id = ?1", params![id])
            .context("Failed to delete user")?;
        tx.commit()?;
        Ok(())
    }

    // --- Admin log feed ---

    fn fetch_log_feed(
        &self,
        kind: LogKind,
        filter: &LogFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AdminLogEntry>> {
        let (where_clause, mut values) = filter.where_clause("l");
        values.push(Value::Integer(limit));
        values.push(Value::Integer(offset));
        let mut stmt = self.conn.prepare(&select_sql(kind, &where_clause))?;
        let entries = stmt
            .query_map(params_from_iter(values), |row| log_entry_from_row(kind, row))?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to read {} logs", kind.as_str()))?;
        Ok(entries)
    }

    fn count_log_feed(&self, kind: LogKind, filter: &LogFilter) -> Result<i64> {
        let (where_clause, values) = filter.where_clause("l");
        self.count(&count_sql(kind, &where_clause), params_from_iter(values))
    }

    /// One page of the admin log feed. A single table pages in SQL; the
    /// combined feed merges the newest [`FETCH_WINDOW`] rows of each table.
    pub fn admin_logs(
        &self,
        selection: LogSelection,
        filter: &LogFilter,
        page: Pagination,
    ) -> Result<LogPage> {
        let (logs, total) = match selection {
            LogSelection::Only(kind) => (
                self.fetch_log_feed(kind, filter, page.limit, page.offset())?,
                self.count_log_feed(kind, filter)?,
            ),
            LogSelection::All => {
                let mut feeds = Vec::new();
                let mut total = 0;
                for kind in LogKind::ALL {
                    feeds.push(self.fetch_log_feed(kind, filter, FETCH_WINDOW, 0)?);
                    total += self.count_log_feed(kind, filter)?;
                }
                let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
                let limit = usize::try_from(page.limit).unwrap_or(0);
                (merge_feeds(feeds, offset, limit), total)
            }
        };
        Ok(LogPage {
            logs,
            total,
            pagination: page,
        })
    }
}

fn log_entry_from_row(kind: LogKind, row: &rusqlite::Row) -> rusqlite::Result<AdminLogEntry> {
    let detail = match kind {
        LogKind::Daily => LogDetail::Daily {
            meal_type: row.get(6)?,
            food_name: row.get(7)?,
            calories: row.get(8)?,
            protein: row.get(9)?,
            carbs: row.get(10)?,
            fat: row.get(11)?,
            quantity: row.get(12)?,
        },
        LogKind::Water => LogDetail::Water { amount: row.get(6)? },
        LogKind::Exercise => LogDetail::Exercise {
            exercise_name: row.get(6)?,
            duration: row.get(7)?,
            calories_burned: row.get(8)?,
        },
        LogKind::Weight => LogDetail::Weight { weight: row.get(6)? },
    };
    Ok(AdminLogEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        email: row.get(2)?,
        name: row.get(3)?,
        date: row.get(4)?,
        created_at: row.get(5)?,
        detail,
    })
}
