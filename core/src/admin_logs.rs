//! One filterable, paginated feed over the four log tables.
//!
//! Table and column names only ever come from [`LogKind`]; request input
//! reaches SQL exclusively as bound parameters.

use chrono::NaiveDate;
use rusqlite::types::Value;
use serde::Serialize;

use crate::models::{DATE_FORMAT, LogKind, Pagination};

/// Rows fetched per table before merging the combined feed.
pub const FETCH_WINDOW: i64 = 200;

pub const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSelection {
    All,
    Only(LogKind),
}

impl LogSelection {
    /// Unknown or missing types select every table.
    #[must_use]
    pub fn parse(input: Option<&str>) -> Self {
        input
            .and_then(|s| LogKind::parse(s).ok())
            .map_or(Self::All, Self::Only)
    }

    #[must_use]
    pub fn kinds(self) -> Vec<LogKind> {
        match self {
            Self::All => LogKind::ALL.to_vec(),
            Self::Only(kind) => vec![kind],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub user_id: Option<i64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl LogFilter {
    /// `WHERE` body and its parameters, with columns qualified by `alias`.
    #[must_use]
    pub fn where_clause(&self, alias: &str) -> (String, Vec<Value>) {
        let mut conditions = Vec::new();
        let mut params = Vec::new();
        if let Some(user_id) = self.user_id {
            conditions.push(format!("{alias}.user_id = ?"));
            params.push(Value::Integer(user_id));
        }
        if let Some(from) = self.date_from {
            conditions.push(format!("{alias}.date >= ?"));
            params.push(Value::Text(from.format(DATE_FORMAT).to_string()));
        }
        if let Some(to) = self.date_to {
            conditions.push(format!("{alias}.date <= ?"));
            params.push(Value::Text(to.format(DATE_FORMAT).to_string()));
        }
        if conditions.is_empty() {
            ("1=1".to_string(), params)
        } else {
            (conditions.join(" AND "), params)
        }
    }
}

fn detail_columns(kind: LogKind) -> &'static str {
    match kind {
        LogKind::Daily => "l.meal_type, l.food_name, l.calories, l.protein, l.carbs, l.fat, l.quantity",
        LogKind::Water => "l.amount",
        LogKind::Exercise => "l.exercise_name, l.duration, l.calories_burned",
        LogKind::Weight => "l.weight",
    }
}

/// Newest-first page of one table joined with its owner. The first six
/// columns are shared by every kind; detail columns follow. Binds the
/// filter parameters, then `LIMIT` and `OFFSET`.
#[must_use]
pub fn select_sql(kind: LogKind, where_clause: &str) -> String {
    format!(
        "SELECT l.id, l.user_id, u.email, u.name, l.date, l.created_at, {}
         FROM {} l
         LEFT JOIN users u ON l.user_id = u.id
         WHERE {where_clause}
         ORDER BY l.created_at DESC, l.id DESC
         LIMIT ? OFFSET ?",
        detail_columns(kind),
        kind.table(),
    )
}

#[must_use]
pub fn count_sql(kind: LogKind, where_clause: &str) -> String {
    format!("SELECT COUNT(*) FROM {} l WHERE {where_clause}", kind.table())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "log_type", rename_all = "snake_case")]
pub enum LogDetail {
    Daily {
        meal_type: Option<String>,
        food_name: Option<String>,
        calories: Option<f64>,
        protein: Option<f64>,
        carbs: Option<f64>,
        fat: Option<f64>,
        quantity: Option<f64>,
    },
    Water {
        amount: Option<f64>,
    },
    Exercise {
        exercise_name: Option<String>,
        duration: Option<i64>,
        calories_burned: Option<f64>,
    },
    Weight {
        weight: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminLogEntry {
    pub id: i64,
    pub user_id: i64,
    pub email: Option<String>,
    pub name: Option<String>,
    pub date: String,
    pub created_at: String,
    #[serde(flatten)]
    pub detail: LogDetail,
}

impl AdminLogEntry {
    #[must_use]
    pub fn kind(&self) -> LogKind {
        match self.detail {
            LogDetail::Daily { .. } => LogKind::Daily,
            LogDetail::Water { .. } => LogKind::Water,
            LogDetail::Exercise { .. } => LogKind::Exercise,
            LogDetail::Weight { .. } => LogKind::Weight,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogPage {
    pub logs: Vec<AdminLogEntry>,
    /// For the combined feed this is the sum of per-table counts, which can
    /// exceed what pages reach once a table has more than [`FETCH_WINDOW`]
    /// matching rows.
    pub total: i64,
    #[serde(flatten)]
    pub pagination: Pagination,
}

/// Concatenate per-table feeds, order by `created_at` descending and cut
/// out one page. Equal timestamps keep concatenation order.
#[must_use]
pub fn merge_feeds(feeds: Vec<Vec<AdminLogEntry>>, offset: usize, limit: usize) -> Vec<AdminLogEntry> {
    let mut merged: Vec<AdminLogEntry> = feeds.into_iter().flatten().collect();
    merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    merged.into_iter().skip(offset).take(limit).collect()
}
