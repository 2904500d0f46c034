use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::aggregate::Totals;
use crate::metabolic::{ActivityLevel, BodyMetrics, Goal, Sex};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DEFAULT_FOOD_CATEGORY: &str = "Other";
pub const DEFAULT_WATER_ML: f64 = 250.0;

// --- Users ---

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub target_weight: Option<f64>,
    pub activity_level: Option<String>,
    pub goal: Option<String>,
    pub bmr: Option<f64>,
    pub tdee: Option<f64>,
    pub daily_calories: Option<f64>,
    pub daily_protein: Option<f64>,
    pub daily_carbs: Option<f64>,
    pub daily_fat: Option<f64>,
    pub is_admin: bool,
    pub created_at: String,
}

impl User {
    /// Full recompute inputs, if weight, height, age and gender are all known.
    /// Non-positive measurements and a blank gender count as unknown.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn body_metrics(&self) -> Option<BodyMetrics> {
        Some(BodyMetrics {
            weight_kg: self.weight.filter(|w| *w > 0.0)?,
            height_cm: self.height.filter(|h| *h > 0.0)?,
            age_years: self.age.filter(|a| *a > 0)? as f64,
            sex: Sex::from_input(self.gender.as_deref().filter(|g| !g.trim().is_empty())?),
            activity: ActivityLevel::from_input(self.activity_level.as_deref().unwrap_or("")),
            goal: Goal::from_input(self.goal.as_deref().unwrap_or("")),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub target_weight: Option<f64>,
    pub activity_level: Option<String>,
    pub goal: Option<String>,
    pub is_admin: bool,
}

// --- Foods ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Food {
    pub id: i64,
    pub name: String,
    pub calories: f64,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub serving_size: Option<String>,
    pub barcode: Option<String>,
    pub category: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewFood {
    pub name: String,
    pub calories: f64,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub serving_size: Option<String>,
    pub barcode: Option<String>,
    pub category: Option<String>,
}

/// Name must not be empty, calories and macros must not be negative.
pub fn validate_food(food: &NewFood) -> Result<()> {
    if food.name.trim().is_empty() {
        return Err(Error::validation("Food name must not be empty").into());
    }
    if food.calories < 0.0 {
        return Err(Error::validation("calories must not be negative").into());
    }
    for (label, value) in [
        ("protein", food.protein),
        ("carbs", food.carbs),
        ("fat", food.fat),
    ] {
        if value.is_some_and(|v| v < 0.0) {
            return Err(Error::validation(format!("{label} must not be negative")).into());
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct FavoriteFood {
    pub favorite_id: i64,
    pub favorited_at: String,
    #[serde(flatten)]
    pub food: Food,
}

#[derive(Debug, Clone, Serialize)]
pub struct FoodListing {
    pub foods: Vec<Food>,
    pub categories: Vec<String>,
}

// --- Logs ---

/// The four log tables. The table and column names used in SQL come only
/// from this type, never from request input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Daily,
    Water,
    Exercise,
    Weight,
}

impl LogKind {
    pub const ALL: [Self; 4] = [Self::Daily, Self::Water, Self::Exercise, Self::Weight];

    #[must_use]
    pub fn table(self) -> &'static str {
        match self {
            Self::Daily => "daily_logs",
            Self::Water => "water_logs",
            Self::Exercise => "exercise_logs",
            Self::Weight => "weight_logs",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Water => "water",
            Self::Exercise => "exercise",
            Self::Weight => "weight",
        }
    }

    pub fn parse(input: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == input.to_lowercase())
            .ok_or_else(|| {
                Error::validation(format!(
                    "Invalid log type '{input}'. Must be one of: daily, water, exercise, weight"
                ))
                .into()
            })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyLog {
    pub id: i64,
    pub user_id: i64,
    pub date: String,
    pub meal_type: Option<String>,
    pub food_id: Option<i64>,
    pub food_name: Option<String>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub quantity: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewDailyLog {
    pub date: Option<NaiveDate>,
    pub meal_type: Option<String>,
    pub food_id: Option<i64>,
    pub food_name: Option<String>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub quantity: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WaterLog {
    pub id: i64,
    pub user_id: i64,
    pub date: String,
    pub amount: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExerciseLog {
    pub id: i64,
    pub user_id: i64,
    pub date: String,
    pub exercise_name: Option<String>,
    pub duration: Option<i64>,
    pub calories_burned: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewExerciseLog {
    pub date: Option<NaiveDate>,
    pub exercise_name: Option<String>,
    pub duration: Option<i64>,
    pub calories_burned: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeightLog {
    pub id: i64,
    pub user_id: i64,
    pub date: String,
    pub weight: f64,
    pub created_at: String,
}

/// Everything logged on one date, with its totals.
#[derive(Debug, Clone, Serialize)]
pub struct DaySheet {
    pub date: String,
    pub logs: Vec<DailyLog>,
    pub exercises: Vec<ExerciseLog>,
    pub totals: Totals,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeightPoint {
    pub date: String,
    pub weight: f64,
}

// --- Admin types ---

#[derive(Debug, Clone, Serialize)]
pub struct ActivityPoint {
    pub date: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminStats {
    pub total_users: i64,
    pub active_users: i64,
    pub total_foods: i64,
    pub total_logs: i64,
    pub today_logs: i64,
    pub activity_data: Vec<ActivityPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub weight: Option<f64>,
    pub target_weight: Option<f64>,
    pub goal: Option<String>,
    pub daily_calories: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[allow(clippy::struct_field_names)]
pub struct UserLogCounts {
    pub total_logs: i64,
    pub total_water: i64,
    pub total_exercises: i64,
    pub total_weights: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentActivity {
    pub date: String,
    pub total_calories: f64,
    pub meal_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
    pub user: User,
    pub stats: UserLogCounts,
    pub recent_activities: Vec<RecentActivity>,
}

// --- Pagination ---

pub const MAX_PAGE_LIMIT: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    /// Page starts at 1; limit is clamped to `1..=MAX_PAGE_LIMIT`.
    #[must_use]
    pub fn new(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_LIMIT),
        }
    }

    /// Saturates for pages far past the end, which then select nothing.
    #[must_use]
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

// --- Validation helpers ---

pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input, DATE_FORMAT).map_err(|_| {
        Error::validation(format!("Invalid date '{input}'. Use YYYY-MM-DD")).into()
    })
}

/// Both fields are required and must be non-blank.
pub fn validate_credentials(email: Option<&str>, password: Option<&str>) -> Result<(String, String)> {
    match (
        email.map(str::trim).filter(|e| !e.is_empty()),
        password.filter(|p| !p.is_empty()),
    ) {
        (Some(email), Some(password)) => Ok((email.to_lowercase(), password.to_string())),
        _ => Err(Error::validation("Email and password are required").into()),
    }
}
