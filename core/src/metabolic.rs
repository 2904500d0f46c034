//! Energy and macro targets from body metrics.
//!
//! Every function here is pure and total: malformed activity or goal strings
//! fall back to a documented default instead of failing.

use serde::{Deserialize, Serialize};

/// Round to two decimals, ties to even.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Anything that is not recognised as male uses the female constant.
    #[must_use]
    pub fn from_input(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "male" | "erkek" | "m" => Self::Male,
            _ => Self::Female,
        }
    }

    fn bmr_constant(self) -> f64 {
        match self {
            Self::Male => 5.0,
            Self::Female => -161.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

impl ActivityLevel {
    pub const ALL: [Self; 5] = [
        Self::Sedentary,
        Self::Light,
        Self::Moderate,
        Self::Active,
        Self::VeryActive,
    ];

    /// Unknown or empty levels map to `Sedentary`.
    #[must_use]
    pub fn from_input(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "light" => Self::Light,
            "moderate" => Self::Moderate,
            "active" => Self::Active,
            "very_active" => Self::VeryActive,
            _ => Self::Sedentary,
        }
    }

    #[must_use]
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Sedentary => 1.2,
            Self::Light => 1.375,
            Self::Moderate => 1.55,
            Self::Active => 1.725,
            Self::VeryActive => 1.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    Lose,
    Gain,
    Maintain,
}

const LOSS_KEYWORDS: &[&str] = &["kilo verme", "weight loss", "weight_loss"];
const GAIN_KEYWORDS: &[&str] = &["kilo alma", "weight gain", "weight_gain"];

impl Goal {
    /// Case-insensitive keyword match; anything else is `Maintain`.
    #[must_use]
    pub fn from_input(input: &str) -> Self {
        let lower = input.trim().to_lowercase();
        if LOSS_KEYWORDS.contains(&lower.as_str()) {
            Self::Lose
        } else if GAIN_KEYWORDS.contains(&lower.as_str()) {
            Self::Gain
        } else {
            Self::Maintain
        }
    }

    /// Daily calorie offset applied to TDEE.
    #[must_use]
    pub fn calorie_adjustment(self) -> f64 {
        match self {
            Self::Lose => -500.0,
            Self::Gain => 500.0,
            Self::Maintain => 0.0,
        }
    }
}

/// Mifflin-St Jeor basal metabolic rate.
#[must_use]
pub fn compute_bmr(weight_kg: f64, height_cm: f64, age_years: f64, sex: Sex) -> f64 {
    round2(10.0 * weight_kg + 6.25 * height_cm - 5.0 * age_years + sex.bmr_constant())
}

#[must_use]
pub fn compute_tdee(bmr: f64, activity: ActivityLevel) -> f64 {
    round2(bmr * activity.multiplier())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroTargets {
    pub daily_calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

/// Split goal-adjusted calories 30/40/30 into protein, carbs and fat grams.
///
/// `weight_kg` does not affect the split today; it is accepted so a
/// weight-based protein rule can replace the percentage split without
/// touching callers.
#[must_use]
pub fn compute_macros(tdee: f64, goal: Goal, _weight_kg: f64) -> MacroTargets {
    let calories = tdee + goal.calorie_adjustment();
    MacroTargets {
        daily_calories: round2(calories),
        protein_g: round2(calories * 0.30 / 4.0),
        carbs_g: round2(calories * 0.40 / 4.0),
        fat_g: round2(calories * 0.30 / 9.0),
    }
}

/// The complete set of inputs for a full recompute.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyMetrics {
    pub weight_kg: f64,
    pub height_cm: f64,
    pub age_years: f64,
    pub sex: Sex,
    pub activity: ActivityLevel,
    pub goal: Goal,
}

/// Everything stored on a user that is derived from [`BodyMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedFields {
    pub bmr: f64,
    pub tdee: f64,
    pub macros: MacroTargets,
}

#[must_use]
pub fn derive_all(metrics: &BodyMetrics) -> DerivedFields {
    let bmr = compute_bmr(
        metrics.weight_kg,
        metrics.height_cm,
        metrics.age_years,
        metrics.sex,
    );
    let tdee = compute_tdee(bmr, metrics.activity);
    let macros = compute_macros(tdee, metrics.goal, metrics.weight_kg);
    DerivedFields { bmr, tdee, macros }
}
