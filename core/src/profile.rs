//! Partial profile updates and the derived-field recompute they trigger.
//!
//! [`reconcile`] is pure: it merges an update onto a stored [`User`] and
//! decides between a full recompute, a macro-only recompute, or none. The
//! data layer writes the merged user back in a single statement, so a
//! failed reconcile never leaves a partial write behind.

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::Error as DomainError;
use crate::metabolic::{DerivedFields, Goal, MacroTargets, compute_macros, derive_all};
use crate::models::User;

/// Distinguishes a missing field from an explicit `null`.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[allow(clippy::option_option)]
pub struct ProfileUpdate {
    #[serde(default, deserialize_with = "deserialize_some")]
    pub name: Option<Option<String>>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub target_weight: Option<Option<f64>>,
    pub activity_level: Option<String>,
    pub goal: Option<String>,
}

impl ProfileUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Any of the fields that feed BMR or TDEE.
    #[must_use]
    pub fn touches_metrics(&self) -> bool {
        self.weight.is_some()
            || self.height.is_some()
            || self.age.is_some()
            || self.gender.is_some()
            || self.activity_level.is_some()
    }

    /// Rejects values no body can have. Ranges are not checked.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.weight.is_some_and(|w| w <= 0.0) {
            return Err(DomainError::validation("weight must be positive"));
        }
        if self.height.is_some_and(|h| h <= 0.0) {
            return Err(DomainError::validation("height must be positive"));
        }
        if self.age.is_some_and(|a| a < 0) {
            return Err(DomainError::validation("age must not be negative"));
        }
        if matches!(self.target_weight, Some(Some(t)) if t <= 0.0) {
            return Err(DomainError::validation("target_weight must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Cannot recalculate targets, missing: {}", .fields.join(", "))]
    MissingInputs { fields: Vec<&'static str> },
}

impl From<ReconcileError> for DomainError {
    fn from(err: ReconcileError) -> Self {
        DomainError::Validation(err.to_string())
    }
}

/// What happened to the derived fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Recompute {
    Full(DerivedFields),
    MacrosOnly(MacroTargets),
    Unchanged,
    /// Goal changed but there was no stored TDEE or weight to split from.
    Skipped { reason: &'static str },
}

/// Merge `update` onto `existing` and recompute derived fields as needed.
pub fn reconcile(existing: &User, update: &ProfileUpdate) -> Result<(User, Recompute), ReconcileError> {
    let mut merged = existing.clone();
    if let Some(name) = &update.name {
        merged.name.clone_from(name);
    }
    if let Some(target) = update.target_weight {
        merged.target_weight = target;
    }
    if update.age.is_some() {
        merged.age = update.age;
    }
    if update.gender.is_some() {
        merged.gender.clone_from(&update.gender);
    }
    if update.height.is_some() {
        merged.height = update.height;
    }
    if update.weight.is_some() {
        merged.weight = update.weight;
    }
    if update.activity_level.is_some() {
        merged.activity_level.clone_from(&update.activity_level);
    }
    if update.goal.is_some() {
        merged.goal.clone_from(&update.goal);
    }

    let outcome = if update.touches_metrics() {
        let metrics = merged.body_metrics().ok_or_else(|| ReconcileError::MissingInputs {
            fields: missing_inputs(&merged),
        })?;
        let derived = derive_all(&metrics);
        apply_derived(&mut merged, &derived);
        Recompute::Full(derived)
    } else if let Some(goal) = &update.goal {
        match (existing.tdee, existing.weight) {
            (Some(tdee), Some(weight)) => {
                let macros = compute_macros(tdee, Goal::from_input(goal), weight);
                apply_macros(&mut merged, &macros);
                Recompute::MacrosOnly(macros)
            }
            _ => Recompute::Skipped {
                reason: "no stored TDEE to derive macros from",
            },
        }
    } else {
        Recompute::Unchanged
    };

    Ok((merged, outcome))
}

fn missing_inputs(user: &User) -> Vec<&'static str> {
    [
        ("weight", !user.weight.is_some_and(|w| w > 0.0)),
        ("height", !user.height.is_some_and(|h| h > 0.0)),
        ("age", !user.age.is_some_and(|a| a > 0)),
        ("gender", !user.gender.as_deref().is_some_and(|g| !g.trim().is_empty())),
    ]
    .into_iter()
    .filter_map(|(field, missing)| missing.then_some(field))
    .collect()
}

pub fn apply_derived(user: &mut User, derived: &DerivedFields) {
    user.bmr = Some(derived.bmr);
    user.tdee = Some(derived.tdee);
    apply_macros(user, &derived.macros);
}

fn apply_macros(user: &mut User, macros: &MacroTargets) {
    user.daily_calories = Some(macros.daily_calories);
    user.daily_protein = Some(macros.protein_g);
    user.daily_carbs = Some(macros.carbs_g);
    user.daily_fat = Some(macros.fat_g);
}
