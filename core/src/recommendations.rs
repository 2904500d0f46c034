use serde::Serialize;

use crate::metabolic::Goal;

pub const DEFAULT_DAILY_CALORIES: f64 = 2000.0;
pub const DEFAULT_WEIGHT_KG: f64 = 70.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tip {
    pub title: String,
    pub description: String,
    pub icon: &'static str,
}

fn tip(icon: &'static str, title: &str, description: impl Into<String>) -> Tip {
    Tip {
        title: format!("{icon} {title}"),
        description: description.into(),
        icon,
    }
}

/// Goal used to pick tips. Looser than [`Goal::from_input`]: any goal
/// mentioning `verme` or `loss` gets weight-loss tips, then `alma` or `gain`
/// gets weight-gain tips.
#[must_use]
pub fn tip_goal(input: &str) -> Goal {
    let lower = input.to_lowercase();
    if lower.contains("verme") || lower.contains("loss") {
        Goal::Lose
    } else if lower.contains("alma") || lower.contains("gain") {
        Goal::Gain
    } else {
        Goal::Maintain
    }
}

/// Six tips for the user's goal. Missing targets fall back to 2000 kcal and
/// the current weight (or 70 kg).
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn recommendations(
    goal: Goal,
    daily_calories: Option<f64>,
    weight: Option<f64>,
    target_weight: Option<f64>,
) -> Vec<Tip> {
    let calories = daily_calories.unwrap_or(DEFAULT_DAILY_CALORIES) as i64;
    let target = target_weight.or(weight).unwrap_or(DEFAULT_WEIGHT_KG) as i64;

    match goal {
        Goal::Lose => vec![
            tip("💧", "Drink plenty of water", "At least 2-3 litres a day keeps your metabolism up and helps you feel full."),
            tip("🥗", "Eat protein first", "Protein preserves muscle while supporting fat loss. Include a protein source in every meal."),
            tip("🏃", "Exercise regularly", "Do cardio and strength training 3-4 times a week and walk at least 30 minutes a day."),
            tip("⏰", "Sleep consistently", "7-8 hours of good sleep keeps hormones balanced and makes losing weight easier."),
            tip("🍎", "Choose healthy snacks", "When hungry, reach for fruit, nuts or yoghurt."),
            tip(
                "📊",
                "Track your calories",
                format!("Try to stay under your {calories} kcal daily target. Smaller portions and eating slowly help."),
            ),
        ],
        Goal::Gain => vec![
            tip("🥩", "Calorie-dense foods", "Nuts, avocado and whole grains add healthy calories."),
            tip("💪", "Lift weights", "Strength train 3-4 times a week to build muscle and keep cardio limited."),
            tip("🍽️", "Eat often", "Have 5-6 balanced meals a day with protein, carbohydrates and healthy fats."),
            tip("🥤", "Drink your calories", "Smoothies, milk and the occasional protein shake are easy extra energy."),
            tip(
                "📈",
                "Track your progress",
                format!("Your target is {target} kg. Weigh in weekly and be patient, healthy gain takes time."),
            ),
            tip("🌙", "Sleep well", "7-9 hours of sleep a night supports muscle growth."),
        ],
        Goal::Maintain => vec![
            tip(
                "⚖️",
                "Balanced diet",
                format!("Hold your {calories} kcal daily target and keep your macros balanced."),
            ),
            tip("🏋️", "Regular exercise", "Combine cardio and resistance training 3-4 times a week."),
            tip("💧", "Stay hydrated", "2-3 litres of water a day keeps your metabolism active."),
            tip("🍎", "Eat a variety", "Different fruit and vegetables widen your vitamin and mineral intake."),
            tip("📊", "Keep tracking", "Log your weight and meals regularly to spot small changes early."),
            tip("😊", "Manage stress", "Stress can drive weight gain. Meditation, yoga or hobbies help."),
        ],
    }
}
