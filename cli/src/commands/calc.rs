use anyhow::{Result, bail};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use dietlog_core::metabolic::{BodyMetrics, DerivedFields, derive_all};

#[derive(Tabled)]
struct TargetRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn target_rows(derived: &DerivedFields) -> Vec<TargetRow> {
    let row = |metric, value: f64, unit| TargetRow {
        metric,
        value: format!("{value:.2} {unit}"),
    };
    vec![
        row("BMR", derived.bmr, "kcal"),
        row("TDEE", derived.tdee, "kcal"),
        row("Daily calories", derived.macros.daily_calories, "kcal"),
        row("Protein", derived.macros.protein_g, "g"),
        row("Carbs", derived.macros.carbs_g, "g"),
        row("Fat", derived.macros.fat_g, "g"),
    ]
}

pub(crate) fn cmd_calc(metrics: &BodyMetrics, json: bool) -> Result<()> {
    if metrics.weight_kg <= 0.0 {
        bail!("Weight must be greater than 0");
    }
    if metrics.height_cm <= 0.0 {
        bail!("Height must be greater than 0");
    }

    let derived = derive_all(metrics);

    if json {
        println!("{}", serde_json::to_string_pretty(&derived)?);
        return Ok(());
    }

    let table = Table::new(target_rows(&derived))
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..2)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}
