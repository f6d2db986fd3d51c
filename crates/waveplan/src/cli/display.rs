//! Common display utilities for CLI commands.

use std::path::Path;

use colored::{ColoredString, Colorize};
use waveplan::state::EnrichmentStats;
use waveplan::{ConversionPlan, RiskLevel};

const MAX_DISPLAY_ITEMS: usize = 10;

/// Print a bold label with a green count.
pub fn print_count(label: &str, count: usize) {
    println!("  {}: {}", label.white().bold(), count.to_string().green());
}

/// Print a bulleted list, truncated to `MAX_DISPLAY_ITEMS` entries.
///
/// Shows "... and N more" when truncated, or `empty_message` when there is
/// nothing to show.
pub fn print_list(items: impl ExactSizeIterator<Item = String>, empty_message: &str) {
    let total = items.len();
    if total == 0 {
        println!("    {}", empty_message.dimmed());
        return;
    }

    for item in items.take(MAX_DISPLAY_ITEMS) {
        println!("    {} {item}", "•".dimmed());
    }

    if total > MAX_DISPLAY_ITEMS {
        println!(
            "    {} ... and {} more",
            "•".dimmed(),
            total - MAX_DISPLAY_ITEMS
        );
    }
}

fn colored_level(level: RiskLevel) -> ColoredString {
    let text = level.to_string();
    match level {
        RiskLevel::Low => text.green(),
        RiskLevel::Medium => text.yellow(),
        RiskLevel::High => text.red(),
        RiskLevel::Critical => text.red().bold(),
    }
}

/// Print what a prior-state file contributed.
fn print_prior_state(stats: &EnrichmentStats) {
    println!("  {}:", "Prior state".white().bold());
    println!(
        "    {} modules enriched, {} entries skipped",
        stats.applied, stats.skipped
    );
    if !stats.phases.is_empty() {
        let phases: Vec<String> = stats
            .phases
            .iter()
            .map(|(phase, count)| format!("{count} {phase}"))
            .collect();
        println!("    {} {}", "•".dimmed(), phases.join(", "));
    }
}

/// Print a human-readable overview of a plan.
pub fn print_plan_summary(
    plan: &ConversionPlan,
    enrichment: Option<&EnrichmentStats>,
    written: &Path,
) {
    let summary = &plan.summary;

    println!("{}", "Conversion Plan".cyan().bold());
    println!();
    print_count("Modules", summary.modules);
    print_count("Conversion units", summary.units);
    print_count("Cycle units", summary.cycle_units);
    print_count("Waves", summary.waves);
    print_count("High-risk units", summary.high_risk_units);
    println!(
        "  {}: {:.1}",
        "Estimated hours".white().bold(),
        summary.estimated_hours
    );
    println!();

    if let Some(stats) = enrichment {
        print_prior_state(stats);
        println!();
    }

    for wave in &plan.waves {
        println!(
            "  {} {} ({} units, {} batches):",
            "Wave".yellow().bold(),
            wave.number,
            wave.units.len(),
            wave.batches.len()
        );
        print_list(
            wave.units
                .iter()
                .map(|u| format!("{} [{}]", u.name, colored_level(u.risk.level))),
            "no units",
        );
    }
    println!();

    println!(
        "  {}: {} ({:.1} hours minimum)",
        "Critical path".white().bold(),
        plan.critical_path.units.join(" → "),
        plan.critical_path.estimated_hours
    );
    println!();

    println!("  {}:", "Gateways".white().bold());
    print_list(
        plan.gateways
            .iter()
            .map(|g| format!("{}: {}", g.unit.bold(), g.rationale)),
        "no unit blocks another",
    );

    if !plan.annotations.is_empty() {
        println!();
        println!(
            "  {}: {} units scored with missing risk data (see annotations)",
            "Note".yellow().bold(),
            plan.annotations
                .iter()
                .map(|a| a.unit.as_str())
                .collect::<std::collections::BTreeSet<_>>()
                .len()
        );
    }

    println!();
    println!("Plan written to {}", written.display().to_string().dimmed());
}
