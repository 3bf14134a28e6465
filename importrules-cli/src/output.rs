use colored::*;
use importrules_engine::{DispatchReport, InstallSummary, RuleOutcome};

use crate::simulate::Simulation;

pub fn print_install_summary(summary: &InstallSummary) {
    for (name, count) in &summary.installed {
        println!("{} {} ({} rules)", "✔".green().bold(), name.bold(), count);
    }
    for (origin, detail) in &summary.failed {
        println!("{} {}", "✘".red().bold(), origin.bold());
        println!("  {}", detail.red());
    }
}

fn print_report(index: usize, report: &DispatchReport) {
    let kind = if report.is_reprocess {
        "re-import".yellow()
    } else {
        "import".cyan()
    };
    println!(
        "{} #{} {} {}",
        "▶".bold(),
        index + 1,
        kind,
        report.object.as_deref().unwrap_or("<no object>")
    );

    for rule in &report.rules {
        match &rule.outcome {
            RuleOutcome::NotMatched => println!("  {} {}", "·".dimmed(), rule.rule.dimmed()),
            RuleOutcome::AppliedOk { effects } => println!(
                "  {} {} ({} actions)",
                "✔".green(),
                rule.rule,
                effects.len()
            ),
            RuleOutcome::AppliedWithActionFailure { failures, .. } => {
                println!("  {} {}", "✘".red(), rule.rule);
                for failure in failures {
                    println!("    {} {}", failure.action, failure.detail.red());
                }
            }
        }
    }
    for skipped in &report.skipped {
        println!("  {} {} (already processed)", "↷".dimmed(), skipped.dimmed());
    }
    if let Some(error) = &report.marker_error {
        println!("  {} processed marker not written: {}", "!".red(), error);
    }
}

pub fn print_simulation(simulation: &Simulation) {
    for (index, report) in simulation.reports.iter().enumerate() {
        print_report(index, report);
    }

    println!("{}", "Final state".bold());
    for (name, value) in &simulation.asset.properties {
        println!("  {} = {}", name, value);
    }
    for (key, value) in &simulation.asset.tags {
        println!("  [{}] = {}", key, value);
    }
}
