use colored::Colorize;

use crate::core::{AcceleratorRecord, LaunchOutcome, ResolutionSource, VerificationReport};
use crate::error::GuardError;

/// Single diagnostic line for a failed launch, with the remedy when known
pub fn print_failure(err: &GuardError) {
    match err.remedy() {
        Some(hint) => eprintln!(
            "{} {}",
            format!("✗ {}.", err).red().bold(),
            hint.dimmed()
        ),
        None => eprintln!("{}", format!("✗ {}", err).red().bold()),
    }
}

/// Table of enumerated GPUs; the token column marks matching names
pub fn print_devices(records: &[AcceleratorRecord], token: &str) {
    if records.is_empty() {
        println!("{}", "No GPUs reported".yellow());
        return;
    }

    println!(
        "{}",
        format!("{:<6} {:<40} {}", "INDEX", "NAME", "UUID").white().bold()
    );
    for record in records {
        let line = format!(
            "{:<6} {:<40} {}",
            record.index,
            truncate(&record.name, 40),
            record.uuid.as_deref().unwrap_or("-")
        );
        if record.matches(token) {
            println!("{} {}", line.green(), format!("← '{}'", token).green().bold());
        } else {
            println!("{}", line);
        }
    }
}

pub fn print_report(report: &VerificationReport) {
    let count = report
        .device_count
        .map_or_else(|| "?".to_string(), |c| c.to_string());
    println!(
        "  {} {} probe: {} device(s) {}",
        "•".cyan(),
        report.phase,
        count,
        report.device_names.join(", ").dimmed()
    );
}

pub fn print_outcome(outcome: &LaunchOutcome) {
    let how = match outcome.resolution.source {
        ResolutionSource::Matched => "matched".green(),
        ResolutionSource::Override => "override".yellow(),
        ResolutionSource::Fallback => "fallback".yellow(),
    };
    println!(
        "{} GPU {} ({})",
        "✓ Pinned to".green().bold(),
        outcome.resolution.index.to_string().cyan().bold(),
        how
    );
    print_report(&outcome.backend);
    print_report(&outcome.verification);
    println!("  {} {}", "env:".dimmed(), outcome.restriction.describe());
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}
