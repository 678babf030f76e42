use colored::{ColoredString, Colorize};
use declarative::{
    ExecutionPlan, Outcome, PlannedAction, PlannedChange, PreviewSummary, RunReport,
};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Outcomes
// ============================================================================

pub fn outcome_symbol(outcome: &Outcome) -> ColoredString {
    match outcome {
        Outcome::Created => "+".green(),
        Outcome::Updated => "~".yellow(),
        Outcome::SkippedExisting => "=".dimmed(),
        Outcome::Failed { .. } => "✗".red(),
        Outcome::Blocked { .. } => "⊘".yellow(),
    }
}

pub fn action_symbol(action: &PlannedAction) -> ColoredString {
    match action {
        PlannedAction::Create => "+".green(),
        PlannedAction::Update => "~".yellow(),
        PlannedAction::Skip => "=".dimmed(),
        PlannedAction::Unknown { .. } => "?".red(),
    }
}

/// Print the apply order of a plan, one dependency wave per group
pub fn print_order(plan: &ExecutionPlan) {
    header(&format!("Apply order ({} resources)", plan.len()));
    for (wave_no, wave) in plan.waves().iter().enumerate() {
        println!("  {}", format!("wave {}", wave_no + 1).dimmed());
        for &index in wave {
            let resource = &plan.resources()[index];
            println!("    {} {}", "•".cyan(), resource.description());
        }
    }
    if !plan.existing().is_empty() {
        section("Pre-existing");
        for id in plan.existing() {
            dim(&id.to_string());
        }
    }
}

/// Print the preview of a deploy
pub fn print_preview(changes: &[PlannedChange]) {
    let summary = PreviewSummary::from_changes(changes);

    header("Deployment Preview");
    for change in changes {
        let detail = match &change.action {
            PlannedAction::Unknown { reason } => format!(" ({reason})").red().to_string(),
            PlannedAction::Skip => " (exists)".dimmed().to_string(),
            _ => String::new(),
        };
        let lock = if change.sensitive { " 🔒" } else { "" };
        println!(
            "  {} {}{}{}",
            action_symbol(&change.action),
            change.description,
            lock,
            detail
        );
    }

    println!();
    if summary.has_changes() {
        println!(
            "  {} to create, {} to update, {} unchanged",
            summary.creates.to_string().green(),
            summary.updates.to_string().yellow(),
            summary.skips
        );
    } else {
        println!("  {} No changes needed", "✓".green());
    }
    if summary.unknown > 0 {
        warn(&format!(
            "{} resource(s) could not be checked",
            summary.unknown
        ));
    }
}

/// Print the outcome of every resource and the final status
pub fn print_report(report: &RunReport) {
    header(&format!("Deployment {}", report.name()));
    for entry in report.outcomes() {
        let detail = match &entry.outcome {
            Outcome::Failed { error } => format!(" {}", error.red()),
            Outcome::Blocked { by } => format!(" {}", format!("(blocked by {by})").yellow()),
            other => format!(" {}", other.label().dimmed()),
        };
        println!("  {} {}{}", outcome_symbol(&entry.outcome), entry.id, detail);
    }

    let summary = report.summary();
    let elapsed = report.finished_at() - report.started_at();
    println!();
    kv(
        "Summary",
        &format!(
            "{} created, {} updated, {} skipped, {} failed, {} blocked",
            summary.created, summary.updated, summary.skipped, summary.failed, summary.blocked
        ),
    );
    kv(
        "Duration",
        &format!("{:.2}s", elapsed.num_milliseconds() as f64 / 1000.0),
    );

    println!();
    if report.is_success() {
        success(&format!("Deployment {}", report.status()));
    } else {
        error(&format!("Deployment {}", report.status()));
    }
}
