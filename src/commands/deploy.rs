//! `provisio deploy` - apply a template to the store

use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use declarative::{ExecuteOptions, ExistenceResolver, RunReport, execute, preview};

use crate::Context;
use crate::cli::DeployArgs;
use crate::config::ProvisioConfig;
use crate::progress::SpinnerProgress;
use crate::store::FileStore;
use crate::ui;

pub fn run(ctx: &Context, args: DeployArgs) -> Result<()> {
    let config = ProvisioConfig::load()?;
    let plan = super::load_plan(&args.template, args.target.as_deref())?;
    let store_path = config.store_path(args.store.as_deref())?;
    let store = FileStore::open(&store_path)
        .with_context(|| format!("Could not open store {}", store_path.display()))?;
    let retry = config.retry_config();

    if args.dry_run {
        let resolver = ExistenceResolver::new(&store, retry);
        let changes = preview(&plan, &resolver);
        if args.json {
            println!("{}", serde_json::to_string_pretty(&changes)?);
        } else {
            ui::print_preview(&changes);
            println!();
            ui::info("Dry run - no changes made");
        }
        return Ok(());
    }

    if !args.json && !ctx.quiet {
        ui::header(&format!(
            "Deploying {} resources from {}",
            plan.len(),
            args.template.template.display()
        ));
        ui::kv(
            "Store",
            &format!("{} ({} records)", store.path().display(), store.len()?),
        );
        ui::kv("Conditional", &plan.conditional_count().to_string());
    }

    if !args.yes && !confirm_proceed()? {
        ui::error("Aborted");
        return Ok(());
    }

    let opts = ExecuteOptions {
        name: args.name,
        jobs: config.jobs(args.jobs),
        retry,
    };

    let mut progress = if args.json || ctx.quiet {
        SpinnerProgress::hidden(plan.len())
    } else {
        SpinnerProgress::new(plan.len())
    };
    let report = execute(&plan, &store, &opts, &mut progress);
    progress.finish();
    let report = report?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        ui::print_report(&report);
    }

    finish(&report)
}

fn finish(report: &RunReport) -> Result<()> {
    if report.is_success() {
        return Ok(());
    }
    let summary = report.summary();
    bail!(
        "Deployment {} failed ({} failed, {} blocked)",
        report.name(),
        summary.failed,
        summary.blocked
    )
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt(format!("{}", "Continue?".bold()))
        .default(true)
        .interact()?;

    Ok(confirmed)
}
