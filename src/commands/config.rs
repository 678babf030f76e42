use anyhow::Result;

use crate::Context;
use crate::cli::ConfigCommand;
use crate::config::{ProvisioConfig, config_path};
use crate::ui;

pub fn run(_ctx: &Context, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => show(),
    }
}

fn show() -> Result<()> {
    ui::header("Configuration");

    let path = config_path()?;
    println!();
    if path.exists() {
        ui::kv("Config file", &path.display().to_string());
    } else {
        ui::kv("Config file", &format!("{} (not found, using defaults)", path.display()));
    }

    let config = ProvisioConfig::load()?;
    let retry = config.retry_config();

    ui::section("retry");
    ui::kv("max_attempts", &retry.max_attempts.to_string());
    ui::kv("base_delay_ms", &retry.base_delay.as_millis().to_string());
    ui::kv("backoff_factor", &retry.backoff_factor.to_string());
    ui::kv("max_delay_ms", &retry.max_delay.as_millis().to_string());

    ui::section("store");
    ui::kv("path", &config.store_path(None)?.display().to_string());

    ui::section("deploy");
    ui::kv("jobs", &config.jobs(None).to_string());

    println!();
    ui::dim("CLI flags (--store, --jobs) override these values.");

    Ok(())
}
