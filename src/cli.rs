use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "provisio")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Idempotent declarative provisioning", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply a template, creating only what is missing
    Deploy(DeployArgs),

    /// Preview what a deploy would do
    Plan(PlanArgs),

    /// Parse a template and print its apply order
    Validate(ValidateArgs),

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Shared Arguments
// ============================================================================

#[derive(Parser, Debug, Clone)]
pub struct TemplateArgs {
    /// Template file (TOML, or JSON by extension)
    pub template: PathBuf,

    /// Override a template parameter (repeatable)
    #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub params: Vec<(String, String)>,
}

// ============================================================================
// Deploy
// ============================================================================

#[derive(Parser, Debug)]
pub struct DeployArgs {
    #[command(flatten)]
    pub template: TemplateArgs,

    /// Name of this deployment run
    #[arg(short, long)]
    pub name: Option<String>,

    /// Store file (overrides config)
    #[arg(long, env = "PROVISIO_STORE")]
    pub store: Option<PathBuf>,

    /// Number of parallel jobs (overrides config)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Only deploy matching resources: "type" or "type/name"
    #[arg(short, long)]
    pub target: Option<String>,

    /// Show what would be done without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// Plan
// ============================================================================

#[derive(Parser, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub template: TemplateArgs,

    /// Store file (overrides config)
    #[arg(long, env = "PROVISIO_STORE")]
    pub store: Option<PathBuf>,

    /// Only preview matching resources: "type" or "type/name"
    #[arg(short, long)]
    pub target: Option<String>,

    /// Print the preview as JSON
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// Validate
// ============================================================================

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub template: TemplateArgs,
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show effective configuration and its location
    Show,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{s}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("region=west").unwrap(),
            ("region".to_string(), "west".to_string())
        );
        assert_eq!(
            parse_key_val("conn=a=b").unwrap(),
            ("conn".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_deploy_args() {
        let cli = Cli::try_parse_from([
            "provisio",
            "-vv",
            "deploy",
            "stack.toml",
            "--param",
            "env=prod",
            "-p",
            "region=west",
            "--jobs",
            "4",
            "--yes",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Command::Deploy(args) = cli.command else {
            panic!("expected deploy");
        };
        assert_eq!(args.template.template, PathBuf::from("stack.toml"));
        assert_eq!(args.template.params.len(), 2);
        assert_eq!(args.jobs, Some(4));
        assert!(args.yes);
        assert!(!args.dry_run);
    }
}
