// Template commands
pub mod deploy;
pub mod plan;
pub mod validate;

// Configuration
pub mod config;

use anyhow::{Context as _, Result, bail};
use declarative::{ExecutionPlan, Template};
use std::collections::BTreeMap;

use crate::cli::TemplateArgs;

/// Load a template with `--param` overrides and order it, optionally
/// narrowed to a target and its dependencies.
pub fn load_plan(args: &TemplateArgs, target: Option<&str>) -> Result<ExecutionPlan> {
    let overrides: BTreeMap<String, String> = args.params.iter().cloned().collect();

    let template = Template::load_file(&args.template, &overrides)
        .with_context(|| format!("Could not load template {}", args.template.display()))?;
    let plan = ExecutionPlan::from_template(template)
        .with_context(|| format!("Invalid template {}", args.template.display()))?;

    log::info!(
        "Loaded {} resources from {} (digest {})",
        plan.len(),
        args.template.display(),
        plan.digest()
    );

    let plan = plan.filter_by_target(target);
    if let Some(target) = target
        && plan.is_empty()
    {
        bail!("No resources match target '{target}'");
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const TEMPLATE: &str = r#"
[parameters]
env = "dev"

[[resource]]
type = "vault"
name = "kv-${env}"

[[resource]]
type = "secret"
name = "db-password"
parent = "vault/kv-${env}"
policy = "create-if-absent"
[resource.params]
value = { generate = { length = 24 } }

[[resource]]
type = "app"
name = "web"
"#;

    fn write_template(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("stack.toml");
        std::fs::write(&path, TEMPLATE).unwrap();
        path
    }

    #[test]
    fn test_load_plan_with_override() {
        let dir = TempDir::new().unwrap();
        let args = TemplateArgs {
            template: write_template(&dir),
            params: vec![("env".to_string(), "prod".to_string())],
        };

        let plan = load_plan(&args, None).unwrap();
        assert_eq!(plan.len(), 3);
        assert!(plan.position(&"vault/kv-prod".parse().unwrap()).is_some());
    }

    #[test]
    fn test_load_plan_target_keeps_dependencies() {
        let dir = TempDir::new().unwrap();
        let args = TemplateArgs {
            template: write_template(&dir),
            params: Vec::new(),
        };

        let plan = load_plan(&args, Some("secret")).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan.position(&"app/web".parse().unwrap()).is_none());
    }

    #[test]
    fn test_load_plan_unmatched_target() {
        let dir = TempDir::new().unwrap();
        let args = TemplateArgs {
            template: write_template(&dir),
            params: Vec::new(),
        };
        assert!(load_plan(&args, Some("database")).is_err());
    }

    #[test]
    fn test_load_plan_missing_file() {
        let args = TemplateArgs {
            template: PathBuf::from("/nonexistent/stack.toml"),
            params: Vec::new(),
        };
        assert!(load_plan(&args, None).is_err());
    }
}
