//! `provisio plan` - preview a deploy without changing anything

use anyhow::{Context as _, Result};
use declarative::{ExistenceResolver, preview};

use crate::Context;
use crate::cli::PlanArgs;
use crate::config::ProvisioConfig;
use crate::progress;
use crate::store::FileStore;
use crate::ui;

pub fn run(ctx: &Context, args: PlanArgs) -> Result<()> {
    let config = ProvisioConfig::load()?;
    let plan = super::load_plan(&args.template, args.target.as_deref())?;
    let store_path = config.store_path(args.store.as_deref())?;
    let store = FileStore::open(&store_path)
        .with_context(|| format!("Could not open store {}", store_path.display()))?;

    let resolver = ExistenceResolver::new(&store, config.retry_config());
    let changes = if args.json || ctx.quiet {
        preview(&plan, &resolver)
    } else {
        let pb = progress::spinner("Checking existing resources...");
        let changes = preview(&plan, &resolver);
        pb.finish_and_clear();
        changes
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&changes)?);
    } else {
        ui::print_preview(&changes);
        if ctx.verbose > 0 {
            ui::kv("Template digest", plan.digest());
        }
    }
    Ok(())
}
