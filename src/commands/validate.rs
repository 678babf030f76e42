//! `provisio validate` - check a template and show its apply order

use anyhow::Result;

use crate::Context;
use crate::cli::ValidateArgs;
use crate::ui;

pub fn run(ctx: &Context, args: ValidateArgs) -> Result<()> {
    let plan = super::load_plan(&args.template, None)?;

    if !ctx.quiet {
        ui::print_order(&plan);
        println!();
        ui::kv("Digest", plan.digest());
    }
    ui::success(&format!(
        "{} is valid ({} resources, {} conditional)",
        args.template.template.display(),
        plan.len(),
        plan.conditional_count()
    ));
    Ok(())
}
