//! Execution engine - applies a plan resource by resource
//!
//! The [`Provisioner`] decides and submits the store call for one resource.
//! [`execute`] drives a whole run: it walks the plan in dependency order,
//! blocks dependents of anything that did not succeed, and records every
//! terminal outcome on a [`DeploymentRun`].

use crate::context::{NoProgress, ProgressCallback, ResourceStore, WriteOutcome};
use crate::error::{Error, Result};
use crate::planner::ExecutionPlan;
use crate::resolver::ExistenceResolver;
use crate::resource::{CreationPolicy, Resource, ResourceId};
use crate::types::{DeploymentRun, ExecuteOptions, Outcome, Phase, RetryConfig, RunReport};
use rayon::prelude::*;
use std::collections::HashMap;

/// Applies single resources against a store
pub struct Provisioner<'a> {
    store: &'a dyn ResourceStore,
    resolver: ExistenceResolver<'a>,
}

impl<'a> Provisioner<'a> {
    pub fn new(store: &'a dyn ResourceStore, retry: RetryConfig) -> Self {
        Self {
            store,
            resolver: ExistenceResolver::new(store, retry),
        }
    }

    /// Use a preconfigured resolver, e.g. one with a custom retry callback
    pub fn with_resolver(store: &'a dyn ResourceStore, resolver: ExistenceResolver<'a>) -> Self {
        Self { store, resolver }
    }

    pub fn resolver(&self) -> &ExistenceResolver<'a> {
        &self.resolver
    }

    /// Apply one resource and return its terminal outcome
    pub fn apply(&self, resource: &Resource) -> Outcome {
        self.apply_observed(resource, &mut |_| {})
    }

    /// Apply one resource, reporting each lifecycle transition to `observe`
    pub fn apply_observed(&self, resource: &Resource, observe: &mut dyn FnMut(&Phase)) -> Outcome {
        observe(&Phase::Pending);

        let outcome = match self.converge(resource, observe) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("{}: {e}", resource.id);
                Outcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        log::info!("{}: {}", resource.id, outcome.label());
        observe(&Phase::Done(outcome.clone()));
        outcome
    }

    fn converge(&self, resource: &Resource, observe: &mut dyn FnMut(&Phase)) -> Result<Outcome> {
        match resource.policy {
            CreationPolicy::AlwaysApply => {
                observe(&Phase::Creating);
                let written = self.store.create_or_update(&resource.id, &resource.params)?;
                Ok(match written {
                    WriteOutcome::Created => Outcome::Created,
                    WriteOutcome::Updated => Outcome::Updated,
                })
            }
            CreationPolicy::CreateIfAbsent => {
                observe(&Phase::Checking);
                if self.resolver.exists(&resource.id)? {
                    // Parameters, including any freshly generated secret,
                    // are never handed to the store on this path.
                    observe(&Phase::Skipped);
                    return Ok(Outcome::SkippedExisting);
                }

                observe(&Phase::Creating);
                match self.store.create(&resource.id, &resource.params) {
                    Ok(()) => Ok(Outcome::Created),
                    Err(e) if e.is_ignorable() => {
                        log::info!(
                            "{} was created by another run after the existence check",
                            resource.id
                        );
                        Ok(Outcome::SkippedExisting)
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }
}

/// Run every resource of a plan against `store`
///
/// With `opts.jobs == 1` resources are applied one at a time in plan order.
/// With more jobs, each dependency wave is applied concurrently on a thread
/// pool of that size; outcomes are identical either way.
///
/// Only thread-pool construction can fail here. Resource-level failures are
/// recorded as outcomes on the returned report.
pub fn execute<P: ProgressCallback>(
    plan: &ExecutionPlan,
    store: &dyn ResourceStore,
    opts: &ExecuteOptions,
    progress: &mut P,
) -> Result<RunReport> {
    let provisioner = Provisioner::new(store, opts.retry.clone());
    let mut run = DeploymentRun::start(opts.name.clone(), plan.digest());
    log::info!(
        "Starting run {} ({} resources, {} conditional)",
        run.name(),
        plan.len(),
        plan.conditional_count()
    );

    let pool = if opts.jobs > 1 {
        Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(opts.jobs)
                .build()
                .map_err(|e| Error::Other(format!("Failed to create apply thread pool: {e}")))?,
        )
    } else {
        None
    };

    let batches: Vec<Vec<usize>> = if pool.is_some() {
        plan.waves()
    } else {
        (0..plan.len()).map(|i| vec![i]).collect()
    };

    let mut parents: HashMap<ResourceId, Option<String>> = HashMap::new();

    for batch in batches {
        progress.on_batch_start(batch.len());

        let mut ready: Vec<&Resource> = Vec::with_capacity(batch.len());
        for i in batch {
            let resource = &plan.resources()[i];
            match precheck(resource, &run, plan, provisioner.resolver(), &mut parents) {
                Some(outcome) => {
                    log::warn!("{}: {outcome}", resource.id);
                    progress.on_resource_complete(&resource.id, &outcome);
                    run.record(resource.id.clone(), outcome);
                }
                None => ready.push(resource),
            }
        }

        match &pool {
            Some(pool) if ready.len() > 1 => {
                for resource in &ready {
                    progress.on_resource_start(&resource.id, &resource.description());
                }
                let outcomes: Vec<Outcome> =
                    pool.install(|| ready.par_iter().map(|r| provisioner.apply(r)).collect());
                for (resource, outcome) in ready.iter().zip(outcomes) {
                    progress.on_resource_complete(&resource.id, &outcome);
                    run.record(resource.id.clone(), outcome);
                }
            }
            _ => {
                for resource in ready {
                    progress.on_resource_start(&resource.id, &resource.description());
                    let outcome = provisioner
                        .apply_observed(resource, &mut |phase| progress.on_phase(&resource.id, phase));
                    progress.on_resource_complete(&resource.id, &outcome);
                    run.record(resource.id.clone(), outcome);
                }
            }
        }

        progress.on_batch_complete();
    }

    let report = run.finish();
    log::info!("Run {} {}", report.name(), report.status());
    Ok(report)
}

/// Outcome decided before any store call for this resource, if any
///
/// A dependency that did not succeed blocks the resource. A parent that
/// lives outside the template must exist; it is checked once per run.
fn precheck(
    resource: &Resource,
    run: &DeploymentRun,
    plan: &ExecutionPlan,
    resolver: &ExistenceResolver<'_>,
    parents: &mut HashMap<ResourceId, Option<String>>,
) -> Option<Outcome> {
    for dep in &resource.depends_on {
        if !run.outcome(dep).is_some_and(Outcome::is_success) {
            return Some(Outcome::Blocked { by: dep.clone() });
        }
    }

    if let Some(parent) = &resource.parent
        && plan.is_existing_ref(parent)
    {
        let problem = parents
            .entry(parent.clone())
            .or_insert_with(|| match resolver.exists(parent) {
                Ok(true) => None,
                Ok(false) => Some(format!("parent {parent} does not exist")),
                Err(e) => Some(format!("parent {parent}: {e}")),
            });
        if let Some(error) = problem {
            return Some(Outcome::Failed {
                error: error.clone(),
            });
        }
    }

    None
}

/// Run a plan without progress reporting
pub fn execute_simple(
    plan: &ExecutionPlan,
    store: &dyn ResourceStore,
    opts: &ExecuteOptions,
) -> Result<RunReport> {
    execute(plan, store, opts, &mut NoProgress)
}
