//! Preview of what a run would do, using read-only existence checks

use crate::planner::ExecutionPlan;
use crate::resolver::ExistenceResolver;
use crate::resource::{CreationPolicy, Resource, ResourceId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a run would do with a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum PlannedAction {
    /// Absent now; would be created
    Create,
    /// Present now; always-apply resource would be updated
    Update,
    /// Present now; conditional resource would be left alone
    Skip,
    /// State could not be determined
    Unknown { reason: String },
}

/// The planned action for one resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedChange {
    pub id: ResourceId,
    pub description: String,
    pub policy: CreationPolicy,
    #[serde(flatten)]
    pub action: PlannedAction,
    /// Whether the resource carries secret parameters
    pub sensitive: bool,
}

impl PlannedChange {
    fn new(resource: &Resource, action: PlannedAction) -> Self {
        Self {
            id: resource.id.clone(),
            description: resource.description(),
            policy: resource.policy,
            action,
            sensitive: resource.has_sensitive_params(),
        }
    }

    pub fn is_change(&self) -> bool {
        matches!(self.action, PlannedAction::Create | PlannedAction::Update)
    }
}

/// Compute the planned action for every resource, in plan order
///
/// No store mutation is made. The answer can go stale before a run starts.
pub fn preview(plan: &ExecutionPlan, resolver: &ExistenceResolver<'_>) -> Vec<PlannedChange> {
    let mut parents: HashMap<&ResourceId, Option<String>> = HashMap::new();

    plan.resources()
        .iter()
        .map(|resource| {
            if let Some(parent) = &resource.parent
                && plan.is_existing_ref(parent)
            {
                let problem = parents.entry(parent).or_insert_with(|| {
                    match resolver.exists(parent) {
                        Ok(true) => None,
                        Ok(false) => Some(format!("parent {parent} does not exist")),
                        Err(e) => Some(format!("parent {parent}: {e}")),
                    }
                });
                if let Some(reason) = problem {
                    let reason = reason.clone();
                    return PlannedChange::new(resource, PlannedAction::Unknown { reason });
                }
            }

            let action = match resolver.exists(&resource.id) {
                Ok(true) => match resource.policy {
                    CreationPolicy::AlwaysApply => PlannedAction::Update,
                    CreationPolicy::CreateIfAbsent => PlannedAction::Skip,
                },
                Ok(false) => PlannedAction::Create,
                Err(e) => PlannedAction::Unknown {
                    reason: e.to_string(),
                },
            };
            PlannedChange::new(resource, action)
        })
        .collect()
}

/// Preview summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewSummary {
    pub creates: usize,
    pub updates: usize,
    pub skips: usize,
    pub unknown: usize,
}

impl PreviewSummary {
    /// Create a summary from a list of planned changes
    pub fn from_changes(changes: &[PlannedChange]) -> Self {
        let mut summary = Self::default();
        for change in changes {
            match change.action {
                PlannedAction::Create => summary.creates += 1,
                PlannedAction::Update => summary.updates += 1,
                PlannedAction::Skip => summary.skips += 1,
                PlannedAction::Unknown { .. } => summary.unknown += 1,
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total_changes(&self) -> usize {
        self.creates + self.updates
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total_changes() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Params;
    use crate::store::MemoryStore;
    use crate::template::{Template, TemplateFormat};
    use crate::types::RetryConfig;
    use std::collections::BTreeMap;

    const TEMPLATE: &str = r#"
[[existing]]
type = "resource-group"
name = "rg"

[[resource]]
type = "vault"
name = "kv"
parent = "resource-group/rg"

[[resource]]
type = "secret"
name = "api-key"
parent = "vault/kv"
policy = "create-if-absent"
[resource.params]
value = { generate = { length = 16 } }
"#;

    fn plan() -> ExecutionPlan {
        let template = Template::parse(TEMPLATE, TemplateFormat::Toml, &BTreeMap::new()).unwrap();
        ExecutionPlan::from_template(template).unwrap()
    }

    fn id(s: &str) -> ResourceId {
        s.parse().unwrap()
    }

    #[test]
    fn test_preview_on_empty_store() {
        let store = MemoryStore::new();
        store.insert(id("resource-group/rg"), Params::new());
        let resolver = ExistenceResolver::new(&store, RetryConfig::no_retry());

        let changes = preview(&plan(), &resolver);
        assert_eq!(changes[0].action, PlannedAction::Create);
        assert_eq!(changes[1].action, PlannedAction::Create);
        assert!(changes[1].sensitive);

        let summary = PreviewSummary::from_changes(&changes);
        assert_eq!(summary.creates, 2);
        assert!(summary.has_changes());
        assert_eq!(store.mutation_count(), 0);
    }

    #[test]
    fn test_preview_after_deploy() {
        let store = MemoryStore::new();
        for s in ["resource-group/rg", "vault/kv", "secret/api-key"] {
            store.insert(id(s), Params::new());
        }
        let resolver = ExistenceResolver::new(&store, RetryConfig::no_retry());

        let changes = preview(&plan(), &resolver);
        assert_eq!(changes[0].action, PlannedAction::Update);
        assert_eq!(changes[1].action, PlannedAction::Skip);
        assert!(!changes[1].is_change());
    }

    #[test]
    fn test_preview_missing_external_parent() {
        let store = MemoryStore::new();
        let resolver = ExistenceResolver::new(&store, RetryConfig::no_retry());

        let changes = preview(&plan(), &resolver);
        assert!(matches!(
            &changes[0].action,
            PlannedAction::Unknown { reason } if reason.contains("resource-group/rg")
        ));
        assert_eq!(PreviewSummary::from_changes(&changes).unknown, 1);
    }

    #[test]
    fn test_preview_serializes_action_tag() {
        let store = MemoryStore::new();
        store.insert(id("resource-group/rg"), Params::new());
        let resolver = ExistenceResolver::new(&store, RetryConfig::no_retry());

        let changes = preview(&plan(), &resolver);
        let json = serde_json::to_value(&changes[1]).unwrap();
        assert_eq!(json["action"], "create");
        assert_eq!(json["policy"], "create-if-absent");
        assert_eq!(json["id"], "secret/api-key");
    }
}
