//! Execution planner - orders template resources by dependency

use crate::error::{Error, Result};
use crate::resource::{Resource, ResourceId};
use crate::template::Template;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Resources in a valid apply order
///
/// Every resource appears after all of its dependencies. Among resources
/// whose dependencies are satisfied, declaration order wins, so the same
/// template always yields the same order.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    resources: Vec<Resource>,
    /// Longest dependency chain below each resource; parallel to `resources`
    depths: Vec<usize>,
    existing: Vec<ResourceId>,
    digest: String,
}

impl ExecutionPlan {
    /// Order a template's resources, failing on dependency cycles
    pub fn from_template(template: Template) -> Result<Self> {
        let (order, depths) = topological_order(&template.resources)?;

        let mut slots: Vec<Option<Resource>> = template.resources.into_iter().map(Some).collect();
        let mut resources = Vec::with_capacity(order.len());
        let mut ordered_depths = Vec::with_capacity(order.len());
        for i in order {
            if let Some(resource) = slots[i].take() {
                resources.push(resource);
                ordered_depths.push(depths[i]);
            }
        }

        Ok(Self {
            resources,
            depths: ordered_depths,
            existing: template.existing,
            digest: template.digest,
        })
    }

    /// Resources in apply order
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn existing(&self) -> &[ResourceId] {
        &self.existing
    }

    /// Whether `id` refers to a resource outside this template
    pub fn is_existing_ref(&self, id: &ResourceId) -> bool {
        self.existing.contains(id)
    }

    /// Digest of the template this plan came from
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn position(&self, id: &ResourceId) -> Option<usize> {
        self.resources.iter().position(|r| &r.id == id)
    }

    pub fn depth(&self, index: usize) -> Option<usize> {
        self.depths.get(index).copied()
    }

    /// Resource indices grouped by dependency depth
    ///
    /// Resources in one wave never depend on each other and may be applied
    /// concurrently once every earlier wave has finished.
    pub fn waves(&self) -> Vec<Vec<usize>> {
        let Some(&max) = self.depths.iter().max() else {
            return Vec::new();
        };
        let mut waves = vec![Vec::new(); max + 1];
        for (i, &depth) in self.depths.iter().enumerate() {
            waves[depth].push(i);
        }
        waves
    }

    /// Filter plan to resources matching a target, plus everything they depend on
    ///
    /// Target format: "type" or "type/name-fragment"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        let Some(target) = target else {
            return self;
        };
        let (kind, name) = parse_target(target);

        let mut keep: HashSet<ResourceId> = self
            .resources
            .iter()
            .filter(|r| matches_filter(r, kind.as_deref(), name.as_deref()))
            .map(|r| r.id.clone())
            .collect();

        // Dependencies always precede dependents, so one backwards pass
        // collects the full closure.
        for resource in self.resources.iter().rev() {
            if keep.contains(&resource.id) {
                keep.extend(resource.depends_on.iter().cloned());
            }
        }

        let (resources, depths) = self
            .resources
            .into_iter()
            .zip(self.depths)
            .filter(|(r, _)| keep.contains(&r.id))
            .unzip();

        Self {
            resources,
            depths,
            existing: self.existing,
            digest: self.digest,
        }
    }

    /// Total number of resources in the plan
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn conditional_count(&self) -> usize {
        self.resources.iter().filter(|r| r.is_conditional()).count()
    }
}

/// Kahn's algorithm with a min-heap on declaration index
///
/// Returns the order (as declaration indices) and each resource's depth.
fn topological_order(resources: &[Resource]) -> Result<(Vec<usize>, Vec<usize>)> {
    let index: HashMap<&ResourceId, usize> = resources
        .iter()
        .enumerate()
        .map(|(i, r)| (&r.id, i))
        .collect();

    let n = resources.len();
    let mut indegree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (i, resource) in resources.iter().enumerate() {
        for dep in &resource.depends_on {
            let Some(&d) = index.get(dep) else {
                return Err(Error::parse(format!(
                    "{}: dependency {dep} is not declared",
                    resource.id
                )));
            };
            indegree[i] += 1;
            dependents[d].push(i);
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> =
        (0..n).filter(|&i| indegree[i] == 0).map(Reverse).collect();
    let mut order = Vec::with_capacity(n);
    let mut depths = vec![0usize; n];
    let mut emitted = vec![false; n];

    while let Some(Reverse(i)) = ready.pop() {
        order.push(i);
        emitted[i] = true;
        for &j in &dependents[i] {
            depths[j] = depths[j].max(depths[i] + 1);
            indegree[j] -= 1;
            if indegree[j] == 0 {
                ready.push(Reverse(j));
            }
        }
    }

    if order.len() < n {
        return Err(Error::Cycle {
            path: find_cycle(resources, &index, &emitted),
        });
    }

    Ok((order, depths))
}

/// Walk unemitted dependencies until a resource repeats
///
/// Every resource left over by Kahn's algorithm has at least one leftover
/// dependency, so the walk always closes a cycle.
fn find_cycle(
    resources: &[Resource],
    index: &HashMap<&ResourceId, usize>,
    emitted: &[bool],
) -> Vec<String> {
    let mut path: Vec<usize> = Vec::new();
    let mut seen: HashMap<usize, usize> = HashMap::new();
    let mut current = emitted.iter().position(|&e| !e);

    while let Some(node) = current {
        if let Some(&start) = seen.get(&node) {
            let mut cycle: Vec<String> = path[start..]
                .iter()
                .map(|&i| resources[i].id.to_string())
                .collect();
            cycle.push(resources[node].id.to_string());
            return cycle;
        }
        seen.insert(node, path.len());
        path.push(node);
        current = resources[node]
            .depends_on
            .iter()
            .filter_map(|dep| index.get(dep).copied())
            .find(|&d| !emitted[d]);
    }

    path.iter().map(|&i| resources[i].id.to_string()).collect()
}

/// Parse a target string like "type/name" into (type, name)
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    match target.split_once('/') {
        None => (Some(target.to_string()), None),
        Some(("", name)) => (None, Some(name.to_string())),
        Some((kind, name)) => (Some(kind.to_string()), Some(name.to_string())),
    }
}

/// Check if a resource matches the filter criteria
fn matches_filter(resource: &Resource, kind: Option<&str>, name: Option<&str>) -> bool {
    if let Some(k) = kind
        && resource.id.kind != k
    {
        return false;
    }

    if let Some(n) = name
        && !resource.id.name.contains(n)
    {
        return false;
    }

    true
}
