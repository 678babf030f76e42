//! Resource model for declarative provisioning
//!
//! A Resource is one declared unit of infrastructure: an identifier, an
//! optional parent, a parameter map, the resources it must follow, and a
//! creation policy. Resources are immutable once a template is loaded.

use crate::error::{Error, Result};
use crate::secret::SecretValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Identifier of a resource: a type plus a name, written `type/name`.
///
/// Examples:
/// - "vault/kv-demo"
/// - "secret/api-key"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId {
    pub kind: String,
    pub name: String,
}

impl ResourceId {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

impl FromStr for ResourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((kind, name)) if !kind.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self::new(kind, name))
            }
            _ => Err(Error::parse(format!(
                "invalid resource reference '{s}' (expected type/name)"
            ))),
        }
    }
}

impl TryFrom<String> for ResourceId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.to_string()
    }
}

/// How a resource is reconciled against the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreationPolicy {
    /// Submit create-or-update on every run
    #[default]
    AlwaysApply,
    /// Create only when the store reports the resource absent
    CreateIfAbsent,
}

impl fmt::Display for CreationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlwaysApply => f.write_str("always-apply"),
            Self::CreateIfAbsent => f.write_str("create-if-absent"),
        }
    }
}

/// A single parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Secret(SecretValue),
}

impl ParamValue {
    pub fn is_sensitive(&self) -> bool {
        matches!(self, Self::Secret(_))
    }

    pub fn as_secret(&self) -> Option<&SecretValue> {
        match self {
            Self::Secret(secret) => Some(secret),
            _ => None,
        }
    }
}

/// Display never reveals secrets; see [`SecretValue`].
impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Secret(secret) => write!(f, "{secret}"),
        }
    }
}

/// Parameter map, ordered by key for stable output
pub type Params = BTreeMap<String, ParamValue>;

/// A declared resource
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    /// Containing resource, e.g. the vault a secret lives in
    pub parent: Option<ResourceId>,
    pub params: Params,
    /// Resources that must reach a successful outcome first.
    /// Includes the parent when the parent is declared in the same template.
    pub depends_on: BTreeSet<ResourceId>,
    pub policy: CreationPolicy,
}

impl Resource {
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            parent: None,
            params: Params::new(),
            depends_on: BTreeSet::new(),
            policy: CreationPolicy::default(),
        }
    }

    pub fn with_parent(mut self, parent: ResourceId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: ParamValue) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_dependency(mut self, id: ResourceId) -> Self {
        self.depends_on.insert(id);
        self
    }

    pub fn with_policy(mut self, policy: CreationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Human-readable description
    pub fn description(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{} in {} ({})", self.id, parent, self.policy),
            None => format!("{} ({})", self.id, self.policy),
        }
    }

    pub fn is_conditional(&self) -> bool {
        self.policy == CreationPolicy::CreateIfAbsent
    }

    pub fn has_sensitive_params(&self) -> bool {
        self.params.values().any(ParamValue::is_sensitive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resource_id() {
        let id: ResourceId = "vault/kv-demo".parse().unwrap();
        assert_eq!(id, ResourceId::new("vault", "kv-demo"));
        assert_eq!(id.to_string(), "vault/kv-demo");
    }

    #[test]
    fn test_parse_resource_id_rejects_malformed() {
        assert!("vault".parse::<ResourceId>().is_err());
        assert!("/kv".parse::<ResourceId>().is_err());
        assert!("vault/".parse::<ResourceId>().is_err());
        assert!("a/b/c".parse::<ResourceId>().is_err());
    }

    #[test]
    fn test_description_never_shows_secret() {
        let resource = Resource::new(ResourceId::new("secret", "api-key"))
            .with_parent(ResourceId::new("vault", "kv"))
            .with_param("value", ParamValue::Secret(SecretValue::supplied("s3cr3t")))
            .with_policy(CreationPolicy::CreateIfAbsent);

        assert_eq!(
            resource.description(),
            "secret/api-key in vault/kv (create-if-absent)"
        );
        assert!(!format!("{resource:?}").contains("s3cr3t"));
        assert!(resource.has_sensitive_params());
        assert!(resource.is_conditional());
    }
}
