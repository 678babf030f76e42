//! Template loading
//!
//! A template is a TOML (or JSON) document declaring parameters, existing
//! out-of-graph references, and resources. Loading substitutes `${name}`
//! placeholders, materializes secret parameters (generating fresh values),
//! and checks that every parent and dependency reference resolves. Ordering
//! is the planner's job.

use crate::error::{Error, Result};
use crate::resource::{CreationPolicy, ParamValue, Params, Resource, ResourceId};
use crate::secret::{Charset, SecretValue};
use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

/// Longest secret the template may ask to generate
pub const MAX_GENERATED_LENGTH: usize = 1024;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

static KIND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9._-]{0,63}$").expect("kind pattern is valid")
});

static NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,126}$").expect("name pattern is valid")
});

/// Serialization format of a template source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateFormat {
    Toml,
    Json,
}

impl TemplateFormat {
    /// `.json` files are JSON; everything else is TOML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

// ============================================================================
// Document schema
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateDoc {
    #[serde(default)]
    parameters: BTreeMap<String, ScalarDoc>,
    #[serde(default)]
    existing: Vec<ExistingDoc>,
    #[serde(default, rename = "resource")]
    resources: Vec<ResourceDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExistingDoc {
    #[serde(rename = "type")]
    kind: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResourceDoc {
    #[serde(rename = "type")]
    kind: String,
    name: String,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    policy: CreationPolicy,
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(default)]
    params: BTreeMap<String, ParamDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ParamDoc {
    Generate(GenerateParam),
    Secret(SecretParam),
    Scalar(ScalarDoc),
}

/// `{ generate = { ... } }` and nothing else
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GenerateParam {
    generate: GenerateDoc,
}

/// `{ secret = "..." }` and nothing else
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SecretParam {
    secret: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GenerateDoc {
    #[serde(default = "default_secret_length")]
    length: usize,
    #[serde(default)]
    charset: Charset,
}

fn default_secret_length() -> usize {
    32
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ScalarDoc {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ScalarDoc {
    fn render(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(x) => x.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

// ============================================================================
// Loaded template
// ============================================================================

/// A parsed and validated template, in declaration order
///
/// `Debug` lists parameter names only; values may carry supplied secrets.
#[derive(Clone)]
pub struct Template {
    /// Effective parameters: template defaults overlaid with run overrides
    pub parameters: BTreeMap<String, String>,
    /// References to resources that live outside this template
    pub existing: Vec<ResourceId>,
    pub resources: Vec<Resource>,
    /// blake3 digest of the source text
    pub digest: String,
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("parameters", &self.parameters.keys().collect::<Vec<_>>())
            .field("existing", &self.existing)
            .field("resources", &self.resources)
            .field("digest", &self.digest)
            .finish()
    }
}

impl Template {
    /// Read and parse a template file
    pub fn load_file(path: &Path, overrides: &BTreeMap<String, String>) -> Result<Self> {
        if !path.exists() {
            return Err(Error::TemplateNotFound(path.to_path_buf()));
        }
        let source = std::fs::read_to_string(path)?;
        log::debug!("Loaded template {} ({} bytes)", path.display(), source.len());
        Self::parse(&source, TemplateFormat::from_path(path), overrides)
    }

    /// Parse template source text
    pub fn parse(
        source: &str,
        format: TemplateFormat,
        overrides: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let doc: TemplateDoc = match format {
            TemplateFormat::Toml => toml::from_str(source).map_err(|e| Error::parse(e.to_string()))?,
            TemplateFormat::Json => {
                serde_json::from_str(source).map_err(|e| Error::parse(e.to_string()))?
            }
        };

        let mut parameters: BTreeMap<String, String> = doc
            .parameters
            .iter()
            .map(|(k, v)| (k.clone(), v.render()))
            .collect();
        parameters.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut existing = Vec::with_capacity(doc.existing.len());
        for entry in &doc.existing {
            let id = build_id(&entry.kind, &entry.name, &parameters, "existing reference")?;
            if existing.contains(&id) {
                return Err(Error::parse(format!("existing reference {id} is declared twice")));
            }
            existing.push(id);
        }

        let mut resources = Vec::with_capacity(doc.resources.len());
        for entry in doc.resources {
            resources.push(build_resource(entry, &parameters)?);
        }

        resolve_references(&mut resources, &existing)?;

        Ok(Self {
            parameters,
            existing,
            resources,
            digest: blake3::hash(source.as_bytes()).to_hex().to_string(),
        })
    }
}

fn build_id(
    kind: &str,
    name: &str,
    parameters: &BTreeMap<String, String>,
    context: &str,
) -> Result<ResourceId> {
    let name = substitute(name, parameters, context)?;
    if !KIND.is_match(kind) {
        return Err(Error::parse(format!("{context}: invalid resource type '{kind}'")));
    }
    if !NAME.is_match(&name) {
        return Err(Error::parse(format!(
            "{context}: invalid resource name '{name}' for type '{kind}'"
        )));
    }
    Ok(ResourceId::new(kind, name))
}

fn build_resource(entry: ResourceDoc, parameters: &BTreeMap<String, String>) -> Result<Resource> {
    let id = build_id(&entry.kind, &entry.name, parameters, "resource")?;
    let context = id.to_string();

    let parent = match &entry.parent {
        Some(raw) => Some(substitute(raw, parameters, &context)?.parse::<ResourceId>()?),
        None => None,
    };

    let mut depends_on = BTreeSet::new();
    for raw in &entry.depends_on {
        depends_on.insert(substitute(raw, parameters, &context)?.parse::<ResourceId>()?);
    }

    let mut params = Params::new();
    for (key, value) in entry.params {
        let value = build_param(value, parameters, &format!("{context} param '{key}'"))?;
        params.insert(key, value);
    }

    Ok(Resource {
        id,
        parent,
        params,
        depends_on,
        policy: entry.policy,
    })
}

fn build_param(
    doc: ParamDoc,
    parameters: &BTreeMap<String, String>,
    context: &str,
) -> Result<ParamValue> {
    Ok(match doc {
        ParamDoc::Generate(GenerateParam { generate }) => {
            if generate.length == 0 || generate.length > MAX_GENERATED_LENGTH {
                return Err(Error::parse(format!(
                    "{context}: generated length must be between 1 and {MAX_GENERATED_LENGTH}"
                )));
            }
            ParamValue::Secret(SecretValue::generate(generate.length, generate.charset))
        }
        ParamDoc::Secret(SecretParam { secret }) => {
            ParamValue::Secret(SecretValue::supplied(substitute(&secret, parameters, context)?))
        }
        ParamDoc::Scalar(ScalarDoc::Text(s)) => ParamValue::Text(substitute(&s, parameters, context)?),
        ParamDoc::Scalar(ScalarDoc::Integer(i)) => ParamValue::Integer(i),
        ParamDoc::Scalar(ScalarDoc::Float(x)) => ParamValue::Float(x),
        ParamDoc::Scalar(ScalarDoc::Bool(b)) => ParamValue::Bool(b),
    })
}

/// Replace `${name}` placeholders; unknown names are an error
fn substitute(input: &str, parameters: &BTreeMap<String, String>, context: &str) -> Result<String> {
    if let Some(missing) = PLACEHOLDER
        .captures_iter(input)
        .map(|caps| caps[1].to_string())
        .find(|name| !parameters.contains_key(name))
    {
        return Err(Error::parse(format!(
            "{context}: unknown parameter '{missing}'"
        )));
    }

    Ok(PLACEHOLDER
        .replace_all(input, |caps: &Captures<'_>| {
            parameters.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned())
}

/// Check uniqueness and references; add declared parents as dependencies
fn resolve_references(resources: &mut [Resource], existing: &[ResourceId]) -> Result<()> {
    let mut declared = HashSet::with_capacity(resources.len());
    for resource in resources.iter() {
        if !declared.insert(resource.id.clone()) {
            return Err(Error::parse(format!(
                "resource {} is declared twice",
                resource.id
            )));
        }
        if existing.contains(&resource.id) {
            return Err(Error::parse(format!(
                "{} is declared both as a resource and as an existing reference",
                resource.id
            )));
        }
    }

    for resource in resources.iter_mut() {
        if let Some(parent) = &resource.parent {
            if declared.contains(parent) {
                resource.depends_on.insert(parent.clone());
            } else if !existing.contains(parent) {
                return Err(Error::parse(format!(
                    "{}: parent {parent} is neither declared nor an existing reference",
                    resource.id
                )));
            }
        }

        for dep in &resource.depends_on {
            if declared.contains(dep) {
                continue;
            }
            let reason = if existing.contains(dep) {
                "is an existing reference and cannot be a dependency"
            } else {
                "is not declared"
            };
            return Err(Error::parse(format!(
                "{}: dependency {dep} {reason}",
                resource.id
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VAULT_AND_SECRET: &str = r#"
[parameters]
vault_name = "kv-demo"
location = "westeurope"

[[existing]]
type = "resource-group"
name = "rg-demo"

[[resource]]
type = "vault"
name = "${vault_name}"
parent = "resource-group/rg-demo"
[resource.params]
location = "${location}"
sku = "standard"
soft_delete_days = 7

[[resource]]
type = "secret"
name = "api-key"
parent = "vault/${vault_name}"
policy = "create-if-absent"
[resource.params]
value = { generate = { length = 24 } }
"#;

    fn no_overrides() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[test]
    fn test_parse_vault_and_secret() {
        let template =
            Template::parse(VAULT_AND_SECRET, TemplateFormat::Toml, &no_overrides()).unwrap();

        assert_eq!(template.existing, vec![ResourceId::new("resource-group", "rg-demo")]);
        assert_eq!(template.resources.len(), 2);

        let vault = &template.resources[0];
        assert_eq!(vault.id, ResourceId::new("vault", "kv-demo"));
        assert_eq!(vault.policy, CreationPolicy::AlwaysApply);
        assert_eq!(vault.params["location"], ParamValue::Text("westeurope".into()));
        assert_eq!(vault.params["soft_delete_days"], ParamValue::Integer(7));
        // Existing parents are not graph edges
        assert!(vault.depends_on.is_empty());

        let secret = &template.resources[1];
        assert_eq!(secret.policy, CreationPolicy::CreateIfAbsent);
        assert!(secret.depends_on.contains(&vault.id));
        let value = secret.params["value"].as_secret().unwrap();
        assert_eq!(value.len(), 24);
    }

    #[test]
    fn test_overrides_replace_defaults() {
        let mut overrides = no_overrides();
        overrides.insert("vault_name".into(), "kv-prod".into());

        let template = Template::parse(VAULT_AND_SECRET, TemplateFormat::Toml, &overrides).unwrap();
        assert_eq!(template.resources[0].id.name, "kv-prod");
        assert_eq!(template.resources[1].parent, Some(ResourceId::new("vault", "kv-prod")));
    }

    #[test]
    fn test_each_load_generates_a_fresh_secret() {
        let a = Template::parse(VAULT_AND_SECRET, TemplateFormat::Toml, &no_overrides()).unwrap();
        let b = Template::parse(VAULT_AND_SECRET, TemplateFormat::Toml, &no_overrides()).unwrap();
        assert_ne!(a.resources[1].params["value"], b.resources[1].params["value"]);
        assert_eq!(a.digest, b.digest);
    }

    #[test]
    fn test_unknown_placeholder_is_parse_error() {
        let source = r#"
[[resource]]
type = "vault"
name = "${missing}"
"#;
        let err = Template::parse(source, TemplateFormat::Toml, &no_overrides()).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = Template::parse("[[resource]\ntype=", TemplateFormat::Toml, &no_overrides())
            .unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_unknown_field_is_parse_error() {
        let source = r#"
[[resource]]
type = "vault"
name = "kv"
polcy = "create-if-absent"
"#;
        assert!(Template::parse(source, TemplateFormat::Toml, &no_overrides()).is_err());
    }

    #[test]
    fn test_unresolved_parent_is_parse_error() {
        let source = r#"
[[resource]]
type = "secret"
name = "s"
parent = "vault/nowhere"
"#;
        let err = Template::parse(source, TemplateFormat::Toml, &no_overrides()).unwrap_err();
        assert!(err.to_string().contains("vault/nowhere"));
    }

    #[test]
    fn test_unresolved_dependency_is_parse_error() {
        let source = r#"
[[resource]]
type = "secret"
name = "s"
depends_on = ["vault/nowhere"]
"#;
        assert!(matches!(
            Template::parse(source, TemplateFormat::Toml, &no_overrides()),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_duplicate_resource_is_parse_error() {
        let source = r#"
[[resource]]
type = "vault"
name = "kv"

[[resource]]
type = "vault"
name = "kv"
"#;
        let err = Template::parse(source, TemplateFormat::Toml, &no_overrides()).unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_invalid_name_is_parse_error() {
        let source = r#"
[[resource]]
type = "vault"
name = "has space"
"#;
        assert!(Template::parse(source, TemplateFormat::Toml, &no_overrides()).is_err());
    }

    #[test]
    fn test_generate_length_bounds() {
        let source = r#"
[[resource]]
type = "secret"
name = "s"
[resource.params]
value = { generate = { length = 0 } }
"#;
        assert!(Template::parse(source, TemplateFormat::Toml, &no_overrides()).is_err());
    }

    #[test]
    fn test_supplied_secret_from_parameter() {
        let source = r#"
[[resource]]
type = "secret"
name = "s"
[resource.params]
value = { secret = "${token}" }
"#;
        let mut overrides = no_overrides();
        overrides.insert("token".into(), "abc123".into());
        let template = Template::parse(source, TemplateFormat::Toml, &overrides).unwrap();
        let secret = template.resources[0].params["value"].as_secret().unwrap();
        assert_eq!(secret.expose(), "abc123");

        let debug = format!("{template:?}");
        assert!(debug.contains("token"));
        assert!(!debug.contains("abc123"));
    }

    #[test]
    fn test_mixed_secret_table_is_parse_error() {
        for value in [
            r#"{ generate = { length = 8 }, secret = "x" }"#,
            r#"{ secret = "x", length = 8 }"#,
            r#"{ generate = { length = 8 }, charset = "hex" }"#,
        ] {
            let source = format!(
                "[[resource]]\ntype = \"secret\"\nname = \"s\"\n[resource.params]\nvalue = {value}\n"
            );
            let err = Template::parse(&source, TemplateFormat::Toml, &no_overrides()).unwrap_err();
            assert!(matches!(err, Error::Parse { .. }), "{value}");
        }
    }

    #[test]
    fn test_parse_json() {
        let source = r#"{
            "resource": [
                { "type": "vault", "name": "kv", "params": { "sku": "standard", "retention": 90 } },
                { "type": "secret", "name": "s", "parent": "vault/kv", "policy": "create-if-absent",
                  "params": { "value": { "generate": { "length": 16, "charset": "hex" } } } }
            ]
        }"#;
        let template = Template::parse(source, TemplateFormat::Json, &no_overrides()).unwrap();
        assert_eq!(template.resources.len(), 2);
        assert_eq!(template.resources[0].params["retention"], ParamValue::Integer(90));
        let value = template.resources[1].params["value"].as_secret().unwrap();
        assert!(value.expose().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_load_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = Template::load_file(&dir.path().join("nope.toml"), &no_overrides()).unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound(_)));
    }

    #[test]
    fn test_load_file_detects_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.json");
        std::fs::write(&path, r#"{ "resource": [ { "type": "vault", "name": "kv" } ] }"#).unwrap();

        let template = Template::load_file(&path, &no_overrides()).unwrap();
        assert_eq!(template.resources[0].id, ResourceId::new("vault", "kv"));
    }
}
