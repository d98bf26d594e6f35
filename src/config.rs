//! # Descriptor Schema and Parsing
//!
//! A descriptor file tells the resolver everything it needs for one run:
//! the structural metadata of the classes involved, the environment the run
//! sees, the root definitions to start from, and the declarative plugins
//! (selectors, registrars, groups and conditions) the annotations refer to.
//!
//! ## Formats
//!
//! Descriptors may be written as YAML (`.yaml`/`.yml`), JSON (`.json`) or
//! TOML (`.toml`). [`from_file`] picks the format from the extension; YAML is
//! assumed for anything else.
//!
//! ## Example
//!
//! ```yaml
//! settings:
//!   problem_policy: fail_fast
//! environment:
//!   active_profiles: [prod]
//!   properties:
//!     app:
//!       name: demo
//! roots:
//!   - com.acme.AppConfig
//! classes:
//!   - name: com.acme.AppConfig
//!     annotations:
//!       - type: Configuration
//!       - type: Import
//!         attributes:
//!           value: [com.acme.DataConfig]
//!   - name: com.acme.DataConfig
//!     annotations:
//!       - type: Configuration
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::builtin::{GroupStrategy, RegistrarDefinition};
use crate::defaults::{
    default_allow_definition_overriding, default_foundational_prefixes, default_max_import_depth,
};
use crate::error::{Error, Result};
use crate::metadata::ClassMetadata;
use crate::plugin::ConfigurationPhase;
use crate::resource::flatten_value;
use crate::scan::decapitalize;

/// What happens when the resolver reports a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemPolicy {
    /// The first problem aborts the run.
    #[default]
    FailFast,
    /// Problems are logged and collected; the run continues.
    Lenient,
}

/// Tunables for a resolution run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub problem_policy: ProblemPolicy,
    /// Type-name prefixes never walked as superclasses, interfaces or
    /// meta-annotations.
    pub foundational_prefixes: Vec<String>,
    pub max_import_depth: usize,
    pub allow_definition_overriding: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            problem_policy: ProblemPolicy::default(),
            foundational_prefixes: default_foundational_prefixes(),
            max_import_depth: default_max_import_depth(),
            allow_definition_overriding: default_allow_definition_overriding(),
        }
    }
}

/// The environment a run sees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentSpec {
    pub active_profiles: Vec<String>,
    /// Profiles used when none are active; `["default"]` when omitted.
    pub default_profiles: Option<Vec<String>>,
    /// Nested properties, flattened to dotted keys.
    pub properties: BTreeMap<String, serde_json::Value>,
    pub include_system_environment: bool,
}

impl EnvironmentSpec {
    /// The declared properties as flat `key -> value` pairs.
    pub fn flat_properties(&self) -> BTreeMap<String, String> {
        let mut flat = BTreeMap::new();
        for (key, value) in &self.properties {
            flatten_value(key, value, &mut flat);
        }
        flat
    }
}

/// A root definition, either just a class name or a class with an explicit
/// bean name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RootSpec {
    Class(String),
    Named {
        class: String,
        #[serde(default)]
        name: Option<String>,
    },
}

impl RootSpec {
    pub fn class_name(&self) -> &str {
        match self {
            RootSpec::Class(class) | RootSpec::Named { class, .. } => class,
        }
    }

    /// The explicit name, else the decapitalised simple class name.
    pub fn bean_name(&self) -> String {
        if let RootSpec::Named {
            name: Some(name), ..
        } = self
        {
            return name.clone();
        }
        let class = self.class_name();
        let simple = class.rsplit(|c| c == '.' || c == '$').next().unwrap_or(class);
        decapitalize(simple)
    }
}

/// A plugin declared in the descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PluginSpec {
    /// An import selector returning a fixed list.
    Selector {
        class: String,
        #[serde(default)]
        imports: Vec<String>,
    },
    /// A deferred import selector, optionally grouped.
    DeferredSelector {
        class: String,
        #[serde(default)]
        imports: Vec<String>,
        #[serde(default)]
        group: Option<String>,
        #[serde(default)]
        order: Option<i32>,
        #[serde(default)]
        priority: bool,
    },
    /// A registrar registering fixed definitions.
    Registrar {
        class: String,
        #[serde(default)]
        definitions: Vec<RegistrarDefinition>,
    },
    /// An import group with an ordering strategy.
    Group {
        class: String,
        #[serde(default)]
        strategy: GroupStrategy,
    },
    /// A condition with a fixed outcome or a property check.
    Condition {
        class: String,
        #[serde(default)]
        matches: Option<bool>,
        #[serde(default)]
        property: Option<String>,
        #[serde(default)]
        having_value: Option<String>,
        #[serde(default)]
        phase: Option<ConfigurationPhase>,
        #[serde(default)]
        order: Option<i32>,
        #[serde(default)]
        priority: bool,
    },
}

impl PluginSpec {
    pub fn class_name(&self) -> &str {
        match self {
            PluginSpec::Selector { class, .. }
            | PluginSpec::DeferredSelector { class, .. }
            | PluginSpec::Registrar { class, .. }
            | PluginSpec::Group { class, .. }
            | PluginSpec::Condition { class, .. } => class,
        }
    }
}

/// A complete resolver descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Descriptor {
    pub settings: ResolverSettings,
    pub environment: EnvironmentSpec,
    /// Base directory for file resources; relative to the descriptor.
    pub resources: Option<PathBuf>,
    /// Resources served from memory, keyed by location.
    pub resources_inline: BTreeMap<String, String>,
    pub roots: Vec<RootSpec>,
    pub classes: Vec<ClassMetadata>,
    /// Source declaration order of methods, for reflective classes.
    pub method_order: BTreeMap<String, Vec<String>>,
    pub plugins: Vec<PluginSpec>,
}

/// Serialization format of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorFormat {
    Yaml,
    Json,
    Toml,
}

impl DescriptorFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => DescriptorFormat::Json,
            Some("toml") => DescriptorFormat::Toml,
            _ => DescriptorFormat::Yaml,
        }
    }
}

/// Parse a descriptor from a string.
pub fn parse(content: &str, format: DescriptorFormat) -> Result<Descriptor> {
    let descriptor: Descriptor = match format {
        DescriptorFormat::Yaml => {
            if content.trim().is_empty() {
                Descriptor::default()
            } else {
                serde_yaml::from_str(content)?
            }
        }
        DescriptorFormat::Json => serde_json::from_str(content)?,
        DescriptorFormat::Toml => toml::from_str(content)?,
    };
    validate(&descriptor)?;
    Ok(descriptor)
}

/// Parse a descriptor file, choosing the format by extension.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Descriptor> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content, DescriptorFormat::from_path(path))
}

fn validate(descriptor: &Descriptor) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for class in &descriptor.classes {
        if class.name.is_empty() {
            return Err(Error::ConfigParse {
                message: "Class entry without a name".to_string(),
                hint: Some("Every entry under 'classes' needs a 'name'".to_string()),
            });
        }
        if !seen.insert(class.name.as_str()) {
            return Err(Error::ConfigParse {
                message: format!("Class '{}' is declared more than once", class.name),
                hint: Some("Merge the duplicate entries under 'classes'".to_string()),
            });
        }
    }
    for root in &descriptor.roots {
        if root.class_name().is_empty() {
            return Err(Error::ConfigParse {
                message: "Root entry without a class name".to_string(),
                hint: None,
            });
        }
    }
    let mut plugins = std::collections::HashSet::new();
    for plugin in &descriptor.plugins {
        if !plugins.insert(plugin.class_name()) {
            return Err(Error::ConfigParse {
                message: format!("Plugin '{}' is declared more than once", plugin.class_name()),
                hint: Some("Each plugin class may be declared once".to_string()),
            });
        }
    }
    if descriptor.settings.max_import_depth == 0 {
        return Err(Error::ConfigParse {
            message: "max_import_depth must be at least 1".to_string(),
            hint: None,
        });
    }
    Ok(())
}
