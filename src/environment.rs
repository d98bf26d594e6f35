//! # Environment
//!
//! The environment is the engine's view of externalized configuration: an
//! ordered, mutable list of named property sources plus active and default
//! profiles. Lookups consult sources front to back and the first source that
//! defines a key wins.
//!
//! Property sources discovered during resolution are merged into this list by
//! the resolution layer; see `resolution::property_sources`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use log::warn;

use crate::error::{Error, Result};
use crate::placeholder::PlaceholderHelper;
use crate::profiles::ProfileExpression;

/// Name of the property source holding process environment variables.
pub const SYSTEM_ENVIRONMENT: &str = "systemEnvironment";

/// Profile assumed active when none is set explicitly.
pub const DEFAULT_PROFILE: &str = "default";

/// The environment shared by every participant of one resolution run.
pub type SharedEnvironment = Rc<RefCell<dyn Environment>>;

/// A flat key/value property source.
#[derive(Debug, Clone, PartialEq)]
pub struct MapPropertySource {
    pub name: String,
    /// Description of the backing resource, when the source was loaded from one.
    pub resource_name: Option<String>,
    pub properties: BTreeMap<String, String>,
}

impl MapPropertySource {
    pub fn new(name: impl Into<String>, properties: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            resource_name: None,
            properties,
        }
    }
}

/// Several sources sharing one logical name, queried in list order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositePropertySource {
    pub name: String,
    pub sources: Vec<PropertySource>,
}

impl CompositePropertySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
        }
    }

    pub fn add(&mut self, source: PropertySource) {
        self.sources.push(source);
    }

    /// Adds `source` ahead of every existing member.
    pub fn add_first(&mut self, source: PropertySource) {
        self.sources.retain(|existing| existing.name() != source.name());
        self.sources.insert(0, source);
    }
}

/// A named source of properties.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertySource {
    Map(MapPropertySource),
    Composite(CompositePropertySource),
}

impl PropertySource {
    pub fn name(&self) -> &str {
        match self {
            PropertySource::Map(map) => &map.name,
            PropertySource::Composite(composite) => &composite.name,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        match self {
            PropertySource::Map(map) => map.properties.get(key).map(String::as_str),
            PropertySource::Composite(composite) => {
                composite.sources.iter().find_map(|source| source.get(key))
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Renames a resource-backed source after its resource so members of a
    /// composite stay distinguishable.
    pub fn with_resource_name(self) -> PropertySource {
        match self {
            PropertySource::Map(mut map) => {
                if let Some(resource_name) = &map.resource_name {
                    map.name = resource_name.clone();
                }
                PropertySource::Map(map)
            }
            composite => composite,
        }
    }

    /// Names of the member sources, or this source's own name for a map.
    pub fn member_names(&self) -> Vec<String> {
        match self {
            PropertySource::Map(map) => vec![map.name.clone()],
            PropertySource::Composite(composite) => composite
                .sources
                .iter()
                .map(|source| source.name().to_string())
                .collect(),
        }
    }
}

/// Ordered list of property sources; earlier entries take precedence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutablePropertySources {
    sources: Vec<PropertySource>,
}

impl MutablePropertySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&PropertySource> {
        self.sources.iter().find(|source| source.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut PropertySource> {
        self.sources.iter_mut().find(|source| source.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn add_first(&mut self, source: PropertySource) {
        self.remove(source.name());
        self.sources.insert(0, source);
    }

    pub fn add_last(&mut self, source: PropertySource) {
        self.remove(source.name());
        self.sources.push(source);
    }

    /// Inserts `source` immediately ahead of the source named `relative`.
    pub fn add_before(&mut self, relative: &str, source: PropertySource) -> Result<()> {
        if relative == source.name() {
            return Err(Error::PropertySource {
                location: relative.to_string(),
                message: "a property source cannot be added relative to itself".to_string(),
            });
        }
        self.remove(source.name());
        let index = self.index_of(relative)?;
        self.sources.insert(index, source);
        Ok(())
    }

    /// Inserts `source` immediately after the source named `relative`.
    pub fn add_after(&mut self, relative: &str, source: PropertySource) -> Result<()> {
        if relative == source.name() {
            return Err(Error::PropertySource {
                location: relative.to_string(),
                message: "a property source cannot be added relative to itself".to_string(),
            });
        }
        self.remove(source.name());
        let index = self.index_of(relative)?;
        self.sources.insert(index + 1, source);
        Ok(())
    }

    /// Replaces the source named `name`, keeping its position.
    pub fn replace(&mut self, name: &str, source: PropertySource) -> Result<()> {
        let index = self.index_of(name)?;
        self.sources[index] = source;
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertySource> {
        let index = self.sources.iter().position(|source| source.name() == name)?;
        Some(self.sources.remove(index))
    }

    pub fn names(&self) -> Vec<String> {
        self.sources
            .iter()
            .map(|source| source.name().to_string())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertySource> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// First value for `key`, consulting sources in order.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.sources.iter().find_map(|source| source.get(key))
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.sources
            .iter()
            .position(|source| source.name() == name)
            .ok_or_else(|| Error::MissingPropertySource {
                name: name.to_string(),
            })
    }
}

/// Placeholder resolution and profile checks over ordered property sources.
pub trait Environment {
    fn property_sources(&self) -> &MutablePropertySources;

    /// Mutable access to the source list; `None` when the environment is not
    /// configurable.
    fn property_sources_mut(&mut self) -> Option<&mut MutablePropertySources> {
        None
    }

    fn is_configurable(&self) -> bool {
        false
    }

    fn active_profiles(&self) -> Vec<String>;

    fn default_profiles(&self) -> Vec<String>;

    /// Raw value for `key`, without placeholder expansion.
    fn raw_property(&self, key: &str) -> Option<String> {
        self.property_sources().property(key).map(str::to_string)
    }

    /// Value for `key` with nested placeholders expanded where possible.
    fn get_property(&self, key: &str) -> Option<String> {
        let raw = self.raw_property(key)?;
        match self.resolve_placeholders(&raw) {
            Ok(resolved) => Some(resolved),
            Err(_) => Some(raw),
        }
    }

    fn contains_property(&self, key: &str) -> bool {
        self.property_sources().property(key).is_some()
    }

    /// Expands placeholders, leaving unresolvable ones untouched.
    fn resolve_placeholders(&self, text: &str) -> Result<String> {
        PlaceholderHelper::new(true).replace_placeholders(text, &|key: &str| self.raw_property(key))
    }

    /// Expands placeholders, failing on any that cannot be resolved.
    fn resolve_required_placeholders(&self, text: &str) -> Result<String> {
        PlaceholderHelper::new(false).replace_placeholders(text, &|key: &str| self.raw_property(key))
    }

    /// Whether any of the profile expressions matches the active profiles,
    /// or the default profiles when none are active.
    ///
    /// A malformed expression is logged and never matches.
    fn accepts_profiles(&self, profiles: &[String]) -> bool {
        let active = self.active_profiles();
        let effective = if active.is_empty() {
            self.default_profiles()
        } else {
            active
        };
        let is_active = |profile: &str| effective.iter().any(|p| p == profile);
        profiles
            .iter()
            .any(|expression| match ProfileExpression::parse(expression) {
                Ok(parsed) => parsed.matches(&is_active),
                Err(e) => {
                    warn!("{}", e);
                    false
                }
            })
    }
}

/// The standard configurable environment.
#[derive(Debug, Clone)]
pub struct StandardEnvironment {
    sources: MutablePropertySources,
    active_profiles: Vec<String>,
    default_profiles: Vec<String>,
    configurable: bool,
}

impl StandardEnvironment {
    /// An environment with no property sources and the `default` profile.
    pub fn new() -> Self {
        Self {
            sources: MutablePropertySources::new(),
            active_profiles: Vec::new(),
            default_profiles: vec![DEFAULT_PROFILE.to_string()],
            configurable: true,
        }
    }

    /// Appends a source with the process environment variables.
    pub fn with_system_environment(mut self) -> Self {
        let properties: BTreeMap<String, String> = std::env::vars().collect();
        self.sources.add_last(PropertySource::Map(MapPropertySource::new(
            SYSTEM_ENVIRONMENT,
            properties,
        )));
        self
    }

    /// Appends a map source.
    pub fn with_properties(
        mut self,
        name: impl Into<String>,
        properties: BTreeMap<String, String>,
    ) -> Self {
        self.sources
            .add_last(PropertySource::Map(MapPropertySource::new(name, properties)));
        self
    }

    pub fn with_active_profiles(mut self, profiles: Vec<String>) -> Self {
        self.active_profiles = profiles;
        self
    }

    pub fn with_default_profiles(mut self, profiles: Vec<String>) -> Self {
        self.default_profiles = profiles;
        self
    }

    /// Freezes the source list against changes made through the trait.
    pub fn read_only(mut self) -> Self {
        self.configurable = false;
        self
    }

    pub fn into_shared(self) -> SharedEnvironment {
        Rc::new(RefCell::new(self))
    }
}

impl Default for StandardEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for StandardEnvironment {
    fn property_sources(&self) -> &MutablePropertySources {
        &self.sources
    }

    fn property_sources_mut(&mut self) -> Option<&mut MutablePropertySources> {
        if self.configurable {
            Some(&mut self.sources)
        } else {
            None
        }
    }

    fn is_configurable(&self) -> bool {
        self.configurable
    }

    fn active_profiles(&self) -> Vec<String> {
        self.active_profiles.clone()
    }

    fn default_profiles(&self) -> Vec<String> {
        self.default_profiles.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_source(name: &str, pairs: &[(&str, &str)]) -> PropertySource {
        PropertySource::Map(MapPropertySource::new(
            name,
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ))
    }

    #[test]
    fn test_first_source_wins() {
        let mut sources = MutablePropertySources::new();
        sources.add_last(map_source("a", &[("key", "from-a")]));
        sources.add_last(map_source("b", &[("key", "from-b"), ("only", "b")]));
        assert_eq!(sources.property("key"), Some("from-a"));
        assert_eq!(sources.property("only"), Some("b"));
    }

    #[test]
    fn test_add_before_and_replace_keep_positions() {
        let mut sources = MutablePropertySources::new();
        sources.add_last(map_source("base", &[]));
        sources.add_last(map_source("p1", &[]));
        sources.add_before("p1", map_source("p2", &[])).unwrap();
        assert_eq!(sources.names(), vec!["base", "p2", "p1"]);

        sources
            .replace("p2", PropertySource::Composite(CompositePropertySource::new("p2")))
            .unwrap();
        assert_eq!(sources.names(), vec!["base", "p2", "p1"]);
        assert!(matches!(sources.get("p2"), Some(PropertySource::Composite(_))));
    }

    #[test]
    fn test_add_before_missing_relative() {
        let mut sources = MutablePropertySources::new();
        let error = sources.add_before("nope", map_source("x", &[])).unwrap_err();
        assert!(matches!(error, Error::MissingPropertySource { .. }));
    }

    #[test]
    fn test_composite_queries_members_in_order() {
        let mut composite = CompositePropertySource::new("app");
        composite.add(map_source("old", &[("k", "old"), ("o", "1")]));
        composite.add_first(map_source("new", &[("k", "new")]));
        let source = PropertySource::Composite(composite);
        assert_eq!(source.get("k"), Some("new"));
        assert_eq!(source.get("o"), Some("1"));
        assert_eq!(source.member_names(), vec!["new", "old"]);
    }

    #[test]
    fn test_get_property_expands_values() {
        let env = StandardEnvironment::new().with_properties(
            "test",
            [("host", "example.org"), ("url", "https://${host}/")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        assert_eq!(env.get_property("url").as_deref(), Some("https://example.org/"));
        assert_eq!(
            env.resolve_required_placeholders("${host}:${port:80}").unwrap(),
            "example.org:80"
        );
        assert!(env.resolve_required_placeholders("${nope}").is_err());
        assert_eq!(env.resolve_placeholders("${nope}").unwrap(), "${nope}");
    }

    #[test]
    fn test_profiles_fall_back_to_defaults() {
        let env = StandardEnvironment::new();
        assert!(env.accepts_profiles(&["default".to_string()]));
        assert!(!env.accepts_profiles(&["prod".to_string()]));
        assert!(env.accepts_profiles(&["!prod".to_string()]));

        let env = env.with_active_profiles(vec!["prod".to_string()]);
        assert!(env.accepts_profiles(&["prod".to_string()]));
        assert!(!env.accepts_profiles(&["default".to_string()]));
        assert!(env.accepts_profiles(&["dev".to_string(), "prod".to_string()]));
    }

    #[test]
    fn test_profile_expressions() {
        let env = StandardEnvironment::new()
            .with_active_profiles(vec!["prod".to_string(), "eu-central".to_string()]);
        assert!(env.accepts_profiles(&["prod & (us-east | eu-central)".to_string()]));
        assert!(!env.accepts_profiles(&["prod & !eu-central".to_string()]));
        assert!(env.accepts_profiles(&["dev | prod".to_string()]));
    }

    #[test]
    fn test_malformed_profile_expression_is_logged_and_rejected() {
        testing_logger::setup();
        let env = StandardEnvironment::new().with_active_profiles(vec!["a".to_string()]);
        assert!(!env.accepts_profiles(&["a & b | c".to_string()]));
        testing_logger::validate(|logs| {
            assert_eq!(logs.len(), 1);
            assert_eq!(logs[0].level, log::Level::Warn);
            assert!(logs[0].body.contains("a & b | c"));
        });
    }

    #[test]
    fn test_read_only_environment() {
        let mut env = StandardEnvironment::new().read_only();
        assert!(!env.is_configurable());
        assert!(env.property_sources_mut().is_none());
    }
}
