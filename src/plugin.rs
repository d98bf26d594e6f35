//! # Extension Points and Plugin Construction
//!
//! Configuration sources name extension classes (conditions, import
//! selectors, registrars, groups, property-source factories) by class name.
//! The [`PluginFactory`] maps those names to constructors and builds
//! instances on demand.
//!
//! ## Construction Protocol
//!
//! Each plugin declares one or more [`Constructor`]s, each with the context
//! objects it needs (environment, resource loader, registry). When an
//! instance is requested, the factory picks the constructor with the most
//! parameters that the caller can satisfy and injects exactly those
//! parameters. A constructor without parameters is the fallback.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::environment::{PropertySource, SharedEnvironment};
use crate::error::{Error, Result};
use crate::metadata::{AnnotatedElement, ClassMetadata};
use crate::ordering::Order;
use crate::registry::{BeanDefinitionRegistry, SharedRegistry};
use crate::resource::{EncodedResource, SharedResourceLoader};

/// The resolution phase a condition is evaluated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigurationPhase {
    /// While a configuration source is being parsed.
    ParseConfiguration,
    /// While regular bean definitions are being registered.
    RegisterBean,
}

impl fmt::Display for ConfigurationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationPhase::ParseConfiguration => write!(f, "parse"),
            ConfigurationPhase::RegisterBean => write!(f, "register"),
        }
    }
}

/// Context objects handed to conditions.
#[derive(Clone)]
pub struct ConditionContext {
    pub environment: SharedEnvironment,
    pub resource_loader: SharedResourceLoader,
    pub registry: SharedRegistry,
}

/// A predicate deciding whether an annotated element takes part in resolution.
pub trait Condition {
    fn matches(&self, context: &ConditionContext, element: &dyn AnnotatedElement) -> bool;

    /// Restricts evaluation to one phase; `None` evaluates in every phase.
    fn required_phase(&self) -> Option<ConfigurationPhase> {
        None
    }

    fn order(&self) -> Order {
        Order::unordered()
    }
}

/// Computes class names to import, evaluated immediately.
pub trait ImportSelector {
    fn select_imports(&self, importing: &ClassMetadata) -> Result<Vec<String>>;
}

/// An import selector evaluated after the synchronous walk, optionally in a group.
pub trait DeferredImportSelector {
    fn select_imports(&self, importing: &ClassMetadata) -> Result<Vec<String>>;

    /// Class name of the [`ImportGroup`] coordinating this selector.
    fn import_group(&self) -> Option<String> {
        None
    }

    fn order(&self) -> Order {
        Order::unordered()
    }
}

/// One import decided by a group.
#[derive(Debug, Clone)]
pub struct GroupEntry {
    pub importing: Rc<ClassMetadata>,
    pub import_class_name: String,
}

/// Merges several deferred selectors into one ordered import sequence.
pub trait ImportGroup {
    fn process(
        &mut self,
        importing: &Rc<ClassMetadata>,
        selector: &dyn DeferredImportSelector,
    ) -> Result<()>;

    fn select_imports(&mut self) -> Result<Vec<GroupEntry>>;
}

/// Registers definitions directly on behalf of the importing class.
pub trait ImportBeanDefinitionRegistrar {
    fn register_bean_definitions(
        &self,
        importing: &ClassMetadata,
        registry: &mut dyn BeanDefinitionRegistry,
    ) -> Result<()>;
}

/// Builds a property source from a resource.
pub trait PropertySourceFactory {
    fn create_property_source(
        &self,
        name: Option<&str>,
        resource: &EncodedResource,
    ) -> Result<PropertySource>;
}

/// What an extension class can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Condition,
    ImportSelector,
    DeferredImportSelector,
    Registrar,
    ImportGroup,
    PropertySourceFactory,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Condition => "Condition",
            Capability::ImportSelector => "ImportSelector",
            Capability::DeferredImportSelector => "DeferredImportSelector",
            Capability::Registrar => "ImportBeanDefinitionRegistrar",
            Capability::ImportGroup => "ImportGroup",
            Capability::PropertySourceFactory => "PropertySourceFactory",
        };
        write!(f, "{}", name)
    }
}

/// A constructed extension instance.
pub enum PluginInstance {
    Condition(Rc<dyn Condition>),
    ImportSelector(Rc<dyn ImportSelector>),
    DeferredImportSelector(Rc<dyn DeferredImportSelector>),
    Registrar(Rc<dyn ImportBeanDefinitionRegistrar>),
    ImportGroup(Box<dyn ImportGroup>),
    PropertySourceFactory(Rc<dyn PropertySourceFactory>),
}

impl PluginInstance {
    pub fn capability(&self) -> Capability {
        match self {
            PluginInstance::Condition(_) => Capability::Condition,
            PluginInstance::ImportSelector(_) => Capability::ImportSelector,
            PluginInstance::DeferredImportSelector(_) => Capability::DeferredImportSelector,
            PluginInstance::Registrar(_) => Capability::Registrar,
            PluginInstance::ImportGroup(_) => Capability::ImportGroup,
            PluginInstance::PropertySourceFactory(_) => Capability::PropertySourceFactory,
        }
    }
}

impl fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PluginInstance({})", self.capability())
    }
}

/// A context object a constructor may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dependency {
    Environment,
    ResourceLoader,
    Registry,
}

/// Context objects available for injection.
#[derive(Clone, Default)]
pub struct Injected {
    pub environment: Option<SharedEnvironment>,
    pub resource_loader: Option<SharedResourceLoader>,
    pub registry: Option<SharedRegistry>,
}

impl Injected {
    fn provides(&self, dependency: Dependency) -> bool {
        match dependency {
            Dependency::Environment => self.environment.is_some(),
            Dependency::ResourceLoader => self.resource_loader.is_some(),
            Dependency::Registry => self.registry.is_some(),
        }
    }

    /// Only the declared dependencies.
    fn restricted_to(&self, params: &[Dependency]) -> Injected {
        Injected {
            environment: params
                .contains(&Dependency::Environment)
                .then(|| self.environment.clone())
                .flatten(),
            resource_loader: params
                .contains(&Dependency::ResourceLoader)
                .then(|| self.resource_loader.clone())
                .flatten(),
            registry: params
                .contains(&Dependency::Registry)
                .then(|| self.registry.clone())
                .flatten(),
        }
    }
}

type BuildFn = Rc<dyn Fn(&Injected) -> Result<PluginInstance>>;

/// One constructor shape of a plugin class.
#[derive(Clone)]
pub struct Constructor {
    params: Vec<Dependency>,
    build: BuildFn,
}

impl Constructor {
    pub fn new(
        params: &[Dependency],
        build: impl Fn(&Injected) -> Result<PluginInstance> + 'static,
    ) -> Self {
        Self {
            params: params.to_vec(),
            build: Rc::new(build),
        }
    }

    pub fn params(&self) -> &[Dependency] {
        &self.params
    }
}

/// A plugin class known to the factory.
#[derive(Clone)]
pub struct PluginDefinition {
    class_name: String,
    capability: Capability,
    constructors: Vec<Constructor>,
}

impl PluginDefinition {
    pub fn new(class_name: impl Into<String>, capability: Capability) -> Self {
        Self {
            class_name: class_name.into(),
            capability,
            constructors: Vec::new(),
        }
    }

    pub fn with_constructor(mut self, constructor: Constructor) -> Self {
        self.constructors.push(constructor);
        self
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }
}

/// Maps extension class names to constructors.
#[derive(Clone, Default)]
pub struct PluginFactory {
    definitions: HashMap<String, PluginDefinition>,
}

impl PluginFactory {
    /// A factory with no plugins registered.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A factory preloaded with the built-in conditions and factories.
    pub fn new() -> Self {
        let mut factory = Self::empty();
        crate::builtin::register_builtins(&mut factory);
        factory
    }

    pub fn register(&mut self, definition: PluginDefinition) -> &mut Self {
        self.definitions
            .insert(definition.class_name.clone(), definition);
        self
    }

    /// Registers a plugin with a single no-argument constructor.
    pub fn register_simple(
        &mut self,
        class_name: &str,
        capability: Capability,
        build: impl Fn() -> PluginInstance + 'static,
    ) -> &mut Self {
        self.register(
            PluginDefinition::new(class_name, capability)
                .with_constructor(Constructor::new(&[], move |_| Ok(build()))),
        )
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.definitions.contains_key(class_name)
    }

    /// What the named class can do, without constructing it.
    pub fn capability(&self, class_name: &str) -> Option<Capability> {
        self.definitions
            .get(class_name)
            .map(|definition| definition.capability)
    }

    /// Constructs the named class through its richest satisfiable constructor.
    pub fn instantiate(&self, class_name: &str, available: &Injected) -> Result<PluginInstance> {
        let definition = self
            .definitions
            .get(class_name)
            .ok_or_else(|| Error::ClassNotFound {
                class_name: class_name.to_string(),
            })?;

        let mut chosen: Option<&Constructor> = None;
        for constructor in &definition.constructors {
            let satisfiable = constructor.params.iter().all(|p| available.provides(*p));
            let richer = chosen.map_or(true, |c| constructor.params.len() > c.params.len());
            if satisfiable && richer {
                chosen = Some(constructor);
            }
        }
        let constructor = chosen.ok_or_else(|| Error::Instantiation {
            class_name: class_name.to_string(),
            message: "no constructor can be satisfied from the available context".to_string(),
        })?;

        let instance = (constructor.build)(&available.restricted_to(&constructor.params))?;
        if instance.capability() != definition.capability {
            return Err(Error::Instantiation {
                class_name: class_name.to_string(),
                message: format!(
                    "constructor produced a {} but the class is declared as a {}",
                    instance.capability(),
                    definition.capability
                ),
            });
        }
        Ok(instance)
    }
}

impl fmt::Debug for PluginFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.definitions.keys().collect();
        names.sort();
        f.debug_struct("PluginFactory").field("plugins", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::StandardEnvironment;

    struct Fixed(Vec<String>);

    impl ImportSelector for Fixed {
        fn select_imports(&self, _importing: &ClassMetadata) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    fn selector_with(names: &[&str]) -> Result<PluginInstance> {
        Ok(PluginInstance::ImportSelector(Rc::new(Fixed(
            names.iter().map(|n| n.to_string()).collect(),
        ))))
    }

    fn shapes_factory() -> PluginFactory {
        let mut factory = PluginFactory::empty();
        factory.register(
            PluginDefinition::new("Shapes", Capability::ImportSelector)
                .with_constructor(Constructor::new(&[], |_| selector_with(&["none"])))
                .with_constructor(Constructor::new(&[Dependency::Environment], |injected| {
                    assert!(injected.environment.is_some());
                    assert!(injected.registry.is_none());
                    selector_with(&["env"])
                })),
        );
        factory
    }

    fn selected(instance: PluginInstance) -> Vec<String> {
        match instance {
            PluginInstance::ImportSelector(selector) => selector
                .select_imports(&ClassMetadata::new("Importer"))
                .unwrap(),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_richest_satisfiable_constructor_wins() {
        let factory = shapes_factory();
        let available = Injected {
            environment: Some(StandardEnvironment::new().into_shared()),
            registry: Some(crate::registry::SimpleBeanDefinitionRegistry::default().into_shared()),
            ..Injected::default()
        };
        assert_eq!(selected(factory.instantiate("Shapes", &available).unwrap()), vec!["env"]);
    }

    #[test]
    fn test_falls_back_to_no_argument_constructor() {
        let factory = shapes_factory();
        let instance = factory.instantiate("Shapes", &Injected::default()).unwrap();
        assert_eq!(selected(instance), vec!["none"]);
    }

    #[test]
    fn test_unknown_class() {
        let factory = PluginFactory::empty();
        assert!(matches!(
            factory.instantiate("Nope", &Injected::default()),
            Err(Error::ClassNotFound { .. })
        ));
        assert_eq!(factory.capability("Nope"), None);
    }

    #[test]
    fn test_unsatisfiable_constructor() {
        let mut factory = PluginFactory::empty();
        factory.register(
            PluginDefinition::new("NeedsRegistry", Capability::ImportSelector).with_constructor(
                Constructor::new(&[Dependency::Registry], |_| selector_with(&[])),
            ),
        );
        let error = factory
            .instantiate("NeedsRegistry", &Injected::default())
            .unwrap_err();
        assert!(matches!(error, Error::Instantiation { .. }));
    }

    #[test]
    fn test_capability_mismatch_is_rejected() {
        let mut factory = PluginFactory::empty();
        factory.register_simple("Liar", Capability::Registrar, || {
            PluginInstance::ImportSelector(Rc::new(Fixed(Vec::new())))
        });
        assert!(factory.instantiate("Liar", &Injected::default()).is_err());
    }
}
