//! Built-in plugins.
//!
//! Conditions backing the `Profile` and `ConditionalOnProperty` annotations,
//! the default property-source factory, and the declarative plugins a
//! descriptor file can declare (fixed selectors, registrars, groups and
//! conditions).

use std::rc::Rc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::annotations::{CONDITIONAL_ON_PROPERTY, ON_PROPERTY_CONDITION, PROFILE, PROFILE_CONDITION};
use crate::config::PluginSpec;
use crate::environment::SharedEnvironment;
use crate::error::Result;
use crate::metadata::{AnnotatedElement, ClassMetadata};
use crate::ordering::{Order, HIGHEST_PRECEDENCE, LOWEST_PRECEDENCE};
use crate::plugin::{
    Capability, Condition, ConditionContext, ConfigurationPhase, Constructor, DeferredImportSelector,
    Dependency, GroupEntry, ImportBeanDefinitionRegistrar, ImportGroup, ImportSelector,
    PluginDefinition, PluginFactory, PluginInstance,
};
use crate::registry::{BeanDefinition, BeanDefinitionRegistry, DefinitionOrigin};
use crate::resource::DefaultPropertySourceFactory;

/// Class name of the default property-source factory.
pub const DEFAULT_PROPERTY_SOURCE_FACTORY: &str = "confgraph.DefaultPropertySourceFactory";

/// Registers the plugins every factory starts with.
pub fn register_builtins(factory: &mut PluginFactory) {
    factory.register_simple(PROFILE_CONDITION, Capability::Condition, || {
        PluginInstance::Condition(Rc::new(ProfileCondition))
    });
    factory.register_simple(ON_PROPERTY_CONDITION, Capability::Condition, || {
        PluginInstance::Condition(Rc::new(OnPropertyCondition))
    });
    factory.register_simple(
        DEFAULT_PROPERTY_SOURCE_FACTORY,
        Capability::PropertySourceFactory,
        || PluginInstance::PropertySourceFactory(Rc::new(DefaultPropertySourceFactory)),
    );
}

/// Matches when any profile expression listed on the element's `Profile`
/// annotation is accepted; see [`crate::profiles`] for the grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileCondition;

impl Condition for ProfileCondition {
    fn matches(&self, context: &ConditionContext, element: &dyn AnnotatedElement) -> bool {
        let environment = context.environment.borrow();
        element
            .all_annotations_of(PROFILE)
            .iter()
            .all(|annotation| environment.accepts_profiles(&annotation.strings("value")))
    }
}

/// Matches when the named properties are present and, optionally, have a given value.
///
/// Attributes: `name` (or `value`), `prefix`, `having_value`, `match_if_missing`.
/// Without `having_value`, any value other than `false` matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnPropertyCondition;

impl Condition for OnPropertyCondition {
    fn matches(&self, context: &ConditionContext, element: &dyn AnnotatedElement) -> bool {
        let environment = context.environment.borrow();
        for annotation in element.all_annotations_of(CONDITIONAL_ON_PROPERTY) {
            let prefix = annotation
                .string("prefix")
                .map(|p| p.trim_end_matches('.').to_string())
                .filter(|p| !p.is_empty());
            let having_value = annotation.string("having_value");
            let match_if_missing = annotation.bool("match_if_missing").unwrap_or(false);

            let mut names = annotation.strings("name");
            names.extend(annotation.strings("value"));
            for name in names {
                let key = match &prefix {
                    Some(prefix) => format!("{}.{}", prefix, name),
                    None => name,
                };
                let matched = match environment.get_property(&key) {
                    None => match_if_missing,
                    Some(value) => match &having_value {
                        Some(expected) => value.eq_ignore_ascii_case(expected),
                        None => !value.eq_ignore_ascii_case("false"),
                    },
                };
                if !matched {
                    debug!("Property '{}' does not match on {}", key, element.element_name());
                    return false;
                }
            }
        }
        true
    }

    fn order(&self) -> Order {
        Order::of(HIGHEST_PRECEDENCE + 40)
    }
}

/// How an [`OrderingImportGroup`] arranges the imports it collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStrategy {
    /// Collection order.
    #[default]
    Declared,
    /// Collection order reversed.
    Reverse,
    /// Sorted by imported class name.
    Sorted,
}

/// A group that collects every member selector's imports and emits them
/// according to a [`GroupStrategy`].
#[derive(Debug, Default)]
pub struct OrderingImportGroup {
    strategy: GroupStrategy,
    entries: Vec<GroupEntry>,
}

impl OrderingImportGroup {
    pub fn new(strategy: GroupStrategy) -> Self {
        Self {
            strategy,
            entries: Vec::new(),
        }
    }
}

impl ImportGroup for OrderingImportGroup {
    fn process(
        &mut self,
        importing: &Rc<ClassMetadata>,
        selector: &dyn DeferredImportSelector,
    ) -> Result<()> {
        for import_class_name in selector.select_imports(importing)? {
            self.entries.push(GroupEntry {
                importing: Rc::clone(importing),
                import_class_name,
            });
        }
        Ok(())
    }

    fn select_imports(&mut self) -> Result<Vec<GroupEntry>> {
        let mut entries = std::mem::take(&mut self.entries);
        match self.strategy {
            GroupStrategy::Declared => {}
            GroupStrategy::Reverse => entries.reverse(),
            GroupStrategy::Sorted => {
                entries.sort_by(|a, b| a.import_class_name.cmp(&b.import_class_name))
            }
        }
        Ok(entries)
    }
}

/// Expands placeholders in import names when an environment was injected.
fn expand_imports(imports: &[String], environment: &Option<SharedEnvironment>) -> Result<Vec<String>> {
    match environment {
        Some(environment) => {
            let environment = environment.borrow();
            imports
                .iter()
                .map(|name| environment.resolve_required_placeholders(name))
                .collect()
        }
        None => Ok(imports.to_vec()),
    }
}

/// An import selector returning a fixed list of class names.
#[derive(Clone)]
pub struct StaticImportSelector {
    imports: Vec<String>,
    environment: Option<SharedEnvironment>,
}

impl StaticImportSelector {
    pub fn new(imports: Vec<String>, environment: Option<SharedEnvironment>) -> Self {
        Self {
            imports,
            environment,
        }
    }
}

impl ImportSelector for StaticImportSelector {
    fn select_imports(&self, _importing: &ClassMetadata) -> Result<Vec<String>> {
        expand_imports(&self.imports, &self.environment)
    }
}

/// A deferred selector returning a fixed list of class names.
#[derive(Clone)]
pub struct StaticDeferredImportSelector {
    imports: Vec<String>,
    group: Option<String>,
    order: Order,
    environment: Option<SharedEnvironment>,
}

impl StaticDeferredImportSelector {
    pub fn new(
        imports: Vec<String>,
        group: Option<String>,
        order: Order,
        environment: Option<SharedEnvironment>,
    ) -> Self {
        Self {
            imports,
            group,
            order,
            environment,
        }
    }
}

impl DeferredImportSelector for StaticDeferredImportSelector {
    fn select_imports(&self, _importing: &ClassMetadata) -> Result<Vec<String>> {
        expand_imports(&self.imports, &self.environment)
    }

    fn import_group(&self) -> Option<String> {
        self.group.clone()
    }

    fn order(&self) -> Order {
        self.order
    }
}

/// A definition a [`StaticRegistrar`] registers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrarDefinition {
    pub name: String,
    pub class: String,
}

/// Registers a fixed set of definitions unless their names are taken.
#[derive(Debug, Clone)]
pub struct StaticRegistrar {
    definitions: Vec<RegistrarDefinition>,
}

impl StaticRegistrar {
    pub fn new(definitions: Vec<RegistrarDefinition>) -> Self {
        Self { definitions }
    }
}

impl ImportBeanDefinitionRegistrar for StaticRegistrar {
    fn register_bean_definitions(
        &self,
        importing: &ClassMetadata,
        registry: &mut dyn BeanDefinitionRegistry,
    ) -> Result<()> {
        for definition in &self.definitions {
            if registry.contains(&definition.name) {
                continue;
            }
            debug!(
                "Registering '{}' on behalf of {}",
                definition.name, importing.name
            );
            registry.register(
                &definition.name,
                BeanDefinition::for_class(&definition.class).with_origin(DefinitionOrigin::Registrar),
            )?;
        }
        Ok(())
    }
}

/// A condition declared in a descriptor.
///
/// A fixed `outcome` wins; otherwise the condition checks a property, and
/// with neither it matches.
#[derive(Debug, Clone, Default)]
pub struct DeclaredCondition {
    pub outcome: Option<bool>,
    pub property: Option<String>,
    pub having_value: Option<String>,
    pub phase: Option<ConfigurationPhase>,
    pub order: Order,
}

impl Condition for DeclaredCondition {
    fn matches(&self, context: &ConditionContext, _element: &dyn AnnotatedElement) -> bool {
        if let Some(outcome) = self.outcome {
            return outcome;
        }
        let Some(property) = &self.property else {
            return true;
        };
        let value = context.environment.borrow().get_property(property);
        match (&self.having_value, value) {
            (Some(expected), Some(value)) => &value == expected,
            (None, Some(value)) => value != "false",
            (_, None) => false,
        }
    }

    fn required_phase(&self) -> Option<ConfigurationPhase> {
        self.phase
    }

    fn order(&self) -> Order {
        self.order
    }
}

fn declared_order(order: Option<i32>, priority: bool) -> Order {
    if priority {
        Order::priority(order.unwrap_or(LOWEST_PRECEDENCE))
    } else {
        Order::from_value(order)
    }
}

/// Registers a descriptor-declared plugin with the factory.
pub fn register_declared(factory: &mut PluginFactory, spec: &PluginSpec) {
    match spec.clone() {
        PluginSpec::Selector { class, imports } => {
            let with_env = imports.clone();
            factory.register(
                PluginDefinition::new(class, Capability::ImportSelector)
                    .with_constructor(Constructor::new(&[], move |_| {
                        Ok(PluginInstance::ImportSelector(Rc::new(StaticImportSelector::new(
                            imports.clone(),
                            None,
                        ))))
                    }))
                    .with_constructor(Constructor::new(&[Dependency::Environment], move |injected| {
                        Ok(PluginInstance::ImportSelector(Rc::new(StaticImportSelector::new(
                            with_env.clone(),
                            injected.environment.clone(),
                        ))))
                    })),
            );
        }
        PluginSpec::DeferredSelector {
            class,
            imports,
            group,
            order,
            priority,
        } => {
            let order = declared_order(order, priority);
            let with_env = imports.clone();
            let env_group = group.clone();
            factory.register(
                PluginDefinition::new(class, Capability::DeferredImportSelector)
                    .with_constructor(Constructor::new(&[], move |_| {
                        Ok(PluginInstance::DeferredImportSelector(Rc::new(
                            StaticDeferredImportSelector::new(imports.clone(), group.clone(), order, None),
                        )))
                    }))
                    .with_constructor(Constructor::new(&[Dependency::Environment], move |injected| {
                        Ok(PluginInstance::DeferredImportSelector(Rc::new(
                            StaticDeferredImportSelector::new(
                                with_env.clone(),
                                env_group.clone(),
                                order,
                                injected.environment.clone(),
                            ),
                        )))
                    })),
            );
        }
        PluginSpec::Registrar { class, definitions } => {
            factory.register_simple(&class, Capability::Registrar, move || {
                PluginInstance::Registrar(Rc::new(StaticRegistrar::new(definitions.clone())))
            });
        }
        PluginSpec::Group { class, strategy } => {
            factory.register_simple(&class, Capability::ImportGroup, move || {
                PluginInstance::ImportGroup(Box::new(OrderingImportGroup::new(strategy)))
            });
        }
        PluginSpec::Condition {
            class,
            matches,
            property,
            having_value,
            phase,
            order,
            priority,
        } => {
            let condition = DeclaredCondition {
                outcome: matches,
                property,
                having_value,
                phase,
                order: declared_order(order, priority),
            };
            factory.register_simple(&class, Capability::Condition, move || {
                PluginInstance::Condition(Rc::new(condition.clone()))
            });
        }
    }
}
