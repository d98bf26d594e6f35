//! Loading resolved configuration classes into the registry.
//!
//! [`StandardDefinitionLoader`] is the reference loader used by the
//! orchestrator. For each class of a pass it:
//!
//! - skips the class when a register-phase condition says so, or when every
//!   class that imported it was skipped
//! - registers imported classes under their class name
//! - registers one factory-method definition per `Bean` method
//! - records `ImportResource` locations without loading them
//! - invokes retained registrars
//!
//! Skip decisions are tracked per call, so a class imported only by skipped
//! classes is skipped even if its own conditions match.

use std::collections::HashMap;

use log::{debug, info};

use crate::annotations::BEAN;
use crate::candidate::check_configuration_candidate;
use crate::error::{Error, Result};
use crate::metadata::{AnnotatedElement, MethodMetadata};
use crate::plugin::ConfigurationPhase;
use crate::registry::{BeanDefinition, DefinitionOrigin};
use crate::resolution::{ConditionEvaluator, ConfigurationClass, ResolutionContext};

/// What one loading call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Definition names registered, in order.
    pub registered: Vec<String>,
    /// Configuration classes skipped as a whole.
    pub skipped_classes: Vec<String>,
    /// Bean methods skipped by their own conditions, as `Class.method`.
    pub skipped_methods: Vec<String>,
}

/// Turns configuration classes into registry definitions.
pub trait DefinitionLoader {
    /// Loads `batch`. `known` holds every class parsed so far and is used to
    /// look up importers.
    fn load_definitions(
        &mut self,
        batch: &[ConfigurationClass],
        known: &[ConfigurationClass],
    ) -> Result<LoadReport>;
}

pub struct StandardDefinitionLoader {
    context: ResolutionContext,
    conditions: ConditionEvaluator,
}

impl StandardDefinitionLoader {
    pub fn new(context: &ResolutionContext) -> Self {
        Self {
            context: context.clone(),
            conditions: ConditionEvaluator::new(context),
        }
    }

    fn should_skip(
        &self,
        class: &ConfigurationClass,
        known: &[ConfigurationClass],
        tracked: &mut HashMap<String, bool>,
    ) -> Result<bool> {
        if let Some(skip) = tracked.get(class.name()) {
            return Ok(*skip);
        }
        // provisional entry guards against import cycles
        tracked.insert(class.name().to_string(), false);

        let mut skip = false;
        if class.is_imported() {
            let mut all_skipped = true;
            for importer in &class.imported_by {
                let importer_skipped = match known.iter().find(|c| c.name() == importer) {
                    Some(importer_class) => self.should_skip(importer_class, known, tracked)?,
                    None => false,
                };
                if !importer_skipped {
                    all_skipped = false;
                    break;
                }
            }
            skip = all_skipped;
        }
        if !skip {
            skip = self
                .conditions
                .should_skip(&*class.metadata, Some(ConfigurationPhase::RegisterBean))?;
        }
        tracked.insert(class.name().to_string(), skip);
        Ok(skip)
    }

    fn load_class(
        &self,
        class: &ConfigurationClass,
        known: &[ConfigurationClass],
        tracked: &mut HashMap<String, bool>,
        report: &mut LoadReport,
    ) -> Result<()> {
        if self.should_skip(class, known, tracked)? {
            if let Some(bean_name) = &class.bean_name {
                self.context.registry.borrow_mut().remove(bean_name);
            }
            debug!("Skipping configuration class {}", class.name());
            report.skipped_classes.push(class.name().to_string());
            return Ok(());
        }

        let factory_bean = match &class.bean_name {
            Some(bean_name) => bean_name.clone(),
            None if class.is_imported() => self.register_imported(class, report)?,
            None => class.name().to_string(),
        };

        for method in &class.bean_methods {
            self.load_bean_method(class, &factory_bean, method, report)?;
        }

        for resource in &class.imported_resources {
            info!(
                "Recorded resource import [{}] for {}{}",
                resource.location,
                class.name(),
                resource
                    .reader
                    .as_ref()
                    .map(|reader| format!(" (reader {})", reader))
                    .unwrap_or_default()
            );
        }

        for binding in &class.registrars {
            let before = self.context.registry.borrow().names();
            binding
                .registrar
                .register_bean_definitions(&binding.importing, &mut *self.context.registry.borrow_mut())
                .map_err(|e| {
                    e.in_store_context(format!(
                        "Failed to invoke registrar [{}] for configuration class [{}]",
                        binding.class_name,
                        class.name()
                    ))
                })?;
            let after = self.context.registry.borrow().names();
            report
                .registered
                .extend(after.into_iter().filter(|name| !before.contains(name)));
        }
        Ok(())
    }

    fn register_imported(&self, class: &ConfigurationClass, report: &mut LoadReport) -> Result<String> {
        let name = class.name().to_string();
        self.context.registry.borrow_mut().register(
            &name,
            BeanDefinition::for_class(&name).with_origin(DefinitionOrigin::Imported),
        )?;
        check_configuration_candidate(
            &mut *self.context.registry.borrow_mut(),
            &name,
            &self.context.reader,
        );
        debug!("Registered imported configuration class '{}'", name);
        report.registered.push(name.clone());
        Ok(name)
    }

    fn load_bean_method(
        &self,
        class: &ConfigurationClass,
        factory_bean: &str,
        method: &MethodMetadata,
        report: &mut LoadReport,
    ) -> Result<()> {
        if self
            .conditions
            .should_skip(method, Some(ConfigurationPhase::RegisterBean))?
        {
            report
                .skipped_methods
                .push(format!("{}.{}", class.name(), method.name));
            return Ok(());
        }

        let bean_name = bean_method_name(method);
        let mut registry = self.context.registry.borrow_mut();
        if let Some(existing) = registry.get(&bean_name) {
            let same_factory = existing.factory_bean_name.as_deref() == Some(factory_bean)
                && existing.factory_method_name.as_deref() == Some(method.name.as_str());
            if same_factory {
                debug!("Keeping overloaded bean method definition '{}'", bean_name);
                return Ok(());
            }
            if existing.origin != DefinitionOrigin::Scanned {
                if !self.context.settings.allow_definition_overriding {
                    return Err(Error::DefinitionOverride { name: bean_name });
                }
                debug!(
                    "Skipping bean method {}.{}(): a definition for '{}' already exists",
                    class.name(),
                    method.name,
                    bean_name
                );
                return Ok(());
            }
        }

        let mut definition = BeanDefinition::for_factory_method(factory_bean, &method.name)
            .with_origin(DefinitionOrigin::BeanMethod);
        if method.is_static {
            definition.class_name = Some(class.name().to_string());
        }
        registry.register(&bean_name, definition)?;
        report.registered.push(bean_name);
        Ok(())
    }
}

impl DefinitionLoader for StandardDefinitionLoader {
    fn load_definitions(
        &mut self,
        batch: &[ConfigurationClass],
        known: &[ConfigurationClass],
    ) -> Result<LoadReport> {
        let mut tracked = HashMap::new();
        let mut report = LoadReport::default();
        for class in batch {
            self.load_class(class, known, &mut tracked, &mut report)?;
        }
        Ok(report)
    }
}

/// The first `name` (or `value`) given on the `Bean` annotation, else the
/// method name.
fn bean_method_name(method: &MethodMetadata) -> String {
    method
        .annotation(BEAN)
        .and_then(|bean| {
            let mut names = bean.strings("name");
            names.extend(bean.strings("value"));
            names.into_iter().find(|name| !name.is_empty())
        })
        .unwrap_or_else(|| method.name.clone())
}
