//! # Configuration Resolution
//!
//! This module turns a set of root definitions into a resolved configuration
//! model. The work is split across a few cooperating parts:
//!
//! - **`condition`**: decides whether an annotated element is skipped.
//! - **`imports`**: the import stack and imported-by registry used for cycle
//!   detection and provenance queries.
//! - **`parser`**: the graph walker expanding one configuration class into
//!   its member classes, property sources, scans, imports, resource imports,
//!   bean methods, interfaces and superclasses.
//! - **`deferred`**: batches deferred import selectors and settles them by
//!   group once the synchronous walk is done.
//! - **`property_sources`**: merges declared property sources into the
//!   environment.
//! - **`orchestrator`**: repeats parse passes until no new candidates appear.
//!
//! Everything runs on one thread. Shared collaborators live in a
//! [`ResolutionContext`] that is cloned cheaply into each part.

pub mod condition;
pub mod deferred;
pub mod imports;
pub mod orchestrator;
pub mod parser;
pub mod problems;
pub mod property_sources;

use std::fmt;
use std::rc::Rc;

use serde::Serialize;

pub use condition::ConditionEvaluator;
pub use deferred::{DeferredImportCoordinator, DeferredImportHolder};
pub use imports::ImportRegistry;
pub use orchestrator::ResolutionOrchestrator;
pub use parser::ConfigurationParser;
pub use problems::{Diagnostics, Problem, ProblemKind, ProblemReporter};
pub use property_sources::{PropertySourceDescriptor, PropertySourceMerger};

use crate::candidate::configuration_kind;
use crate::config::ResolverSettings;
use crate::environment::{MutablePropertySources, SharedEnvironment};
use crate::metadata::{ClassMetadata, MetadataReader, MethodMetadata};
use crate::plugin::{ConditionContext, ImportBeanDefinitionRegistrar, Injected, PluginFactory};
use crate::registry::{ConfigurationKind, SharedRegistry};
use crate::resource::SharedResourceLoader;
use crate::scan::{ComponentScanner, PackageScanner};

/// Collaborators shared by every part of one resolution run.
#[derive(Clone)]
pub struct ResolutionContext {
    pub reader: Rc<MetadataReader>,
    pub environment: SharedEnvironment,
    pub resource_loader: SharedResourceLoader,
    pub registry: SharedRegistry,
    pub plugins: Rc<PluginFactory>,
    pub scanner: Rc<dyn ComponentScanner>,
    pub settings: ResolverSettings,
}

impl ResolutionContext {
    /// A context with the built-in plugins and the package scanner.
    pub fn new(
        reader: MetadataReader,
        environment: SharedEnvironment,
        resource_loader: SharedResourceLoader,
        registry: SharedRegistry,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            reader: Rc::new(reader),
            environment,
            resource_loader,
            registry,
            plugins: Rc::new(PluginFactory::new()),
            scanner: Rc::new(PackageScanner),
            settings,
        }
    }

    pub fn with_plugins(mut self, plugins: PluginFactory) -> Self {
        self.plugins = Rc::new(plugins);
        self
    }

    pub fn with_scanner(mut self, scanner: impl ComponentScanner + 'static) -> Self {
        self.scanner = Rc::new(scanner);
        self
    }

    /// Everything a plugin constructor may ask for.
    pub fn injected(&self) -> Injected {
        Injected {
            environment: Some(Rc::clone(&self.environment)),
            resource_loader: Some(Rc::clone(&self.resource_loader)),
            registry: Some(Rc::clone(&self.registry)),
        }
    }

    pub fn condition_context(&self) -> ConditionContext {
        ConditionContext {
            environment: Rc::clone(&self.environment),
            resource_loader: Rc::clone(&self.resource_loader),
            registry: Rc::clone(&self.registry),
        }
    }
}

impl fmt::Debug for ResolutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("reader", &self.reader)
            .field("plugins", &self.plugins)
            .field("settings", &self.settings)
            .finish()
    }
}

/// A resource location recorded by an `ImportResource` directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportedResource {
    pub location: String,
    /// Reader class named by the directive, if any.
    pub reader: Option<String>,
}

/// A registrar retained for the loading stage, with the metadata of the
/// class that imported it.
#[derive(Clone)]
pub struct RegistrarBinding {
    pub class_name: String,
    pub registrar: Rc<dyn ImportBeanDefinitionRegistrar>,
    pub importing: Rc<ClassMetadata>,
}

impl fmt::Debug for RegistrarBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrarBinding")
            .field("class_name", &self.class_name)
            .field("importing", &self.importing.name)
            .finish()
    }
}

/// One resolved configuration source.
///
/// Identity is the class name. Root classes carry the bean name they were
/// registered under; imported classes carry the names of the classes that
/// imported them instead.
#[derive(Debug, Clone)]
pub struct ConfigurationClass {
    pub metadata: Rc<ClassMetadata>,
    pub bean_name: Option<String>,
    pub imported_by: Vec<String>,
    pub bean_methods: Vec<MethodMetadata>,
    pub imported_resources: Vec<ImportedResource>,
    pub registrars: Vec<RegistrarBinding>,
}

impl ConfigurationClass {
    fn with_metadata(metadata: Rc<ClassMetadata>) -> Self {
        Self {
            metadata,
            bean_name: None,
            imported_by: Vec::new(),
            bean_methods: Vec::new(),
            imported_resources: Vec::new(),
            registrars: Vec::new(),
        }
    }

    /// A class registered explicitly under `bean_name`.
    pub fn root(metadata: Rc<ClassMetadata>, bean_name: Option<String>) -> Self {
        Self {
            bean_name,
            ..Self::with_metadata(metadata)
        }
    }

    /// A class reached through an import or as a member of `imported_by`.
    pub fn imported(metadata: Rc<ClassMetadata>, imported_by: &str) -> Self {
        Self {
            imported_by: vec![imported_by.to_string()],
            ..Self::with_metadata(metadata)
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn is_imported(&self) -> bool {
        !self.imported_by.is_empty()
    }

    /// Adds the importers of `other` not already recorded.
    pub fn merge_imported_by(&mut self, other: &ConfigurationClass) {
        for importer in &other.imported_by {
            if !self.imported_by.contains(importer) {
                self.imported_by.push(importer.clone());
            }
        }
    }

    pub fn kind(&self) -> Option<ConfigurationKind> {
        configuration_kind(&self.metadata)
    }

    /// Reports structural problems of full configuration classes.
    pub fn validate(&self, reporter: &mut dyn ProblemReporter) {
        if self.kind() != Some(ConfigurationKind::Full) {
            return;
        }
        if self.metadata.is_final {
            reporter.error(Problem::invalid_configuration(
                self.name(),
                format!(
                    "Configuration class '{}' may not be final",
                    self.metadata.simple_name()
                ),
            ));
        }
        for method in &self.bean_methods {
            if !method.is_static && (method.is_final || method.is_private) {
                reporter.error(Problem::invalid_configuration(
                    self.name(),
                    format!(
                        "Bean method '{}' must not be private or final; change the method's modifiers to continue",
                        method.name
                    ),
                ));
            }
        }
    }
}

/// Output of a resolution run.
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    pub configuration_classes: Vec<ConfigurationClass>,
    pub property_sources: MutablePropertySources,
    pub problems: Vec<Problem>,
    pub imports: ImportRegistry,
}

impl ResolvedModel {
    pub fn get(&self, class_name: &str) -> Option<&ConfigurationClass> {
        self.configuration_classes
            .iter()
            .find(|class| class.name() == class_name)
    }

    pub fn class_names(&self) -> Vec<String> {
        self.configuration_classes
            .iter()
            .map(|class| class.name().to_string())
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::CONFIGURATION;
    use crate::metadata::Annotation;

    #[test]
    fn test_merge_imported_by_deduplicates() {
        let metadata = Rc::new(ClassMetadata::new("B"));
        let mut first = ConfigurationClass::imported(Rc::clone(&metadata), "A");
        first.merge_imported_by(&ConfigurationClass::imported(Rc::clone(&metadata), "C"));
        first.merge_imported_by(&ConfigurationClass::imported(metadata, "A"));
        assert_eq!(first.imported_by, vec!["A", "C"]);
        assert!(first.is_imported());
    }

    #[test]
    fn test_validate_full_configuration() {
        let mut metadata = ClassMetadata::new("com.acme.Sealed")
            .with_annotation(Annotation::new(CONFIGURATION));
        metadata.is_final = true;
        let mut class = ConfigurationClass::root(Rc::new(metadata), None);
        let mut private = MethodMetadata::new("hidden");
        private.is_private = true;
        let mut static_final = MethodMetadata::new("shared");
        static_final.is_static = true;
        static_final.is_final = true;
        class.bean_methods = vec![private, static_final];

        let mut diagnostics = Diagnostics::new();
        class.validate(&mut diagnostics);
        let messages: Vec<&str> = diagnostics
            .problems()
            .iter()
            .map(|p| p.message.as_str())
            .collect();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("may not be final"));
        assert!(messages[1].contains("'hidden'"));
    }

    #[test]
    fn test_lite_classes_are_not_validated() {
        let mut metadata = ClassMetadata::new("Lite");
        metadata.is_final = true;
        let class = ConfigurationClass::root(Rc::new(metadata), None);
        let mut diagnostics = Diagnostics::new();
        class.validate(&mut diagnostics);
        assert!(!diagnostics.has_problems());
    }
}
