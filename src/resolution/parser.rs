//! # Configuration Graph Walker
//!
//! [`ConfigurationParser`] expands configuration classes into the resolved
//! model. One class goes through a fixed pipeline, repeated for each
//! superclass in its hierarchy:
//!
//! 1. member classes that are candidates themselves (component classes only)
//! 2. `PropertySource` directives
//! 3. `ComponentScan` directives, unless the class is skipped for the
//!    register phase
//! 4. `Import` directives, collected through meta-annotations
//! 5. `ImportResource` directives
//! 6. `Bean` methods
//! 7. default `Bean` methods of implemented interfaces
//! 8. the superclass, unless foundational or already claimed by another class
//!
//! Imports are dispatched by capability: deferred selectors are parked with
//! the [`DeferredImportCoordinator`], selectors are asked for more imports
//! right away, registrars are retained for the loading stage, and anything
//! else is walked as an imported configuration class.
//!
//! Cycles are reported through the diagnostics sink rather than raised, so
//! a lenient run carries on and simply stops expanding the cycle.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use log::{debug, info};

use crate::annotations::{BEAN, COMPONENT, COMPONENT_SCAN, IMPORT, IMPORT_RESOURCE, PROPERTY_SOURCE};
use crate::candidate::{check_configuration_candidate, is_configuration_candidate, order_of};
use crate::error::{Error, Result};
use crate::metadata::{AnnotatedElement, Annotation, ClassMetadata, Introspection, MethodMetadata};
use crate::ordering::sort_by_order;
use crate::plugin::{Capability, ConfigurationPhase, GroupEntry, PluginInstance};
use crate::scan::register_components;
use crate::resolution::deferred::{DeferredImportGrouping, DeferredImportHolder};
use crate::resolution::{
    ConditionEvaluator, ConfigurationClass, DeferredImportCoordinator, Diagnostics, ImportRegistry,
    ImportedResource, Problem, ProblemReporter, PropertySourceDescriptor, PropertySourceMerger,
    RegistrarBinding, ResolutionContext,
};

pub struct ConfigurationParser {
    context: ResolutionContext,
    conditions: ConditionEvaluator,
    classes: Vec<ConfigurationClass>,
    /// Superclass name to the name of the class that first walked it.
    known_superclasses: HashMap<String, String>,
    imports: ImportRegistry,
    deferred: DeferredImportCoordinator,
    property_sources: PropertySourceMerger,
    diagnostics: Diagnostics,
    validated: HashSet<String>,
}

impl ConfigurationParser {
    pub fn new(context: &ResolutionContext) -> Self {
        Self {
            context: context.clone(),
            conditions: ConditionEvaluator::new(context),
            classes: Vec::new(),
            known_superclasses: HashMap::new(),
            imports: ImportRegistry::new(),
            deferred: DeferredImportCoordinator::new(),
            property_sources: PropertySourceMerger::new(),
            diagnostics: Diagnostics::new(),
            validated: HashSet::new(),
        }
    }

    /// Parses root definitions given as `(bean name, class name)` pairs,
    /// then settles every deferred selector met on the way.
    pub fn parse(&mut self, roots: &[(String, String)]) -> Result<()> {
        for (bean_name, class_name) in roots {
            self.parse_class(class_name, bean_name).map_err(|e| {
                e.in_store_context(format!(
                    "Failed to parse configuration class [{}]",
                    class_name
                ))
            })?;
        }
        self.settle_deferred()
    }

    fn parse_class(&mut self, class_name: &str, bean_name: &str) -> Result<()> {
        let metadata = self.context.reader.read(class_name)?;
        self.process_configuration_class(ConfigurationClass::root(
            metadata,
            Some(bean_name.to_string()),
        ))
    }

    fn settle_deferred(&mut self) -> Result<()> {
        let holders = self.deferred.begin_settlement();
        let result = self.process_deferred(holders, None);
        self.deferred.end_settlement();
        result
    }

    pub fn configuration_classes(&self) -> &[ConfigurationClass] {
        &self.classes
    }

    pub fn import_registry(&self) -> &ImportRegistry {
        &self.imports
    }

    pub fn import_registry_mut(&mut self) -> &mut ImportRegistry {
        &mut self.imports
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub fn property_source_names(&self) -> &[String] {
        self.property_sources.names()
    }

    /// Reports structural problems of classes not validated before.
    pub fn validate(&mut self) {
        for class in &self.classes {
            if self.validated.insert(class.name().to_string()) {
                class.validate(&mut self.diagnostics);
            }
        }
    }

    fn index_of(&self, class_name: &str) -> Option<usize> {
        self.classes.iter().position(|class| class.name() == class_name)
    }

    fn process_configuration_class(&mut self, mut config_class: ConfigurationClass) -> Result<()> {
        if self
            .conditions
            .should_skip(&*config_class.metadata, Some(ConfigurationPhase::ParseConfiguration))?
        {
            return Ok(());
        }

        if let Some(index) = self.index_of(config_class.name()) {
            if config_class.is_imported() {
                if self.classes[index].is_imported() {
                    self.classes[index].merge_imported_by(&config_class);
                }
                // an explicit registration wins over an import
                return Ok(());
            }
            let name = config_class.name().to_string();
            self.classes.remove(index);
            self.known_superclasses.retain(|_, owner| *owner != name);
        }

        let mut source = Some(Rc::clone(&config_class.metadata));
        while let Some(current) = source {
            source = self.do_process(&mut config_class, &current)?;
        }

        match self.index_of(config_class.name()) {
            Some(index) => self.classes[index] = config_class,
            None => self.classes.push(config_class),
        }
        Ok(())
    }

    /// One round of the pipeline for `source`; returns the superclass to
    /// walk next, if any.
    fn do_process(
        &mut self,
        config_class: &mut ConfigurationClass,
        source: &Rc<ClassMetadata>,
    ) -> Result<Option<Rc<ClassMetadata>>> {
        if config_class.metadata.is_annotated(COMPONENT) {
            self.process_member_classes(config_class, source)?;
        }

        self.process_property_sources(source)?;
        self.process_component_scans(source)?;

        let imports = self.collect_imports(source);
        self.process_imports(config_class, source, imports, true)?;

        self.process_import_resources(config_class, source)?;

        config_class
            .bean_methods
            .extend(self.retrieve_bean_methods(source));
        self.process_interfaces(config_class, source, &mut HashSet::new())?;

        if let Some(superclass) = &source.superclass {
            if !self.context.reader.is_foundational(superclass)
                && !self.known_superclasses.contains_key(superclass)
            {
                self.known_superclasses
                    .insert(superclass.clone(), config_class.name().to_string());
                return Ok(Some(self.context.reader.read(superclass)?));
            }
        }
        Ok(None)
    }

    fn process_member_classes(
        &mut self,
        config_class: &mut ConfigurationClass,
        source: &ClassMetadata,
    ) -> Result<()> {
        let mut candidates = Vec::new();
        for member in &source.member_classes {
            match self.context.reader.read(member) {
                Ok(metadata) => {
                    if is_configuration_candidate(&metadata) && metadata.name != config_class.name() {
                        candidates.push(metadata);
                    }
                }
                Err(e) => debug!("Skipping unreadable member class {}: {}", member, e),
            }
        }
        sort_by_order(&mut candidates, |metadata| order_of(metadata));

        for candidate in candidates {
            if self.imports.contains(config_class.name()) {
                self.diagnostics
                    .error(Problem::circular_import(config_class.name(), self.imports.chain()));
                continue;
            }
            self.imports.push(Rc::clone(&config_class.metadata));
            let result = self.process_configuration_class(ConfigurationClass::imported(
                candidate,
                config_class.name(),
            ));
            self.imports.pop();
            result?;
        }
        Ok(())
    }

    fn process_property_sources(&mut self, source: &ClassMetadata) -> Result<()> {
        let descriptors: Vec<PropertySourceDescriptor> = source
            .all_annotations_of(PROPERTY_SOURCE)
            .into_iter()
            .map(PropertySourceDescriptor::from_annotation)
            .collect();
        for descriptor in descriptors {
            if self.context.environment.borrow().is_configurable() {
                self.property_sources
                    .process(&source.name, &descriptor, &self.context)?;
            } else {
                info!(
                    "Ignoring PropertySource directive on [{}]. Reason: Environment must be configurable",
                    source.name
                );
            }
        }
        Ok(())
    }

    fn process_component_scans(&mut self, source: &ClassMetadata) -> Result<()> {
        let scans: Vec<Annotation> = source
            .all_annotations_of(COMPONENT_SCAN)
            .into_iter()
            .cloned()
            .collect();
        if scans.is_empty()
            || self
                .conditions
                .should_skip(source, Some(ConfigurationPhase::RegisterBean))?
        {
            return Ok(());
        }

        for scan in &scans {
            let candidates = self.context.scanner.find_candidates(
                scan,
                source,
                &self.context.reader,
                &self.conditions,
            )?;
            let scanned =
                register_components(&candidates, &mut *self.context.registry.borrow_mut())?;
            for bean_name in scanned {
                let is_candidate = check_configuration_candidate(
                    &mut *self.context.registry.borrow_mut(),
                    &bean_name,
                    &self.context.reader,
                );
                if !is_candidate {
                    continue;
                }
                let class_name = self
                    .context
                    .registry
                    .borrow()
                    .get(&bean_name)
                    .and_then(|definition| definition.class_name.clone());
                if let Some(class_name) = class_name {
                    self.parse_class(&class_name, &bean_name)?;
                }
            }
        }
        Ok(())
    }

    /// Import class names from `Import` directives on the class and,
    /// transitively, on its annotation types.
    fn collect_imports(&self, source: &ClassMetadata) -> Vec<String> {
        let mut imports = Vec::new();
        let mut visited = HashSet::new();
        self.collect_imports_into(source, &mut imports, &mut visited);
        imports
    }

    fn collect_imports_into(
        &self,
        metadata: &ClassMetadata,
        imports: &mut Vec<String>,
        visited: &mut HashSet<String>,
    ) {
        if !visited.insert(metadata.name.clone()) {
            return;
        }
        for annotation in &metadata.annotations {
            let annotation_type = &annotation.type_name;
            if annotation_type == IMPORT || self.context.reader.is_foundational(annotation_type) {
                continue;
            }
            match self.context.reader.read(annotation_type) {
                Ok(declaration) => self.collect_imports_into(&declaration, imports, visited),
                Err(e) => debug!("Ignoring unreadable annotation type {}: {}", annotation_type, e),
            }
        }
        for directive in metadata.direct_annotations_of(IMPORT) {
            for name in directive.strings("value") {
                if !imports.contains(&name) {
                    imports.push(name);
                }
            }
        }
    }

    fn process_imports(
        &mut self,
        config_class: &mut ConfigurationClass,
        current_source: &Rc<ClassMetadata>,
        candidates: Vec<String>,
        check_for_circular_imports: bool,
    ) -> Result<()> {
        if candidates.is_empty() {
            return Ok(());
        }

        if check_for_circular_imports && self.imports.is_chained_import(config_class.name()) {
            self.diagnostics
                .error(Problem::circular_import(config_class.name(), self.imports.chain()));
            return Ok(());
        }

        let limit = self.context.settings.max_import_depth;
        if self.imports.depth() >= limit {
            return Err(Error::ImportDepthExceeded {
                class_name: config_class.name().to_string(),
                limit,
            });
        }

        self.imports.push(Rc::clone(&config_class.metadata));
        let result = self.process_import_candidates(config_class, current_source, candidates);
        self.imports.pop();

        result.map_err(|e| {
            e.in_store_context(format!(
                "Failed to process import candidates for configuration class [{}]",
                config_class.name()
            ))
        })
    }

    fn process_import_candidates(
        &mut self,
        config_class: &mut ConfigurationClass,
        current_source: &Rc<ClassMetadata>,
        candidates: Vec<String>,
    ) -> Result<()> {
        let injected = self.context.injected();
        for candidate in candidates {
            match self.context.plugins.capability(&candidate) {
                Some(Capability::DeferredImportSelector) => {
                    let selector = match self.context.plugins.instantiate(&candidate, &injected)? {
                        PluginInstance::DeferredImportSelector(selector) => selector,
                        other => return Err(mismatch(&candidate, Capability::DeferredImportSelector, &other)),
                    };
                    let holder = DeferredImportHolder {
                        selector_class: candidate,
                        config_class_name: config_class.name().to_string(),
                        metadata: Rc::clone(&config_class.metadata),
                        selector,
                    };
                    if let Some(holder) = self.deferred.handle(holder) {
                        self.process_deferred(vec![holder], Some(&mut *config_class))?;
                    }
                }
                Some(Capability::ImportSelector) => {
                    let selector = match self.context.plugins.instantiate(&candidate, &injected)? {
                        PluginInstance::ImportSelector(selector) => selector,
                        other => return Err(mismatch(&candidate, Capability::ImportSelector, &other)),
                    };
                    let selected = selector.select_imports(current_source)?;
                    self.process_imports(config_class, current_source, selected, false)?;
                }
                Some(Capability::Registrar) => {
                    let registrar = match self.context.plugins.instantiate(&candidate, &injected)? {
                        PluginInstance::Registrar(registrar) => registrar,
                        other => return Err(mismatch(&candidate, Capability::Registrar, &other)),
                    };
                    config_class.registrars.push(RegistrarBinding {
                        class_name: candidate,
                        registrar,
                        importing: Rc::clone(current_source),
                    });
                }
                _ => {
                    let metadata = self.context.reader.read(&candidate)?;
                    self.imports.register_import(current_source, &candidate);
                    self.process_configuration_class(ConfigurationClass::imported(
                        metadata,
                        config_class.name(),
                    ))?;
                }
            }
        }
        Ok(())
    }

    /// Groups `holders` and processes each group's imports. `in_hand` is the
    /// class currently being walked, which is not stored yet.
    fn process_deferred(
        &mut self,
        holders: Vec<DeferredImportHolder>,
        mut in_hand: Option<&mut ConfigurationClass>,
    ) -> Result<()> {
        if holders.is_empty() {
            return Ok(());
        }
        let injected = self.context.injected();
        let mut grouping = DeferredImportGrouping::new();
        for holder in holders {
            grouping.register(holder, &self.context.plugins, &injected)?;
        }

        for index in 0..grouping.len() {
            for entry in grouping.group_imports(index)? {
                let importing_name = entry.importing.name.clone();
                let result = match in_hand.as_deref_mut() {
                    Some(config_class) if config_class.name() == importing_name => self
                        .process_imports(
                            config_class,
                            &entry.importing,
                            vec![entry.import_class_name.clone()],
                            false,
                        ),
                    _ => self.process_stored_entry(&entry),
                };
                result.map_err(|e| {
                    e.in_store_context(format!(
                        "Failed to process import candidates for configuration class [{}]",
                        importing_name
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Processes a group entry on behalf of an already parsed class.
    fn process_stored_entry(&mut self, entry: &GroupEntry) -> Result<()> {
        let name = &entry.importing.name;
        let Some(index) = self.index_of(name) else {
            return Err(Error::InvalidConfiguration {
                class_name: name.clone(),
                message: "import group returned an entry for a class that was not parsed"
                    .to_string(),
            });
        };
        let mut scratch = self.classes[index].clone();
        let known_registrars = scratch.registrars.len();
        self.process_imports(
            &mut scratch,
            &entry.importing,
            vec![entry.import_class_name.clone()],
            false,
        )?;

        let added = scratch.registrars.split_off(known_registrars);
        if !added.is_empty() {
            if let Some(index) = self.index_of(name) {
                self.classes[index].registrars.extend(added);
            }
        }
        Ok(())
    }

    fn process_import_resources(
        &mut self,
        config_class: &mut ConfigurationClass,
        source: &ClassMetadata,
    ) -> Result<()> {
        let Some(directive) = source.annotation(IMPORT_RESOURCE) else {
            return Ok(());
        };
        let mut locations = directive.strings("value");
        locations.extend(directive.strings("locations"));
        let reader = directive.string("reader").filter(|r| !r.is_empty());

        for location in locations {
            let resolved = self
                .context
                .environment
                .borrow()
                .resolve_required_placeholders(&location)?;
            config_class.imported_resources.push(ImportedResource {
                location: resolved,
                reader: reader.clone(),
            });
        }
        Ok(())
    }

    /// `Bean` methods of `source`. For reflective readings with more than one
    /// such method, the provider's declared order is used when it covers
    /// every method.
    fn retrieve_bean_methods(&self, source: &ClassMetadata) -> Vec<MethodMetadata> {
        let methods = source.annotated_methods(BEAN);
        if methods.len() > 1 && source.introspection == Introspection::Reflective {
            match self.context.reader.declared_method_order(&source.name) {
                Ok(Some(declared)) if declared.len() >= methods.len() => {
                    let mut selected: Vec<&MethodMetadata> = Vec::with_capacity(methods.len());
                    for name in &declared {
                        if let Some(method) = methods.iter().find(|m| &m.name == name) {
                            if !selected.iter().any(|s| std::ptr::eq(*s, *method)) {
                                selected.push(*method);
                            }
                        }
                    }
                    if selected.len() == methods.len() {
                        return selected.into_iter().cloned().collect();
                    }
                }
                Ok(_) => {}
                Err(e) => debug!(
                    "Failed to read declared method order for {}: {}",
                    source.name, e
                ),
            }
        }
        methods.into_iter().cloned().collect()
    }

    fn process_interfaces(
        &self,
        config_class: &mut ConfigurationClass,
        source: &ClassMetadata,
        visited: &mut HashSet<String>,
    ) -> Result<()> {
        for interface in &source.interfaces {
            if self.context.reader.is_foundational(interface) || !visited.insert(interface.clone()) {
                continue;
            }
            let metadata = self.context.reader.read(interface)?;
            for method in self.retrieve_bean_methods(&metadata) {
                if !method.is_abstract {
                    config_class.bean_methods.push(method);
                }
            }
            self.process_interfaces(config_class, &metadata, visited)?;
        }
        Ok(())
    }
}

fn mismatch(class_name: &str, expected: Capability, found: &PluginInstance) -> Error {
    Error::Instantiation {
        class_name: class_name.to_string(),
        message: format!("expected a {}, found {}", expected, found.capability()),
    }
}
