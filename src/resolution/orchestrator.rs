//! Fixed-point resolution.
//!
//! Registrars and component scans can register new definitions while a
//! pass runs. After each pass the orchestrator diffs the registry's names
//! against the snapshot taken before it, and any new definition that
//! qualifies as a configuration candidate (and whose class was not parsed
//! yet) becomes a root of the next pass. Resolution ends when a pass
//! produces no new candidates.

use std::collections::HashSet;

use log::{debug, info};

use crate::candidate::check_configuration_candidate;
use crate::error::Result;
use crate::loader::{DefinitionLoader, StandardDefinitionLoader};
use crate::ordering::{sort_by_order, Order};
use crate::resolution::{ConfigurationClass, ConfigurationParser, ResolutionContext, ResolvedModel};

pub struct ResolutionOrchestrator {
    context: ResolutionContext,
    loader: Box<dyn DefinitionLoader>,
}

impl ResolutionOrchestrator {
    pub fn new(context: ResolutionContext) -> Self {
        let loader = Box::new(StandardDefinitionLoader::new(&context));
        Self { context, loader }
    }

    pub fn with_loader(mut self, loader: impl DefinitionLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    /// Resolves every configuration candidate in the registry.
    pub fn resolve(&mut self) -> Result<ResolvedModel> {
        let mut parser = ConfigurationParser::new(&self.context);
        let mut candidate_names = self.context.registry.borrow().names();
        let mut candidates = self.initial_candidates(&candidate_names);
        if candidates.is_empty() {
            info!("No configuration candidates found in {} definitions", candidate_names.len());
        }

        let mut already_parsed: HashSet<String> = HashSet::new();
        let mut pass = 0;
        while !candidates.is_empty() {
            pass += 1;
            parser.parse(&candidates)?;
            parser.validate();
            parser
                .diagnostics_mut()
                .enforce(self.context.settings.problem_policy)?;

            let batch: Vec<ConfigurationClass> = parser
                .configuration_classes()
                .iter()
                .filter(|class| !already_parsed.contains(class.name()))
                .cloned()
                .collect();
            let report = self
                .loader
                .load_definitions(&batch, parser.configuration_classes())?;
            for skipped in &report.skipped_classes {
                parser.import_registry_mut().remove_importing_class(skipped);
            }
            already_parsed.extend(batch.iter().map(|class| class.name().to_string()));

            info!(
                "Resolution pass {}: {} configuration classes, {} definitions registered",
                pass,
                batch.len(),
                report.registered.len()
            );

            let names = self.context.registry.borrow().names();
            candidates = if names.len() > candidate_names.len() {
                self.new_candidates(&names, &candidate_names, &already_parsed)
            } else {
                Vec::new()
            };
            candidate_names = names;
        }

        self.context.reader.clear_cache();
        Ok(ResolvedModel {
            configuration_classes: parser.configuration_classes().to_vec(),
            property_sources: self.context.environment.borrow().property_sources().clone(),
            problems: parser.diagnostics().problems().to_vec(),
            imports: parser.import_registry().clone(),
        })
    }

    /// Unprocessed candidates among `names`, as `(bean name, class name)`
    /// pairs sorted by their order hint.
    fn initial_candidates(&self, names: &[String]) -> Vec<(String, String)> {
        let mut candidates = Vec::new();
        for name in names {
            let marked = self
                .context
                .registry
                .borrow()
                .get(name)
                .is_some_and(|definition| definition.configuration_kind.is_some());
            if marked {
                debug!("Definition '{}' was already processed as a configuration class", name);
                continue;
            }
            if let Some(candidate) = self.checked_candidate(name) {
                candidates.push(candidate);
            }
        }
        sort_by_order(&mut candidates, |(_, _, order)| *order);
        candidates
            .into_iter()
            .map(|(name, class_name, _)| (name, class_name))
            .collect()
    }

    fn new_candidates(
        &self,
        names: &[String],
        previous: &[String],
        already_parsed: &HashSet<String>,
    ) -> Vec<(String, String)> {
        let previous: HashSet<&String> = previous.iter().collect();
        names
            .iter()
            .filter(|name| !previous.contains(name))
            .filter_map(|name| self.checked_candidate(name))
            .filter(|(_, class_name, _)| !already_parsed.contains(class_name))
            .map(|(name, class_name, _)| (name, class_name))
            .collect()
    }

    fn checked_candidate(&self, name: &str) -> Option<(String, String, Order)> {
        let is_candidate = check_configuration_candidate(
            &mut *self.context.registry.borrow_mut(),
            name,
            &self.context.reader,
        );
        if !is_candidate {
            return None;
        }
        let registry = self.context.registry.borrow();
        let definition = registry.get(name)?;
        let class_name = definition.class_name.clone()?;
        Some((name.to_string(), class_name, Order::from_value(definition.order)))
    }
}
