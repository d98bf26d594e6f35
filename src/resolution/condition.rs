//! Condition evaluation.
//!
//! An element is skipped when one of the conditions named by its
//! `Conditional` annotations (direct or meta) does not match. Conditions are
//! instantiated afresh for every evaluation, sorted by their order, and
//! evaluated until the first one fails.

use log::debug;

use crate::annotations::CONDITIONAL;
use crate::candidate::is_configuration_candidate;
use crate::error::{Error, Result};
use crate::metadata::AnnotatedElement;
use crate::ordering::sort_by_order;
use crate::plugin::{Condition, ConditionContext, ConfigurationPhase, PluginInstance};
use crate::resolution::ResolutionContext;
use std::rc::Rc;

pub struct ConditionEvaluator {
    context: ResolutionContext,
}

impl ConditionEvaluator {
    pub fn new(context: &ResolutionContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Whether `element` should be skipped in `phase`.
    ///
    /// Without an explicit phase, elements that are configuration
    /// candidates are evaluated in the parse phase and everything else in
    /// the register phase.
    pub fn should_skip(
        &self,
        element: &dyn AnnotatedElement,
        phase: Option<ConfigurationPhase>,
    ) -> Result<bool> {
        if !element.is_annotated(CONDITIONAL) {
            return Ok(false);
        }

        let phase = match phase {
            Some(phase) => phase,
            None => match element.as_class() {
                Some(class) if is_configuration_candidate(class) => {
                    ConfigurationPhase::ParseConfiguration
                }
                _ => ConfigurationPhase::RegisterBean,
            },
        };

        let mut conditions = self.conditions_for(element)?;
        sort_by_order(&mut conditions, |(_, condition)| condition.order());

        let condition_context = self.context.condition_context();
        for (class_name, condition) in &conditions {
            if let Some(required) = condition.required_phase() {
                if required != phase {
                    continue;
                }
            }
            if !condition.matches(&condition_context, element) {
                debug!(
                    "Skipping {} in {} phase: condition {} did not match",
                    element.element_name(),
                    phase,
                    class_name
                );
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn conditions_for(
        &self,
        element: &dyn AnnotatedElement,
    ) -> Result<Vec<(String, Rc<dyn Condition>)>> {
        let injected = self.context.injected();
        let mut conditions = Vec::new();
        for conditional in element.all_annotations_of(CONDITIONAL) {
            for class_name in conditional.strings("value") {
                match self.context.plugins.instantiate(&class_name, &injected)? {
                    PluginInstance::Condition(condition) => conditions.push((class_name, condition)),
                    other => {
                        return Err(Error::Instantiation {
                            class_name,
                            message: format!("expected a Condition, found {}", other.capability()),
                        })
                    }
                }
            }
        }
        Ok(conditions)
    }

    pub fn condition_context(&self) -> ConditionContext {
        self.context.condition_context()
    }
}
