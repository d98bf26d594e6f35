//! Configuration-candidate checks.
//!
//! A class is a configuration candidate when it is a concrete type carrying
//! one of the indicator annotations or declaring `Bean` methods. Candidates
//! annotated `Configuration` (without `proxy_bean_methods: false`) are
//! processed in full mode, all others in lite mode.

use log::debug;

use crate::annotations::{BEAN, CANDIDATE_INDICATORS, CONFIGURATION, ORDER};
use crate::metadata::{AnnotatedElement, ClassMetadata, MetadataReader};
use crate::ordering::Order;
use crate::registry::{BeanDefinitionRegistry, ConfigurationKind};

/// Whether the class qualifies structurally as a configuration source.
pub fn is_configuration_candidate(metadata: &ClassMetadata) -> bool {
    if metadata.is_interface() {
        return false;
    }
    if CANDIDATE_INDICATORS
        .iter()
        .any(|indicator| metadata.is_annotated(indicator))
    {
        return true;
    }
    metadata.has_annotated_methods(BEAN)
}

/// Full or lite mode for a class, or `None` when it is not a candidate.
pub fn configuration_kind(metadata: &ClassMetadata) -> Option<ConfigurationKind> {
    match metadata.annotation(CONFIGURATION) {
        Some(configuration) if configuration.bool("proxy_bean_methods") != Some(false) => {
            Some(ConfigurationKind::Full)
        }
        Some(_) => Some(ConfigurationKind::Lite),
        None if is_configuration_candidate(metadata) => Some(ConfigurationKind::Lite),
        None => None,
    }
}

/// The explicit `Order` value on a class, if any.
pub fn order_value(metadata: &ClassMetadata) -> Option<i32> {
    metadata
        .annotation(ORDER)
        .and_then(|order| order.int("value"))
        .map(|value| value.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
}

pub fn order_of(metadata: &ClassMetadata) -> Order {
    Order::from_value(order_value(metadata))
}

/// Checks the named definition and, when it is a candidate, marks it with
/// its configuration kind and order hint.
///
/// Definitions produced by factory methods and classes whose metadata
/// cannot be read are never candidates.
pub fn check_configuration_candidate(
    registry: &mut dyn BeanDefinitionRegistry,
    bean_name: &str,
    reader: &MetadataReader,
) -> bool {
    let Some(definition) = registry.get(bean_name) else {
        return false;
    };
    if definition.factory_method_name.is_some() {
        return false;
    }
    let Some(class_name) = definition.class_name.clone() else {
        return false;
    };

    let metadata = match reader.read(&class_name) {
        Ok(metadata) => metadata,
        Err(e) => {
            debug!(
                "Could not read metadata for configuration candidate '{}' ({}): {}",
                bean_name, class_name, e
            );
            return false;
        }
    };

    let Some(kind) = configuration_kind(&metadata) else {
        return false;
    };
    if let Some(definition) = registry.get_mut(bean_name) {
        definition.configuration_kind = Some(kind);
        definition.order = order_value(&metadata);
    }
    true
}
