//! Well-known annotation type names.
//!
//! Class descriptors refer to annotations by these names. The built-in
//! declarations returned by [`builtin_annotation_types`] give the engine the
//! meta-annotation facts it relies on (a `Configuration` is a `Component`, a
//! `Profile` is `Conditional`).

use std::collections::BTreeMap;

use crate::metadata::{Annotation, AttributeValue, ClassKind, ClassMetadata};

pub const COMPONENT: &str = "Component";
pub const CONFIGURATION: &str = "Configuration";
pub const COMPONENT_SCAN: &str = "ComponentScan";
pub const IMPORT: &str = "Import";
pub const IMPORT_RESOURCE: &str = "ImportResource";
pub const PROPERTY_SOURCE: &str = "PropertySource";
pub const BEAN: &str = "Bean";
pub const CONDITIONAL: &str = "Conditional";
pub const ORDER: &str = "Order";
pub const PROFILE: &str = "Profile";
pub const CONDITIONAL_ON_PROPERTY: &str = "ConditionalOnProperty";

/// Condition class bound to `Profile`.
pub const PROFILE_CONDITION: &str = "confgraph.ProfileCondition";

/// Condition class bound to `ConditionalOnProperty`.
pub const ON_PROPERTY_CONDITION: &str = "confgraph.OnPropertyCondition";

/// Annotations whose presence marks a class as a configuration candidate.
pub const CANDIDATE_INDICATORS: [&str; 4] = [COMPONENT, COMPONENT_SCAN, IMPORT, IMPORT_RESOURCE];

/// Metadata for the annotation types the engine understands natively.
pub fn builtin_annotation_types() -> Vec<ClassMetadata> {
    let plain = [
        COMPONENT,
        COMPONENT_SCAN,
        IMPORT,
        IMPORT_RESOURCE,
        PROPERTY_SOURCE,
        BEAN,
        CONDITIONAL,
        ORDER,
    ];
    let mut types: Vec<ClassMetadata> = plain
        .iter()
        .map(|name| ClassMetadata::new(*name).with_kind(ClassKind::Annotation))
        .collect();

    types.push(
        ClassMetadata::new(CONFIGURATION)
            .with_kind(ClassKind::Annotation)
            .with_annotation(Annotation::new(COMPONENT)),
    );
    types.push(
        ClassMetadata::new(PROFILE)
            .with_kind(ClassKind::Annotation)
            .with_annotation(conditional(PROFILE_CONDITION)),
    );
    types.push(
        ClassMetadata::new(CONDITIONAL_ON_PROPERTY)
            .with_kind(ClassKind::Annotation)
            .with_annotation(conditional(ON_PROPERTY_CONDITION)),
    );
    types
}

fn conditional(condition_class: &str) -> Annotation {
    let mut attributes = BTreeMap::new();
    attributes.insert(
        "value".to_string(),
        AttributeValue::List(vec![condition_class.to_string()]),
    );
    Annotation::with_attributes(CONDITIONAL, attributes)
}
