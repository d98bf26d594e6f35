//! Component scanning.
//!
//! A `ComponentScan` directive names base packages and optional include or
//! exclude filters. The [`PackageScanner`] walks the class names the metadata
//! provider knows about and returns every matching concrete component whose
//! conditions hold. [`register_components`] then turns the candidates into
//! definitions. Conditions may read the registry, so they are evaluated
//! before it is borrowed for registration.

use std::rc::Rc;

use log::debug;
use regex::Regex;

use crate::annotations::{COMPONENT, CONFIGURATION};
use crate::error::{Error, Result};
use crate::metadata::{AnnotatedElement, Annotation, ClassKind, ClassMetadata, MetadataReader};
use crate::registry::{BeanDefinition, BeanDefinitionRegistry, DefinitionOrigin};
use crate::resolution::ConditionEvaluator;

/// Finds the component classes selected by one scan directive.
pub trait ComponentScanner {
    /// Candidates whose `Conditional` annotations match, in listing order.
    fn find_candidates(
        &self,
        directive: &Annotation,
        declaring_class: &ClassMetadata,
        reader: &MetadataReader,
        conditions: &ConditionEvaluator,
    ) -> Result<Vec<Rc<ClassMetadata>>>;
}

/// Scans the provider's class listing by package prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageScanner;

impl PackageScanner {
    fn base_packages(directive: &Annotation, declaring_class: &ClassMetadata) -> Vec<String> {
        let mut packages = directive.strings("base_packages");
        packages.extend(directive.strings("value"));
        if packages.is_empty() {
            packages.push(declaring_class.package_name().to_string());
        }
        packages
    }

    fn compile(patterns: Vec<String>) -> Result<Vec<Regex>> {
        patterns
            .iter()
            .map(|pattern| Regex::new(pattern).map_err(Error::from))
            .collect()
    }

    fn in_package(class_name: &str, package: &str) -> bool {
        package.is_empty()
            || class_name
                .strip_prefix(package)
                .is_some_and(|rest| rest.starts_with('.'))
    }

    /// The name given by the component annotation, else the decapitalised simple name.
    fn bean_name(metadata: &ClassMetadata) -> String {
        [CONFIGURATION, COMPONENT]
            .iter()
            .filter_map(|annotation_type| metadata.annotation(annotation_type))
            .filter_map(|annotation| annotation.string("value"))
            .find(|name| !name.is_empty())
            .unwrap_or_else(|| decapitalize(metadata.simple_name()))
    }
}

impl ComponentScanner for PackageScanner {
    fn find_candidates(
        &self,
        directive: &Annotation,
        declaring_class: &ClassMetadata,
        reader: &MetadataReader,
        conditions: &ConditionEvaluator,
    ) -> Result<Vec<Rc<ClassMetadata>>> {
        let packages = Self::base_packages(directive, declaring_class);
        let includes = Self::compile(directive.strings("include_filters"))?;
        let excludes = Self::compile(directive.strings("exclude_filters"))?;

        let mut candidates = Vec::new();
        for class_name in reader.class_names() {
            if class_name == declaring_class.name
                || !packages.iter().any(|p| Self::in_package(&class_name, p))
                || excludes.iter().any(|re| re.is_match(&class_name))
            {
                continue;
            }
            let metadata = match reader.read(&class_name) {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!("Skipping unreadable class {} during scan: {}", class_name, e);
                    continue;
                }
            };
            if metadata.kind != ClassKind::Class {
                continue;
            }
            let included = metadata.is_annotated(COMPONENT)
                || includes.iter().any(|re| re.is_match(&class_name));
            if !included || conditions.should_skip(&*metadata, None)? {
                continue;
            }
            candidates.push(metadata);
        }
        Ok(candidates)
    }
}

/// Registers a scanned definition for each candidate and returns the new
/// bean names.
///
/// A name already taken by the same class is left alone; taken by another
/// class it is an error.
pub fn register_components(
    candidates: &[Rc<ClassMetadata>],
    registry: &mut dyn BeanDefinitionRegistry,
) -> Result<Vec<String>> {
    let mut registered = Vec::new();
    for metadata in candidates {
        let bean_name = PackageScanner::bean_name(metadata);
        if let Some(existing) = registry.get(&bean_name) {
            if existing.class_name.as_deref() == Some(metadata.name.as_str()) {
                continue;
            }
            return Err(Error::DefinitionOverride { name: bean_name });
        }
        debug!("Scanned component '{}' ({})", bean_name, metadata.name);
        registry.register(
            &bean_name,
            BeanDefinition::for_class(&metadata.name).with_origin(DefinitionOrigin::Scanned),
        )?;
        registered.push(bean_name);
    }
    Ok(registered)
}

/// `FooBar` → `fooBar`; names starting with two capitals are kept (`URLConfig`).
pub fn decapitalize(name: &str) -> String {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(first), Some(second)) if first.is_uppercase() && second.is_uppercase() => {
            name.to_string()
        }
        (Some(first), _) => {
            let mut result: String = first.to_lowercase().collect();
            result.push_str(&name[first.len_utf8()..]);
            result
        }
        (None, _) => String::new(),
    }
}
