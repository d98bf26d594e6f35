//! # Descriptor Bootstrap
//!
//! Turns a parsed [`Descriptor`] into a ready-to-run [`ResolutionContext`]:
//! an in-memory metadata provider over the declared classes, a standard
//! environment, a resource loader serving inline resources first and files
//! second, a registry holding the declared roots, and a plugin factory with
//! the built-ins plus every declared plugin.

use std::path::Path;
use std::rc::Rc;

use log::info;

use crate::builtin::register_declared;
use crate::config::{self, Descriptor};
use crate::environment::StandardEnvironment;
use crate::error::Result;
use crate::metadata::{InMemoryMetadataProvider, MetadataReader};
use crate::plugin::PluginFactory;
use crate::registry::{BeanDefinition, DefinitionOrigin, SimpleBeanDefinitionRegistry};
use crate::resolution::{ResolutionContext, ResolutionOrchestrator, ResolvedModel};
use crate::resource::{FileSystemResourceLoader, InMemoryResourceLoader};

/// Name of the property source holding descriptor-declared properties.
pub const DESCRIPTOR_PROPERTIES: &str = "descriptorProperties";

/// The outcome of resolving a descriptor.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub model: ResolvedModel,
    /// Registry contents after resolution, in registration order.
    pub definitions: Vec<(String, BeanDefinition)>,
}

/// Builds the context for `descriptor`. Relative resource paths resolve
/// against `base_dir`.
pub fn build_context(descriptor: &Descriptor, base_dir: &Path) -> Result<ResolutionContext> {
    let settings = descriptor.settings.clone();

    let mut provider = InMemoryMetadataProvider::new();
    for class in &descriptor.classes {
        provider.add(class.clone());
    }
    for (class_name, methods) in &descriptor.method_order {
        let methods: Vec<&str> = methods.iter().map(String::as_str).collect();
        provider = provider.with_declared_order(class_name, &methods);
    }

    let spec = &descriptor.environment;
    let mut environment =
        StandardEnvironment::new().with_active_profiles(spec.active_profiles.clone());
    if let Some(defaults) = &spec.default_profiles {
        environment = environment.with_default_profiles(defaults.clone());
    }
    let properties = spec.flat_properties();
    if !properties.is_empty() {
        environment = environment.with_properties(DESCRIPTOR_PROPERTIES, properties);
    }
    if spec.include_system_environment {
        environment = environment.with_system_environment();
    }

    let resource_base = match &descriptor.resources {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => base_dir.join(dir),
        None => base_dir.to_path_buf(),
    };
    let mut loader = InMemoryResourceLoader::new();
    for (location, content) in &descriptor.resources_inline {
        loader = loader.with_resource(location, content.as_bytes());
    }
    let loader = loader.with_fallback(Box::new(FileSystemResourceLoader::new(resource_base)));

    let mut plugins = PluginFactory::new();
    for plugin in &descriptor.plugins {
        register_declared(&mut plugins, plugin);
    }

    let registry =
        SimpleBeanDefinitionRegistry::new(settings.allow_definition_overriding).into_shared();
    for root in &descriptor.roots {
        registry.borrow_mut().register(
            &root.bean_name(),
            BeanDefinition::for_class(root.class_name()).with_origin(DefinitionOrigin::Root),
        )?;
    }

    info!(
        "Loaded descriptor: {} classes, {} roots, {} plugins",
        descriptor.classes.len(),
        descriptor.roots.len(),
        descriptor.plugins.len()
    );

    Ok(ResolutionContext::new(
        MetadataReader::new(Box::new(provider), settings.foundational_prefixes.clone()),
        environment.into_shared(),
        Rc::new(loader),
        registry,
        settings,
    )
    .with_plugins(plugins))
}

/// Resolves `descriptor` to a fixed point.
pub fn resolve(descriptor: &Descriptor, base_dir: &Path) -> Result<Resolution> {
    let context = build_context(descriptor, base_dir)?;
    let model = ResolutionOrchestrator::new(context.clone()).resolve()?;
    let registry = context.registry.borrow();
    let definitions = registry
        .names()
        .into_iter()
        .filter_map(|name| {
            let definition = registry.get(&name)?.clone();
            Some((name, definition))
        })
        .collect();
    Ok(Resolution { model, definitions })
}

/// Reads and resolves a descriptor file; resources resolve against the
/// file's directory.
pub fn resolve_file(path: &Path) -> Result<Resolution> {
    let descriptor = config::from_file(path)?;
    resolve(&descriptor, descriptor_dir(path))
}

/// The directory a descriptor's relative paths resolve against.
pub fn descriptor_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}
