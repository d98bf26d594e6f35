//! Declared property sources.
//!
//! Each `PropertySource` directive names one or more resource locations.
//! Every location is placeholder-expanded, loaded, turned into a property
//! source by the directive's factory, and added to the environment.
//!
//! Additions follow two rules. A source whose name was already added in this
//! run is merged with the existing entry into a composite that answers from
//! the newest member first, in the existing entry's position. Any other
//! source goes right before the previous declared addition, so the first
//! declared source ends up last among them; the very first one is appended.

use std::rc::Rc;

use log::info;

use crate::environment::{CompositePropertySource, MutablePropertySources, PropertySource};
use crate::error::{Error, Result};
use crate::metadata::Annotation;
use crate::plugin::{PluginInstance, PropertySourceFactory};
use crate::resolution::ResolutionContext;
use crate::resource::{DefaultPropertySourceFactory, EncodedResource};

/// The attributes of one `PropertySource` directive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySourceDescriptor {
    pub locations: Vec<String>,
    pub name: Option<String>,
    pub encoding: Option<String>,
    pub ignore_resource_not_found: bool,
    /// Factory class; the default factory when absent.
    pub factory: Option<String>,
}

impl PropertySourceDescriptor {
    pub fn from_annotation(annotation: &Annotation) -> Self {
        let mut locations = annotation.strings("value");
        locations.extend(annotation.strings("locations"));
        let non_empty = |key: &str| annotation.string(key).filter(|value| !value.is_empty());
        Self {
            locations,
            name: non_empty("name"),
            encoding: non_empty("encoding"),
            ignore_resource_not_found: annotation
                .bool("ignore_resource_not_found")
                .unwrap_or(false),
            factory: non_empty("factory"),
        }
    }
}

/// Adds declared property sources to the environment, remembering which
/// names it added during the run.
#[derive(Debug, Default)]
pub struct PropertySourceMerger {
    names: Vec<String>,
}

impl PropertySourceMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names added so far, in order of first addition.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Loads every location of `descriptor` and adds the results.
    pub fn process(
        &mut self,
        declaring_class: &str,
        descriptor: &PropertySourceDescriptor,
        context: &ResolutionContext,
    ) -> Result<()> {
        if descriptor.locations.is_empty() {
            return Err(Error::InvalidConfiguration {
                class_name: declaring_class.to_string(),
                message: "At least one PropertySource location is required".to_string(),
            });
        }
        let factory = Self::factory(descriptor, context)?;

        for location in &descriptor.locations {
            let source = match Self::load(location, descriptor, factory.as_ref(), context) {
                Ok(source) => source,
                Err(e) if descriptor.ignore_resource_not_found && e.is_recoverable_location_error() => {
                    info!("Properties location [{}] not resolvable: {}", location, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let mut environment = context.environment.borrow_mut();
            let sources = environment
                .property_sources_mut()
                .ok_or_else(|| Error::InvalidConfiguration {
                    class_name: declaring_class.to_string(),
                    message: "Environment does not support property source configuration"
                        .to_string(),
                })?;
            self.add(sources, source)?;
        }
        Ok(())
    }

    fn factory(
        descriptor: &PropertySourceDescriptor,
        context: &ResolutionContext,
    ) -> Result<Rc<dyn PropertySourceFactory>> {
        let Some(class_name) = &descriptor.factory else {
            return Ok(Rc::new(DefaultPropertySourceFactory));
        };
        match context.plugins.instantiate(class_name, &context.injected())? {
            PluginInstance::PropertySourceFactory(factory) => Ok(factory),
            other => Err(Error::Instantiation {
                class_name: class_name.clone(),
                message: format!("expected a PropertySourceFactory, found {}", other.capability()),
            }),
        }
    }

    fn load(
        location: &str,
        descriptor: &PropertySourceDescriptor,
        factory: &dyn PropertySourceFactory,
        context: &ResolutionContext,
    ) -> Result<PropertySource> {
        let resolved = context
            .environment
            .borrow()
            .resolve_required_placeholders(location)?;
        let resource = context.resource_loader.get_resource(&resolved)?;
        factory.create_property_source(
            descriptor.name.as_deref(),
            &EncodedResource::new(resource, descriptor.encoding.clone()),
        )
    }

    /// Adds one source to `sources`.
    pub fn add(&mut self, sources: &mut MutablePropertySources, source: PropertySource) -> Result<()> {
        let name = source.name().to_string();

        if self.names.contains(&name) {
            if let Some(existing) = sources.get_mut(&name) {
                let incoming = source.with_resource_name();
                match existing {
                    PropertySource::Composite(composite) => composite.add_first(incoming),
                    PropertySource::Map(_) => {
                        let mut composite = CompositePropertySource::new(&name);
                        composite.add(existing.clone().with_resource_name());
                        composite.add_first(incoming);
                        *existing = PropertySource::Composite(composite);
                    }
                }
                return Ok(());
            }
        }

        match self.names.last() {
            None => sources.add_last(source),
            Some(previous) => sources.add_before(previous, source)?,
        }
        self.names.push(name);
        Ok(())
    }
}
