//! Bean definition registry.
//!
//! The registry is the sink the engine writes to: root definitions are read
//! from it, scans and registrars add to it, and the orchestrator diffs its
//! name set between passes to find newly introduced configuration sources.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The registry shared by every participant of one resolution run.
pub type SharedRegistry = Rc<RefCell<dyn BeanDefinitionRegistry>>;

/// Whether a configuration class is processed in full or lite mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigurationKind {
    Full,
    Lite,
}

/// How a definition came to be registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionOrigin {
    #[default]
    Root,
    Scanned,
    Imported,
    BeanMethod,
    Registrar,
}

/// A registered bean definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeanDefinition {
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_bean_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_method_name: Option<String>,
    /// Set once the definition has been checked as a configuration candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_kind: Option<ConfigurationKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(default)]
    pub origin: DefinitionOrigin,
    #[serde(default)]
    pub infrastructure: bool,
}

impl BeanDefinition {
    pub fn for_class(class_name: impl Into<String>) -> Self {
        Self {
            class_name: Some(class_name.into()),
            ..Self::default()
        }
    }

    /// A definition produced by calling `method` on the bean named `factory_bean`.
    pub fn for_factory_method(factory_bean: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            factory_bean_name: Some(factory_bean.into()),
            factory_method_name: Some(method.into()),
            ..Self::default()
        }
    }

    pub fn with_origin(mut self, origin: DefinitionOrigin) -> Self {
        self.origin = origin;
        self
    }
}

/// Sink for bean definitions.
pub trait BeanDefinitionRegistry {
    fn register(&mut self, name: &str, definition: BeanDefinition) -> Result<()>;

    fn contains(&self, name: &str) -> bool;

    fn get(&self, name: &str) -> Option<&BeanDefinition>;

    fn get_mut(&mut self, name: &str) -> Option<&mut BeanDefinition>;

    fn remove(&mut self, name: &str) -> Option<BeanDefinition>;

    /// All names, in registration order.
    fn names(&self) -> Vec<String>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Insertion-ordered in-memory registry.
#[derive(Debug, Clone)]
pub struct SimpleBeanDefinitionRegistry {
    definitions: HashMap<String, BeanDefinition>,
    order: Vec<String>,
    allow_overriding: bool,
}

impl SimpleBeanDefinitionRegistry {
    pub fn new(allow_overriding: bool) -> Self {
        Self {
            definitions: HashMap::new(),
            order: Vec::new(),
            allow_overriding,
        }
    }

    pub fn into_shared(self) -> SharedRegistry {
        Rc::new(RefCell::new(self))
    }
}

impl Default for SimpleBeanDefinitionRegistry {
    fn default() -> Self {
        Self::new(true)
    }
}

impl BeanDefinitionRegistry for SimpleBeanDefinitionRegistry {
    fn register(&mut self, name: &str, definition: BeanDefinition) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidConfiguration {
                class_name: definition.class_name.unwrap_or_default(),
                message: "bean definition name must not be empty".to_string(),
            });
        }
        match self.definitions.get_mut(name) {
            Some(_) if !self.allow_overriding => Err(Error::DefinitionOverride {
                name: name.to_string(),
            }),
            Some(existing) => {
                log::debug!("Overriding bean definition for bean '{}'", name);
                *existing = definition;
                Ok(())
            }
            None => {
                self.definitions.insert(name.to_string(), definition);
                self.order.push(name.to_string());
                Ok(())
            }
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    fn get(&self, name: &str) -> Option<&BeanDefinition> {
        self.definitions.get(name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut BeanDefinition> {
        self.definitions.get_mut(name)
    }

    fn remove(&mut self, name: &str) -> Option<BeanDefinition> {
        let removed = self.definitions.remove(name)?;
        self.order.retain(|existing| existing != name);
        Some(removed)
    }

    fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    fn len(&self) -> usize {
        self.definitions.len()
    }
}
