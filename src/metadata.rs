//! # Structural Class Metadata
//!
//! The engine never loads classes. Everything it knows about a configuration
//! source comes from a [`MetadataProvider`]: annotations and their attributes,
//! the superclass, implemented interfaces, member classes and annotated
//! methods.
//!
//! ## Key Components
//!
//! - **`ClassMetadata` / `MethodMetadata` / `Annotation`**: the structural
//!   facts, deserializable from descriptor files.
//! - **`AnnotatedElement`**: the view conditions and the walker use; it
//!   answers `is_annotated` across direct and meta-annotations.
//! - **`MetadataProvider`**: the external collaborator. Providers may offer a
//!   structural declaration order for annotated methods when their primary
//!   reading came from reflection.
//! - **`MetadataReader`**: a caching front for a provider, scoped to one
//!   resolution context. It computes the meta-annotation closure of every
//!   class it hands out.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::rc::Rc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::annotations;
use crate::error::{Error, Result};

/// A single annotation attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
}

/// An annotation instance together with its explicitly declared attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Annotation {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attributes(
        type_name: impl Into<String>,
        attributes: BTreeMap<String, AttributeValue>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            attributes,
        }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// A single string attribute; a one-element list also qualifies.
    pub fn string(&self, key: &str) -> Option<String> {
        match self.attributes.get(key)? {
            AttributeValue::Str(value) => Some(value.clone()),
            AttributeValue::List(values) if values.len() == 1 => Some(values[0].clone()),
            _ => None,
        }
    }

    /// A string-array attribute; a single string is treated as one element.
    pub fn strings(&self, key: &str) -> Vec<String> {
        match self.attributes.get(key) {
            Some(AttributeValue::List(values)) => values.clone(),
            Some(AttributeValue::Str(value)) => vec![value.clone()],
            _ => Vec::new(),
        }
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        match self.attributes.get(key)? {
            AttributeValue::Bool(value) => Some(*value),
            AttributeValue::Str(value) => value.parse().ok(),
            _ => None,
        }
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.attributes.get(key)? {
            AttributeValue::Int(value) => Some(*value),
            AttributeValue::Str(value) => value.parse().ok(),
            _ => None,
        }
    }
}

/// What kind of type a class name denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    #[default]
    Class,
    Abstract,
    Interface,
    Annotation,
}

/// How a provider obtained a class's metadata.
///
/// Reflective readings may report annotated methods in an arbitrary order;
/// structural readings preserve declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Introspection {
    #[default]
    Structural,
    Reflective,
}

/// Metadata for a single method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodMetadata {
    pub name: String,
    #[serde(default)]
    pub declaring_class: String,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(skip)]
    pub meta_annotations: Vec<Annotation>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default, rename = "final")]
    pub is_final: bool,
    #[serde(default, rename = "private")]
    pub is_private: bool,
    #[serde(default)]
    pub return_type: Option<String>,
}

impl MethodMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaring_class: String::new(),
            annotations: Vec::new(),
            meta_annotations: Vec::new(),
            is_abstract: false,
            is_static: false,
            is_final: false,
            is_private: false,
            return_type: None,
        }
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn abstract_method(mut self) -> Self {
        self.is_abstract = true;
        self
    }
}

/// Metadata for a class, interface or annotation type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetadata {
    pub name: String,
    #[serde(default)]
    pub kind: ClassKind,
    #[serde(default, rename = "final")]
    pub is_final: bool,
    #[serde(default)]
    pub superclass: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub member_classes: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(skip)]
    pub meta_annotations: Vec<Annotation>,
    #[serde(default)]
    pub methods: Vec<MethodMetadata>,
    #[serde(default)]
    pub introspection: Introspection,
}

impl ClassMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ClassKind::Class,
            is_final: false,
            superclass: None,
            interfaces: Vec::new(),
            member_classes: Vec::new(),
            annotations: Vec::new(),
            meta_annotations: Vec::new(),
            methods: Vec::new(),
            introspection: Introspection::Structural,
        }
    }

    pub fn with_kind(mut self, kind: ClassKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn with_superclass(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn with_member_class(mut self, member: impl Into<String>) -> Self {
        self.member_classes.push(member.into());
        self
    }

    pub fn with_method(mut self, mut method: MethodMetadata) -> Self {
        if method.declaring_class.is_empty() {
            method.declaring_class = self.name.clone();
        }
        self.methods.push(method);
        self
    }

    pub fn reflective(mut self) -> Self {
        self.introspection = Introspection::Reflective;
        self
    }

    /// Interfaces and annotation types are never configuration sources.
    pub fn is_interface(&self) -> bool {
        matches!(self.kind, ClassKind::Interface | ClassKind::Annotation)
    }

    pub fn package_name(&self) -> &str {
        self.name.rsplit_once('.').map(|(pkg, _)| pkg).unwrap_or("")
    }

    /// Name without package and without enclosing classes (`Outer$Inner` → `Inner`).
    pub fn simple_name(&self) -> &str {
        let last = self.name.rsplit('.').next().unwrap_or(&self.name);
        last.rsplit('$').next().unwrap_or(last)
    }

    pub fn annotated_methods(&self, annotation_type: &str) -> Vec<&MethodMetadata> {
        self.methods
            .iter()
            .filter(|method| method.is_annotated(annotation_type))
            .collect()
    }

    pub fn has_annotated_methods(&self, annotation_type: &str) -> bool {
        self.methods
            .iter()
            .any(|method| method.is_annotated(annotation_type))
    }
}

/// Anything that carries annotations: classes and methods.
pub trait AnnotatedElement {
    /// Human-readable identity used in diagnostics.
    fn element_name(&self) -> String;

    fn direct_annotations(&self) -> &[Annotation];

    fn meta_annotations(&self) -> &[Annotation];

    /// Whether the annotation is present directly or as a meta-annotation.
    fn is_annotated(&self, annotation_type: &str) -> bool {
        self.direct_annotations()
            .iter()
            .chain(self.meta_annotations())
            .any(|annotation| annotation.type_name == annotation_type)
    }

    /// The nearest annotation of the given type: direct first, then meta.
    fn annotation(&self, annotation_type: &str) -> Option<&Annotation> {
        self.direct_annotations()
            .iter()
            .chain(self.meta_annotations())
            .find(|annotation| annotation.type_name == annotation_type)
    }

    /// Every declared instance of the given annotation type, direct ones first.
    fn all_annotations_of(&self, annotation_type: &str) -> Vec<&Annotation> {
        self.direct_annotations()
            .iter()
            .chain(self.meta_annotations())
            .filter(|annotation| annotation.type_name == annotation_type)
            .collect()
    }

    /// Direct instances only; repeatable directives are read this way.
    fn direct_annotations_of(&self, annotation_type: &str) -> Vec<&Annotation> {
        self.direct_annotations()
            .iter()
            .filter(|annotation| annotation.type_name == annotation_type)
            .collect()
    }

    /// The class behind this element, when it is one.
    fn as_class(&self) -> Option<&ClassMetadata> {
        None
    }
}

impl AnnotatedElement for ClassMetadata {
    fn element_name(&self) -> String {
        self.name.clone()
    }

    fn direct_annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    fn meta_annotations(&self) -> &[Annotation] {
        &self.meta_annotations
    }

    fn as_class(&self) -> Option<&ClassMetadata> {
        Some(self)
    }
}

impl AnnotatedElement for MethodMetadata {
    fn element_name(&self) -> String {
        format!("{}.{}()", self.declaring_class, self.name)
    }

    fn direct_annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    fn meta_annotations(&self) -> &[Annotation] {
        &self.meta_annotations
    }
}

/// Source of structural class facts.
pub trait MetadataProvider {
    /// Reads the metadata for `class_name` without loading the class.
    fn read(&self, class_name: &str) -> Result<ClassMetadata>;

    /// Structural declaration order of the class's methods, when this
    /// provider can offer one independently of its primary reading.
    fn declared_method_order(&self, _class_name: &str) -> Result<Option<Vec<String>>> {
        Ok(None)
    }

    /// All class names this provider knows about, used by package scanning.
    fn class_names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A provider backed by descriptors held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadataProvider {
    classes: BTreeMap<String, ClassMetadata>,
    declared_orders: HashMap<String, Vec<String>>,
}

impl InMemoryMetadataProvider {
    /// A provider seeded with the built-in annotation types.
    pub fn new() -> Self {
        let mut provider = Self::default();
        for annotation_type in annotations::builtin_annotation_types() {
            provider.add(annotation_type);
        }
        provider
    }

    pub fn add(&mut self, mut metadata: ClassMetadata) -> &mut Self {
        for method in &mut metadata.methods {
            if method.declaring_class.is_empty() {
                method.declaring_class = metadata.name.clone();
            }
        }
        self.classes.insert(metadata.name.clone(), metadata);
        self
    }

    pub fn with_class(mut self, metadata: ClassMetadata) -> Self {
        self.add(metadata);
        self
    }

    /// Records a structural method order for a class read reflectively.
    pub fn with_declared_order(mut self, class_name: &str, methods: &[&str]) -> Self {
        self.declared_orders.insert(
            class_name.to_string(),
            methods.iter().map(|m| m.to_string()).collect(),
        );
        self
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.classes.contains_key(class_name)
    }
}

impl MetadataProvider for InMemoryMetadataProvider {
    fn read(&self, class_name: &str) -> Result<ClassMetadata> {
        self.classes
            .get(class_name)
            .cloned()
            .ok_or_else(|| Error::ClassNotFound {
                class_name: class_name.to_string(),
            })
    }

    fn declared_method_order(&self, class_name: &str) -> Result<Option<Vec<String>>> {
        Ok(self.declared_orders.get(class_name).cloned())
    }

    fn class_names(&self) -> Vec<String> {
        self.classes.keys().cloned().collect()
    }
}

/// Run-scoped caching reader in front of a [`MetadataProvider`].
pub struct MetadataReader {
    provider: Box<dyn MetadataProvider>,
    foundational_prefixes: Vec<String>,
    cache: RefCell<HashMap<String, Rc<ClassMetadata>>>,
}

impl MetadataReader {
    pub fn new(provider: Box<dyn MetadataProvider>, foundational_prefixes: Vec<String>) -> Self {
        Self {
            provider,
            foundational_prefixes,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Reads a class, computing its meta-annotation closure on first access.
    pub fn read(&self, class_name: &str) -> Result<Rc<ClassMetadata>> {
        if let Some(cached) = self.cache.borrow().get(class_name) {
            return Ok(Rc::clone(cached));
        }
        let mut metadata = self.provider.read(class_name)?;
        metadata.meta_annotations = self.meta_closure(&metadata.annotations);
        for method in &mut metadata.methods {
            method.meta_annotations = self.meta_closure(&method.annotations);
        }
        let metadata = Rc::new(metadata);
        self.cache
            .borrow_mut()
            .insert(class_name.to_string(), Rc::clone(&metadata));
        Ok(metadata)
    }

    pub fn declared_method_order(&self, class_name: &str) -> Result<Option<Vec<String>>> {
        self.provider.declared_method_order(class_name)
    }

    pub fn class_names(&self) -> Vec<String> {
        self.provider.class_names()
    }

    /// Whether the name denotes a foundational runtime type that is never walked.
    pub fn is_foundational(&self, class_name: &str) -> bool {
        self.foundational_prefixes
            .iter()
            .any(|prefix| class_name.starts_with(prefix.as_str()))
    }

    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    fn meta_closure(&self, direct: &[Annotation]) -> Vec<Annotation> {
        let mut visited: HashSet<String> = direct.iter().map(|a| a.type_name.clone()).collect();
        let mut queue: VecDeque<String> = direct.iter().map(|a| a.type_name.clone()).collect();
        let mut found = Vec::new();

        while let Some(annotation_type) = queue.pop_front() {
            if self.is_foundational(&annotation_type) {
                continue;
            }
            match self.provider.read(&annotation_type) {
                Ok(declaration) => {
                    for meta in declaration.annotations {
                        if visited.insert(meta.type_name.clone()) {
                            queue.push_back(meta.type_name.clone());
                        }
                        found.push(meta);
                    }
                }
                Err(e) => {
                    debug!(
                        "Ignoring unreadable annotation type {}: {}",
                        annotation_type, e
                    );
                }
            }
        }
        found
    }
}

impl std::fmt::Debug for MetadataReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataReader")
            .field("foundational_prefixes", &self.foundational_prefixes)
            .field("cached", &self.cache.borrow().len())
            .finish()
    }
}
