//! The import stack and the imported-by registry.
//!
//! The stack holds the configuration classes whose imports are currently
//! being processed. Alongside it, every plain import records which class
//! imported it, so the chain of importers leading to a class can be
//! followed when checking for cycles.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::metadata::ClassMetadata;

#[derive(Debug, Default, Clone)]
pub struct ImportRegistry {
    stack: Vec<Rc<ClassMetadata>>,
    imports: HashMap<String, Vec<Rc<ClassMetadata>>>,
}

impl ImportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, metadata: Rc<ClassMetadata>) {
        self.stack.push(metadata);
    }

    pub fn pop(&mut self) -> Option<Rc<ClassMetadata>> {
        self.stack.pop()
    }

    /// Whether the named class is somewhere on the current stack.
    pub fn contains(&self, class_name: &str) -> bool {
        self.stack.iter().any(|entry| entry.name == class_name)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Records that `importing` imported `imported_class`.
    pub fn register_import(&mut self, importing: &Rc<ClassMetadata>, imported_class: &str) {
        self.imports
            .entry(imported_class.to_string())
            .or_default()
            .push(Rc::clone(importing));
    }

    /// The most recent importer of the named class.
    pub fn importing_class_for(&self, imported_class: &str) -> Option<&Rc<ClassMetadata>> {
        self.imports
            .get(imported_class)
            .and_then(|importers| importers.last())
    }

    /// Drops every record of the named class having imported something.
    pub fn remove_importing_class(&mut self, importing_class: &str) {
        for importers in self.imports.values_mut() {
            importers.retain(|importer| importer.name != importing_class);
        }
        self.imports.retain(|_, importers| !importers.is_empty());
    }

    /// Names of every class that imported the named class, oldest first.
    pub fn importers_of(&self, imported_class: &str) -> Vec<String> {
        self.imports
            .get(imported_class)
            .map(|importers| importers.iter().map(|m| m.name.clone()).collect())
            .unwrap_or_default()
    }

    /// The current stack as class names, bottom first.
    pub fn chain(&self) -> Vec<String> {
        self.stack.iter().map(|entry| entry.name.clone()).collect()
    }

    /// Whether the named class is on the stack and its importer chain leads
    /// back to itself.
    pub fn is_chained_import(&self, class_name: &str) -> bool {
        if !self.contains(class_name) {
            return false;
        }
        let mut visited = HashSet::new();
        let mut current = self.importing_class_for(class_name);
        while let Some(importer) = current {
            if importer.name == class_name {
                return true;
            }
            if !visited.insert(importer.name.as_str()) {
                return false;
            }
            current = self.importing_class_for(&importer.name);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(name: &str) -> Rc<ClassMetadata> {
        Rc::new(ClassMetadata::new(name))
    }

    #[test]
    fn test_stack_operations() {
        let mut registry = ImportRegistry::new();
        registry.push(meta("A"));
        registry.push(meta("B"));
        assert!(registry.contains("A"));
        assert_eq!(registry.depth(), 2);
        assert_eq!(registry.chain(), vec!["A", "B"]);
        assert_eq!(registry.pop().map(|m| m.name.clone()), Some("B".to_string()));
        assert!(!registry.contains("B"));
    }

    #[test]
    fn test_importing_class_is_last_registered() {
        let mut registry = ImportRegistry::new();
        registry.register_import(&meta("A"), "X");
        registry.register_import(&meta("C"), "X");
        assert_eq!(registry.importing_class_for("X").unwrap().name, "C");
        assert_eq!(registry.importers_of("X"), vec!["A", "C"]);

        registry.remove_importing_class("C");
        assert_eq!(registry.importing_class_for("X").unwrap().name, "A");
        registry.remove_importing_class("A");
        assert!(registry.importing_class_for("X").is_none());
    }

    #[test]
    fn test_chained_import_detected() {
        let mut registry = ImportRegistry::new();
        let a = meta("A");
        let b = meta("B");
        registry.push(Rc::clone(&a));
        registry.register_import(&a, "B");
        registry.push(Rc::clone(&b));
        registry.register_import(&b, "A");

        assert!(registry.is_chained_import("A"));
        assert!(!registry.is_chained_import("C"));
    }

    #[test]
    fn test_chain_without_loop_back_is_not_chained() {
        let mut registry = ImportRegistry::new();
        let root = meta("Root");
        registry.push(Rc::clone(&root));
        registry.register_import(&root, "A");
        registry.push(meta("A"));

        assert!(!registry.is_chained_import("A"));
    }

    #[test]
    fn test_foreign_loop_terminates() {
        let mut registry = ImportRegistry::new();
        registry.push(meta("A"));
        registry.register_import(&meta("C"), "A");
        registry.register_import(&meta("B"), "C");
        registry.register_import(&meta("C"), "B");

        assert!(!registry.is_chained_import("A"));
    }
}
