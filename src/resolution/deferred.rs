//! Deferred import selectors.
//!
//! Deferred selectors met during the walk are parked with the class that
//! declared them. Once the walk is over they are settled together: sorted
//! by their own order, partitioned by import group, and each group's merged
//! list of imports is handed back to the parser.
//!
//! Selectors without a group each get a private pass-through group, so
//! their imports are never coordinated with anyone else's. A selector met
//! while settlement is under way is settled on the spot.

use std::rc::Rc;

use crate::error::{Error, Result};
use crate::metadata::ClassMetadata;
use crate::ordering::sort_by_order;
use crate::plugin::{
    DeferredImportSelector, GroupEntry, ImportGroup, Injected, PluginFactory, PluginInstance,
};

/// A deferred selector and the configuration class that declared it.
#[derive(Clone)]
pub struct DeferredImportHolder {
    pub selector_class: String,
    pub config_class_name: String,
    pub metadata: Rc<ClassMetadata>,
    pub selector: Rc<dyn DeferredImportSelector>,
}

impl std::fmt::Debug for DeferredImportHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredImportHolder")
            .field("selector_class", &self.selector_class)
            .field("config_class_name", &self.config_class_name)
            .finish()
    }
}

/// Collects deferred selectors until settlement.
#[derive(Debug)]
pub struct DeferredImportCoordinator {
    pending: Option<Vec<DeferredImportHolder>>,
}

impl Default for DeferredImportCoordinator {
    fn default() -> Self {
        Self {
            pending: Some(Vec::new()),
        }
    }
}

impl DeferredImportCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks `holder`, or hands it back when settlement is under way and it
    /// has to be processed immediately.
    pub fn handle(&mut self, holder: DeferredImportHolder) -> Option<DeferredImportHolder> {
        match &mut self.pending {
            Some(pending) => {
                pending.push(holder);
                None
            }
            None => Some(holder),
        }
    }

    pub fn is_settling(&self) -> bool {
        self.pending.is_none()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.as_ref().map_or(0, Vec::len)
    }

    /// Starts settlement, returning the parked holders in selector order.
    pub fn begin_settlement(&mut self) -> Vec<DeferredImportHolder> {
        let mut holders = self.pending.take().unwrap_or_default();
        sort_by_order(&mut holders, |holder| holder.selector.order());
        holders
    }

    pub fn end_settlement(&mut self) {
        self.pending = Some(Vec::new());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum GroupKey {
    Tag(String),
    Isolated(usize),
}

struct Grouping {
    key: GroupKey,
    group: Box<dyn ImportGroup>,
    holders: Vec<DeferredImportHolder>,
}

/// Passes every selector's imports through unchanged.
#[derive(Debug, Default)]
pub struct DefaultImportGroup {
    entries: Vec<GroupEntry>,
}

impl ImportGroup for DefaultImportGroup {
    fn process(
        &mut self,
        importing: &Rc<ClassMetadata>,
        selector: &dyn DeferredImportSelector,
    ) -> Result<()> {
        for import_class_name in selector.select_imports(importing)? {
            self.entries.push(GroupEntry {
                importing: Rc::clone(importing),
                import_class_name,
            });
        }
        Ok(())
    }

    fn select_imports(&mut self) -> Result<Vec<GroupEntry>> {
        Ok(std::mem::take(&mut self.entries))
    }
}

/// Partitions holders by import group, keeping first-seen group order.
#[derive(Default)]
pub struct DeferredImportGrouping {
    groupings: Vec<Grouping>,
}

impl DeferredImportGrouping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        holder: DeferredImportHolder,
        plugins: &PluginFactory,
        injected: &Injected,
    ) -> Result<()> {
        let key = match holder.selector.import_group() {
            Some(tag) => GroupKey::Tag(tag),
            None => GroupKey::Isolated(self.groupings.len()),
        };
        if let Some(grouping) = self.groupings.iter_mut().find(|g| g.key == key) {
            grouping.holders.push(holder);
            return Ok(());
        }
        let group: Box<dyn ImportGroup> = match &key {
            GroupKey::Tag(tag) => match plugins.instantiate(tag, injected)? {
                PluginInstance::ImportGroup(group) => group,
                other => {
                    return Err(Error::Instantiation {
                        class_name: tag.clone(),
                        message: format!("expected an ImportGroup, found {}", other.capability()),
                    })
                }
            },
            GroupKey::Isolated(_) => Box::new(DefaultImportGroup::default()),
        };
        self.groupings.push(Grouping {
            key,
            group,
            holders: vec![holder],
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.groupings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groupings.is_empty()
    }

    /// Feeds every member selector of group `index` into the group and
    /// returns its merged imports.
    pub fn group_imports(&mut self, index: usize) -> Result<Vec<GroupEntry>> {
        let Some(grouping) = self.groupings.get_mut(index) else {
            return Ok(Vec::new());
        };
        for holder in &grouping.holders {
            grouping
                .group
                .process(&holder.metadata, holder.selector.as_ref())?;
        }
        grouping.group.select_imports()
    }
}
