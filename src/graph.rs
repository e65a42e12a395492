//! Property tables and the dependency graph between properties.
//!
//! Every built class owns an immutable [`PropertyTable`]: an arena holding
//! its own property definitions and those of all its ancestors, addressed by
//! [`PropIndex`]. Tables are composed from ancestor tables at build time and
//! never mutated afterwards. The per-instance [`DependencyGraph`] records,
//! over those indices, which properties consumed which.

use crate::builder::PropertyDef;
use crate::key::GlobalPropertyId;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Index of a property in its class's [`PropertyTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropIndex(u32);

impl PropIndex {
    fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PropIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Arena of property definitions visible to one class.
#[derive(Clone, Default)]
pub struct PropertyTable {
    entries: Vec<Arc<PropertyDef>>,
    by_id: HashMap<GlobalPropertyId, PropIndex>,
    by_name: HashMap<String, PropIndex>,
}

impl PropertyTable {
    /// Compose a table from a class's own definitions and its bases' tables.
    ///
    /// Own definitions win name resolution; after them each base is
    /// consulted in order, using that base's own resolution.
    pub(crate) fn compose(own: Vec<Arc<PropertyDef>>, bases: &[&PropertyTable]) -> Self {
        let mut table = PropertyTable::default();

        for def in own {
            let name = def.id().name().to_string();
            let index = table.insert(def);
            table.by_name.insert(name, index);
        }

        for base in bases {
            for def in &base.entries {
                table.insert(def.clone());
            }
            for (name, &base_index) in &base.by_name {
                let id = base.entries[base_index.slot()].id();
                if let Some(&index) = table.by_id.get(id) {
                    table.by_name.entry(name.clone()).or_insert(index);
                }
            }
        }

        table
    }

    fn insert(&mut self, def: Arc<PropertyDef>) -> PropIndex {
        if let Some(&index) = self.by_id.get(def.id()) {
            return index;
        }
        let index = PropIndex(self.entries.len() as u32);
        self.by_id.insert(def.id().clone(), index);
        self.entries.push(def);
        index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: PropIndex) -> Option<&Arc<PropertyDef>> {
        self.entries.get(index.slot())
    }

    pub fn index_of(&self, id: &GlobalPropertyId) -> Option<PropIndex> {
        self.by_id.get(id).copied()
    }

    /// Most-derived definition visible under `name`.
    pub fn resolve(&self, name: &str) -> Option<PropIndex> {
        self.by_name.get(name).copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = &GlobalPropertyId> {
        self.entries.iter().map(|def| def.id())
    }
}

impl fmt::Debug for PropertyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

/// Which properties consumed which, during their last computation.
///
/// Edges are kept in both directions so a property's inputs can be dropped
/// when it is invalidated.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// dependency -> properties that consumed it
    dependants: Vec<BTreeSet<PropIndex>>,
    /// dependant -> properties it consumed
    dependencies: Vec<BTreeSet<PropIndex>>,
}

impl DependencyGraph {
    /// Graph over a table of `size` properties.
    pub fn new(size: usize) -> Self {
        DependencyGraph {
            dependants: vec![BTreeSet::new(); size],
            dependencies: vec![BTreeSet::new(); size],
        }
    }

    /// Record that `dependant` consumed `dependency`. Idempotent.
    pub fn add_dependant(&mut self, dependency: PropIndex, dependant: PropIndex) -> bool {
        match (
            self.dependants.get_mut(dependency.slot()),
            self.dependencies.get_mut(dependant.slot()),
        ) {
            (Some(consumers), Some(inputs)) => {
                inputs.insert(dependency);
                consumers.insert(dependant)
            }
            _ => false,
        }
    }

    pub fn dependants_of(&self, dependency: PropIndex) -> impl Iterator<Item = PropIndex> + '_ {
        self.dependants
            .get(dependency.slot())
            .into_iter()
            .flatten()
            .copied()
    }

    pub fn dependencies_of(&self, dependant: PropIndex) -> impl Iterator<Item = PropIndex> + '_ {
        self.dependencies
            .get(dependant.slot())
            .into_iter()
            .flatten()
            .copied()
    }

    /// Forget everything `dependant` consumed.
    pub fn clear_dependencies_of(&mut self, dependant: PropIndex) {
        let Some(inputs) = self.dependencies.get_mut(dependant.slot()) else {
            return;
        };
        for dependency in std::mem::take(inputs) {
            if let Some(consumers) = self.dependants.get_mut(dependency.slot()) {
                consumers.remove(&dependant);
            }
        }
    }

    pub fn edge_count(&self) -> usize {
        self.dependants.iter().map(BTreeSet::len).sum()
    }
}
