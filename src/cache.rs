use crate::structure_set::DicomStructureSet;

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};
use tracing::debug;

/// Parsed structure sets keyed by instance id, least recently used first
/// out. Owned by whoever composes the application and handed to the
/// components that need it.
#[derive(Debug)]
pub struct StructureSetCache {
    capacity: usize,
    entries: HashMap<String, Arc<DicomStructureSet>>,
    // Front is the least recently used.
    order: VecDeque<String>,
}

impl StructureSetCache {
    /// A cache holding at most `capacity` structure sets (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, instance_id: &str) -> bool {
        self.entries.contains_key(instance_id)
    }

    /// Returns the cached structure set and marks it as recently used.
    pub fn get(&mut self, instance_id: &str) -> Option<Arc<DicomStructureSet>> {
        let structure_set = self.entries.get(instance_id).cloned()?;
        self.touch(instance_id);
        Some(structure_set)
    }

    /// Stores a structure set, evicting the least recently used ones beyond
    /// capacity.
    pub fn insert(
        &mut self,
        instance_id: impl Into<String>,
        structure_set: DicomStructureSet,
    ) -> Arc<DicomStructureSet> {
        let instance_id = instance_id.into();
        let structure_set = Arc::new(structure_set);

        if self
            .entries
            .insert(instance_id.clone(), Arc::clone(&structure_set))
            .is_some()
        {
            self.touch(&instance_id);
        } else {
            self.order.push_back(instance_id);
        }

        while self.entries.len() > self.capacity {
            let Some(evicted) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&evicted);
            debug!(instance_id = %evicted, "Evicted structure set from cache");
        }

        structure_set
    }

    pub fn remove(&mut self, instance_id: &str) -> Option<Arc<DicomStructureSet>> {
        let removed = self.entries.remove(instance_id)?;
        self.order.retain(|id| id != instance_id);
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn touch(&mut self, instance_id: &str) {
        if let Some(position) = self.order.iter().position(|id| id == instance_id) {
            if let Some(id) = self.order.remove(position) {
                self.order.push_back(id);
            }
        }
    }
}
