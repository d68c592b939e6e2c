//! Process-wide routine registry
//!
//! Holds one accumulator per distinct routine name. Allow-listed names are registered up front,
//! so a routine that never shows up in any image still gets an (empty) accumulator.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::{InstAttributes, RoutineActivation, RoutineId, RoutineInfo, RoutineSlots};

#[derive(Debug)]
struct RoutineEntry {
    slots: RoutineSlots,
    accumulator: RoutineActivation,
}

#[derive(Debug, Default)]
pub struct GlobalRegistry {
    routines: Vec<RoutineEntry>,
    by_name: HashMap<String, RoutineId>,
    /// (image, routine address) pairs whose code already carries callbacks
    instrumented: HashSet<(String, u64)>,
}

impl GlobalRegistry {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        let mut registry = Self::default();
        for name in names {
            registry.get_or_insert(name.as_ref());
        }
        registry
    }

    /// Registers the routine `name` found at `address` in `image` and returns its snapshot.
    ///
    /// The first image a name is found in provides the snapshot; later ones share the
    /// accumulator.
    pub fn register(
        &mut self,
        name: &str,
        symbol: &str,
        image: &str,
        address: u64,
    ) -> Arc<RoutineInfo> {
        let id = self.get_or_insert(name);
        let entry = &mut self.routines[id.index()];
        if !entry.accumulator.info.is_resolved() {
            let info = RoutineInfo {
                id,
                name: name.to_string(),
                symbol: symbol.to_string(),
                image: image.to_string(),
                address: Some(address),
            };
            entry.accumulator.info = Arc::new(info);
        }
        entry.accumulator.info.clone()
    }

    /// Records that the routine at `address` of `image` is being instrumented.  Returns false if
    /// it already was.
    pub fn mark_instrumented(&mut self, image: &str, address: u64) -> bool {
        self.instrumented.insert((image.to_string(), address))
    }

    pub fn slot_for(&mut self, id: RoutineId, attributes: &Arc<InstAttributes>) -> u32 {
        self.routines[id.index()].slots.slot_for(attributes)
    }

    pub fn slots(&self, id: RoutineId) -> Option<&RoutineSlots> {
        self.routines.get(id.index()).map(|entry| &entry.slots)
    }

    pub fn find(&self, name: &str) -> Option<RoutineId> {
        self.by_name.get(name).copied()
    }

    pub fn routine(&self, id: RoutineId) -> Option<&Arc<RoutineInfo>> {
        self.routines.get(id.index()).map(|entry| &entry.accumulator.info)
    }

    /// Process-wide accumulators, in registration order
    pub fn accumulators(&self) -> impl Iterator<Item = &RoutineActivation> {
        self.routines.iter().map(|entry| &entry.accumulator)
    }

    pub fn accumulator(&self, id: RoutineId) -> Option<&RoutineActivation> {
        self.routines.get(id.index()).map(|entry| &entry.accumulator)
    }

    pub(crate) fn entries_mut(
        &mut self,
    ) -> impl Iterator<Item = (&mut RoutineActivation, &RoutineSlots)> {
        self.routines.iter_mut().map(|entry| (&mut entry.accumulator, &entry.slots))
    }

    pub fn len(&self) -> usize {
        self.routines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }

    fn get_or_insert(&mut self, name: &str) -> RoutineId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = RoutineId(self.routines.len() as u32);
        let info = Arc::new(RoutineInfo::new(id, name));
        self.routines.push(RoutineEntry {
            slots: RoutineSlots::default(),
            accumulator: RoutineActivation::new(info, 0),
        });
        self.by_name.insert(name.to_string(), id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list_is_preregistered() {
        let registry = GlobalRegistry::new(&["multiplyMatrix", "multiplySparseMatrix"]);
        assert_eq!(registry.len(), 2);
        let id = registry.find("multiplySparseMatrix").unwrap();
        let accumulator = registry.accumulator(id).unwrap();
        assert_eq!(accumulator.calls, 0);
        assert!(accumulator.table.is_empty());
        assert!(!accumulator.info.is_resolved());
    }

    #[test]
    fn test_register_snapshots_first_image() {
        let mut registry = GlobalRegistry::new(&["multiplyMatrix"]);
        let info = registry.register("multiplyMatrix", "_Z14multiplyMatrix", "a.exe", 0x401000);
        assert_eq!(info.image, "a.exe");
        assert_eq!(info.address, Some(0x401000));

        let again = registry.register("multiplyMatrix", "multiplyMatrix", "b.so", 0x7f00);
        assert!(Arc::ptr_eq(&info, &again));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_mark_instrumented_once() {
        let mut registry = GlobalRegistry::default();
        assert!(registry.mark_instrumented("a.exe", 0x10));
        assert!(!registry.mark_instrumented("a.exe", 0x10));
        assert!(registry.mark_instrumented("b.exe", 0x10));
    }
}
