use std::{collections::HashMap, sync::Arc};

use flopcount_core::IForm;
use serde::Serialize;

use crate::{InstAttributes, InstTable};

/// Index of a routine in the [`GlobalRegistry`](crate::GlobalRegistry)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoutineId(pub u32);

impl RoutineId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Owned snapshot of a routine, taken when it is registered.  It stays valid after the host
/// unloads the image the routine came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoutineInfo {
    pub id: RoutineId,
    /// Undecorated name, the aggregation key
    pub name: String,
    /// Symbol as found in the image, possibly mangled
    pub symbol: String,
    /// Image file name, without path.  Empty until the routine is found in an image.
    pub image: String,
    /// Entry address, unknown until the routine is found in an image
    pub address: Option<u64>,
}

impl RoutineInfo {
    pub fn new(id: RoutineId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            symbol: name.to_string(),
            image: String::new(),
            address: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.address.is_some()
    }
}

/// Dense numbering of the instruction forms found in one routine
#[derive(Clone, Debug, Default)]
pub struct RoutineSlots {
    attributes: Vec<Arc<InstAttributes>>,
    index: HashMap<IForm, u32>,
}

impl RoutineSlots {
    /// Returns the slot of the form of `attributes`, assigning a new one on first sight
    pub fn slot_for(&mut self, attributes: &Arc<InstAttributes>) -> u32 {
        if let Some(slot) = self.index.get(&attributes.iform) {
            return *slot;
        }
        let slot = self.attributes.len() as u32;
        self.attributes.push(attributes.clone());
        self.index.insert(attributes.iform, slot);
        slot
    }

    pub fn attributes(&self) -> &[Arc<InstAttributes>] {
        &self.attributes
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Counters of a routine over some scope: one call on one thread, or the whole process
#[derive(Clone, Debug)]
pub struct RoutineActivation {
    pub info: Arc<RoutineInfo>,
    pub calls: u64,
    /// Executed instructions, derived by the FLOP calculator
    pub icount: u64,
    /// Executed FLOPs, derived by the FLOP calculator
    pub flops: u64,
    pub table: InstTable,
}

impl RoutineActivation {
    pub fn new(info: Arc<RoutineInfo>, slots: usize) -> Self {
        Self { info, calls: 0, icount: 0, flops: 0, table: InstTable::with_slots(slots) }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn call(&mut self) {
        self.calls += 1;
    }

    #[inline(always)]
    pub fn on_instruction(&mut self, slot: u32, sample_mask: bool, mask: u64) {
        let counters = self.table.slot_mut(slot as usize);
        if sample_mask {
            counters.on_masked_execute(mask);
        } else {
            counters.on_execute();
        }
    }

    /// Zeroes every counter, keeping the table allocation
    pub fn reset(&mut self) {
        self.calls = 0;
        self.icount = 0;
        self.flops = 0;
        self.table.clear();
    }

    /// Adds calls, totals and per-form counters of `other`
    pub fn merge(&mut self, other: &RoutineActivation) {
        self.calls += other.calls;
        self.icount += other.icount;
        self.flops += other.flops;
        self.table.merge(&other.table);
    }
}
