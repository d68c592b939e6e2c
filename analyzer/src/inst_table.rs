//! Per-routine instruction counters
//!
//! An [`InstTable`] is indexed by slot, a dense per-routine number assigned at instrumentation
//! time to every distinct instruction form found in the routine (see
//! [`RoutineSlots`](crate::RoutineSlots)). A table sized to the forms a routine actually contains
//! keeps the per-call allocation small.

use serde::Serialize;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InstCounters {
    /// Dynamic executions
    pub count: u64,
    /// Sum of active lanes over every execution of a mask-predicated form
    pub mask_popcount: u64,
    /// Derived by the FLOP calculator, stale until it runs
    pub flops: u64,
}

impl InstCounters {
    #[inline(always)]
    pub fn on_execute(&mut self) {
        self.count += 1;
    }

    #[inline(always)]
    pub fn on_masked_execute(&mut self, mask: u64) {
        self.count += 1;
        self.mask_popcount += mask.count_ones() as u64;
    }

    pub fn merge(&mut self, other: &InstCounters) {
        self.count += other.count;
        self.mask_popcount += other.mask_popcount;
        self.flops += other.flops;
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstTable {
    counters: Vec<InstCounters>,
}

impl InstTable {
    pub fn with_slots(slots: usize) -> Self {
        Self { counters: vec![InstCounters::default(); slots] }
    }

    pub fn get(&self, slot: usize) -> Option<&InstCounters> {
        self.counters.get(slot)
    }

    /// Returns the counters of `slot`, growing the table when the routine gained forms after
    /// this table was created
    #[inline(always)]
    pub fn slot_mut(&mut self, slot: usize) -> &mut InstCounters {
        if slot >= self.counters.len() {
            self.counters.resize(slot + 1, InstCounters::default());
        }
        &mut self.counters[slot]
    }

    /// Iterates over the slots that executed at least once
    pub fn executed(&self) -> impl Iterator<Item = (usize, &InstCounters)> {
        self.counters.iter().enumerate().filter(|(_, counters)| counters.count > 0)
    }

    pub fn executed_mut(&mut self) -> impl Iterator<Item = (usize, &mut InstCounters)> {
        self.counters.iter_mut().enumerate().filter(|(_, counters)| counters.count > 0)
    }

    pub fn merge(&mut self, other: &InstTable) {
        for (slot, counters) in other.executed() {
            self.slot_mut(slot).merge(counters);
        }
    }

    pub fn clear(&mut self) {
        self.counters.iter_mut().for_each(|counters| *counters = InstCounters::default());
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// True when no slot executed
    pub fn is_empty(&self) -> bool {
        self.executed().next().is_none()
    }
}
