//! Per-thread aggregation
//!
//! A [`ThreadContext`] belongs to exactly one thread of the instrumented process. The host keeps
//! it in its thread-local storage and hands it to every callback running on that thread, so the
//! hot path mutates it without any synchronization. Activations are only appended, which keeps
//! their [`ActivationId`]s stable until the context is released.

use std::sync::Arc;

use crate::{InstSite, RoutineActivation, RoutineId, RoutineInfo};

/// Host thread identifier
pub type ThreadId = u32;

/// Index of an activation inside its thread's arena
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ActivationId(pub u32);

#[derive(Debug)]
pub struct ThreadContext {
    tid: ThreadId,
    /// Append-only arena, oldest first
    activations: Vec<RoutineActivation>,
    /// Current activation of every routine on this thread, indexed by routine id
    current: Vec<Option<ActivationId>>,
}

impl ThreadContext {
    pub fn new(tid: ThreadId) -> Self {
        Self { tid, activations: Vec::new(), current: Vec::new() }
    }

    pub fn tid(&self) -> ThreadId {
        self.tid
    }

    /// Opens a fresh activation for `routine` and makes it the current one
    pub fn routine_entered(&mut self, routine: &Arc<RoutineInfo>) -> ActivationId {
        let id = self.open(routine);
        self.activations[id.0 as usize].call();
        id
    }

    /// Counts one execution of the instruction bound to `site` in the current activation of its
    /// routine.  A routine entered before it was instrumented gets an activation with no calls.
    #[inline(always)]
    pub fn instruction_executed(&mut self, site: &InstSite, mask: u64) {
        let id = match self.current(site.routine.id) {
            Some(id) => id,
            None => self.open(&site.routine),
        };
        self.activations[id.0 as usize].on_instruction(site.slot, site.sample_mask, mask);
    }

    pub fn current(&self, routine: RoutineId) -> Option<ActivationId> {
        self.current.get(routine.index()).copied().flatten()
    }

    pub fn activation(&self, id: ActivationId) -> Option<&RoutineActivation> {
        self.activations.get(id.0 as usize)
    }

    /// Activations, newest first
    pub fn activations(&self) -> impl Iterator<Item = &RoutineActivation> {
        self.activations.iter().rev()
    }

    pub fn activations_mut(&mut self) -> impl Iterator<Item = &mut RoutineActivation> {
        self.activations.iter_mut().rev()
    }

    pub fn activation_count(&self) -> usize {
        self.activations.len()
    }

    fn open(&mut self, routine: &Arc<RoutineInfo>) -> ActivationId {
        let id = ActivationId(self.activations.len() as u32);
        self.activations.push(RoutineActivation::new(routine.clone(), 0));
        let index = routine.id.index();
        if index >= self.current.len() {
            self.current.resize(index + 1, None);
        }
        self.current[index] = Some(id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flopcount_core::IForm;

    fn site(routine: &Arc<RoutineInfo>, slot: u32, sample_mask: bool) -> InstSite {
        InstSite { routine: routine.clone(), slot, iform: IForm(slot), sample_mask }
    }

    #[test]
    fn test_each_entry_opens_a_new_activation() {
        let routine = Arc::new(RoutineInfo::new(RoutineId(3), "multiplyMatrix"));
        let mut ctx = ThreadContext::new(7);

        let first = ctx.routine_entered(&routine);
        ctx.instruction_executed(&site(&routine, 0, false), 0);
        let second = ctx.routine_entered(&routine);
        ctx.instruction_executed(&site(&routine, 0, false), 0);
        ctx.instruction_executed(&site(&routine, 1, true), 0b11);

        assert_ne!(first, second);
        assert_eq!(ctx.activation_count(), 2);
        assert_eq!(ctx.current(RoutineId(3)), Some(second));
        assert_eq!(ctx.activation(first).unwrap().table.get(0).unwrap().count, 1);
        let newest = ctx.activations().next().unwrap();
        assert_eq!(newest.calls, 1);
        assert_eq!(newest.table.get(1).unwrap().mask_popcount, 2);
    }

    #[test]
    fn test_instruction_without_entry_opens_implicit_activation() {
        let routine = Arc::new(RoutineInfo::new(RoutineId(0), "multiplySparseMatrix"));
        let mut ctx = ThreadContext::new(1);
        ctx.instruction_executed(&site(&routine, 0, false), 0);

        assert_eq!(ctx.activation_count(), 1);
        let activation = ctx.activations().next().unwrap();
        assert_eq!(activation.calls, 0);
        assert_eq!(activation.table.get(0).unwrap().count, 1);
    }

    #[test]
    fn test_routines_have_independent_current_activations() {
        let outer = Arc::new(RoutineInfo::new(RoutineId(0), "multiplyMatrix"));
        let inner = Arc::new(RoutineInfo::new(RoutineId(1), "multiplySparseMatrix"));
        let mut ctx = ThreadContext::new(0);

        ctx.routine_entered(&outer);
        ctx.routine_entered(&inner);
        ctx.instruction_executed(&site(&outer, 0, false), 0);

        let outer_activation = ctx.activation(ctx.current(RoutineId(0)).unwrap()).unwrap();
        let inner_activation = ctx.activation(ctx.current(RoutineId(1)).unwrap()).unwrap();
        assert_eq!(outer_activation.table.get(0).unwrap().count, 1);
        assert!(inner_activation.table.is_empty());
    }
}
