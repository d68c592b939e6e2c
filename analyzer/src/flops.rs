//! FLOP calculation and cross-thread aggregation
//!
//! The hot path only counts executions (and active lanes for masked forms). Converting counts
//! into FLOPs, and folding per-call activations into per-routine totals, happens here, at thread
//! exit and at process exit.

use std::{collections::HashMap, sync::Arc};

use crate::{GlobalRegistry, InstAttributes, RoutineActivation, ThreadContext};

/// Derives per-form FLOPs and the routine totals of `activation`.
///
/// `forms` maps slots to the attributes of their instruction form. Totals are recomputed from
/// the counters, so running it again on the same activation gives the same result.
pub fn calculate_flops(activation: &mut RoutineActivation, forms: &[Arc<InstAttributes>]) {
    let mut icount = 0;
    let mut flops = 0;
    for (slot, counters) in activation.table.executed_mut() {
        counters.flops = forms.get(slot).map_or(0, |attributes| attributes.flops(counters));
        icount += counters.count;
        flops += counters.flops;
    }
    activation.icount = icount;
    activation.flops = flops;
}

/// Recomputes every process-wide accumulator of `registry` from scratch: zeroes it, folds in
/// every activation with the same routine name from every thread and from `shared` (the locked
/// mode counters), then derives its FLOPs.
///
/// The result does not depend on the order of `threads`.
pub fn calculate_total_flops(
    registry: &mut GlobalRegistry,
    threads: &[ThreadContext],
    shared: &[RoutineActivation],
) {
    let mut by_name: HashMap<&str, Vec<&RoutineActivation>> = HashMap::new();
    let activations = threads.iter().flat_map(|thread| thread.activations()).chain(shared.iter());
    for activation in activations {
        by_name.entry(activation.name()).or_default().push(activation);
    }

    for (accumulator, slots) in registry.entries_mut() {
        accumulator.reset();
        if let Some(activations) = by_name.get(accumulator.name()) {
            for activation in activations {
                accumulator.merge(activation);
            }
        }
        calculate_flops(accumulator, slots.attributes());
    }
}
