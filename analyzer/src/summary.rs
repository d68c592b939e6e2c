//! Aggregated view of a finished analysis, as reported and exported to JSON

use std::sync::Arc;

use serde::Serialize;

use crate::{
    CountingMode, FpCriterion, GlobalRegistry, InstAttributes, RoutineActivation, ThreadContext,
    ThreadId,
};

/// One executed instruction form of a routine
#[derive(Clone, Debug, Serialize)]
pub struct FormStats {
    #[serde(flatten)]
    pub attributes: InstAttributes,
    pub count: u64,
    pub mask_popcount: u64,
    pub flops: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct RoutineStats {
    pub name: String,
    pub symbol: String,
    pub image: String,
    pub address: Option<u64>,
    pub calls: u64,
    pub icount: u64,
    pub flops: u64,
    /// Executed forms, in the order the instrumentation found them
    pub forms: Vec<FormStats>,
}

impl RoutineStats {
    pub fn new(activation: &RoutineActivation, forms: &[Arc<InstAttributes>]) -> Self {
        let forms = activation
            .table
            .executed()
            .filter_map(|(slot, counters)| {
                forms.get(slot).map(|attributes| FormStats {
                    attributes: attributes.as_ref().clone(),
                    count: counters.count,
                    mask_popcount: counters.mask_popcount,
                    flops: counters.flops,
                })
            })
            .collect();
        let info = &activation.info;
        Self {
            name: info.name.clone(),
            symbol: info.symbol.clone(),
            image: info.image.clone(),
            address: info.address,
            calls: activation.calls,
            icount: activation.icount,
            flops: activation.flops,
            forms,
        }
    }

    /// Forms classified as floating point
    pub fn flop_forms(&self) -> impl Iterator<Item = &FormStats> {
        self.forms.iter().filter(|form| form.attributes.is_flop)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ThreadStats {
    pub tid: ThreadId,
    pub icount: u64,
    pub flops: u64,
    /// Activations of the thread, newest first.  Empty in locked mode.
    pub activations: Vec<RoutineStats>,
}

impl ThreadStats {
    pub fn new(ctx: &ThreadContext, registry: &GlobalRegistry) -> Self {
        let activations: Vec<RoutineStats> = ctx
            .activations()
            .map(|activation| {
                let forms = registry.slots(activation.info.id).map_or(&[][..], |s| s.attributes());
                RoutineStats::new(activation, forms)
            })
            .collect();
        Self {
            tid: ctx.tid(),
            icount: activations.iter().map(|a| a.icount).sum(),
            flops: activations.iter().map(|a| a.flops).sum(),
            activations,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct FlopSummary {
    pub version: String,
    pub mode: CountingMode,
    pub fp_criterion: FpCriterion,
    pub total_instructions: u64,
    pub total_flops: u64,
    /// Distinct instruction forms classified during instrumentation
    pub distinct_forms: usize,
    /// Process-wide accumulators, in registration order
    pub routines: Vec<RoutineStats>,
    /// Finished threads, by thread id
    pub threads: Vec<ThreadStats>,
}

impl FlopSummary {
    pub fn new(
        mode: CountingMode,
        fp_criterion: FpCriterion,
        registry: &GlobalRegistry,
        threads: &[ThreadContext],
        distinct_forms: usize,
    ) -> Self {
        let routines: Vec<RoutineStats> = registry
            .accumulators()
            .map(|accumulator| {
                let forms = registry.slots(accumulator.info.id).map_or(&[][..], |s| s.attributes());
                RoutineStats::new(accumulator, forms)
            })
            .collect();
        Self {
            version: crate::FLOPCOUNT_VERSION_MESSAGE.to_string(),
            mode,
            fp_criterion,
            total_instructions: routines.iter().map(|r| r.icount).sum(),
            total_flops: routines.iter().map(|r| r.flops).sum(),
            distinct_forms,
            routines,
            threads: threads.iter().map(|ctx| ThreadStats::new(ctx, registry)).collect(),
        }
    }

    pub fn routine(&self, name: &str) -> Option<&RoutineStats> {
        self.routines.iter().find(|routine| routine.name == name)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
