//! The FLOP counter: process-scoped state of the analysis and the callbacks the host runtime
//! invokes.
//!
//! ```text
//! image load --> instrument_image() --> CallbackSink (routine entry + per-instruction sites)
//!
//! thread start --> thread_start() --> ThreadContext (kept by the host, one per thread)
//!                                        |
//! routine entry --> on_routine_entry() --+   thread-local mode: append an activation
//! instruction   --> on_instruction() ----+   locked mode: shared counters under one lock
//!                                        |
//! thread fini --> thread_fini() --> calculate_flops() per activation --> finished threads
//!
//! process fini --> fini() --> calculate_total_flops() --> FlopSummary --> report
//! ```

use std::{
    collections::HashSet,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use clap::ValueEnum;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    calculate_flops, calculate_total_flops, strip_path, AttributeTable, CallbackSink,
    FlopCounterErr, FlopOptions, FlopSummary, GlobalRegistry, HostImage, HostRoutine, InstSite,
    RoutineActivation, RoutineInfo, RoutineSite, TargetRoutines, ThreadContext, ThreadId,
};

/// Strategy used by the counting callbacks
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CountingMode {
    /// Every thread counts into its own context, no lock on the hot path
    #[default]
    ThreadLocal,
    /// Every callback takes one process-wide lock around shared counters.  For hosts without
    /// thread-local storage.
    Locked,
}

impl fmt::Display for CountingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountingMode::ThreadLocal => write!(f, "thread-local"),
            CountingMode::Locked => write!(f, "locked"),
        }
    }
}

/// Counters shared by all threads in [`CountingMode::Locked`], one activation per routine
#[derive(Debug, Default)]
pub struct SharedCounters {
    routines: Mutex<Vec<Option<RoutineActivation>>>,
}

impl SharedCounters {
    pub fn routine_entered(&self, site: &RoutineSite) {
        let mut routines = self.routines.lock().unwrap_or_else(PoisonError::into_inner);
        Self::activation(&mut routines, &site.routine).call();
    }

    pub fn instruction_executed(&self, site: &InstSite, mask: u64) {
        let mut routines = self.routines.lock().unwrap_or_else(PoisonError::into_inner);
        Self::activation(&mut routines, &site.routine).on_instruction(
            site.slot,
            site.sample_mask,
            mask,
        );
    }

    /// Copy of the shared activations
    pub fn snapshot(&self) -> Vec<RoutineActivation> {
        let routines = self.routines.lock().unwrap_or_else(PoisonError::into_inner);
        routines.iter().flatten().cloned().collect()
    }

    fn activation<'a>(
        routines: &'a mut Vec<Option<RoutineActivation>>,
        routine: &Arc<RoutineInfo>,
    ) -> &'a mut RoutineActivation {
        let index = routine.id.index();
        if index >= routines.len() {
            routines.resize(index + 1, None);
        }
        routines[index].get_or_insert_with(|| RoutineActivation::new(routine.clone(), 0))
    }
}

/// Process-scoped analysis state.  Created before the target starts, finalized when it exits.
pub struct FlopCounter {
    mode: CountingMode,
    targets: TargetRoutines,
    attributes: AttributeTable,
    registry: Mutex<GlobalRegistry>,
    shared: SharedCounters,
    live_threads: Mutex<HashSet<ThreadId>>,
    /// Contexts of exited threads, already reduced, kept until the counter is dropped
    finished: Mutex<Vec<ThreadContext>>,
}

impl FlopCounter {
    pub fn new(options: &FlopOptions) -> Self {
        let targets = TargetRoutines::new(&options.routines, options.image.as_deref());
        let registry = GlobalRegistry::new(targets.names());
        Self {
            mode: options.mode,
            targets,
            attributes: AttributeTable::new(options.fp_criterion),
            registry: Mutex::new(registry),
            shared: SharedCounters::default(),
            live_threads: Mutex::new(HashSet::new()),
            finished: Mutex::new(Vec::new()),
        }
    }

    pub fn mode(&self) -> CountingMode {
        self.mode
    }

    pub fn attributes(&self) -> &AttributeTable {
        &self.attributes
    }

    /// Counters of the locked mode.  Hosts without thread-local storage call them directly.
    pub fn shared(&self) -> &SharedCounters {
        &self.shared
    }

    /// Image-load callback: registers the target routines of `image`, classifies their
    /// instructions and inserts the counting callbacks through `sink`.
    ///
    /// Returns the number of routines instrumented.  Routines already instrumented are skipped,
    /// so every static instruction gets its callback exactly once.
    pub fn instrument_image<I: HostImage>(&self, image: &I, sink: &mut impl CallbackSink) -> usize {
        let image_name = strip_path(image.name());
        if !self.targets.is_target_image(image.name()) {
            debug!("Skipping image {image_name}");
            return 0;
        }
        info!("Image {image_name}: {} routines", image.routines().len());

        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let mut instrumented = 0;
        for routine in image.routines() {
            let Some(name) = self.targets.match_symbol(routine.name()) else {
                continue;
            };
            if !registry.mark_instrumented(image_name, routine.address()) {
                debug!("Routine {name} at {:#x} already instrumented", routine.address());
                continue;
            }

            let info = registry.register(&name, routine.name(), image_name, routine.address());
            sink.insert_routine_entry(routine.address(), RoutineSite { routine: info.clone() });

            for (index, inst) in routine.instructions().iter().enumerate() {
                let attributes = self.attributes.get_or_classify(inst);
                let slot = registry.slot_for(info.id, &attributes);
                let site = InstSite {
                    routine: info.clone(),
                    slot,
                    iform: attributes.iform,
                    sample_mask: attributes.is_mask_op,
                };
                sink.insert_instruction(routine.inst_address(index), site);
            }

            info!(
                "Instrumented {name} ({}) at {:#x}: {} instructions",
                routine.name(),
                routine.address(),
                routine.instructions().len()
            );
            instrumented += 1;
        }
        instrumented
    }

    /// Thread-start callback.  The returned context must be stored by the host in the thread's
    /// local storage and passed to every callback of that thread.
    pub fn thread_start(&self, tid: ThreadId) -> Result<ThreadContext, FlopCounterErr> {
        let mut live = self.live_threads.lock().unwrap_or_else(PoisonError::into_inner);
        if !live.insert(tid) {
            return Err(FlopCounterErr::ThreadAlreadyStarted(tid));
        }
        info!("Thread {tid} started");
        Ok(ThreadContext::new(tid))
    }

    /// Routine-entry callback
    #[inline(always)]
    pub fn on_routine_entry(&self, ctx: &mut ThreadContext, site: &RoutineSite) {
        match self.mode {
            CountingMode::ThreadLocal => {
                ctx.routine_entered(&site.routine);
            }
            CountingMode::Locked => self.shared.routine_entered(site),
        }
    }

    /// Instruction callback.  `mask` is the live mask register value when `site.sample_mask` is
    /// set, and ignored otherwise.
    #[inline(always)]
    pub fn on_instruction(&self, ctx: &mut ThreadContext, site: &InstSite, mask: u64) {
        match self.mode {
            CountingMode::ThreadLocal => ctx.instruction_executed(site, mask),
            CountingMode::Locked => self.shared.instruction_executed(site, mask),
        }
    }

    /// Thread-fini callback: reduces the thread's activations and keeps them for the final merge
    pub fn thread_fini(&self, mut ctx: ThreadContext) -> Result<(), FlopCounterErr> {
        let tid = ctx.tid();
        let removed =
            self.live_threads.lock().unwrap_or_else(PoisonError::into_inner).remove(&tid);
        if !removed {
            return Err(FlopCounterErr::UnknownThread(tid));
        }

        {
            let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            for activation in ctx.activations_mut() {
                if let Some(slots) = registry.slots(activation.info.id) {
                    calculate_flops(activation, slots.attributes());
                }
            }
        }

        let (icount, flops) = ctx
            .activations()
            .fold((0, 0), |(icount, flops), a| (icount + a.icount, flops + a.flops));
        info!(
            "Thread {tid} finished: {} activations, {icount} instructions, {flops} FLOPs",
            ctx.activation_count()
        );

        self.finished.lock().unwrap_or_else(PoisonError::into_inner).push(ctx);
        Ok(())
    }

    /// Process-fini callback: merges every finished thread (and the shared counters) into the
    /// per-routine accumulators and returns the aggregated view.
    ///
    /// Calling it again without new thread data returns the same summary.
    pub fn fini(&self) -> FlopSummary {
        let live = self.live_threads.lock().unwrap_or_else(PoisonError::into_inner).len();
        if live > 0 {
            warn!("{live} threads still running at fini, their counts are not included");
        }

        let mut finished = self.finished.lock().unwrap_or_else(PoisonError::into_inner);
        finished.sort_by_key(|ctx| ctx.tid());
        let shared = self.shared.snapshot();

        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        calculate_total_flops(&mut registry, &finished, &shared);

        let summary = FlopSummary::new(
            self.mode,
            self.attributes.criterion(),
            &registry,
            &finished,
            self.attributes.len(),
        );
        info!(
            "Fini: {} routines, {} threads, {} FLOPs",
            summary.routines.len(),
            summary.threads.len(),
            summary.total_flops
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::{ReplayImage, ReplayRoutine};
    use flopcount_core::{DecodedInst, ElementType, IForm, InstCategory, OperandInfo};
    use std::collections::HashMap;

    #[derive(Default)]
    struct RecordingSink {
        routines: HashMap<u64, RoutineSite>,
        insts: HashMap<u64, InstSite>,
    }

    impl CallbackSink for RecordingSink {
        fn insert_routine_entry(&mut self, address: u64, site: RoutineSite) {
            assert!(self.routines.insert(address, site).is_none());
        }

        fn insert_instruction(&mut self, address: u64, site: InstSite) {
            assert!(self.insts.insert(address, site).is_none());
        }
    }

    fn mulsd(address: u64) -> DecodedInst {
        DecodedInst::new(IForm(1930), "MULSD_XMMsd_XMMsd", "MULSD", InstCategory::Sse, "SSE2")
            .with_address(address)
            .with_operand(OperandInfo::new(64, ElementType::Double, 1))
    }

    fn image(path: &str) -> ReplayImage {
        ReplayImage {
            name: path.to_string(),
            routines: vec![
                ReplayRoutine {
                    name: "_Z14multiplyMatrixPPdPiS1_S0_S1_S1_S0_S1_S1_".to_string(),
                    address: 0x1000,
                    instructions: vec![mulsd(0x1000), mulsd(0x1004)],
                },
                ReplayRoutine {
                    name: "_Z12print_matrixPPdii".to_string(),
                    address: 0x2000,
                    instructions: vec![mulsd(0x2000)],
                },
            ],
        }
    }

    #[test]
    fn test_instrument_image_once() {
        let counter = FlopCounter::new(&FlopOptions::default());
        let mut sink = RecordingSink::default();
        assert_eq!(counter.instrument_image(&image("/bin/matrix_multiplications.exe"), &mut sink), 1);
        assert_eq!(counter.instrument_image(&image("/bin/matrix_multiplications.exe"), &mut sink), 0);

        assert_eq!(sink.routines.len(), 1);
        assert_eq!(sink.insts.len(), 2);
        // Both instructions share the same form, hence the same slot
        assert_eq!(sink.insts[&0x1000].slot, sink.insts[&0x1004].slot);
        assert_eq!(counter.attributes().len(), 1);
    }

    #[test]
    fn test_image_filter() {
        let options = FlopOptions { image: Some("other.exe".to_string()), ..Default::default() };
        let counter = FlopCounter::new(&options);
        let mut sink = RecordingSink::default();
        assert_eq!(counter.instrument_image(&image("/bin/matrix_multiplications.exe"), &mut sink), 0);
        assert!(sink.insts.is_empty());
    }

    #[test]
    fn test_thread_lifecycle_errors() {
        let counter = FlopCounter::new(&FlopOptions::default());
        let ctx = counter.thread_start(4).unwrap();
        assert!(matches!(counter.thread_start(4), Err(FlopCounterErr::ThreadAlreadyStarted(4))));
        counter.thread_fini(ctx).unwrap();
        assert!(matches!(
            counter.thread_fini(ThreadContext::new(9)),
            Err(FlopCounterErr::UnknownThread(9))
        ));
        // A finished thread id can be reused
        let ctx = counter.thread_start(4).unwrap();
        counter.thread_fini(ctx).unwrap();
    }

    fn run(mode: CountingMode) -> FlopSummary {
        let counter = FlopCounter::new(&FlopOptions { mode, ..Default::default() });
        let mut sink = RecordingSink::default();
        counter.instrument_image(&image("matrix_multiplications.exe"), &mut sink);

        std::thread::scope(|scope| {
            for tid in 0..4 {
                let counter = &counter;
                let sink = &sink;
                scope.spawn(move || {
                    let mut ctx = counter.thread_start(tid).unwrap();
                    for _ in 0..3 {
                        counter.on_routine_entry(&mut ctx, &sink.routines[&0x1000]);
                        for _ in 0..100 {
                            counter.on_instruction(&mut ctx, &sink.insts[&0x1000], 0);
                            counter.on_instruction(&mut ctx, &sink.insts[&0x1004], 0);
                        }
                    }
                    counter.thread_fini(ctx).unwrap();
                });
            }
        });
        counter.fini()
    }

    #[test]
    fn test_modes_agree() {
        let local = run(CountingMode::ThreadLocal);
        let locked = run(CountingMode::Locked);

        for summary in [&local, &locked] {
            let routine = summary.routine("multiplyMatrix").unwrap();
            assert_eq!(routine.calls, 12);
            assert_eq!(routine.icount, 2400);
            assert_eq!(routine.flops, 2400);
            assert_eq!(summary.total_flops, 2400);
        }
        assert_eq!(local.threads.len(), 4);
        assert_eq!(local.threads[0].activations.len(), 3);
        assert!(locked.threads.iter().all(|thread| thread.activations.is_empty()));
    }

    #[test]
    fn test_shared_counters_without_thread_contexts() {
        let counter = FlopCounter::new(&FlopOptions {
            mode: CountingMode::Locked,
            ..Default::default()
        });
        let mut sink = RecordingSink::default();
        counter.instrument_image(&image("matrix_multiplications.exe"), &mut sink);

        std::thread::scope(|scope| {
            for _ in 0..3 {
                let shared = counter.shared();
                let sink = &sink;
                scope.spawn(move || {
                    shared.routine_entered(&sink.routines[&0x1000]);
                    for _ in 0..10 {
                        shared.instruction_executed(&sink.insts[&0x1004], 0);
                    }
                });
            }
        });

        let summary = counter.fini();
        let routine = summary.routine("multiplyMatrix").unwrap();
        assert_eq!(routine.calls, 3);
        assert_eq!(routine.icount, 30);
        assert_eq!(routine.flops, 30);
        assert!(summary.threads.is_empty());
        assert_eq!(counter.shared().snapshot().len(), 1);
    }

    #[test]
    fn test_fini_is_repeatable() {
        let counter = FlopCounter::new(&FlopOptions::default());
        let mut sink = RecordingSink::default();
        counter.instrument_image(&image("matrix_multiplications.exe"), &mut sink);
        let mut ctx = counter.thread_start(0).unwrap();
        counter.on_routine_entry(&mut ctx, &sink.routines[&0x1000]);
        counter.on_instruction(&mut ctx, &sink.insts[&0x1000], 0);
        counter.thread_fini(ctx).unwrap();

        let first = counter.fini();
        let second = counter.fini();
        assert_eq!(first.total_flops, 1);
        assert_eq!(first.total_flops, second.total_flops);
        assert_eq!(first.total_instructions, second.total_instructions);

        let missing = first.routine("multiplySparseMatrix").unwrap();
        assert_eq!(missing.calls, 0);
        assert!(missing.forms.is_empty());
        assert_eq!(missing.address, None);
    }
}
