//! Host runtime that replays a recorded [`Session`]
//!
//! Images are instrumented in load order, then every recorded thread is replayed on the rayon
//! pool. Each worker owns the [`ThreadContext`] of the thread it replays, the way a live runtime
//! keeps it in thread-local storage.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::{
    CallbackSink, FlopCounter, FlopCounterErr, FlopSummary, HostImage, HostRoutine, InstSite,
    ReplayImage, RoutineSite, Session, ThreadTrace, TraceEvent,
};

/// Callback tables of the replayed process, by address
#[derive(Debug, Default)]
pub struct ReplayHost {
    routine_entries: HashMap<u64, RoutineSite>,
    instructions: HashMap<u64, InstSite>,
    /// Addresses of every routine and instruction of the loaded images
    loaded: HashSet<u64>,
}

impl CallbackSink for ReplayHost {
    fn insert_routine_entry(&mut self, address: u64, site: RoutineSite) {
        self.routine_entries.insert(address, site);
    }

    fn insert_instruction(&mut self, address: u64, site: InstSite) {
        self.instructions.insert(address, site);
    }
}

impl ReplayHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `image`, letting `counter` instrument it
    pub fn load_image(&mut self, counter: &FlopCounter, image: &ReplayImage) -> usize {
        for routine in image.routines() {
            self.loaded.insert(routine.address());
            self.loaded.extend(routine.instructions().iter().map(|inst| inst.address));
        }
        counter.instrument_image(image, self)
    }

    pub fn instrumented_sites(&self) -> usize {
        self.instructions.len()
    }

    /// Replays the events of one thread, from thread start to thread fini
    pub fn replay_thread(
        &self,
        counter: &FlopCounter,
        trace: &ThreadTrace,
    ) -> Result<(), FlopCounterErr> {
        let mut ctx = counter.thread_start(trace.tid)?;
        for event in &trace.events {
            match *event {
                TraceEvent::Enter { address } => match self.routine_entries.get(&address) {
                    Some(site) => counter.on_routine_entry(&mut ctx, site),
                    None => self.check_loaded(address)?,
                },
                TraceEvent::Exec { address, mask, repeat } => {
                    let Some(site) = self.instructions.get(&address) else {
                        self.check_loaded(address)?;
                        continue;
                    };
                    let mask = match (site.sample_mask, mask) {
                        (true, None) => {
                            return Err(FlopCounterErr::MissingMask { address, iform: site.iform })
                        }
                        (_, mask) => mask.unwrap_or(0),
                    };
                    for _ in 0..repeat {
                        counter.on_instruction(&mut ctx, site, mask);
                    }
                }
            }
        }
        debug!("Thread {} replayed {} events", trace.tid, trace.events.len());
        counter.thread_fini(ctx)
    }

    /// Uninstrumented code runs without callbacks.  Addresses outside every image are an error.
    fn check_loaded(&self, address: u64) -> Result<(), FlopCounterErr> {
        if self.loaded.contains(&address) {
            Ok(())
        } else {
            Err(FlopCounterErr::UnknownSite(address))
        }
    }
}

/// Runs a whole recorded session through `counter` and returns the process-fini summary
pub fn replay(counter: &FlopCounter, session: &Session) -> Result<FlopSummary, FlopCounterErr> {
    session.validate()?;

    let mut host = ReplayHost::new();
    let routines: usize = session.images.iter().map(|image| host.load_image(counter, image)).sum();
    info!(
        "Loaded {} images, instrumented {routines} routines, {} instruction sites",
        session.images.len(),
        host.instrumented_sites()
    );

    session.threads.par_iter().try_for_each(|trace| host.replay_thread(counter, trace))?;

    Ok(counter.fini())
}
