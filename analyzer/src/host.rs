//! Contract with the host instrumentation runtime
//!
//! The runtime that attaches to the process, patches code and runs callbacks is external. The
//! analysis only needs to walk the routines of a loaded image, read their decoded instructions
//! and ask the runtime to run a callback before a routine's first instruction or before an
//! instruction. Callback arguments are bound at insertion time as a [`RoutineSite`] or an
//! [`InstSite`].

use std::sync::Arc;

use flopcount_core::{IForm, InstDescriptor};

use crate::RoutineInfo;

/// A loaded code image
pub trait HostImage {
    type Routine: HostRoutine;

    /// Image path as reported by the loader
    fn name(&self) -> &str;

    fn routines(&self) -> &[Self::Routine];
}

/// A routine of a loaded image.  Handles are only valid while the image is loaded.
pub trait HostRoutine {
    type Inst: InstDescriptor;

    /// Symbol name, possibly mangled
    fn name(&self) -> &str;

    fn address(&self) -> u64;

    fn instructions(&self) -> &[Self::Inst];

    /// Address of instruction `index`
    fn inst_address(&self, index: usize) -> u64;
}

/// Arguments bound to a routine-entry callback
#[derive(Clone, Debug)]
pub struct RoutineSite {
    pub routine: Arc<RoutineInfo>,
}

/// Arguments bound to an instruction callback
#[derive(Clone, Debug)]
pub struct InstSite {
    pub routine: Arc<RoutineInfo>,
    /// Slot of the instruction form in the routine tables
    pub slot: u32,
    pub iform: IForm,
    /// The runtime must pass the live mask register value to the callback
    pub sample_mask: bool,
}

/// Callback insertion points offered by the runtime
pub trait CallbackSink {
    /// Inserts a call before the first instruction of the routine at `address`
    fn insert_routine_entry(&mut self, address: u64, site: RoutineSite);

    /// Inserts a call before the instruction at `address`
    fn insert_instruction(&mut self, address: u64, site: InstSite);
}
