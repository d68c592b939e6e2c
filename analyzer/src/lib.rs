//! The FLOP counter instruments selected routines of a running process, counts every executed
//! instruction form per routine activation and per thread, and converts the counts into
//! floating-point operations when threads and the process finish.
//!
//! ```text
//! Images ---------> TargetRoutines --> GlobalRegistry --> RoutineSlots     \
//!                                                                           |
//! Decoded insts --> AttributeTable --> InstAttributes                       |
//!                                                                            > FlopCounter
//! Thread events --> ThreadContext --> RoutineActivation's --> InstTable     |
//!                                                                           |
//! User configuration -------------------------------------> FlopOptions    /
//!
//! FlopCounter::fini() --> calculate_total_flops() --> FlopSummary --> report / JSON
//! ```

mod attributes;
mod errors;
mod flop_counter;
mod flops;
mod host;
mod inst_table;
pub mod options;
mod registry;
mod replay;
mod report;
mod routine;
mod stats_report;
mod summary;
mod target_routines;
mod thread_context;

pub use attributes::*;
pub use errors::*;
pub use flop_counter::*;
pub use flops::*;
pub use host::*;
pub use inst_table::*;
pub use options::*;
pub use registry::*;
pub use replay::*;
pub use report::*;
pub use routine::*;
pub use stats_report::*;
pub use summary::*;
pub use target_routines::*;
pub use thread_context::*;
