//! Recorded session format
//!
//! A session is a JSON document with the images the target loaded (routines and their decoded
//! instructions) and, per thread, the stream of routine entries and instruction executions:
//!
//! ```json
//! {
//!   "images": [{ "name": "/bench/matrix_multiplications.exe", "routines": [
//!     { "name": "_Z14multiplyMatrixPPdPiS1_S0_S1_S1_S0_S1_S1_", "address": 4198710,
//!       "instructions": [{ "address": 4198710, "iform": 1930, "iform_name": "MULSD_XMMsd_XMMsd",
//!         "iclass": "MULSD", "category": "SSE", "extension": "SSE2",
//!         "operands": [{ "bits": 64, "type": "DOUBLE", "elements": 1 }] }] }] }],
//!   "threads": [{ "tid": 0, "events": [
//!     { "event": "enter", "address": 4198710 },
//!     { "event": "exec", "address": 4198710, "repeat": 1000 }] }]
//! }
//! ```

use std::{collections::HashSet, fs, path::Path};

use flopcount_core::DecodedInst;
use serde::{Deserialize, Serialize};

use crate::{FlopCounterErr, HostImage, HostRoutine, ThreadId};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Session {
    pub images: Vec<ReplayImage>,
    #[serde(default)]
    pub threads: Vec<ThreadTrace>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplayImage {
    /// Image path as reported by the loader
    pub name: String,
    pub routines: Vec<ReplayRoutine>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplayRoutine {
    /// Symbol, possibly mangled
    pub name: String,
    pub address: u64,
    pub instructions: Vec<DecodedInst>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThreadTrace {
    pub tid: ThreadId,
    pub events: Vec<TraceEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    /// Control reached the first instruction of the routine at `address`
    Enter { address: u64 },
    /// The instruction at `address` executed `repeat` times, with mask register value `mask`
    /// when it is mask-predicated
    Exec {
        address: u64,
        #[serde(default)]
        mask: Option<u64>,
        #[serde(default = "default_repeat")]
        repeat: u64,
    },
}

fn default_repeat() -> u64 {
    1
}

impl Session {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FlopCounterErr> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            FlopCounterErr::Session(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
            .map_err(|e| FlopCounterErr::Session(format!("{}: {e}", path.display())))
    }

    pub fn from_json(text: &str) -> Result<Self, FlopCounterErr> {
        let session: Session = serde_json::from_str(text)
            .map_err(|e| FlopCounterErr::Session(format!("Invalid session: {e}")))?;
        session.validate()?;
        Ok(session)
    }

    /// Checks that every thread id appears once
    pub fn validate(&self) -> Result<(), FlopCounterErr> {
        let mut tids = HashSet::new();
        for thread in &self.threads {
            if !tids.insert(thread.tid) {
                return Err(FlopCounterErr::Session(format!(
                    "Thread {} recorded more than once",
                    thread.tid
                )));
            }
        }
        Ok(())
    }
}

impl HostImage for ReplayImage {
    type Routine = ReplayRoutine;

    fn name(&self) -> &str {
        &self.name
    }

    fn routines(&self) -> &[ReplayRoutine] {
        &self.routines
    }
}

impl HostRoutine for ReplayRoutine {
    type Inst = DecodedInst;

    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> u64 {
        self.address
    }

    fn instructions(&self) -> &[DecodedInst] {
        &self.instructions
    }

    fn inst_address(&self, index: usize) -> u64 {
        self.instructions.get(index).map_or(self.address, |inst| inst.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flopcount_core::{ElementType, InstCategory};

    const SESSION: &str = r#"{
        "images": [{ "name": "/bench/matrix_multiplications.exe", "routines": [
            { "name": "multiplyMatrix", "address": 4096, "instructions": [
                { "address": 4096, "iform": 1930, "iform_name": "MULSD_XMMsd_XMMsd",
                  "iclass": "MULSD", "category": "SSE", "extension": "SSE2",
                  "operands": [{ "bits": 64, "type": "DOUBLE", "elements": 1 }] }] }] }],
        "threads": [{ "tid": 3, "events": [
            { "event": "enter", "address": 4096 },
            { "event": "exec", "address": 4096, "repeat": 5 },
            { "event": "exec", "address": 4096, "mask": 15 }] }]
    }"#;

    #[test]
    fn test_parse_session() {
        let session = Session::from_json(SESSION).unwrap();
        let routine = &session.images[0].routines[0];
        assert_eq!(routine.instructions[0].category, InstCategory::Sse);
        assert_eq!(routine.instructions[0].operands[0].element_type, ElementType::Double);
        assert_eq!(routine.inst_address(0), 4096);

        let events = &session.threads[0].events;
        assert_eq!(events[0], TraceEvent::Enter { address: 4096 });
        assert_eq!(events[1], TraceEvent::Exec { address: 4096, mask: None, repeat: 5 });
        assert_eq!(events[2], TraceEvent::Exec { address: 4096, mask: Some(15), repeat: 1 });
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let text = SESSION.replace("\"SSE\"", "\"NOT_A_CATEGORY\"");
        assert!(matches!(Session::from_json(&text), Err(FlopCounterErr::Session(_))));
    }

    #[test]
    fn test_duplicate_thread_is_rejected() {
        let mut session = Session::from_json(SESSION).unwrap();
        session.threads.push(session.threads[0].clone());
        assert!(session.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = Session::from_file("/nonexistent/session.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/session.json"));
    }
}
