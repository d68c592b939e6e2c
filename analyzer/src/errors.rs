use std::{error::Error, fmt};

use flopcount_core::IForm;

#[derive(Debug)]
pub enum FlopCounterErr {
    WrongArguments(ErrWrongArguments),
    /// A thread started twice without finishing in between
    ThreadAlreadyStarted(u32),
    /// A thread finished (or was used) without having started
    UnknownThread(u32),
    /// A mask-predicated instruction executed without a sampled mask register
    MissingMask { address: u64, iform: IForm },
    /// An event refers to an address outside every loaded image
    UnknownSite(u64),
    /// A recorded session could not be read or parsed
    Session(String),
}

#[derive(Debug)]
pub struct ErrWrongArguments {
    pub description: String,
}

impl ErrWrongArguments {
    // Accept any type that can be converted into a String
    pub fn new<D>(description: D) -> ErrWrongArguments
    where
        D: Into<String>,
    {
        ErrWrongArguments { description: description.into() }
    }
}

impl fmt::Display for FlopCounterErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlopCounterErr::WrongArguments(e) => write!(f, "{e}"),
            FlopCounterErr::ThreadAlreadyStarted(tid) => {
                write!(f, "Thread {tid} started twice")
            }
            FlopCounterErr::UnknownThread(tid) => write!(f, "Unknown thread {tid}"),
            FlopCounterErr::MissingMask { address, iform } => {
                write!(f, "No mask value for mask-predicated instruction {iform} at {address:#x}")
            }
            FlopCounterErr::UnknownSite(address) => {
                write!(f, "No instruction of any loaded image at {address:#x}")
            }
            FlopCounterErr::Session(msg) => write!(f, "Session error: {msg}"),
        }
    }
}

impl Error for FlopCounterErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FlopCounterErr::WrongArguments(e) => Some(e),
            FlopCounterErr::ThreadAlreadyStarted(_) => None,
            FlopCounterErr::UnknownThread(_) => None,
            FlopCounterErr::MissingMask { .. } => None,
            FlopCounterErr::UnknownSite(_) => None,
            FlopCounterErr::Session(_) => None,
        }
    }
}

impl fmt::Display for ErrWrongArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.description)
    }
}

impl Error for ErrWrongArguments {}
