mod replay_host;
mod session;

pub use replay_host::*;
pub use session::*;
