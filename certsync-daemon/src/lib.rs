//! Periodic sync scheduler: runs push or pull immediately, then every
//! interval (plus jitter) until SIGINT or SIGTERM.

mod error;
mod runtime;
pub mod scheduler;

pub use error::DaemonError;
pub use runtime::{run, start_blocking, Completion};
pub use scheduler::{RunStats, Scheduler};
