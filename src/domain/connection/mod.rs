//! Connection lifecycle: state machine, record and reconnect backoff.

mod backoff;
#[allow(clippy::module_inception)]
mod connection;
mod state;

pub use backoff::{BackoffPolicy, Jitter};
pub use connection::{Connection, LinkStatus};
pub use state::ConnectionState;
