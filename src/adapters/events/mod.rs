//! Event bus adapters.
//!
//! - `EventDispatcher` - Synchronous, in-process publish/subscribe bus
//! - `SubscriptionGuard` - Lifetime-scoped registration
//! - `FnHandler` - Closure adapter for `EventHandler`

mod dispatcher;

pub use dispatcher::{EventDispatcher, FnHandler, SubscriptionGuard};
