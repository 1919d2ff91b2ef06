//! Event bus: synchronous publish/subscribe between decoupled systems.
//!
//! # Invariants
//! - Delivery is synchronous, on the emitter's call stack, in registration order.
//! - A listener is registered at most once per event name (pointer identity).
//! - A panicking listener is not isolated: the panic unwinds into the emitter
//!   and later listeners for that emit do not run.

mod bus;
mod event;

pub use bus::{EventBus, Listener, listener};
pub use event::{Event, channels};

/// Bus carrying the scenekit [`Event`] payload.
pub type Bus = EventBus<Event>;

pub fn crate_info() -> &'static str {
    "scenekit-events v0.1.0"
}
