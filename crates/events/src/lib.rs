//! Domain event distribution: event trait, envelopes and the pub/sub bus.
//!
//! Events are published *after* the stock ledger has committed; the bus is a
//! distribution fabric, never a store. Consumers (read caches, notifiers)
//! must be idempotent — delivery is at-least-once.

pub mod bus;
pub mod envelope;
pub mod event;

pub use bus::{EventBus, InMemoryEventBus, PublishError, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
