//! Post-commit domain events.
//!
//! Publication is fire-and-forget: the orchestrator publishes after a
//! transaction has committed, failures are logged, and nothing here is ever
//! awaited for the correctness of the triggering operation.

mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::{
    MarketEvent,
    OrderPlacedEvent,
    OrderUpdatedEvent,
    QuotationAcceptedEvent,
    QuotationSentEvent,
};
pub use hooks::{EventHandlers, EventHooks, EventProducers};
