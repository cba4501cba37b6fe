//! Stream event protocol: type + payload + envelope.
//!
//! This crate defines the wire shape of a single agent-run stream event and
//! envelope injection. It does not depend on tiller. Tiller bridges its
//! internal `StreamEvent` into `ProtocolEvent` and calls `to_json`.

pub mod envelope;
pub mod event;

pub use envelope::{to_json, Envelope, EnvelopeState};
pub use event::ProtocolEvent;
