//! Background Jobs - topic-driven jobs hosted next to a service.
//!
//! Each job owns a subscription on a message bus, decodes every delivered
//! message as a cloud-event envelope, routes it to the first matching
//! handler and settles the message from the handler's outcome. Timer-driven
//! jobs share the same host.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
