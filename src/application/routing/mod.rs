//! Routing - selects the handler for a decoded envelope.

mod registry;

pub use registry::{
    EnvelopeRegistration, HandlerRegistry, PreparedDispatch, Registration, Resolution,
};
