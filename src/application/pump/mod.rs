//! Event pump - the per-job consumer loop.

mod event_pump;
mod options;
mod stats;

pub use event_pump::EventPump;
pub use options::{PumpOptions, MAX_CONCURRENCY};
pub use stats::{PumpStats, PumpStatsSnapshot};
