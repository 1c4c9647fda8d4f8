//! Tuning knobs of the event pump.

use std::time::Duration;

use crate::domain::dispatch::UnmatchedPolicy;
use crate::domain::foundation::ValidationError;

/// Upper bound on concurrently processed messages per job.
pub const MAX_CONCURRENCY: usize = 64;

/// Configuration for the EventPump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumpOptions {
    /// Number of workers pulling from the subscription.
    pub concurrency: usize,

    /// How often the lease of an in-flight message is renewed.
    pub lease_renewal_interval: Duration,

    /// How long shutdown waits for in-flight handlers before abandoning them.
    pub shutdown_grace: Duration,

    /// How long one receive call waits on an empty subscription.
    pub receive_wait: Duration,

    /// Settlement of messages no registration accepts.
    pub unmatched: UnmatchedPolicy,
}

impl Default for PumpOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            lease_renewal_interval: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(30),
            receive_wait: Duration::from_secs(5),
            unmatched: UnmatchedPolicy::DeadLetter,
        }
    }
}

impl PumpOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_lease_renewal_interval(mut self, interval: Duration) -> Self {
        self.lease_renewal_interval = interval;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_receive_wait(mut self, wait: Duration) -> Self {
        self.receive_wait = wait;
        self
    }

    pub fn with_unmatched(mut self, policy: UnmatchedPolicy) -> Self {
        self.unmatched = policy;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(ValidationError::out_of_range(
                "concurrency",
                1,
                MAX_CONCURRENCY as u64,
                self.concurrency as u64,
            ));
        }
        if self.lease_renewal_interval.is_zero() {
            return Err(ValidationError::invalid_format(
                "lease_renewal_interval",
                "must be greater than zero",
            ));
        }
        if self.receive_wait.is_zero() {
            return Err(ValidationError::invalid_format(
                "receive_wait",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}
