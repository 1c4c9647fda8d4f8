//! Subscription module - descriptors for the subscription a job consumes.

mod descriptor;

pub use descriptor::{
    SubscriptionDescriptor, SubscriptionMode, SubscriptionPath, MAX_SUBSCRIPTION_NAME_LEN,
};
