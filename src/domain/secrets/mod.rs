//! Secrets module - rotation notifications that invalidate cached secrets.

mod events;

pub use events::{
    SecretChanged, SecretNewVersionCreated, SecretNotification,
    KEY_VAULT_SECRET_NEW_VERSION_EVENT_TYPE, SECRET_CHANGED_EVENT_TYPE,
};
