//! Secret rotation events understood by the invalidation job.

use serde::{Deserialize, Serialize};

/// Event type of the generic secret-changed notification.
pub const SECRET_CHANGED_EVENT_TYPE: &str = "secret.changed";

/// Event type emitted by Azure Key Vault when a secret gets a new version.
pub const KEY_VAULT_SECRET_NEW_VERSION_EVENT_TYPE: &str = "Microsoft.KeyVault.SecretNewVersionCreated";

/// `{"name": "..."}` - a secret was rotated and cached copies are stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretChanged {
    pub name: String,
}

/// Key Vault's PascalCase notification payload.
///
/// Only `ObjectName` is required; the remaining members are modelled so the
/// payload also decodes under strict member handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecretNewVersionCreated {
    pub object_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, rename = "NBF", skip_serializing_if = "Option::is_none")]
    pub not_before: Option<i64>,
    #[serde(default, rename = "EXP", skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
}

/// Common view of both notification shapes.
pub trait SecretNotification {
    fn secret_name(&self) -> &str;
}

impl SecretNotification for SecretChanged {
    fn secret_name(&self) -> &str {
        &self.name
    }
}

impl SecretNotification for SecretNewVersionCreated {
    fn secret_name(&self) -> &str {
        &self.object_name
    }
}
