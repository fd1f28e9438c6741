//! The authenticated caller.

use serde::{Deserialize, Serialize};

/// Attributes of an authenticated caller.
///
/// Produced by token verification and attached to the [`RequestContext`](crate::RequestContext)
/// by the authentication stage. Processors read it; nothing mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityContext {
    /// Id of the user the token belongs to.
    pub user_id: String,
    /// Device or client fingerprint bound to the token.
    #[serde(default)]
    pub fingerprint: String,
}

impl IdentityContext {
    /// Creates a new identity.
    #[must_use]
    pub fn new(user_id: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            fingerprint: fingerprint.into(),
        }
    }

    /// Returns `true` if both the user id and the fingerprint are present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.user_id.is_empty() && !self.fingerprint.is_empty()
    }

    /// Identifier suitable for logs.
    #[must_use]
    pub fn log_id(&self) -> String {
        format!("user:{}", self.user_id)
    }
}
