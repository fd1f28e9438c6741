//! Request and response bodies.
//!
//! Request types reject unknown fields and default every missing field, so
//! the processors' presence checks produce the client-facing messages rather
//! than the decoder.

use std::fmt;

use chrono::{DateTime, Utc};
use portcullis_core::IdentityContext;
use serde::{Deserialize, Serialize};

/// Credentials for `POST /api/v1/auth/token`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AuthRequest {
    /// Account email.
    #[serde(default)]
    pub email: String,
    /// Account password.
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Token issued by the user service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// The auth token to send in the token header.
    #[serde(default)]
    pub token: String,
    /// When the token stops being accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Body sent to the user service to verify a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyTokenRequest {
    /// The token taken from the request header.
    pub token: String,
}

/// Key rotation settings supplied at sign-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SettingRequest {
    /// Rotate the encryption key periodically.
    #[serde(default)]
    pub rotate_key: bool,
    /// Rotation period.
    #[serde(default)]
    pub rotate_after: i64,
    /// Client supplied encryption key.
    #[serde(default)]
    pub encryption_key: String,
}

/// Sign-up body for `POST /api/v1/user`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserRequest {
    /// Family name.
    #[serde(default)]
    pub last_name: String,
    /// Optional key settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<SettingRequest>,
    /// Given name.
    #[serde(default)]
    pub first_name: String,
    /// Hide the profile from other users.
    #[serde(default)]
    pub anonymous: bool,
    /// Login email.
    #[serde(default)]
    pub email: String,
    /// Login password.
    #[serde(default)]
    pub password: String,
}

// Credentials and keys stay out of logs.
impl fmt::Debug for UserRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRequest")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("anonymous", &self.anonymous)
            .finish_non_exhaustive()
    }
}

/// Key settings as reported by the user service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingResponse {
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Never written back to clients.
    #[serde(default, skip_serializing)]
    pub encryption_key: String,
    /// Whether rotation is on.
    #[serde(default)]
    pub rotate_key: bool,
}

/// A user profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    /// User id.
    #[serde(default)]
    pub user_id: String,
    /// Given name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub first_name: String,
    /// Family name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_name: String,
    /// Anonymous profile.
    #[serde(default)]
    pub anonymous: bool,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Key settings.
    #[serde(default)]
    pub settings: SettingResponse,
}

/// Body for `POST /api/v1/account`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AccountRequest {
    /// Account type, e.g. `SAVING`.
    #[serde(default)]
    pub account_type: String,
    /// Currency code, e.g. `BTC`.
    #[serde(default)]
    pub currency: String,
}

/// Balance view of an account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletHolding {
    /// Current balance.
    pub balance: f64,
    /// Owning account.
    pub account_id: String,
    /// Currency code.
    pub currency: String,
    /// Last modification.
    pub modification_time: DateTime<Utc>,
}

/// An account as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    /// Lifecycle status.
    pub status: String,
    /// Whether the account is locked.
    pub locked: bool,
    /// Account id.
    pub account_id: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Timezone the times are expressed in.
    pub timezone: String,
    /// Balance view.
    pub wallet_holding: WalletHolding,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `true` while the process serves requests.
    pub health: bool,
}

/// `{ code, data }` envelope returned by the user service.
///
/// A missing `data` decodes as `None`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceEnvelope<T> {
    /// Status the service reported.
    #[serde(default)]
    pub code: u16,
    /// Payload.
    pub data: Option<T>,
}

/// Verification result: the caller's identity, if the token resolved to one.
pub type VerifyTokenResponse = ServiceEnvelope<IdentityContext>;
