//! Processors: the calls a route makes to the backend services.
//!
//! Processors check that required fields are present and translate between
//! client bodies and backend messages. Business rules (password policy,
//! accepted currencies) belong to the backends.

mod account;
mod auth;
mod user;

pub use account::{timestamp_to_utc, AccountProcessor, DEFAULT_TIMEZONE};
pub use auth::{AuthProcessor, AUTH_PATH, VERIFY_PATH};
pub use user::{UserProcessor, CREATE_USER_TIMEOUT};

use portcullis_core::{GatewayError, GatewayResult};

/// Rejects an empty required field with `message`.
pub(crate) fn require(value: &str, message: &str) -> GatewayResult<()> {
    if value.trim().is_empty() {
        Err(GatewayError::validation(message))
    } else {
        Ok(())
    }
}
