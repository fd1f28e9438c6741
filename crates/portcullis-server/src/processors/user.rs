//! User sign-up and profile lookup.

use std::time::Duration;

use portcullis_client::ApiClient;
use portcullis_core::{GatewayError, GatewayResult, IdentityContext, RequestContext};

use super::require;
use crate::models::{ServiceEnvelope, UserRequest, UserResponse};

/// Upper bound on the sign-up call.
pub const CREATE_USER_TIMEOUT: Duration = Duration::from_secs(10);

/// Calls the user service's `/user` resource.
#[derive(Debug, Clone)]
pub struct UserProcessor {
    client: ApiClient,
    token_header: String,
}

impl UserProcessor {
    /// Creates a processor that forwards tokens in `token_header`.
    #[must_use]
    pub fn new(client: ApiClient, token_header: impl Into<String>) -> Self {
        Self {
            client,
            token_header: token_header.into(),
        }
    }

    /// Registers a user.
    pub async fn create_user(
        &self,
        ctx: &RequestContext,
        request: &UserRequest,
    ) -> GatewayResult<UserResponse> {
        require(&request.email, "Invalid email address")?;
        require(&request.password, "Invalid password")?;

        let ctx = ctx.clone().with_timeout(CREATE_USER_TIMEOUT);
        let envelope: ServiceEnvelope<UserResponse> =
            self.client.post(&ctx, "/user", request, &[]).await?;

        envelope
            .data
            .ok_or_else(|| GatewayError::internal("user service returned no user"))
    }

    /// Fetches the profile of `user_id`, forwarding the caller's token.
    ///
    /// A profile whose id differs from the one asked for is treated as absent.
    pub async fn get_user_profile(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        token: &str,
    ) -> GatewayResult<UserResponse> {
        require(user_id, "invalid user id")?;

        let path = format!("/user/{user_id}");
        let envelope: ServiceEnvelope<UserResponse> = self
            .client
            .get(ctx, &path, &[(self.token_header.as_str(), token)])
            .await?;

        let profile = envelope.data.unwrap_or_default();
        if profile.user_id != user_id {
            tracing::warn!(
                trace_id = %ctx.trace_id(),
                requested = user_id,
                returned = %profile.user_id,
                caller = ?ctx.identity().map(IdentityContext::log_id),
                "user profile not found"
            );
            return Err(GatewayError::validation("user profile not found"));
        }

        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portcullis_core::translate;

    fn processor() -> UserProcessor {
        UserProcessor::new(
            ApiClient::builder("http://127.0.0.1:9").build().unwrap(),
            "xrf-auth-token",
        )
    }

    #[tokio::test]
    async fn test_create_user_requires_email_then_password() {
        let mut request = UserRequest::default();
        let err = processor()
            .create_user(&RequestContext::new(), &request)
            .await
            .unwrap_err();
        assert_eq!(translate(&err).message, "Invalid email address");

        request.email = "ada@example.com".into();
        let err = processor()
            .create_user(&RequestContext::new(), &request)
            .await
            .unwrap_err();
        assert_eq!(translate(&err).message, "Invalid password");
    }

    #[tokio::test]
    async fn test_empty_user_id_rejected() {
        let err = processor()
            .get_user_profile(&RequestContext::new(), "", "token")
            .await
            .unwrap_err();
        assert_eq!(translate(&err).message, "invalid user id");
    }
}
