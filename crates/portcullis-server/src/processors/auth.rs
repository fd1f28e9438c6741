//! Token issue and verification against the user service.

use http::StatusCode;
use portcullis_client::ApiClient;
use portcullis_core::{BoxFuture, GatewayError, GatewayResult, IdentityContext, RequestContext};
use portcullis_middleware::stages::TokenVerifier;

use super::require;
use crate::models::{AuthRequest, AuthResponse, ServiceEnvelope, VerifyTokenRequest, VerifyTokenResponse};

/// User service path that issues tokens.
pub const AUTH_PATH: &str = "/api/v1/auth";

/// User service path that verifies tokens.
pub const VERIFY_PATH: &str = "/api/v1/auth/verify";

/// Issues and verifies auth tokens.
///
/// Also the [`TokenVerifier`] behind the authentication stage.
#[derive(Debug, Clone)]
pub struct AuthProcessor {
    client: ApiClient,
}

impl AuthProcessor {
    /// Creates a processor over the user service client.
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Exchanges credentials for a token.
    pub async fn authenticate(
        &self,
        ctx: &RequestContext,
        request: &AuthRequest,
    ) -> GatewayResult<AuthResponse> {
        require(&request.email, "Invalid email address")?;
        require(&request.password, "Invalid password")?;

        let envelope: ServiceEnvelope<AuthResponse> =
            self.client.post(ctx, AUTH_PATH, request, &[]).await?;

        envelope.data.ok_or_else(|| {
            GatewayError::internal_with_status(
                "authentication failed",
                StatusCode::BAD_GATEWAY,
                anyhow::anyhow!("user service returned no token data"),
            )
        })
    }

    /// Resolves `token` to the caller's identity.
    pub async fn verify(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> GatewayResult<Option<IdentityContext>> {
        let body = VerifyTokenRequest {
            token: token.to_string(),
        };
        let envelope: VerifyTokenResponse = self.client.post(ctx, VERIFY_PATH, &body, &[]).await?;
        Ok(envelope.data)
    }
}

impl TokenVerifier for AuthProcessor {
    fn verify_token<'a>(
        &'a self,
        ctx: &'a RequestContext,
        token: &'a str,
    ) -> BoxFuture<'a, GatewayResult<Option<IdentityContext>>> {
        Box::pin(self.verify(ctx, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portcullis_core::translate;

    fn processor() -> AuthProcessor {
        // Never reached: presence checks fail first.
        AuthProcessor::new(ApiClient::builder("http://127.0.0.1:9").build().unwrap())
    }

    #[tokio::test]
    async fn test_missing_email_rejected() {
        let request = AuthRequest {
            email: String::new(),
            password: "pw".into(),
        };
        let err = processor()
            .authenticate(&RequestContext::new(), &request)
            .await
            .unwrap_err();
        assert_eq!(translate(&err).message, "Invalid email address");
        assert_eq!(translate(&err).status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_password_rejected() {
        let request = AuthRequest {
            email: "ada@example.com".into(),
            password: "  ".into(),
        };
        let err = processor()
            .authenticate(&RequestContext::new(), &request)
            .await
            .unwrap_err();
        assert_eq!(translate(&err).message, "Invalid password");
    }
}
