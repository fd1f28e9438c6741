//! App service client, used for the startup health check.

use std::sync::Arc;

use portcullis_core::{GatewayResult, RequestContext};

use crate::client::Binding;
use crate::connection::RpcConnection;
use crate::proto::app::{CheckHealthRequest, CheckHealthResponse};

const CHECK_HEALTH: &str = "/app.v1.AppService/CheckHealth";

/// Typed client for `app.v1.AppService`.
#[derive(Clone)]
pub struct AppServiceClient {
    binding: Binding,
}

impl AppServiceClient {
    /// Binds the client to one connection.
    #[must_use]
    pub fn new(connection: Arc<RpcConnection>) -> Self {
        Self {
            binding: Binding::Fixed(connection),
        }
    }

    /// Asks the downstream service whether it is up.
    pub async fn check_health(&self, ctx: &RequestContext) -> GatewayResult<CheckHealthResponse> {
        self.binding
            .unary(ctx, CHECK_HEALTH, CheckHealthRequest {})
            .await
    }
}

impl std::fmt::Debug for AppServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppServiceClient")
            .field("address", &self.binding.address())
            .finish()
    }
}
