//! Process wiring: configuration in, running gateway out.
//!
//! Startup order:
//!
//! 1. build the user service client
//! 2. dial the account service through the connection registry (fatal on failure)
//! 3. ask the account service's app endpoint whether it is up (logged only)
//! 4. assemble the gateway and serve until shutdown
//! 5. close every registry connection

use std::sync::Arc;

use portcullis_client::ApiClient;
use portcullis_config::{AccountRpcConfig, GatewayConfig, UserApiConfig};
use portcullis_core::RequestContext;
use portcullis_rpc::{
    AccountServiceClient, AppServiceClient, ConnectionRegistry, DialConfig, RpcConnection,
    TonicDialer,
};
use portcullis_telemetry::TelemetryConfig;
use tokio::net::TcpListener;

use crate::error::ServerError;
use crate::gateway::Gateway;
use crate::server::Server;
use crate::shutdown::ShutdownSignal;

/// Logging and metrics settings derived from the gateway configuration.
#[must_use]
pub fn telemetry_config(config: &GatewayConfig) -> TelemetryConfig {
    TelemetryConfig {
        logging: config.logging.to_log_config(),
        metrics: portcullis_telemetry::MetricsConfig {
            enabled: config.metrics.enabled,
            ..Default::default()
        },
    }
}

/// Dial settings for the account service.
#[must_use]
pub fn dial_config(config: &AccountRpcConfig) -> DialConfig {
    let dial = DialConfig::new().with_connect_timeout(config.connect_timeout());
    match &config.ca_cert_path {
        Some(path) => dial.with_ca_cert(path.clone(), config.tls_domain.clone()),
        None => dial,
    }
}

/// Client for the user service.
pub fn user_api_client(config: &UserApiConfig) -> Result<ApiClient, ServerError> {
    ApiClient::builder(config.base_url.trim_end_matches('/'))
        .timeout(config.timeout())
        .default_headers(config.default_headers.clone())
        .build()
        .map_err(ServerError::from)
}

/// A fully wired gateway that has not started serving yet.
#[derive(Debug)]
pub struct App {
    config: GatewayConfig,
    gateway: Gateway,
    registry: Arc<ConnectionRegistry>,
}

impl App {
    /// Wires the gateway against the real backends.
    pub async fn build(config: GatewayConfig) -> Result<Self, ServerError> {
        let users = user_api_client(&config.user_api)?;
        let registry = Arc::new(ConnectionRegistry::new(Arc::new(TonicDialer::new())));
        Self::build_with(config, users, registry).await
    }

    /// Wires the gateway with the given user client and registry.
    pub async fn build_with(
        config: GatewayConfig,
        users: ApiClient,
        registry: Arc<ConnectionRegistry>,
    ) -> Result<Self, ServerError> {
        let rpc = &config.account_rpc;
        let dial = dial_config(rpc);

        let connection = match registry.get_or_create(&rpc.address, &dial).await {
            Ok(connection) => connection,
            Err(e) => {
                tracing::error!(address = %rpc.address, error = %e, "failed to connect to account service");
                return Err(e.into());
            }
        };
        check_downstream_health(connection, rpc).await;

        let accounts = AccountServiceClient::from_registry(Arc::clone(&registry), &rpc.address, dial);
        let gateway = Gateway::new(&config, users, Arc::new(accounts));

        Ok(Self {
            config,
            gateway,
            registry,
        })
    }

    /// The assembled gateway.
    #[must_use]
    pub const fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// The connection registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Binds the configured address and serves until `shutdown` fires.
    pub async fn run(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let server = Server::new(&self.config.server, self.gateway);
        let result = match server.bind().await {
            Ok(listener) => server.serve(listener, shutdown).await,
            Err(e) => Err(e),
        };
        self.registry.close_all();
        result
    }

    /// Serves on `listener` until `shutdown` fires.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let result = Server::new(&self.config.server, self.gateway)
            .serve(listener, shutdown)
            .await;
        self.registry.close_all();
        result
    }
}

async fn check_downstream_health(connection: Arc<RpcConnection>, config: &AccountRpcConfig) {
    let ctx = RequestContext::new().with_timeout(config.request_timeout());
    match AppServiceClient::new(connection).check_health(&ctx).await {
        Ok(health) => tracing::info!(
            address = %config.address,
            is_up = health.is_up,
            region = %health.region,
            app_id = %health.app_id,
            "account service health check"
        ),
        Err(e) => tracing::warn!(
            address = %config.address,
            error = %e,
            "account service health check failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_dial_config_plaintext() {
        let config = AccountRpcConfig::default();
        let dial = dial_config(&config);
        assert_eq!(dial.connect_timeout, Some(Duration::from_millis(5000)));
        assert!(dial.ca_cert_path.is_none());
    }

    #[test]
    fn test_dial_config_tls() {
        let config = AccountRpcConfig {
            ca_cert_path: Some(PathBuf::from("/etc/portcullis/tls/ca.pem")),
            tls_domain: Some("accounts.internal".to_string()),
            ..Default::default()
        };
        let dial = dial_config(&config);
        assert_eq!(
            dial.ca_cert_path.as_deref(),
            Some(std::path::Path::new("/etc/portcullis/tls/ca.pem"))
        );
        assert_eq!(dial.tls_domain.as_deref(), Some("accounts.internal"));
    }

    #[test]
    fn test_telemetry_config_follows_sections() {
        let mut config = GatewayConfig::development();
        config.metrics.enabled = false;
        let telemetry = telemetry_config(&config);
        assert!(!telemetry.metrics.enabled);
        assert_eq!(telemetry.logging.level, "debug");
    }

    #[test]
    fn test_user_api_client_trims_slash() {
        let config = UserApiConfig {
            base_url: "http://users.internal:8000/".to_string(),
            ..Default::default()
        };
        let client = user_api_client(&config).unwrap();
        assert_eq!(client.base_url(), "http://users.internal:8000");
        assert_eq!(client.timeout(), Duration::from_secs(10));
    }
}
