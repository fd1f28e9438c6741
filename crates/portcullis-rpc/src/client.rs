//! Shared unary call path for the typed service clients.

use std::sync::Arc;

use http::uri::PathAndQuery;
use portcullis_core::{GatewayError, GatewayResult, RequestContext};
use tonic::client::Grpc;
use tonic::metadata::MetadataValue;
use tonic::transport::Channel;
use tonic::Status;
use tonic_prost::ProstCodec;

use crate::connection::RpcConnection;
use crate::options::DialConfig;
use crate::registry::ConnectionRegistry;

const TRACE_ID_METADATA: &str = "x-request-trace-id";
const USER_ID_METADATA: &str = "x-user-id";
const FINGERPRINT_METADATA: &str = "x-user-fingerprint";

/// Where a service client gets its connection from.
#[derive(Clone)]
pub(crate) enum Binding {
    /// A single connection, fixed at construction.
    Fixed(Arc<RpcConnection>),
    /// Looked up in the registry on every call, so a shut-down connection
    /// is replaced transparently.
    Registry {
        registry: Arc<ConnectionRegistry>,
        address: String,
        config: DialConfig,
    },
}

impl Binding {
    async fn connection(&self) -> GatewayResult<Arc<RpcConnection>> {
        match self {
            Self::Fixed(conn) => Ok(Arc::clone(conn)),
            Self::Registry {
                registry,
                address,
                config,
            } => Ok(registry.get_or_create(address, config).await?),
        }
    }

    pub(crate) fn address(&self) -> &str {
        match self {
            Self::Fixed(conn) => conn.address(),
            Self::Registry { address, .. } => address,
        }
    }

    /// Issues a unary call bounded by the request deadline.
    pub(crate) async fn unary<Req, Resp>(
        &self,
        ctx: &RequestContext,
        path: &'static str,
        message: Req,
    ) -> GatewayResult<Resp>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let conn = self.connection().await?;
        let channel = conn.channel()?;
        conn.begin_call();

        let call = invoke(channel, ctx, path, message);
        let result = match ctx.remaining() {
            Some(left) if left.is_zero() => Err(deadline_exceeded()),
            Some(left) => tokio::time::timeout(left, call)
                .await
                .unwrap_or_else(|_| Err(deadline_exceeded())),
            None => call.await,
        };

        conn.record_outcome(&result);
        if let Err(status) = &result {
            tracing::debug!(
                trace_id = %ctx.trace_id(),
                path,
                code = ?status.code(),
                "RPC call failed"
            );
        }
        result.map_err(GatewayError::from)
    }
}

async fn invoke<Req, Resp>(
    channel: Channel,
    ctx: &RequestContext,
    path: &'static str,
    message: Req,
) -> Result<Resp, Status>
where
    Req: prost::Message + Send + Sync + 'static,
    Resp: prost::Message + Default + Send + Sync + 'static,
{
    let mut grpc = Grpc::new(channel);
    grpc.ready()
        .await
        .map_err(|e| Status::unavailable(format!("service was not ready: {e}")))?;

    let mut request = tonic::Request::new(message);
    if let Some(left) = ctx.remaining() {
        request.set_timeout(left);
    }
    if let Ok(value) = MetadataValue::try_from(ctx.trace_id().to_string()) {
        request.metadata_mut().insert(TRACE_ID_METADATA, value);
    }
    if let Some(identity) = ctx.identity() {
        if let Ok(value) = MetadataValue::try_from(identity.user_id.as_str()) {
            request.metadata_mut().insert(USER_ID_METADATA, value);
        }
        if let Ok(value) = MetadataValue::try_from(identity.fingerprint.as_str()) {
            request.metadata_mut().insert(FINGERPRINT_METADATA, value);
        }
    }

    let codec = ProstCodec::<Req, Resp>::default();
    grpc.unary(request, PathAndQuery::from_static(path), codec)
        .await
        .map(tonic::Response::into_inner)
}

fn deadline_exceeded() -> Status {
    Status::deadline_exceeded("request deadline exceeded")
}
