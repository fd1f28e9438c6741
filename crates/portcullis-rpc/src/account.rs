//! Account service client.

use std::sync::Arc;

use portcullis_core::{BoxFuture, GatewayResult, RequestContext};

use crate::client::Binding;
use crate::connection::RpcConnection;
use crate::options::DialConfig;
use crate::proto::account::{
    CreateAccountRequest, CreateAccountResponse, GetAccountRequest, GetAccountResponse,
};
use crate::registry::ConnectionRegistry;

const CREATE_ACCOUNT: &str = "/account.v1.AccountService/CreateAccount";
const GET_ACCOUNT: &str = "/account.v1.AccountService/GetAccount";

/// Operations of the downstream account service.
///
/// Implemented by [`AccountServiceClient`]; processors depend on the trait so
/// tests can substitute a fake.
pub trait AccountService: Send + Sync + 'static {
    /// Creates an account.
    fn create_account<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: CreateAccountRequest,
    ) -> BoxFuture<'a, GatewayResult<CreateAccountResponse>>;

    /// Fetches an account by id.
    fn get_account<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: GetAccountRequest,
    ) -> BoxFuture<'a, GatewayResult<GetAccountResponse>>;
}

/// Typed client for `account.v1.AccountService`.
#[derive(Clone)]
pub struct AccountServiceClient {
    binding: Binding,
}

impl AccountServiceClient {
    /// Binds the client to one connection.
    #[must_use]
    pub fn new(connection: Arc<RpcConnection>) -> Self {
        Self {
            binding: Binding::Fixed(connection),
        }
    }

    /// Binds the client to whatever connection the registry holds for `address`.
    ///
    /// A connection shut down by a failed call is redialed on the next call.
    #[must_use]
    pub fn from_registry(
        registry: Arc<ConnectionRegistry>,
        address: impl Into<String>,
        config: DialConfig,
    ) -> Self {
        Self {
            binding: Binding::Registry {
                registry,
                address: address.into(),
                config,
            },
        }
    }

    /// Destination address.
    #[must_use]
    pub fn address(&self) -> &str {
        self.binding.address()
    }
}

impl AccountService for AccountServiceClient {
    fn create_account<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: CreateAccountRequest,
    ) -> BoxFuture<'a, GatewayResult<CreateAccountResponse>> {
        Box::pin(self.binding.unary(ctx, CREATE_ACCOUNT, request))
    }

    fn get_account<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: GetAccountRequest,
    ) -> BoxFuture<'a, GatewayResult<GetAccountResponse>> {
        Box::pin(self.binding.unary(ctx, GET_ACCOUNT, request))
    }
}

impl std::fmt::Debug for AccountServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountServiceClient")
            .field("address", &self.address())
            .finish()
    }
}
