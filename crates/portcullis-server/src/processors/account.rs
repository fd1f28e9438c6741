//! Account creation and lookup over the account RPC service.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use portcullis_core::{GatewayError, GatewayResult, IdentityContext, RequestContext};
use portcullis_rpc::proto::account::{Account, CreateAccountRequest, GetAccountRequest};
use portcullis_rpc::AccountService;
use prost_types::Timestamp;

use super::require;
use crate::models::{AccountRequest, AccountResponse, WalletHolding};

/// Timezone sent with every new account and used for returned times.
pub const DEFAULT_TIMEZONE: &str = "UTC";

const SERVER_FAULT_MESSAGE: &str = "something went wrong";

// 0001-01-01T00:00:00Z and 9999-12-31T23:59:59Z.
const MIN_TIMESTAMP_SECONDS: i64 = -62_135_596_800;
const MAX_TIMESTAMP_SECONDS: i64 = 253_402_300_799;

/// Converts a protobuf timestamp, rejecting values outside years 1 to 9999.
///
/// ```rust
/// use portcullis_server::processors::timestamp_to_utc;
/// use prost_types::Timestamp;
///
/// let ts = Timestamp { seconds: 1_700_000_000, nanos: 0 };
/// assert_eq!(timestamp_to_utc(Some(&ts)).unwrap().timestamp(), 1_700_000_000);
///
/// assert!(timestamp_to_utc(None).is_err());
/// assert!(timestamp_to_utc(Some(&Timestamp { seconds: 0, nanos: -1 })).is_err());
/// ```
pub fn timestamp_to_utc(ts: Option<&Timestamp>) -> GatewayResult<DateTime<Utc>> {
    let ts = ts.ok_or_else(|| invalid_timestamp("timestamp missing"))?;

    if !(MIN_TIMESTAMP_SECONDS..=MAX_TIMESTAMP_SECONDS).contains(&ts.seconds) {
        return Err(invalid_timestamp(format!("seconds out of range: {}", ts.seconds)));
    }
    let nanos = u32::try_from(ts.nanos)
        .ok()
        .filter(|n| *n < 1_000_000_000)
        .ok_or_else(|| invalid_timestamp(format!("nanos out of range: {}", ts.nanos)))?;

    DateTime::from_timestamp(ts.seconds, nanos)
        .ok_or_else(|| invalid_timestamp("timestamp not representable"))
}

fn invalid_timestamp(reason: impl Into<String>) -> GatewayError {
    GatewayError::internal_with_source(
        SERVER_FAULT_MESSAGE,
        anyhow::anyhow!("invalid rpc timestamp: {}", reason.into()),
    )
}

/// Creates and finds accounts.
#[derive(Clone)]
pub struct AccountProcessor {
    service: Arc<dyn AccountService>,
}

impl AccountProcessor {
    /// Creates a processor over any [`AccountService`].
    #[must_use]
    pub fn new(service: Arc<dyn AccountService>) -> Self {
        Self { service }
    }

    /// Opens an account for the caller.
    pub async fn create_account(
        &self,
        ctx: &RequestContext,
        caller: &IdentityContext,
        request: &AccountRequest,
    ) -> GatewayResult<AccountResponse> {
        require(&request.account_type, "invalid accountType")?;
        require(&request.currency, "invalid currency")?;

        let response = self
            .service
            .create_account(
                ctx,
                CreateAccountRequest {
                    currency: request.currency.clone(),
                    acct_type: request.account_type.clone(),
                    timezone: DEFAULT_TIMEZONE.to_string(),
                },
            )
            .await?;

        let account = response.account.ok_or_else(|| {
            GatewayError::internal_with_source(
                SERVER_FAULT_MESSAGE,
                anyhow::anyhow!("CreateAccount returned no account"),
            )
        })?;

        tracing::info!(
            trace_id = %ctx.trace_id(),
            caller = %caller.log_id(),
            account_id = %account.account_id,
            "account created"
        );
        to_response(account)
    }

    /// Fetches one account by id.
    pub async fn find_account(
        &self,
        ctx: &RequestContext,
        caller: &IdentityContext,
        account_id: &str,
    ) -> GatewayResult<AccountResponse> {
        require(account_id, "Account not found")?;

        let response = self
            .service
            .get_account(
                ctx,
                GetAccountRequest {
                    account_id: account_id.to_string(),
                },
            )
            .await?;

        let Some(account) = response.account else {
            tracing::debug!(
                trace_id = %ctx.trace_id(),
                caller = %caller.log_id(),
                account_id,
                "GetAccount returned no account"
            );
            return Err(GatewayError::validation_with_status("Account not found", 404));
        };
        to_response(account)
    }
}

impl std::fmt::Debug for AccountProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountProcessor").finish_non_exhaustive()
    }
}

fn to_response(account: Account) -> GatewayResult<AccountResponse> {
    let created_at = timestamp_to_utc(account.creation_time.as_ref())?;
    let modification_time = timestamp_to_utc(account.modification_time.as_ref())?;

    Ok(AccountResponse {
        status: account.status,
        locked: account.locked,
        wallet_holding: WalletHolding {
            balance: 0.0,
            account_id: account.account_id.clone(),
            currency: account.currency,
            modification_time,
        },
        account_id: account.account_id,
        created_at,
        timezone: DEFAULT_TIMEZONE.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use portcullis_core::{translate, BoxFuture};
    use portcullis_rpc::proto::account::{CreateAccountResponse, GetAccountResponse};
    use std::sync::Mutex;

    fn ts(seconds: i64) -> Option<Timestamp> {
        Some(Timestamp { seconds, nanos: 0 })
    }

    fn account(id: &str) -> Account {
        Account {
            account_id: id.to_string(),
            status: "ACTIVE".to_string(),
            locked: false,
            currency: "BTC".to_string(),
            acct_type: "SAVING".to_string(),
            creation_time: ts(1_700_000_000),
            modification_time: ts(1_700_000_500),
            timezone: String::new(),
        }
    }

    #[derive(Default)]
    struct FakeAccounts {
        created: Mutex<Vec<CreateAccountRequest>>,
        account: Option<Account>,
    }

    impl AccountService for FakeAccounts {
        fn create_account<'a>(
            &'a self,
            _ctx: &'a RequestContext,
            request: CreateAccountRequest,
        ) -> BoxFuture<'a, GatewayResult<CreateAccountResponse>> {
            self.created.lock().unwrap().push(request);
            let account = self.account.clone();
            Box::pin(async move { Ok(CreateAccountResponse { account }) })
        }

        fn get_account<'a>(
            &'a self,
            _ctx: &'a RequestContext,
            _request: GetAccountRequest,
        ) -> BoxFuture<'a, GatewayResult<GetAccountResponse>> {
            let account = self.account.clone();
            Box::pin(async move { Ok(GetAccountResponse { account }) })
        }
    }

    fn caller() -> IdentityContext {
        IdentityContext::new("u-1", "fp-1")
    }

    fn request() -> AccountRequest {
        AccountRequest {
            account_type: "SAVING".into(),
            currency: "BTC".into(),
        }
    }

    #[tokio::test]
    async fn test_create_account_sends_utc() {
        let fake = Arc::new(FakeAccounts {
            account: Some(account("acc-1")),
            ..Default::default()
        });
        let processor = AccountProcessor::new(fake.clone());

        let response = processor
            .create_account(&RequestContext::new(), &caller(), &request())
            .await
            .unwrap();

        assert_eq!(response.account_id, "acc-1");
        assert_eq!(response.timezone, "UTC");
        assert_eq!(response.created_at.timestamp(), 1_700_000_000);
        assert_eq!(response.wallet_holding.modification_time.timestamp(), 1_700_000_500);
        assert_eq!(response.wallet_holding.currency, "BTC");

        let sent = fake.created.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].timezone, "UTC");
        assert_eq!(sent[0].acct_type, "SAVING");
    }

    #[tokio::test]
    async fn test_create_account_presence_checks() {
        let processor = AccountProcessor::new(Arc::new(FakeAccounts::default()));
        let mut req = request();
        req.currency.clear();

        let err = processor
            .create_account(&RequestContext::new(), &caller(), &req)
            .await
            .unwrap_err();
        assert_eq!(translate(&err).message, "invalid currency");
    }

    #[tokio::test]
    async fn test_invalid_timestamp_is_server_fault() {
        let mut bad = account("acc-1");
        bad.modification_time = Some(Timestamp {
            seconds: MAX_TIMESTAMP_SECONDS + 1,
            nanos: 0,
        });
        let processor = AccountProcessor::new(Arc::new(FakeAccounts {
            account: Some(bad),
            ..Default::default()
        }));

        let err = processor
            .create_account(&RequestContext::new(), &caller(), &request())
            .await
            .unwrap_err();
        let envelope = translate(&err);
        assert_eq!(envelope.status.as_u16(), 500);
        assert_eq!(envelope.message, "something went wrong");
    }

    #[tokio::test]
    async fn test_find_account_missing() {
        let processor = AccountProcessor::new(Arc::new(FakeAccounts::default()));
        let err = processor
            .find_account(&RequestContext::new(), &caller(), "acc-404")
            .await
            .unwrap_err();
        assert_eq!(translate(&err).status.as_u16(), 404);

        let err = processor
            .find_account(&RequestContext::new(), &caller(), "")
            .await
            .unwrap_err();
        let envelope = translate(&err);
        assert_eq!(envelope.status.as_u16(), 400);
        assert_eq!(envelope.message, "Account not found");
    }

    #[test]
    fn test_timestamp_bounds() {
        assert!(timestamp_to_utc(ts(MIN_TIMESTAMP_SECONDS).as_ref()).is_ok());
        assert!(timestamp_to_utc(ts(MIN_TIMESTAMP_SECONDS - 1).as_ref()).is_err());
        assert!(timestamp_to_utc(Some(&Timestamp {
            seconds: 0,
            nanos: 1_000_000_000
        }))
        .is_err());
    }
}
