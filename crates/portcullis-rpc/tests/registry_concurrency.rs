//! Concurrency and lifecycle tests for the connection registry.

use std::sync::Arc;
use std::time::Duration;

use portcullis_core::{translate, GatewayError, RequestContext};
use portcullis_rpc::proto::account::GetAccountRequest;
use portcullis_rpc::{
    AccountService, AccountServiceClient, ConnectionRegistry, ConnectivityState, DialConfig,
    MemoryDialer, RegistryError,
};

fn registry_with(dialer: MemoryDialer) -> (Arc<MemoryDialer>, Arc<ConnectionRegistry>) {
    let dialer = Arc::new(dialer);
    let registry = Arc::new(ConnectionRegistry::new(dialer.clone()));
    (dialer, registry)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_calls_store_one_entry() {
    let (_, registry) = registry_with(MemoryDialer::new().with_delay(Duration::from_millis(10)));

    let mut handles = Vec::new();
    for _ in 0..32 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            registry
                .get_or_create("svc:443", &DialConfig::new())
                .await
                .expect("dial should succeed")
        }));
    }

    let mut connections = Vec::new();
    for handle in handles {
        connections.push(handle.await.expect("task should not panic"));
    }

    assert_eq!(registry.len(), 1);
    let stored = registry.get("svc:443").expect("entry should exist");
    for conn in &connections {
        assert!(Arc::ptr_eq(conn, &stored), "every caller gets the stored entry");
    }
    assert!(!stored.is_shutdown());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_callers_with_slow_dialer_do_not_deadlock() {
    let (_, registry) = registry_with(MemoryDialer::new().with_delay(Duration::from_millis(50)));
    let config = DialConfig::new();

    let first = registry.get_or_create("svc:443", &config);
    let second = registry.get_or_create("svc:443", &config);
    let (first, second) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(first, second)
    })
    .await
    .expect("both callers must complete");

    let first = first.expect("first dial");
    let second = second.expect("second dial");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn shut_down_entry_is_replaced() {
    let (dialer, registry) = registry_with(MemoryDialer::new());
    let config = DialConfig::new();

    let old = registry.get_or_create("svc:443", &config).await.expect("dial");
    old.close();
    assert_eq!(old.state(), ConnectivityState::Shutdown);

    let new = registry.get_or_create("svc:443", &config).await.expect("redial");
    assert!(!Arc::ptr_eq(&old, &new));
    assert!(!new.is_shutdown());
    assert_eq!(registry.len(), 1);
    assert_eq!(dialer.dial_count(), 2);

    let stored = registry.get("svc:443").expect("entry should exist");
    assert!(Arc::ptr_eq(&stored, &new));
}

#[tokio::test]
async fn close_is_idempotent() {
    let (_, registry) = registry_with(MemoryDialer::new());

    registry.close("never-created:1");
    assert!(registry.is_empty());

    let conn = registry
        .get_or_create("svc:443", &DialConfig::new())
        .await
        .expect("dial");
    registry.close("svc:443");
    registry.close("svc:443");

    assert!(!registry.contains("svc:443"));
    assert!(conn.is_shutdown());
}

#[tokio::test]
async fn failed_dial_leaves_no_entry_and_is_not_retried() {
    let (dialer, registry) = registry_with(MemoryDialer::new());
    dialer.set_failing(true);

    let err = registry
        .get_or_create("svc:443", &DialConfig::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Connection { .. }));
    assert_eq!(dialer.dial_count(), 1);
    assert!(registry.is_empty());

    dialer.set_failing(false);
    registry
        .get_or_create("svc:443", &DialConfig::new())
        .await
        .expect("caller retry should succeed");
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn registry_bound_client_redials_after_close() {
    let (dialer, registry) = registry_with(MemoryDialer::new());
    let config = DialConfig::new();
    let first = registry.get_or_create("svc:443", &config).await.expect("dial");

    let client = AccountServiceClient::from_registry(Arc::clone(&registry), "svc:443", config);
    first.close();

    // No listener is attached, so the call itself fails, but only after the
    // registry has replaced the closed connection.
    let ctx = RequestContext::new().with_timeout(Duration::from_secs(2));
    let result = client
        .get_account(
            &ctx,
            GetAccountRequest {
                account_id: "acc-1".to_string(),
            },
        )
        .await;

    let err = result.unwrap_err();
    assert_eq!(translate(&err).status.as_u16(), 502);
    assert_eq!(dialer.dial_count(), 2);
}

#[tokio::test]
async fn expired_deadline_fails_before_calling() {
    let (_, registry) = registry_with(MemoryDialer::new());
    let conn = registry
        .get_or_create("svc:443", &DialConfig::new())
        .await
        .expect("dial");
    let client = AccountServiceClient::new(conn);

    let mut ctx = RequestContext::new();
    ctx.set_deadline(std::time::Instant::now());

    let err = client
        .get_account(
            &ctx,
            GetAccountRequest {
                account_id: "acc-1".to_string(),
            },
        )
        .await
        .unwrap_err();

    match err {
        GatewayError::Rpc(status) => assert_eq!(status.code(), tonic::Code::DeadlineExceeded),
        other => panic!("expected RPC error, got {other:?}"),
    }
}
