//! Status observer and balance watcher following the active session.

mod common;

use chrono::Utc;
use common::{ALICE, BOB, MockBackend, TIMEOUT, chain, eventually, init_tracing, wait_until};
use memo_chain::{
    AccountBalanceWatcher, ChainConfig, ChainStatusObserver, SessionManager, SessionStatus,
};
use memo_core::{AccountData, ChainKey, ConnectionStatus, SelectedAccount};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::watch;

async fn connected_manager(key: ChainKey) -> (SessionManager, MockBackend) {
    init_tracing();
    let backend = MockBackend::default();
    let manager = SessionManager::spawn(backend.clone());
    let mut status = manager.subscribe_status();
    manager.activate_chain(chain(key)).unwrap();
    wait_until(&mut status, SessionStatus::is_connected).await;
    (manager, backend)
}

fn selected(address: &str) -> Option<SelectedAccount> {
    Some(SelectedAccount {
        wallet: "talisman".into(),
        address: address.into(),
        name: None,
    })
}

#[tokio::test]
async fn connected_only_after_first_finalized_block() {
    let (manager, backend) = connected_manager(ChainKey::Kusama).await;
    let observer = ChainStatusObserver::spawn(&manager.handle());
    let mut indicator = observer.subscribe();

    let client = backend.state.client(1);
    eventually("block subscription", || client.open_block_subscriptions() == 1).await;
    let waiting = observer.indicator();
    assert_eq!(waiting.status, ConnectionStatus::Connecting);
    assert_eq!(waiting.to_string(), "connecting to Kusama via lightclient");

    client.push_block(42);
    let shown = wait_until(&mut indicator, |i| i.block_number == Some(42)).await;
    assert_eq!(shown.status, ConnectionStatus::Connected);
    assert_eq!(shown.to_string(), "connected to Kusama via lightclient #42");

    client.push_block(43);
    wait_until(&mut indicator, |i| i.block_number == Some(43)).await;
}

#[tokio::test]
async fn observer_follows_new_session() {
    let (manager, backend) = connected_manager(ChainKey::Kusama).await;
    let observer = ChainStatusObserver::spawn(&manager.handle());
    let mut indicator = observer.subscribe();

    let old = backend.state.client(1);
    eventually("block subscription", || old.open_block_subscriptions() == 1).await;
    old.push_block(10);
    wait_until(&mut indicator, |i| i.status == ConnectionStatus::Connected).await;

    manager.activate_chain(chain(ChainKey::Polkadot)).unwrap();
    let switched = wait_until(&mut indicator, |i| i.chain == Some(ChainKey::Polkadot)).await;
    assert_ne!(switched.status, ConnectionStatus::Connected);
    assert_eq!(switched.block_number, None);

    eventually("old subscription closed", || old.open_block_subscriptions() == 0).await;
    let new = backend.state.client(2);
    eventually("new subscription", || new.open_block_subscriptions() == 1).await;

    // A late block from the old client must not leak into the new session
    old.push_block(11);
    new.push_block(500);
    let shown = wait_until(&mut indicator, |i| i.status == ConnectionStatus::Connected).await;
    assert_eq!(shown.block_number, Some(500));
    assert_eq!(shown.chain, Some(ChainKey::Polkadot));
}

#[tokio::test]
async fn observer_shows_failure_cause() {
    init_tracing();
    let manager = SessionManager::spawn(MockBackend::default());
    let observer = ChainStatusObserver::spawn(&manager.handle());
    let mut indicator = observer.subscribe();

    manager
        .activate_chain(Arc::new(ChainConfig::new(ChainKey::Kusama, None, None)))
        .unwrap();
    let shown = wait_until(&mut indicator, |i| i.status == ConnectionStatus::Error).await;
    assert_eq!(
        shown.to_string(),
        "error: Invalid chain spec for Kusama: chain spec is missing"
    );
}

#[tokio::test]
async fn block_stream_failure_keeps_session() {
    let (manager, backend) = connected_manager(ChainKey::Kusama).await;
    let observer = ChainStatusObserver::spawn(&manager.handle());
    let mut indicator = observer.subscribe();

    let client = backend.state.client(1);
    eventually("block subscription", || client.open_block_subscriptions() == 1).await;
    client.push_block(5);
    wait_until(&mut indicator, |i| i.block_number == Some(5)).await;

    client.fail_blocks("peer went away");
    eventually("subscription dropped", || client.open_block_subscriptions() == 0).await;
    assert!(manager.status().is_connected());
    assert_eq!(backend.state.live_workers(), 1);
    assert_eq!(observer.indicator().status, ConnectionStatus::Connected);

    observer.shutdown().await;
}

#[tokio::test]
async fn balance_published_then_cleared_on_deselect() {
    let (manager, backend) = connected_manager(ChainKey::KusamaAssetHub).await;
    let (account_tx, account_rx) = watch::channel(None);
    let watcher = AccountBalanceWatcher::spawn(&manager.handle(), account_rx);
    let mut balance = watcher.subscribe();
    let client = backend.state.client(1);

    account_tx.send_replace(selected(ALICE));
    eventually("account subscription", || {
        client.open_account_subscriptions(ALICE) == 1
    })
    .await;

    let before = Utc::now();
    client.push_account(
        ALICE,
        AccountData {
            free: 12_500_000_000_000,
            reserved: 1,
            frozen: 2_000_000_000_000,
            flags: 1 << 127,
        },
    );
    let shown = wait_until(&mut balance, Option::is_some).await.unwrap();
    assert_eq!(shown.free, 12_500_000_000_000);
    assert_eq!(shown.reserved, 1);
    assert_eq!(shown.transferable(), 10_500_000_000_000);
    assert_eq!(shown.flags, 1 << 127);
    assert!(shown.last_updated >= before && shown.last_updated <= Utc::now());

    account_tx.send_replace(None);
    wait_until(&mut balance, Option::is_none).await;
    eventually("subscription closed", || {
        client.total_account_subscriptions() == 0
    })
    .await;
    assert!(watcher.balance().is_none());
}

#[tokio::test]
async fn balance_follows_account_changes() {
    let (manager, backend) = connected_manager(ChainKey::Kusama).await;
    let (account_tx, account_rx) = watch::channel(selected(ALICE));
    let watcher = AccountBalanceWatcher::spawn(&manager.handle(), account_rx);
    let mut balance = watcher.subscribe();
    let client = backend.state.client(1);

    eventually("alice subscription", || {
        client.open_account_subscriptions(ALICE) == 1
    })
    .await;
    client.push_account(
        ALICE,
        AccountData {
            free: 1,
            ..Default::default()
        },
    );
    wait_until(&mut balance, Option::is_some).await;

    account_tx.send_replace(selected(BOB));
    wait_until(&mut balance, Option::is_none).await;
    eventually("only bob is watched", || {
        client.open_account_subscriptions(ALICE) == 0
            && client.open_account_subscriptions(BOB) == 1
    })
    .await;

    // A stale value for the old account is not published
    client.push_account(
        ALICE,
        AccountData {
            free: 99,
            ..Default::default()
        },
    );
    client.push_account(
        BOB,
        AccountData {
            free: 2,
            ..Default::default()
        },
    );
    let shown = wait_until(&mut balance, Option::is_some).await.unwrap();
    assert_eq!(shown.free, 2);
}

#[tokio::test]
async fn balance_cleared_when_session_changes() {
    let (manager, backend) = connected_manager(ChainKey::Kusama).await;
    let (_account_tx, account_rx) = watch::channel(selected(ALICE));
    let watcher = AccountBalanceWatcher::spawn(&manager.handle(), account_rx);
    let mut balance = watcher.subscribe();

    let old = backend.state.client(1);
    eventually("subscription", || old.open_account_subscriptions(ALICE) == 1).await;
    old.push_account(
        ALICE,
        AccountData {
            free: 5,
            ..Default::default()
        },
    );
    wait_until(&mut balance, Option::is_some).await;

    manager.activate_chain(chain(ChainKey::Polkadot)).unwrap();
    wait_until(&mut balance, Option::is_none).await;

    backend.state.wait_for_call(common::Call::Spawn { worker: 2 }).await;
    eventually("new client", || {
        backend.state.live_workers() == 1
            && manager.active_handles().is_some_and(|h| h.chain.key == ChainKey::Polkadot)
    })
    .await;
    let new = backend.state.client(2);
    eventually("resubscribed", || new.open_account_subscriptions(ALICE) == 1).await;
    assert_eq!(old.total_account_subscriptions(), 0);

    new.push_account(
        ALICE,
        AccountData {
            free: 6,
            ..Default::default()
        },
    );
    let shown = wait_until(&mut balance, Option::is_some).await.unwrap();
    assert_eq!(shown.free, 6);

    watcher.shutdown().await;
    eventually("watcher unsubscribed", || new.total_account_subscriptions() == 0).await;
}

#[tokio::test]
async fn observer_stops_while_block_subscription_is_opening() {
    let (manager, backend) = connected_manager(ChainKey::Kusama).await;
    backend.state.stall_subscriptions.store(true, Ordering::SeqCst);
    let observer = ChainStatusObserver::spawn(&manager.handle());

    let client = backend.state.client(1);
    eventually("stalled subscription", || client.stalled_subscriptions() == 1).await;

    tokio::time::timeout(TIMEOUT, observer.shutdown())
        .await
        .expect("observer shut down while subscribing");
}

#[tokio::test]
async fn observer_reports_failure_while_block_subscription_is_opening() {
    let (manager, backend) = connected_manager(ChainKey::Kusama).await;
    backend.state.stall_subscriptions.store(true, Ordering::SeqCst);
    let observer = ChainStatusObserver::spawn(&manager.handle());
    let mut indicator = observer.subscribe();

    let client = backend.state.client(1);
    eventually("stalled subscription", || client.stalled_subscriptions() == 1).await;

    manager
        .activate_chain(Arc::new(ChainConfig::new(ChainKey::Polkadot, None, None)))
        .unwrap();
    let shown = wait_until(&mut indicator, |i| i.status == ConnectionStatus::Error).await;
    assert_eq!(shown.chain, Some(ChainKey::Polkadot));
    assert_eq!(
        shown.to_string(),
        "error: Invalid chain spec for Polkadot: chain spec is missing"
    );

    observer.shutdown().await;
}

#[tokio::test]
async fn balance_watcher_follows_changes_while_subscription_is_opening() {
    let (manager, backend) = connected_manager(ChainKey::Kusama).await;
    backend.state.stall_subscriptions.store(true, Ordering::SeqCst);
    let (account_tx, account_rx) = watch::channel(selected(ALICE));
    let watcher = AccountBalanceWatcher::spawn(&manager.handle(), account_rx);
    let mut balance = watcher.subscribe();

    let client = backend.state.client(1);
    eventually("stalled subscription", || client.stalled_subscriptions() == 1).await;

    // Deselecting abandons the subscription still being opened
    account_tx.send_replace(None);
    backend.state.stall_subscriptions.store(false, Ordering::SeqCst);
    account_tx.send_replace(selected(BOB));
    eventually("bob is watched", || client.open_account_subscriptions(BOB) == 1).await;
    assert_eq!(client.open_account_subscriptions(ALICE), 0);

    client.push_account(
        BOB,
        AccountData {
            free: 3,
            ..Default::default()
        },
    );
    let shown = wait_until(&mut balance, Option::is_some).await.unwrap();
    assert_eq!(shown.free, 3);

    watcher.shutdown().await;
}

#[tokio::test]
async fn balance_watcher_stops_while_subscription_is_opening() {
    let (manager, backend) = connected_manager(ChainKey::Kusama).await;
    backend.state.stall_subscriptions.store(true, Ordering::SeqCst);
    let (_account_tx, account_rx) = watch::channel(selected(ALICE));
    let watcher = AccountBalanceWatcher::spawn(&manager.handle(), account_rx);

    let client = backend.state.client(1);
    eventually("stalled subscription", || client.stalled_subscriptions() == 1).await;

    tokio::time::timeout(TIMEOUT, watcher.shutdown())
        .await
        .expect("watcher shut down while subscribing");
}
