//! Account balance watcher.
//!
//! Follows `System.Account` of the selected account through the API of the
//! active session. The published balance is cleared whenever the account or
//! the session changes, and at most one storage subscription is open.

use crate::backend::AccountDataStream;
use crate::error::ChainError;
use crate::session::{ActiveHandles, SessionHandle};
use chrono::Utc;
use futures::future::{self, BoxFuture};
use futures::{FutureExt, StreamExt};
use memo_core::{AccountBalance, AccountData, BlockTag, SelectedAccount};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Publishes the balance of the selected account. Dropping it unsubscribes.
pub struct AccountBalanceWatcher {
    balance: watch::Receiver<Option<AccountBalance>>,
    task: JoinHandle<()>,
    shutdown: DropGuard,
}

impl AccountBalanceWatcher {
    pub fn spawn(session: &SessionHandle, account: watch::Receiver<Option<SelectedAccount>>) -> Self {
        let (balance_tx, balance_rx) = watch::channel(None);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(watch_balance(
            session.subscribe_handles(),
            account,
            balance_tx,
            shutdown.clone(),
        ));

        Self {
            balance: balance_rx,
            task,
            shutdown: shutdown.drop_guard(),
        }
    }

    pub fn balance(&self) -> Option<AccountBalance> {
        *self.balance.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<AccountBalance>> {
        self.balance.clone()
    }

    pub async fn shutdown(self) {
        let AccountBalanceWatcher { task, shutdown, .. } = self;
        shutdown.disarm().cancel();
        if let Err(e) = task.await {
            tracing::warn!("Account balance watcher failed: {}", e);
        }
    }
}

/// Storage subscription being opened for one account.
type Opening = BoxFuture<'static, Option<AccountDataStream>>;

async fn watch_balance(
    mut handles_rx: watch::Receiver<Option<ActiveHandles>>,
    mut account_rx: watch::Receiver<Option<SelectedAccount>>,
    balance_tx: watch::Sender<Option<AccountBalance>>,
    shutdown: CancellationToken,
) {
    loop {
        let handles = handles_rx.borrow_and_update().clone();
        let account = account_rx.borrow_and_update().clone();

        // Previous subscription goes before the new one starts
        balance_tx.send_if_modified(|balance| balance.take().is_some());
        let mut opening: Option<Opening> = handles
            .zip(account)
            .map(|(handles, account)| subscribe(handles, account).boxed());
        let mut values: Option<AccountDataStream> = None;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return,
                changed = handles_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    break;
                }
                changed = account_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    break;
                }
                opened = poll_opening(&mut opening) => {
                    opening = None;
                    values = opened;
                }
                item = next_value(&mut values) => match item {
                    Some(Ok(data)) => {
                        balance_tx.send_replace(Some(AccountBalance::new(data, Utc::now())));
                    }
                    Some(Err(e)) => {
                        tracing::warn!("Balance subscription failed: {}", e);
                        values = None;
                    }
                    None => values = None,
                }
            }
        }
    }
}

async fn subscribe(handles: ActiveHandles, account: SelectedAccount) -> Option<AccountDataStream> {
    match handles
        .api
        .query()
        .system_account(&account.address, BlockTag::Best)
        .await
    {
        Ok(values) => {
            tracing::debug!(
                "Watching balance of {} on {} (session {})",
                account.address,
                handles.chain.name,
                handles.session
            );
            Some(values)
        }
        Err(e) => {
            tracing::warn!(
                "Failed to watch balance of {} on {}: {}",
                account.address,
                handles.chain.name,
                e
            );
            None
        }
    }
}

async fn poll_opening(opening: &mut Option<Opening>) -> Option<AccountDataStream> {
    match opening {
        Some(subscribe) => subscribe.await,
        None => future::pending().await,
    }
}

async fn next_value(
    values: &mut Option<AccountDataStream>,
) -> Option<Result<AccountData, ChainError>> {
    match values {
        Some(stream) => stream.next().await,
        None => future::pending().await,
    }
}
