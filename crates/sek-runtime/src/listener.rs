//! Supervised transaction listener.
//!
//! Renewals, refunds, out-of-app purchases, and deferred-purchase
//! resolutions arrive here. The task runs for the process lifetime, skips
//! individual unverifiable events, and is joined at shutdown — a cancellation
//! between verify and acknowledge is safe because acknowledge is idempotent
//! and the ledger redelivers un-acknowledged transactions.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::manager::EntitlementManager;

/// Handle to the running listener task.
pub struct ListenerHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ListenerHandle {
    /// Signal shutdown and wait for the task to drain.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }

    /// `true` once the task has exited (stream ended or shutdown signaled).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Start the listener over the manager's ledger update stream.
pub fn spawn_transaction_listener(manager: Arc<EntitlementManager>) -> ListenerHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let mut updates = manager.ledger().transaction_updates();

    let handle = tokio::spawn(async move {
        info!("transaction listener started");
        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                event = updates.next() => {
                    match event {
                        // verify → apply → acknowledge is one unit per event;
                        // failures are contained inside handle_ledger_event.
                        Some(envelope) => manager.handle_ledger_event(&envelope).await,
                        None => {
                            debug!("transaction update stream ended");
                            break;
                        }
                    }
                }
            }
        }
        info!("transaction listener stopped");
    });

    ListenerHandle {
        shutdown_tx,
        handle,
    }
}
