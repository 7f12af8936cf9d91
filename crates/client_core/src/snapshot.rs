use std::sync::Arc;

use shared::domain::GameState;
use tokio::sync::watch;

/// Creates the single-writer snapshot slot shared by one session.
pub fn snapshot_channel() -> (SnapshotWriter, SnapshotReader) {
    let (tx, rx) = watch::channel(None);
    (SnapshotWriter { tx }, SnapshotReader { rx })
}

/// Write side of the latest snapshot. Not `Clone`: whoever holds it is the
/// only component allowed to replace the snapshot.
#[derive(Debug)]
pub struct SnapshotWriter {
    tx: watch::Sender<Option<Arc<GameState>>>,
}

impl SnapshotWriter {
    pub fn publish(&self, state: Arc<GameState>) {
        self.tx.send_replace(Some(state));
    }

    pub fn has_snapshot(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            rx: self.tx.subscribe(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotReader {
    rx: watch::Receiver<Option<Arc<GameState>>>,
}

impl SnapshotReader {
    /// Most recently observed state, `None` before the first decoded snapshot.
    pub fn latest(&self) -> Option<Arc<GameState>> {
        self.rx.borrow().clone()
    }

    /// Waits for a snapshot newer than the last one seen through this reader
    /// and returns it. `None` once the writer is gone.
    pub async fn next(&mut self) -> Option<Arc<GameState>> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(state) = self.rx.borrow_and_update().clone() {
                return Some(state);
            }
        }
    }

    /// Resolves with the current snapshot, waiting for the first one if
    /// nothing has been observed yet.
    pub async fn wait_for_first(&mut self) -> Option<Arc<GameState>> {
        if let Some(state) = self.rx.borrow_and_update().clone() {
            return Some(state);
        }
        self.next().await
    }
}
