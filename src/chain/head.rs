//! Latest known chain head, with optional HTTP polling

use super::{BlockHeader, ThorProvider};

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Shared holder of the latest known head
#[derive(Debug)]
pub struct HeadState {
    head: RwLock<BlockHeader>,
}

impl HeadState {
    pub fn new(initial: BlockHeader) -> Self {
        Self {
            head: RwLock::new(initial),
        }
    }

    /// Snapshot of the current head
    pub fn current(&self) -> BlockHeader {
        self.head
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the head; returns true when it changed
    pub fn update(&self, head: BlockHeader) -> bool {
        let mut current = self.head.write().unwrap_or_else(PoisonError::into_inner);
        if current.id == head.id {
            return false;
        }
        debug!("Head advanced to {} ({:?})", head.number, head.id);
        *current = head;
        true
    }
}

/// Poll `blocks/best` every `interval`, feeding `state`. Failures are logged and retried
/// on the next tick.
pub fn spawn_tracker(
    provider: ThorProvider,
    state: Arc<HeadState>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            match provider.get_block("best").await {
                Ok(best) => {
                    state.update(best);
                }
                Err(e) => {
                    warn!("Failed to poll best block: {}", e);
                }
            }
        }
    })
}
