//! Commit notification and network submission

use super::delegation::SignedTx;
use crate::chain::ThorProvider;
use crate::error::DriverResult;

use ethers::types::{Address, Bytes, H256};
use serde::Serialize;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{info, warn};

/// Notified once per transaction, right before it is submitted
pub type CommitObserver = Arc<dyn Fn(TxObject) + Send + Sync>;

/// Handle passed to the commit observer
#[derive(Clone)]
pub struct TxObject {
    pub id: H256,
    pub raw: Bytes,
    provider: ThorProvider,
}

impl TxObject {
    pub fn new(id: H256, raw: Bytes, provider: ThorProvider) -> Self {
        Self { id, raw, provider }
    }

    /// Submit the same raw bytes again
    pub async fn resend(&self) -> DriverResult<H256> {
        let txid = self.provider.send_raw(&self.raw).await?;
        crate::metrics::record_tx_resent();
        info!("Resent transaction {:?}", self.id);
        Ok(txid)
    }
}

impl fmt::Debug for TxObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxObject")
            .field("id", &self.id)
            .field("raw_len", &self.raw.len())
            .finish()
    }
}

/// Result returned to the caller of a sign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TxResponse {
    pub txid: H256,
    pub signer: Address,
}

/// Invoke the observer, swallowing panics
pub fn notify(observer: &CommitObserver, tx: TxObject) {
    let id = tx.id;
    if panic::catch_unwind(AssertUnwindSafe(|| observer(tx))).is_err() {
        warn!("Commit observer panicked for transaction {:?}", id);
    }
}

/// Notify the observer, then submit `signed`
pub async fn submit(
    provider: &ThorProvider,
    observer: Option<CommitObserver>,
    signed: SignedTx,
    signer: Address,
) -> DriverResult<TxResponse> {
    if let Some(observer) = observer {
        notify(
            &observer,
            TxObject::new(signed.id, signed.raw.clone(), provider.clone()),
        );
    }

    let node_id = provider.send_raw(&signed.raw).await?;
    if node_id != signed.id {
        warn!(
            "Node reported id {:?} for transaction {:?}",
            node_id, signed.id
        );
    }
    crate::metrics::record_tx_submitted(signed.path.as_str());
    info!(
        "Submitted transaction {:?} from {:?} ({} path)",
        signed.id, signer, signed.path
    );

    Ok(TxResponse {
        txid: signed.id,
        signer,
    })
}
