//! Waiting for transaction receipts and classifying their status

use crate::chain::NodeClient;
use crate::error::{DeployError, DeployResult};

use ethers::types::{TransactionReceipt, H256, U64};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(180);
pub const DEFAULT_BULK_RECEIPT_TIMEOUT: Duration = Duration::from_secs(300);

/// Polls the node for receipts
pub struct ReceiptWaiter {
    client: Arc<dyn NodeClient>,
    poll_interval: Duration,
}

/// Terminal state of a mined transaction
enum ReceiptStatus {
    Success,
    Reverted,
}

impl ReceiptWaiter {
    pub fn new(client: Arc<dyn NodeClient>, poll_interval: Duration) -> Self {
        Self {
            client,
            poll_interval,
        }
    }

    /// Block until the node has a receipt for `tx_hash` or `max_wait` elapsed
    pub async fn wait_for_receipt(
        &self,
        tx_hash: H256,
        max_wait: Duration,
    ) -> DeployResult<TransactionReceipt> {
        match timeout(max_wait, self.poll_receipt(tx_hash)).await {
            Ok(result) => result,
            Err(_) => Err(DeployError::Timeout {
                operation: format!("receipt of transaction {:?}", tx_hash),
            }),
        }
    }

    async fn poll_receipt(&self, tx_hash: H256) -> DeployResult<TransactionReceipt> {
        loop {
            if let Some(receipt) = self.client.transaction_receipt(tx_hash).await? {
                return Ok(receipt);
            }
            debug!("No receipt yet for {:?}", tx_hash);
            sleep(self.poll_interval).await;
        }
    }

    /// Wait for the receipt of `tx_hash` and make sure the transaction succeeded
    pub async fn wait_for_successful_transaction_receipt(
        &self,
        tx_hash: H256,
        max_wait: Duration,
    ) -> DeployResult<TransactionReceipt> {
        let receipt = self.wait_for_receipt(tx_hash, max_wait).await?;
        match classify(tx_hash, receipt.status)? {
            ReceiptStatus::Success => {
                info!(
                    "Transaction {:?} mined in block {:?}",
                    tx_hash,
                    receipt.block_number.unwrap_or_default()
                );
                Ok(receipt)
            }
            ReceiptStatus::Reverted => {
                warn!("Transaction {:?} failed", tx_hash);
                Err(DeployError::TransactionFailed { tx_hash })
            }
        }
    }

    /// Wait for all `tx_hashes` to be mined, then report every one that failed
    ///
    /// Each hash gets its own `max_wait`. A failed transaction does not stop
    /// the wait for the remaining ones.
    pub async fn wait_for_successful_transaction_receipts<I>(
        &self,
        tx_hashes: I,
        max_wait: Duration,
    ) -> DeployResult<()>
    where
        I: IntoIterator<Item = H256>,
    {
        let mut failed = BTreeSet::new();

        for tx_hash in tx_hashes {
            let receipt = self.wait_for_receipt(tx_hash, max_wait).await?;
            if let ReceiptStatus::Reverted = classify(tx_hash, receipt.status)? {
                warn!("Transaction {:?} failed", tx_hash);
                failed.insert(tx_hash);
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(DeployError::TransactionsFailed { tx_hashes: failed })
        }
    }
}

fn classify(tx_hash: H256, status: Option<U64>) -> DeployResult<ReceiptStatus> {
    match status.map(|s| s.as_u64()) {
        Some(1) => Ok(ReceiptStatus::Success),
        Some(0) => Ok(ReceiptStatus::Reverted),
        _ => Err(DeployError::UnexpectedReceiptStatus { tx_hash, status }),
    }
}
