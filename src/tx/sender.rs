//! Transaction sender for node-managed and locally held accounts
//!
//! With a local wallet the transaction is completed, signed here and sent as
//! a raw transaction. Without one, the node signs it with its default account.

use super::gas::fill_transaction_defaults;
use super::nonce::fill_nonce;
use super::options::{ContractCall, TransactionOptions};
use super::receipt::ReceiptWaiter;
use crate::chain::NodeClient;
use crate::error::{DeployError, DeployResult};

use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, TransactionReceipt, H256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Sends transactions and optionally waits for their successful inclusion
pub struct TransactionSender {
    /// Node connection
    client: Arc<dyn NodeClient>,
    /// Receipt waiter sharing the node connection
    waiter: ReceiptWaiter,
    /// Sender for node-signed transactions, the node's first account if unset
    default_account: Option<Address>,
    /// Maximum time to wait for a receipt
    receipt_timeout: Duration,
}

impl TransactionSender {
    /// Create a new transaction sender
    pub fn new(client: Arc<dyn NodeClient>, poll_interval: Duration) -> Self {
        Self {
            waiter: ReceiptWaiter::new(client.clone(), poll_interval),
            client,
            default_account: None,
            receipt_timeout: super::receipt::DEFAULT_RECEIPT_TIMEOUT,
        }
    }

    pub fn with_default_account(mut self, account: Option<Address>) -> Self {
        self.default_account = account;
        self
    }

    pub fn with_receipt_timeout(mut self, receipt_timeout: Duration) -> Self {
        self.receipt_timeout = receipt_timeout;
        self
    }

    /// Get the node connection
    pub fn client(&self) -> &Arc<dyn NodeClient> {
        &self.client
    }

    /// Send a transaction built from `options` without waiting for it to be mined
    ///
    /// `options` is completed in place with the resolved sender and nonce.
    pub async fn send_transaction(
        &self,
        options: &mut TransactionOptions,
        wallet: Option<&LocalWallet>,
    ) -> DeployResult<H256> {
        let tx_hash = match wallet {
            Some(wallet) => self.send_locally_signed(options, wallet).await?,
            None => self.send_node_signed(options).await?,
        };

        info!("Transaction sent: {:?}", tx_hash);
        Ok(tx_hash)
    }

    /// Send a pending contract call without waiting for it to be mined
    pub async fn send_function_call(
        &self,
        call: &ContractCall,
        options: &mut TransactionOptions,
        wallet: Option<&LocalWallet>,
    ) -> DeployResult<H256> {
        options.apply_call(call);
        self.send_transaction(options, wallet).await
    }

    /// Send a transaction and wait until it was successfully mined
    pub async fn wait_for_successful_transaction(
        &self,
        options: &mut TransactionOptions,
        wallet: Option<&LocalWallet>,
    ) -> DeployResult<TransactionReceipt> {
        let tx_hash = self.send_transaction(options, wallet).await?;
        self.waiter
            .wait_for_successful_transaction_receipt(tx_hash, self.receipt_timeout)
            .await
    }

    /// Send a pending contract call and wait until it was successfully mined
    pub async fn wait_for_successful_function_call(
        &self,
        call: &ContractCall,
        options: &mut TransactionOptions,
        wallet: Option<&LocalWallet>,
    ) -> DeployResult<TransactionReceipt> {
        let tx_hash = self.send_function_call(call, options, wallet).await?;
        self.waiter
            .wait_for_successful_transaction_receipt(tx_hash, self.receipt_timeout)
            .await
    }

    async fn send_locally_signed(
        &self,
        options: &mut TransactionOptions,
        wallet: &LocalWallet,
    ) -> DeployResult<H256> {
        let address = wallet.address();
        match options.from {
            Some(from) if from != address => {
                return Err(DeployError::FromAddressConflict {
                    from: format!("{:?}", from),
                    key_address: format!("{:?}", address),
                });
            }
            _ => options.from = Some(address),
        }

        fill_nonce(self.client.as_ref(), options).await?;

        let chain_id = self.client.chain_id().await?;
        let mut tx = options.to_typed_transaction();
        fill_transaction_defaults(self.client.as_ref(), &mut tx, chain_id).await?;

        let wallet = wallet.clone().with_chain_id(chain_id);
        let signature = wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| DeployError::Keystore(format!("Failed to sign transaction: {}", e)))?;
        let raw = tx.rlp_signed(&signature);

        debug!(
            "Sending raw transaction from {:?} with nonce {:?}",
            address, options.nonce
        );
        self.client.send_raw_transaction(raw).await
    }

    async fn send_node_signed(&self, options: &mut TransactionOptions) -> DeployResult<H256> {
        if options.from.is_none() {
            options.from = Some(self.node_account().await?);
        }

        fill_nonce(self.client.as_ref(), options).await?;

        debug!(
            "Sending transaction from node account {:?} with nonce {:?}",
            options.from, options.nonce
        );
        self.client
            .send_transaction(options.to_typed_transaction())
            .await
    }

    async fn node_account(&self) -> DeployResult<Address> {
        if let Some(account) = self.default_account {
            return Ok(account);
        }
        self.client
            .accounts()
            .await?
            .first()
            .copied()
            .ok_or(DeployError::NoAccount)
    }
}
