//! Chain module - the node the toolkit talks to
//!
//! All node access goes through the [`NodeClient`] trait so that the
//! transaction layer can run against a real JSON-RPC endpoint or against an
//! injected test double.

pub mod provider;

pub use provider::EthNode;

use crate::error::DeployResult;

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};

/// The JSON-RPC calls needed to build, submit and confirm transactions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// `eth_chainId`
    async fn chain_id(&self) -> DeployResult<u64>;

    /// `eth_accounts`, the accounts managed by the node
    async fn accounts(&self) -> DeployResult<Vec<Address>>;

    /// `eth_getTransactionCount` against the pending block
    async fn pending_transaction_count(&self, address: Address) -> DeployResult<U256>;

    /// `eth_estimateGas`
    async fn estimate_gas(&self, tx: TypedTransaction) -> DeployResult<U256>;

    /// `eth_gasPrice`
    async fn gas_price(&self) -> DeployResult<U256>;

    /// `eth_sendTransaction`, signed by the node
    async fn send_transaction(&self, tx: TypedTransaction) -> DeployResult<H256>;

    /// `eth_sendRawTransaction` for a locally signed transaction
    async fn send_raw_transaction(&self, raw: Bytes) -> DeployResult<H256>;

    /// `eth_getTransactionReceipt`, `None` while the transaction is pending
    async fn transaction_receipt(&self, tx_hash: H256)
        -> DeployResult<Option<TransactionReceipt>>;

    /// `eth_call` against the latest block
    async fn call(&self, tx: TypedTransaction) -> DeployResult<Bytes>;
}
