//! HTTP JSON-RPC node client

use super::NodeClient;
use crate::error::{DeployError, DeployResult};

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Node client over a single HTTP endpoint
///
/// Every request is bounded by `request_timeout`; nothing is retried.
pub struct EthNode {
    provider: Provider<Http>,
    url: String,
    request_timeout: Duration,
}

impl EthNode {
    /// Create a client for the node at `url`
    pub fn connect(url: &str, request_timeout: Duration) -> DeployResult<Self> {
        let provider = Provider::<Http>::try_from(url)
            .map_err(|e| DeployError::Config(format!("Invalid JSON-RPC url {}: {}", url, e)))?;
        debug!("Using JSON-RPC endpoint {}", url);

        Ok(Self {
            provider,
            url: url.to_string(),
            request_timeout,
        })
    }

    /// Get the endpoint url
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request<T, F>(&self, operation: &str, fut: F) -> DeployResult<T>
    where
        F: Future<Output = Result<T, ProviderError>> + Send,
    {
        match timeout(self.request_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(DeployError::Rpc(format!("{} failed: {}", operation, e))),
            Err(_) => Err(DeployError::Timeout {
                operation: operation.to_string(),
            }),
        }
    }
}

#[async_trait]
impl NodeClient for EthNode {
    async fn chain_id(&self) -> DeployResult<u64> {
        let chain_id = self
            .request("eth_chainId", self.provider.get_chainid())
            .await?;
        Ok(chain_id.as_u64())
    }

    async fn accounts(&self) -> DeployResult<Vec<Address>> {
        self.request("eth_accounts", self.provider.get_accounts())
            .await
    }

    async fn pending_transaction_count(&self, address: Address) -> DeployResult<U256> {
        self.request(
            "eth_getTransactionCount",
            self.provider
                .get_transaction_count(address, Some(BlockNumber::Pending.into())),
        )
        .await
    }

    async fn estimate_gas(&self, tx: TypedTransaction) -> DeployResult<U256> {
        self.request("eth_estimateGas", self.provider.estimate_gas(&tx, None))
            .await
    }

    async fn gas_price(&self) -> DeployResult<U256> {
        self.request("eth_gasPrice", self.provider.get_gas_price())
            .await
    }

    async fn send_transaction(&self, tx: TypedTransaction) -> DeployResult<H256> {
        let pending = self
            .request(
                "eth_sendTransaction",
                self.provider.send_transaction(tx, None),
            )
            .await?;
        Ok(pending.tx_hash())
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> DeployResult<H256> {
        let pending = self
            .request(
                "eth_sendRawTransaction",
                self.provider.send_raw_transaction(raw),
            )
            .await?;
        Ok(pending.tx_hash())
    }

    async fn transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> DeployResult<Option<TransactionReceipt>> {
        self.request(
            "eth_getTransactionReceipt",
            self.provider.get_transaction_receipt(tx_hash),
        )
        .await
    }

    async fn call(&self, tx: TypedTransaction) -> DeployResult<Bytes> {
        self.request("eth_call", self.provider.call(&tx, None))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_rejects_invalid_url() {
        let result = EthNode::connect("not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(DeployError::Config(_))));
    }

    #[test]
    fn test_connect_keeps_url() {
        let node = EthNode::connect("http://127.0.0.1:8545", Duration::from_secs(1)).unwrap();
        assert_eq!(node.url(), "http://127.0.0.1:8545");
    }

    #[tokio::test]
    async fn test_unreachable_node_is_rpc_error() {
        // Port 9 (discard) is not expected to speak JSON-RPC
        let node = EthNode::connect("http://127.0.0.1:9", Duration::from_secs(5)).unwrap();
        let err = node.chain_id().await.unwrap_err();
        assert!(matches!(
            err,
            DeployError::Rpc(_) | DeployError::Timeout { .. }
        ));
    }
}
