//! Defaults a locally signed transaction needs before signing

use crate::chain::NodeClient;
use crate::error::DeployResult;

use ethers::types::transaction::eip2718::TypedTransaction;
use tracing::debug;

/// Fill gas limit, gas price and chain id of `tx` where they are missing
///
/// The node fills these itself for `eth_sendTransaction`; a raw transaction
/// has to carry them in its signature.
pub async fn fill_transaction_defaults(
    client: &dyn NodeClient,
    tx: &mut TypedTransaction,
    chain_id: u64,
) -> DeployResult<()> {
    if tx.chain_id().is_none() {
        tx.set_chain_id(chain_id);
    }

    if tx.gas_price().is_none() {
        let gas_price = client.gas_price().await?;
        debug!("Using node gas price {}", gas_price);
        tx.set_gas_price(gas_price);
    }

    if tx.gas().is_none() {
        let gas = client.estimate_gas(tx.clone()).await?;
        debug!("Estimated gas {}", gas);
        tx.set_gas(gas);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockNodeClient;
    use ethers::types::{TransactionRequest, U256, U64};

    #[tokio::test]
    async fn test_fills_missing_fields() {
        let mut client = MockNodeClient::new();
        client
            .expect_gas_price()
            .times(1)
            .returning(|| Ok(U256::from(1_000_000_000u64)));
        client
            .expect_estimate_gas()
            .times(1)
            .returning(|_| Ok(U256::from(53_000)));

        let mut tx = TypedTransaction::Legacy(TransactionRequest::new());
        fill_transaction_defaults(&client, &mut tx, 1337).await.unwrap();

        assert_eq!(tx.chain_id(), Some(U64::from(1337)));
        assert_eq!(tx.gas_price(), Some(U256::from(1_000_000_000u64)));
        assert_eq!(tx.gas(), Some(&U256::from(53_000)));
    }

    #[tokio::test]
    async fn test_keeps_given_fields() {
        let client = MockNodeClient::new();
        let mut tx = TypedTransaction::Legacy(
            TransactionRequest::new()
                .gas(199_999)
                .gas_price(99)
                .chain_id(5u64),
        );
        fill_transaction_defaults(&client, &mut tx, 1337).await.unwrap();

        assert_eq!(tx.chain_id(), Some(U64::from(5)));
        assert_eq!(tx.gas_price(), Some(U256::from(99)));
        assert_eq!(tx.gas(), Some(&U256::from(199_999)));
    }
}
