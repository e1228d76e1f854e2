//! Nonce resolution for outgoing transactions
//!
//! The node is asked for the pending transaction count at most once per
//! transaction, and only when the sender is known and no nonce was given.

use super::options::TransactionOptions;
use crate::chain::NodeClient;
use crate::error::{DeployError, DeployResult};

use ethers::signers::{LocalWallet, Signer};
use ethers::types::U256;
use tracing::debug;

/// Fill in the nonce of `from` if it is known and no nonce was set
pub async fn fill_nonce(
    client: &dyn NodeClient,
    options: &mut TransactionOptions,
) -> DeployResult<()> {
    if let (Some(from), None) = (options.from, options.nonce) {
        let nonce = client.pending_transaction_count(from).await?;
        debug!("Using pending nonce {} for {:?}", nonce, from);
        options.nonce = Some(nonce);
    }
    Ok(())
}

/// Determine the nonce of the first transaction from the command line flags
///
/// Both flag checks happen before the node is contacted.
pub async fn resolve_cli_nonce(
    client: &dyn NodeClient,
    nonce: Option<U256>,
    auto_nonce: bool,
    wallet: Option<&LocalWallet>,
) -> DeployResult<Option<U256>> {
    if !auto_nonce {
        return Ok(nonce);
    }
    let wallet = wallet.ok_or_else(|| {
        DeployError::Usage("--auto-nonce requires --keystore argument".to_string())
    })?;
    if nonce.is_some() {
        return Err(DeployError::Usage(
            "--nonce and --auto-nonce cannot be used at the same time".to_string(),
        ));
    }

    let nonce = client.pending_transaction_count(wallet.address()).await?;
    debug!("Auto nonce for {:?}: {}", wallet.address(), nonce);
    Ok(Some(nonce))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockNodeClient;
    use ethers::types::Address;
    use mockall::predicate::eq;

    fn wallet() -> LocalWallet {
        "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
            .parse()
            .unwrap()
    }

    #[tokio::test]
    async fn test_fill_nonce_queries_pending_count() {
        let from = Address::repeat_byte(0x42);
        let mut client = MockNodeClient::new();
        client
            .expect_pending_transaction_count()
            .with(eq(from))
            .times(1)
            .returning(|_| Ok(U256::from(3)));

        let mut options = TransactionOptions {
            from: Some(from),
            ..Default::default()
        };
        fill_nonce(&client, &mut options).await.unwrap();
        assert_eq!(options.nonce, Some(U256::from(3)));
    }

    #[tokio::test]
    async fn test_fill_nonce_keeps_explicit_nonce() {
        let client = MockNodeClient::new();
        let mut options = TransactionOptions {
            from: Some(Address::repeat_byte(0x42)),
            nonce: Some(U256::from(9)),
            ..Default::default()
        };
        fill_nonce(&client, &mut options).await.unwrap();
        assert_eq!(options.nonce, Some(U256::from(9)));
    }

    #[tokio::test]
    async fn test_fill_nonce_without_sender_is_noop() {
        let client = MockNodeClient::new();
        let mut options = TransactionOptions::default();
        fill_nonce(&client, &mut options).await.unwrap();
        assert!(options.nonce.is_none());
    }

    #[tokio::test]
    async fn test_cli_nonce_passthrough() {
        let client = MockNodeClient::new();
        let nonce = resolve_cli_nonce(&client, Some(U256::from(4)), false, None)
            .await
            .unwrap();
        assert_eq!(nonce, Some(U256::from(4)));
    }

    #[tokio::test]
    async fn test_auto_nonce_requires_keystore() {
        let client = MockNodeClient::new();
        let err = resolve_cli_nonce(&client, None, true, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::Usage(_)));
    }

    #[tokio::test]
    async fn test_auto_nonce_conflicts_with_nonce() {
        let client = MockNodeClient::new();
        let wallet = wallet();
        let err = resolve_cli_nonce(&client, Some(U256::one()), true, Some(&wallet))
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::Usage(_)));
    }

    #[tokio::test]
    async fn test_auto_nonce_uses_wallet_address() {
        let wallet = wallet();
        let mut client = MockNodeClient::new();
        client
            .expect_pending_transaction_count()
            .with(eq(wallet.address()))
            .times(1)
            .returning(|_| Ok(U256::from(12)));

        let nonce = resolve_cli_nonce(&client, None, true, Some(&wallet))
            .await
            .unwrap();
        assert_eq!(nonce, Some(U256::from(12)));
    }
}
