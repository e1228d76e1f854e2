//! Contract deployment and keystore handling

use crate::artifacts::ContractArtifact;
use crate::compile::encode_initcode;
use crate::contract::DeployedContract;
use crate::error::{DeployError, DeployResult};
use crate::tx::{ContractCall, TransactionOptions, TransactionSender};

use ethers::abi::Token;
use ethers::core::rand::thread_rng;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use std::path::Path;
use tracing::info;

/// Deploy a compiled contract with the node's account or a local private key
///
/// Blocks until the creation transaction was successfully mined.
pub async fn deploy_compiled_contract(
    sender: &TransactionSender,
    artifact: &ContractArtifact,
    constructor_args: &[Token],
    options: &mut TransactionOptions,
    wallet: Option<&LocalWallet>,
) -> DeployResult<DeployedContract> {
    let abi = artifact.abi()?;
    let bytecode = artifact.bytecode()?;
    let initcode = encode_initcode(Some(&abi), &bytecode, constructor_args)?;

    let receipt = sender
        .wait_for_successful_function_call(&ContractCall::creation(initcode), options, wallet)
        .await?;

    let address = receipt.contract_address.ok_or_else(|| {
        DeployError::Rpc(format!(
            "Receipt of {:?} has no contract address",
            receipt.transaction_hash
        ))
    })?;
    info!("Contract deployed at {:?}", address);

    Ok(DeployedContract::new(address, abi))
}

/// Decrypt the private key of an encrypted keystore file
pub fn decrypt_private_key(keystore_path: &Path, password: &str) -> DeployResult<LocalWallet> {
    LocalWallet::decrypt_keystore(keystore_path, password).map_err(|e| {
        DeployError::Keystore(format!("Could not decrypt {:?}: {}", keystore_path, e))
    })
}

/// Write an encrypted keystore to `keystore_path`
///
/// Uses `private_key` (hex) if given, otherwise creates a new account.
/// An existing file is never overwritten.
pub fn generate_keystore(
    keystore_path: &Path,
    private_key: Option<&str>,
    password: &str,
) -> DeployResult<Address> {
    ensure_keystore_path_is_free(keystore_path)?;

    let dir = match keystore_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = keystore_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| DeployError::Usage(format!("Invalid keystore path {:?}", keystore_path)))?;

    let mut rng = thread_rng();
    let (wallet, _) = match private_key {
        Some(private_key) => {
            let digits = private_key.strip_prefix("0x").unwrap_or(private_key);
            let key = hex::decode(digits)
                .map_err(|e| DeployError::Keystore(format!("Invalid private key: {}", e)))?;
            LocalWallet::encrypt_keystore(dir, &mut rng, key, password, Some(name))
        }
        None => LocalWallet::new_keystore(dir, &mut rng, password, Some(name)),
    }
    .map_err(|e| DeployError::Keystore(e.to_string()))?;

    info!("Stored keystore for {:?} at {:?}", wallet.address(), keystore_path);
    Ok(wallet.address())
}

/// Fail if a file already exists where a keystore should be written
pub fn ensure_keystore_path_is_free(keystore_path: &Path) -> DeployResult<()> {
    if keystore_path.exists() {
        return Err(DeployError::Usage(format!(
            "The file {:?} does already exist!",
            keystore_path
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::tests::TEST_ABI;
    use crate::chain::MockNodeClient;
    use crate::tx::build_transaction_options;
    use ethers::types::transaction::eip2718::TypedTransaction;
    use ethers::types::{TransactionReceipt, H256, U256, U64};
    use std::sync::Arc;
    use std::time::Duration;

    const PRIVATE_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn artifact() -> ContractArtifact {
        ContractArtifact {
            abi: serde_json::from_str(TEST_ABI).unwrap(),
            bytecode: Some("0x6080".to_string()),
        }
    }

    #[tokio::test]
    async fn test_deploy_returns_created_address() {
        let account = Address::repeat_byte(0x01);
        let created = Address::repeat_byte(0xcc);
        let mut client = MockNodeClient::new();
        client.expect_accounts().returning(move || Ok(vec![account]));
        client
            .expect_pending_transaction_count()
            .returning(|_| Ok(U256::zero()));
        client
            .expect_send_transaction()
            .withf(|tx: &TypedTransaction| {
                tx.to().is_none()
                    && tx.data().map(|data| data.len() == 2 + 32 && data[..2] == [0x60, 0x80])
                        == Some(true)
            })
            .times(1)
            .returning(|_| Ok(H256::repeat_byte(0xab)));
        client.expect_transaction_receipt().returning(move |hash| {
            Ok(Some(TransactionReceipt {
                transaction_hash: hash,
                status: Some(U64::from(1)),
                contract_address: Some(created),
                ..Default::default()
            }))
        });
        let sender = TransactionSender::new(Arc::new(client), Duration::from_millis(1));

        let mut options = build_transaction_options(None, None, None, None);
        let contract = deploy_compiled_contract(
            &sender,
            &artifact(),
            &[Token::Int(U256::from(4))],
            &mut options,
            None,
        )
        .await
        .unwrap();

        assert_eq!(contract.address, created);
        assert!(contract.abi.function("testFunction").is_ok());
    }

    #[tokio::test]
    async fn test_reverted_deployment_is_failure() {
        let mut client = MockNodeClient::new();
        client
            .expect_accounts()
            .returning(|| Ok(vec![Address::repeat_byte(0x01)]));
        client
            .expect_pending_transaction_count()
            .returning(|_| Ok(U256::zero()));
        client
            .expect_send_transaction()
            .returning(|_| Ok(H256::repeat_byte(0xab)));
        client.expect_transaction_receipt().returning(|hash| {
            Ok(Some(TransactionReceipt {
                transaction_hash: hash,
                status: Some(U64::zero()),
                ..Default::default()
            }))
        });
        let sender = TransactionSender::new(Arc::new(client), Duration::from_millis(1));

        let err = deploy_compiled_contract(
            &sender,
            &artifact(),
            &[Token::Int(U256::from(4))],
            &mut TransactionOptions::default(),
            None,
        )
        .await
        .unwrap_err();
        assert!(err.is_transaction_failure());
    }

    #[test]
    fn test_keystore_roundtrip_with_given_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.json");

        let address = generate_keystore(&path, Some(&format!("0x{}", PRIVATE_KEY)), "secret").unwrap();
        let expected: LocalWallet = PRIVATE_KEY.parse().unwrap();
        assert_eq!(address, expected.address());

        let wallet = decrypt_private_key(&path, "secret").unwrap();
        assert_eq!(wallet.address(), expected.address());

        assert!(matches!(
            decrypt_private_key(&path, "wrong"),
            Err(DeployError::Keystore(_))
        ));
    }

    #[test]
    fn test_keystore_for_new_account() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.json");

        let address = generate_keystore(&path, None, "").unwrap();
        assert_eq!(decrypt_private_key(&path, "").unwrap().address(), address);
    }

    #[test]
    fn test_keystore_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.json");
        std::fs::write(&path, "{}").unwrap();

        assert!(matches!(
            generate_keystore(&path, None, "secret"),
            Err(DeployError::Usage(_))
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }
}
