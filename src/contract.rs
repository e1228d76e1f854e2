//! A deployed contract addressed by its ABI

use crate::abi::{find_matching_function, parse_args_for_function};
use crate::chain::NodeClient;
use crate::error::{DeployError, DeployResult};
use crate::tx::ContractCall;

use ethers::abi::{Abi, Token};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionRequest};
use tracing::debug;

/// Deployed contract: an address plus the ABI to talk to it
#[derive(Debug, Clone)]
pub struct DeployedContract {
    pub address: Address,
    pub abi: Abi,
}

impl DeployedContract {
    pub fn new(address: Address, abi: Abi) -> Self {
        Self { address, abi }
    }

    /// Encode a call of `function_name` with command line arguments
    ///
    /// The function is chosen by name and argument count.
    pub fn function_call(&self, function_name: &str, args: &[String]) -> DeployResult<ContractCall> {
        let function = find_matching_function(&self.abi, function_name, args.len())?;
        let tokens = parse_args_for_function(args, function)?;
        let data = function.encode_input(&tokens)?;
        Ok(ContractCall::function(self.address, data))
    }

    /// Run `function_name` read-only through `eth_call` and decode its return values
    pub async fn call(
        &self,
        client: &dyn NodeClient,
        function_name: &str,
        args: &[String],
    ) -> DeployResult<Vec<Token>> {
        let function = find_matching_function(&self.abi, function_name, args.len())?;
        let call = self.function_call(function_name, args)?;

        let tx = TypedTransaction::Legacy(
            TransactionRequest::new()
                .to(self.address)
                .data(call.data),
        );
        debug!("Calling {} on {:?}", function.signature(), self.address);
        let output = client.call(tx).await?;

        function.decode_output(&output).map_err(|e| {
            DeployError::Rpc(format!(
                "Could not decode the result of {}: {}",
                function.name, e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::tests::test_abi;
    use crate::chain::MockNodeClient;
    use ethers::abi::encode;
    use ethers::types::{Bytes, I256, U256};
    use ethers::utils::id;

    fn contract() -> DeployedContract {
        DeployedContract::new(Address::repeat_byte(0xcc), test_abi())
    }

    #[test]
    fn test_function_call_encoding() {
        let call = contract()
            .function_call("set", &["200".to_string()])
            .unwrap();
        assert_eq!(call.to, Some(Address::repeat_byte(0xcc)));
        assert_eq!(&call.data[..4], &id("set(int256)")[..]);
        assert_eq!(
            &call.data[4..],
            &encode(&[Token::Int(U256::from(200))])[..]
        );
    }

    #[test]
    fn test_unknown_function() {
        let err = contract()
            .function_call("nope", &[])
            .unwrap_err();
        assert!(matches!(err, DeployError::NoMatchingFunction { .. }));
    }

    #[tokio::test]
    async fn test_read_only_call_decodes_output() {
        let mut client = MockNodeClient::new();
        client
            .expect_call()
            .withf(|tx: &TypedTransaction| {
                tx.to_addr() == Some(&Address::repeat_byte(0xcc))
                    && tx.data().map(|d| d[..4] == id("testFunction(int256)")[..]) == Some(true)
            })
            .times(1)
            .returning(|_| Ok(Bytes::from(encode(&[Token::Int(U256::from(7))]))));

        let tokens = contract()
            .call(&client, "testFunction", &["3".to_string()])
            .await
            .unwrap();
        assert_eq!(
            tokens,
            vec![Token::Int(I256::from_dec_str("7").unwrap().into_raw())]
        );
    }

    #[tokio::test]
    async fn test_undecodable_output() {
        let mut client = MockNodeClient::new();
        client
            .expect_call()
            .returning(|_| Ok(Bytes::from(vec![0x01])));

        let err = contract()
            .call(&client, "state", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::Rpc(_)));
    }
}
