//! Command line interface
//!
//! Every subcommand resolves its flags against the loaded [`Settings`], runs
//! one sequential workflow and prints its result to stdout.

use crate::abi::{format_tokens, parse_address, parse_args_for_constructor};
use crate::artifacts::{
    ensure_path_for_file_exists, filter_contracts, get_contract, load_json_asset,
    write_minified_json_asset, write_pretty_json_asset, CompiledContracts,
};
use crate::chain::{EthNode, NodeClient};
use crate::compile::{build_initcode, compile_project, resolve_contracts_dir, CompileOptions};
use crate::config::{CompilerConfig, Settings};
use crate::contract::DeployedContract;
use crate::deploy::{
    decrypt_private_key, deploy_compiled_contract, ensure_keystore_path_is_free, generate_keystore,
};
use crate::error::{DeployError, DeployResult};
use crate::tx::{build_transaction_options, resolve_cli_nonce, TransactionSender};

use clap::{Args, Parser, Subcommand};
use ethers::signers::LocalWallet;
use ethers::types::{Address, H256, U256};
use ethers::utils::to_checksum;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const KEYSTORE_FILE_SAVE_DEFAULT: &str = "keystore.json";
const COMPILE_OUTPUT_DEFAULT: &str = "build/contracts.json";

#[derive(Debug, Parser)]
#[command(
    name = "deploy-tools",
    version,
    about = "Compile, deploy and interact with smart contracts"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile all contracts
    Compile(CompileArgs),
    /// Deploy the contract CONTRACT_NAME with the constructor arguments ARGS
    ///
    /// Array arguments are given without brackets, separated by commas,
    /// e.g. 123,456,789 for an int[].
    Deploy(DeployArgs),
    /// Print the initcode of a contract, e.g. for inclusion in a chain spec
    Initcode(InitcodeArgs),
    /// Send a transaction calling FUNCTION_NAME of a deployed contract
    Transact(TransactArgs),
    /// Call a contract function without sending a transaction
    Call(CallArgs),
    /// Generate an encrypted keystore file, for a new account if no private key is given
    GenerateKeystore(GenerateKeystoreArgs),
    /// Send VALUE wei to ADDRESS
    SendEth(SendEthArgs),
}

#[derive(Debug, Args)]
pub struct NodeArgs {
    /// JsonRPC URL of the ethereum client [default: http://127.0.0.1:8545]
    #[arg(long, env = "JSONRPC", value_name = "URL")]
    pub jsonrpc: Option<String>,
}

#[derive(Debug, Args)]
pub struct TransactionArgs {
    /// Gas of the transaction to be sent
    #[arg(long, env = "GAS", value_parser = parse_u256)]
    pub gas: Option<U256>,
    /// Gas price of the transaction to be sent
    #[arg(long, env = "GAS_PRICE", value_parser = parse_u256)]
    pub gas_price: Option<U256>,
    /// Nonce of the first transaction to be sent
    #[arg(long, value_parser = parse_u256)]
    pub nonce: Option<U256>,
    /// Automatically determine the nonce of the first transaction to be sent
    #[arg(long, env = "AUTO_NONCE")]
    pub auto_nonce: bool,
    /// Path to the encrypted keystore
    #[arg(long, env = "KEYSTORE", value_name = "PATH")]
    pub keystore: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ContractSourceArgs {
    /// Directory of the contracts sources [default: contracts]
    #[arg(long, short = 'd', env = "CONTRACTS_DIR", value_name = "DIR")]
    pub contracts_dir: Option<PathBuf>,
    /// Path to the compiled contracts json file
    #[arg(long, env = "COMPILED_CONTRACTS", value_name = "PATH")]
    pub compiled_contracts: Option<PathBuf>,
}

#[derive(Debug, Default, Args)]
pub struct CompilerArgs {
    /// Turn the solidity optimizer on
    #[arg(long, overrides_with = "no_optimize")]
    pub optimize: bool,
    /// Turn the solidity optimizer off
    #[arg(long, overrides_with = "optimize")]
    pub no_optimize: bool,
    /// Number of contract runs to optimize for [default: 500]
    #[arg(long, env = "OPTIMIZE_RUNS")]
    pub optimize_runs: Option<u32>,
    /// The evm target version, e.g. petersburg, constantinople or byzantium
    #[arg(long, env = "EVM_VERSION")]
    pub evm_version: Option<String>,
}

#[derive(Debug, Args)]
pub struct CompileArgs {
    /// Directory of the contracts sources [default: contracts]
    #[arg(long, short = 'd', env = "CONTRACTS_DIR", value_name = "DIR")]
    pub contracts_dir: Option<PathBuf>,
    #[command(flatten)]
    pub compiler: CompilerArgs,
    /// Only include the abi of the contracts
    #[arg(long)]
    pub only_abi: bool,
    /// Minimize the output file by removing unnecessary whitespace
    #[arg(long)]
    pub minimize: bool,
    /// Comma separated list of contract names to include, all contracts by default
    #[arg(long, value_delimiter = ',')]
    pub contract_names: Option<Vec<String>>,
    /// Name of the output file
    #[arg(long, short = 'o', default_value = COMPILE_OUTPUT_DEFAULT)]
    pub output: PathBuf,
}

#[derive(Debug, Args)]
pub struct DeployArgs {
    pub contract_name: String,
    #[arg(allow_negative_numbers = true)]
    pub args: Vec<String>,
    #[command(flatten)]
    pub transaction: TransactionArgs,
    #[command(flatten)]
    pub node: NodeArgs,
    #[command(flatten)]
    pub source: ContractSourceArgs,
    #[command(flatten)]
    pub compiler: CompilerArgs,
}

#[derive(Debug, Args)]
pub struct InitcodeArgs {
    pub contract_name: String,
    #[arg(allow_negative_numbers = true)]
    pub args: Vec<String>,
    #[command(flatten)]
    pub source: ContractSourceArgs,
    #[command(flatten)]
    pub compiler: CompilerArgs,
}

#[derive(Debug, Args)]
pub struct TransactArgs {
    pub contract_name: String,
    pub function_name: String,
    #[arg(allow_negative_numbers = true)]
    pub args: Vec<String>,
    #[command(flatten)]
    pub transaction: TransactionArgs,
    #[command(flatten)]
    pub node: NodeArgs,
    #[command(flatten)]
    pub source: ContractSourceArgs,
    /// The address of the deployed contract, '0x' prefixed
    #[arg(long, value_parser = parse_address_arg)]
    pub contract_address: Address,
    /// Amount of wei to send with the transaction
    #[arg(long, value_parser = parse_u256)]
    pub value: Option<U256>,
}

#[derive(Debug, Args)]
pub struct CallArgs {
    pub contract_name: String,
    pub function_name: String,
    #[arg(allow_negative_numbers = true)]
    pub args: Vec<String>,
    #[command(flatten)]
    pub node: NodeArgs,
    #[command(flatten)]
    pub source: ContractSourceArgs,
    /// The address of the deployed contract, '0x' prefixed
    #[arg(long, value_parser = parse_address_arg)]
    pub contract_address: Address,
}

#[derive(Debug, Args)]
pub struct GenerateKeystoreArgs {
    /// Path where to store the keystore file
    #[arg(long, default_value = KEYSTORE_FILE_SAVE_DEFAULT)]
    pub keystore_path: PathBuf,
    /// Private key in hex representation
    #[arg(long)]
    pub private_key: Option<String>,
}

#[derive(Debug, Args)]
pub struct SendEthArgs {
    #[arg(value_parser = parse_u256)]
    pub value: U256,
    #[arg(value_parser = parse_address_arg)]
    pub address: Address,
    #[command(flatten)]
    pub transaction: TransactionArgs,
    #[command(flatten)]
    pub node: NodeArgs,
}

impl Cli {
    /// Run the selected subcommand
    pub async fn run(self, settings: &Settings) -> DeployResult<()> {
        match self.command {
            Command::Compile(args) => compile(&args, settings),
            Command::Deploy(args) => {
                let session = Session::open(&args.node, &args.transaction, settings)?;
                let address = deploy(&args, settings, &session.sender, session.wallet()).await?;
                println!("{}", to_checksum(&address, None));
                Ok(())
            }
            Command::Initcode(args) => {
                println!("{}", initcode(&args, settings)?);
                Ok(())
            }
            Command::Transact(args) => {
                let session = Session::open(&args.node, &args.transaction, settings)?;
                let tx_hash = transact(&args, settings, &session.sender, session.wallet()).await?;
                println!("{:?}", tx_hash);
                Ok(())
            }
            Command::Call(args) => {
                let client = connect(&args.node, settings)?;
                println!("{}", call(&args, settings, client.as_ref()).await?);
                Ok(())
            }
            Command::GenerateKeystore(args) => {
                ensure_keystore_path_is_free(&args.keystore_path)?;
                let password = prompt_new_password()?;
                let address =
                    generate_keystore(&args.keystore_path, args.private_key.as_deref(), &password)?;
                println!(
                    "Stored keystore for {} at {}",
                    to_checksum(&address, None),
                    args.keystore_path.display()
                );
                Ok(())
            }
            Command::SendEth(args) => {
                let session = Session::open(&args.node, &args.transaction, settings)?;
                let tx_hash = send_eth(&args, &session.sender, session.wallet()).await?;
                println!("{:?}", tx_hash);
                Ok(())
            }
        }
    }
}

/// Node connection plus the optional local key of a transacting command
struct Session {
    sender: TransactionSender,
    wallet: Option<LocalWallet>,
}

impl Session {
    fn open(node: &NodeArgs, transaction: &TransactionArgs, settings: &Settings) -> DeployResult<Self> {
        let client = connect(node, settings)?;
        let wallet = transaction
            .keystore
            .as_deref()
            .map(retrieve_private_key)
            .transpose()?;
        let sender = TransactionSender::new(client, settings.poll_interval())
            .with_default_account(settings.default_account()?)
            .with_receipt_timeout(settings.receipt_timeout());

        Ok(Self { sender, wallet })
    }

    fn wallet(&self) -> Option<&LocalWallet> {
        self.wallet.as_ref()
    }
}

fn connect(node: &NodeArgs, settings: &Settings) -> DeployResult<Arc<dyn NodeClient>> {
    let url = node.jsonrpc.as_deref().unwrap_or(&settings.node.jsonrpc);
    debug!("Connecting to {}", url);
    Ok(Arc::new(EthNode::connect(url, settings.request_timeout())?))
}

fn retrieve_private_key(keystore: &Path) -> DeployResult<LocalWallet> {
    if !keystore.is_file() {
        return Err(DeployError::Usage(format!(
            "Keystore file not found: {:?}",
            keystore
        )));
    }
    let password = rpassword::prompt_password("Please enter the password to decrypt the keystore: ")
        .map_err(|e| DeployError::Keystore(format!("Could not read the password: {}", e)))?;
    decrypt_private_key(keystore, &password)
}

fn prompt_new_password() -> DeployResult<String> {
    let read = |prompt: &str| {
        rpassword::prompt_password(prompt)
            .map_err(|e| DeployError::Keystore(format!("Could not read the password: {}", e)))
    };
    let password = read("Please enter the password to encrypt the keystore: ")?;
    let confirmation = read("Repeat for confirmation: ")?;
    if password != confirmation {
        return Err(DeployError::Usage(
            "The two entered passwords do not match".to_string(),
        ));
    }
    Ok(password)
}

impl CompilerArgs {
    /// Compiler options from the flags, falling back to the configured values
    pub fn options(&self, config: &CompilerConfig, only_abi: bool) -> CompileOptions {
        CompileOptions {
            solc: config.solc.clone(),
            optimize: !self.no_optimize && (self.optimize || config.optimize),
            optimize_runs: self.optimize_runs.unwrap_or(config.optimize_runs),
            evm_version: self
                .evm_version
                .clone()
                .unwrap_or_else(|| config.evm_version.clone()),
            only_abi,
        }
    }
}

impl ContractSourceArgs {
    /// Load a compiled contracts file or compile the contracts directory
    pub fn load(
        &self,
        settings: &Settings,
        options: &CompileOptions,
    ) -> DeployResult<CompiledContracts> {
        match (&self.contracts_dir, &self.compiled_contracts) {
            (Some(_), Some(_)) => Err(DeployError::Usage(
                "Both --contracts-dir and --compiled-contracts were specified. Please only use one of the two."
                    .to_string(),
            )),
            (None, Some(path)) => load_json_asset(path),
            (contracts_dir, None) => {
                let dir = contracts_dir_or_default(contracts_dir.as_deref(), settings)?;
                compile_project(&dir, options)
            }
        }
    }
}

fn contracts_dir_or_default(dir: Option<&Path>, settings: &Settings) -> DeployResult<PathBuf> {
    let configured = PathBuf::from(&settings.compiler.contracts_dir);
    resolve_contracts_dir(Some(dir.unwrap_or(configured.as_path())))
}

fn compile(args: &CompileArgs, settings: &Settings) -> DeployResult<()> {
    ensure_path_for_file_exists(&args.output)?;
    let dir = contracts_dir_or_default(args.contracts_dir.as_deref(), settings)?;
    let options = args.compiler.options(&settings.compiler, args.only_abi);

    let contracts = filter_contracts(
        args.contract_names.as_deref(),
        compile_project(&dir, &options)?,
    )?;

    if args.minimize {
        write_minified_json_asset(&contracts, &args.output)?;
    } else {
        write_pretty_json_asset(&contracts, &args.output)?;
    }
    info!("Wrote {} contracts to {:?}", contracts.len(), args.output);
    Ok(())
}

async fn deploy(
    args: &DeployArgs,
    settings: &Settings,
    sender: &TransactionSender,
    wallet: Option<&LocalWallet>,
) -> DeployResult<Address> {
    let transaction = &args.transaction;
    let nonce = resolve_cli_nonce(
        sender.client().as_ref(),
        transaction.nonce,
        transaction.auto_nonce,
        wallet,
    )
    .await?;
    let mut options = build_transaction_options(transaction.gas, transaction.gas_price, nonce, None);

    let contracts = args
        .source
        .load(settings, &args.compiler.options(&settings.compiler, false))?;
    let artifact = get_contract(&contracts, &args.contract_name)?;
    let constructor_args = parse_args_for_constructor(&args.args, &artifact.abi()?)?;

    let contract =
        deploy_compiled_contract(sender, artifact, &constructor_args, &mut options, wallet).await?;
    Ok(contract.address)
}

fn initcode(args: &InitcodeArgs, settings: &Settings) -> DeployResult<String> {
    let contracts = args
        .source
        .load(settings, &args.compiler.options(&settings.compiler, false))?;
    let artifact = get_contract(&contracts, &args.contract_name)?;
    let abi = artifact.abi()?;
    let constructor_args = parse_args_for_constructor(&args.args, &abi)?;

    build_initcode(Some(&abi), &artifact.bytecode()?, &constructor_args)
}

/// Only the abi is needed to talk to a deployed contract
fn load_abi_only(source: &ContractSourceArgs, settings: &Settings) -> DeployResult<CompiledContracts> {
    source.load(settings, &CompilerArgs::default().options(&settings.compiler, true))
}

async fn transact(
    args: &TransactArgs,
    settings: &Settings,
    sender: &TransactionSender,
    wallet: Option<&LocalWallet>,
) -> DeployResult<H256> {
    let transaction = &args.transaction;
    let nonce = resolve_cli_nonce(
        sender.client().as_ref(),
        transaction.nonce,
        transaction.auto_nonce,
        wallet,
    )
    .await?;
    let mut options =
        build_transaction_options(transaction.gas, transaction.gas_price, nonce, args.value);

    let contracts = load_abi_only(&args.source, settings)?;
    let artifact = get_contract(&contracts, &args.contract_name)?;
    let contract = DeployedContract::new(args.contract_address, artifact.abi()?);
    let function_call = contract.function_call(&args.function_name, &args.args)?;

    let receipt = sender
        .wait_for_successful_function_call(&function_call, &mut options, wallet)
        .await?;
    Ok(receipt.transaction_hash)
}

async fn call(args: &CallArgs, settings: &Settings, client: &dyn NodeClient) -> DeployResult<String> {
    let contracts = load_abi_only(&args.source, settings)?;
    let artifact = get_contract(&contracts, &args.contract_name)?;
    let contract = DeployedContract::new(args.contract_address, artifact.abi()?);

    let result = contract.call(client, &args.function_name, &args.args).await?;
    Ok(format_tokens(&result))
}

async fn send_eth(
    args: &SendEthArgs,
    sender: &TransactionSender,
    wallet: Option<&LocalWallet>,
) -> DeployResult<H256> {
    let transaction = &args.transaction;
    let nonce = resolve_cli_nonce(
        sender.client().as_ref(),
        transaction.nonce,
        transaction.auto_nonce,
        wallet,
    )
    .await?;
    let mut options = build_transaction_options(
        transaction.gas,
        transaction.gas_price,
        nonce,
        Some(args.value),
    );
    options.to = Some(args.address);

    let receipt = sender
        .wait_for_successful_transaction(&mut options, wallet)
        .await?;
    Ok(receipt.transaction_hash)
}

fn parse_u256(value: &str) -> Result<U256, String> {
    U256::from_dec_str(value).map_err(|e| format!("{} is not a valid integer: {}", value, e))
}

fn parse_address_arg(value: &str) -> Result<Address, String> {
    parse_address(value).map_err(|e| e.to_string())
}
