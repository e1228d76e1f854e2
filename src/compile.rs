//! Contract compilation through an external `solc` binary
//!
//! Sources are handed to `solc --standard-json`; only the abi and the creation
//! bytecode of each contract are kept.

use crate::artifacts::{CompiledContracts, ContractArtifact};
use crate::config::{DEFAULT_EVM_VERSION, DEFAULT_CONTRACTS_DIR};
use crate::error::{DeployError, DeployResult};

use ethers::abi::{Abi, Token};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Compiler settings
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub solc: String,
    pub optimize: bool,
    pub optimize_runs: u32,
    pub evm_version: String,
    pub only_abi: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            solc: "solc".to_string(),
            optimize: true,
            optimize_runs: 500,
            evm_version: DEFAULT_EVM_VERSION.to_string(),
            only_abi: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SolcOutput {
    #[serde(default)]
    errors: Vec<SolcDiagnostic>,
    #[serde(default)]
    contracts: BTreeMap<String, BTreeMap<String, SolcContract>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolcDiagnostic {
    severity: String,
    #[serde(default)]
    formatted_message: Option<String>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct SolcContract {
    #[serde(default)]
    abi: Value,
    #[serde(default)]
    evm: Option<SolcEvm>,
}

#[derive(Debug, Deserialize)]
struct SolcEvm {
    bytecode: Option<SolcBytecode>,
}

#[derive(Debug, Deserialize)]
struct SolcBytecode {
    object: String,
}

/// Compile all `.sol` files below `contracts_dir`
pub fn compile_project(
    contracts_dir: &Path,
    options: &CompileOptions,
) -> DeployResult<CompiledContracts> {
    let sources = collect_sources(contracts_dir)?;
    if sources.is_empty() {
        return Err(DeployError::Compile(format!(
            "No solidity files found in {:?}",
            contracts_dir
        )));
    }
    info!(
        "Compiling {} source files from {:?} with {}",
        sources.len(),
        contracts_dir,
        options.solc
    );

    let input = standard_json_input(&sources, options);
    let output = run_solc(&options.solc, &input)?;
    parse_standard_json_output(&output, options.only_abi)
}

/// Read every solidity source below `dir`, keyed by its path relative to `dir`
///
/// Symbolic links below `dir` are not followed.
fn collect_sources(dir: &Path) -> DeployResult<BTreeMap<String, String>> {
    let mut sources = BTreeMap::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            DeployError::io(path, e.into())
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().map_or(true, |ext| ext != "sol") {
            continue;
        }

        let content = fs::read_to_string(path).map_err(|e| DeployError::io(path, e))?;
        let name = path
            .strip_prefix(dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        debug!("Found source {}", name);
        sources.insert(name, content);
    }

    Ok(sources)
}

fn standard_json_input(sources: &BTreeMap<String, String>, options: &CompileOptions) -> Value {
    let sources: serde_json::Map<String, Value> = sources
        .iter()
        .map(|(name, content)| (name.clone(), json!({ "content": content })))
        .collect();
    let selection = if options.only_abi {
        json!(["abi"])
    } else {
        json!(["abi", "evm.bytecode.object"])
    };

    json!({
        "language": "Solidity",
        "sources": sources,
        "settings": {
            "optimizer": {
                "enabled": options.optimize,
                "runs": options.optimize_runs,
            },
            "evmVersion": options.evm_version,
            "outputSelection": {
                "*": { "*": selection },
            },
        },
    })
}

fn run_solc(solc: &str, input: &Value) -> DeployResult<String> {
    let mut child = Command::new(solc)
        .arg("--standard-json")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| DeployError::Compile(format!("Failed to run {}: {}", solc, e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.to_string().as_bytes())
            .map_err(|e| DeployError::Compile(format!("Failed to write to {}: {}", solc, e)))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| DeployError::Compile(format!("Failed to run {}: {}", solc, e)))?;
    if !output.status.success() {
        return Err(DeployError::Compile(format!(
            "{} exited with {}: {}",
            solc,
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    String::from_utf8(output.stdout)
        .map_err(|e| DeployError::Compile(format!("Invalid output of {}: {}", solc, e)))
}

fn parse_standard_json_output(output: &str, only_abi: bool) -> DeployResult<CompiledContracts> {
    let output: SolcOutput = serde_json::from_str(output)?;

    let mut errors = Vec::new();
    for diagnostic in &output.errors {
        let message = diagnostic
            .formatted_message
            .as_deref()
            .unwrap_or(&diagnostic.message);
        if diagnostic.severity == "error" {
            errors.push(message.trim().to_string());
        } else {
            warn!("{}", message.trim());
        }
    }
    if !errors.is_empty() {
        return Err(DeployError::Compile(errors.join("\n")));
    }

    let mut contracts = CompiledContracts::new();
    for (source, source_contracts) in output.contracts {
        for (name, contract) in source_contracts {
            let bytecode = if only_abi {
                None
            } else {
                contract
                    .evm
                    .and_then(|evm| evm.bytecode)
                    .map(|bytecode| bytecode.object)
            };
            let artifact = ContractArtifact {
                abi: contract.abi,
                bytecode,
            };
            if contracts.insert(name.clone(), artifact).is_some() {
                return Err(DeployError::Compile(format!(
                    "Contract name {} is used more than once (again in {})",
                    name, source
                )));
            }
        }
    }

    Ok(contracts)
}

/// Creation code of a contract with its constructor arguments appended, `0x` prefixed
pub fn build_initcode(
    abi: Option<&Abi>,
    bytecode: &[u8],
    constructor_args: &[Token],
) -> DeployResult<String> {
    let initcode = encode_initcode(abi, bytecode, constructor_args)?;
    Ok(format!("0x{}", hex::encode(initcode)))
}

/// Creation code of a contract with its constructor arguments appended
pub fn encode_initcode(
    abi: Option<&Abi>,
    bytecode: &[u8],
    constructor_args: &[Token],
) -> DeployResult<Vec<u8>> {
    let initcode = match abi.and_then(|abi| abi.constructor()) {
        Some(constructor) => constructor.encode_input(bytecode.to_vec(), constructor_args)?,
        None if constructor_args.is_empty() => bytecode.to_vec(),
        None => {
            return Err(DeployError::Usage(
                "Constructor arguments given for a contract without constructor".to_string(),
            ))
        }
    };
    Ok(initcode)
}

/// The contracts directory to compile, rejecting a missing one
pub fn resolve_contracts_dir(contracts_dir: Option<&Path>) -> DeployResult<PathBuf> {
    let dir = contracts_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTRACTS_DIR));
    if !dir.is_dir() {
        return Err(DeployError::Usage(format!(
            "Contract directory not found: {:?}",
            dir
        )));
    }
    Ok(dir)
}
