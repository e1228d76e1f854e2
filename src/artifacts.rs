//! Compiled contract assets in the `{name: {abi, bytecode}}` format

use crate::error::{DeployError, DeployResult};

use ethers::abi::Abi;
use ethers::types::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// ABI and creation bytecode of one compiled contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractArtifact {
    pub abi: serde_json::Value,
    /// Hex encoded creation bytecode, absent in abi-only builds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytecode: Option<String>,
}

/// Compiled contracts by name
pub type CompiledContracts = BTreeMap<String, ContractArtifact>;

impl ContractArtifact {
    /// Parse the ABI
    pub fn abi(&self) -> DeployResult<Abi> {
        Ok(serde_json::from_value(self.abi.clone())?)
    }

    /// Decode the creation bytecode
    pub fn bytecode(&self) -> DeployResult<Bytes> {
        let bytecode = self.bytecode.as_deref().ok_or_else(|| {
            DeployError::Usage("The compiled contract has no bytecode".to_string())
        })?;
        let digits = bytecode.strip_prefix("0x").unwrap_or(bytecode);
        let bytes = hex::decode(digits).map_err(|e| {
            DeployError::Compile(format!("Invalid bytecode in compiled contract: {}", e))
        })?;
        Ok(bytes.into())
    }
}

/// Look up a contract by name
pub fn get_contract<'a>(
    contracts: &'a CompiledContracts,
    name: &str,
) -> DeployResult<&'a ContractArtifact> {
    contracts
        .get(name)
        .ok_or_else(|| DeployError::UnknownContract(name.to_string()))
}

/// Keep only the contracts in `names`, or all of them if no names are given
pub fn filter_contracts(
    names: Option<&[String]>,
    contracts: CompiledContracts,
) -> DeployResult<CompiledContracts> {
    let Some(names) = names else {
        return Ok(contracts);
    };

    let mut contracts = contracts;
    names
        .iter()
        .map(|name| {
            contracts
                .remove_entry(name)
                .ok_or_else(|| DeployError::UnknownContract(name.to_string()))
        })
        .collect()
}

/// Load a compiled contracts json file
pub fn load_json_asset(path: &Path) -> DeployResult<CompiledContracts> {
    let content = fs::read_to_string(path).map_err(|e| DeployError::io(path, e))?;
    let contracts: CompiledContracts = serde_json::from_str(&content)?;
    debug!("Loaded {} contracts from {:?}", contracts.len(), path);
    Ok(contracts)
}

/// Write compiled contracts as indented json
pub fn write_pretty_json_asset(contracts: &CompiledContracts, path: &Path) -> DeployResult<()> {
    let content = serde_json::to_string_pretty(contracts)?;
    fs::write(path, content).map_err(|e| DeployError::io(path, e))
}

/// Write compiled contracts as json without whitespace
pub fn write_minified_json_asset(contracts: &CompiledContracts, path: &Path) -> DeployResult<()> {
    let content = serde_json::to_string(contracts)?;
    fs::write(path, content).map_err(|e| DeployError::io(path, e))
}

/// Create the parent directories of `path` if needed
pub fn ensure_path_for_file_exists(path: &Path) -> DeployResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| DeployError::io(parent, e))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contracts() -> CompiledContracts {
        let mut contracts = CompiledContracts::new();
        contracts.insert(
            "TestContract".to_string(),
            ContractArtifact {
                abi: json!([]),
                bytecode: Some("6080604052".to_string()),
            },
        );
        contracts.insert(
            "OtherContract".to_string(),
            ContractArtifact {
                abi: json!([]),
                bytecode: None,
            },
        );
        contracts
    }

    #[test]
    fn test_filter_contracts() {
        let all = filter_contracts(None, contracts()).unwrap();
        assert_eq!(all.len(), 2);

        let names = vec!["TestContract".to_string()];
        let filtered = filter_contracts(Some(&names), contracts()).unwrap();
        assert_eq!(filtered.keys().collect::<Vec<_>>(), vec!["TestContract"]);

        let names = vec!["TestContract".to_string(), "Missing".to_string()];
        assert!(matches!(
            filter_contracts(Some(&names), contracts()),
            Err(DeployError::UnknownContract(name)) if name == "Missing"
        ));
    }

    #[test]
    fn test_bytecode_decoding() {
        let contracts = contracts();
        let artifact = get_contract(&contracts, "TestContract").unwrap();
        assert_eq!(
            artifact.bytecode().unwrap(),
            Bytes::from(vec![0x60, 0x80, 0x60, 0x40, 0x52])
        );

        let prefixed = ContractArtifact {
            abi: json!([]),
            bytecode: Some("0x6080".to_string()),
        };
        assert_eq!(prefixed.bytecode().unwrap(), Bytes::from(vec![0x60, 0x80]));

        let abi_only = get_contract(&contracts, "OtherContract").unwrap();
        assert!(abi_only.bytecode().is_err());
        assert!(matches!(
            get_contract(&contracts, "Nope"),
            Err(DeployError::UnknownContract(_))
        ));
    }

    #[test]
    fn test_write_and_load_assets() {
        let dir = tempfile::tempdir().unwrap();
        let pretty = dir.path().join("build/nested/contracts.json");
        ensure_path_for_file_exists(&pretty).unwrap();
        write_pretty_json_asset(&contracts(), &pretty).unwrap();
        assert_eq!(load_json_asset(&pretty).unwrap(), contracts());
        assert!(fs::read_to_string(&pretty).unwrap().contains('\n'));

        let minified = dir.path().join("contracts.min.json");
        write_minified_json_asset(&contracts(), &minified).unwrap();
        let content = fs::read_to_string(&minified).unwrap();
        assert!(!content.contains('\n'));
        assert!(!content.contains("OtherContract\":{\"abi\":[],\"bytecode\""));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_json_asset(Path::new("/nonexistent/contracts.json")).unwrap_err();
        assert!(matches!(err, DeployError::Io { .. }));
    }
}
