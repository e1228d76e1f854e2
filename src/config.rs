//! Configuration management for deploy-tools
//!
//! Loads optional settings from a TOML file with environment variable
//! substitution. Command line flags override whatever is loaded here.

use crate::error::{DeployError, DeployResult};
use crate::tx::DEFAULT_RECEIPT_TIMEOUT;

use ethers::types::Address;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV_VAR: &str = "DEPLOY_TOOLS_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "deploy-tools.toml";

pub const DEFAULT_JSONRPC: &str = "http://127.0.0.1:8545";
pub const DEFAULT_CONTRACTS_DIR: &str = "contracts";
pub const DEFAULT_EVM_VERSION: &str = "petersburg";

lazy_static! {
    static ref ENV_VAR_PATTERN: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub node: NodeConfig,
    pub compiler: CompilerConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub jsonrpc: String,
    pub request_timeout_secs: u64,
    pub receipt_timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// Account used for node-signed transactions instead of the node's first account
    pub default_account: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            jsonrpc: DEFAULT_JSONRPC.to_string(),
            request_timeout_secs: 180,
            receipt_timeout_secs: DEFAULT_RECEIPT_TIMEOUT.as_secs(),
            poll_interval_ms: 100,
            default_account: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub solc: String,
    pub contracts_dir: String,
    pub evm_version: String,
    pub optimize: bool,
    pub optimize_runs: u32,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            solc: "solc".to_string(),
            contracts_dir: DEFAULT_CONTRACTS_DIR.to_string(),
            evm_version: DEFAULT_EVM_VERSION.to_string(),
            optimize: true,
            optimize_runs: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub filter: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "warn,deploy_tools=info".to_string(),
            json: false,
        }
    }
}

impl Settings {
    /// Load settings from `$DEPLOY_TOOLS_CONFIG`, then `deploy-tools.toml`,
    /// falling back to defaults when neither exists
    pub fn load() -> DeployResult<Self> {
        match env::var(CONFIG_ENV_VAR) {
            Ok(path) => Self::load_from(Path::new(&path)),
            Err(_) => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    Self::load_from(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load settings from a specific file
    pub fn load_from(path: &Path) -> DeployResult<Self> {
        let config_str =
            std::fs::read_to_string(path).map_err(|e| DeployError::io(path, e))?;

        Self::parse(&config_str)
    }

    /// Parse settings from TOML text
    pub fn parse(config_str: &str) -> DeployResult<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let settings: Settings = toml::from_str(&config_str)
            .map_err(|e| DeployError::Config(format!("Failed to parse configuration: {}", e)))?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> DeployResult<()> {
        let node = &self.node;
        if node.request_timeout_secs == 0 || node.receipt_timeout_secs == 0 {
            return Err(DeployError::Config("Timeouts must be positive".to_string()));
        }
        if node.poll_interval_ms == 0 {
            return Err(DeployError::Config(
                "poll_interval_ms must be positive".to_string(),
            ));
        }
        self.default_account()?;

        Ok(())
    }

    /// Configured default account for node-signed transactions
    pub fn default_account(&self) -> DeployResult<Option<Address>> {
        self.node
            .default_account
            .as_deref()
            .map(|account| {
                account.parse::<Address>().map_err(|e| {
                    DeployError::Config(format!("Invalid default_account {}: {}", account, e))
                })
            })
            .transpose()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.node.request_timeout_secs)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.node.receipt_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.node.poll_interval_ms)
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();

    for cap in ENV_VAR_PATTERN.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("DEPLOY_TOOLS_TEST_HOST", "10.0.0.7");
        let input = "jsonrpc = \"http://${DEPLOY_TOOLS_TEST_HOST}:8545\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "jsonrpc = \"http://10.0.0.7:8545\"");
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings.node.jsonrpc, DEFAULT_JSONRPC);
        assert_eq!(settings.receipt_timeout(), Duration::from_secs(180));
        assert_eq!(settings.compiler.evm_version, DEFAULT_EVM_VERSION);
        assert_eq!(settings.compiler.optimize_runs, 500);
        assert!(settings.default_account().unwrap().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[node]\njsonrpc = \"http://node:8545\"\npoll_interval_ms = 5\n\
             default_account = \"0x00000000000000000000000000000000000000aa\"\n\
             [compiler]\nevm_version = \"istanbul\""
        )
        .unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.node.jsonrpc, "http://node:8545");
        assert_eq!(settings.poll_interval(), Duration::from_millis(5));
        assert_eq!(settings.compiler.evm_version, "istanbul");
        assert_eq!(
            settings.default_account().unwrap(),
            Some(Address::from_low_u64_be(0xaa))
        );
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            Settings::parse("[node]\nreceipt_timeout_secs = 0"),
            Err(DeployError::Config(_))
        ));
        assert!(matches!(
            Settings::parse("[node]\ndefault_account = \"not-an-address\""),
            Err(DeployError::Config(_))
        ));
    }
}
