//! Coercion of command line strings into ABI tokens

use crate::error::{DeployError, DeployResult};

use ethers::abi::{Param, ParamType, Token};
use ethers::types::{Address, I256, U256};
use ethers::utils::to_checksum;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ADDRESS_PATTERN: Regex = Regex::new(r"^0x[0-9a-fA-F]{40}$").unwrap();
}

/// The ABI kinds an argument can be given for on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgKind {
    Uint(usize),
    Int(usize),
    Bool,
    Address,
    FixedBytes(usize),
    Bytes,
    String,
    /// Comma separated list of integers, bools or addresses
    Array(Box<ArgKind>),
}

impl ArgKind {
    pub fn from_param_type(kind: &ParamType) -> DeployResult<Self> {
        let arg_kind = match kind {
            ParamType::Uint(bits) => ArgKind::Uint(*bits),
            ParamType::Int(bits) => ArgKind::Int(*bits),
            ParamType::Bool => ArgKind::Bool,
            ParamType::Address => ArgKind::Address,
            ParamType::FixedBytes(size) => ArgKind::FixedBytes(*size),
            ParamType::Bytes => ArgKind::Bytes,
            ParamType::String => ArgKind::String,
            ParamType::Array(inner) => match inner.as_ref() {
                ParamType::Uint(_) | ParamType::Int(_) | ParamType::Bool | ParamType::Address => {
                    ArgKind::Array(Box::new(Self::from_param_type(inner)?))
                }
                _ => return Err(DeployError::UnsupportedType(kind.to_string())),
            },
            _ => return Err(DeployError::UnsupportedType(kind.to_string())),
        };
        Ok(arg_kind)
    }

    /// Parse `arg` into a token of this kind
    pub fn parse(&self, arg: &str) -> DeployResult<Token> {
        match self {
            ArgKind::Uint(bits) => parse_uint(arg, *bits).map(Token::Uint),
            ArgKind::Int(bits) => parse_int(arg, *bits).map(|value| Token::Int(value.into_raw())),
            ArgKind::Bool => parse_bool(arg).map(Token::Bool),
            ArgKind::Address => parse_address(arg).map(Token::Address),
            ArgKind::FixedBytes(size) => {
                let bytes = parse_hex(arg, self)?;
                if bytes.len() > *size {
                    return Err(invalid(
                        arg,
                        self,
                        format!("expected at most {} bytes, got {}", size, bytes.len()),
                    ));
                }
                Ok(Token::FixedBytes(bytes))
            }
            ArgKind::Bytes => parse_hex(arg, self).map(Token::Bytes),
            ArgKind::String => Ok(Token::String(arg.to_string())),
            ArgKind::Array(inner) => {
                if arg.is_empty() {
                    return Ok(Token::Array(Vec::new()));
                }
                arg.split(',')
                    .map(|item| inner.parse(item.trim()))
                    .collect::<DeployResult<Vec<_>>>()
                    .map(Token::Array)
            }
        }
    }
}

impl std::fmt::Display for ArgKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgKind::Uint(bits) => write!(f, "uint{}", bits),
            ArgKind::Int(bits) => write!(f, "int{}", bits),
            ArgKind::Bool => write!(f, "bool"),
            ArgKind::Address => write!(f, "address"),
            ArgKind::FixedBytes(size) => write!(f, "bytes{}", size),
            ArgKind::Bytes => write!(f, "bytes"),
            ArgKind::String => write!(f, "string"),
            ArgKind::Array(inner) => write!(f, "{}[]", inner),
        }
    }
}

/// Parse a single argument for a parameter of type `kind`
pub fn parse_arg(arg: &str, kind: &ParamType) -> DeployResult<Token> {
    ArgKind::from_param_type(kind)?.parse(arg)
}

/// Parse the arguments for a list of ABI inputs, which must match in count
pub fn parse_args(args: &[String], inputs: &[Param]) -> DeployResult<Vec<Token>> {
    if args.len() != inputs.len() {
        return Err(DeployError::Usage(format!(
            "Expected {} argument(s), but got {}",
            inputs.len(),
            args.len()
        )));
    }
    args.iter()
        .zip(inputs)
        .map(|(arg, input)| parse_arg(arg, &input.kind))
        .collect()
}

/// Parse a `0x` prefixed address, rejecting mixed case that is not a valid checksum
pub fn parse_address(value: &str) -> DeployResult<Address> {
    if !ADDRESS_PATTERN.is_match(value) {
        return Err(DeployError::InvalidAddress(value.to_string()));
    }
    let address: Address = value
        .parse()
        .map_err(|_| DeployError::InvalidAddress(value.to_string()))?;

    let digits = &value[2..];
    let mixed_case = digits.chars().any(|c| c.is_ascii_uppercase())
        && digits.chars().any(|c| c.is_ascii_lowercase());
    if mixed_case && to_checksum(&address, None) != value {
        return Err(DeployError::InvalidAddress(value.to_string()));
    }

    Ok(address)
}

/// Validate an address and return it in checksum format
pub fn validate_and_format_address(value: &str) -> DeployResult<String> {
    parse_address(value).map(|address| to_checksum(&address, None))
}

/// Reject input that has no digits, which `from_dec_str` would read as zero
fn ensure_digits(arg: &str, kind: &ArgKind) -> DeployResult<()> {
    let digits = arg.strip_prefix('-').unwrap_or(arg);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(arg, kind, "expected a decimal integer".to_string()));
    }
    Ok(())
}

fn parse_uint(arg: &str, bits: usize) -> DeployResult<U256> {
    let kind = ArgKind::Uint(bits);
    ensure_digits(arg, &kind)?;
    let value = U256::from_dec_str(arg).map_err(|e| invalid(arg, &kind, e.to_string()))?;
    if value.bits() > bits {
        return Err(invalid(arg, &kind, "value out of range".to_string()));
    }
    Ok(value)
}

fn parse_int(arg: &str, bits: usize) -> DeployResult<I256> {
    let kind = ArgKind::Int(bits);
    ensure_digits(arg, &kind)?;
    let value = I256::from_dec_str(arg).map_err(|e| invalid(arg, &kind, e.to_string()))?;
    if bits < 256 {
        let limit = U256::one() << (bits - 1);
        let magnitude = value.unsigned_abs();
        let in_range = if value.is_negative() {
            magnitude <= limit
        } else {
            magnitude < limit
        };
        if !in_range {
            return Err(invalid(arg, &kind, "value out of range".to_string()));
        }
    }
    Ok(value)
}

fn parse_bool(arg: &str) -> DeployResult<bool> {
    match arg.to_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(invalid(
            arg,
            &ArgKind::Bool,
            "expected true or false".to_string(),
        )),
    }
}

fn parse_hex(arg: &str, kind: &ArgKind) -> DeployResult<Vec<u8>> {
    let digits = arg.strip_prefix("0x").unwrap_or(arg);
    hex::decode(digits).map_err(|e| invalid(arg, kind, e.to_string()))
}

fn invalid(arg: &str, kind: &ArgKind, message: String) -> DeployError {
    DeployError::InvalidArgument {
        arg: arg.to_string(),
        kind: kind.to_string(),
        message,
    }
}
