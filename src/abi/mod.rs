//! Contract ABI helpers: function lookup, argument parsing and result display

mod args;

pub use args::{parse_address, parse_arg, parse_args, validate_and_format_address, ArgKind};

use crate::error::{DeployError, DeployResult};

use ethers::abi::{Abi, Function, Token};
use ethers::types::I256;
use ethers::utils::to_checksum;

/// Find the one function called `name` that takes `arg_count` arguments
pub fn find_matching_function<'a>(
    abi: &'a Abi,
    name: &str,
    arg_count: usize,
) -> DeployResult<&'a Function> {
    let candidates: Vec<&Function> = abi
        .functions_by_name(name)
        .map(|functions| {
            functions
                .iter()
                .filter(|function| function.inputs.len() == arg_count)
                .collect()
        })
        .unwrap_or_default();

    match candidates.as_slice() {
        [function] => Ok(*function),
        [] => Err(DeployError::NoMatchingFunction {
            name: name.to_string(),
            arg_count,
        }),
        _ => Err(DeployError::AmbiguousFunction {
            name: name.to_string(),
            arg_count,
        }),
    }
}

/// Parse command line arguments into the tokens `function` takes
pub fn parse_args_for_function(args: &[String], function: &Function) -> DeployResult<Vec<Token>> {
    parse_args(args, &function.inputs)
}

/// Parse command line arguments into constructor tokens
///
/// A contract without constructor takes no arguments.
pub fn parse_args_for_constructor(args: &[String], abi: &Abi) -> DeployResult<Vec<Token>> {
    match abi.constructor() {
        Some(constructor) => parse_args(args, &constructor.inputs),
        None => parse_args(args, &[]),
    }
}

/// Render decoded return values, a single value bare and several as a list
pub fn format_tokens(tokens: &[Token]) -> String {
    match tokens {
        [token] => format_token(token),
        tokens => format!("[{}]", join(tokens)),
    }
}

pub fn format_token(token: &Token) -> String {
    match token {
        Token::Address(address) => to_checksum(address, None),
        Token::FixedBytes(bytes) | Token::Bytes(bytes) => format!("0x{}", hex::encode(bytes)),
        Token::Int(raw) => I256::from_raw(*raw).to_string(),
        Token::Uint(value) => value.to_string(),
        Token::Bool(value) => value.to_string(),
        Token::String(value) => value.clone(),
        Token::FixedArray(tokens) | Token::Array(tokens) => format!("[{}]", join(tokens)),
        Token::Tuple(tokens) => format!("({})", join(tokens)),
    }
}

fn join(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(format_token)
        .collect::<Vec<_>>()
        .join(", ")
}
