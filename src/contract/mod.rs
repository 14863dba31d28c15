//! Contract interface descriptor and call encoding
//!
//! The gateway talks to a single deployed Crowdfunding contract. Its published
//! method table drives both transaction payloads and read-only dashboard calls.

mod reader;

pub use reader::CampaignReader;

use crate::error::{GatewayError, GatewayResult};

use anyhow::Context;
use ethers::abi::{Abi, Function, ParamType, Token};
use ethers::types::{Address, Bytes};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Method creating a campaign on the deployed contract
pub const CREATE_PROJECT_METHOD: &str = "requestProjectCreation";

/// Read-only method listing deployed campaigns
pub const LIST_PROJECTS_METHOD: &str = "returnAllProjects";

/// Interface used when no artifact is configured
const BUILTIN_INTERFACE: &[&str] = &[
    "function requestProjectCreation(uint256 fundingTarget, uint256 minimumContribution, string title, string description)",
    "function returnAllProjects() view returns (address[])",
];

/// Encoded call data and the contract it targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCallPayload {
    to: Address,
    data: Bytes,
}

impl ContractCallPayload {
    pub fn to(&self) -> Address {
        self.to
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// 4-byte method selector
    pub fn selector(&self) -> &[u8] {
        &self.data[..4]
    }
}

/// Published method table of the deployed contract
#[derive(Debug, Clone)]
pub struct ContractInterface {
    address: Address,
    abi: Abi,
}

impl ContractInterface {
    pub fn new(address: Address, abi: Abi) -> Self {
        Self { address, abi }
    }

    /// The Crowdfunding interface compiled into the gateway
    pub fn builtin(address: Address) -> Self {
        // The literals above are known-good human readable signatures
        let abi = ethers::abi::parse_abi(BUILTIN_INTERFACE)
            .expect("built-in Crowdfunding interface must parse");
        Self::new(address, abi)
    }

    /// Load a Hardhat artifact (`{"abi": [...]}`) or a bare ABI array
    pub fn from_file(address: Address, path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read contract ABI: {:?}", path))?;
        Self::from_json(address, &raw).with_context(|| format!("Invalid contract ABI: {:?}", path))
    }

    pub fn from_json(address: Address, raw: &str) -> anyhow::Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        let abi_value = match value {
            Value::Object(mut artifact) => artifact
                .remove("abi")
                .ok_or_else(|| anyhow::anyhow!("artifact has no `abi` field"))?,
            array @ Value::Array(_) => array,
            _ => anyhow::bail!("expected an ABI array or an artifact object"),
        };

        let abi: Abi = serde_json::from_value(abi_value)?;
        debug!("Loaded contract interface with {} functions", abi.functions.len());

        Ok(Self::new(address, abi))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Encode a call to `method` with `args`
    ///
    /// Overloads are tried in declaration order; the first whose parameter
    /// list matches `args` wins.
    pub fn encode_call(&self, method: &str, args: &[Token]) -> GatewayResult<ContractCallPayload> {
        let function = self.resolve(method, args)?;

        let data = function.encode_input(args).map_err(|e| {
            GatewayError::SignatureMismatch(format!("{}: {}", describe(function), e))
        })?;

        Ok(ContractCallPayload {
            to: self.address,
            data: Bytes::from(data),
        })
    }

    /// Decode the return data of a read-only call to `method`
    pub fn decode_output(&self, method: &str, output: &[u8]) -> GatewayResult<Vec<Token>> {
        let function = self.abi.function(method).map_err(|_| {
            GatewayError::SignatureMismatch(format!("unknown contract method `{}`", method))
        })?;
        function.decode_output(output).map_err(|e| {
            GatewayError::SignatureMismatch(format!(
                "cannot decode output of {}: {}",
                describe(function),
                e
            ))
        })
    }

    fn resolve(&self, method: &str, args: &[Token]) -> GatewayResult<&Function> {
        let overloads = self.abi.functions_by_name(method).map_err(|_| {
            GatewayError::SignatureMismatch(format!("unknown contract method `{}`", method))
        })?;

        overloads
            .iter()
            .find(|f| {
                let types: Vec<ParamType> = f.inputs.iter().map(|p| p.kind.clone()).collect();
                Token::types_check(args, &types)
            })
            .ok_or_else(|| {
                let expected: Vec<String> = overloads.iter().map(describe).collect();
                GatewayError::SignatureMismatch(format!(
                    "arguments for `{}` match none of: {}",
                    method,
                    expected.join(", ")
                ))
            })
    }
}

/// `name(type,type)` form of a function signature
fn describe(function: &Function) -> String {
    let params: Vec<String> = function.inputs.iter().map(|p| p.kind.to_string()).collect();
    format!("{}({})", function.name, params.join(","))
}
