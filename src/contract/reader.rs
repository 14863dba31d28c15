//! Read-only contract queries backing the campaign dashboard

use super::{ContractInterface, LIST_PROJECTS_METHOD};
use crate::chain::NetworkClient;
use crate::error::GatewayResult;

use ethers::abi::Token;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::TransactionRequest;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub struct CampaignReader {
    network: Arc<dyn NetworkClient>,
    contract: ContractInterface,
}

impl CampaignReader {
    pub fn new(network: Arc<dyn NetworkClient>, contract: ContractInterface) -> Self {
        Self { network, contract }
    }

    /// All deployed projects, flattened to JSON values
    pub async fn list_projects(&self) -> GatewayResult<Vec<Value>> {
        let payload = self.contract.encode_call(LIST_PROJECTS_METHOD, &[])?;
        let call = TypedTransaction::Legacy(
            TransactionRequest::new()
                .to(payload.to())
                .data(payload.data().clone()),
        );

        let output = self.network.call(call).await?;
        let tokens = self.contract.decode_output(LIST_PROJECTS_METHOD, &output)?;

        let projects: Vec<Value> = tokens
            .into_iter()
            .flat_map(|token| match token {
                Token::Array(items) | Token::FixedArray(items) => items,
                other => vec![other],
            })
            .map(token_to_json)
            .collect();

        debug!("Fetched {} deployed projects", projects.len());
        Ok(projects)
    }
}

fn token_to_json(token: Token) -> Value {
    match token {
        Token::Address(address) => Value::String(format!("{:?}", address)),
        Token::Uint(value) | Token::Int(value) => Value::String(value.to_string()),
        Token::Bool(flag) => Value::Bool(flag),
        Token::String(text) => Value::String(text),
        Token::Bytes(bytes) | Token::FixedBytes(bytes) => {
            Value::String(format!("0x{}", hex::encode(bytes)))
        }
        Token::Array(items) | Token::FixedArray(items) | Token::Tuple(items) => {
            Value::Array(items.into_iter().map(token_to_json).collect())
        }
    }
}
