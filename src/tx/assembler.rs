//! Assembly of unsigned EIP-1559 transactions

use super::gas::GasParameters;
use crate::contract::ContractCallPayload;
use crate::error::{GatewayError, GatewayResult};

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Eip1559TransactionRequest, U256};

/// A complete transaction awaiting signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub chain_id: u64,
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub gas_limit: u64,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub nonce: u64,
}

impl UnsignedTransaction {
    /// Typed form used for signing and RLP encoding
    pub fn to_typed(&self) -> TypedTransaction {
        TypedTransaction::Eip1559(
            Eip1559TransactionRequest::new()
                .chain_id(self.chain_id)
                .from(self.from)
                .to(self.to)
                .data(self.data.clone())
                .value(U256::zero())
                .nonce(self.nonce)
                .gas(self.gas_limit)
                .max_fee_per_gas(self.max_fee_per_gas)
                .max_priority_fee_per_gas(self.max_priority_fee_per_gas),
        )
    }
}

/// Merge the pieces of a contract call into an unsigned transaction
pub fn assemble(
    chain_id: u64,
    from: Address,
    payload: &ContractCallPayload,
    nonce: u64,
    gas: GasParameters,
) -> GatewayResult<UnsignedTransaction> {
    if gas.gas_limit == 0 {
        return Err(GatewayError::InvalidGasParameters(
            "gas limit must be positive".to_string(),
        ));
    }
    if gas.max_fee_per_gas.is_zero() {
        return Err(GatewayError::InvalidGasParameters(
            "max fee per gas must be positive".to_string(),
        ));
    }
    if gas.max_priority_fee_per_gas.is_zero() {
        return Err(GatewayError::InvalidGasParameters(
            "max priority fee per gas must be positive".to_string(),
        ));
    }
    if gas.max_priority_fee_per_gas > gas.max_fee_per_gas {
        return Err(GatewayError::InvalidGasParameters(format!(
            "priority fee {} exceeds max fee {}",
            gas.max_priority_fee_per_gas, gas.max_fee_per_gas
        )));
    }

    Ok(UnsignedTransaction {
        chain_id,
        from,
        to: payload.to(),
        data: payload.data().clone(),
        gas_limit: gas.gas_limit,
        max_fee_per_gas: gas.max_fee_per_gas,
        max_priority_fee_per_gas: gas.max_priority_fee_per_gas,
        nonce,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{ContractInterface, LIST_PROJECTS_METHOD};

    fn payload() -> ContractCallPayload {
        ContractInterface::builtin(Address::repeat_byte(0xcc))
            .encode_call(LIST_PROJECTS_METHOD, &[])
            .unwrap()
    }

    fn gas() -> GasParameters {
        GasParameters {
            gas_limit: 500_000,
            max_fee_per_gas: U256::from(70_000_000_000u64),
            max_priority_fee_per_gas: U256::from(1_000_000_000u64),
        }
    }

    #[test]
    fn test_assemble_copies_fields() {
        let from = Address::repeat_byte(0x01);
        let tx = assemble(31337, from, &payload(), 4, gas()).unwrap();

        assert_eq!(tx.from, from);
        assert_eq!(tx.to, Address::repeat_byte(0xcc));
        assert_eq!(tx.nonce, 4);
        assert_eq!(tx.gas_limit, 500_000);

        let typed = tx.to_typed();
        assert_eq!(typed.nonce(), Some(&U256::from(4)));
        assert_eq!(typed.gas(), Some(&U256::from(500_000)));
        assert_eq!(typed.chain_id().map(|id| id.as_u64()), Some(31337));
    }

    #[test]
    fn test_zero_gas_limit_rejected() {
        let mut gas = gas();
        gas.gas_limit = 0;
        let err = assemble(1, Address::zero(), &payload(), 0, gas).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidGasParameters(_)));
    }

    #[test]
    fn test_zero_fees_rejected() {
        let mut no_fee = gas();
        no_fee.max_fee_per_gas = U256::zero();
        assert!(assemble(1, Address::zero(), &payload(), 0, no_fee).is_err());

        let mut no_tip = gas();
        no_tip.max_priority_fee_per_gas = U256::zero();
        assert!(assemble(1, Address::zero(), &payload(), 0, no_tip).is_err());
    }

    #[test]
    fn test_priority_above_max_fee_rejected() {
        let mut gas = gas();
        gas.max_priority_fee_per_gas = gas.max_fee_per_gas + 1;
        let err = assemble(1, Address::zero(), &payload(), 0, gas).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidGasParameters(_)));
    }
}
