//! Holder of the gateway's signing key

use super::assembler::UnsignedTransaction;
use crate::error::{GatewayError, GatewayResult};

use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, Signature, H256};
use std::fmt;

/// A transaction with its signature and canonical encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    tx: UnsignedTransaction,
    signature: Signature,
    raw: Bytes,
    hash: H256,
}

impl SignedTransaction {
    pub fn transaction(&self) -> &UnsignedTransaction {
        &self.tx
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// EIP-2718 envelope ready for `eth_sendRawTransaction`
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    pub fn hash(&self) -> H256 {
        self.hash
    }
}

/// Owns the private key; only ever hands out signatures
///
/// Neither `Debug` nor any serialization exposes the key.
pub struct TxSigner {
    wallet: LocalWallet,
}

impl TxSigner {
    /// Parse a hex-encoded secp256k1 key, with or without `0x`
    pub fn from_hex(key: &str) -> GatewayResult<Self> {
        let key = key.trim();
        let key = key.strip_prefix("0x").unwrap_or(key);

        let bytes = hex::decode(key)
            .map_err(|_| GatewayError::Wallet("private key is not valid hex".to_string()))?;

        if bytes.len() != 32 {
            return Err(GatewayError::Wallet(format!(
                "private key must be 32 bytes, got {}",
                bytes.len()
            )));
        }

        let wallet = LocalWallet::from_bytes(&bytes)
            .map_err(|_| GatewayError::Wallet("invalid secp256k1 private key".to_string()))?;

        Ok(Self { wallet })
    }

    /// Load the key from the environment variable `var`
    pub fn from_env(var: &str) -> GatewayResult<Self> {
        let key = std::env::var(var).map_err(|_| {
            GatewayError::Wallet(format!("No signing key configured. Set {}", var))
        })?;
        Self::from_hex(&key)
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Sign `tx` for its chain
    pub fn sign(&self, tx: UnsignedTransaction) -> GatewayResult<SignedTransaction> {
        if tx.from != self.address() {
            return Err(GatewayError::Wallet(format!(
                "transaction sender {:?} does not match signing account {:?}",
                tx.from,
                self.address()
            )));
        }

        let typed = tx.to_typed();
        let signature = self
            .wallet
            .sign_transaction_sync(&typed)
            .map_err(|e| GatewayError::Wallet(format!("Failed to sign transaction: {}", e)))?;

        let raw = typed.rlp_signed(&signature);
        let hash = typed.hash(&signature);

        Ok(SignedTransaction {
            tx,
            signature,
            raw,
            hash,
        })
    }
}

impl fmt::Debug for TxSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxSigner")
            .field("address", &self.address())
            .field("key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U256;

    // Well-known development key (hardhat/anvil account #0)
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn dev_address() -> Address {
        "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap()
    }

    fn unsigned(from: Address) -> UnsignedTransaction {
        UnsignedTransaction {
            chain_id: 31337,
            from,
            to: Address::repeat_byte(0xcc),
            data: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]),
            gas_limit: 500_000,
            max_fee_per_gas: U256::from(70_000_000_000u64),
            max_priority_fee_per_gas: U256::from(1_000_000_000u64),
            nonce: 3,
        }
    }

    #[test]
    fn test_key_parsing() {
        let signer = TxSigner::from_hex(DEV_KEY).unwrap();
        assert_eq!(signer.address(), dev_address());

        let bare = TxSigner::from_hex(DEV_KEY.trim_start_matches("0x")).unwrap();
        assert_eq!(bare.address(), dev_address());

        assert!(matches!(
            TxSigner::from_hex("not-hex"),
            Err(GatewayError::Wallet(_))
        ));
        assert!(matches!(
            TxSigner::from_hex("0x00"),
            Err(GatewayError::Wallet(_))
        ));
    }

    #[test]
    fn test_wrong_key_length_is_wallet_error() {
        let overlong = format!("{}00", DEV_KEY);
        for key in [&DEV_KEY[..DEV_KEY.len() - 2], "0x00", overlong.as_str()] {
            let err = TxSigner::from_hex(key).unwrap_err();
            assert!(matches!(err, GatewayError::Wallet(ref m) if m.contains("32 bytes")));
        }
    }

    #[test]
    fn test_debug_redacts_key() {
        let signer = TxSigner::from_hex(DEV_KEY).unwrap();
        let debug = format!("{:?}", signer);
        assert!(debug.contains("redacted"));
        assert!(!debug.contains(&DEV_KEY[2..]));
    }

    #[test]
    fn test_signature_recovers_sender() {
        let signer = TxSigner::from_hex(DEV_KEY).unwrap();
        let tx = unsigned(signer.address());
        let sighash = tx.to_typed().sighash();

        let signed = signer.sign(tx).unwrap();
        assert_eq!(signed.signature().recover(sighash).unwrap(), dev_address());
        assert_eq!(signed.hash(), H256::from(ethers::utils::keccak256(signed.raw())));
        // EIP-1559 envelope type
        assert_eq!(signed.raw()[0], 0x02);
    }

    #[test]
    fn test_signing_is_deterministic() {
        let signer = TxSigner::from_hex(DEV_KEY).unwrap();
        let a = signer.sign(unsigned(signer.address())).unwrap();
        let b = signer.sign(unsigned(signer.address())).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_foreign_sender_rejected() {
        let signer = TxSigner::from_hex(DEV_KEY).unwrap();
        let err = signer.sign(unsigned(Address::repeat_byte(0x42))).unwrap_err();
        assert!(matches!(err, GatewayError::Wallet(_)));
    }
}
