//! Transaction Signing
//!
//! Legacy (EIP-155) transactions signed with a local key. Legacy envelopes
//! are accepted by every chain the keeper targets, including Celo.
//!
//! ⚠️  Never log the private key; only the derived address is printed.

use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, Bytes, TxKind, U256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use eyre::{eyre, Result};
use std::str::FromStr;
use tracing::debug;

/// Fields of one registry transaction, minus the signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyRequest {
    pub nonce: u64,
    pub to: Address,
    pub input: Bytes,
    pub gas_limit: u64,
    pub gas_price: u128,
}

pub struct TxSigner {
    signer: PrivateKeySigner,
    chain_id: u64,
}

impl TxSigner {
    /// Accepts the key with or without `0x`
    pub fn from_key(private_key: &str, chain_id: u64) -> Result<Self> {
        let key = private_key.trim().trim_start_matches("0x");
        let signer = PrivateKeySigner::from_str(key)
            .map_err(|e| eyre!("Failed to parse private key: {}", e))?;
        Ok(Self { signer, chain_id })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Sign and return the raw EIP-2718 encoding ready for `eth_sendRawTransaction`
    pub async fn sign_legacy(&self, request: LegacyRequest) -> Result<Bytes> {
        let tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce: request.nonce,
            gas_price: request.gas_price,
            gas_limit: request.gas_limit,
            to: TxKind::Call(request.to),
            value: U256::ZERO,
            input: request.input,
        };

        let signature = self
            .signer
            .sign_hash(&tx.signature_hash())
            .await
            .map_err(|e| eyre!("Failed to sign transaction: {}", e))?;

        let envelope = TxEnvelope::from(tx.into_signed(signature));

        debug!(
            "Signed legacy transaction: to={:?}, nonce={}, gas_limit={}, gas_price={}",
            request.to, request.nonce, request.gas_limit, request.gas_price
        );

        Ok(Bytes::from(envelope.encoded_2718()))
    }
}
