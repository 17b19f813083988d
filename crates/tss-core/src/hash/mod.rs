//! Message hash derivation
//!
//! Derives the exact byte sequence a signing session must cover, branching by
//! chain family: UTXO chains sign the first input's SIGHASH_ALL digest, EVM
//! chains sign the Keccak-256 of the EIP-155 preimage, and generic chains
//! sign a SHA-256 of the serialized transaction.

mod rlp;
mod sighash;

pub use rlp::keccak256;
pub use sighash::sighash_all_first_input;

use crate::error::{Error, Result};
use crate::types::{ChainFamily, TransactionProposal, TxPayload, Wallet};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Derive the digest to sign for a transaction proposal.
///
/// Pure; fails only for unsupported chains or payloads that do not match the
/// chain family.
pub fn build_message_hash(wallet: &Wallet, txp: &TransactionProposal) -> Result<Vec<u8>> {
    let family =
        ChainFamily::of(&txp.chain).ok_or_else(|| Error::UnsupportedChain(txp.chain.clone()))?;

    let digest: Vec<u8> = match (family, &txp.payload) {
        (ChainFamily::Utxo, TxPayload::Utxo(tx)) => sighash_all_first_input(tx)?.to_vec(),
        (ChainFamily::Evm, TxPayload::Evm(tx)) => rlp::eip155_digest(tx)?.to_vec(),
        // EVM proposals may arrive pre-serialized; the digest is still
        // Keccak-256 over the serialized bytes.
        (ChainFamily::Evm, TxPayload::Raw(bytes)) => keccak256(bytes).to_vec(),
        (ChainFamily::Generic, TxPayload::Raw(bytes)) => Sha256::digest(bytes).to_vec(),
        _ => return Err(Error::PayloadMismatch(txp.chain.clone())),
    };

    debug!(
        wallet_id = %wallet.id,
        txp_id = %txp.id,
        chain = %txp.chain,
        hash = %hex::encode(&digest),
        "Message hash derived"
    );

    Ok(digest)
}
