//! Minimal RLP encoding for unsigned EVM transactions
//!
//! Covers exactly what the EIP-155 signing preimage needs: byte strings,
//! unsigned integers in minimal big-endian form, and flat lists.

use crate::error::{Error, Result};
use crate::types::EvmTx;
use tiny_keccak::{Hasher, Keccak};

/// One RLP-encodable item
pub enum Item {
    Bytes(Vec<u8>),
    List(Vec<Item>),
}

impl Item {
    /// Minimal big-endian integer encoding (zero encodes as the empty string)
    pub fn uint(value: u128) -> Item {
        let bytes = value.to_be_bytes();
        let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
        Item::Bytes(bytes[first..].to_vec())
    }
}

/// RLP-encode an item
pub fn encode(item: &Item) -> Vec<u8> {
    match item {
        Item::Bytes(bytes) => {
            if bytes.len() == 1 && bytes[0] < 0x80 {
                bytes.clone()
            } else {
                let mut out = length_prefix(bytes.len(), 0x80);
                out.extend_from_slice(bytes);
                out
            }
        }
        Item::List(items) => {
            let payload: Vec<u8> = items.iter().flat_map(|i| encode(i)).collect();
            let mut out = length_prefix(payload.len(), 0xc0);
            out.extend_from_slice(&payload);
            out
        }
    }
}

fn length_prefix(len: usize, offset: u8) -> Vec<u8> {
    if len <= 55 {
        vec![offset + len as u8]
    } else {
        let len_bytes = len.to_be_bytes();
        let first = len_bytes.iter().position(|&b| b != 0).unwrap_or(7);
        let mut out = vec![offset + 55 + (len_bytes.len() - first) as u8];
        out.extend_from_slice(&len_bytes[first..]);
        out
    }
}

/// Keccak-256 digest of the EIP-155 signing preimage for a legacy transaction:
/// `rlp([nonce, gas_price, gas_limit, to, value, data, chain_id, 0, 0])`
pub fn eip155_digest(tx: &EvmTx) -> Result<[u8; 32]> {
    let to = decode_hex_field(&tx.to)?;
    let data = decode_hex_field(&tx.data)?;

    let preimage = encode(&Item::List(vec![
        Item::uint(tx.nonce as u128),
        Item::uint(tx.gas_price),
        Item::uint(tx.gas_limit as u128),
        Item::Bytes(to),
        Item::uint(tx.value),
        Item::Bytes(data),
        Item::uint(tx.chain_id as u128),
        Item::uint(0),
        Item::uint(0),
    ]));

    Ok(keccak256(&preimage))
}

/// Keccak-256 of arbitrary bytes
pub fn keccak256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(bytes);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

fn decode_hex_field(field: &str) -> Result<Vec<u8>> {
    let stripped = field.strip_prefix("0x").unwrap_or(field);
    hex::decode(stripped).map_err(|e| Error::Serialization(format!("invalid hex field: {}", e)))
}
