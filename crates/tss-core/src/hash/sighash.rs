//! Legacy UTXO signature hash
//!
//! Serializes the proposal in the legacy Bitcoin transaction format and
//! computes the SIGHASH_ALL digest of the first input: input 0's script is
//! replaced by the locking script of the output it spends, every other input
//! script is emptied, a 4-byte hash-type trailer is appended, and the whole
//! preimage is double-SHA256 hashed.

use crate::error::{Error, Result};
use crate::types::UtxoTx;
use sha2::{Digest, Sha256};

/// SIGHASH_ALL flag
const SIGHASH_ALL: u32 = 0x01;

/// Compute the SIGHASH_ALL digest of the first input.
///
/// One logical digest is produced per proposal; additional inputs contribute
/// their outpoints and sequence numbers but not their scripts.
pub fn sighash_all_first_input(tx: &UtxoTx) -> Result<[u8; 32]> {
    if tx.inputs.is_empty() {
        return Err(Error::Serialization("UTXO proposal has no inputs".into()));
    }

    let mut preimage = Vec::new();
    preimage.extend_from_slice(&tx.version.to_le_bytes());

    write_varint(&mut preimage, tx.inputs.len() as u64);
    for (index, input) in tx.inputs.iter().enumerate() {
        preimage.extend_from_slice(&txid_bytes(&input.prev_txid)?);
        preimage.extend_from_slice(&input.vout.to_le_bytes());

        // Script of the signed input is the spent output's locking script;
        // all other input scripts are emptied.
        let script = if index == 0 {
            decode_script(&input.script_pub_key)?
        } else {
            Vec::new()
        };
        write_varint(&mut preimage, script.len() as u64);
        preimage.extend_from_slice(&script);

        preimage.extend_from_slice(&input.sequence.to_le_bytes());
    }

    write_varint(&mut preimage, tx.outputs.len() as u64);
    for output in &tx.outputs {
        preimage.extend_from_slice(&output.value.to_le_bytes());
        let script = decode_script(&output.script)?;
        write_varint(&mut preimage, script.len() as u64);
        preimage.extend_from_slice(&script);
    }

    preimage.extend_from_slice(&tx.locktime.to_le_bytes());
    preimage.extend_from_slice(&SIGHASH_ALL.to_le_bytes());

    Ok(double_sha256(&preimage))
}

fn double_sha256(bytes: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(bytes);
    Sha256::digest(first).into()
}

/// Bitcoin variable-length integer
fn write_varint(out: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xfc => out.push(value as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// Txids display big-endian; the wire format stores them reversed
fn txid_bytes(txid: &str) -> Result<[u8; 32]> {
    let mut bytes: [u8; 32] = hex::decode(txid)
        .map_err(|e| Error::Serialization(format!("invalid txid hex: {}", e)))?
        .try_into()
        .map_err(|_| Error::Serialization("txid must be 32 bytes".into()))?;
    bytes.reverse();
    Ok(bytes)
}

fn decode_script(script: &str) -> Result<Vec<u8>> {
    hex::decode(script).map_err(|e| Error::Serialization(format!("invalid script hex: {}", e)))
}
