//! Signature format conversion
//!
//! Converts the raw protocol output into the canonical hex encoding the
//! wallet coordination service accepts: for EVM chains a 65-byte
//! `r || s || v` layout, for everything else the hex string as delivered.

use crate::error::{Error, Result};
use crate::types::{ChainFamily, RawSignature};

/// Convert a raw signature into the canonical `0x`-prefixed hex encoding.
///
/// Structured `{r, s, v}` signatures are only defined for EVM-family chains;
/// hex signatures pass through after validation on any chain.
pub fn to_canonical(raw: Option<&RawSignature>, chain: &str) -> Result<String> {
    let raw = raw.ok_or(Error::MissingSignature)?;

    match raw {
        RawSignature::Hex(sig) => canonical_hex(sig),
        RawSignature::Components { r, s, v } => {
            if ChainFamily::of(chain) != Some(ChainFamily::Evm) {
                return Err(Error::UnsupportedChainForStructuredSignature(
                    chain.to_string(),
                ));
            }
            let r = pad_component(r)?;
            let s = pad_component(s)?;
            let v = normalize_recovery_id(*v);
            Ok(format!("0x{}{}{:02x}", r, s, v))
        }
    }
}

/// Validate a hex signature and normalize its `0x` prefix
fn canonical_hex(sig: &str) -> Result<String> {
    let stripped = sig.strip_prefix("0x").unwrap_or(sig);
    if stripped.is_empty() || !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidSignatureEncoding(sig.to_string()));
    }
    Ok(format!("0x{}", stripped))
}

/// Left-pad an r/s component to 32 bytes (64 hex characters)
fn pad_component(component: &str) -> Result<String> {
    if component.is_empty()
        || component.len() > 64
        || !component.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(Error::InvalidSignatureEncoding(component.to_string()));
    }
    Ok(format!("{:0>64}", component.to_lowercase()))
}

/// Map recovery ids 0/1 to the Ethereum 27/28 convention; other values pass
/// through unchanged.
fn normalize_recovery_id(v: u64) -> u64 {
    match v {
        0 => 27,
        1 => 28,
        other => other,
    }
}
