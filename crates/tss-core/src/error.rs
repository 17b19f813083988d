//! Error types for threshold signing operations

use thiserror::Error;

/// Result type alias for threshold signing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while coordinating a threshold signing session
#[derive(Debug, Error)]
pub enum Error {
    /// Key is not eligible for threshold signing
    #[error("Key is not a threshold key (provisioning incomplete or single-party)")]
    NotAThresholdKey,

    /// Wallet does not reference the supplied threshold key
    #[error("Wallet {wallet_id} does not reference threshold key {key_id}")]
    WalletKeyMismatch { wallet_id: String, key_id: String },

    /// Chain is not in the supported set
    #[error("Unsupported chain: {0}")]
    UnsupportedChain(String),

    /// Proposal payload does not match the chain family
    #[error("Payload does not match chain family for {0}")]
    PayloadMismatch(String),

    /// Session ran past its deadline
    #[error("Signing timeout: co-signers did not respond in time")]
    SigningTimeout,

    /// Raw signature could not be converted to the canonical encoding
    #[error("Signature conversion failed: {0}")]
    SignatureConversionFailed(String),

    /// Signature string is not valid hexadecimal
    #[error("Invalid signature encoding: {0}")]
    InvalidSignatureEncoding(String),

    /// No signature was supplied
    #[error("Missing signature")]
    MissingSignature,

    /// Structured {r, s, v} signatures are only defined for EVM chains
    #[error("Structured signature not supported for chain: {0}")]
    UnsupportedChainForStructuredSignature(String),

    /// Downstream signature push failed after a valid signature was obtained
    #[error("Signature push failed: {0}")]
    SignaturePushFailed(String),

    /// Transport-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Protocol error relayed by the transport
    #[error("Signing protocol error: {0}")]
    Protocol(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
