//! Core types for threshold signing

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Chains with an input/output transaction model signed per-input
pub const UTXO_CHAINS: &[&str] = &["btc", "bch", "ltc", "doge"];

/// Account-based chains with a single global transaction serialization
pub const EVM_CHAINS: &[&str] = &["eth", "matic", "arb", "base", "op"];

/// Chains signed over a generic digest of the serialized transaction
pub const GENERIC_CHAINS: &[&str] = &["sol", "xrp"];

/// Transaction-model family of a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainFamily {
    /// Input/output model, script-based signing
    Utxo,
    /// Account model, Keccak-256 over the serialized transaction
    Evm,
    /// Fallback: SHA-256 over the serialized transaction
    Generic,
}

impl ChainFamily {
    /// Classify a chain identifier, lowercased
    pub fn of(chain: &str) -> Option<ChainFamily> {
        let chain = chain.to_lowercase();
        if UTXO_CHAINS.contains(&chain.as_str()) {
            Some(ChainFamily::Utxo)
        } else if EVM_CHAINS.contains(&chain.as_str()) {
            Some(ChainFamily::Evm)
        } else if GENERIC_CHAINS.contains(&chain.as_str()) {
            Some(ChainFamily::Generic)
        } else {
            None
        }
    }
}

/// Provisioning state of a threshold key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provisioning {
    Pending,
    Complete,
    Failed,
}

/// One key-share field as it may arrive from storage.
///
/// Generic serializers wrap raw byte buffers in a `{ "data": [..] }` object;
/// the signing routines need the raw bytes. `restore` collapses the wrapped
/// form into `Raw` and is a no-op on already-raw material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
#[serde(untagged)]
pub enum ShareBlob {
    /// Raw binary share material
    Raw(Vec<u8>),
    /// Language-native serialized wrapper around the same bytes
    Wrapped { data: Vec<u8> },
}

impl ShareBlob {
    /// Raw byte view regardless of representation
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ShareBlob::Raw(bytes) => bytes,
            ShareBlob::Wrapped { data } => data,
        }
    }

    /// True if already in the raw-binary form the signer requires
    pub fn is_raw(&self) -> bool {
        matches!(self, ShareBlob::Raw(_))
    }
}

/// Key-share material held by one party.
///
/// Borrowed by the coordinator for the duration of a session, never copied
/// into long-lived state. Zeroized on drop.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Keychain {
    /// This party's private key share
    pub private_key_share: ShareBlob,
    /// Reduced share used during signature generation
    pub reduced_private_key_share: ShareBlob,
}

/// A wallet key whose signing authority is split across `total_parties` parties
#[derive(Clone, Serialize, Deserialize)]
pub struct ThresholdKey {
    /// Key identifier
    pub id: String,
    /// Total number of parties holding shares
    pub total_parties: usize,
    /// Provisioning ceremony status
    pub provisioning: Provisioning,
    /// Share material for this party
    pub keychain: Keychain,
}

impl ThresholdKey {
    /// A key is threshold-eligible only when provisioning completed and the
    /// key is actually split across more than one party.
    pub fn is_threshold_eligible(&self) -> bool {
        self.provisioning == Provisioning::Complete && self.total_parties > 1
    }
}

/// Wallet context for a signing session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    /// Wallet identifier
    pub id: String,
    /// Threshold key backing this wallet, if any
    pub threshold_key_id: Option<String>,
    /// This party's copayer identifier
    pub copayer_id: String,
}

/// One input of a UTXO-family transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtxoInput {
    /// Previous transaction id (32 bytes, big-endian display order)
    pub prev_txid: String,
    /// Output index in the previous transaction
    pub vout: u32,
    /// Locking script of the spent output, hex
    pub script_pub_key: String,
    /// Input sequence number
    #[serde(default = "default_sequence")]
    pub sequence: u32,
}

fn default_sequence() -> u32 {
    0xFFFF_FFFF
}

/// One output of a UTXO-family transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtxoOutput {
    /// Value in satoshis
    pub value: u64,
    /// Locking script, hex
    pub script: String,
}

/// UTXO-family transaction payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtxoTx {
    #[serde(default = "default_version")]
    pub version: u32,
    pub inputs: Vec<UtxoInput>,
    pub outputs: Vec<UtxoOutput>,
    #[serde(default)]
    pub locktime: u32,
}

fn default_version() -> u32 {
    1
}

/// Unsigned EVM-family legacy transaction payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmTx {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    /// Recipient address, hex (empty for contract creation)
    #[serde(default)]
    pub to: String,
    pub value: u128,
    /// Call data, hex
    #[serde(default)]
    pub data: String,
    pub chain_id: u64,
}

/// Chain-specific payload of a transaction proposal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxPayload {
    Utxo(UtxoTx),
    Evm(EvmTx),
    /// Pre-serialized transaction bytes for generic-family chains
    Raw(Vec<u8>),
}

/// A pending transaction proposal awaiting signature.
///
/// Immutable once handed to the coordinator; only the wallet service attaches
/// the final signature on push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionProposal {
    /// Proposal identifier
    pub id: String,
    /// Chain identifier, e.g. "btc" or "eth"
    pub chain: String,
    /// Chain-specific payload
    pub payload: TxPayload,
    /// Signatures attached by the wallet service
    #[serde(default)]
    pub signatures: Vec<String>,
    /// Proposal status as reported by the wallet service
    #[serde(default)]
    pub status: Option<String>,
}

/// Raw protocol output before format conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSignature {
    /// Opaque hex-encoded signature, with or without 0x prefix
    Hex(String),
    /// ECDSA components; r and s are hex strings, v a recovery id
    Components { r: String, s: String, v: u64 },
}

/// Session status reported to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningStatus {
    Initializing,
    WaitingForCosigners,
    SignatureGeneration,
    Broadcasting,
    Complete,
    Error,
}

/// Phase of one protocol round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Ready,
    Processed,
    Submitted,
}

/// Progress snapshot for display purposes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningProgress {
    pub current_round: u32,
    pub total_rounds: u32,
    pub status: &'static str,
}

/// Co-signer participation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopayerSignStatus {
    Joined,
    Signed,
}
