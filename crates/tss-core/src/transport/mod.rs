//! Transport boundary for signing sessions
//!
//! The wallet coordination service relays protocol messages between
//! co-signers; this crate only consumes it through the traits below. The
//! event stream is the authoritative completion path for a session.

use crate::error::Result;
use crate::types::{RawSignature, TransactionProposal};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

pub use ::async_trait::async_trait;

/// Parameters for opening a signing session against the relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSessionRequest {
    /// Deterministic session identifier shared by all co-signers
    pub session_id: String,
    /// Digest the signature must cover
    pub message_hash: Vec<u8>,
    /// Protocol-internal key-share path (not a wallet BIP-44 path)
    pub derivation_path: String,
}

/// Subscription parameters
#[derive(Debug, Clone, Copy)]
pub struct SubscribeOptions {
    /// Relay poll interval
    pub poll_interval: Duration,
}

/// Events delivered over a session's subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    RoundReady { round: u32 },
    RoundProcessed { round: u32 },
    RoundSubmitted { round: u32 },
    CopayerJoined { copayer_id: String },
    CopayerSigned { copayer_id: String },
    /// Terminal: the protocol produced a signature
    Signature { signature: RawSignature },
    /// Informational completion marker from the relay
    Complete,
    /// Terminal: protocol failure relayed by the transport
    Error { message: String },
}

/// Wallet coordination transport for one signing session
#[async_trait]
pub trait SigningTransport: Send + Sync {
    /// Open the session on the relay. A failure here is advisory; the remote
    /// side may still be negotiating with other parties.
    async fn open_session(&self, request: &OpenSessionRequest) -> Result<()>;

    /// Subscribe to the session's event stream
    async fn subscribe(&self, opts: SubscribeOptions) -> Result<mpsc::Receiver<SessionEvent>>;

    /// Tear down the subscription
    async fn unsubscribe(&self) -> Result<()>;
}

/// Wallet service signature push
#[async_trait]
pub trait WalletService: Send + Sync {
    /// Push a canonical signature for broadcast; returns the signed proposal
    async fn push_signature(
        &self,
        txp: &TransactionProposal,
        signatures: &[String],
    ) -> Result<TransactionProposal>;
}

/// In-memory transport for testing
pub mod memory;

pub use memory::{MemoryTransport, MemoryWalletService};
