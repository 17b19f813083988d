//! # TSS Core
//!
//! Coordinates threshold (TSS) signing sessions for wallet transaction
//! proposals. A key whose private key is split into `n` shares across
//! independent parties cooperates through an external relay to produce a
//! signature; no party ever reconstructs the full key.
//!
//! The crate covers:
//! - chain-correct message-hash derivation for a proposal
//! - key-share normalization into the raw form the signer requires
//! - the round-based session coordinator with timeout enforcement
//! - conversion of raw protocol output into the canonical signature encoding
//!
//! ## Example
//!
//! ```rust,ignore
//! use tss_core::{Coordinator, NoopObserver, SignOptions};
//!
//! let coordinator = Coordinator::new(transport, wallet_service);
//! let signed = coordinator
//!     .sign(&key, &wallet, &txp, &NoopObserver, SignOptions::default())
//!     .await?;
//! ```

pub mod error;
pub mod hash;
pub mod keyshare;
pub mod session;
pub mod signature;
pub mod transport;
pub mod types;

pub use error::{Error, Result};
pub use session::{
    derive_session_id, requires_threshold_signing, Coordinator, NoopObserver, SignOptions,
    SigningObserver, SigningSession, DEFAULT_TIMEOUT, DERIVATION_PATH, TOTAL_ROUNDS,
};
pub use types::{
    RawSignature, SigningStatus, ThresholdKey, TransactionProposal, TxPayload, Wallet,
};

/// Protocol client version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
