//! Signing session state and caller-facing observer interface

mod coordinator;

pub use coordinator::{Coordinator, SignOptions};

use crate::error::Error;
use crate::types::{
    CopayerSignStatus, RoundPhase, SigningProgress, SigningStatus, ThresholdKey,
    TransactionProposal, Wallet,
};
use std::collections::HashMap;
use std::time::Duration;

/// Default whole-session timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Round count of the underlying scheme, reported for progress display only
pub const TOTAL_ROUNDS: u32 = 4;

/// Relay poll interval for event subscriptions
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Key-share derivation path used for signing; protocol-internal, not a
/// wallet BIP-44 path.
pub const DERIVATION_PATH: &str = "m/0/0";

/// Derive the session identifier for a proposal.
///
/// Deterministic in the proposal id alone, so every co-signer independently
/// computes the same rendezvous point without an out-of-band handshake.
pub fn derive_session_id(txp: &TransactionProposal) -> String {
    format!("sign-{}", txp.id)
}

/// True if this wallet's proposals must go through threshold signing
pub fn requires_threshold_signing(wallet: &Wallet, key: &ThresholdKey) -> bool {
    key.is_threshold_eligible() && wallet.threshold_key_id.is_some()
}

/// Observer for session progress. All methods default to no-ops; callers
/// implement only what they display.
pub trait SigningObserver: Send + Sync {
    fn on_status_change(&self, _status: SigningStatus) {}
    fn on_progress_update(&self, _progress: SigningProgress) {}
    fn on_copayer_status_change(&self, _copayer_id: &str, _status: CopayerSignStatus) {}
    fn on_round_update(&self, _round: u32, _phase: RoundPhase) {}
    fn on_error(&self, _error: &Error) {}
    fn on_complete(&self, _signature: &str) {}
}

/// Observer that ignores every notification
pub struct NoopObserver;

impl SigningObserver for NoopObserver {}

/// State of one signing session run
pub struct SigningSession {
    /// Deterministic rendezvous identifier
    pub session_id: String,
    /// Digest the signature covers, fixed for the session's lifetime
    pub message_hash: Vec<u8>,
    /// Key-share path for this session
    pub derivation_path: String,
    /// Current status
    pub status: SigningStatus,
    /// Highest round seen
    pub round: u32,
    /// Co-signer participation, keyed by copayer id; display only
    pub copayers: HashMap<String, bool>,
}

impl SigningSession {
    pub(crate) fn new(session_id: String, message_hash: Vec<u8>) -> Self {
        Self {
            session_id,
            message_hash,
            derivation_path: DERIVATION_PATH.to_string(),
            status: SigningStatus::Initializing,
            round: 0,
            copayers: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Keychain, Provisioning, ShareBlob, TxPayload};

    fn txp(id: &str) -> TransactionProposal {
        TransactionProposal {
            id: id.into(),
            chain: "sol".into(),
            payload: TxPayload::Raw(vec![1]),
            signatures: vec![],
            status: None,
        }
    }

    #[test]
    fn session_id_depends_only_on_proposal_id() {
        let a = derive_session_id(&txp("abc123"));
        let b = derive_session_id(&txp("abc123"));
        assert_eq!(a, b);
        assert_eq!(a, "sign-abc123");

        let other = derive_session_id(&txp("def456"));
        assert_ne!(a, other);
    }

    #[test]
    fn requires_threshold_signing_needs_eligible_key_and_linked_wallet() {
        let key = ThresholdKey {
            id: "k1".into(),
            total_parties: 2,
            provisioning: Provisioning::Complete,
            keychain: Keychain {
                private_key_share: ShareBlob::Raw(vec![1; 32]),
                reduced_private_key_share: ShareBlob::Raw(vec![2; 32]),
            },
        };

        let mut wallet = Wallet {
            id: "w1".into(),
            threshold_key_id: Some("k1".into()),
            copayer_id: "c1".into(),
        };
        assert!(requires_threshold_signing(&wallet, &key));

        wallet.threshold_key_id = None;
        assert!(!requires_threshold_signing(&wallet, &key));
    }
}
