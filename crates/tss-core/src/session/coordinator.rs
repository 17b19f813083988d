//! Signing session coordinator
//!
//! Drives one threshold signing session end-to-end: eligibility check,
//! message-hash derivation, deterministic session rendezvous, round-by-round
//! progress, timeout enforcement, signature conversion, and the final push to
//! the wallet service.

use super::{
    derive_session_id, SigningObserver, SigningSession, DEFAULT_TIMEOUT, POLL_INTERVAL,
    TOTAL_ROUNDS,
};
use crate::error::{Error, Result};
use crate::hash::build_message_hash;
use crate::keyshare;
use crate::signature::to_canonical;
use crate::transport::{
    OpenSessionRequest, SessionEvent, SigningTransport, SubscribeOptions, WalletService,
};
use crate::types::{
    CopayerSignStatus, RawSignature, RoundPhase, SigningProgress, SigningStatus, ThresholdKey,
    TransactionProposal, Wallet,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// Options for one `sign` invocation
#[derive(Debug, Clone, Copy)]
pub struct SignOptions {
    /// Whole-session deadline
    pub timeout: Duration,
    /// Secondary participant: rendezvous on the same session but leave the
    /// signature push to the initiator
    pub as_joiner: bool,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            as_joiner: false,
        }
    }
}

/// Coordinates threshold signing sessions over a transport and wallet service
pub struct Coordinator<T, W> {
    transport: T,
    wallet_service: W,
}

impl<T: SigningTransport, W: WalletService> Coordinator<T, W> {
    pub fn new(transport: T, wallet_service: W) -> Self {
        Self {
            transport,
            wallet_service,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn wallet_service(&self) -> &W {
        &self.wallet_service
    }

    /// Run one signing session to completion or failure.
    ///
    /// Resolves exactly once. Precondition failures reject before any session
    /// resource is created and before any observer notification fires; every
    /// later failure tears down the subscription, notifies `on_error`, and
    /// rejects.
    #[instrument(skip_all, fields(txp_id = %txp.id, chain = %txp.chain))]
    pub async fn sign(
        &self,
        key: &ThresholdKey,
        wallet: &Wallet,
        txp: &TransactionProposal,
        observer: &dyn SigningObserver,
        opts: SignOptions,
    ) -> Result<TransactionProposal> {
        if !key.is_threshold_eligible() {
            return Err(Error::NotAThresholdKey);
        }
        if wallet.threshold_key_id.as_deref() != Some(key.id.as_str()) {
            return Err(Error::WalletKeyMismatch {
                wallet_id: wallet.id.clone(),
                key_id: key.id.clone(),
            });
        }

        match self.run_session(key, wallet, txp, observer, opts).await {
            Ok(signed) => Ok(signed),
            Err(err) => {
                error!(error = %err, "Signing session failed");
                observer.on_error(&err);
                Err(err)
            }
        }
    }

    /// Join a session another participant initiated.
    ///
    /// Identical to `sign` with `as_joiner` set: the deterministic session id
    /// lets this party rendezvous on the same ceremony, and the initiator's
    /// signature push stays authoritative.
    pub async fn join_session(
        &self,
        key: &ThresholdKey,
        wallet: &Wallet,
        txp: &TransactionProposal,
        observer: &dyn SigningObserver,
    ) -> Result<TransactionProposal> {
        debug!(txp_id = %txp.id, "Joining signing session");
        self.sign(
            key,
            wallet,
            txp,
            observer,
            SignOptions {
                as_joiner: true,
                ..SignOptions::default()
            },
        )
        .await
    }

    async fn run_session(
        &self,
        key: &ThresholdKey,
        wallet: &Wallet,
        txp: &TransactionProposal,
        observer: &dyn SigningObserver,
        opts: SignOptions,
    ) -> Result<TransactionProposal> {
        observer.on_status_change(SigningStatus::Initializing);

        // Borrowed for this session only; zeroized when dropped.
        let keychain = keyshare::restore(&key.keychain);
        if keychain.private_key_share.as_bytes().is_empty()
            || keychain.reduced_private_key_share.as_bytes().is_empty()
        {
            return Err(Error::Internal("key share material not available".into()));
        }

        let message_hash = build_message_hash(wallet, txp)?;
        let mut session = SigningSession::new(derive_session_id(txp), message_hash);
        debug!(
            session_id = %session.session_id,
            derivation_path = %session.derivation_path,
            "Session initialized"
        );

        // Subscribe before opening so no event is lost.
        let mut events = self
            .transport
            .subscribe(SubscribeOptions {
                poll_interval: POLL_INTERVAL,
            })
            .await?;

        let result = self
            .drive(&mut events, &mut session, txp, observer, opts)
            .await;

        // Hard invariant: the subscription never outlives the session, and a
        // teardown failure never masks the session's primary outcome.
        if let Err(unsub_err) = self.transport.unsubscribe().await {
            warn!(error = %unsub_err, "Unsubscribe failed after session settled");
        }

        let signed = result?;

        session.status = SigningStatus::Complete;
        info!(
            session_id = %session.session_id,
            rounds = session.round,
            copayers = session.copayers.len(),
            "Signing session complete"
        );
        observer.on_status_change(SigningStatus::Complete);
        Ok(signed)
    }

    /// Session body between subscribe and unsubscribe
    async fn drive(
        &self,
        events: &mut mpsc::Receiver<SessionEvent>,
        session: &mut SigningSession,
        txp: &TransactionProposal,
        observer: &dyn SigningObserver,
        opts: SignOptions,
    ) -> Result<TransactionProposal> {
        let request = OpenSessionRequest {
            session_id: session.session_id.clone(),
            message_hash: session.message_hash.clone(),
            derivation_path: session.derivation_path.clone(),
        };
        if let Err(open_err) = self.transport.open_session(&request).await {
            // The remote relay may still be negotiating with other parties;
            // the event subscription is the authoritative completion path.
            warn!(error = %open_err, "Session open reported an error, continuing");
        }

        session.status = SigningStatus::WaitingForCosigners;
        observer.on_status_change(SigningStatus::WaitingForCosigners);

        let raw = self
            .await_signature(events, session, observer, opts.timeout)
            .await?;
        // Deadline cleared: await_signature owns the timer and has returned.

        let signature = to_canonical(Some(&raw), &txp.chain)
            .map_err(|conv_err| Error::SignatureConversionFailed(conv_err.to_string()))?;

        observer.on_complete(&signature);
        session.status = SigningStatus::Broadcasting;
        observer.on_status_change(SigningStatus::Broadcasting);

        if opts.as_joiner {
            debug!("Joiner session: initiator's signature push is authoritative");
            return Ok(txp.clone());
        }

        self.wallet_service
            .push_signature(txp, &[signature])
            .await
            .map_err(|push_err| Error::SignaturePushFailed(push_err.to_string()))
    }

    /// Await a terminal event under one cancellable deadline.
    ///
    /// The `select!` settles exactly once: either the deadline fires or a
    /// terminal event arrives, never both.
    async fn await_signature(
        &self,
        events: &mut mpsc::Receiver<SessionEvent>,
        session: &mut SigningSession,
        observer: &dyn SigningObserver,
        timeout: Duration,
    ) -> Result<RawSignature> {
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    warn!(session_id = %session.session_id, "Session deadline elapsed");
                    return Err(Error::SigningTimeout);
                }
                event = events.recv() => match event {
                    None => return Err(Error::Transport("event stream closed".into())),
                    Some(SessionEvent::RoundReady { round }) => {
                        debug!(round, "Round ready");
                        session.round = round;
                        observer.on_round_update(round, RoundPhase::Ready);
                        if round == 1 {
                            session.status = SigningStatus::SignatureGeneration;
                            observer.on_status_change(SigningStatus::SignatureGeneration);
                        }
                        observer.on_progress_update(SigningProgress {
                            current_round: round,
                            total_rounds: TOTAL_ROUNDS,
                            status: "processing",
                        });
                    }
                    Some(SessionEvent::RoundProcessed { round }) => {
                        debug!(round, "Round processed");
                        observer.on_round_update(round, RoundPhase::Processed);
                    }
                    Some(SessionEvent::RoundSubmitted { round }) => {
                        debug!(round, "Round submitted");
                        observer.on_round_update(round, RoundPhase::Submitted);
                    }
                    Some(SessionEvent::CopayerJoined { copayer_id }) => {
                        debug!(copayer_id = %copayer_id, "Copayer joined");
                        session.copayers.insert(copayer_id.clone(), false);
                        observer.on_copayer_status_change(&copayer_id, CopayerSignStatus::Joined);
                    }
                    Some(SessionEvent::CopayerSigned { copayer_id }) => {
                        debug!(copayer_id = %copayer_id, "Copayer signed");
                        session.copayers.insert(copayer_id.clone(), true);
                        observer.on_copayer_status_change(&copayer_id, CopayerSignStatus::Signed);
                    }
                    Some(SessionEvent::Signature { signature }) => {
                        debug!("Signature received");
                        return Ok(signature);
                    }
                    Some(SessionEvent::Complete) => {
                        debug!("Relay reported session complete");
                    }
                    Some(SessionEvent::Error { message }) => {
                        return Err(Error::Protocol(message));
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::NoopObserver;
    use crate::transport::{MemoryTransport, MemoryWalletService};
    use crate::types::{Keychain, Provisioning, ShareBlob, TxPayload};
    use std::sync::Mutex;

    fn key(total_parties: usize) -> ThresholdKey {
        ThresholdKey {
            id: "k1".into(),
            total_parties,
            provisioning: Provisioning::Complete,
            keychain: Keychain {
                private_key_share: ShareBlob::Wrapped { data: vec![7; 32] },
                reduced_private_key_share: ShareBlob::Raw(vec![9; 32]),
            },
        }
    }

    fn wallet() -> Wallet {
        Wallet {
            id: "w1".into(),
            threshold_key_id: Some("k1".into()),
            copayer_id: "c1".into(),
        }
    }

    fn txp() -> TransactionProposal {
        TransactionProposal {
            id: "txp-1".into(),
            chain: "sol".into(),
            payload: TxPayload::Raw(b"serialized-tx".to_vec()),
            signatures: vec![],
            status: None,
        }
    }

    fn full_run_events() -> Vec<SessionEvent> {
        let mut events: Vec<SessionEvent> = (1..=4)
            .map(|round| SessionEvent::RoundReady { round })
            .collect();
        events.push(SessionEvent::Signature {
            signature: RawSignature::Hex(format!("0x{}", "11".repeat(65))),
        });
        events
    }

    /// Records every observer notification for assertion
    #[derive(Default)]
    struct Recorder {
        statuses: Mutex<Vec<SigningStatus>>,
        rounds: Mutex<Vec<(u32, RoundPhase)>>,
        progress: Mutex<Vec<SigningProgress>>,
        copayers: Mutex<Vec<(String, CopayerSignStatus)>>,
        errors: Mutex<Vec<String>>,
        completions: Mutex<Vec<String>>,
    }

    impl SigningObserver for Recorder {
        fn on_status_change(&self, status: SigningStatus) {
            self.statuses.lock().unwrap().push(status);
        }
        fn on_progress_update(&self, progress: SigningProgress) {
            self.progress.lock().unwrap().push(progress);
        }
        fn on_copayer_status_change(&self, copayer_id: &str, status: CopayerSignStatus) {
            self.copayers
                .lock()
                .unwrap()
                .push((copayer_id.to_string(), status));
        }
        fn on_round_update(&self, round: u32, phase: RoundPhase) {
            self.rounds.lock().unwrap().push((round, phase));
        }
        fn on_error(&self, error: &Error) {
            self.errors.lock().unwrap().push(error.to_string());
        }
        fn on_complete(&self, signature: &str) {
            self.completions.lock().unwrap().push(signature.to_string());
        }
    }

    fn coordinator(
        transport: MemoryTransport,
    ) -> Coordinator<MemoryTransport, MemoryWalletService> {
        Coordinator::new(transport, MemoryWalletService::new())
    }

    #[tokio::test]
    async fn non_threshold_key_rejected_without_transport_calls() {
        let coord = coordinator(MemoryTransport::new());
        let recorder = Recorder::default();

        let result = coord
            .sign(&key(1), &wallet(), &txp(), &recorder, SignOptions::default())
            .await;

        assert!(matches!(result, Err(Error::NotAThresholdKey)));
        assert_eq!(coord.transport().open_count(), 0);
        assert_eq!(coord.transport().subscribe_count(), 0);
        assert!(recorder.statuses.lock().unwrap().is_empty());
        assert!(recorder.errors.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn wallet_without_key_reference_rejected() {
        let coord = coordinator(MemoryTransport::new());
        let mut unlinked = wallet();
        unlinked.threshold_key_id = None;

        let result = coord
            .sign(&key(2), &unlinked, &txp(), &NoopObserver, SignOptions::default())
            .await;

        assert!(matches!(result, Err(Error::WalletKeyMismatch { .. })));
        assert_eq!(coord.transport().subscribe_count(), 0);
    }

    #[tokio::test]
    async fn full_session_resolves_with_signed_proposal() {
        let coord = coordinator(MemoryTransport::scripted(full_run_events()));
        let recorder = Recorder::default();

        let signed = coord
            .sign(&key(2), &wallet(), &txp(), &recorder, SignOptions::default())
            .await
            .unwrap();

        let expected_sig = format!("0x{}", "11".repeat(65));
        assert_eq!(signed.signatures, vec![expected_sig.clone()]);
        assert_eq!(signed.status.as_deref(), Some("accepted"));

        assert_eq!(
            *recorder.statuses.lock().unwrap(),
            vec![
                SigningStatus::Initializing,
                SigningStatus::WaitingForCosigners,
                SigningStatus::SignatureGeneration,
                SigningStatus::Broadcasting,
                SigningStatus::Complete,
            ]
        );
        assert_eq!(*recorder.completions.lock().unwrap(), vec![expected_sig]);
        assert_eq!(recorder.progress.lock().unwrap().len(), 4);
        assert_eq!(recorder.rounds.lock().unwrap().len(), 4);

        assert_eq!(coord.transport().unsubscribe_count(), 1);
        assert_eq!(coord.wallet_service().push_count(), 1);

        // Session opened with the deterministic id and the session's digest.
        let opened = coord.transport().opened("sign-txp-1").unwrap();
        assert_eq!(opened.derivation_path, "m/0/0");
        assert_eq!(opened.message_hash.len(), 32);
    }

    #[tokio::test]
    async fn timeout_rejects_and_unsubscribes() {
        let coord = coordinator(MemoryTransport::new());
        let recorder = Recorder::default();

        let started = std::time::Instant::now();
        let result = coord
            .sign(
                &key(2),
                &wallet(),
                &txp(),
                &recorder,
                SignOptions {
                    timeout: Duration::from_millis(50),
                    as_joiner: false,
                },
            )
            .await;

        assert!(matches!(result, Err(Error::SigningTimeout)));
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(coord.transport().unsubscribe_count(), 1);
        assert_eq!(recorder.errors.lock().unwrap().len(), 1);
        assert_eq!(coord.wallet_service().push_count(), 0);
    }

    #[tokio::test]
    async fn late_signature_after_timeout_settles_once() {
        let transport = MemoryTransport::scripted(vec![SessionEvent::Signature {
            signature: RawSignature::Hex("0xabcd".into()),
        }])
        .with_event_delay(Duration::from_millis(120));
        let coord = coordinator(transport);
        let recorder = Recorder::default();

        let result = coord
            .sign(
                &key(2),
                &wallet(),
                &txp(),
                &recorder,
                SignOptions {
                    timeout: Duration::from_millis(30),
                    as_joiner: false,
                },
            )
            .await;

        assert!(matches!(result, Err(Error::SigningTimeout)));
        assert_eq!(coord.transport().unsubscribe_count(), 1);
        assert!(recorder.completions.lock().unwrap().is_empty());
        assert_eq!(recorder.errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn joiner_resolves_with_original_proposal_and_never_pushes() {
        let coord = coordinator(MemoryTransport::scripted(full_run_events()));
        let recorder = Recorder::default();

        let proposal = txp();
        let resolved = coord
            .join_session(&key(2), &wallet(), &proposal, &recorder)
            .await
            .unwrap();

        assert_eq!(resolved.id, proposal.id);
        assert!(resolved.signatures.is_empty());
        assert_eq!(coord.wallet_service().push_count(), 0);
        assert_eq!(coord.transport().unsubscribe_count(), 1);
        assert_eq!(recorder.completions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn protocol_error_event_rejects_session() {
        let coord = coordinator(MemoryTransport::scripted(vec![
            SessionEvent::RoundReady { round: 1 },
            SessionEvent::Error {
                message: "cosigner aborted".into(),
            },
        ]));
        let recorder = Recorder::default();

        let result = coord
            .sign(&key(2), &wallet(), &txp(), &recorder, SignOptions::default())
            .await;

        assert!(matches!(result, Err(Error::Protocol(_))));
        assert_eq!(coord.transport().unsubscribe_count(), 1);
        assert_eq!(recorder.errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn open_failure_is_soft_when_events_still_arrive() {
        let transport = MemoryTransport::scripted(full_run_events());
        transport.fail_next_open();
        let coord = coordinator(transport);

        let signed = coord
            .sign(&key(2), &wallet(), &txp(), &NoopObserver, SignOptions::default())
            .await
            .unwrap();

        assert_eq!(signed.signatures.len(), 1);
    }

    #[tokio::test]
    async fn structured_signature_on_non_evm_chain_fails_conversion() {
        let coord = coordinator(MemoryTransport::scripted(vec![SessionEvent::Signature {
            signature: RawSignature::Components {
                r: "11".repeat(32),
                s: "22".repeat(32),
                v: 1,
            },
        }]));
        let recorder = Recorder::default();

        let result = coord
            .sign(&key(2), &wallet(), &txp(), &recorder, SignOptions::default())
            .await;

        assert!(matches!(result, Err(Error::SignatureConversionFailed(_))));
        assert_eq!(coord.transport().unsubscribe_count(), 1);
        assert!(recorder.completions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn push_failure_rejects_after_signature_obtained() {
        let coord = coordinator(MemoryTransport::scripted(full_run_events()));
        coord.wallet_service().fail_next_push();
        let recorder = Recorder::default();

        let result = coord
            .sign(&key(2), &wallet(), &txp(), &recorder, SignOptions::default())
            .await;

        assert!(matches!(result, Err(Error::SignaturePushFailed(_))));
        // Signature itself was valid: on_complete fired before the push.
        assert_eq!(recorder.completions.lock().unwrap().len(), 1);
        assert_eq!(coord.transport().unsubscribe_count(), 1);
    }

    #[tokio::test]
    async fn copayer_events_forwarded() {
        let mut events = vec![
            SessionEvent::CopayerJoined {
                copayer_id: "c2".into(),
            },
            SessionEvent::CopayerSigned {
                copayer_id: "c2".into(),
            },
        ];
        events.extend(full_run_events());
        let coord = coordinator(MemoryTransport::scripted(events));
        let recorder = Recorder::default();

        coord
            .sign(&key(3), &wallet(), &txp(), &recorder, SignOptions::default())
            .await
            .unwrap();

        assert_eq!(
            *recorder.copayers.lock().unwrap(),
            vec![
                ("c2".to_string(), CopayerSignStatus::Joined),
                ("c2".to_string(), CopayerSignStatus::Signed),
            ]
        );
    }
}
