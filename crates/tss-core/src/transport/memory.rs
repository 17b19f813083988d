//! In-memory transport and wallet service for local testing

use super::{async_trait, OpenSessionRequest, SessionEvent, SigningTransport, SubscribeOptions, WalletService};
use crate::error::{Error, Result};
use crate::types::TransactionProposal;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// In-memory signing transport that replays a scripted event sequence.
///
/// Events are delivered on a spawned task once `subscribe` is called; the
/// stream stays open until `unsubscribe` drops the sender. Call counters let
/// tests assert the coordinator's transport contract.
pub struct MemoryTransport {
    scripted: Mutex<Vec<SessionEvent>>,
    event_delay: Duration,
    sessions: DashMap<String, OpenSessionRequest>,
    sender: Mutex<Option<mpsc::Sender<SessionEvent>>>,
    fail_open: AtomicBool,
    open_calls: AtomicUsize,
    subscribe_calls: AtomicUsize,
    unsubscribe_calls: AtomicUsize,
}

impl MemoryTransport {
    /// Transport that never emits an event
    pub fn new() -> Self {
        Self::scripted(Vec::new())
    }

    /// Transport that replays the given events after subscription
    pub fn scripted(events: Vec<SessionEvent>) -> Self {
        Self {
            scripted: Mutex::new(events),
            event_delay: Duration::ZERO,
            sessions: DashMap::new(),
            sender: Mutex::new(None),
            fail_open: AtomicBool::new(false),
            open_calls: AtomicUsize::new(0),
            subscribe_calls: AtomicUsize::new(0),
            unsubscribe_calls: AtomicUsize::new(0),
        }
    }

    /// Delay before each scripted event is delivered
    pub fn with_event_delay(mut self, delay: Duration) -> Self {
        self.event_delay = delay;
        self
    }

    /// Make the next `open_session` call fail
    pub fn fail_next_open(&self) {
        self.fail_open.store(true, Ordering::SeqCst);
    }

    /// Session request recorded for an id, if one was opened
    pub fn opened(&self, session_id: &str) -> Option<OpenSessionRequest> {
        self.sessions.get(session_id).map(|e| e.value().clone())
    }

    pub fn open_count(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_count(&self) -> usize {
        self.unsubscribe_calls.load(Ordering::SeqCst)
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SigningTransport for MemoryTransport {
    async fn open_session(&self, request: &OpenSessionRequest) -> Result<()> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_open.swap(false, Ordering::SeqCst) {
            return Err(Error::Transport("relay rejected session open".into()));
        }

        self.sessions
            .insert(request.session_id.clone(), request.clone());
        Ok(())
    }

    async fn subscribe(&self, _opts: SubscribeOptions) -> Result<mpsc::Receiver<SessionEvent>> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(32);
        let events = std::mem::take(&mut *self.scripted.lock().unwrap());
        let delay = self.event_delay;

        // Keep a sender alive in the transport so the stream stays open
        // after the scripted events have been replayed.
        *self.sender.lock().unwrap() = Some(tx.clone());

        tokio::spawn(async move {
            for event in events {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }

    async fn unsubscribe(&self) -> Result<()> {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        *self.sender.lock().unwrap() = None;
        Ok(())
    }
}

/// In-memory wallet service recording signature pushes
pub struct MemoryWalletService {
    pushes: Mutex<Vec<(String, Vec<String>)>>,
    fail_push: AtomicBool,
}

impl MemoryWalletService {
    pub fn new() -> Self {
        Self {
            pushes: Mutex::new(Vec::new()),
            fail_push: AtomicBool::new(false),
        }
    }

    /// Make the next `push_signature` call fail
    pub fn fail_next_push(&self) {
        self.fail_push.store(true, Ordering::SeqCst);
    }

    pub fn push_count(&self) -> usize {
        self.pushes.lock().unwrap().len()
    }

    /// Signatures recorded for the most recent push
    pub fn last_push(&self) -> Option<(String, Vec<String>)> {
        self.pushes.lock().unwrap().last().cloned()
    }
}

impl Default for MemoryWalletService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletService for MemoryWalletService {
    async fn push_signature(
        &self,
        txp: &TransactionProposal,
        signatures: &[String],
    ) -> Result<TransactionProposal> {
        if self.fail_push.swap(false, Ordering::SeqCst) {
            return Err(Error::Transport("wallet service unavailable".into()));
        }

        self.pushes
            .lock()
            .unwrap()
            .push((txp.id.clone(), signatures.to_vec()));

        let mut signed = txp.clone();
        signed.signatures.extend(signatures.iter().cloned());
        signed.status = Some("accepted".into());
        Ok(signed)
    }
}
