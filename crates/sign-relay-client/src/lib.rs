//! Signing Relay Client
//!
//! HTTP client for the wallet coordination service: opens signing sessions,
//! long-polls the session event stream, and pushes finalized signatures.
//! One client instance covers one session.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tss_core::error::{Error, Result};
use tss_core::transport::{
    async_trait, OpenSessionRequest, SessionEvent, SigningTransport, SubscribeOptions,
    WalletService,
};
use tss_core::types::TransactionProposal;
use tracing::{debug, instrument, warn};

/// HTTP-based session client for one signing session
pub struct HttpSessionClient {
    /// HTTP client
    client: reqwest::Client,
    /// Wallet coordination service base URL
    url: String,
    /// Deterministic session identifier this client is bound to
    session_id: String,
    /// Request timeout
    timeout: Duration,
    /// Poll task for the active subscription
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl HttpSessionClient {
    /// Create a client bound to one session id
    pub fn new(url: &str, session_id: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.trim_end_matches('/').to_string(),
            session_id: session_id.to_string(),
            timeout: Duration::from_secs(30),
            poll_task: Mutex::new(None),
        }
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[async_trait]
impl SigningTransport for HttpSessionClient {
    #[instrument(skip_all, fields(session_id = %self.session_id))]
    async fn open_session(&self, request: &OpenSessionRequest) -> Result<()> {
        let body = OpenSessionBody {
            session_id: request.session_id.clone(),
            message_hash: hex::encode(&request.message_hash),
            derivation_path: request.derivation_path.clone(),
        };

        let response = self
            .client
            .post(format!("{}/v1/session", self.url))
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "session open failed with status: {}",
                response.status()
            )));
        }

        debug!("Session opened");
        Ok(())
    }

    #[instrument(skip_all, fields(session_id = %self.session_id))]
    async fn subscribe(&self, opts: SubscribeOptions) -> Result<mpsc::Receiver<SessionEvent>> {
        let (tx, rx) = mpsc::channel(32);

        let client = self.client.clone();
        let url = format!("{}/v1/session/{}/events", self.url, self.session_id);
        let timeout = self.timeout;
        let poll_interval = opts.poll_interval;

        let handle = tokio::spawn(async move {
            let mut after: u64 = 0;
            loop {
                match poll_events(&client, &url, after, timeout).await {
                    Ok(batch) => {
                        for entry in batch {
                            after = after.max(entry.seq);
                            if tx.send(entry.event).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        // Transient relay failures are retried on the next
                        // poll; the session deadline bounds the overall wait.
                        warn!(error = %e, "Event poll failed");
                    }
                }
                tokio::time::sleep(poll_interval).await;
            }
        });

        *self.poll_task.lock().unwrap() = Some(handle);
        Ok(rx)
    }

    #[instrument(skip_all, fields(session_id = %self.session_id))]
    async fn unsubscribe(&self) -> Result<()> {
        if let Some(handle) = self.poll_task.lock().unwrap().take() {
            handle.abort();
        }

        let response = self
            .client
            .delete(format!(
                "{}/v1/session/{}/sub",
                self.url, self.session_id
            ))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "unsubscribe failed with status: {}",
                response.status()
            )));
        }

        debug!("Unsubscribed");
        Ok(())
    }
}

#[async_trait]
impl WalletService for HttpSessionClient {
    #[instrument(skip_all, fields(txp_id = %txp.id))]
    async fn push_signature(
        &self,
        txp: &TransactionProposal,
        signatures: &[String],
    ) -> Result<TransactionProposal> {
        let body = PushSignatureBody {
            signatures: signatures.to_vec(),
        };

        let response = self
            .client
            .post(format!("{}/v1/txproposals/{}/signatures", self.url, txp.id))
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "signature push failed with status: {}",
                response.status()
            )));
        }

        let signed: TransactionProposal = response
            .json()
            .await
            .map_err(|e| Error::Serialization(e.to_string()))?;

        debug!(status = ?signed.status, "Signature pushed");
        Ok(signed)
    }
}

async fn poll_events(
    client: &reqwest::Client,
    url: &str,
    after: u64,
    timeout: Duration,
) -> Result<Vec<EventEntry>> {
    let response = client
        .get(url)
        .query(&[("after", after)])
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;

    if !response.status().is_success() {
        return Err(Error::Transport(format!(
            "event poll failed with status: {}",
            response.status()
        )));
    }

    response
        .json::<Vec<EventEntry>>()
        .await
        .map_err(|e| Error::Serialization(e.to_string()))
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenSessionBody {
    session_id: String,
    message_hash: String,
    derivation_path: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct PushSignatureBody {
    signatures: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EventEntry {
    seq: u64,
    #[serde(flatten)]
    event: SessionEvent,
}
