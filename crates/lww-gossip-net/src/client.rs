//! Outbound gossip push

use lww_gossip_core::wire::{GossipAck, GossipPayload};
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Failure to deliver one snapshot to one peer.
///
/// Every variant means "peer unreachable this round"; the next gossip cycle
/// is the retry.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("peer {peer} unreachable: {source}")]
    Unreachable {
        peer: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("peer {peer} timed out after {timeout:?}")]
    Timeout { peer: String, timeout: Duration },
    #[error("peer {peer} rejected gossip with status {status}")]
    Rejected { peer: String, status: StatusCode },
    #[error("peer {peer} sent a malformed response: {reason}")]
    MalformedResponse { peer: String, reason: String },
}

impl PushError {
    /// The peer address the push was aimed at
    pub fn peer(&self) -> &str {
        match self {
            PushError::Unreachable { peer, .. }
            | PushError::Timeout { peer, .. }
            | PushError::Rejected { peer, .. }
            | PushError::MalformedResponse { peer, .. } => peer,
        }
    }
}

/// HTTP client for `POST /gossip`
#[derive(Debug, Clone)]
pub struct PeerClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl PeerClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
        }
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Gossip endpoint for a peer given as `host:port` or a base URL
    pub fn gossip_url(peer: &str) -> String {
        let base = peer.trim_end_matches('/');
        if base.starts_with("http://") || base.starts_with("https://") {
            format!("{}/gossip", base)
        } else {
            format!("http://{}/gossip", base)
        }
    }

    /// Push a payload to one peer.
    ///
    /// A 2xx with an empty body or `{"ok": true}` counts as delivered.
    pub async fn push(&self, peer: &str, payload: &GossipPayload) -> Result<(), PushError> {
        let response = self
            .http
            .post(Self::gossip_url(peer))
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.classify(peer, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PushError::Rejected {
                peer: peer.to_string(),
                status,
            });
        }

        let body = response.bytes().await.map_err(|e| self.classify(peer, e))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }

        match serde_json::from_slice::<GossipAck>(&body) {
            Ok(ack) if ack.ok => Ok(()),
            Ok(_) => Err(PushError::MalformedResponse {
                peer: peer.to_string(),
                reason: "ok is false".to_string(),
            }),
            Err(e) => Err(PushError::MalformedResponse {
                peer: peer.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn classify(&self, peer: &str, source: reqwest::Error) -> PushError {
        if source.is_timeout() {
            PushError::Timeout {
                peer: peer.to_string(),
                timeout: self.timeout,
            }
        } else {
            PushError::Unreachable {
                peer: peer.to_string(),
                source,
            }
        }
    }
}
