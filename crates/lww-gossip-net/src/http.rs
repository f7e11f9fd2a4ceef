//! Inbound gossip endpoint

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use lww_gossip_core::wire::{GossipAck, GossipPayload};
use lww_gossip_core::{GossipReceiver, ReceiveReport};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Called after every merged batch, outside the store lock
pub type MergeHook = Arc<dyn Fn(&ReceiveReport) + Send + Sync>;

/// Server errors
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
struct Endpoint {
    receiver: GossipReceiver,
    hook: Option<MergeHook>,
}

/// Routes for `POST /gossip`, `GET /health` and its `/healthz` alias
pub fn router(receiver: GossipReceiver) -> Router {
    build(Endpoint { receiver, hook: None })
}

/// Like [`router`], running `hook` after each merge
pub fn router_with_hook(receiver: GossipReceiver, hook: MergeHook) -> Router {
    build(Endpoint {
        receiver,
        hook: Some(hook),
    })
}

fn build(endpoint: Endpoint) -> Router {
    Router::new()
        .route("/gossip", post(handle_gossip))
        .route("/health", get(handle_health))
        .route("/healthz", get(handle_health))
        .with_state(endpoint)
}

async fn handle_gossip(
    State(endpoint): State<Endpoint>,
    Json(payload): Json<GossipPayload>,
) -> Json<GossipAck> {
    let received = payload.len();
    let report = endpoint.receiver.receive(payload);
    info!(
        "Received {} gossip entries ({} applied, {} skipped)",
        received,
        report.applied,
        report.rejected.len()
    );

    if let Some(hook) = &endpoint.hook {
        hook(&report);
    }

    Json(GossipAck::ok())
}

async fn handle_health() -> &'static str {
    "ok"
}

/// Serve `app` on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        debug!("Gossip endpoint listening on {}", addr);
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::PeerClient;
    use lww_gossip_core::{Entry, LwwStore};
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::sync::oneshot;

    async fn spawn(app: Router) -> (String, oneshot::Sender<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(serve(listener, app, async {
            rx.await.ok();
        }));
        (addr, tx)
    }

    #[tokio::test]
    async fn test_push_merges_into_remote_store() {
        let store = Arc::new(LwwStore::new());
        let (addr, _stop) = spawn(router(GossipReceiver::new(store.clone()))).await;

        let payload = GossipPayload::from_entries([
            Entry::new("disp0:temperature", 10, 1, 20.0),
            Entry::new("disp0:vibration", 10, 1, 0.3),
        ]);
        PeerClient::new(Duration::from_secs(2))
            .push(&addr, &payload)
            .await
            .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("disp0:vibration").map(|e| e.value), Some(0.3));
    }

    #[tokio::test]
    async fn test_mixed_batch_still_acknowledged() {
        let store = Arc::new(LwwStore::new());
        let reports = Arc::new(Mutex::new(Vec::new()));
        let hook: MergeHook = {
            let reports = reports.clone();
            Arc::new(move |report: &ReceiveReport| reports.lock().push(report.clone()))
        };
        let (addr, _stop) = spawn(router_with_hook(GossipReceiver::new(store.clone()), hook)).await;

        let body = serde_json::json!({
            "lww": [
                ["a", 1, 1, 1.0],
                {"key": "b", "ts": 1, "node_id": 1},
                {"key": "c", "ts": 1, "node_id": 1, "value": 3.0}
            ]
        });
        let response = reqwest::Client::new()
            .post(format!("http://{}/gossip", addr))
            .json(&body)
            .send()
            .await
            .unwrap();

        assert!(response.status().is_success());
        let ack: GossipAck = response.json().await.unwrap();
        assert!(ack.ok);

        assert_eq!(store.len(), 2);
        let reports = reports.lock();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].accepted, 2);
        assert_eq!(reports[0].rejected[0].index, 1);
    }

    #[tokio::test]
    async fn test_non_json_body_is_client_error() {
        let store = Arc::new(LwwStore::new());
        let (addr, _stop) = spawn(router(GossipReceiver::new(store.clone()))).await;

        let response = reqwest::Client::new()
            .post(format!("http://{}/gossip", addr))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();

        assert!(response.status().is_client_error());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_health() {
        let store = Arc::new(LwwStore::new());
        let (addr, _stop) = spawn(router(GossipReceiver::new(store))).await;

        for path in ["health", "healthz"] {
            let body = reqwest::get(format!("http://{}/{}", addr, path))
                .await
                .unwrap()
                .text()
                .await
                .unwrap();
            assert_eq!(body, "ok");
        }
    }
}
