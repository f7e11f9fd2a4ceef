//! gossipd server - wires the node, the HTTP endpoint and the generator

use crate::config::Config;
use crate::generator::MetricGenerator;
use crate::node::Node;
use crate::sender::SenderStats;
use crate::summary;
use lww_gossip_core::ReceiveReport;
use lww_gossip_net::{router_with_hook, serve, MergeHook, ServeError};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info};

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("Serve error: {0}")]
    Serve(#[from] ServeError),
}

/// Server state
pub struct Server {
    config: Config,
    node: Arc<Node>,
    /// Set once shutdown is requested; latched so an early request is kept
    shutdown_tx: watch::Sender<bool>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Result<Self, ServerError> {
        config
            .validate()
            .map_err(|e| ServerError::InvalidConfig(e.to_string()))?;

        let node = Arc::new(Node::new(config.node_config()));
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            node,
            shutdown_tx,
        })
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    /// Bind the configured address and run until shutdown
    pub async fn run(&self) -> Result<(), ServerError> {
        let addr = self.config.listen;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::BindFailed { addr, source })?;
        self.run_with_listener(listener).await
    }

    /// Run on an already bound listener until shutdown
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<(), ServerError> {
        info!(
            "Starting gossipd node {} on {}",
            self.node.node_id(),
            listener.local_addr().map_err(ServeError::from)?
        );
        for peer in self.node.sender().peers() {
            info!("Gossip peer: {}", peer);
        }

        let generator_handle = self.config.generator_config().map(|config| {
            let generator = MetricGenerator::new(self.node.clone(), config);
            tokio::spawn(generator.run(self.stopped()))
        });

        self.node.start();

        let app = router_with_hook(self.node.receiver(), self.merge_hook());
        let served = serve(listener, app, self.stopped()).await;

        info!("Shutting down...");
        // The endpoint may have failed on its own; make sure the generator stops too
        self.shutdown();
        if let Some(handle) = generator_handle {
            if let Err(e) = handle.await {
                debug!("Generator task ended abnormally: {}", e);
            }
        }
        self.node.shutdown().await;

        served?;
        Ok(())
    }

    fn merge_hook(&self) -> MergeHook {
        let store = self.node.store().clone();
        Arc::new(move |_report: &ReceiveReport| {
            summary::log_state(&store.snapshot(), "after remote merge");
        })
    }

    /// Resolves once shutdown has been requested, including before the call
    fn stopped(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.shutdown_tx.subscribe();
        async move {
            let _ = rx.wait_for(|stop| *stop).await;
        }
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Get server statistics
    pub fn stats(&self) -> ServerStats {
        ServerStats {
            key_count: self.node.store().len(),
            sender: self.node.sender().stats(),
        }
    }
}

/// Server statistics
#[derive(Debug, Clone)]
pub struct ServerStats {
    pub key_count: usize,
    pub sender: SenderStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::time::Duration;

    fn test_config(args: &[&str]) -> Config {
        let mut argv = vec!["gossipd", "--listen", "127.0.0.1:0", "--node-id", "9"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_server_creation() {
        let server = Server::new(test_config(&[])).unwrap();

        assert_eq!(server.node().node_id(), 9);
        assert_eq!(server.stats().key_count, 0);
        assert_eq!(server.stats().sender.peer_count, 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = Server::new(test_config(&["--gossip-interval-ms", "0"]));
        assert!(matches!(result, Err(ServerError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_run_serves_until_shutdown() {
        let server = Arc::new(
            Server::new(test_config(&["--generate", "--devices", "2", "--generate-interval-ms", "10"])).unwrap(),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let running = {
            let server = server.clone();
            tokio::spawn(async move { server.run_with_listener(listener).await })
        };

        let health = reqwest::get(format!("http://{}/health", addr))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(health, "ok");

        tokio::time::timeout(Duration::from_secs(5), async {
            while server.stats().key_count < 4 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        server.shutdown();
        tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(!server.node().is_running());
    }

    #[tokio::test]
    async fn test_shutdown_before_run_is_honoured() {
        let server = Server::new(test_config(&["--generate", "--generate-interval-ms", "10"])).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        server.shutdown();
        tokio::time::timeout(Duration::from_secs(5), server.run_with_listener(listener))
            .await
            .unwrap()
            .unwrap();
        assert!(!server.node().is_running());
    }
}
