//! TCP server, gossip and chain synchronization.
//!
//! Every exchange is a request frame answered by one response frame.
//! Outbound requests open a fresh connection; inbound connections may carry
//! any number of requests.

use crate::error::{NetworkError, Result};
use crate::message::{read_frame, write_frame, Message};
use crate::peer::{FailureOutcome, PeerSet, DEFAULT_REDIAL_INTERVAL};
use parking_lot::Mutex;
use powchain_chain::{Blockchain, Broadcast, ChainError, ImportOutcome, Origin};
use powchain_core::{Block, Transaction};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How often the maintenance loop looks for due peers.
const TICK: Duration = Duration::from_millis(500);
/// Blocks to step back per round when a fetched range does not attach.
const SYNC_STEP_BACK: u64 = 16;

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub listen_addr: String,
    pub peers: Vec<String>,
    /// Bound on every peer exchange.
    pub peer_timeout: Duration,
    pub redial_interval: Duration,
    /// Pause between head checks with a healthy peer.
    pub sync_interval: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:6060".into(),
            peers: Vec::new(),
            peer_timeout: Duration::from_millis(5000),
            redial_interval: DEFAULT_REDIAL_INTERVAL,
            sync_interval: Duration::from_secs(10),
        }
    }
}

/// Send one request and wait for its response.
pub async fn request(addr: &str, message: &Message, timeout: Duration) -> Result<Message> {
    let exchange = async {
        let mut stream = TcpStream::connect(addr)
            .await
            .map_err(|source| NetworkError::PeerUnreachable {
                addr: addr.to_string(),
                source,
            })?;
        write_frame(&mut stream, message).await?;
        read_frame(&mut stream).await
    };
    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| NetworkError::Timeout(addr.to_string()))?
}

/// Outbound gossip registered with the chain.
struct Gossip {
    local_addr: String,
    peers: Arc<PeerSet>,
    timeout: Duration,
    runtime: Handle,
}

impl Gossip {
    fn send(&self, message: Message, exclude: Option<&str>) {
        for peer in self.peers.targets(exclude) {
            let peers = self.peers.clone();
            let message = message.clone();
            let timeout = self.timeout;
            self.runtime.spawn(async move {
                match request(&peer, &message, timeout).await {
                    Ok(Message::Error(reason)) => {
                        debug!(%peer, kind = message.kind(), %reason, "Peer declined gossip")
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let outcome = peers.record_failure(&peer, Instant::now());
                        debug!(%peer, error = %e, ?outcome, "Gossip failed");
                    }
                }
            });
        }
    }
}

impl Broadcast for Gossip {
    fn broadcast_block(&self, block: &Block, exclude: Option<&str>) {
        debug!(number = block.number(), hash = %block.hash.short(), "Gossiping block");
        self.send(
            Message::NewBlock {
                from: self.local_addr.clone(),
                block: block.clone(),
            },
            exclude,
        );
    }

    fn broadcast_transaction(&self, tx: &Transaction, exclude: Option<&str>) {
        self.send(
            Message::NewTransaction {
                from: self.local_addr.clone(),
                tx: tx.clone(),
            },
            exclude,
        );
    }
}

/// A running peer node: listener, maintenance loop and gossip.
pub struct Network {
    chain: Arc<Blockchain>,
    peers: Arc<PeerSet>,
    config: NetworkConfig,
    local_addr: String,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Network {
    /// Bind the listener, register gossip with the chain and start syncing
    /// with the configured peers.
    pub async fn start(chain: Arc<Blockchain>, config: NetworkConfig) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(&config.listen_addr).await?;
        let local_addr = listener.local_addr()?.to_string();
        let peers = Arc::new(PeerSet::new(
            config.peers.iter().filter(|p| **p != local_addr).cloned(),
            config.redial_interval,
        ));

        chain.set_broadcaster(Arc::new(Gossip {
            local_addr: local_addr.clone(),
            peers: peers.clone(),
            timeout: config.peer_timeout,
            runtime: Handle::current(),
        }));

        let network = Arc::new(Self {
            chain,
            peers,
            config,
            local_addr,
            tasks: Mutex::new(Vec::new()),
        });

        let accept = tokio::spawn(network.clone().accept_loop(listener));
        let maintain = tokio::spawn(network.clone().maintenance_loop());
        network.tasks.lock().extend([accept, maintain]);

        info!(addr = %network.local_addr, peers = network.peers.len(), "P2P listening");
        Ok(network)
    }

    pub fn local_addr(&self) -> &str {
        &self.local_addr
    }

    pub fn peers(&self) -> &PeerSet {
        &self.peers
    }

    /// Stop accepting connections and syncing. Gossip already in flight
    /// still completes.
    pub fn shutdown(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, remote)) => {
                    let network = self.clone();
                    tokio::spawn(async move {
                        match network.serve(stream).await {
                            Ok(()) | Err(NetworkError::Closed) => {}
                            Err(e) => debug!(%remote, error = %e, "Connection ended"),
                        }
                    });
                }
                Err(e) => warn!(error = %e, "Failed to accept connection"),
            }
        }
    }

    async fn serve(self: Arc<Self>, mut stream: TcpStream) -> Result<()> {
        loop {
            let message = read_frame(&mut stream).await?;
            let response = self.handle(message).await;
            tokio::time::timeout(self.config.peer_timeout, write_frame(&mut stream, &response))
                .await
                .map_err(|_| NetworkError::Timeout("inbound peer".into()))??;
        }
    }

    async fn handle(self: &Arc<Self>, message: Message) -> Message {
        match message {
            Message::NewBlock { from, block } => {
                self.learn(&from);
                self.handle_block(from, block).await
            }
            Message::NewTransaction { from, tx } => {
                self.learn(&from);
                let chain = self.chain.clone();
                let origin = if from.is_empty() {
                    Origin::Local
                } else {
                    Origin::Peer(from)
                };
                match tokio::task::spawn_blocking(move || chain.submit_transaction(tx, origin)).await {
                    Ok(Ok(_)) => Message::Ack,
                    Ok(Err(e)) => Message::Error(e.to_string()),
                    Err(e) => Message::Error(e.to_string()),
                }
            }
            Message::HeadQuery => {
                let head = self.chain.current_head();
                Message::Head {
                    number: head.number(),
                    hash: head.hash,
                }
            }
            Message::BlockRangeRequest { from, to } => {
                let chain = self.chain.clone();
                match tokio::task::spawn_blocking(move || chain.blocks_range(from, to)).await {
                    Ok(Ok(blocks)) => Message::Blocks(blocks),
                    Ok(Err(e)) => Message::Error(e.to_string()),
                    Err(e) => Message::Error(e.to_string()),
                }
            }
            other => Message::Error(format!("unexpected {} request", other.kind())),
        }
    }

    /// An empty sender is a client submitting work, not a peer.
    fn learn(&self, from: &str) {
        if !from.is_empty() && from != self.local_addr && self.peers.add(from) {
            debug!(peer = %from, "Learned peer");
        }
    }

    async fn handle_block(self: &Arc<Self>, from: String, block: Block) -> Message {
        match self.import(block, Origin::Peer(from.clone())).await {
            Ok(_) => Message::Ack,
            Err(NetworkError::Chain(ChainError::MissingParent { number, .. })) => {
                debug!(peer = %from, number, "Missing ancestry, syncing");
                let network = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = network.sync_with(&from).await {
                        debug!(peer = %from, error = %e, "Catch-up sync failed");
                    }
                });
                Message::Ack
            }
            Err(e) => Message::Error(e.to_string()),
        }
    }

    async fn import(&self, block: Block, origin: Origin) -> Result<ImportOutcome> {
        let chain = self.chain.clone();
        let outcome = tokio::task::spawn_blocking(move || chain.import_block(block, origin))
            .await
            .map_err(|e| NetworkError::UnexpectedMessage(format!("import task failed: {e}")))?;
        match outcome {
            Err(e) if e.is_fatal() => {
                error!(error = %e, "Fatal chain error during import");
                Err(e.into())
            }
            other => Ok(other?),
        }
    }

    async fn maintenance_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(TICK);
        loop {
            ticker.tick().await;
            for peer in self.peers.due(Instant::now()) {
                match self.sync_with(&peer).await {
                    Ok(imported) => {
                        let was_active = self.peers.is_active(&peer);
                        self.peers
                            .record_success(&peer, Instant::now() + self.config.sync_interval);
                        if !was_active {
                            info!(%peer, "Peer reconnected");
                        }
                        if imported > 0 {
                            info!(%peer, imported, height = self.chain.height(), "Synced blocks");
                        }
                    }
                    Err(e) => match self.peers.record_failure(&peer, Instant::now()) {
                        FailureOutcome::Dropped(redial) => {
                            warn!(%peer, error = %e, redial_secs = redial.as_secs(), "Peer dropped")
                        }
                        FailureOutcome::Forgotten => warn!(%peer, error = %e, "Peer forgotten"),
                        outcome => debug!(%peer, error = %e, ?outcome, "Peer sync failed"),
                    },
                }
            }
        }
    }

    /// Compare heads with `peer` and import whatever it has that we lack.
    ///
    /// Returns the number of blocks that changed or extended our chain.
    pub async fn sync_with(&self, peer: &str) -> Result<usize> {
        let timeout = self.config.peer_timeout;
        let (number, hash) = match request(peer, &Message::HeadQuery, timeout).await? {
            Message::Head { number, hash } => (number, hash),
            other => return Err(NetworkError::UnexpectedMessage(other.kind().into())),
        };

        let local = self.chain.height();
        if number < local || self.chain.has_block(&hash) {
            return Ok(0);
        }

        let lowest = local
            .saturating_sub(self.chain.config().max_reorg_depth)
            .max(1);
        let mut start = (local + 1).min(number);
        let mut imported = 0;

        while start <= number {
            let blocks = match request(peer, &Message::BlockRangeRequest { from: start, to: number }, timeout).await? {
                Message::Blocks(blocks) => blocks,
                Message::Error(reason) => return Err(NetworkError::UnexpectedMessage(reason)),
                other => return Err(NetworkError::UnexpectedMessage(other.kind().into())),
            };
            let Some(first) = blocks.first() else {
                break;
            };

            if !self.chain.has_block(&first.parent_hash()) {
                if start <= lowest {
                    return Err(NetworkError::UnexpectedMessage(
                        "peer chain does not attach to ours".into(),
                    ));
                }
                start = start.saturating_sub(SYNC_STEP_BACK).max(lowest);
                continue;
            }

            let next = blocks.last().map_or(number, |b| b.number()) + 1;
            for block in blocks {
                if self.import(block, Origin::Peer(peer.to_string())).await?.head_changed() {
                    imported += 1;
                }
            }
            start = next;
        }
        Ok(imported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use powchain_chain::{ChainConfig, Genesis};
    use powchain_storage::Storage;

    fn chain() -> Arc<Blockchain> {
        let config = ChainConfig {
            difficulty: 4,
            ..ChainConfig::default()
        };
        Arc::new(Blockchain::open(Storage::open_temporary().unwrap(), config, Genesis::default()).unwrap())
    }

    fn config() -> NetworkConfig {
        NetworkConfig {
            listen_addr: "127.0.0.1:0".into(),
            peer_timeout: Duration::from_secs(2),
            ..NetworkConfig::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_head_query() {
        let chain = chain();
        let network = Network::start(chain.clone(), config()).await.unwrap();

        let response = request(network.local_addr(), &Message::HeadQuery, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(
            response,
            Message::Head {
                number: 0,
                hash: chain.genesis_hash()
            }
        );
        network.shutdown();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unexpected_request_answered_with_error() {
        let network = Network::start(chain(), config()).await.unwrap();

        let response = request(network.local_addr(), &Message::Ack, Duration::from_secs(2))
            .await
            .unwrap();
        assert!(matches!(response, Message::Error(_)));
        network.shutdown();
    }

    #[tokio::test]
    async fn test_unreachable_peer() {
        let result = request("127.0.0.1:1", &Message::HeadQuery, Duration::from_secs(2)).await;
        assert!(matches!(
            result,
            Err(NetworkError::PeerUnreachable { .. }) | Err(NetworkError::Timeout(_))
        ));
    }
}
