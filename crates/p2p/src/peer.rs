//! Peer bookkeeping with exponential backoff.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Delay after the first failure; doubles with each further failure.
pub const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);
/// Consecutive failures after which a peer leaves the active set.
pub const MAX_FAILURES: u32 = 5;
pub const DEFAULT_REDIAL_INTERVAL: Duration = Duration::from_secs(60);

/// Backoff before the next attempt after `failures` consecutive failures.
pub fn backoff(failures: u32) -> Duration {
    if failures == 0 {
        return Duration::ZERO;
    }
    let shift = (failures - 1).min(16);
    INITIAL_BACKOFF.saturating_mul(1 << shift).min(MAX_BACKOFF)
}

#[derive(Debug, Clone)]
pub struct PeerState {
    pub addr: String,
    /// From the node configuration. Configured peers are never forgotten.
    pub configured: bool,
    pub active: bool,
    pub failures: u32,
    pub next_attempt: Instant,
}

/// What a failure did to a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Still active; retry after the given backoff.
    Backoff(Duration),
    /// Dropped from the active set; redialled after the given interval.
    Dropped(Duration),
    /// A learned peer that exhausted its retries and was forgotten.
    Forgotten,
    Unknown,
}

/// The set of peers this node gossips with.
#[derive(Debug)]
pub struct PeerSet {
    peers: Mutex<BTreeMap<String, PeerState>>,
    redial_interval: Duration,
}

impl PeerSet {
    pub fn new(configured: impl IntoIterator<Item = String>, redial_interval: Duration) -> Self {
        let now = Instant::now();
        let peers = configured
            .into_iter()
            .map(|addr| {
                let state = PeerState {
                    addr: addr.clone(),
                    configured: true,
                    active: true,
                    failures: 0,
                    next_attempt: now,
                };
                (addr, state)
            })
            .collect();
        Self {
            peers: Mutex::new(peers),
            redial_interval,
        }
    }

    /// Learn a peer from an inbound message. Returns true if it was new.
    pub fn add(&self, addr: &str) -> bool {
        let mut peers = self.peers.lock();
        if peers.contains_key(addr) {
            return false;
        }
        peers.insert(
            addr.to_string(),
            PeerState {
                addr: addr.to_string(),
                configured: false,
                active: true,
                failures: 0,
                next_attempt: Instant::now(),
            },
        );
        true
    }

    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.lock().is_empty()
    }

    pub fn get(&self, addr: &str) -> Option<PeerState> {
        self.peers.lock().get(addr).cloned()
    }

    pub fn is_active(&self, addr: &str) -> bool {
        self.peers.lock().get(addr).is_some_and(|p| p.active)
    }

    /// Gossip targets: active peers other than `exclude`.
    pub fn targets(&self, exclude: Option<&str>) -> Vec<String> {
        self.peers
            .lock()
            .values()
            .filter(|p| p.active && Some(p.addr.as_str()) != exclude)
            .map(|p| p.addr.clone())
            .collect()
    }

    /// Peers whose next sync or redial attempt is due.
    pub fn due(&self, now: Instant) -> Vec<String> {
        self.peers
            .lock()
            .values()
            .filter(|p| p.next_attempt <= now)
            .map(|p| p.addr.clone())
            .collect()
    }

    /// Mark a successful exchange; the next attempt is scheduled at `next`.
    pub fn record_success(&self, addr: &str, next: Instant) {
        if let Some(peer) = self.peers.lock().get_mut(addr) {
            peer.active = true;
            peer.failures = 0;
            peer.next_attempt = next;
        }
    }

    pub fn record_failure(&self, addr: &str, now: Instant) -> FailureOutcome {
        let mut peers = self.peers.lock();
        let Some(peer) = peers.get_mut(addr) else {
            return FailureOutcome::Unknown;
        };

        peer.failures = peer.failures.saturating_add(1);
        if peer.failures < MAX_FAILURES {
            let delay = backoff(peer.failures);
            peer.next_attempt = now + delay;
            return FailureOutcome::Backoff(delay);
        }

        if !peer.configured {
            peers.remove(addr);
            return FailureOutcome::Forgotten;
        }
        peer.active = false;
        peer.next_attempt = now + self.redial_interval;
        FailureOutcome::Dropped(self.redial_interval)
    }
}
