//! Background block production.

use crate::blockchain::{Blockchain, ChainError};
use powchain_consensus::{CancelToken, MineOutcome};
use powchain_core::Keypair;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Sleep granularity while waiting out the block time.
const IDLE_SLICE: Duration = Duration::from_millis(50);

/// Mines blocks on a dedicated thread until stopped.
///
/// Each round drains the mempool, mines on the current head and, once a
/// block lands, waits `block_time` before the next round. A round whose
/// head is replaced by a peer block is cancelled and restarted at once.
pub struct MiningLoop {
    stop: Arc<AtomicBool>,
    current: Arc<parking_lot::Mutex<CancelToken>>,
    handle: Option<JoinHandle<()>>,
}

impl MiningLoop {
    pub fn spawn(chain: Arc<Blockchain>, keypair: Keypair, block_time: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let current = Arc::new(parking_lot::Mutex::new(CancelToken::new()));

        let handle = {
            let stop = stop.clone();
            let current = current.clone();
            thread::Builder::new()
                .name("miner".into())
                .spawn(move || run(chain, keypair, block_time, stop, current))
                .ok()
        };
        if handle.is_none() {
            error!("Failed to spawn mining thread");
        }

        Self {
            stop,
            current,
            handle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop mining and wait for the thread to exit.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.current.lock().cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Mining thread panicked");
            }
        }
    }
}

impl Drop for MiningLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    chain: Arc<Blockchain>,
    keypair: Keypair,
    block_time: Duration,
    stop: Arc<AtomicBool>,
    current: Arc<parking_lot::Mutex<CancelToken>>,
) {
    info!(miner = %keypair.address(), difficulty = chain.config().difficulty, "Mining started");
    let max_txs = chain.config().max_block_transactions;

    while !stop.load(Ordering::SeqCst) {
        let cancel = CancelToken::new();
        *current.lock() = cancel.clone();
        if stop.load(Ordering::SeqCst) {
            break;
        }

        let transactions = match chain.pending_transactions(max_txs) {
            Ok(txs) => txs,
            Err(e) => {
                error!(error = %e, "Failed to read mempool; stopping miner");
                break;
            }
        };

        match chain.add_block(Vec::new(), transactions, &cancel, &keypair) {
            Ok(MineOutcome::Mined(_)) => idle(block_time, &stop),
            Ok(MineOutcome::Cancelled) => debug!("Mining round cancelled"),
            Err(e) if e.is_fatal() => {
                error!(error = %e, "Fatal chain error; stopping miner");
                break;
            }
            // Our block lost a race to a peer block at the same height.
            Err(ChainError::Invalid(e)) => debug!(error = %e, "Mined block no longer valid"),
            Err(e) => warn!(error = %e, "Mining round failed"),
        }
    }
    info!("Mining stopped");
}

fn idle(duration: Duration, stop: &AtomicBool) {
    let mut remaining = duration;
    while !remaining.is_zero() && !stop.load(Ordering::SeqCst) {
        let slice = remaining.min(IDLE_SLICE);
        thread::sleep(slice);
        remaining -= slice;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChainConfig;
    use crate::genesis::Genesis;
    use powchain_storage::Storage;
    use std::time::Instant;

    #[test]
    fn test_mining_loop_produces_blocks() {
        let config = ChainConfig {
            difficulty: 4,
            ..ChainConfig::default()
        };
        let chain = Arc::new(
            Blockchain::open(Storage::open_temporary().unwrap(), config, Genesis::default()).unwrap(),
        );

        let mut miner = MiningLoop::spawn(chain.clone(), Keypair::generate(), Duration::from_millis(10));
        let deadline = Instant::now() + Duration::from_secs(10);
        while chain.height() < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        miner.stop();

        assert!(chain.height() >= 3);
        assert!(!miner.is_running());
    }

    #[test]
    fn test_stop_interrupts_hard_target() {
        let config = ChainConfig {
            difficulty: 64,
            ..ChainConfig::default()
        };
        let chain = Arc::new(
            Blockchain::open(Storage::open_temporary().unwrap(), config, Genesis::default()).unwrap(),
        );

        let mut miner = MiningLoop::spawn(chain.clone(), Keypair::generate(), Duration::from_secs(1));
        thread::sleep(Duration::from_millis(50));
        let started = Instant::now();
        miner.stop();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(chain.height(), 0);
    }
}
