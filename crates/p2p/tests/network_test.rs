//! Two-node gossip and sync over loopback TCP.

use powchain_chain::{Blockchain, ChainConfig, Genesis, Origin};
use powchain_consensus::CancelToken;
use powchain_core::{Address, Amount, Keypair, Transaction};
use powchain_p2p::{Network, NetworkConfig};
use powchain_storage::Storage;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn chain(alice: &Keypair) -> Arc<Blockchain> {
    let config = ChainConfig {
        difficulty: 4,
        ..ChainConfig::default()
    };
    let genesis = Genesis::new([(alice.address(), Amount::from(1000u32))]);
    Arc::new(Blockchain::open(Storage::open_temporary().unwrap(), config, genesis).unwrap())
}

fn network_config(peers: Vec<String>) -> NetworkConfig {
    NetworkConfig {
        listen_addr: "127.0.0.1:0".into(),
        peers,
        peer_timeout: Duration::from_secs(2),
        sync_interval: Duration::from_millis(200),
        ..NetworkConfig::default()
    }
}

fn mine(chain: &Blockchain, miner: &Keypair) {
    let txs = chain.pending_transactions(100).unwrap();
    chain
        .add_block(Vec::new(), txs, &CancelToken::new(), miner)
        .unwrap();
}

async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    condition()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_new_node_catches_up() {
    let alice = Keypair::generate();
    let miner = Keypair::generate();
    let chain_a = chain(&alice);
    for _ in 0..3 {
        mine(&chain_a, &miner);
    }
    let node_a = Network::start(chain_a.clone(), network_config(vec![])).await.unwrap();

    let chain_b = chain(&alice);
    let node_b = Network::start(chain_b.clone(), network_config(vec![node_a.local_addr().to_string()]))
        .await
        .unwrap();

    assert!(wait_until(|| chain_b.height() == 3).await);
    assert_eq!(chain_b.current_head().hash, chain_a.current_head().hash);
    assert_eq!(chain_b.state_root().unwrap(), chain_a.state_root().unwrap());

    node_a.shutdown();
    node_b.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_transaction_and_block_gossip() {
    let alice = Keypair::generate();
    let chain_a = chain(&alice);
    let chain_b = chain(&alice);
    let node_a = Network::start(chain_a.clone(), network_config(vec![])).await.unwrap();
    let node_b = Network::start(chain_b.clone(), network_config(vec![node_a.local_addr().to_string()]))
        .await
        .unwrap();

    // B gossips to A, and A learns B from the gossip.
    let tx = Transaction::transfer(alice.address(), Address([0xBB; 20]), 500u64, 100u64, 0)
        .signed(&alice);
    chain_b.submit_transaction(tx, Origin::Local).unwrap();
    assert!(wait_until(|| chain_a.mempool_len() == 1).await);
    assert!(node_a.peers().get(node_b.local_addr()).is_some());

    mine(&chain_a, &Keypair::generate());
    assert_eq!(chain_a.height(), 1);
    assert!(wait_until(|| chain_b.height() == 1).await);
    assert!(wait_until(|| chain_b.mempool_len() == 0).await);
    assert_eq!(
        chain_b.account(&Address([0xBB; 20])).unwrap().balance,
        Amount::from(500u32)
    );

    node_a.shutdown();
    node_b.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sync_adopts_longer_fork() {
    let alice = Keypair::generate();
    let chain_a = chain(&alice);
    let chain_b = chain(&alice);
    let node_a = Network::start(chain_a.clone(), network_config(vec![])).await.unwrap();
    let node_b = Network::start(chain_b.clone(), network_config(vec![])).await.unwrap();

    let (miner_a, miner_b) = (Keypair::generate(), Keypair::generate());
    for _ in 0..3 {
        mine(&chain_a, &miner_a);
    }
    mine(&chain_b, &miner_b);
    mine(&chain_b, &miner_b);

    let imported = node_b.sync_with(node_a.local_addr()).await.unwrap();
    assert!(imported >= 1);
    assert_eq!(chain_b.current_head().hash, chain_a.current_head().hash);
    assert_eq!(chain_b.state_root().unwrap(), chain_a.state_root().unwrap());

    // Nothing left to fetch.
    assert_eq!(node_b.sync_with(node_a.local_addr()).await.unwrap(), 0);

    node_a.shutdown();
    node_b.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_foreign_genesis_does_not_attach() {
    let chain_a = chain(&Keypair::generate());
    let chain_b = chain(&Keypair::generate());
    mine(&chain_a, &Keypair::generate());
    let node_a = Network::start(chain_a, network_config(vec![])).await.unwrap();
    let node_b = Network::start(chain_b.clone(), network_config(vec![])).await.unwrap();

    assert!(node_b.sync_with(node_a.local_addr()).await.is_err());
    assert_eq!(chain_b.height(), 0);

    node_a.shutdown();
    node_b.shutdown();
}
