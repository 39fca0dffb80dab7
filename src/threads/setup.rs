use std::sync::Arc;

use log::{info, warn};
use tokio::time::{sleep, Duration};

use crate::node::peer::GrpcPeer;
use crate::node::{ChordNode, DhtNode};
use crate::utils::cli::Cli;
use crate::utils::constants::{JOIN_RETRIES, JOIN_RETRY_SLEEP_MILLIS};
use crate::utils::types::Address;

/// Builds the node and distinguishes two scenarios:
/// 1. the node starts up a new ring (no peer given)
/// 2. the node joins an existing ring through the given peer
pub fn setup(args: &Cli) -> Arc<DhtNode> {
    let node = Arc::new(ChordNode::new(args.grpc_address.clone(), GrpcPeer::new()));
    match args.peer {
        Some(ref peer) => {
            info!("Joining existing ring via {}", peer);
            let node = node.clone();
            let peer = peer.clone();
            tokio::spawn(async move { join_with_retries(node, peer).await });
        }
        None => info!("Starting up a new ring"),
    }
    node
}

/// Startup join is retried a few times before the node gives up and stays
/// in a single-node ring.
async fn join_with_retries(node: Arc<DhtNode>, peer: Address) {
    for attempt in 1..=JOIN_RETRIES {
        sleep(Duration::from_millis(JOIN_RETRY_SLEEP_MILLIS)).await;
        match node.join(&peer).await {
            Ok(()) => return,
            Err(err) => warn!(
                "Join attempt {}/{} via {} failed: {}",
                attempt, JOIN_RETRIES, peer, err
            ),
        }
    }
    warn!("Unable to join via {}, staying in a single-node ring", peer);
}
