use std::sync::Arc;

use log::debug;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::node::peer::PeerRpc;
use crate::node::ChordNode;
use crate::utils::constants::STABILIZE_INTERVAL_MILLIS;

/// Periodic ring maintenance: one stabilize, fix_fingers and
/// check_predecessor round per tick. All three are skipped while the node
/// simulates a crash.
pub async fn run_maintenance_loop<P: PeerRpc>(node: Arc<ChordNode<P>>) {
    let mut ticker = interval(Duration::from_millis(STABILIZE_INTERVAL_MILLIS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if node.is_crashed() {
            debug!("Node is crashed, skipping maintenance tick");
            continue;
        }
        node.stabilize().await;
        node.fix_fingers().await;
        node.check_predecessor().await;
    }
}
