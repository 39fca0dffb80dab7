//! Connects to a list of running nodes and checks that they form a
//! consistent ring: predecessor linkage, successor lists and finger targets
//! are validated against the ordering of the node ids.

use std::env;

use tonic::transport::Channel;
use tonic::Request;

use chord_dht::threads::chord::chord_proto::chord_client::ChordClient;
use chord_dht::threads::chord::chord_proto::{Empty, NodeInfoResponse};
use chord_dht::utils::crypto::HashPos;

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() == 1 {
        panic!("Provide at least one node address");
    }

    let mut summaries: Vec<NodeInfoResponse> = Vec::new();
    for address in args.iter().skip(1) {
        let mut client: ChordClient<Channel> =
            ChordClient::connect(format!("http://{}", address))
                .await
                .unwrap();
        let info = client
            .get_node_info(Request::new(Empty {}))
            .await
            .unwrap()
            .into_inner();
        summaries.push(info);
    }

    summaries.sort_by_key(pos_of);
    let members: Vec<String> = summaries.iter().map(address_of).collect();

    let mut is_valid = true;

    // each node's predecessor must be the previous node on the ring
    for i in 0..summaries.len() {
        let current = address_of(&summaries[i]);
        let next = &summaries[(i + 1) % summaries.len()];
        let next_predecessor = next.predecessor.clone().map(|a| a.address);
        if next_predecessor.as_deref() != Some(current.as_str()) {
            eprintln!(
                "Node {} has wrong predecessor: {:?}, expected {}",
                address_of(next),
                next_predecessor,
                current
            );
            is_valid = false;
        }
    }

    // successor lists must walk the ring in order
    for (i, info) in summaries.iter().enumerate() {
        let successors = info
            .successor_list
            .as_ref()
            .map(|list| list.successors.clone())
            .unwrap_or_default();
        for (j, successor) in successors.iter().enumerate() {
            let expected = &members[(i + j + 1) % members.len()];
            if &successor.address != expected {
                eprintln!(
                    "Node {} has wrong successor list entry {}: {}, expected {}",
                    address_of(info),
                    j,
                    successor.address,
                    expected
                );
                is_valid = false;
            }
        }
    }

    // every finger must point at a live ring member
    for info in &summaries {
        for finger in &info.finger_table {
            if !members.contains(&finger.address) {
                eprintln!(
                    "Node {} has a finger pointing outside the ring: {}",
                    address_of(info),
                    finger.address
                );
                is_valid = false;
            }
        }
    }

    if is_valid {
        eprintln!("Looks good!")
    } else {
        eprintln!("Ring is invalid!")
    }
}

fn pos_of(info: &NodeInfoResponse) -> HashPos {
    let bytes = info.pos.clone().unwrap().key;
    HashPos::try_from(bytes.as_slice()).unwrap()
}

fn address_of(info: &NodeInfoResponse) -> String {
    info.address.clone().unwrap().address
}
