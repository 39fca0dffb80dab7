use clap::Parser;

use crate::utils::types::Address;

#[derive(Parser, Debug)]
#[command(name = "node", about = "A node of the Chord distributed hash table")]
pub struct Cli {
    /// address the peer RPC service binds to, also this node's ring identity
    #[arg(long = "grpc")]
    pub grpc_address: Address,

    /// address the client-facing HTTP API binds to
    #[arg(long = "http")]
    pub http_address: Address,

    /// peer RPC address of an existing node to join at startup
    #[arg(long = "peer")]
    pub peer: Option<Address>,
}
