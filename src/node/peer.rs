use std::time::Duration;

use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Request, Status};

use crate::node::error::NodeError;
use crate::threads::chord::chord_proto::chord_client::ChordClient;
use crate::threads::chord::chord_proto::{
    AddressMsg, Empty, GetRequest, GetStatus, HashPosMsg, NodeInfoResponse, NotifyRequest,
    PutRequest, UpdatePredecessorRequest,
};
use crate::utils::constants::{CONNECT_TIMEOUT_MILLIS, RPC_TIMEOUT_MILLIS};
use crate::utils::crypto::HashPos;
use crate::utils::types::Address;

/// A remote node's view of the ring, as returned by `GetNodeInfo`.
#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub address: Address,
    pub pos: HashPos,
    pub successor: Address,
    pub predecessor: Option<Address>,
    pub finger_table: Vec<Address>,
    pub successor_list: Vec<Address>,
}

/// The abstract peer RPC surface. Every call carries a bounded deadline and
/// is never retried at this layer; retry decisions belong to the caller. An
/// unreachable, dead or crashed peer is reported as
/// [`NodeError::Unreachable`], which carries no payload.
///
/// The trait seam exists so the lookup and maintenance engines can be
/// exercised against an in-memory ring in tests.
#[tonic::async_trait]
pub trait PeerRpc: Send + Sync + 'static {
    async fn node_info(&self, address: &Address) -> Result<PeerInfo, NodeError>;
    async fn predecessor(&self, address: &Address) -> Result<Option<Address>, NodeError>;
    async fn successor(&self, address: &Address) -> Result<Address, NodeError>;
    async fn successor_list(&self, address: &Address) -> Result<Vec<Address>, NodeError>;
    async fn notify(&self, address: &Address, candidate: &Address) -> Result<(), NodeError>;
    async fn update_predecessor(
        &self,
        address: &Address,
        predecessor: Option<&Address>,
    ) -> Result<(), NodeError>;
    async fn update_successor(
        &self,
        address: &Address,
        successor: &Address,
    ) -> Result<(), NodeError>;
    async fn find_successor(&self, address: &Address, pos: &HashPos) -> Result<Address, NodeError>;
    async fn storage_put(&self, address: &Address, key: &str, value: &str)
        -> Result<(), NodeError>;
    async fn storage_get(&self, address: &Address, key: &str) -> Result<String, NodeError>;
    async fn health(&self, address: &Address) -> Result<(), NodeError>;
}

/// Production [`PeerRpc`] implementation speaking the tonic protocol. The
/// client is stateless, a fresh channel is opened per call.
#[derive(Debug, Clone, Default)]
pub struct GrpcPeer;

impl GrpcPeer {
    pub fn new() -> Self {
        GrpcPeer
    }

    async fn connect(&self, address: &Address) -> Result<ChordClient<Channel>, NodeError> {
        let endpoint = Endpoint::from_shared(format!("http://{}", address))
            .map_err(|_| NodeError::InvalidRequest(format!("invalid peer address: {}", address)))?
            .connect_timeout(Duration::from_millis(CONNECT_TIMEOUT_MILLIS))
            .timeout(Duration::from_millis(RPC_TIMEOUT_MILLIS));
        let channel = endpoint.connect().await.map_err(|_| NodeError::Unreachable)?;
        Ok(ChordClient::new(channel))
    }
}

/// Maps a remote status onto the caller-side error kinds. A crashed peer
/// answers `UNAVAILABLE`, which a router treats the same as a dead one.
fn classify(status: Status) -> NodeError {
    match status.code() {
        Code::NotFound => NodeError::KeyNotFound,
        Code::FailedPrecondition => NodeError::NotResponsible,
        Code::InvalidArgument => NodeError::InvalidRequest(status.message().to_string()),
        _ => NodeError::Unreachable,
    }
}

fn malformed() -> NodeError {
    NodeError::InvalidRequest("malformed peer response".to_string())
}

impl TryFrom<NodeInfoResponse> for PeerInfo {
    type Error = NodeError;

    fn try_from(msg: NodeInfoResponse) -> Result<Self, NodeError> {
        let address = msg.address.map(|a| a.address).ok_or_else(malformed)?;
        let pos_bytes = msg.pos.ok_or_else(malformed)?.key;
        let pos = HashPos::try_from(pos_bytes.as_slice()).map_err(|_| malformed())?;
        let successor = msg.successor.map(|a| a.address).ok_or_else(malformed)?;
        let predecessor = msg.predecessor.map(|a| a.address).filter(|a| !a.is_empty());
        let finger_table = msg.finger_table.into_iter().map(|a| a.address).collect();
        let successor_list = msg
            .successor_list
            .map(|list| list.successors.into_iter().map(|a| a.address).collect())
            .unwrap_or_default();
        Ok(PeerInfo {
            address,
            pos,
            successor,
            predecessor,
            finger_table,
            successor_list,
        })
    }
}

#[tonic::async_trait]
impl PeerRpc for GrpcPeer {
    async fn node_info(&self, address: &Address) -> Result<PeerInfo, NodeError> {
        let mut client = self.connect(address).await?;
        let info = client
            .get_node_info(Request::new(Empty {}))
            .await
            .map_err(classify)?
            .into_inner();
        PeerInfo::try_from(info)
    }

    async fn predecessor(&self, address: &Address) -> Result<Option<Address>, NodeError> {
        let mut client = self.connect(address).await?;
        let response = client
            .get_predecessor(Request::new(Empty {}))
            .await
            .map_err(classify)?
            .into_inner();
        Ok(response
            .address_optional
            .map(|a| a.address)
            .filter(|a| !a.is_empty()))
    }

    async fn successor(&self, address: &Address) -> Result<Address, NodeError> {
        let mut client = self.connect(address).await?;
        let response = client
            .get_successor(Request::new(Empty {}))
            .await
            .map_err(classify)?
            .into_inner();
        Ok(response.address)
    }

    async fn successor_list(&self, address: &Address) -> Result<Vec<Address>, NodeError> {
        let mut client = self.connect(address).await?;
        let response = client
            .get_successor_list(Request::new(Empty {}))
            .await
            .map_err(classify)?
            .into_inner();
        Ok(response.successors.into_iter().map(|a| a.address).collect())
    }

    async fn notify(&self, address: &Address, candidate: &Address) -> Result<(), NodeError> {
        let mut client = self.connect(address).await?;
        client
            .notify(Request::new(NotifyRequest {
                address: Some(AddressMsg {
                    address: candidate.clone(),
                }),
            }))
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn update_predecessor(
        &self,
        address: &Address,
        predecessor: Option<&Address>,
    ) -> Result<(), NodeError> {
        let mut client = self.connect(address).await?;
        client
            .update_predecessor(Request::new(UpdatePredecessorRequest {
                address_optional: predecessor.map(|p| AddressMsg { address: p.clone() }),
            }))
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn update_successor(
        &self,
        address: &Address,
        successor: &Address,
    ) -> Result<(), NodeError> {
        let mut client = self.connect(address).await?;
        client
            .update_successor(Request::new(AddressMsg {
                address: successor.clone(),
            }))
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn find_successor(&self, address: &Address, pos: &HashPos) -> Result<Address, NodeError> {
        let mut client = self.connect(address).await?;
        let response = client
            .find_successor(Request::new(HashPosMsg {
                key: pos.to_be_bytes().to_vec(),
            }))
            .await
            .map_err(classify)?
            .into_inner();
        Ok(response.address)
    }

    async fn storage_put(
        &self,
        address: &Address,
        key: &str,
        value: &str,
    ) -> Result<(), NodeError> {
        let mut client = self.connect(address).await?;
        client
            .put(Request::new(PutRequest {
                key: key.to_string(),
                value: value.to_string(),
            }))
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn storage_get(&self, address: &Address, key: &str) -> Result<String, NodeError> {
        let mut client = self.connect(address).await?;
        let response = client
            .get(Request::new(GetRequest {
                key: key.to_string(),
            }))
            .await
            .map_err(classify)?
            .into_inner();
        match GetStatus::from_i32(response.status) {
            Some(GetStatus::Ok) => Ok(response.value),
            Some(GetStatus::NotFound) => Err(NodeError::KeyNotFound),
            None => Err(malformed()),
        }
    }

    async fn health(&self, address: &Address) -> Result<(), NodeError> {
        let mut client = self.connect(address).await?;
        client.health(Request::new(Empty {})).await.map_err(classify)?;
        Ok(())
    }
}
