use std::sync::Arc;

use log::debug;
use tonic::{Request, Response, Status};

use crate::node::error::NodeError;
use crate::node::DhtNode;
use crate::threads::chord::chord_proto::{
    AddressMsg, Empty, GetPredecessorResponse, GetRequest, GetResponse, GetStatus, HashPosMsg,
    NodeInfoResponse, NotifyRequest, PutRequest, SuccessorListMsg, UpdatePredecessorRequest,
};
use crate::utils::crypto::HashPos;

pub mod chord_proto {
    tonic::include_proto!("chord");

    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("chord_descriptor");
}

/// The tonic service answering the peer RPC surface for the running node.
pub struct ChordService {
    node: Arc<DhtNode>,
}

impl ChordService {
    pub fn new(node: Arc<DhtNode>) -> Self {
        ChordService { node }
    }

    /// A crashed node answers "unavailable" on every call, making a
    /// simulated crash indistinguishable from a dead process for peers.
    fn guard(&self) -> Result<(), Status> {
        if self.node.is_crashed() {
            return Err(Status::unavailable("node is unavailable"));
        }
        Ok(())
    }
}

fn address_msg(address: String) -> AddressMsg {
    AddressMsg { address }
}

#[tonic::async_trait]
impl chord_proto::chord_server::Chord for ChordService {
    /// Resolves the node responsible for a position in the hash ring.
    async fn find_successor(
        &self,
        request: Request<HashPosMsg>,
    ) -> Result<Response<AddressMsg>, Status> {
        self.guard()?;
        let key = request.into_inner().key;
        let pos = HashPos::try_from(key.as_slice()).map_err(|len| {
            Status::invalid_argument(format!("expected a 20 byte ring position, got {} bytes", len))
        })?;
        let address = self.node.find_successor(&pos).await.map_err(Status::from)?;
        debug!("Received find_successor call for {}, successor is {}", pos, address);
        Ok(Response::new(address_msg(address)))
    }

    /// Returns this node's full view of the ring.
    async fn get_node_info(&self, _: Request<Empty>) -> Result<Response<NodeInfoResponse>, Status> {
        self.guard()?;
        let info = self.node.peer_info();
        Ok(Response::new(NodeInfoResponse {
            address: Some(address_msg(info.address)),
            pos: Some(HashPosMsg {
                key: info.pos.to_be_bytes().to_vec(),
            }),
            successor: Some(address_msg(info.successor)),
            predecessor: info.predecessor.map(address_msg),
            finger_table: info.finger_table.into_iter().map(address_msg).collect(),
            successor_list: Some(SuccessorListMsg {
                successors: info.successor_list.into_iter().map(address_msg).collect(),
            }),
        }))
    }

    async fn get_predecessor(
        &self,
        _: Request<Empty>,
    ) -> Result<Response<GetPredecessorResponse>, Status> {
        self.guard()?;
        Ok(Response::new(GetPredecessorResponse {
            address_optional: self.node.predecessor().map(address_msg),
        }))
    }

    async fn get_successor(&self, _: Request<Empty>) -> Result<Response<AddressMsg>, Status> {
        self.guard()?;
        Ok(Response::new(address_msg(self.node.successor())))
    }

    async fn get_successor_list(
        &self,
        _: Request<Empty>,
    ) -> Result<Response<SuccessorListMsg>, Status> {
        self.guard()?;
        Ok(Response::new(SuccessorListMsg {
            successors: self
                .node
                .successor_list()
                .into_iter()
                .map(address_msg)
                .collect(),
        }))
    }

    /// Notify call, typically issued by a node that believes it is our
    /// predecessor.
    async fn notify(&self, request: Request<NotifyRequest>) -> Result<Response<Empty>, Status> {
        self.guard()?;
        let candidate = request
            .into_inner()
            .address
            .ok_or_else(|| Status::invalid_argument("missing address"))?
            .address;
        self.node.handle_notify(candidate).map_err(Status::from)?;
        Ok(Response::new(Empty {}))
    }

    async fn update_predecessor(
        &self,
        request: Request<UpdatePredecessorRequest>,
    ) -> Result<Response<Empty>, Status> {
        self.guard()?;
        let predecessor = request.into_inner().address_optional.map(|a| a.address);
        self.node
            .force_set_predecessor(predecessor)
            .map_err(Status::from)?;
        Ok(Response::new(Empty {}))
    }

    async fn update_successor(
        &self,
        request: Request<AddressMsg>,
    ) -> Result<Response<Empty>, Status> {
        self.guard()?;
        let successor = request.into_inner().address;
        if successor.is_empty() {
            return Err(Status::invalid_argument("missing address"));
        }
        self.node
            .force_set_successor(successor)
            .map_err(Status::from)?;
        Ok(Response::new(Empty {}))
    }

    /// PUT operation on the key value storage, only accepted when this node
    /// is responsible for the key.
    async fn put(&self, request: Request<PutRequest>) -> Result<Response<Empty>, Status> {
        self.guard()?;
        let request = request.into_inner();
        self.node
            .serve_put(request.key, request.value)
            .map_err(Status::from)?;
        Ok(Response::new(Empty {}))
    }

    /// GET operation on the key value storage.
    async fn get(&self, request: Request<GetRequest>) -> Result<Response<GetResponse>, Status> {
        self.guard()?;
        let key = request.into_inner().key;
        match self.node.serve_get(&key) {
            Ok(value) => Ok(Response::new(GetResponse {
                value,
                status: GetStatus::Ok.into(),
            })),
            Err(NodeError::KeyNotFound) => Ok(Response::new(GetResponse {
                value: String::default(),
                status: GetStatus::NotFound.into(),
            })),
            Err(other) => Err(Status::from(other)),
        }
    }

    /// Dummy call used to check whether this node is still available.
    async fn health(&self, _: Request<Empty>) -> Result<Response<Empty>, Status> {
        self.guard()?;
        Ok(Response::new(Empty {}))
    }
}
