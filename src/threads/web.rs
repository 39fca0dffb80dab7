use actix_web::{get, post, put, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::node::error::NodeError;
use crate::node::DhtNode;

#[derive(Serialize)]
struct NodeInfoView {
    address: String,
    node_hash: String,
    successor: String,
    predecessor: Option<String>,
    finger_table: Vec<String>,
    successor_list: Vec<String>,
}

#[derive(Serialize)]
struct FingerTableView {
    fingertable: Vec<String>,
}

#[derive(Serialize)]
struct SuccessorView {
    successor: String,
}

#[derive(Serialize)]
struct PredecessorView {
    predecessor: Option<String>,
}

#[derive(Deserialize)]
struct JoinQuery {
    nprime: Option<String>,
}

fn error_response(err: NodeError) -> HttpResponse {
    match err {
        NodeError::KeyNotFound => HttpResponse::NotFound().body("Key not found"),
        NodeError::Unavailable => HttpResponse::ServiceUnavailable().body("Node is crashed"),
        NodeError::Unreachable => HttpResponse::BadGateway().body("Peer is unreachable"),
        NodeError::NotResponsible => {
            HttpResponse::BadGateway().body("Responsibility moved while forwarding")
        }
        NodeError::InvalidRequest(message) => HttpResponse::BadRequest().body(message),
        NodeError::RingInconsistent => {
            HttpResponse::InternalServerError().body("Ring is inconsistent")
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(helloworld)
        .service(get_storage)
        .service(put_storage)
        .service(join)
        .service(leave)
        .service(sim_crash)
        .service(sim_recover)
        .service(fingertable)
        .service(node_info)
        .service(successor)
        .service(predecessor);
}

#[get("/helloworld")]
async fn helloworld(node: web::Data<DhtNode>) -> impl Responder {
    if node.is_crashed() {
        return error_response(NodeError::Unavailable);
    }
    HttpResponse::Ok().body(node.address().clone())
}

#[get("/storage/{key}")]
async fn get_storage(key: web::Path<String>, node: web::Data<DhtNode>) -> impl Responder {
    match node.get(&key.into_inner()).await {
        Ok(value) => HttpResponse::Ok().content_type("text/plain").body(value),
        Err(err) => error_response(err),
    }
}

#[put("/storage/{key}")]
async fn put_storage(
    key: web::Path<String>,
    body: web::Bytes,
    node: web::Data<DhtNode>,
) -> impl Responder {
    let value = match std::str::from_utf8(&body) {
        Ok(value) => value.to_string(),
        Err(_) => {
            return error_response(NodeError::InvalidRequest(
                "value must be valid UTF-8".to_string(),
            ))
        }
    };
    match node.put(&key.into_inner(), &value).await {
        Ok(()) => HttpResponse::Ok().content_type("text/plain").body("Value stored"),
        Err(err) => error_response(err),
    }
}

#[post("/join")]
async fn join(query: web::Query<JoinQuery>, node: web::Data<DhtNode>) -> impl Responder {
    if node.is_crashed() {
        return error_response(NodeError::Unavailable);
    }
    let nprime = match query.into_inner().nprime {
        Some(nprime) if !nprime.is_empty() => nprime,
        _ => {
            return error_response(NodeError::InvalidRequest(
                "missing nprime parameter".to_string(),
            ))
        }
    };
    match node.join(&nprime).await {
        Ok(()) => HttpResponse::Ok().body(format!("Joined the ring via {}", nprime)),
        Err(err @ NodeError::Unreachable) => {
            // an unreachable bootstrap peer is the caller's mistake here
            HttpResponse::BadRequest().body(err.to_string())
        }
        Err(err) => error_response(err),
    }
}

#[post("/leave")]
async fn leave(node: web::Data<DhtNode>) -> impl Responder {
    if node.is_crashed() {
        return error_response(NodeError::Unavailable);
    }
    match node.leave().await {
        Ok(()) => HttpResponse::Ok().body("Left the ring"),
        Err(err) => error_response(err),
    }
}

#[post("/sim-crash")]
async fn sim_crash(node: web::Data<DhtNode>) -> impl Responder {
    if node.is_crashed() {
        return error_response(NodeError::Unavailable);
    }
    node.sim_crash();
    HttpResponse::Ok().body("Node crashed, all responses disabled")
}

/// The only endpoint exempt from the crashed guard, otherwise a crashed
/// node could never come back.
#[post("/sim-recover")]
async fn sim_recover(node: web::Data<DhtNode>) -> impl Responder {
    node.sim_recover().await;
    HttpResponse::Ok().body("Node recovered, responses enabled")
}

#[get("/fingertable")]
async fn fingertable(node: web::Data<DhtNode>) -> impl Responder {
    if node.is_crashed() {
        return error_response(NodeError::Unavailable);
    }
    HttpResponse::Ok().json(FingerTableView {
        fingertable: node.finger_addresses(),
    })
}

#[get("/node-info")]
async fn node_info(node: web::Data<DhtNode>) -> impl Responder {
    if node.is_crashed() {
        return error_response(NodeError::Unavailable);
    }
    let info = node.peer_info();
    HttpResponse::Ok().json(NodeInfoView {
        address: info.address,
        node_hash: info.pos.to_string(),
        successor: info.successor,
        predecessor: info.predecessor,
        finger_table: info.finger_table,
        successor_list: info.successor_list,
    })
}

#[get("/successor")]
async fn successor(node: web::Data<DhtNode>) -> impl Responder {
    if node.is_crashed() {
        return error_response(NodeError::Unavailable);
    }
    HttpResponse::Ok().json(SuccessorView {
        successor: node.successor(),
    })
}

#[get("/predecessor")]
async fn predecessor(node: web::Data<DhtNode>) -> impl Responder {
    if node.is_crashed() {
        return error_response(NodeError::Unavailable);
    }
    HttpResponse::Ok().json(PredecessorView {
        predecessor: node.predecessor(),
    })
}
