use std::error::Error;

use actix_web::{web, App, HttpServer};
use clap::Parser;
use log::{info, LevelFilter};
use tokio::net::lookup_host;
use tonic::transport::Server;

use chord_dht::threads::chord::chord_proto::chord_server::ChordServer;
use chord_dht::threads::chord::{chord_proto, ChordService};
use chord_dht::threads::maintenance::run_maintenance_loop;
use chord_dht::threads::setup::setup;
use chord_dht::threads::web as web_api;
use chord_dht::utils::cli::Cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();
    simple_logger::SimpleLogger::new()
        .env()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap();

    let node = setup(&args);

    let grpc_addr = lookup_host(&args.grpc_address)
        .await?
        .next()
        .ok_or_else(|| format!("cannot resolve {}", args.grpc_address))?;

    info!("Starting up gRPC service on {}", args.grpc_address);
    let grpc_node = node.clone();
    tokio::spawn(async move {
        let chord_service = ChordServer::new(ChordService::new(grpc_node));
        let reflection_service = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(chord_proto::FILE_DESCRIPTOR_SET)
            .build()
            .unwrap();

        Server::builder()
            .add_service(chord_service)
            .add_service(reflection_service)
            .serve(grpc_addr)
            .await
            .unwrap();
    });

    info!("Starting up maintenance loop");
    let maintenance_node = node.clone();
    tokio::spawn(async move { run_maintenance_loop(maintenance_node).await });

    info!("Starting up HTTP API on {}", args.http_address);
    let data = web::Data::from(node);
    HttpServer::new(move || App::new().app_data(data.clone()).configure(web_api::configure))
        .bind(&args.http_address)?
        .run()
        .await?;

    Ok(())
}
