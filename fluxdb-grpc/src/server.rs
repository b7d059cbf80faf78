// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! tonic server wiring and graceful shutdown.

use std::sync::Arc;

use tokio::sync::oneshot;
use tonic::transport::Server;
use tracing::{info, warn};

use fluxdb_state::FluxDb;

use crate::config::GrpcConfig;
use crate::error::GrpcError;
use crate::pb::state_server::StateServer;
use crate::public::StateService;

/// gRPC API content.
pub struct FluxGrpc {
    /// Link to the state engine.
    pub db: Arc<FluxDb>,
    /// gRPC configuration.
    pub grpc_config: GrpcConfig,
}

impl FluxGrpc {
    /// Start the gRPC API and return its stop handle.
    pub async fn serve(self) -> Result<StopHandle, GrpcError> {
        let config = self.grpc_config.clone();

        let service = StateServer::new(StateService {
            db: self.db,
            config: config.clone(),
        })
        .max_decoding_message_size(config.max_decoding_message_size)
        .max_encoding_message_size(config.max_encoding_message_size);

        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        info!(bind = %config.bind, "starting gRPC API");
        tokio::spawn(async move {
            if let Err(e) = Server::builder()
                .add_service(service)
                .serve_with_shutdown(config.bind, async move {
                    stop_rx.await.ok();
                    info!("gRPC API stop signal received");
                })
                .await
            {
                warn!(error = %e, "gRPC API server stopped with error");
            }
        });

        Ok(StopHandle { stop_tx })
    }
}

/// Handle used to gracefully stop the running gRPC API.
pub struct StopHandle {
    stop_tx: oneshot::Sender<()>,
}

impl StopHandle {
    /// Request a graceful shutdown.
    pub fn stop(self) {
        if self.stop_tx.send(()).is_err() {
            warn!("gRPC API server already down");
        }
    }
}
