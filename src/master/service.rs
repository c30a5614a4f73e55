use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Extension, Router};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

use super::handlers::*;
use super::protocol::*;
use crate::cluster::{Cluster, HttpConnector, PeerConnector, Registration};
use crate::config::MasterConfig;
use crate::error::{DfsError, Result};
use crate::stripe::{MAX_REQUEST_BYTES, RecordSizes, StripeCoordinator};

/// The coordinator facade.
///
/// Owns the peer registry and the stripe coordinator for the lifetime of the
/// process. Handlers receive it through an `Extension`; nothing is global.
pub struct Master {
    cluster: Arc<Cluster>,
    stripes: StripeCoordinator,
}

impl Master {
    pub fn new(config: &MasterConfig) -> Result<Arc<Self>> {
        let connector = HttpConnector::new(config.health.dial_timeout, config.call_timeout)?;
        Ok(Self::with_connector(config, Arc::new(connector)))
    }

    pub fn with_connector(config: &MasterConfig, connector: Arc<dyn PeerConnector>) -> Arc<Self> {
        let cluster = Cluster::new(config.target_size, connector, config.health);
        let stripes = StripeCoordinator::new(cluster.clone(), config.call_timeout);
        Arc::new(Self { cluster, stripes })
    }

    pub fn cluster(&self) -> &Arc<Cluster> {
        &self.cluster
    }

    pub async fn register_peer(&self, address: &str) -> Result<RegisterResponse> {
        let added = match self.cluster.register(address).await? {
            Registration::Added { registered } => {
                tracing::info!(
                    "Peer {} registered ({}/{})",
                    address.trim(),
                    registered,
                    self.cluster.target_size()
                );
                true
            }
            Registration::AlreadyKnown => false,
        };

        Ok(RegisterResponse {
            added,
            registered: self.cluster.len().await,
            ready: self.cluster.is_ready(),
        })
    }

    pub async fn init_mapping(&self, records: RecordSizes) -> Result<()> {
        self.stripes.init_mapping(records).await
    }

    pub async fn write_bytes(&self, filename: &str, offset: i32, data: Vec<u8>) -> Result<()> {
        self.ensure_ready()?;
        let offset = non_negative("offset", offset)?;
        self.stripes.write_bytes(filename, offset, data).await
    }

    pub async fn read_bytes(&self, filename: &str, offset: i32, count: i32) -> Result<Vec<u8>> {
        self.ensure_ready()?;
        let offset = non_negative("offset", offset)?;
        let count = non_negative("count", count)?;
        self.stripes.read_bytes(filename, offset, count).await
    }

    pub async fn create_file(&self, filename: &str) -> Result<()> {
        self.ensure_ready()?;
        self.stripes.create_file(filename).await
    }

    pub async fn delete_file(&self, filename: &str) -> Result<()> {
        self.ensure_ready()?;
        self.stripes.delete_file(filename).await
    }

    pub async fn file_exists(&self, filename: &str) -> Result<bool> {
        self.ensure_ready()?;
        self.stripes.file_exists(filename).await
    }

    pub async fn status(&self) -> StatusResponse {
        StatusResponse {
            target_size: self.cluster.target_size(),
            ready: self.cluster.is_ready(),
            record_map_set: self.stripes.has_mapping().await,
            peers: self.cluster.snapshot().await,
        }
    }

    /// Stops every connected peer. Returns how many acknowledged.
    pub async fn shutdown_peers(&self) -> usize {
        self.cluster.shutdown().await
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.cluster.is_ready() {
            Ok(())
        } else {
            Err(DfsError::NotReady)
        }
    }

    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route(ENDPOINT_INIT_MAPPING, post(handle_init_mapping))
            .route(ENDPOINT_WRITE, post(handle_write))
            .route(ENDPOINT_READ, get(handle_read))
            .route(ENDPOINT_CREATE, post(handle_create))
            .route(ENDPOINT_DELETE, post(handle_delete))
            .route(ENDPOINT_EXISTS, post(handle_exists))
            .route(ENDPOINT_REGISTER, post(handle_register))
            .route(ENDPOINT_STATUS, get(handle_status))
            .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES as usize))
            .layer(Extension(self.clone()))
    }

    /// Serves the master contract on `listener` until `shutdown` resolves.
    pub async fn serve<F>(self: Arc<Self>, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

fn non_negative(name: &str, value: i32) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| DfsError::misaligned(format!("{} {} is negative", name, value)))
}
