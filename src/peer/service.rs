use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Extension, Router};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use super::handlers::*;
use super::protocol::*;
use super::store::LocalStore;
use crate::client::DfsClient;
use crate::error::{DfsError, Result};
use crate::master::protocol::RegisterResponse;

/// One storage node: the local store plus the signal that stops its server.
pub struct PeerService {
    store: LocalStore,
    shutdown: Notify,
}

impl PeerService {
    pub async fn open(fsdir: impl Into<PathBuf>) -> Result<Arc<Self>> {
        let store = LocalStore::open(fsdir).await?;
        Ok(Arc::new(Self {
            store,
            shutdown: Notify::new(),
        }))
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Makes `serve` stop accepting requests and return.
    pub fn request_shutdown(&self) {
        self.shutdown.notify_one();
    }

    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route(ENDPOINT_PING, post(handle_ping))
            .route(ENDPOINT_SHUTDOWN, post(handle_shutdown))
            .route(ENDPOINT_EXISTS, post(handle_exists))
            .route(ENDPOINT_CREATE, post(handle_create))
            .route(ENDPOINT_DELETE, post(handle_delete))
            .route(ENDPOINT_READ, get(handle_read))
            .route(ENDPOINT_WRITE, post(handle_write))
            .layer(DefaultBodyLimit::disable())
            .layer(Extension(self.clone()))
    }

    /// Serves the peer protocol on `listener` until a shutdown is requested.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        let app = self.router();
        let service = self.clone();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                service.shutdown.notified().await;
                tracing::info!("Peer server shutting down");
            })
            .await?;

        Ok(())
    }
}

/// Announces `advertise` to the master, retrying while the master is unreachable.
///
/// Rejections such as a full cluster are returned immediately.
pub async fn register_with_master(
    client: &DfsClient,
    advertise: &str,
    attempts: usize,
) -> Result<RegisterResponse> {
    let mut delay_ms = 200u64;

    for attempt in 0..attempts {
        match client.register_peer(advertise).await {
            Ok(response) => {
                tracing::info!(
                    "Registered with master {} as {} ({} peer(s) registered, ready={})",
                    client.base_url(),
                    advertise,
                    response.registered,
                    response.ready
                );
                return Ok(response);
            }
            Err(e) if e.is_transport() && attempt + 1 < attempts => {
                tracing::warn!(
                    "Master {} unreachable (attempt {}/{}): {}",
                    client.base_url(),
                    attempt + 1,
                    attempts,
                    e
                );
                let jitter = rand::random::<u64>() % 100;
                tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                delay_ms = (delay_ms * 2).min(5000);
            }
            Err(e) => return Err(e),
        }
    }

    Err(DfsError::transport(
        client.base_url(),
        "registration attempts exhausted",
    ))
}
