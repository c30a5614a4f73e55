use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Query};
use axum::http::header;
use axum::response::IntoResponse;
use std::sync::Arc;

use super::protocol::*;
use super::service::PeerService;
use crate::error::Result;

pub async fn handle_ping(Json(req): Json<PingMessage>) -> Json<PingMessage> {
    tracing::trace!("Ping {}", req.token);
    Json(req)
}

pub async fn handle_shutdown(
    Extension(service): Extension<Arc<PeerService>>,
) -> Json<PeerAckResponse> {
    tracing::info!("Shutdown requested by master");
    service.request_shutdown();
    Json(PeerAckResponse { success: true })
}

pub async fn handle_exists(
    Extension(service): Extension<Arc<PeerService>>,
    Json(req): Json<PeerFileRequest>,
) -> Result<Json<PeerExistsResponse>> {
    let exists = service.store().exists(&req.filename).await?;
    Ok(Json(PeerExistsResponse { exists }))
}

pub async fn handle_create(
    Extension(service): Extension<Arc<PeerService>>,
    Json(req): Json<PeerFileRequest>,
) -> Result<Json<PeerAckResponse>> {
    service.store().create(&req.filename).await?;
    Ok(Json(PeerAckResponse { success: true }))
}

pub async fn handle_delete(
    Extension(service): Extension<Arc<PeerService>>,
    Json(req): Json<PeerFileRequest>,
) -> Result<Json<PeerAckResponse>> {
    let removed = service.store().delete(&req.filename).await?;
    if !removed {
        tracing::debug!("Delete of missing file({}) ignored", req.filename);
    }
    Ok(Json(PeerAckResponse { success: true }))
}

pub async fn handle_read(
    Extension(service): Extension<Arc<PeerService>>,
    Query(query): Query<PeerReadQuery>,
) -> Result<impl IntoResponse> {
    let bytes = service
        .store()
        .read(&query.filename, query.offset, query.count)
        .await?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes))
}

pub async fn handle_write(
    Extension(service): Extension<Arc<PeerService>>,
    Query(query): Query<PeerWriteQuery>,
    body: Bytes,
) -> Result<Json<PeerAckResponse>> {
    service
        .store()
        .write(&query.filename, query.offset, &body)
        .await?;
    Ok(Json(PeerAckResponse { success: true }))
}
