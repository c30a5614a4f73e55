use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Query};
use axum::http::header;
use axum::response::IntoResponse;
use std::sync::Arc;

use super::protocol::*;
use super::service::Master;
use crate::error::Result;

pub async fn handle_init_mapping(
    Extension(master): Extension<Arc<Master>>,
    Json(req): Json<InitMappingRequest>,
) -> Result<Json<AckResponse>> {
    master.init_mapping(req.records).await?;
    Ok(Json(AckResponse { success: true }))
}

pub async fn handle_write(
    Extension(master): Extension<Arc<Master>>,
    Query(query): Query<WriteQuery>,
    body: Bytes,
) -> Result<Json<AckResponse>> {
    master
        .write_bytes(&query.filename, query.offset, body.to_vec())
        .await?;
    Ok(Json(AckResponse { success: true }))
}

pub async fn handle_read(
    Extension(master): Extension<Arc<Master>>,
    Query(query): Query<ReadQuery>,
) -> Result<impl IntoResponse> {
    let bytes = master
        .read_bytes(&query.filename, query.offset, query.count)
        .await?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes))
}

pub async fn handle_create(
    Extension(master): Extension<Arc<Master>>,
    Json(req): Json<FileRequest>,
) -> Result<Json<AckResponse>> {
    master.create_file(&req.filename).await?;
    Ok(Json(AckResponse { success: true }))
}

pub async fn handle_delete(
    Extension(master): Extension<Arc<Master>>,
    Json(req): Json<FileRequest>,
) -> Result<Json<AckResponse>> {
    master.delete_file(&req.filename).await?;
    Ok(Json(AckResponse { success: true }))
}

pub async fn handle_exists(
    Extension(master): Extension<Arc<Master>>,
    Json(req): Json<FileRequest>,
) -> Result<Json<ExistsResponse>> {
    let exists = master.file_exists(&req.filename).await?;
    Ok(Json(ExistsResponse { exists }))
}

pub async fn handle_register(
    Extension(master): Extension<Arc<Master>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>> {
    let response = master.register_peer(&req.address).await?;
    Ok(Json(response))
}

pub async fn handle_status(Extension(master): Extension<Arc<Master>>) -> Json<StatusResponse> {
    Json(master.status().await)
}
