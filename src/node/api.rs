//! Storage node HTTP API: `POST /upload` (multipart),
//! `GET /download/<chunk_filename>`, `DELETE /delete/<chunk_filename>`,
//! plus the replication bus ingress `POST /bus/replicate`.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use super::NodeService;
use crate::bus::ReplicationMessage;
use crate::error::NodeError;

pub fn router(node: Arc<NodeService>) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .route("/download/:chunk_filename", get(download))
        .route("/delete/:chunk_filename", delete(delete_chunk))
        .route("/bus/replicate", post(bus_replicate))
        .with_state(node)
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let status = match &self {
            NodeError::NotFound(_) => StatusCode::NOT_FOUND,
            NodeError::Storage(_) | NodeError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            NodeError::MalformedHeader(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

/// Multipart fields: `filename`, `chunk_index`, `file` (the wire frame:
/// header line + body).
async fn upload(
    State(node): State<Arc<NodeService>>,
    mut multipart: Multipart,
) -> Result<StatusCode, NodeError> {
    let mut filename: Option<String> = None;
    let mut chunk_index: Option<u64> = None;
    let mut payload: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| NodeError::MalformedHeader(e.to_string()))?
    {
        match field.name() {
            Some("filename") => {
                filename = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| NodeError::MalformedHeader(e.to_string()))?,
                );
            }
            Some("chunk_index") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| NodeError::MalformedHeader(e.to_string()))?;
                chunk_index = Some(
                    text.parse()
                        .map_err(|_| NodeError::MalformedHeader("chunk_index is not a u64".into()))?,
                );
            }
            Some("file") => {
                payload = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| NodeError::MalformedHeader(e.to_string()))?
                        .to_vec(),
                );
            }
            _ => {}
        }
    }

    let filename = filename.ok_or_else(|| NodeError::MalformedHeader("missing filename field".into()))?;
    let chunk_index = chunk_index.ok_or_else(|| NodeError::MalformedHeader("missing chunk_index field".into()))?;
    let payload = payload.ok_or_else(|| NodeError::MalformedHeader("missing file field".into()))?;

    node.upload(&filename, chunk_index, &payload).await?;
    Ok(StatusCode::OK)
}

async fn download(
    State(node): State<Arc<NodeService>>,
    Path(chunk_filename): Path<String>,
) -> Result<Vec<u8>, NodeError> {
    node.download(&chunk_filename).await
}

async fn delete_chunk(
    State(node): State<Arc<NodeService>>,
    Path(chunk_filename): Path<String>,
) -> Result<StatusCode, NodeError> {
    node.delete(&chunk_filename).await?;
    Ok(StatusCode::OK)
}

async fn bus_replicate(
    State(node): State<Arc<NodeService>>,
    Json(message): Json<ReplicationMessage>,
) -> StatusCode {
    let ReplicationMessage::Replicate {
        filename,
        chunk_index,
        source_node_url,
        target_node_url,
    } = message;

    if target_node_url != node.advertise_url {
        tracing::warn!(
            "ignoring replication order addressed to {}, this node is {}",
            target_node_url,
            node.advertise_url
        );
        return StatusCode::OK;
    }

    if let Err(e) = node.replicate(&filename, chunk_index, &source_node_url).await {
        tracing::warn!(
            "failed to replicate {} chunk {} from {}: {}",
            filename,
            chunk_index,
            source_node_url,
            e
        );
    }
    StatusCode::OK
}
