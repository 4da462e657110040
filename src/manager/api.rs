//! Manager HTTP API: `POST /upload_request`,
//! `GET /download_location/<filename>`, `GET /list`,
//! `DELETE /remove/<filename>`, plus the bus ingress endpoint
//! `POST /bus/manager` nodes publish `ManagerMessage`s to.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::ManagerService;
use crate::bus::ManagerMessage;
use crate::error::ManagerError;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ManagerService>,
    pub http: reqwest::Client,
}

pub fn router(manager: Arc<ManagerService>) -> Router {
    let request_timeout = Duration::from_secs(manager.common().request_timeout_secs);
    let http = reqwest::Client::builder()
        .timeout(request_timeout)
        .build()
        .expect("reqwest client builds with a static config");
    let state = AppState { manager, http };

    Router::new()
        .route("/upload_request", post(upload_request))
        .route("/download_location/:filename", get(download_location))
        .route("/list", get(list))
        .route("/remove/:filename", delete(remove))
        .route("/bus/manager", post(bus_ingress))
        .with_state(state)
}

impl IntoResponse for ManagerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ManagerError::NoNodesAvailable => StatusCode::SERVICE_UNAVAILABLE,
            ManagerError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        (status, self.to_string()).into_response()
    }
}

#[derive(Deserialize)]
pub struct UploadRequestBody {
    #[allow(dead_code)]
    pub filename: String,
}

#[derive(Serialize)]
pub struct UploadRequestResponse {
    pub node_urls: Vec<String>,
}

async fn upload_request(
    State(state): State<AppState>,
    Json(_body): Json<UploadRequestBody>,
) -> Result<Json<UploadRequestResponse>, ManagerError> {
    let node_urls = state.manager.upload_request().await?;
    Ok(Json(UploadRequestResponse { node_urls }))
}

async fn download_location(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<BTreeMap<u64, String>>, ManagerError> {
    let locations = state.manager.download_location(&filename).await?;
    Ok(Json(locations))
}

async fn list(State(state): State<AppState>) -> Json<super::DirectorySnapshot> {
    Json(state.manager.list().await)
}

async fn remove(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<StatusCode, ManagerError> {
    state.manager.remove(&state.http, &filename).await?;
    Ok(StatusCode::OK)
}

async fn bus_ingress(State(state): State<AppState>, Json(message): Json<ManagerMessage>) -> StatusCode {
    state.manager.handle_message(message).await;
    StatusCode::OK
}
