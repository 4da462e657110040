//! Client library: split a file into chunks, place them round-robin across
//! the manager-supplied active node list, and reverse the process to
//! reassemble a download with per-chunk integrity checks.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Semaphore;

use crate::chunk::{chunk_count, md5_hex, ChunkHeader};
use crate::config::CommonConfig;
use crate::error::ClientError;

/// Thin client over the manager and node HTTP APIs.
pub struct Client {
    manager_url: String,
    http: reqwest::Client,
    common: CommonConfig,
}

impl Client {
    pub fn new(manager_url: impl Into<String>, common: CommonConfig) -> Self {
        let request_timeout = Duration::from_secs(common.request_timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("reqwest client builds with a static config");
        Self {
            manager_url: manager_url.into(),
            http,
            common,
        }
    }

    /// Splits `path` into `ChunkSize`-sized chunks and uploads each to a
    /// node chosen round-robin from the manager's active node list. A
    /// zero-byte file registers as empty and uploads no chunks. Per-chunk
    /// upload failures are logged and do not abort the rest of the
    /// operation, but are reflected in the returned count.
    pub async fn upload(&self, path: &Path) -> Result<UploadSummary, ClientError> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::NotFound(path.display().to_string()))?
            .to_string();

        let file_size = tokio::fs::metadata(path).await?.len();
        let total_chunks = chunk_count(file_size, self.common.chunk_size);

        if total_chunks == 0 {
            self.register_empty_file(&filename).await?;
            return Ok(UploadSummary {
                total_chunks: 0,
                failed_chunks: Vec::new(),
            });
        }

        let node_urls = self.upload_request().await?;

        let mut file = tokio::fs::File::open(path).await?;
        let mut failed_chunks = Vec::new();

        for chunk_index in 0..total_chunks {
            let mut body = vec![0u8; self.common.chunk_size as usize];
            let mut filled = 0usize;
            while filled < body.len() {
                let n = file.read(&mut body[filled..]).await?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            body.truncate(filled);

            let header = ChunkHeader::new(chunk_index, filename.clone(), total_chunks, md5_hex(&body));
            let frame = header.frame(&body);
            let target = &node_urls[(chunk_index as usize) % node_urls.len()];

            if let Err(e) = self.upload_chunk(target, &filename, chunk_index, frame).await {
                tracing::warn!("failed to upload chunk {} of {}: {}", chunk_index, filename, e);
                failed_chunks.push(chunk_index);
            }
        }

        Ok(UploadSummary {
            total_chunks,
            failed_chunks,
        })
    }

    async fn upload_chunk(
        &self,
        node_url: &str,
        filename: &str,
        chunk_index: u64,
        frame: Vec<u8>,
    ) -> Result<(), ClientError> {
        let form = reqwest::multipart::Form::new()
            .text("filename", filename.to_string())
            .text("chunk_index", chunk_index.to_string())
            .part("file", reqwest::multipart::Part::bytes(frame));

        self.http
            .post(format!("{}/upload", node_url))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn register_empty_file(&self, filename: &str) -> Result<(), ClientError> {
        self.http
            .post(format!("{}/bus/manager", self.manager_url))
            .json(&crate::bus::ManagerMessage::RegisterEmptyFile {
                filename: filename.to_string(),
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn upload_request(&self) -> Result<Vec<String>, ClientError> {
        #[derive(serde::Deserialize)]
        struct Response {
            node_urls: Vec<String>,
        }
        let resp = self
            .http
            .post(format!("{}/upload_request", self.manager_url))
            .json(&serde_json::json!({ "filename": "" }))
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Err(ClientError::NoNodesAvailable);
        }
        let resp = resp.error_for_status()?;
        Ok(resp.json::<Response>().await?.node_urls)
    }

    /// Downloads `filename` to `destination`, aborting the whole operation
    /// on any missing chunk, transport error, or md5 mismatch. Fetches are
    /// bounded to `DownloadConcurrency` in flight.
    pub async fn download(&self, filename: &str, destination: &Path) -> Result<(), ClientError> {
        let locations = self.download_location(filename).await?;

        let semaphore = Arc::new(Semaphore::new(self.common.download_concurrency.max(1)));
        let mut in_flight = FuturesUnordered::new();
        for (&chunk_index, node_url) in &locations {
            let permit = semaphore.clone();
            let http = self.http.clone();
            let node_url = node_url.clone();
            let filename = filename.to_string();
            in_flight.push(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore is never closed");
                fetch_chunk(&http, &node_url, &filename, chunk_index).await
            });
        }

        let mut chunks: BTreeMap<u64, Vec<u8>> = BTreeMap::new();
        while let Some(result) = in_flight.next().await {
            let (chunk_index, body) = result?;
            chunks.insert(chunk_index, body);
        }

        let tmp_path = destination.with_extension("part");
        let mut tmp_file = tokio::fs::File::create(&tmp_path).await?;
        for (_, body) in chunks {
            tmp_file.write_all(&body).await?;
        }
        tmp_file.flush().await?;
        drop(tmp_file);
        tokio::fs::rename(&tmp_path, destination).await?;

        Ok(())
    }

    async fn download_location(&self, filename: &str) -> Result<BTreeMap<u64, String>, ClientError> {
        let resp = self
            .http
            .get(format!("{}/download_location/{}", self.manager_url, filename))
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(filename.to_string()));
        }
        let resp = resp.error_for_status()?;
        Ok(resp.json().await?)
    }

    /// Full directory snapshot.
    pub async fn list(&self) -> Result<crate::manager::DirectorySnapshot, ClientError> {
        let resp = self
            .http
            .get(format!("{}/list", self.manager_url))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    /// Removes a file and all of its chunks.
    pub async fn remove(&self, filename: &str) -> Result<(), ClientError> {
        let resp = self
            .http
            .delete(format!("{}/remove/{}", self.manager_url, filename))
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(filename.to_string()));
        }
        resp.error_for_status()?;
        Ok(())
    }
}

async fn fetch_chunk(
    http: &reqwest::Client,
    node_url: &str,
    filename: &str,
    chunk_index: u64,
) -> Result<(u64, Vec<u8>), ClientError> {
    let chunk_filename = format!("{}.chunk{}", filename, chunk_index);
    let resp = http
        .get(format!("{}/download/{}", node_url, chunk_filename))
        .send()
        .await?;
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(chunk_filename));
    }
    let payload = resp.error_for_status()?.bytes().await?;
    let (header, body) = ChunkHeader::parse(&payload).map_err(|e| ClientError::MalformedHeader(e.to_string()))?;

    if md5_hex(body) != header.md5 {
        return Err(ClientError::IntegrityMismatch {
            filename: filename.to_string(),
            chunk_index,
        });
    }

    Ok((chunk_index, body.to_vec()))
}

#[derive(Debug)]
pub struct UploadSummary {
    pub total_chunks: u64,
    pub failed_chunks: Vec<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_summary_reports_failures() {
        let summary = UploadSummary {
            total_chunks: 3,
            failed_chunks: vec![1],
        };
        assert_eq!(summary.total_chunks, 3);
        assert_eq!(summary.failed_chunks, vec![1]);
    }
}
