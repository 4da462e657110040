//! Node-local chunk storage: a flat directory of `<filename>.chunk<index>`
//! blobs. Writes are temp-file-then-rename so a reader never observes a
//! partially written chunk.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub fn chunk_path(storage_dir: &Path, chunk_filename: &str) -> PathBuf {
    storage_dir.join(chunk_filename)
}

pub fn chunk_filename(filename: &str, chunk_index: u64) -> String {
    format!("{}.chunk{}", filename, chunk_index)
}

/// Writes `data` to `<storage_dir>/<chunk_filename>` atomically.
pub async fn write_chunk_atomic(
    storage_dir: &Path,
    chunk_filename: &str,
    data: &[u8],
) -> std::io::Result<()> {
    tokio::fs::create_dir_all(storage_dir).await?;
    let final_path = chunk_path(storage_dir, chunk_filename);
    let tmp_path = storage_dir.join(format!(".{}.tmp-{}", chunk_filename, rand::random::<u64>()));

    let mut tmp_file = File::create(&tmp_path).await?;
    tmp_file.write_all(data).await?;
    tmp_file.flush().await?;
    drop(tmp_file);

    tokio::fs::rename(&tmp_path, &final_path).await
}

/// Reads the full stored bytes (header line + body) for a chunk, or `None`
/// if it isn't present.
pub async fn read_chunk(storage_dir: &Path, chunk_filename: &str) -> std::io::Result<Option<Vec<u8>>> {
    let path = chunk_path(storage_dir, chunk_filename);
    match File::open(&path).await {
        Ok(mut file) => {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf).await?;
            Ok(Some(buf))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Removes a chunk if present. Idempotent: a missing chunk is not an
/// error.
pub async fn delete_chunk(storage_dir: &Path, chunk_filename: &str) -> std::io::Result<bool> {
    let path = chunk_path(storage_dir, chunk_filename);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        write_chunk_atomic(dir.path(), "f.bin.chunk0", b"payload")
            .await
            .unwrap();
        let read = read_chunk(dir.path(), "f.bin.chunk0").await.unwrap();
        assert_eq!(read, Some(b"payload".to_vec()));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write_chunk_atomic(dir.path(), "f.bin.chunk0", b"x")
            .await
            .unwrap();
        assert!(delete_chunk(dir.path(), "f.bin.chunk0").await.unwrap());
        assert!(!delete_chunk(dir.path(), "f.bin.chunk0").await.unwrap());
    }

    #[tokio::test]
    async fn read_missing_chunk_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_chunk(dir.path(), "missing.chunk0").await.unwrap(), None);
    }
}
