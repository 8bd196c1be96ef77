use std::path::Path;

use kan_core::KanResult;
use tokio::io::AsyncWriteExt;

/// Atomic file writer: temp file in the target's directory, fsync, then
/// rename into place. Readers see either the prior or the new content,
/// never a partial write.
pub struct AtomicWriter;

impl AtomicWriter {
    pub async fn write_atomic(path: &Path, data: &[u8]) -> KanResult<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(parent).await?;

        // Temp file in the same directory so the rename stays on one filesystem.
        let temp_file = tempfile::NamedTempFile::new_in(parent)?;
        let temp_path = temp_file.path().to_path_buf();

        {
            let mut file = tokio::fs::OpenOptions::new()
                .write(true)
                .open(&temp_path)
                .await?;
            file.write_all(data).await?;
            file.sync_all().await?;
        }

        tokio::fs::rename(&temp_path, path).await?;

        tracing::debug!(
            "Atomically wrote {} bytes to {}",
            data.len(),
            path.display()
        );
        Ok(())
    }

    pub async fn read_all(path: &Path) -> KanResult<Vec<u8>> {
        let data = tokio::fs::read(path).await?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_atomic_write_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("card.json");

        AtomicWriter::write_atomic(&path, b"{\"a\":1}").await.unwrap();
        assert_eq!(AtomicWriter::read_all(&path).await.unwrap(), b"{\"a\":1}");
    }

    #[tokio::test]
    async fn test_atomic_write_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        AtomicWriter::write_atomic(&path, b"first").await.unwrap();
        AtomicWriter::write_atomic(&path, b"second").await.unwrap();
        assert_eq!(AtomicWriter::read_all(&path).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_concurrent_writers_never_expose_partial_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("card.json");
        AtomicWriter::write_atomic(&path, br#"{"n":0}"#).await.unwrap();

        let writers: Vec<_> = (1..=8u32)
            .map(|n| {
                let path = path.clone();
                tokio::spawn(async move {
                    let body = format!(r#"{{"n":{n},"pad":"{}"}}"#, "x".repeat(4096));
                    AtomicWriter::write_atomic(&path, body.as_bytes()).await
                })
            })
            .collect();

        let reader = {
            let path = path.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    let bytes = AtomicWriter::read_all(&path).await.unwrap();
                    // Every observed snapshot parses; no torn writes.
                    serde_json::from_slice::<serde_json::Value>(&bytes).unwrap();
                    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                }
            })
        };

        for writer in writers {
            writer.await.unwrap().unwrap();
        }
        reader.await.unwrap();
    }

    #[tokio::test]
    async fn test_creates_missing_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("boards/main/cards/a_x.json");

        AtomicWriter::write_atomic(&path, b"{}").await.unwrap();
        assert!(path.exists());
    }
}
