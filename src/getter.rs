//! Byte-range readers
//!
//! Every read the validator performs goes through a [`Getter`]: a stateless,
//! re-entrant `get(begin, end)` over a local file, an HTTP URL or an in-memory
//! buffer. Handles are shared as `Arc<dyn Getter>` between the cascade and the
//! scan workers; no call depends on the state left behind by another.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::{Result, ValidationError};
use crate::http_client::{HttpGetter, HttpGetterConfig};

/// Shared handle to a byte-range reader
pub type SharedGetter = Arc<dyn Getter>;

/// Reads the half-open byte range `begin..end` of a source
#[async_trait]
pub trait Getter: Send + Sync {
    async fn get(&self, begin: u64, end: u64) -> Result<Vec<u8>>;

    /// Human-readable identifier used in error messages and report names
    fn describe(&self) -> String;
}

/// Local file reader. The file is stat'ed once; each read reopens it.
#[derive(Debug, Clone)]
pub struct FileGetter {
    path: PathBuf,
    length: u64,
}

impl FileGetter {
    /// Open a local file. This is the only failure in the validator that is
    /// fatal to a run: without any bytes no diagnosis is possible.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(ValidationError::InvalidSource {
                source_name: path.display().to_string(),
                reason: "not a regular file".to_string(),
            });
        }

        Ok(Self {
            path,
            length: metadata.len(),
        })
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Getter for FileGetter {
    async fn get(&self, begin: u64, end: u64) -> Result<Vec<u8>> {
        check_range(&self.describe(), begin, end, self.length)?;
        if begin == end {
            return Ok(Vec::new());
        }

        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(begin)).await?;
        let mut buffer = vec![0u8; (end - begin) as usize];
        file.read_exact(&mut buffer).await?;
        Ok(buffer)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory reader, mostly useful for tests and for callers that already hold
/// the bytes
#[derive(Debug, Clone)]
pub struct MemoryGetter {
    name: String,
    data: Arc<Vec<u8>>,
}

impl MemoryGetter {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data: Arc::new(data),
        }
    }
}

#[async_trait]
impl Getter for MemoryGetter {
    async fn get(&self, begin: u64, end: u64) -> Result<Vec<u8>> {
        check_range(&self.name, begin, end, self.data.len() as u64)?;
        Ok(self.data[begin as usize..end as usize].to_vec())
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

fn check_range(source_name: &str, begin: u64, end: u64, length: u64) -> Result<()> {
    if begin > end || end > length {
        return Err(ValidationError::OutOfRange {
            source_name: source_name.to_string(),
            begin,
            end,
            length,
        });
    }
    Ok(())
}

/// Returns true when `source` should be read over HTTP
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Build the getter for a path or URL
pub async fn create_getter(source: &str, http_config: &HttpGetterConfig) -> Result<SharedGetter> {
    if is_url(source) {
        Ok(Arc::new(HttpGetter::new(source, http_config.clone())?))
    } else {
        Ok(Arc::new(FileGetter::open(source).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_memory_getter_reads_range() {
        let getter = MemoryGetter::new("mem", (0u8..10).collect());
        assert_eq!(getter.get(2, 5).await.unwrap(), vec![2, 3, 4]);
        assert!(getter.get(4, 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_getter_out_of_range() {
        let getter = MemoryGetter::new("mem", vec![0; 4]);
        let error = getter.get(0, 375).await.unwrap_err();
        match error {
            ValidationError::OutOfRange { length, end, .. } => {
                assert_eq!(length, 4);
                assert_eq!(end, 375);
            }
            other => panic!("Expected OutOfRange, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_file_getter_concurrent_reads() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&(0u8..=255).collect::<Vec<_>>()).unwrap();
        file.flush().unwrap();

        let getter = Arc::new(FileGetter::open(file.path()).await.unwrap());
        assert_eq!(getter.len(), 256);

        let reads = (0..8u64).map(|i| {
            let getter = Arc::clone(&getter);
            async move { getter.get(i * 32, i * 32 + 4).await }
        });
        let results = futures::future::join_all(reads).await;
        for (i, result) in results.into_iter().enumerate() {
            let base = (i * 32) as u8;
            assert_eq!(result.unwrap(), vec![base, base + 1, base + 2, base + 3]);
        }
    }

    #[tokio::test]
    async fn test_file_getter_missing_file_is_fatal() {
        let result = FileGetter::open("/nonexistent/cloud.copc.laz").await;
        assert!(matches!(result, Err(ValidationError::Io(_))));
    }

    #[tokio::test]
    async fn test_file_getter_rejects_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = FileGetter::open(dir.path()).await;
        assert!(matches!(result, Err(ValidationError::InvalidSource { .. })));
    }

    #[tokio::test]
    async fn test_empty_file_opens_but_reads_fail() {
        let file = NamedTempFile::new().unwrap();
        let getter = FileGetter::open(file.path()).await.unwrap();
        assert!(getter.is_empty());
        assert!(getter.get(0, 1).await.is_err());
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/autzen.copc.laz"));
        assert!(is_url("http://localhost:8080/a.laz"));
        assert!(!is_url("/data/autzen.copc.laz"));
        assert!(!is_url("s3://bucket/key"));
    }
}
