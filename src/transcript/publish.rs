use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use crate::error::{DeskError, Result};

/// Durable destination for rendered transcripts
#[async_trait]
pub trait TranscriptPublisher: Send + Sync {
    /// Store `html` under `key` and return its public URL
    async fn publish(&self, key: &str, html: &str) -> Result<String>;
}

fn join_url(base: &str, key: &str) -> String {
    format!("{}/{key}", base.trim_end_matches('/'))
}

/// Writes transcripts into a local directory
///
/// Useful when the directory is served by a static web host; without a
/// public base the returned locator is a `file://` URL.
#[derive(Debug, Clone)]
pub struct DirectoryPublisher {
    root: PathBuf,
    public_base: Option<String>,
}

impl DirectoryPublisher {
    pub fn new(root: impl Into<PathBuf>, public_base: Option<String>) -> Self {
        Self {
            root: root.into(),
            public_base,
        }
    }
}

#[async_trait]
impl TranscriptPublisher for DirectoryPublisher {
    async fn publish(&self, key: &str, html: &str) -> Result<String> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| DeskError::ArchivePublishFailed(e.to_string()))?;
        let path = self.root.join(key);
        tokio::fs::write(&path, html)
            .await
            .map_err(|e| DeskError::ArchivePublishFailed(e.to_string()))?;
        debug!(path = %path.display(), "Wrote transcript");

        if let Some(base) = &self.public_base {
            return Ok(join_url(base, key));
        }
        let absolute = tokio::fs::canonicalize(&path)
            .await
            .map_err(|e| DeskError::ArchivePublishFailed(e.to_string()))?;
        reqwest::Url::from_file_path(&absolute)
            .map(String::from)
            .map_err(|()| {
                DeskError::ArchivePublishFailed(format!(
                    "Cannot express {} as a URL",
                    absolute.display()
                ))
            })
    }
}

/// Keeps transcripts in memory; used by the simulator and tests
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    base: String,
    documents: Mutex<HashMap<String, String>>,
    fail: AtomicBool,
}

impl MemoryPublisher {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            ..Self::default()
        }
    }

    /// Make every publish fail
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn document(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.documents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl TranscriptPublisher for MemoryPublisher {
    async fn publish(&self, key: &str, html: &str) -> Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DeskError::ArchivePublishFailed(
                "object storage unavailable".to_string(),
            ));
        }
        self.lock().insert(key.to_string(), html.to_string());
        Ok(join_url(&self.base, key))
    }
}

#[cfg(feature = "s3")]
pub use s3::S3Publisher;

#[cfg(feature = "s3")]
mod s3 {
    use async_trait::async_trait;
    use aws_config::BehaviorVersion;
    use aws_sdk_s3::Client as S3Client;
    use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Credentials, Region};
    use aws_sdk_s3::primitives::ByteStream;
    use aws_sdk_s3::types::ObjectCannedAcl;
    use tracing::info;

    use super::{TranscriptPublisher, join_url};
    use crate::config::S3Settings;
    use crate::error::{DeskError, Result};

    /// Uploads transcripts to an S3-compatible bucket with public-read access
    #[derive(Debug, Clone)]
    pub struct S3Publisher {
        client: S3Client,
        bucket: String,
        public_base: String,
    }

    impl S3Publisher {
        pub async fn connect(settings: &S3Settings) -> Self {
            let endpoint = if settings.endpoint.ends_with('/') {
                settings.endpoint.clone()
            } else {
                format!("{}/", settings.endpoint)
            };

            let base_config = aws_config::defaults(BehaviorVersion::latest())
                .endpoint_url(endpoint)
                .region(Region::new("auto"))
                .credentials_provider(Credentials::new(
                    settings.access_key.clone(),
                    settings.secret_key.clone(),
                    None,
                    None,
                    "static",
                ))
                .load()
                .await;

            let s3_config = S3ConfigBuilder::from(&base_config)
                .force_path_style(true)
                .build();

            Self {
                client: S3Client::from_conf(s3_config),
                bucket: settings.bucket.clone(),
                public_base: settings.public_base.clone(),
            }
        }
    }

    #[async_trait]
    impl TranscriptPublisher for S3Publisher {
        async fn publish(&self, key: &str, html: &str) -> Result<String> {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(ByteStream::from(html.as_bytes().to_vec()))
                .content_type("text/html")
                .acl(ObjectCannedAcl::PublicRead)
                .send()
                .await
                .map_err(|e| DeskError::ArchivePublishFailed(e.to_string()))?;
            info!(bucket = %self.bucket, key, "Uploaded transcript");
            Ok(join_url(&self.public_base, key))
        }
    }
}
