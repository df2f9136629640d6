//! S3-compatible object store adapter, built on the `object_store` crate.
//!
//! Grounded on `rde-io/src/sink_iceberg.rs`'s `AmazonS3Builder` usage,
//! generalized to the full `ObjectStore` capability
//! (`get`/`put`/`head`/`list`/`list_common_prefixes`), with exponential
//! backoff + jitter per-call.

use crate::retry::RetryPolicy;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use kl3m_core::{KlError, KlResult, ObjectStore};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore as ObjectStoreBackend, PutPayload};
use std::sync::Arc;

pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub allow_http: bool,
    pub retry: RetryPolicy,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: "data.kl3m.ai".to_string(),
            region: std::env::var("AWS_REGION")
                .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
                .unwrap_or_else(|_| "us-east-2".to_string()),
            endpoint: None,
            access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
            secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
            allow_http: false,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct S3ObjectStore {
    inner: Arc<dyn ObjectStoreBackend>,
    retry: RetryPolicy,
}

impl S3ObjectStore {
    pub fn new(config: S3Config) -> anyhow::Result<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_allow_http(config.allow_http);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(key) = &config.access_key_id {
            builder = builder.with_access_key_id(key);
        }
        if let Some(secret) = &config.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }

        let inner = builder.build()?;
        Ok(Self {
            inner: Arc::new(inner),
            retry: config.retry,
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, key: &str) -> KlResult<Vec<u8>> {
        let path = ObjectPath::from(key);
        let bytes = self
            .retry
            .run(|| async {
                self.inner
                    .get(&path)
                    .await?
                    .bytes()
                    .await
                    .map_err(|e| e.into())
            })
            .await
            .map_err(|e: object_store::Error| KlError::TransientIo(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> KlResult<()> {
        let path = ObjectPath::from(key);
        self.retry
            .run(|| {
                let payload = PutPayload::from(bytes.clone());
                async { self.inner.put(&path, payload).await.map(|_| ()) }
            })
            .await
            .map_err(|e: object_store::Error| KlError::TransientIo(e.to_string()))
    }

    async fn head(&self, key: &str) -> KlResult<bool> {
        let path = ObjectPath::from(key);
        match self.inner.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(KlError::TransientIo(e.to_string())),
        }
    }

    fn list(&self, prefix: &str) -> BoxStream<'_, KlResult<String>> {
        let path = ObjectPath::from(prefix);
        self.inner
            .list(Some(&path))
            .map(|res| res.map(|m| m.location.to_string()).map_err(|e| KlError::TransientIo(e.to_string())))
            .boxed()
    }

    async fn list_common_prefixes(&self, prefix: &str, _delimiter: &str) -> KlResult<Vec<String>> {
        let path = ObjectPath::from(prefix);
        let listing = self
            .inner
            .list_with_delimiter(Some(&path))
            .await
            .map_err(|e| KlError::TransientIo(e.to_string()))?;
        Ok(listing
            .common_prefixes
            .into_iter()
            .map(|p| p.to_string())
            .collect())
    }
}
