//! High-level client API for the object store
//!
//! `ObjectBackend` is the seam every store implementation plugs into; the
//! splitter and the header composer only ever talk to `ObjectClient`, which
//! wraps a backend and traces each remote call.

use crate::error::StoreError;
use crate::range::ByteRange;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

/// Metadata returned by a HEAD-style request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectMeta {
    pub size: u64,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait ObjectBackend: Send + Sync {
    async fn head_object(&self, key: &str) -> Result<ObjectMeta, StoreError>;

    /// Reads `[start, end]`, both inclusive. Reading past the end of the
    /// object is store-defined; backends usually return a short buffer.
    async fn get_range(&self, key: &str, start: u64, end: u64) -> Result<Bytes, StoreError>;

    async fn put_object(&self, key: &str, data: Bytes) -> Result<(), StoreError>;

    /// Concatenates `sources` in order into a new object at `destination`.
    async fn compose(&self, sources: &[String], destination: &str) -> Result<(), StoreError>;

    async fn delete_object(&self, key: &str) -> Result<(), StoreError>;

    async fn set_content_type(&self, key: &str, content_type: &str) -> Result<(), StoreError>;

    /// Copies `range` of `source` into a new object, created with
    /// `content_type` when given. Backends with a server-side copy should
    /// override this.
    async fn copy_range(
        &self,
        source: &str,
        range: ByteRange,
        destination: &str,
        content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        let data = self.get_range(source, range.start, range.end).await?;
        self.put_object(destination, data).await?;
        match content_type {
            Some(ct) => self.set_content_type(destination, ct).await,
            None => Ok(()),
        }
    }
}

/// Cheaply cloneable handle to a backend.
pub struct ObjectClient<B: ObjectBackend> {
    backend: Arc<B>,
}

impl<B: ObjectBackend> Clone for ObjectClient<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: ObjectBackend> ObjectClient<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn head_object(&self, key: &str) -> Result<ObjectMeta, StoreError> {
        let meta = self.backend.head_object(key).await?;
        debug!(key, size = meta.size, content_type = ?meta.content_type, "head object");
        Ok(meta)
    }

    pub async fn get_size(&self, key: &str) -> Result<u64, StoreError> {
        Ok(self.head_object(key).await?.size)
    }

    pub async fn get_content_type(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.head_object(key).await?.content_type)
    }

    pub async fn get_range(&self, key: &str, start: u64, end: u64) -> Result<Bytes, StoreError> {
        debug!(key, start, end, "range read");
        self.backend.get_range(key, start, end).await
    }

    pub async fn put_object(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        debug!(key, len = data.len(), "put object");
        self.backend.put_object(key, data).await
    }

    pub async fn compose(&self, sources: &[String], destination: &str) -> Result<(), StoreError> {
        debug!(?sources, destination, "compose objects");
        self.backend.compose(sources, destination).await
    }

    pub async fn copy_range(
        &self,
        source: &str,
        range: ByteRange,
        destination: &str,
        content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        debug!(source, start = range.start, end = range.end, destination, "copy range");
        self.backend
            .copy_range(source, range, destination, content_type)
            .await
    }

    pub async fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        debug!(key, "delete object");
        self.backend.delete_object(key).await
    }

    pub async fn set_content_type(&self, key: &str, content_type: &str) -> Result<(), StoreError> {
        debug!(key, content_type, "set content type");
        self.backend.set_content_type(key, content_type).await
    }
}
