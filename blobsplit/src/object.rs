//! A named object in the store, read through byte ranges.

use crate::cadapter::client::{ObjectBackend, ObjectClient};
use crate::error::StoreError;
use bytes::Bytes;
use tracing::{debug, warn};

pub struct RemoteObject<B: ObjectBackend> {
    client: ObjectClient<B>,
    name: String,
}

impl<B: ObjectBackend> RemoteObject<B> {
    pub fn new(client: ObjectClient<B>, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &ObjectClient<B> {
        &self.client
    }

    /// Total size in bytes. Always asks the store; callers cache it per operation.
    pub async fn size(&self) -> Result<u64, StoreError> {
        self.client.get_size(&self.name).await
    }

    pub async fn content_type(&self) -> Result<Option<String>, StoreError> {
        self.client.get_content_type(&self.name).await
    }

    /// Loads the inclusive byte range `[start, end]`.
    ///
    /// A negative `start` is clamped to zero. An `end` before `start` yields
    /// empty content without touching the store. An `end` past the object
    /// size is left to the backend, which normally returns fewer bytes.
    pub async fn load_content(&self, start: i64, end: i64) -> Result<Bytes, StoreError> {
        let start = if start < 0 {
            warn!(object = %self.name, start, "negative start offset, clamping to 0");
            0
        } else {
            start
        };
        if end < start {
            debug!(object = %self.name, start, end, "empty range, skipping read");
            return Ok(Bytes::new());
        }
        self.read_range(start as u64, end as u64).await
    }

    pub async fn read_range(&self, start: u64, end: u64) -> Result<Bytes, StoreError> {
        self.client.get_range(&self.name, start, end).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cadapter::memory::InMemoryBackend;

    async fn hundred_byte_object() -> RemoteObject<InMemoryBackend> {
        let backend = InMemoryBackend::new();
        let data: Vec<u8> = (0..100u8).collect();
        backend.insert("numbers", data, Some("application/octet-stream")).await;
        RemoteObject::new(ObjectClient::new(backend), "numbers")
    }

    #[tokio::test]
    async fn test_negative_start_is_clamped() {
        let obj = hundred_byte_object().await;
        let clamped = obj.load_content(-5, 10).await.unwrap();
        let plain = obj.load_content(0, 10).await.unwrap();
        assert_eq!(clamped, plain);
        assert_eq!(clamped.len(), 11);
    }

    #[tokio::test]
    async fn test_inverted_range_skips_read() {
        let obj = hundred_byte_object().await;
        let out = obj.load_content(50, 10).await.unwrap();
        assert!(out.is_empty());
        assert_eq!(obj.client().backend().range_reads(), 0);
    }

    #[tokio::test]
    async fn test_end_past_size_is_store_defined() {
        let obj = hundred_byte_object().await;
        let out = obj.load_content(95, 500).await.unwrap();
        assert_eq!(&out[..], &[95, 96, 97, 98, 99]);
    }

    #[tokio::test]
    async fn test_metadata() {
        let obj = hundred_byte_object().await;
        assert_eq!(obj.size().await.unwrap(), 100);
        assert_eq!(
            obj.content_type().await.unwrap().as_deref(),
            Some("application/octet-stream")
        );
        let missing = RemoteObject::new(obj.client().clone(), "absent");
        assert!(matches!(missing.size().await, Err(StoreError::NotFound(_))));
    }
}
