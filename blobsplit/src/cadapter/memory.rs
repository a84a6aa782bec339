//! 内存对象存储：用于本地开发/测试，可统计范围读取次数并注入失败。

use crate::cadapter::client::{ObjectBackend, ObjectMeta};
use crate::error::StoreError;
use crate::range::ByteRange;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Clone, Debug)]
struct MemObject {
    data: Bytes,
    content_type: Option<String>,
}

#[derive(Default)]
pub struct InMemoryBackend {
    objects: RwLock<HashMap<String, MemObject>>,
    range_reads: AtomicUsize,
    bytes_read: AtomicUsize,
    // 名称对应的操作会直接返回错误
    fail_op: Mutex<Option<&'static str>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, key: &str, data: impl Into<Bytes>, content_type: Option<&str>) {
        self.objects.write().await.insert(
            key.to_string(),
            MemObject {
                data: data.into(),
                content_type: content_type.map(str::to_string),
            },
        );
    }

    pub async fn contents(&self, key: &str) -> Option<Bytes> {
        self.objects.read().await.get(key).map(|o| o.data.clone())
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn range_reads(&self) -> usize {
        self.range_reads.load(Ordering::SeqCst)
    }

    pub fn bytes_read(&self) -> usize {
        self.bytes_read.load(Ordering::SeqCst)
    }

    /// Makes every later call of `op` (e.g. `"compose"`) fail.
    pub fn inject_failure(&self, op: &'static str) {
        *self.fail_op.lock().unwrap_or_else(|e| e.into_inner()) = Some(op);
    }

    fn check(&self, op: &'static str) -> Result<(), StoreError> {
        let fail = *self.fail_op.lock().unwrap_or_else(|e| e.into_inner());
        if fail == Some(op) {
            return Err(StoreError::backend(op, "injected failure"));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<MemObject, StoreError> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}

/// Slices `[start, end]` out of `data`, returning a short buffer past the end.
fn clip(data: &Bytes, start: u64, end: u64) -> Bytes {
    let len = data.len() as u64;
    if start >= len || end < start {
        return Bytes::new();
    }
    let stop = end.saturating_add(1).min(len);
    data.slice(start as usize..stop as usize)
}

#[async_trait]
impl ObjectBackend for InMemoryBackend {
    async fn head_object(&self, key: &str) -> Result<ObjectMeta, StoreError> {
        self.check("head_object")?;
        let obj = self.get(key).await?;
        Ok(ObjectMeta {
            size: obj.data.len() as u64,
            content_type: obj.content_type,
        })
    }

    async fn get_range(&self, key: &str, start: u64, end: u64) -> Result<Bytes, StoreError> {
        self.check("get_range")?;
        let obj = self.get(key).await?;
        let out = clip(&obj.data, start, end);
        self.range_reads.fetch_add(1, Ordering::SeqCst);
        self.bytes_read.fetch_add(out.len(), Ordering::SeqCst);
        Ok(out)
    }

    async fn put_object(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        self.check("put_object")?;
        self.insert(key, data, None).await;
        Ok(())
    }

    async fn compose(&self, sources: &[String], destination: &str) -> Result<(), StoreError> {
        self.check("compose")?;
        let mut buf = BytesMut::new();
        for source in sources {
            buf.extend_from_slice(&self.get(source).await?.data);
        }
        self.insert(destination, buf.freeze(), None).await;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        self.check("delete_object")?;
        match self.objects.write().await.remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    async fn set_content_type(&self, key: &str, content_type: &str) -> Result<(), StoreError> {
        self.check("set_content_type")?;
        let mut objects = self.objects.write().await;
        let obj = objects
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        obj.content_type = Some(content_type.to_string());
        Ok(())
    }

    async fn copy_range(
        &self,
        source: &str,
        range: ByteRange,
        destination: &str,
        content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        self.check("copy_range")?;
        // 服务端拷贝：不计入范围读取统计
        let obj = self.get(source).await?;
        self.insert(
            destination,
            clip(&obj.data, range.start, range.end),
            content_type,
        )
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_range_read_is_inclusive_and_short_past_end() {
        let backend = InMemoryBackend::new();
        backend.insert("obj", &b"0123456789"[..], None).await;

        assert_eq!(&backend.get_range("obj", 2, 4).await.unwrap()[..], b"234");
        assert_eq!(&backend.get_range("obj", 8, 100).await.unwrap()[..], b"89");
        assert!(backend.get_range("obj", 20, 30).await.unwrap().is_empty());
        assert_eq!(backend.range_reads(), 3);
        assert_eq!(backend.bytes_read(), 5);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let backend = InMemoryBackend::new();
        backend.insert("obj", &b"x"[..], None).await;
        backend.inject_failure("delete_object");
        assert!(matches!(
            backend.delete_object("obj").await,
            Err(StoreError::Backend { op: "delete_object", .. })
        ));
        assert!(backend.contents("obj").await.is_some());
    }

    #[tokio::test]
    async fn test_copy_range_sets_content_type() {
        let backend = InMemoryBackend::new();
        backend.insert("obj", &b"0123456789"[..], None).await;
        backend
            .copy_range("obj", ByteRange { start: 3, end: 5 }, "part", Some("text/csv"))
            .await
            .unwrap();
        let meta = backend.head_object("part").await.unwrap();
        assert_eq!(meta.size, 3);
        assert_eq!(meta.content_type.as_deref(), Some("text/csv"));
        assert_eq!(backend.range_reads(), 0);
    }
}
