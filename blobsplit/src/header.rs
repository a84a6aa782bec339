//! Prepends a header line to an object by composing `[header, source]` server-side.

use crate::cadapter::client::{ObjectBackend, ObjectClient};
use crate::config::DEFAULT_LINE_BREAK;
use crate::error::{HeaderError, StoreError};
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

const MAX_TEMP_NAME_ATTEMPTS: usize = 8;

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// A fresh temporary name per call: nanosecond timestamp plus a process-wide counter.
pub fn temporary_header_name(source: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{source}.header-{nanos}-{seq}.tmp")
}

pub fn default_output_name(source: &str) -> String {
    format!("{source}-with-header")
}

pub struct HeaderComposer<B: ObjectBackend> {
    client: ObjectClient<B>,
    line_break: u8,
}

impl<B: ObjectBackend> HeaderComposer<B> {
    pub fn new(client: ObjectClient<B>) -> Self {
        Self {
            client,
            line_break: DEFAULT_LINE_BREAK,
        }
    }

    pub fn with_line_break(mut self, line_break: u8) -> Self {
        self.line_break = line_break;
        self
    }

    pub async fn prepend_header(&self, header: &str, source: &str) -> Result<String, HeaderError> {
        self.prepend_header_to(header, source, &default_output_name(source))
            .await
    }

    /// Writes `header` (terminated by the line break) followed by the whole
    /// of `source` into `destination`, copying the source content type.
    pub async fn prepend_header_to(
        &self,
        header: &str,
        source: &str,
        destination: &str,
    ) -> Result<String, HeaderError> {
        let content_type = match self.client.get_content_type(source).await {
            Ok(ct) => ct,
            Err(StoreError::NotFound(_)) => {
                return Err(HeaderError::MissingSource(source.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut line = header.as_bytes().to_vec();
        if line.last() != Some(&self.line_break) {
            line.push(self.line_break);
        }
        let temp = self.unused_temporary_name(source).await?;
        self.client.put_object(&temp, Bytes::from(line)).await?;

        let composed = async {
            self.client
                .compose(&[temp.clone(), source.to_string()], destination)
                .await?;
            if let Some(ct) = content_type.as_deref() {
                self.client.set_content_type(destination, ct).await?;
            }
            Ok::<_, StoreError>(())
        }
        .await;

        if let Err(e) = composed {
            if let Err(cleanup) = self.client.delete_object(&temp).await {
                warn!(temp = %temp, "failed to remove temporary header object: {cleanup}");
            }
            return Err(e.into());
        }

        self.client.delete_object(&temp).await?;
        info!(source, destination, "header prepended");
        Ok(destination.to_string())
    }

    /// Picks a temporary name that no existing object uses.
    async fn unused_temporary_name(&self, source: &str) -> Result<String, StoreError> {
        for _ in 0..MAX_TEMP_NAME_ATTEMPTS {
            let candidate = temporary_header_name(source);
            match self.client.head_object(&candidate).await {
                Err(StoreError::NotFound(_)) => return Ok(candidate),
                Ok(_) => debug!(candidate = %candidate, "temporary name taken, retrying"),
                Err(e) => return Err(e),
            }
        }
        Err(StoreError::backend(
            "put_object",
            format!("no free temporary header name for {source}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cadapter::memory::InMemoryBackend;

    async fn composer_with_source(content_type: Option<&str>) -> HeaderComposer<InMemoryBackend> {
        let backend = InMemoryBackend::new();
        backend
            .insert("sales.csv", b"1,2,3\n4,5,6\n".to_vec(), content_type)
            .await;
        HeaderComposer::new(ObjectClient::new(backend))
    }

    #[tokio::test]
    async fn test_prepend_header_adds_line_break() {
        let composer = composer_with_source(Some("text/csv")).await;
        let out = composer.prepend_header("a,b,c", "sales.csv").await.unwrap();
        assert_eq!(out, "sales.csv-with-header");

        let backend = composer.client.backend();
        let combined = backend.contents(&out).await.unwrap();
        assert_eq!(&combined[..], b"a,b,c\n1,2,3\n4,5,6\n");
        let meta = backend.head_object(&out).await.unwrap();
        assert_eq!(meta.content_type.as_deref(), Some("text/csv"));
        // temporary object removed, source untouched
        assert_eq!(
            backend.keys().await,
            vec!["sales.csv".to_string(), "sales.csv-with-header".to_string()]
        );
        assert_eq!(
            &backend.contents("sales.csv").await.unwrap()[..],
            b"1,2,3\n4,5,6\n"
        );
    }

    #[tokio::test]
    async fn test_header_with_existing_break_is_not_doubled() {
        let composer = composer_with_source(None).await;
        let out = composer
            .prepend_header_to("a,b,c\n", "sales.csv", "out.csv")
            .await
            .unwrap();
        let backend = composer.client.backend();
        assert_eq!(&backend.contents(&out).await.unwrap()[..], b"a,b,c\n1,2,3\n4,5,6\n");
        assert_eq!(backend.head_object(&out).await.unwrap().content_type, None);
    }

    #[tokio::test]
    async fn test_missing_source() {
        let composer = HeaderComposer::new(ObjectClient::new(InMemoryBackend::new()));
        assert!(matches!(
            composer.prepend_header("h", "ghost.csv").await,
            Err(HeaderError::MissingSource(name)) if name == "ghost.csv"
        ));
        assert!(composer.client.backend().keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_compose_failure_cleans_up_temporary_object() {
        let composer = composer_with_source(Some("text/csv")).await;
        composer.client.backend().inject_failure("compose");
        let err = composer.prepend_header("a,b,c", "sales.csv").await.unwrap_err();
        assert!(matches!(
            err,
            HeaderError::Store(StoreError::Backend { op: "compose", .. })
        ));
        assert_eq!(composer.client.backend().keys().await, vec!["sales.csv".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_failure_is_fatal() {
        let composer = composer_with_source(None).await;
        composer.client.backend().inject_failure("delete_object");
        let err = composer.prepend_header("a,b,c", "sales.csv").await.unwrap_err();
        assert!(matches!(
            err,
            HeaderError::Store(StoreError::Backend { op: "delete_object", .. })
        ));
    }

    #[test]
    fn test_temporary_names_are_unique() {
        let a = temporary_header_name("sales.csv");
        let b = temporary_header_name("sales.csv");
        assert_ne!(a, b);
        assert!(a.starts_with("sales.csv.header-"));
        assert!(a.ends_with(".tmp"));
    }

    #[tokio::test]
    async fn test_existing_object_with_temporary_like_name_survives() {
        let composer = composer_with_source(None).await;
        let backend = composer.client.backend();
        backend
            .insert("sales.csv.header.tmp", b"user data".to_vec(), None)
            .await;

        let out = composer.prepend_header("h", "sales.csv").await.unwrap();
        assert_eq!(&backend.contents(&out).await.unwrap()[..], b"h\n1,2,3\n4,5,6\n");
        assert_eq!(
            &backend.contents("sales.csv.header.tmp").await.unwrap()[..],
            b"user data"
        );
        assert_eq!(
            backend.keys().await,
            vec![
                "sales.csv".to_string(),
                "sales.csv-with-header".to_string(),
                "sales.csv.header.tmp".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_prepends_keep_their_own_header() {
        let composer = composer_with_source(None).await;
        let (left, right) = futures::future::join(
            composer.prepend_header_to("left", "sales.csv", "left.csv"),
            composer.prepend_header_to("right", "sales.csv", "right.csv"),
        )
        .await;
        let backend = composer.client.backend();
        assert_eq!(
            &backend.contents(&left.unwrap()).await.unwrap()[..],
            b"left\n1,2,3\n4,5,6\n"
        );
        assert_eq!(
            &backend.contents(&right.unwrap()).await.unwrap()[..],
            b"right\n1,2,3\n4,5,6\n"
        );
        assert_eq!(backend.keys().await.len(), 3);
    }

    #[tokio::test]
    async fn test_custom_line_break() {
        let backend = InMemoryBackend::new();
        backend.insert("pipe", b"x|y|".to_vec(), None).await;
        let composer = HeaderComposer::new(ObjectClient::new(backend)).with_line_break(b'|');
        let out = composer.prepend_header("h", "pipe").await.unwrap();
        assert_eq!(&composer.client.backend().contents(&out).await.unwrap()[..], b"h|x|y|");
    }
}
