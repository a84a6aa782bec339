//! Line-safe splitting of a large object into bounded segments
//!
//! Submodules:
//! - `locator`: backward window search for the last line break before a boundary
//! - `plan`: byte ranges and the greedy plan builder
//!
//! Splitting happens in two passes. The plan is built strictly left to right,
//! because every boundary depends on the previous one. Only then are the
//! segments copied, with a bounded number of copies in flight.

pub mod locator;
pub mod plan;

use crate::cadapter::client::{ObjectBackend, ObjectClient};
use crate::config::SplitConfig;
use crate::error::{SplitError, StoreError};
use crate::object::RemoteObject;
use locator::LineBreakLocator;
use plan::{SplitPlan, build_plan};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Name of the `index`-th (zero-based) of `count` segments.
pub fn segment_name(name: &str, index: usize, count: usize) -> String {
    format!("{name}-{index}-of-{count}")
}

pub struct Splitter<B: ObjectBackend> {
    object: RemoteObject<B>,
    config: SplitConfig,
}

impl<B: ObjectBackend> Splitter<B> {
    pub fn new(client: ObjectClient<B>, name: impl Into<String>, config: SplitConfig) -> Self {
        Self {
            object: RemoteObject::new(client, name),
            config,
        }
    }

    pub fn object(&self) -> &RemoteObject<B> {
        &self.object
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    pub fn locator(&self) -> LineBreakLocator<'_, B> {
        LineBreakLocator::new(&self.object, self.config.probe_width, self.config.line_break)
    }

    /// Computes the ranges without copying anything.
    pub async fn plan(&self, source_size: u64, target_size: u64) -> Result<SplitPlan, SplitError> {
        build_plan(&self.locator(), source_size, target_size).await
    }

    /// Splits with the configured target size. See [`Splitter::split_with_target`].
    pub async fn split(&self) -> Result<Vec<String>, SplitError> {
        self.split_with_target(self.config.target_size).await
    }

    /// Splits the object into segments of at most `target_size` bytes and
    /// returns their names in order. An object that already fits is left
    /// alone and its own name is returned.
    pub async fn split_with_target(&self, target_size: u64) -> Result<Vec<String>, SplitError> {
        self.config.with_target_size(target_size).validate()?;
        let size = self.object.size().await?;
        if size <= target_size {
            info!(object = self.object.name(), size, target_size, "no split needed");
            return Ok(vec![self.object.name().to_string()]);
        }

        let plan = self.plan(size, target_size).await?;
        info!(
            object = self.object.name(),
            size,
            target_size,
            segments = plan.len(),
            "split plan ready"
        );
        self.materialize(&plan).await
    }

    /// Copies every range of `plan` into its own object, carrying over the
    /// source content type. Every copy runs to completion even when another
    /// one fails; the first error in segment order is then returned and the
    /// segments that were written are kept.
    pub async fn materialize(&self, plan: &SplitPlan) -> Result<Vec<String>, SplitError> {
        let source = self.object.name();
        let content_type = self.object.content_type().await?;
        let content_type = content_type.as_deref();
        let client = self.object.client();
        let sem = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let count = plan.len();

        let copies = plan.iter().enumerate().map(|(index, range)| {
            let sem = sem.clone();
            let destination = segment_name(source, index, count);
            async move {
                let _permit = sem
                    .acquire()
                    .await
                    .map_err(|e| StoreError::backend("copy_range", e))?;
                client
                    .copy_range(source, *range, &destination, content_type)
                    .await?;
                info!(
                    segment = %destination,
                    start = range.start,
                    end = range.end,
                    "segment written"
                );
                Ok::<_, SplitError>(destination)
            }
        });

        // every copy must settle; a dropped S3 copy leaves its multipart upload open
        let results = futures::future::join_all(copies).await;
        let mut names = Vec::with_capacity(count);
        let mut first_error = None;
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(name) => names.push(name),
                Err(e) => {
                    warn!(object = source, index, "segment copy failed: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(names),
        }
    }
}
