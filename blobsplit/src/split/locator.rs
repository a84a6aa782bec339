//! Backward search for the last line break inside a byte window.
//!
//! Only small windows of `probe_width` bytes are fetched. The first probe ends
//! at `upper`; every following probe covers the `probe_width` bytes just below
//! the region already searched, until `lower` has been examined.

use crate::cadapter::client::ObjectBackend;
use crate::error::SplitError;
use crate::object::RemoteObject;
use tracing::trace;

pub struct LineBreakLocator<'a, B: ObjectBackend> {
    object: &'a RemoteObject<B>,
    probe_width: u64,
    line_break: u8,
}

impl<'a, B: ObjectBackend> LineBreakLocator<'a, B> {
    pub fn new(object: &'a RemoteObject<B>, probe_width: u64, line_break: u8) -> Self {
        Self {
            object,
            probe_width: probe_width.max(1),
            line_break,
        }
    }

    /// Greatest offset `o` in `[lower, upper]` whose byte is the line break.
    pub async fn find_last_break_before(&self, lower: u64, upper: u64) -> Result<u64, SplitError> {
        if lower > upper {
            return Err(SplitError::InvalidRange {
                start: lower,
                end: upper,
            });
        }

        let mut window_end = upper;
        loop {
            let checkpoint = window_end
                .saturating_sub(self.probe_width - 1)
                .max(lower);
            let window = self.object.read_range(checkpoint, window_end).await?;
            trace!(
                object = self.object.name(),
                checkpoint,
                window_end,
                read = window.len(),
                "probe"
            );
            // offsets are relative to what the store actually returned
            if let Some(pos) = window.iter().rposition(|&b| b == self.line_break) {
                return Ok(checkpoint + pos as u64);
            }
            if checkpoint == lower {
                return Err(SplitError::NoLineBreakFound { lower, upper });
            }
            window_end = checkpoint - 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cadapter::client::ObjectClient;
    use crate::cadapter::memory::InMemoryBackend;

    async fn object_with(data: Vec<u8>) -> RemoteObject<InMemoryBackend> {
        let backend = InMemoryBackend::new();
        backend.insert("text", data, None).await;
        RemoteObject::new(ObjectClient::new(backend), "text")
    }

    fn reads(obj: &RemoteObject<InMemoryBackend>) -> usize {
        obj.client().backend().range_reads()
    }

    #[tokio::test]
    async fn test_rightmost_break_in_first_window() {
        let obj = object_with(b"aa\nbb\ncc\ndd".to_vec()).await;
        let locator = LineBreakLocator::new(&obj, 1000, b'\n');
        assert_eq!(locator.find_last_break_before(0, 10).await.unwrap(), 8);
        assert_eq!(locator.find_last_break_before(0, 7).await.unwrap(), 5);
        // break exactly at the upper bound
        assert_eq!(locator.find_last_break_before(0, 5).await.unwrap(), 5);
        assert_eq!(reads(&obj), 3);
    }

    #[tokio::test]
    async fn test_window_steps_back_until_break() {
        // break at 3, followed by a 40 byte line
        let mut data = b"abc\n".to_vec();
        data.extend(std::iter::repeat_n(b'x', 40));
        let obj = object_with(data).await;
        let locator = LineBreakLocator::new(&obj, 8, b'\n');

        assert_eq!(locator.find_last_break_before(0, 43).await.unwrap(), 3);
        // windows: [36,43] [28,35] [20,27] [12,19] [4,11] [0,3]
        assert_eq!(reads(&obj), 6);
        assert_eq!(obj.client().backend().bytes_read(), 44);
    }

    #[tokio::test]
    async fn test_break_at_lower_bound() {
        let mut data = vec![b'y'; 10];
        data[2] = b'\n';
        let obj = object_with(data).await;
        let locator = LineBreakLocator::new(&obj, 3, b'\n');
        assert_eq!(locator.find_last_break_before(2, 9).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_no_break_down_to_lower_bound() {
        let mut data = vec![b'z'; 50];
        // a break below the lower bound must not be returned
        data[4] = b'\n';
        let obj = object_with(data).await;
        let locator = LineBreakLocator::new(&obj, 10, b'\n');
        match locator.find_last_break_before(5, 49).await {
            Err(SplitError::NoLineBreakFound { lower, upper }) => {
                assert_eq!((lower, upper), (5, 49));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_repeated_search_is_stable() {
        let data = b"one\ntwo\nthree\nfour\n".repeat(20);
        let obj = object_with(data).await;
        let locator = LineBreakLocator::new(&obj, 16, b'\n');
        let first = locator.find_last_break_before(10, 200).await.unwrap();
        let second = locator.find_last_break_before(10, 200).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_custom_separator_and_short_read() {
        let obj = object_with(b"a|b|c".to_vec()).await;
        let locator = LineBreakLocator::new(&obj, 1000, b'|');
        // upper past the end: the store returns a short window
        assert_eq!(locator.find_last_break_before(0, 900).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_inverted_bounds() {
        let obj = object_with(b"a\n".to_vec()).await;
        let locator = LineBreakLocator::new(&obj, 1000, b'\n');
        assert!(matches!(
            locator.find_last_break_before(5, 1).await,
            Err(SplitError::InvalidRange { start: 5, end: 1 })
        ));
        assert_eq!(reads(&obj), 0);
    }
}
