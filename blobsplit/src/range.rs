//! Inclusive byte ranges shared by the planner and the store adapters.

use crate::error::SplitError;

/// Inclusive `[start, end]` byte range of the source object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

#[allow(clippy::len_without_is_empty)]
impl ByteRange {
    pub fn new(start: u64, end: u64) -> Result<Self, SplitError> {
        if end < start {
            return Err(SplitError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// HTTP Range header value.
    pub fn to_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_range() {
        let r = ByteRange::new(10, 19).unwrap();
        assert_eq!(r.len(), 10);
        assert_eq!(r.to_header(), "bytes=10-19");
        assert_eq!(ByteRange::new(3, 3).unwrap().len(), 1);
        assert!(ByteRange::new(4, 3).is_err());
    }
}
