//! Split plans: the ordered, contiguous byte ranges that become output segments.

use super::locator::LineBreakLocator;
use crate::cadapter::client::ObjectBackend;
use crate::error::SplitError;
use tracing::debug;

pub use crate::range::ByteRange;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitPlan {
    ranges: Vec<ByteRange>,
}

impl SplitPlan {
    /// A single range over the whole object; empty for a zero-sized object.
    pub fn whole(size: u64) -> Self {
        let ranges = if size == 0 {
            Vec::new()
        } else {
            vec![ByteRange {
                start: 0,
                end: size - 1,
            }]
        };
        Self { ranges }
    }

    pub fn ranges(&self) -> &[ByteRange] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ByteRange> {
        self.ranges.iter()
    }

    /// Sum of range lengths, equal to the source size for a complete plan.
    pub fn total_len(&self) -> u64 {
        self.ranges.iter().map(ByteRange::len).sum()
    }
}

/// Greedily cuts `[0, source_size)` into ranges of at most `target_size`
/// bytes, each ending on a line break except the last.
pub async fn build_plan<B: ObjectBackend>(
    locator: &LineBreakLocator<'_, B>,
    source_size: u64,
    target_size: u64,
) -> Result<SplitPlan, SplitError> {
    if target_size == 0 {
        return Err(SplitError::InvalidConfig(
            "target_size must be greater than zero".to_string(),
        ));
    }
    if source_size <= target_size {
        return Ok(SplitPlan::whole(source_size));
    }

    let mut ranges = Vec::new();
    let mut index = 0u64;
    loop {
        if index + target_size >= source_size {
            ranges.push(ByteRange {
                start: index,
                end: source_size - 1,
            });
            break;
        }
        let naive_end = index + target_size - 1;
        let real_end = locator.find_last_break_before(index, naive_end).await?;
        debug!(index, naive_end, real_end, "segment boundary");
        ranges.push(ByteRange {
            start: index,
            end: real_end,
        });
        index = real_end + 1;
    }
    Ok(SplitPlan { ranges })
}
