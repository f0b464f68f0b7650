use super::locator::DataLocator;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A contiguous byte range of an object, assigned to exactly one worker.
///
/// The range carries no knowledge of point-record boundaries; the map function
/// re-reads the file header itself when it needs to interpret its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDescriptor {
    pub locator: DataLocator,
    pub chunk_index: u32,
    pub byte_offset: u64,
    pub byte_length: u64,
}

impl ChunkDescriptor {
    /// Exclusive end of the byte range.
    pub fn byte_end(&self) -> u64 {
        self.byte_offset + self.byte_length
    }

    /// HTTP `Range` header value for this chunk, `None` when the chunk is empty.
    pub fn range_header(&self) -> Option<String> {
        if self.byte_length == 0 {
            return None;
        }
        Some(format!("bytes={}-{}", self.byte_offset, self.byte_end() - 1))
    }
}

/// Splits `[0, locator.size)` into `chunk_count` ordered, disjoint ranges.
///
/// Every chunk spans `ceil(size / chunk_count)` bytes except the last non-empty one,
/// which takes the remainder. When `chunk_count > size`, trailing chunks are empty
/// and sit at offset `size`, so exactly `chunk_count` descriptors are returned.
pub fn partition(locator: &DataLocator, chunk_count: u32) -> Result<Vec<ChunkDescriptor>> {
    if chunk_count == 0 {
        return Err(Error::InvalidArgument(
            "chunk_count must be a positive integer".to_string(),
        ));
    }
    if locator.size == 0 {
        return Err(Error::InvalidArgument(format!(
            "Object {}/{} has unknown or zero size",
            locator.bucket, locator.key
        )));
    }

    let size = locator.size;
    let stride = size.div_ceil(chunk_count as u64);

    let chunks: Vec<ChunkDescriptor> = (0..chunk_count)
        .map(|chunk_index| {
            let start = (chunk_index as u64 * stride).min(size);
            let end = (start + stride).min(size);
            ChunkDescriptor {
                locator: locator.clone(),
                chunk_index,
                byte_offset: start,
                byte_length: end - start,
            }
        })
        .collect();

    tracing::debug!(
        "Partitioned {} into {} chunks of up to {} bytes",
        locator,
        chunk_count,
        stride
    );

    Ok(chunks)
}
