//! Ordered partitioning of a job list into bounded batches.

/// One contiguous slice of the job list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch<'a, T> {
    /// 0-based batch number.
    pub index: usize,
    /// 0-based index of the batch's first job within the partitioned list.
    pub offset: usize,
    pub jobs: &'a [T],
}

impl<T> Batch<'_, T> {
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Split `jobs` into batches of at most `chunk_size`, preserving order.
///
/// Batch `i` holds `jobs[i * chunk_size..min((i + 1) * chunk_size, len)]`.
/// A `chunk_size` of zero is treated as one.
pub fn partition<T>(
    jobs: &[T],
    chunk_size: usize,
) -> impl Iterator<Item = Batch<'_, T>> {
    let size = chunk_size.max(1);
    jobs.chunks(size).enumerate().map(move |(index, jobs)| Batch {
        index,
        offset: index * size,
        jobs,
    })
}

/// Number of batches `partition` yields for `len` jobs.
pub fn batch_count(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size.max(1))
}
