//! Splitting prompts into bounded, order-preserving batches.

use crate::Prompt;
use derive_more::Display;

/// Size of a batch, always within `1..=MAX`.
///
/// The upper bound keeps the generation backend stable; requests above it are
/// clamped rather than rejected.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub struct BatchSize(usize);
impl BatchSize {
    pub const MAX: usize = 32;

    /// Clamp the requested size into `1..=MAX`.
    pub fn new(requested: usize) -> Self {
        Self(requested.clamp(1, Self::MAX))
    }

    /// Whether `requested` had to be clamped to produce a valid size.
    pub fn is_clamped(requested: usize) -> bool {
        Self::new(requested).0 != requested
    }

    pub fn get(self) -> usize {
        self.0
    }

    /// Number of batches `len` prompts will be split into.
    pub fn batches_for(self, len: usize) -> usize {
        len.div_ceil(self.0)
    }
}
impl Default for BatchSize {
    fn default() -> Self {
        Self(Self::MAX)
    }
}
impl From<usize> for BatchSize {
    fn from(requested: usize) -> Self {
        Self::new(requested)
    }
}

/// A contiguous slice of a file's prompts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Batch<'a> {
    /// 1-based position of this batch among the file's batches.
    pub number: usize,
    /// Total number of batches derived from the file.
    pub total: usize,
    /// 0-based index of the first prompt of this batch within the file.
    pub offset: usize,
    pub prompts: &'a [Prompt],
}
impl Batch<'_> {
    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Iterate the prompts along with their 1-based index within the file.
    pub fn numbered(&self) -> impl Iterator<Item = (usize, &Prompt)> {
        self.prompts.iter().enumerate().map(move |(i, prompt)| (self.offset + i + 1, prompt))
    }
}

/// Partition `prompts` into batches of at most `size`, in order.
pub fn batches(prompts: &[Prompt], size: BatchSize) -> impl ExactSizeIterator<Item = Batch<'_>> {
    let total = size.batches_for(prompts.len());
    prompts.chunks(size.get()).enumerate().map(move |(i, chunk)| Batch {
        number: i + 1,
        total,
        offset: i * size.get(),
        prompts: chunk,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn prompts(n: usize) -> Vec<Prompt> {
        (0..n).map(|i| Prompt::from_line(&format!("prompt {i}")).unwrap()).collect()
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(16, 16)]
    #[case(32, 32)]
    #[case(33, 32)]
    #[case(100, 32)]
    fn test_batch_size_is_clamped(#[case] requested: usize, #[case] expected: usize) {
        assert_eq!(BatchSize::new(requested).get(), expected);
        assert_eq!(BatchSize::is_clamped(requested), requested != expected);
    }

    #[test]
    fn test_default_is_maximum() {
        assert_eq!(BatchSize::default().get(), 32);
    }

    #[test]
    fn test_five_prompts_in_pairs() {
        let all = prompts(5);
        let sizes: Vec<usize> = batches(&all, BatchSize::new(2)).map(|b| b.len()).collect();
        assert_eq!(sizes, [2, 2, 1]);
    }

    #[rstest]
    #[case(0, 3)]
    #[case(1, 3)]
    #[case(3, 3)]
    #[case(7, 3)]
    #[case(64, 32)]
    #[case(65, 32)]
    fn test_partition_properties(#[case] len: usize, #[case] size: usize) {
        let all = prompts(len);
        let size = BatchSize::new(size);
        let parts: Vec<_> = batches(&all, size).collect();
        assert_eq!(parts.len(), len.div_ceil(size.get()));
        assert!(parts.iter().all(|b| !b.is_empty() && b.len() <= size.get()));
        assert!(parts.iter().all(|b| b.total == parts.len()));
        let rejoined: Vec<Prompt> = parts.iter().flat_map(|b| b.prompts.iter().cloned()).collect();
        assert_eq!(rejoined, all);
    }

    #[test]
    fn test_numbering_and_offsets() {
        let all = prompts(5);
        let parts: Vec<_> = batches(&all, BatchSize::new(2)).collect();
        assert_eq!(parts.iter().map(|b| b.number).collect::<Vec<_>>(), [1, 2, 3]);
        assert_eq!(parts.iter().map(|b| b.offset).collect::<Vec<_>>(), [0, 2, 4]);
        let indices: Vec<usize> = parts[1].numbered().map(|(i, _)| i).collect();
        assert_eq!(indices, [3, 4]);
        assert_eq!(parts[2].numbered().next().map(|(_, p)| p.as_str()), Some("prompt 4"));
    }
}
