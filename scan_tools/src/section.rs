use std::ops::Range;

/// The narrowest section that may enter the parallel path.
///
/// The join arithmetic assumes every section has at least one element after
/// its first, so widths of 0 or 1 always fall back to a sequential scan.
pub const MIN_SECTION_SIZE: usize = 2;

/// How a scan of a given length is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The whole input is scanned on the calling thread.
    Sequential,
    /// One worker: the two-phase arithmetic runs inline on the calling
    /// thread with no team and no barrier.
    SingleWorker,
    /// `workers` threads scan the first `workers` sections, the carries are
    /// propagated, then each worker adjusts the section after its own.
    TwoPhase,
}

/// Section boundaries for one scan call.
///
/// The index space `[0, len)` is cut into `workers + 1` sections of
/// `section_size` elements followed by `remainder` trailing elements. Phase
/// one covers sections `0..workers`, phase two covers sections
/// `1..=workers`, so each worker does roughly two sections of work around
/// the sequential join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionPlan {
    pub len: usize,
    /// Workers taking part in the parallel region. Zero for
    /// [`Strategy::Sequential`].
    pub workers: usize,
    pub section_size: usize,
    pub remainder: usize,
    pub strategy: Strategy,
}

impl SectionPlan {
    /// Decide the sections for `len` elements and `workers` available
    /// workers. `min_section_size` is raised to [`MIN_SECTION_SIZE`] if
    /// smaller.
    pub fn new(len: usize, workers: usize, min_section_size: usize) -> Self {
        let min_section_size = min_section_size.max(MIN_SECTION_SIZE);
        let sections = workers.saturating_add(1);
        let remainder = len % sections;
        let section_size = (len - remainder) / sections;

        if workers == 0 || section_size < min_section_size {
            return Self::sequential(len);
        }

        let strategy = if workers == 1 {
            Strategy::SingleWorker
        } else {
            Strategy::TwoPhase
        };

        Self {
            len,
            workers,
            section_size,
            remainder,
            strategy,
        }
    }

    /// A plan that scans everything on the calling thread.
    pub fn sequential(len: usize) -> Self {
        Self {
            len,
            workers: 0,
            section_size: len,
            remainder: 0,
            strategy: Strategy::Sequential,
        }
    }

    /// Number of sections, including the one only touched in phase two.
    pub fn sections(&self) -> usize {
        match self.strategy {
            Strategy::Sequential => 1,
            _ => self.workers + 1,
        }
    }

    /// Elements covered by sections, i.e. everything but the remainder.
    pub fn sectioned_len(&self) -> usize {
        self.sections() * self.section_size
    }

    /// Index range of section `k`.
    pub fn section(&self, k: usize) -> Range<usize> {
        let start = k * self.section_size;
        start..start + self.section_size
    }

    /// The section worker `id` scans in phase one.
    pub fn local_section(&self, id: usize) -> Range<usize> {
        self.section(id)
    }

    /// The section worker `id` adjusts in phase two: the one after its own.
    pub fn adjust_section(&self, id: usize) -> Range<usize> {
        self.section(id + 1)
    }

    /// Trailing indices finished sequentially after the workers join.
    pub fn remainder_range(&self) -> Range<usize> {
        self.sectioned_len()..self.len
    }
}
