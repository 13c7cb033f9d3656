//! Building blocks for the two-phase parallel scan: partitioning, the
//! per-section sequential primitives each worker runs, and the stride
//! schedule for log-depth carry propagation.

pub mod kogge_stone;
pub mod section;
pub mod sequential;
mod step;

pub use section::{SectionPlan, Strategy, MIN_SECTION_SIZE};
