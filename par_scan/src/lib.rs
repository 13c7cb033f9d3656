mod carry;
pub mod config;
pub mod density;
pub mod error;
pub mod scan;
pub mod shuffle;
mod team;

pub use config::{CarryStrategy, ScanConfig};
pub use density::{CpuEstimator, DensityEstimator};
pub use error::{ConfigError, ScanError};
pub use scan::{scan, sequential_scan, try_scan, try_sequential_scan, Scanner};
pub use scan_tools::{SectionPlan, Strategy};
pub use shuffle::{redistribute, Communicator};
