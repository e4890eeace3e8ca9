//! Core data types, units, periods and the series provider seam
//!
//! Everything here is storage agnostic: database access lives in `weex-db`
//! and the chart statistics built on top of it live in `weex-stats`.

pub mod format;
pub mod memory;
pub mod period;
pub mod provider;
pub mod rollups;
pub mod types;
pub mod units;

pub use format::*;
pub use memory::MemoryProvider;
pub use period::*;
pub use provider::*;
pub use rollups::*;
pub use types::*;
pub use units::*;
