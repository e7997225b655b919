//! Coverage data model: per-line execution counts and branch segments,
//! per-field data items, and the per-file aggregates they roll up into
//!
//! One [`CoverageData`] holds everything gathered during a test run, keyed by
//! source file path in registration order. Shared access goes through
//! [`CoverageRegistry`], which keeps the hot execution-recording path down to
//! a read lock plus an atomic increment.

mod call_point;
mod data;
mod data_items;
mod file_data;
mod lines;
mod percentage;
mod registry;

pub use call_point::*;
pub use data::*;
pub use data_items::*;
pub use file_data::*;
pub use lines::*;
pub use percentage::*;
pub use registry::*;
