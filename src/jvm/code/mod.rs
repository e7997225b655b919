//! Method body bookkeeping: labels, control flow edges, and exception tables

mod exception_handling;
mod label;

pub use exception_handling::*;
pub use label::*;
