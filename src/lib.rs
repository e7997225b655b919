//! Rewrite JVM class files and account for test coverage
//!
//! The crate is split into two halves that meet at instrumentation time:
//!
//!   - [`jvm`] models the [class file format][0]: a bounds-checked binary
//!     reader that materializes the constant pool up front, a deduplicating
//!     constant-pool generator for the writer side, structural models for
//!     classes, fields, methods and attributes, and an exception-handler
//!     control-flow-graph builder used when stack-map frames have to be
//!     recomputed for rewritten methods.
//!
//!   - [`coverage`] accumulates per-line, per-branch-segment, and per-field
//!     execution data reported by instrumented code, merges data across test
//!     runs, and exposes totals and percentages to report generators.
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html

pub mod coverage;
pub mod jvm;
pub mod util;
