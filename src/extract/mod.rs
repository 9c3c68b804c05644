//! The polyhedral extractor.
//!
//! Walks structured control flow while maintaining a mutable position
//! context and, for each leaf statement, computes an iteration-space set,
//! an execution-schedule relation, and a list of access relations, splicing
//! called functions into the caller's position.

pub mod access;
pub mod builder;
pub mod context;
pub mod schedule;

pub use access::{AccessCollector, DataAccess, FreshNames, MAX_ARRAY_RANK};
pub use builder::{Extractor, RESERVED_FUNC_NAMES};
pub use context::{Constraint, PositionContext};
pub use schedule::{ExecSchedule, ScheduleVal};
