// crates/types/src/lib.rs
//! Wire types shared by the list service client and the job trackers.

pub mod job;
pub mod list;

pub use job::*;
pub use list::*;
