// crates/core/src/lib.rs
pub mod affordances;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod machine;
pub mod tracker;
pub mod view_state;

pub use affordances::{Action, ActionButton, ActionConditions};
pub use client::{HttpJobClient, JobApi};
pub use config::{ClientConfig, TrackerConfig};
pub use error::*;
pub use events::{dispatch, JobEventHandler, TrackerEvent};
pub use machine::{TrackerSnapshot, TrackerState};
pub use tracker::{JobTracker, TrackerBuilder};
pub use view_state::ColumnVisibilityStore;
