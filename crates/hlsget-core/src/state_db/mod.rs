//! SQLite-backed durable state: the chunk store and the job table.
//!
//! Chunks are the durable progress record (a row exists exactly when a
//! segment has been fetched and persisted), so resume never depends on
//! in-memory state. Job rows carry identity, title, and lifecycle state.

mod chunks;
mod db;
mod jobs;
mod types;

pub use db::StateDb;
pub use types::{JobRecord, JobState};

#[cfg(test)]
pub(crate) use db::open_memory;
