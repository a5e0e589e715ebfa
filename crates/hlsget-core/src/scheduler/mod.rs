//! Job scheduler: FIFO queue with a single active download.
//!
//! The engine is an actor owning the queue, the active slot, and all state
//! transitions. Callers talk to it through an [`EngineHandle`] and observe
//! progress on an event channel. One job downloads at a time; the next
//! queued job starts only after the active one reaches a terminal state.

mod events;
mod run;

pub use events::{DownloadEvent, JobStatus};
pub use run::{Engine, EngineHandle};
