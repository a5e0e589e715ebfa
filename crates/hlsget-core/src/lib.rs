pub mod config;
pub mod logging;

pub mod assemble;
pub mod control;
pub mod fetch;
pub mod naming;
pub mod playlist;
pub mod pool;
pub mod retry;
pub mod scheduler;
pub mod segment_set;
pub mod sink;
pub mod state_db;
