//! Incremental order synchronization engine.
//!
//! Pulls orders from remote shops page by page, upserts them locally and
//! tracks per-source watermarks so each cycle only fetches what changed.

pub mod fetcher;
pub mod orchestrator;
pub mod pacing;
pub mod scheduler;
pub mod sink;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;
