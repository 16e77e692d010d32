//! `taskmaster-server`: in-memory reference implementation of the
//! TaskMaster REST API.
//!
//! Used for local development of the client and for end-to-end tests.
//! Nothing is persisted; state lives as long as the process.

pub mod api;
pub mod config;
pub mod store;
