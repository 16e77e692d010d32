//! `taskmaster`: task synchronization client for the TaskMaster REST API.
//!
//! [`sync::controller::SyncController`] is the entry point: it owns the
//! session's task cache, talks to a [`remote::TaskService`], and hands out
//! snapshots that [`sync::views`] turns into filtered and grouped views.

pub mod config;
pub mod remote;
pub mod sync;
