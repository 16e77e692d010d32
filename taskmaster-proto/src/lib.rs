//! Shared wire types for the TaskMaster REST API.

pub mod api;
pub mod assistant;
pub mod category;
pub mod fields;
pub mod task;
