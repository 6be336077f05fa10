//! Todoist task creation.
//!
//! [`TaskClient`] maps a [`TaskRecord`](taskpilot_core::TaskRecord) onto the
//! provider's fields and normalises the reply into a
//! [`CreatedTask`](taskpilot_core::CreatedTask). Unlike the rest of the
//! pipeline, failures here are always propagated.

pub mod api;
pub mod client;

pub use api::{NewTask, TaskApi, TaskResponse, TodoistApi};
pub use client::TaskClient;
