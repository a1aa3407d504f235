//! Scheduled refresh of the billing audit-log view and the cost table built on it.
//!
//! Each trigger runs two steps against a [`QueryEngine`](query_engine::QueryEngine):
//!
//! 1. [`view::upsert_view`] creates the audit-log view, or replaces its query.
//! 2. [`transform::execute_transformation_query`] rebuilds the output table
//!    with truncate-and-replace semantics, partitioned by a timestamp column.
//!
//! [`handler::handle_trigger`] wraps both steps and never lets a failure
//! escape: errors are logged and the invocation ends.

#![deny(missing_docs)]

pub mod config;
pub mod errors;
pub mod handler;
pub mod logging;
pub mod pubsub;
pub mod schedule;
pub mod server;
pub mod template;
pub mod transform;
pub mod view;
