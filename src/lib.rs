//! Headless client for the driving-test appointment backend.
//!
//! The crate wraps the remote booking API, the single locally persisted
//! profile blob, and the availability polling machinery behind typed
//! components so the same logic can drive the CLI, a daemon, or tests.

pub mod api;
pub mod billing;
pub mod config;
pub mod domain;
pub mod error;
pub mod notifications;
pub mod poller;
pub mod session;
pub mod store;
pub mod telemetry;
