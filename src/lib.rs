//! Adaptive vocabulary drilling: priority scoring, weighted word selection,
//! and a session/durable-store split for practice history.

pub mod app;
pub mod config;
pub mod engine;
pub mod error;
pub mod session;
pub mod store;

pub use error::{DrillError, StoreError};
