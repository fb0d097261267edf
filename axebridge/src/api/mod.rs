//! HTTP API.

pub mod server;
pub mod types;
pub mod v0;

pub use server::{SharedState, app};
