//! Library entrypoint for trace-finder.
//!
//! The primary interface is the `trace-finder` binary. This lib target
//! exposes the lookup engine so integration tests can drive it with a
//! scripted gateway.

pub mod config;
pub mod gateway;
pub mod inventory;
pub mod location;
pub mod matcher;
pub mod output;
pub mod report;
pub mod window;
