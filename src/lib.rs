//! Container entrypoint for the application server
//!
//! This binary runs once per container start. It:
//! - Resolves launch configuration from environment variables
//! - Starts a local Redis sidecar when the cache host is a loopback name
//! - Derives a worker count from an override or the CPU core count
//! - Replaces itself with the uvicorn application server
//!
//! There is no supervision and no retry logic; a failed container start is
//! the orchestrator's problem.

pub mod cache;
pub mod config;
pub mod error;
pub mod server;
