//! Local Redis sidecar startup
//!
//! Only used when the cache host is a loopback name. The sidecar is fire
//! and forget: the launcher neither supervises it nor waits for it, and a
//! spawn failure does not abort the launch.

use crate::config::Settings;
use crate::error::LaunchError;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

/// Program name for the cache sidecar
pub const CACHE_PROGRAM: &str = "redis-server";

/// Bind address passed to the sidecar (all interfaces)
pub const CACHE_BIND: &str = "0.0.0.0";

/// Create the persistence directory, recursively. Fatal on failure: a
/// sidecar without its data directory would lose persistence silently.
pub fn ensure_data_dir(settings: &Settings) -> Result<(), LaunchError> {
    std::fs::create_dir_all(&settings.redis_data_dir).map_err(|source| LaunchError::DataDir {
        path: settings.redis_data_dir.clone(),
        source,
    })
}

/// Argument vector for the redis-server invocation
pub fn redis_server_args(settings: &Settings) -> Vec<String> {
    let mut args = vec![
        "--bind".to_string(),
        CACHE_BIND.to_string(),
        "--port".to_string(),
        settings.redis_port.to_string(),
        "--dir".to_string(),
        settings.redis_data_dir.display().to_string(),
    ];
    args.extend(settings.redis_extra_flags.iter().cloned());
    args
}

/// Start the Redis sidecar in the background.
///
/// The child handle is dropped immediately; the process outlives the
/// launcher and is reparented when the launcher execs the application
/// server. Only the data directory creation can fail the launch.
pub fn spawn_cache_server(settings: &Settings) -> Result<(), LaunchError> {
    spawn_sidecar(CACHE_PROGRAM, settings)
}

fn spawn_sidecar(program: &str, settings: &Settings) -> Result<(), LaunchError> {
    ensure_data_dir(settings)?;

    info!(
        port = settings.redis_port,
        data_dir = %settings.redis_data_dir.display(),
        "Starting local Redis sidecar"
    );

    let mut cmd = Command::new(program);
    cmd.args(redis_server_args(settings));
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::inherit());
    cmd.stderr(Stdio::inherit());
    cmd.kill_on_drop(false);

    match cmd.spawn() {
        Ok(child) => {
            info!(pid = child.id().unwrap_or(0), "Redis sidecar spawned");
        }
        Err(e) => {
            // Best effort: the app may still reach a cache started some
            // other way, so this is not fatal.
            warn!(error = %e, program, "Failed to start Redis sidecar");
        }
    }

    Ok(())
}
