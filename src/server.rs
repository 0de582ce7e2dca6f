//! Application server launch
//!
//! The launcher's terminal step: build the uvicorn invocation and replace
//! the current process image with it.

use crate::config::Settings;
use crate::error::LaunchError;
use std::process::Command;
use tracing::info;

/// Program that serves the application
pub const SERVER_PROGRAM: &str = "uvicorn";

/// ASGI application target
pub const APP_TARGET: &str = "app.main:app";

/// Bind address for the application server (all interfaces)
pub const APP_BIND: &str = "0.0.0.0";

/// Fixed application port
pub const APP_PORT: u16 = 8000;

/// Argument vector for the uvicorn invocation
pub fn uvicorn_args(settings: &Settings, workers: u32) -> Vec<String> {
    let mut args = vec![
        APP_TARGET.to_string(),
        "--host".to_string(),
        APP_BIND.to_string(),
        "--port".to_string(),
        APP_PORT.to_string(),
        "--workers".to_string(),
        workers.to_string(),
    ];
    args.extend(settings.uvicorn_extra_flags.iter().cloned());
    args
}

/// Replace this process with the application server.
///
/// On Unix this returns only if the exec itself failed; the happy path
/// never comes back. On other platforms the server is spawned and waited
/// on, and the launcher exits with the child's status.
pub fn exec_app_server(settings: &Settings, workers: u32) -> LaunchError {
    info!(
        program = SERVER_PROGRAM,
        bind = APP_BIND,
        port = APP_PORT,
        workers,
        "Launching application server"
    );

    let mut cmd = Command::new(SERVER_PROGRAM);
    cmd.args(uvicorn_args(settings, workers));

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        let source = cmd.exec();
        LaunchError::Exec {
            program: SERVER_PROGRAM,
            source,
        }
    }

    #[cfg(not(unix))]
    {
        match cmd.status() {
            Ok(status) => std::process::exit(status.code().unwrap_or(1)),
            Err(source) => LaunchError::Exec {
                program: SERVER_PROGRAM,
                source,
            },
        }
    }
}
