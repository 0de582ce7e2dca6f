//! Errors that can abort the launch sequence

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal launch errors.
///
/// A sidecar failure is deliberately not represented here: once the Redis
/// subprocess is spawned (or fails to spawn) it is no longer this
/// component's concern.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// An environment variable held a value that could not be parsed
    #[error("invalid value {value:?} for {var}: {reason}")]
    Config {
        var: &'static str,
        value: String,
        reason: String,
    },

    /// The cache data directory could not be created
    #[error("failed to create cache data directory {}: {source}", path.display())]
    DataDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The final exec of the application server failed
    #[error("failed to exec {program}: {source}")]
    Exec {
        program: &'static str,
        #[source]
        source: io::Error,
    },
}
