use crate::error::LaunchError;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

/// Environment variable names understood by the launcher
pub const ENV_REDIS_HOST: &str = "REDIS_HOST";
pub const ENV_REDIS_PORT: &str = "REDIS_PORT";
pub const ENV_REDIS_DB: &str = "REDIS_DB";
pub const ENV_REDIS_DATA_DIR: &str = "REDIS_DATA_DIR";
pub const ENV_UVICORN_WORKERS: &str = "UVICORN_WORKERS";
pub const ENV_REDIS_EXTRA_FLAGS: &str = "REDIS_EXTRA_FLAGS";
pub const ENV_UVICORN_EXTRA_FLAGS: &str = "UVICORN_EXTRA_FLAGS";

/// Lower bound for the auto-derived worker count
pub const MIN_WORKERS: u32 = 1;
/// Upper bound for the auto-derived worker count (explicit overrides are
/// not clamped)
pub const MAX_WORKERS: u32 = 8;

/// Resolved launch configuration.
///
/// Populated once from the environment at startup and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Cache host; a loopback name means "run the sidecar here"
    pub redis_host: String,

    /// Cache port, used both for the sidecar bind and the external address
    pub redis_port: u16,

    /// Logical database index handed to the application (not part of the
    /// server invocation)
    pub redis_db: u32,

    /// Persistence directory for a locally started sidecar
    pub redis_data_dir: PathBuf,

    /// Explicit worker count; `None` means derive from CPU cores.
    /// `UVICORN_WORKERS=0` is also treated as "derive".
    pub worker_override: Option<u32>,

    /// Extra flags appended to the redis-server invocation
    pub redis_extra_flags: Vec<String>,

    /// Extra flags appended to the uvicorn invocation
    pub uvicorn_extra_flags: Vec<String>,
}

impl Settings {
    /// Resolve settings from the process environment
    pub fn from_env() -> Result<Self, LaunchError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Resolve settings from an arbitrary variable source.
    ///
    /// Empty values are treated the same as unset ones, matching
    /// `${VAR:-default}` shell semantics.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LaunchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let redis_host =
            string_var(&lookup, ENV_REDIS_HOST).unwrap_or_else(default_redis_host);
        let redis_port = parsed_var(&lookup, ENV_REDIS_PORT)?.unwrap_or_else(default_redis_port);
        let redis_db = parsed_var(&lookup, ENV_REDIS_DB)?.unwrap_or(0);
        let redis_data_dir = string_var(&lookup, ENV_REDIS_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(default_redis_data_dir);

        // 0 means "pick for me", same as leaving the variable unset
        let worker_override = match parsed_var::<u32, _>(&lookup, ENV_UVICORN_WORKERS)? {
            None | Some(0) => None,
            Some(n) => Some(n),
        };

        let redis_extra_flags = flags_var(&lookup, ENV_REDIS_EXTRA_FLAGS)?;
        let uvicorn_extra_flags = flags_var(&lookup, ENV_UVICORN_EXTRA_FLAGS)?;

        Ok(Self {
            redis_host,
            redis_port,
            redis_db,
            redis_data_dir,
            worker_override,
            redis_extra_flags,
            uvicorn_extra_flags,
        })
    }

    /// True when the cache host names this machine, i.e. a sidecar should
    /// be started locally
    pub fn uses_local_cache(&self) -> bool {
        self.redis_host == "127.0.0.1" || self.redis_host == "localhost"
    }

    /// Worker count for the application server.
    ///
    /// An explicit override is used verbatim; otherwise the detected core
    /// count is clamped to `[MIN_WORKERS, MAX_WORKERS]`.
    pub fn worker_count(&self, detected_cores: usize) -> u32 {
        match self.worker_override {
            Some(n) => n,
            None => detected_cores.clamp(MIN_WORKERS as usize, MAX_WORKERS as usize) as u32,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_lookup(|_| None).expect("defaults parse cleanly")
    }
}

fn string_var<F>(lookup: &F, var: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var).filter(|value| !value.is_empty())
}

fn parsed_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, LaunchError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match string_var(lookup, var) {
        None => Ok(None),
        Some(raw) => match raw.trim().parse() {
            Ok(value) => Ok(Some(value)),
            Err(e) => Err(LaunchError::Config {
                var,
                value: raw,
                reason: e.to_string(),
            }),
        },
    }
}

fn flags_var<F>(lookup: &F, var: &'static str) -> Result<Vec<String>, LaunchError>
where
    F: Fn(&str) -> Option<String>,
{
    match string_var(lookup, var) {
        None => Ok(Vec::new()),
        Some(raw) => shell_words::split(&raw).map_err(|e| LaunchError::Config {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

// Default value functions
fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_redis_data_dir() -> PathBuf {
    PathBuf::from("/data/redis")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |var| {
            pairs
                .iter()
                .find(|(key, _)| *key == var)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn test_defaults_with_empty_environment() {
        let settings = Settings::from_lookup(|_| None).unwrap();

        assert_eq!(settings.redis_host, "127.0.0.1");
        assert_eq!(settings.redis_port, 6379);
        assert_eq!(settings.redis_db, 0);
        assert_eq!(settings.redis_data_dir, PathBuf::from("/data/redis"));
        assert_eq!(settings.worker_override, None);
        assert!(settings.redis_extra_flags.is_empty());
        assert!(settings.uvicorn_extra_flags.is_empty());
    }

    #[test]
    fn test_environment_overrides_defaults() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("REDIS_HOST", "cache.example.com"),
            ("REDIS_PORT", "6380"),
            ("REDIS_DB", "3"),
            ("REDIS_DATA_DIR", "/var/lib/redis"),
            ("UVICORN_WORKERS", "4"),
        ]))
        .unwrap();

        assert_eq!(settings.redis_host, "cache.example.com");
        assert_eq!(settings.redis_port, 6380);
        assert_eq!(settings.redis_db, 3);
        assert_eq!(settings.redis_data_dir, PathBuf::from("/var/lib/redis"));
        assert_eq!(settings.worker_override, Some(4));
    }

    #[test]
    fn test_empty_value_means_unset() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("REDIS_HOST", ""),
            ("REDIS_PORT", ""),
            ("UVICORN_WORKERS", ""),
        ]))
        .unwrap();

        assert_eq!(settings.redis_host, "127.0.0.1");
        assert_eq!(settings.redis_port, 6379);
        assert_eq!(settings.worker_override, None);
    }

    #[test]
    fn test_worker_override_zero_means_auto() {
        let settings =
            Settings::from_lookup(lookup_from(&[("UVICORN_WORKERS", "0")])).unwrap();
        assert_eq!(settings.worker_override, None);
    }

    #[test]
    fn test_malformed_port_is_rejected() {
        let err =
            Settings::from_lookup(lookup_from(&[("REDIS_PORT", "abc")])).unwrap_err();
        match err {
            LaunchError::Config { var, value, .. } => {
                assert_eq!(var, "REDIS_PORT");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_workers_is_rejected() {
        let err =
            Settings::from_lookup(lookup_from(&[("UVICORN_WORKERS", "-2")])).unwrap_err();
        assert!(matches!(
            err,
            LaunchError::Config {
                var: "UVICORN_WORKERS",
                ..
            }
        ));
    }

    #[test]
    fn test_worker_count_override_is_verbatim() {
        for n in 1..=8 {
            let settings = Settings {
                worker_override: Some(n),
                ..Settings::default()
            };
            assert_eq!(settings.worker_count(16), n);
        }

        // No clamping of explicit overrides, even above the auto cap
        let settings = Settings {
            worker_override: Some(12),
            ..Settings::default()
        };
        assert_eq!(settings.worker_count(2), 12);
    }

    #[test]
    fn test_worker_count_auto_is_clamped() {
        let settings = Settings::default();

        assert_eq!(settings.worker_count(2), 2);
        assert_eq!(settings.worker_count(8), 8);
        assert_eq!(settings.worker_count(16), 8);
        assert_eq!(settings.worker_count(1), 1);
        assert_eq!(settings.worker_count(0), 1);
    }

    #[test]
    fn test_loopback_detection() {
        for host in ["127.0.0.1", "localhost"] {
            let settings = Settings {
                redis_host: host.to_string(),
                ..Settings::default()
            };
            assert!(settings.uses_local_cache(), "{host} should be local");
        }

        for host in ["cache.example.com", "10.0.0.5", "LOCALHOST ", "::1"] {
            let settings = Settings {
                redis_host: host.to_string(),
                ..Settings::default()
            };
            assert!(!settings.uses_local_cache(), "{host} should be external");
        }
    }

    #[test]
    fn test_extra_flags_are_shell_split() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("REDIS_EXTRA_FLAGS", "--maxmemory 256mb --appendonly yes"),
            ("UVICORN_EXTRA_FLAGS", "--log-level warning"),
        ]))
        .unwrap();

        assert_eq!(
            settings.redis_extra_flags,
            vec!["--maxmemory", "256mb", "--appendonly", "yes"]
        );
        assert_eq!(settings.uvicorn_extra_flags, vec!["--log-level", "warning"]);
    }

    #[test]
    fn test_extra_flags_respect_quoting() {
        let settings = Settings::from_lookup(lookup_from(&[(
            "UVICORN_EXTRA_FLAGS",
            r#"--header "Server: app""#,
        )]))
        .unwrap();

        assert_eq!(
            settings.uvicorn_extra_flags,
            vec!["--header", "Server: app"]
        );
    }

    #[test]
    fn test_unbalanced_quote_is_rejected() {
        let err = Settings::from_lookup(lookup_from(&[(
            "REDIS_EXTRA_FLAGS",
            "--requirepass \"unterminated",
        )]))
        .unwrap_err();
        assert!(matches!(
            err,
            LaunchError::Config {
                var: "REDIS_EXTRA_FLAGS",
                ..
            }
        ));
    }
}
