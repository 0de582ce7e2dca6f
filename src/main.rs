use entrypoint::cache;
use entrypoint::config::Settings;
use entrypoint::server;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("entrypoint=info".parse().expect("valid log directive")),
        )
        .init();

    let settings = Settings::from_env()?;
    info!(
        redis_host = %settings.redis_host,
        redis_port = settings.redis_port,
        redis_db = settings.redis_db,
        redis_data_dir = %settings.redis_data_dir.display(),
        "Launch configuration resolved"
    );

    // Loopback host: run the cache here. Anything else is assumed to be an
    // external Redis that is someone else's job to keep alive.
    if settings.uses_local_cache() {
        cache::spawn_cache_server(&settings)?;
    } else {
        info!(
            host = %settings.redis_host,
            port = settings.redis_port,
            "Using external Redis, skipping local sidecar"
        );
    }

    let workers = match settings.worker_override {
        Some(n) => {
            info!(workers = n, "Worker count taken from UVICORN_WORKERS");
            n
        }
        None => {
            let cores = num_cpus::get();
            let n = settings.worker_count(cores);
            info!(cores, workers = n, "Worker count derived from CPU cores");
            n
        }
    };

    // Only returns if the exec failed
    Err(server::exec_app_server(&settings, workers).into())
}
