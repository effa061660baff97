//! astrofusiond: the Astrofusion daemon.
//!
//! Serves the fusion pipeline and its companion routes over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use astrofusion::auth::JwtAuthGate;
use astrofusion::clock::{Clock, SystemClock};
use astrofusion::providers::{SwapiClient, WeatherApiClient};
use astrofusion::server::config::{Config, LogFormat, Secrets, StorageKind};
use astrofusion::store::{MemoryBackend, StorageBackend};
use astrofusion::{AstrofusionError, FusionGateway};

/// Astrofusion daemon: planet and weather fusion service.
#[derive(Parser)]
#[command(name = "astrofusiond")]
#[command(version = astrofusion::PKG_VERSION)]
#[command(about = "Astrofusion planet/weather fusion daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load(args.config.as_deref())?;
    config.apply_env();
    config.validate()?;
    let secrets = Secrets::load()?;

    init_tracing(config.logging.format)?;

    let gateway = build_gateway(&config, &secrets)?;

    // Parse address
    let addr: SocketAddr = config
        .server
        .address
        .parse()
        .map_err(|e| AstrofusionError::Configuration(format!("Invalid address: {e}")))?;

    info!(version = astrofusion::version_string(), %addr, "astrofusiond starting");

    let app = astrofusion::server::router(Arc::new(gateway));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn init_tracing(format: LogFormat) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("astrofusion=info,tower_http=info,warn"));
    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
    }
    Ok(())
}

/// Build a [`FusionGateway`] from configuration.
fn build_gateway(config: &Config, secrets: &Secrets) -> Result<FusionGateway, AstrofusionError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let backend = open_backend(config, clock.clone())?;

    let weather_key = secrets.weather_api_key().ok_or_else(|| {
        AstrofusionError::Configuration(
            "no WeatherAPI key: set [weather] api_key in secrets.toml or WEATHER_API_KEY".into(),
        )
    })?;
    let weather = WeatherApiClient::with_base_url(weather_key, &config.upstream.weather_url);
    let planets = SwapiClient::with_base_url(&config.upstream.swapi_url);

    let auth = match secrets.jwt_secret() {
        Some(secret) => JwtAuthGate::new(secret, clock.clone())?,
        None => {
            warn!("no JWT secret configured, tokens will not survive a restart");
            JwtAuthGate::ephemeral(clock.clone())
        }
    };

    FusionGateway::builder()
        .backend(backend)
        .tables(config.table_names())
        .weather(Arc::new(weather))
        .planets(Arc::new(planets))
        .jwt(auth)
        .rate_limit(config.rate_limit_config())
        .cache(config.cache_config())
        .clock(clock)
        .build()
}

fn open_backend(
    config: &Config,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn StorageBackend>, AstrofusionError> {
    match config.storage.backend {
        StorageKind::Memory => Ok(Arc::new(MemoryBackend::with_clock(clock))),
        #[cfg(feature = "lmdb")]
        StorageKind::Lmdb => {
            let path = config.storage.path.as_ref().ok_or_else(|| {
                AstrofusionError::Configuration("storage.path is required for lmdb".into())
            })?;
            let backend = astrofusion::store::LmdbBackend::open_with_clock(
                path,
                config.storage.max_size_mb,
                clock,
            )?;
            Ok(Arc::new(backend))
        }
        #[cfg(not(feature = "lmdb"))]
        StorageKind::Lmdb => Err(AstrofusionError::Configuration(
            "lmdb storage requires building with the `lmdb` feature".into(),
        )),
    }
}
