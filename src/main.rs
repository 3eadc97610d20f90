//! Geo Location Engine
//!
//! Serves typeahead lookups backed by the GeoNames directory and the
//! entity save path that materializes picked locations.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        geo-location-engine                            │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  REST API (:8090)      Health (:8081)          Metrics (:8080)        │
//! │  typeahead, entities   /healthz /readyz        /metrics (prometheus)  │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  TypeaheadResolver ─► TieredCache ─► GeocodeClient ─► GeoNames        │
//! │  EntityService ─► UniquenessGuard ─► HierarchyUpsertEngine ─► Store   │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use geo_location_engine::geocode::GeocodeCounters;
use geo_location_engine::{
    ApiServer, EngineConfig, EntityService, GeocodeClient, GeocodeEndpoints, MemoryCache,
    MemoryRecordStore, TieredCache, TypeaheadResolver,
};

/// How often expired cache entries are swept
const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(300);

// =============================================================================
// CLI Arguments
// =============================================================================

/// Geo Location Engine - cached location typeahead and hierarchy upsert
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "ENGINE_CONFIG")]
    config: Option<PathBuf>,

    /// REST API bind address
    #[arg(long, env = "API_ADDR")]
    api_addr: Option<SocketAddr>,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR")]
    health_addr: Option<SocketAddr>,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,

    /// GeoNames account name
    #[arg(long, env = "GEONAMES_USERNAME")]
    geonames_username: Option<String>,

    /// GeoNames base URL
    #[arg(long, env = "GEONAMES_URL")]
    geonames_url: Option<String>,

    /// Language of place names
    #[arg(long, env = "GEONAMES_LANG")]
    lang: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    /// Load the config file, then apply flag and environment overrides
    fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_yaml_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => EngineConfig::default(),
        };

        if let Some(addr) = self.api_addr {
            config.api.rest_addr = addr;
        }
        if let Some(addr) = self.health_addr {
            config.api.health_addr = addr;
        }
        if let Some(addr) = self.metrics_addr {
            config.api.metrics_addr = addr;
        }
        if let Some(username) = &self.geonames_username {
            config.geocode.username = username.clone();
        }
        if let Some(url) = &self.geonames_url {
            config.geocode.base_url = url.clone();
        }
        if let Some(lang) = &self.lang {
            config.geocode.lang = lang.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = args.engine_config()?;

    info!("Starting Geo Location Engine");
    info!("  Version: {}", geo_location_engine::VERSION);
    info!("  REST API: {}", config.api.rest_addr);
    info!("  Geocode provider: {}", config.geocode.base_url);
    info!("  Language: {}", config.geocode.lang);
    if config.geocode.username.is_empty() {
        warn!("No GeoNames username configured, provider requests will be rejected");
    }

    // Shared cache and provider client
    let memory = Arc::new(MemoryCache::new());
    let cache = TieredCache::new(memory.clone(), config.cache.ttl_policy());
    let client = GeocodeClient::new(&config.geocode)?;
    let counters = client.counters();

    let resolver = Arc::new(TypeaheadResolver::new(
        Arc::new(client),
        cache.clone(),
        GeocodeEndpoints::new(&config.geocode),
        config.typeahead.clone(),
    ));

    let store = Arc::new(MemoryRecordStore::new());
    let entities = Arc::new(EntityService::new(store, cache.clone()));

    // Expired entries are otherwise only dropped when read again
    let sweeper = memory.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            sweeper.purge_expired();
        }
    });

    // Start health server
    let health_addr = config.api.health_addr;
    tokio::spawn(async move {
        if let Err(e) = run_health_server(health_addr).await {
            error!("Health server error: {}", e);
        }
    });

    // Start metrics server
    let metrics_addr = config.api.metrics_addr;
    let exporter = Arc::new(MetricsExporter::new(cache, memory, counters)?);
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(metrics_addr, exporter).await {
            error!("Metrics server error: {}", e);
        }
    });

    let api_server = ApiServer::new(config.api.clone(), resolver, entities);

    let shutdown = api_server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = shutdown.send(());
        }
    });

    api_server.run().await?;

    info!("Engine shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},hyper=warn,tower=warn,reqwest=warn,tower_http=info",
            level.as_str().to_ascii_lowercase()
        ))
    });

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Health Server
// =============================================================================

async fn run_health_server(addr: SocketAddr) -> anyhow::Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Response, Server, StatusCode};

    let make_svc = make_service_fn(|_conn| async {
        Ok::<_, std::convert::Infallible>(service_fn(|req: Request<Body>| async move {
            let (status, body) = match req.uri().path() {
                "/healthz" | "/livez" | "/readyz" => (StatusCode::OK, "ok"),
                _ => (StatusCode::NOT_FOUND, "not found"),
            };
            let mut response = Response::new(Body::from(body));
            *response.status_mut() = status;
            Ok::<_, std::convert::Infallible>(response)
        }))
    });

    info!("Health server listening on {}", addr);
    Server::try_bind(&addr)
        .context("Failed to bind health server")?
        .serve(make_svc)
        .await
        .context("Health server error")?;

    Ok(())
}

// =============================================================================
// Metrics Server
// =============================================================================

/// Publishes cache and provider counters as prometheus gauges
struct MetricsExporter {
    registry: prometheus::Registry,
    cache: TieredCache,
    memory: Arc<MemoryCache>,
    counters: Arc<GeocodeCounters>,
    cache_entries: prometheus::IntGauge,
    cache_requests: prometheus::IntGaugeVec,
    cache_writes: prometheus::IntGauge,
    cache_skipped_empty: prometheus::IntGauge,
    cache_deletes: prometheus::IntGauge,
    cache_backend_errors: prometheus::IntGauge,
    geocode_requests: prometheus::IntGaugeVec,
}

impl MetricsExporter {
    fn new(
        cache: TieredCache,
        memory: Arc<MemoryCache>,
        counters: Arc<GeocodeCounters>,
    ) -> prometheus::Result<Self> {
        use prometheus::{IntGauge, IntGaugeVec, Opts};

        let registry = prometheus::Registry::new();

        let cache_entries = IntGauge::new("geo_cache_entries", "Entries held by the memory cache")?;
        let cache_requests = IntGaugeVec::new(
            Opts::new("geo_cache_requests_total", "Cache lookups by outcome"),
            &["outcome"],
        )?;
        let cache_writes = IntGauge::new("geo_cache_writes_total", "Cache writes")?;
        let cache_skipped_empty = IntGauge::new(
            "geo_cache_skipped_empty_total",
            "Empty provider results not written to the cache",
        )?;
        let cache_deletes = IntGauge::new("geo_cache_deletes_total", "Cache keys invalidated")?;
        let cache_backend_errors =
            IntGauge::new("geo_cache_backend_errors_total", "Failed cache backend calls")?;
        let geocode_requests = IntGaugeVec::new(
            Opts::new("geo_provider_requests_total", "Geocode provider requests by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(cache_entries.clone()))?;
        registry.register(Box::new(cache_requests.clone()))?;
        registry.register(Box::new(cache_writes.clone()))?;
        registry.register(Box::new(cache_skipped_empty.clone()))?;
        registry.register(Box::new(cache_deletes.clone()))?;
        registry.register(Box::new(cache_backend_errors.clone()))?;
        registry.register(Box::new(geocode_requests.clone()))?;

        Ok(Self {
            registry,
            cache,
            memory,
            counters,
            cache_entries,
            cache_requests,
            cache_writes,
            cache_skipped_empty,
            cache_deletes,
            cache_backend_errors,
            geocode_requests,
        })
    }

    /// Refresh every gauge from the live counters and encode
    fn render(&self) -> prometheus::Result<Vec<u8>> {
        use prometheus::{Encoder, TextEncoder};

        self.cache_entries.set(self.memory.entry_count() as i64);

        let cache = self.cache.stats();
        self.cache_requests.with_label_values(&["hit"]).set(cache.hits as i64);
        self.cache_requests.with_label_values(&["miss"]).set(cache.misses as i64);
        self.cache_writes.set(cache.writes as i64);
        self.cache_skipped_empty.set(cache.skipped_empty as i64);
        self.cache_deletes.set(cache.deletes as i64);
        self.cache_backend_errors.set(cache.backend_errors as i64);

        let provider = self.counters.snapshot();
        for (outcome, value) in [
            ("all", provider.requests),
            ("success", provider.successes),
            ("timeout", provider.timeouts),
            ("rate_limited", provider.rate_limited),
            ("http_error", provider.http_errors),
            ("network_error", provider.network_errors),
            ("decode_error", provider.decode_errors),
        ] {
            self.geocode_requests
                .with_label_values(&[outcome])
                .set(value as i64);
        }

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

async fn run_metrics_server(addr: SocketAddr, exporter: Arc<MetricsExporter>) -> anyhow::Result<()> {
    use hyper::header::{HeaderValue, CONTENT_TYPE};
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Response, Server, StatusCode};

    let make_svc = make_service_fn(move |_conn| {
        let exporter = exporter.clone();
        async move {
            Ok::<_, std::convert::Infallible>(service_fn(move |req: Request<Body>| {
                let exporter = exporter.clone();
                async move {
                    let response = match req.uri().path() {
                        "/metrics" => match exporter.render() {
                            Ok(buffer) => {
                                let mut response = Response::new(Body::from(buffer));
                                response.headers_mut().insert(
                                    CONTENT_TYPE,
                                    HeaderValue::from_static("text/plain; version=0.0.4"),
                                );
                                response
                            }
                            Err(e) => {
                                error!("Failed to encode metrics: {}", e);
                                let mut response = Response::new(Body::from("encode failed"));
                                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                                response
                            }
                        },
                        _ => {
                            let mut response = Response::new(Body::from("not found"));
                            *response.status_mut() = StatusCode::NOT_FOUND;
                            response
                        }
                    };
                    Ok::<_, std::convert::Infallible>(response)
                }
            }))
        }
    });

    info!("Metrics server listening on {}", addr);
    Server::try_bind(&addr)
        .context("Failed to bind metrics server")?
        .serve(make_svc)
        .await
        .context("Metrics server error")?;

    Ok(())
}
