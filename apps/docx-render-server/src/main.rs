//! DOCX Render Server
//!
//! Fills Word (`.docx`) templates with JSON data over HTTP. A caller
//! posts a template location plus a data record and receives the merged
//! document as a download.
//!
//! ## Architecture
//!
//! - Template fetching via `reqwest`, optionally restricted to a host allow-list
//! - Rendering via `docx-engine` on the blocking thread pool
//! - Optional shared-secret authentication on `/render`
//! - Optional per-IP rate limiting via tower-governor
//! - Static template hosting under `/templates`

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use clap::Parser;
use docx_engine::{DocumentEngine, DocxEngine};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    set_header::SetResponseHeader,
    trace::TraceLayer,
};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod auth;
mod compose;
mod error;
mod fetch;
#[cfg(test)]
mod tests;

use api::{handle_health, handle_render};
use auth::{require_api_key, API_KEY_HEADER};
use fetch::{HttpFetcher, LocationPolicy, TemplateFetcher, DEFAULT_MAX_TEMPLATE_BYTES};

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Cache policy for hosted templates
const TEMPLATE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Command-line arguments for the DOCX render server
#[derive(Parser, Debug)]
#[command(name = "docx-render-server")]
#[command(about = "Render DOCX templates with JSON data over HTTP")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Shared secret expected in the x-api-key header (unset disables auth)
    #[arg(long, env = "API_KEY")]
    api_key: Option<String>,

    /// Render timeout in milliseconds
    #[arg(long, env = "RENDER_TIMEOUT_MS", default_value = "10000")]
    timeout_ms: u64,

    /// Template fetch timeout in milliseconds
    #[arg(long, env = "FETCH_TIMEOUT_MS", default_value = "30000")]
    fetch_timeout_ms: u64,

    /// Largest template accepted from upstream, in bytes
    #[arg(long, env = "MAX_TEMPLATE_BYTES", default_value_t = DEFAULT_MAX_TEMPLATE_BYTES)]
    max_template_bytes: usize,

    /// Rate limit: requests per second per IP (0 disables)
    #[arg(long, env = "RATE_LIMIT", default_value = "0")]
    rate_limit: u32,

    /// Send CORS headers
    #[arg(long, env = "CORS_ENABLED", default_value_t = true, action = clap::ArgAction::Set)]
    cors: bool,

    /// Directory served under /templates
    #[arg(long, env = "TEMPLATES_DIR", default_value = "templates")]
    templates_dir: PathBuf,

    /// Hosts templates may be fetched from (comma separated, empty allows any)
    #[arg(long, env = "TEMPLATE_ALLOWED_HOSTS", value_delimiter = ',')]
    allowed_hosts: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<dyn TemplateFetcher>,
    pub engine: Arc<dyn DocumentEngine>,
    /// Render timeout in milliseconds
    pub timeout_ms: u64,
    /// Expected x-api-key value
    pub api_key: Option<Arc<str>>,
}

/// Router-level switches
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub cors: bool,
    pub templates_dir: PathBuf,
}

/// Build the application router (without rate limiting)
pub fn build_router(state: AppState, config: &RouterConfig) -> Router {
    let render = Router::new()
        .route("/render", post(handle_render))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let router = Router::new()
        .route("/health", get(handle_health))
        .merge(render)
        .nest_service("/templates", template_files(&config.templates_dir))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if config.cors {
        router.layer(cors_layer())
    } else {
        router
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(API_KEY_HEADER)])
}

fn template_files(dir: &Path) -> SetResponseHeader<ServeDir, HeaderValue> {
    SetResponseHeader::if_not_present(
        ServeDir::new(dir),
        header::CACHE_CONTROL,
        HeaderValue::from_static(TEMPLATE_CACHE_CONTROL),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting docx-render-server on {}:{}", args.host, args.port);

    let policy = LocationPolicy::new(&args.allowed_hosts);
    if policy.is_unrestricted() {
        info!("Template locations: any http(s) host");
    } else {
        info!("Template locations: {}", args.allowed_hosts.join(", "));
    }

    let fetcher = HttpFetcher::new(Duration::from_millis(args.fetch_timeout_ms), policy)
        .context("Failed to build HTTP client")?
        .with_max_bytes(args.max_template_bytes);

    if args.api_key.is_none() {
        warn!("API_KEY is not set; /render accepts unauthenticated requests");
    }

    // Create shared state
    let state = AppState {
        fetcher: Arc::new(fetcher),
        engine: Arc::new(DocxEngine::default()),
        timeout_ms: args.timeout_ms,
        api_key: args.api_key.map(Arc::from),
    };

    let config = RouterConfig {
        cors: args.cors,
        templates_dir: args.templates_dir.clone(),
    };

    let mut app = build_router(state, &config);

    if args.rate_limit > 0 {
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(args.rate_limit.into())
                .burst_size(args.rate_limit * 2)
                .finish()
                .context("Failed to create rate limiter config")?,
        );
        app = app.layer(GovernorLayer {
            config: governor_conf,
        });
        info!("Rate limit: {} requests/second per IP", args.rate_limit);
    }

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Serving templates from {}", args.templates_dir.display());
    info!("Render timeout: {}ms", args.timeout_ms);
    info!("Template size limit: {} bytes", args.max_template_bytes);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
