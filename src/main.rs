use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use agent_network::config::{Settings, StorageBackend};
use agent_network::core::Matcher;
use agent_network::models::ErrorResponse;
use agent_network::routes::{self, AppState};
use agent_network::services::{CacheManager, HttpSimilarityClient, MemoryStore, NetworkStore, PostgresStore};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// JSON error body for malformed payloads and queries
#[derive(Debug)]
struct PayloadError(ErrorResponse);

impl std::fmt::Display for PayloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.0.error, self.0.message)
    }
}

impl error::ResponseError for PayloadError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code).unwrap_or(StatusCode::BAD_REQUEST)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(&self.0)
    }
}

fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    PayloadError(ErrorResponse {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    })
    .into()
}

fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    PayloadError(ErrorResponse {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    })
    .into()
}

fn init_logging(settings: &Settings) {
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| settings.logging.level.clone());
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| settings.logging.format.clone());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn io_error(message: String) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, message)
}

async fn build_store(settings: &Settings) -> std::io::Result<Arc<dyn NetworkStore>> {
    match settings.storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Postgres => {
            let db = &settings.database;
            let max_connections = db.max_connections.unwrap_or(10);
            let store = PostgresStore::new(
                &db.url,
                max_connections,
                db.min_connections.unwrap_or(1),
                db.acquire_timeout_secs.unwrap_or(5),
                db.idle_timeout_secs.unwrap_or(600),
            )
            .await
            .map_err(|e| {
                error!("Failed to connect to PostgreSQL: {}", e);
                io_error(format!("PostgreSQL connection error: {}", e))
            })?;

            info!("PostgreSQL store initialized (max: {} connections)", max_connections);
            Ok(Arc::new(store))
        }
    }
}

async fn build_cache(settings: &Settings) -> Arc<CacheManager> {
    let ttl = settings.cache.ttl_secs.unwrap_or(300);
    let l1_size = settings.cache.l1_cache_size.unwrap_or(1000);

    match CacheManager::new(settings.cache.redis_url.as_deref(), l1_size, ttl).await {
        Ok(cache) => {
            info!(
                "Cache manager initialized (L1: {} entries, L2: {}, TTL: {}s)",
                l1_size,
                cache.has_l2(),
                ttl
            );
            Arc::new(cache)
        }
        Err(e) => {
            warn!("Failed to connect to Redis ({}), caching in-process only", e);
            Arc::new(CacheManager::in_memory(l1_size, ttl))
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    let settings = Settings::load().map_err(|e| io_error(format!("Configuration error: {}", e)))?;

    init_logging(&settings);
    info!("Starting agent network service...");

    settings
        .validate()
        .map_err(|e| io_error(format!("Invalid tunables: {}", e)))?;

    let store = build_store(&settings).await?;
    let cache = build_cache(&settings).await;

    let mut matcher = Matcher::new(store)
        .with_cache(cache)
        .with_max_parallel_evaluations(settings.matching.max_parallel_evaluations)
        .with_policy(settings.match_policy())
        .and_then(|m| m.with_weights(settings.ranking_weights()))
        .map_err(|e| io_error(e.to_string()))?;

    if let Some(endpoint) = &settings.similarity.endpoint {
        let client = HttpSimilarityClient::new(
            endpoint.clone(),
            settings.similarity.api_key.clone(),
            settings.similarity.timeout_secs.unwrap_or(5),
        )
        .map_err(|e| io_error(format!("Similarity client error: {}", e)))?;
        matcher = matcher.with_similarity(Arc::new(client));
        info!("Similarity client initialized for {}", endpoint);
    }

    info!(
        "Matcher initialized with policy {:?} and weights {:?}",
        matcher.policy(),
        matcher.weights()
    );

    let app_state = AppState { matcher };

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
