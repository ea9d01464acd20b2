use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use common_auth::{JwtConfig, JwtVerifier};
use redis::aio::ConnectionManager;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use recipe_service::cache::RedisCache;
use recipe_service::config::{AuthStrategy, ServiceConfig};
use recipe_service::credentials::{PasswordAuthenticator, PgCredentialStore};
use recipe_service::gate::CredentialVerifier;
use recipe_service::metrics::ServiceMetrics;
use recipe_service::repository::RecipeRepository;
use recipe_service::sessions::{RedisSessionBackend, SessionManager};
use recipe_service::store::PgRecipeStore;
use recipe_service::tokens::TokenIssuer;
use recipe_service::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServiceConfig::from_env()?;

    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to Postgres")?;
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("Failed to run migrations")?;

    let redis_client =
        redis::Client::open(config.redis_url.as_str()).context("Failed to create Redis client")?;
    let redis = ConnectionManager::new(redis_client)
        .await
        .context("Failed to connect to Redis")?;

    let metrics = ServiceMetrics::new()?;
    let token_issuer = Arc::new(TokenIssuer::new(config.tokens.clone())?);
    let sessions = Arc::new(SessionManager::new(
        Arc::new(RedisSessionBackend::new(
            redis.clone(),
            config.redis_key_prefix.clone(),
        )),
        config.sessions.clone(),
    ));

    let gate = match config.strategy {
        AuthStrategy::Jwt => CredentialVerifier::Bearer(token_issuer.clone()),
        AuthStrategy::Session => CredentialVerifier::Session(sessions.clone()),
        AuthStrategy::External => {
            let external = config
                .external
                .as_ref()
                .context("external strategy selected without issuer settings")?;
            let jwt_config = JwtConfig::for_domain(&external.domain, &external.api_identifier)
                .with_leeway(0)
                .with_fetch_timeout(external.fetch_timeout);
            let verifier = JwtVerifier::builder(jwt_config)
                .with_issuer_jwks()
                .context("Failed to configure JWKS fetcher")?
                .build();
            CredentialVerifier::External(Arc::new(verifier))
        }
    };
    info!(strategy = config.strategy.as_str(), "Authorization gate configured");

    let repository = RecipeRepository::new(
        Arc::new(PgRecipeStore::new(db_pool.clone())),
        Arc::new(RedisCache::from_manager(
            redis,
            config.redis_key_prefix.clone(),
        )),
        metrics.clone(),
    );

    let state = AppState {
        repository,
        authenticator: PasswordAuthenticator::new(Arc::new(PgCredentialStore::new(db_pool))),
        token_issuer,
        sessions,
        gate,
        metrics,
    };

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(origin = %origin, error = %err, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true);

    let app = build_router(state).layer(cors);

    let ip: std::net::IpAddr = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST '{}'", config.host))?;
    let addr = SocketAddr::from((ip, config.port));

    info!(%addr, "starting recipe-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
