//! Webhook HTTP server for aviary: builds the axum router, wires in
//! authentication/IP-allowlist middleware and CORS, and serves the generic
//! and per-provider webhook endpoints on top of `aviary-core`'s Dispatch
//! Engine.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod remote;

use aviary_core::accounts::AccountTable;
use aviary_core::config::AviaryConfig;
use aviary_core::dispatch::{Dispatcher, RemoteClient};
use aviary_core::secrets::{SecretManager, SecretManagerOptions};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state handed to every handler.
pub struct AppState {
    pub config: AviaryConfig,
    pub accounts: Arc<AccountTable>,
    pub dispatcher: Arc<Dispatcher>,
    pub secrets: Arc<SecretManager>,
}

impl AppState {
    pub fn new(config: AviaryConfig, client: Arc<dyn RemoteClient>) -> Self {
        let accounts = Arc::new(AccountTable::new(config.accounts.clone()));
        let dispatcher = Arc::new(Dispatcher::new(accounts.clone(), client));
        let secrets = Arc::new(SecretManager::with_default_providers(
            SecretManagerOptions {
                retry_attempts: config.secrets.retry_attempts,
                retry_backoff_ms: config.secrets.retry_backoff_ms,
                cache_ttl_secs: config.secrets.cache_ttl_secs,
                cache_max_entries: config.secrets.cache_max_entries,
            },
            config.secrets.aws_region.clone(),
        ));
        Self {
            config,
            accounts,
            dispatcher,
            secrets,
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let parsed: Vec<_> = origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new().allow_origin(AllowOrigin::list(parsed))
}

/// Build the full router: health check (unauthenticated), generic webhook,
/// and one route per provider with a configured `webhook_path`. Each
/// per-provider route carries a `ForcedProvider` extension so
/// `auth_middleware` can apply that provider's own HMAC/shared secret
/// instead of falling straight to the global one; the generic route has no
/// such extension since its provider is only known once the body is parsed.
pub fn build_router(state: Arc<AppState>) -> Router {
    let health_router: Router<Arc<AppState>> = Router::new().route("/health", get(handlers::health_handler));

    let mut webhook_router: Router<Arc<AppState>> = Router::new()
        .route(&state.config.server.webhook_path.clone(), post(handlers::generic_webhook_handler))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::auth_middleware))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::ip_allowlist_middleware));

    for provider in &state.config.providers {
        if let Some(path) = &provider.webhook_path {
            let name = provider.name.clone();
            let handler = move |axum::extract::State(state): axum::extract::State<Arc<AppState>>, axum::Json(body)| {
                let name = name.clone();
                async move { handlers::provider_webhook_handler(state, &name, body).await }
            };
            let route: Router<Arc<AppState>> = Router::new()
                .route(path, post(handler))
                .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::auth_middleware))
                .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::ip_allowlist_middleware))
                .layer(axum::extract::Extension(middleware::ForcedProvider(provider.name.clone())));
            webhook_router = webhook_router.merge(route);
        }
    }

    health_router
        .merge(webhook_router)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.server.cors_origins))
                .layer(DefaultBodyLimit::max(state.config.server.max_payload_size)),
        )
        .with_state(state)
}

/// Bind and serve the router until the process receives a shutdown signal,
/// exposing the client's real IP to `ip_allowlist_middleware` via
/// `ConnectInfo`.
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "aviary webhook server listening");
    let router = build_router(state);
    axum::serve(listener, router.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Small `AppState` builders shared by this crate's own unit tests (not the
/// `tests/` integration suite, which builds its own fixtures).
#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;
    use aviary_core::config::{SecretsConfig, ServerConfig};
    use aviary_core::dispatch::MockRemoteClient;

    fn state_with(server: ServerConfig) -> Arc<AppState> {
        let config = AviaryConfig {
            accounts: vec![],
            providers: vec![],
            server,
            secrets: SecretsConfig::default(),
        };
        let client: Arc<dyn RemoteClient> = Arc::new(MockRemoteClient::new(vec![]));
        Arc::new(AppState::new(config, client))
    }

    pub fn state_with_global_hmac_secret(secret: &str) -> Arc<AppState> {
        let mut server = ServerConfig::default();
        server.hmac_secret = Some(secret.to_string());
        state_with(server)
    }

    pub fn state_with_global_webhook_secret(secret: &str) -> Arc<AppState> {
        let mut server = ServerConfig::default();
        server.webhook_secret = Some(secret.to_string());
        state_with(server)
    }

    pub fn state_with_no_auth() -> Arc<AppState> {
        state_with(ServerConfig::default())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
