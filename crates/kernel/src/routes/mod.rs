//! HTTP route handlers.

pub mod api;
pub mod file;
pub mod health;
pub mod metrics;
pub mod plugin;
pub mod release;
pub mod session;
pub mod star;
pub mod stats;
pub mod user;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::middleware::from_fn_with_state;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::SameSite;
use tracing::warn;

use crate::config::Config;
use crate::middleware::{require_master_key, track_metrics};
use crate::session::{DEFAULT_SESSION_EXPIRY_DAYS, create_session_layer, parse_same_site};
use crate::state::AppState;

/// Settings for the outer HTTP layers.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub cors_allowed_origins: Vec<String>,
    pub same_site: SameSite,
    pub session_ttl_days: i64,
}

impl HttpSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cors_allowed_origins: config.cors_allowed_origins.clone(),
            same_site: parse_same_site(&config.cookie_same_site),
            session_ttl_days: config.session_ttl_days,
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            cors_allowed_origins: vec!["*".to_string()],
            same_site: SameSite::Strict,
            session_ttl_days: DEFAULT_SESSION_EXPIRY_DAYS,
        }
    }
}

/// Build the complete application router.
pub fn app(state: AppState, settings: &HttpSettings) -> Router {
    let session_layer =
        create_session_layer(state.db().clone(), settings.same_site, settings.session_ttl_days);

    let admin = file::admin_router()
        .merge(user::admin_router())
        .route_layer(from_fn_with_state(state.clone(), require_master_key));

    Router::new()
        .merge(health::router())
        .merge(stats::router())
        .merge(metrics::router())
        .merge(api::router())
        .merge(plugin::router())
        .merge(release::router())
        .merge(star::router())
        .merge(file::router())
        .merge(user::router())
        .merge(session::router())
        .merge(admin)
        // Last added runs first: trace, CORS, session, metrics, routes.
        .layer(DefaultBodyLimit::max(state.max_upload_bytes()))
        .layer(from_fn_with_state(state.clone(), track_metrics))
        .layer(session_layer)
        .layer(build_cors_layer(&settings.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if allowed_origins.len() == 1 && allowed_origins[0] == "*" {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();

        // Credentialed CORS cannot use wildcard headers.
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_credentials(true)
    }
}
