use crate::{
    auth::{PermissionTable, TokenCodec},
    store::{self, PgUserStore, UserStore},
};
use anyhow::{Context, Result};
use axum::{
    Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{
            AUTHORIZATION, CONTENT_TYPE, REFERRER_POLICY, STRICT_TRANSPORT_SECURITY,
            X_CONTENT_TYPE_OPTIONS, X_DNS_PREFETCH_CONTROL, X_FRAME_OPTIONS, X_XSS_PROTECTION,
        },
    },
    middleware::from_fn_with_state,
    routing::{MethodRouter, get, post},
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::{SetRequestHeaderLayer, SetResponseHeaderLayer},
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;

pub mod error;
pub mod handlers;
pub mod middleware;
mod openapi;

pub use openapi::openapi;

use handlers::{health, login, mock};

/// Shared, read-only state handed to every handler and stage.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub codec: Arc<TokenCodec>,
    pub permissions: Arc<PermissionTable>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn UserStore>, codec: TokenCodec, permissions: PermissionTable) -> Self {
        Self {
            store,
            codec: Arc::new(codec),
            permissions: Arc::new(permissions),
        }
    }
}

/// Server settings resolved from the command line.
#[derive(Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub dsn: String,
    pub codec: TokenCodec,
    pub permissions: PermissionTable,
    pub seed_users: bool,
}

/// Build the application router.
///
/// The protected routes run authentication then authorization; `/login`,
/// `/health-check` and `/openapi.json` are public. Unmatched routes, and
/// known paths hit with another method, fall through to the JSON 404.
pub fn router(state: AppState) -> Router {
    // stages wrap the matched method only, so a method miss skips them
    let stages = state.clone();
    let protected = move |method_router: MethodRouter<AppState>| {
        method_router
            // the last layer added runs first
            .route_layer(from_fn_with_state(stages.clone(), middleware::authorize))
            .route_layer(from_fn_with_state(stages.clone(), middleware::authenticate))
            .fallback(error::not_found)
    };

    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any);

    Router::new()
        .route("/login", post(login::login).fallback(error::not_found))
        .route(
            "/health-check",
            get(health::health_check).fallback(error::not_found),
        )
        .route(
            "/openapi.json",
            get(openapi::openapi_json).fallback(error::not_found),
        )
        .route("/mock", protected(get(mock::mock)))
        .route("/admin-mock", protected(get(mock::admin_mock)))
        .route("/user-mock", protected(get(mock::user_mock)))
        .fallback(error::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(overriding(X_CONTENT_TYPE_OPTIONS, "nosniff"))
                .layer(overriding(X_FRAME_OPTIONS, "SAMEORIGIN"))
                .layer(overriding(REFERRER_POLICY, "no-referrer"))
                .layer(overriding(
                    STRICT_TRANSPORT_SECURITY,
                    "max-age=31536000; includeSubDomains",
                ))
                .layer(overriding(X_DNS_PREFETCH_CONTROL, "off"))
                .layer(overriding(X_XSS_PROTECTION, "0"))
                .layer(overriding(
                    HeaderName::from_static("x-permitted-cross-domain-policies"),
                    "none",
                ))
                .layer(overriding(
                    HeaderName::from_static("cross-origin-opener-policy"),
                    "same-origin",
                ))
                .layer(overriding(
                    HeaderName::from_static("cross-origin-resource-policy"),
                    "same-origin",
                ))
                .layer(CatchPanicLayer::custom(error::handle_panic)),
        )
        .with_state(state)
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(config: ServerConfig) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&config.dsn)
        .await
        .context("Failed to connect to database")?;

    store::postgres::apply_schema(&pool)
        .await
        .context("Failed to apply database schema")?;

    let user_store = Arc::new(PgUserStore::new(pool));

    if config.seed_users {
        store::seed_initial_users(user_store.as_ref())
            .await
            .context("Failed to seed initial users")?;
    }

    let state = AppState::new(user_store, config.codec, config.permissions);

    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{}", config.port)).await?;

    info!("Listening on [::]:{}", config.port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

/// Security header applied to every response, replacing any handler value.
fn overriding(name: HeaderName, value: &'static str) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(name, HeaderValue::from_static(value))
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
