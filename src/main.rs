use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{routing::get, Router};
use http::HeaderValue;
use slog::o;
use tokio::{signal, sync::mpsc};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

use matflow_api as api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db_arc = Arc::new(db_pool);

    // Init events and the change feed driving cache invalidation
    let (event_tx, event_rx) = mpsc::channel(cfg.event_buffer_size);
    let event_sender = api::events::EventSender::new(event_tx);
    let feed = api::events::ChangeFeed::default();
    tokio::spawn(api::events::process_events(event_rx, feed.clone()));

    // Notification relay (logged locally when no endpoint is configured)
    let base_logger = api::logging::setup_logger(api::logging::LoggerConfig::default());
    let notifier: Arc<dyn api::notifications::Notifier> =
        match cfg.notification_webhook_url.clone() {
            Some(endpoint) => {
                info!("Notification relay configured: {}", endpoint);
                Arc::new(api::notifications::WebhookNotifier::new(
                    endpoint,
                    base_logger.new(o!("component" => "notifier")),
                ))
            }
            None => {
                info!("Notification relay not configured; notifications will be logged");
                Arc::new(api::notifications::LogNotifier::new(
                    base_logger.new(o!("component" => "notifier")),
                ))
            }
        };

    // Aggregate app services used by HTTP handlers
    let services = api::services::AppServices::new(
        db_arc.clone(),
        Arc::new(event_sender.clone()),
        feed,
        notifier,
        Duration::from_secs(cfg.refetch_interval_secs),
        base_logger,
    );

    // Background reconciliation: change-feed invalidation + polling fallback
    tokio::spawn(services.query.clone().run_sync());

    // Token verification for the API surface
    let verifier = Arc::new(api::auth::TokenVerifier::new(&cfg.jwt_secret));

    // Compose shared app state
    let app_state = api::AppState {
        db: db_arc.clone(),
        config: cfg.clone(),
        event_sender,
        services,
    };

    // Build CORS layer from config
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    let cors_layer = if let Some(origins) = configured_origins {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.should_allow_permissive_cors() {
        info!("Using permissive CORS (no explicit origins configured)");
        CorsLayer::permissive()
    } else {
        error!("Missing CORS configuration; set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true");
        anyhow::bail!(
            "Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true"
        );
    };

    // Build router: status/health + v1 API (bearer auth) + Swagger UI
    let app = Router::<api::AppState>::new()
        .route("/", get(|| async { "matflow-api up" }))
        .route("/status", get(api::api_status))
        .route("/health", get(api::health_check))
        .nest(
            "/api/v1",
            api::api_v1_routes().layer(axum::middleware::from_fn_with_state(
                verifier.clone(),
                api::auth::require_auth,
            )),
        )
        .merge(api::openapi::swagger_ui())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors_layer)
        .with_state(app_state);

    // Bind and serve
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    info!("matflow-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind listener")?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
