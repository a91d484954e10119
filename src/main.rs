use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use tokio::sync::mpsc;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::{info, warn};

use coursepay_api::{
    config::{init_tracing, load_config},
    db,
    events::{process_events, EventSender},
    handlers,
    openapi::swagger_ui,
    services::{
        catalog::SeaOrmCatalogResolver,
        fulfillment::FulfillmentDispatcher,
        gateway::HttpPaymentGateway,
        lifecycle::OrderLifecycleService,
        order_store::SeaOrmOrderStore,
        subscriptions::SeaOrmSubscriptionActivator,
        wallet::SeaOrmWalletLedger,
    },
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(config.log_level(), config.log_json);
    info!(
        environment = %config.environment,
        "starting coursepay-api"
    );

    let db = Arc::new(db::establish_connection_from_app_config(&config).await?);
    if config.auto_migrate {
        db::run_migrations(&db).await?;
    }

    let (event_tx, event_rx) = mpsc::channel(1024);
    tokio::spawn(process_events(event_rx));
    let events = EventSender::new(event_tx);

    let gateway = Arc::new(HttpPaymentGateway::new(
        config.gateway_base_url.clone(),
        config.gateway_key_id.clone(),
        config.gateway_key_secret.clone(),
        Duration::from_secs(config.gateway_timeout_secs),
    )?);
    let fulfillment = Arc::new(FulfillmentDispatcher::new(
        Arc::new(SeaOrmWalletLedger::new(db.clone())),
        Arc::new(SeaOrmSubscriptionActivator::new(db.clone())),
        events.clone(),
    ));
    let lifecycle = Arc::new(OrderLifecycleService::new(
        Arc::new(SeaOrmOrderStore::new(db.clone())),
        gateway,
        Arc::new(SeaOrmCatalogResolver::new(db.clone())),
        fulfillment,
        events,
        config.currency.clone(),
        config.payment_return_url.clone(),
    ));

    if config.payment_webhook_secret.is_none() {
        warn!("payment_webhook_secret is not set; all webhooks will be rejected");
    }

    let cors = if config.should_allow_permissive_cors() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter_map(|origin| origin.trim().parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    };

    let state = AppState {
        db,
        config: Arc::new(config.clone()),
        lifecycle,
    };

    let app = handlers::api_routes()
        .merge(swagger_ui())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
