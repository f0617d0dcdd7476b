use mole_api::{
    build_router,
    config::ApiConfig,
    db::{self, Database},
    services::{
        CognitoIdentityProvider, FcmProvider, KeySetError, ObjectStorage, PermissionTable,
        ProfileSynchronizer, PushProvider, S3Storage, TokenValidator,
    },
    AppState,
};
use service_core::error::AppError;
use service_core::observability::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    // Load configuration - fail fast if invalid
    let config = ApiConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )
    .map_err(AppError::ConfigError)?;

    mole_api::services::metrics::init_metrics().map_err(AppError::ConfigError)?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting mole API"
    );

    // Signing keys are resolved once; the set is immutable afterwards
    let key_source = config
        .keys
        .source
        .as_ref()
        .ok_or(KeySetError::Empty)?;
    let keys = key_source.load(config.keys.extra_jwk.as_deref()).await?;
    let validator = Arc::new(TokenValidator::new(keys));

    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
    let db = Database::new(pool);

    let sdk = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

    let identity = Arc::new(CognitoIdentityProvider::from_sdk_config(
        &sdk,
        &config.identity.region,
        config.identity.user_pool_id.clone(),
        config.identity.endpoint.as_deref(),
    ));
    let profiles = ProfileSynchronizer::new(Arc::new(db.clone()), identity);

    let storage: Arc<dyn ObjectStorage> = Arc::new(S3Storage::from_sdk_config(
        &sdk,
        &config.storage.region,
        config.storage.endpoint.as_deref(),
    ));
    tracing::info!(bucket = %config.storage.bucket, "Object storage initialized");

    let push: Option<Arc<dyn PushProvider>> = if config.push.enabled {
        let provider = FcmProvider::new(
            config.push.fcm_project_id.clone(),
            config.push.fcm_access_token.clone(),
        )
        .map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))?;
        tracing::info!("Push notifications enabled");
        Some(Arc::new(provider))
    } else {
        tracing::info!("Push notifications disabled");
        None
    };

    let port = config.common.port;
    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );

    let state = AppState {
        config: Arc::new(config),
        db,
        validator,
        permissions: Arc::new(PermissionTable::default()),
        profiles,
        storage,
        push,
    };
    let app = build_router(state)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Unable to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Unable to install the SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
