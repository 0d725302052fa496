//! HTTP transport for booking chat.
//!
//! Exposes a [`ChatBackend`] over a JSON API with Server-Sent-Events push.
//! The acting user arrives in the `x-user-id` header from the upstream
//! identity layer; an optional shared bearer token guards the whole API.
//! Uploaded attachments are served back from the bucket path.

mod config;
mod error;
pub mod routes;
mod state;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use attachment_uploader::{AttachmentUploader, LocalBlobStorage, UploadConfig};
use axum::Router;
use chat_database::Database;
use delivery_bus::{BusConfig, DeliveryBus};
use messaging::{Messenger, MessagingConfig};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::info;

// Public exports
pub use config::ServerConfig;
pub use error::{status_for, ApiError, ApiResult, ServerError};
pub use state::{AppState, Identity};

pub use chat_core::ChatBackend;

/// Build the application: API routes plus static attachment files.
pub fn app(state: AppState, upload: &UploadConfig, upload_dir: &Path) -> Router {
    routes::router(upload.max_bytes)
        .nest_service(&upload.bucket_path(), ServeDir::new(upload_dir))
        .with_state(state)
}

/// Serve `app` until `shutdown` completes, then close the bus so open event
/// streams end and the graceful shutdown can finish.
pub async fn serve<S>(
    listener: TcpListener,
    app: Router,
    bus: DeliveryBus,
    shutdown: S,
) -> Result<(), ServerError>
where
    S: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Shutdown requested, closing delivery bus");
            bus.close();
        })
        .await?;
    Ok(())
}

/// Connect, migrate and serve with the given configuration until Ctrl+C.
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    let upload = UploadConfig::from_env()?;
    let bus = DeliveryBus::new(BusConfig::from_env());
    let uploader = AttachmentUploader::new(
        Arc::new(LocalBlobStorage::new(config.upload_dir.clone())),
        upload.clone(),
    );
    let messenger = Messenger::with_sqlite_bookings(
        db.clone(),
        bus.clone(),
        uploader,
        MessagingConfig::from_env(),
    );

    let state = AppState::new(Arc::new(messenger), config.api_token.clone());
    let app = app(state, &upload, &config.upload_dir);

    let listener = TcpListener::bind(config.addr).await?;
    info!(
        addr = %config.addr,
        auth = config.api_token.is_some(),
        bucket = %upload.bucket_path(),
        "Chat server listening"
    );

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    serve(listener, app, bus, shutdown).await?;

    db.close().await;
    info!("Chat server stopped");
    Ok(())
}

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
