pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod types;


use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use crate::config::Config;
use crate::db::Database;

pub use error::{ApiError, ApiResult, AppError, ErrorCode};
pub use state::{AppState, AuthSettings};

/// Server handle for managing the running server
pub struct ServerHandle {
    pub addr: SocketAddr,
    pub shutdown_tx: oneshot::Sender<()>,
    pub join: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Signal graceful shutdown and wait for in-flight requests to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.join.await {
            tracing::error!("API server task failed: {}", e);
        }
    }
}

/// Start the API server
pub async fn start_server(db: Arc<Database>, config: &Config) -> anyhow::Result<ServerHandle> {
    let state = AppState::new(db, AuthSettings::from(config));
    let router = routes::create_router(state, &config.cors_origins);

    let addr = SocketAddr::from((config.host, config.port));
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("API server listening on http://{}", actual_addr);

    let join = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
                tracing::info!("API server shutting down");
            })
            .await;
        if let Err(e) = result {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(ServerHandle {
        addr: actual_addr,
        shutdown_tx,
        join,
    })
}
