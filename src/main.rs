mod backend;
mod config;
mod routes;
mod services;
mod state;
mod storage;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::backend::BackendClient;
use crate::config::{DashboardConfig, StoreKind};
use crate::services::session::SessionStore;
use crate::storage::{FileStorage, MemoryStorage, Storage};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = DashboardConfig::from_env().expect("invalid configuration");

    let storage: Arc<dyn Storage> = match config.store {
        StoreKind::File => {
            let file = FileStorage::new(config.store_path.clone());
            tracing::info!(path = %file.path().display(), "session storage: file");
            Arc::new(file)
        }
        StoreKind::Memory => {
            tracing::info!("session storage: memory");
            Arc::new(MemoryStorage::new())
        }
    };
    let session = Arc::new(SessionStore::new(storage));
    session.initialize();

    let backend = BackendClient::new(&config.backend_base_url).expect("backend client init failed");
    tracing::info!(backend = backend.base_url(), "backend configured");

    let addr = config.socket_addr();
    let state = state::AppState::new(session, Arc::new(backend));
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");

    tracing::info!(%addr, "cms-dashboard listening");
    axum::serve(listener, app).await.expect("server failed");
}
