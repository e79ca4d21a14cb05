//! Linkdrop production directory server.
//!
//! Server-side half of the rendezvous system: registers transport-issued
//! peer identities, mints rooms behind six-character codes, resolves codes
//! back to waiting owners, and pushes membership changes to an owner's
//! open stream.
//!
//! ## Architecture
//!
//! ```text
//! linkdrop-server
//!   ├─ SystemEnv            (production Environment impl)
//!   ├─ RoomDirectory        (registration, minting, code resolution)
//!   │    ├─ Store           (peers + rooms + code index, conditional insert)
//!   │    └─ MembershipNotifier (per-room push channels)
//!   └─ http::router         (axum surface: /user, /room, SSE membership)
//! ```

mod directory;
mod error;
mod http;
mod notifier;
mod store;
mod system_env;

use std::sync::Arc;

pub use directory::RoomDirectory;
pub use error::{DirectoryError, ServerError};
pub use http::{AppState, router};
pub use notifier::MembershipNotifier;
pub use store::{MemoryStore, Store, StoreError};
pub use system_env::SystemEnv;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:8787")
    pub bind_address: String,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0:8787".to_string() }
    }
}

/// Production directory server.
///
/// Wraps the directory router with a bound listener and the ambient HTTP
/// layers (request tracing, permissive CORS for the browser frontend).
pub struct Server {
    router: axum::Router,
    listener: tokio::net::TcpListener,
}

impl Server {
    /// Create and bind a new server.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let directory = Arc::new(RoomDirectory::new(SystemEnv::new(), MemoryStore::new()));
        let state = AppState { directory };

        let router = router(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive());

        let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;

        Ok(Self { router, listener })
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the server until it is shut down or an error occurs.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server listening on {}", self.listener.local_addr()?);
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
