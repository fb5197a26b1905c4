mod config;
mod context;
mod errors;
mod socket;

use std::{future::Future, net::SocketAddr};

use axum::{
    http::{header, StatusCode, Uri},
    response::IntoResponse,
    routing::get,
    Router,
};
use log::{debug, error, info};
use tokio::net::TcpListener;

pub use config::*;
pub use context::*;
pub use errors::*;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

/// Builds the router serving the WebSocket endpoint, and nothing else.
pub fn router(context: ServerContext) -> Router {
    let path = context.config.ws_path.clone();

    Router::new()
        .route(&path, get(socket::upgrade))
        .fallback(reject)
        .with_state(context)
}

/// Serves connections from a bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, context: ServerContext, shutdown: F) -> ServerResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().map_err(ServerError::Serve)?;
    info!("Listening on {}{}", addr, context.config.ws_path);

    axum::serve(
        listener,
        router(context).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .map_err(ServerError::Serve)
}

/// Starts the tandem server, stopping on Ctrl-C.
pub async fn run_server(config: ServerConfig) -> ServerResult<()> {
    let addr = config.addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    serve(listener, ServerContext::new(config), shutdown_signal()).await?;

    info!("Server stopped");
    Ok(())
}

async fn reject(uri: Uri) -> impl IntoResponse {
    debug!("Rejected request to {}", uri);

    (StatusCode::NOT_FOUND, [(header::CONNECTION, "close")])
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down, waiting for connections to close..."),
        Err(err) => {
            error!("Could not listen for Ctrl-C, graceful shutdown is unavailable: {}", err);
            std::future::pending::<()>().await
        }
    }
}
