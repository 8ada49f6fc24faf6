//! Shared helpers for HTTP-backed integration tests.

use axum::Router;
use tokio::task::JoinHandle;

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> (String, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local listener");
    let addr = listener.local_addr().expect("read local addr");
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    (format!("http://{addr}"), handle)
}
