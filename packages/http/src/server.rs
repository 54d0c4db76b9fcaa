//! HTTP/1.1 server loop.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::router::{text_response, Router};

/// Configuration for the HTTP server.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Reject request bodies larger than this with `413`. Unbounded if `None`.
    pub max_body_bytes: Option<usize>,
}

/// Accept connections on `listener` until `shutdown` resolves.
///
/// Each connection is served on its own task. Connections still open when
/// `shutdown` resolves are left to finish on the runtime.
pub async fn serve<F>(
    listener: TcpListener,
    router: Arc<Router>,
    config: ServerConfig,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()>,
{
    let config = Arc::new(config);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                };

                let router = Arc::clone(&router);
                let config = Arc::clone(&config);
                tokio::spawn(async move {
                    let service = service_fn(move |request: Request<Incoming>| {
                        let router = Arc::clone(&router);
                        let config = Arc::clone(&config);
                        async move { Ok::<_, Infallible>(dispatch(&router, &config, request).await) }
                    });

                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        tracing::debug!(%peer, error = %e, "connection closed with error");
                    }
                });
            }
            _ = &mut shutdown => {
                tracing::info!("shutting down");
                return Ok(());
            }
        }
    }
}

/// Read the body, then hand the request to the router.
async fn dispatch(
    router: &Router,
    config: &ServerConfig,
    request: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let (parts, body) = request.into_parts();
    let limit = config.max_body_bytes.unwrap_or(usize::MAX);

    let body = match Limited::new(body, limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            return text_response(StatusCode::PAYLOAD_TOO_LARGE, "request body too large")
                .map(Full::new);
        }
        Err(e) => {
            tracing::debug!(error = %e, "failed to read request body");
            return text_response(StatusCode::BAD_REQUEST, &e.to_string()).map(Full::new);
        }
    };

    router
        .handle(Request::from_parts(parts, body))
        .await
        .map(Full::new)
}
