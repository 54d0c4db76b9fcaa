//! Request routing.
//!
//! Dispatch is a plain table of `(method, pattern) -> endpoint` entries. A
//! path that matches some pattern but none with the request's method gets
//! `405 Method Not Allowed`; a path that matches nothing gets `404`.

use std::time::Instant;

use bytes::Bytes;
use hashbox_content_store::ContentHash;
use hashbox_harness::CancellationSignal;
use http::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use http::{Method, Request, Response, StatusCode};
use serde::Serialize;

use crate::backend::Backend;
use crate::error::ServiceError;

/// Header carrying the machine-readable error kind on failed requests.
pub const ERROR_KIND_HEADER: &str = "x-hashbox-error";

/// What a matched route does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Store the request body.
    PutBlob,
    /// Return the blob named by the path parameter.
    GetBlob,
    /// Run the module named by the path parameter on the request body.
    Execute,
}

/// How a route matches a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePattern {
    /// The whole path, no parameter.
    Exact(&'static str),
    /// A prefix; the rest of the path is the parameter.
    Prefix(&'static str),
}

impl RoutePattern {
    /// The path parameter if `path` matches.
    fn capture<'p>(&self, path: &'p str) -> Option<&'p str> {
        match self {
            RoutePattern::Exact(p) => (path == *p).then_some(""),
            RoutePattern::Prefix(p) => path.strip_prefix(p),
        }
    }
}

/// One entry in the routing table.
#[derive(Debug, Clone)]
pub struct Route {
    pub method: Method,
    pub pattern: RoutePattern,
    pub endpoint: Endpoint,
}

impl Route {
    pub fn new(method: Method, pattern: RoutePattern, endpoint: Endpoint) -> Self {
        Self {
            method,
            pattern,
            endpoint,
        }
    }
}

/// The standard table:
///
/// | Method | Path              | Endpoint  |
/// |--------|-------------------|-----------|
/// | PUT    | `/blobs`          | PutBlob   |
/// | GET    | `/blobs/{hash}`   | GetBlob   |
/// | POST   | `/execute/{hash}` | Execute   |
pub fn default_routes() -> Vec<Route> {
    vec![
        Route::new(Method::PUT, RoutePattern::Exact("/blobs"), Endpoint::PutBlob),
        Route::new(Method::GET, RoutePattern::Prefix("/blobs/"), Endpoint::GetBlob),
        Route::new(Method::POST, RoutePattern::Prefix("/execute/"), Endpoint::Execute),
    ]
}

/// Outcome of looking a request up in the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Matched { endpoint: Endpoint, param: String },
    MethodNotAllowed { allow: Vec<Method> },
    NotFound,
}

#[derive(Serialize)]
struct BlobCreated<'a> {
    hash: &'a ContentHash,
}

/// Maps requests to backend operations.
pub struct Router {
    routes: Vec<Route>,
    backend: Backend,
}

impl Router {
    /// A router with [`default_routes`].
    pub fn new(backend: Backend) -> Self {
        Self::with_routes(backend, default_routes())
    }

    pub fn with_routes(backend: Backend, routes: Vec<Route>) -> Self {
        Self { routes, backend }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Find the route for `method` and `path`.
    pub fn resolve(&self, method: &Method, path: &str) -> Resolution {
        let mut allow = Vec::new();
        for route in &self.routes {
            if let Some(param) = route.pattern.capture(path) {
                if route.method == *method {
                    return Resolution::Matched {
                        endpoint: route.endpoint,
                        param: param.to_string(),
                    };
                }
                allow.push(route.method.clone());
            }
        }
        if allow.is_empty() {
            Resolution::NotFound
        } else {
            Resolution::MethodNotAllowed { allow }
        }
    }

    /// Handle a request whose body has already been read.
    pub async fn handle(&self, request: Request<Bytes>) -> Response<Bytes> {
        let started = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let response = match self.resolve(&method, &path) {
            Resolution::NotFound => text_response(StatusCode::NOT_FOUND, "not found"),
            Resolution::MethodNotAllowed { allow } => method_not_allowed(&allow),
            Resolution::Matched { endpoint, param } => {
                let body = request.into_body();
                match endpoint {
                    Endpoint::PutBlob => self.put_blob(body).await,
                    Endpoint::GetBlob => self.get_blob(param).await,
                    Endpoint::Execute => self.execute(param, body).await,
                }
            }
        };

        let status = response.status();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if status.is_server_error() {
            tracing::warn!(%method, %path, status = status.as_u16(), elapsed_ms, "request failed");
        } else {
            tracing::info!(%method, %path, status = status.as_u16(), elapsed_ms, "request handled");
        }
        response
    }

    async fn put_blob(&self, body: Bytes) -> Response<Bytes> {
        match self.backend.put(body).await {
            Ok(hash) => match serde_json::to_vec(&BlobCreated { hash: &hash }) {
                Ok(json) => {
                    let mut response = Response::new(Bytes::from(json));
                    *response.status_mut() = StatusCode::CREATED;
                    response
                        .headers_mut()
                        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                    response
                }
                Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
            },
            Err(e) => error_response(&e),
        }
    }

    async fn get_blob(&self, param: String) -> Response<Bytes> {
        if param.is_empty() {
            return text_response(StatusCode::BAD_REQUEST, "hash required");
        }
        match self.backend.get(ContentHash::from(param)).await {
            Ok(data) => octet_response(data),
            Err(e) => error_response(&e),
        }
    }

    async fn execute(&self, param: String, input: Bytes) -> Response<Bytes> {
        if param.is_empty() {
            return text_response(StatusCode::BAD_REQUEST, "hash required");
        }

        // If the client goes away this future is dropped and the guard
        // cancels the running sandbox.
        let signal = CancellationSignal::new();
        let guard = signal.cancel_on_drop();
        let result = self
            .backend
            .execute_stored(ContentHash::from(param), input, signal)
            .await;
        guard.disarm();

        match result {
            Ok(output) => octet_response(Bytes::from(output)),
            Err(e) => error_response(&e),
        }
    }
}

pub(crate) fn text_response(status: StatusCode, message: &str) -> Response<Bytes> {
    let mut response = Response::new(Bytes::from(format!("{}\n", message)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn octet_response(data: Bytes) -> Response<Bytes> {
    let mut response = Response::new(data);
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    response
}

fn method_not_allowed(allow: &[Method]) -> Response<Bytes> {
    let mut response = text_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
    let allow = allow
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if let Ok(value) = HeaderValue::from_str(&allow) {
        response.headers_mut().insert(ALLOW, value);
    }
    response
}

fn error_response(error: &ServiceError) -> Response<Bytes> {
    let message = match error {
        ServiceError::NotFound(_) => "not found".to_string(),
        other => other.to_string(),
    };
    let mut response = text_response(error.status(), &message);
    response.headers_mut().insert(
        ERROR_KIND_HEADER,
        HeaderValue::from_static(error.kind()),
    );
    response
}
