//! # hashbox-http
//!
//! HTTP front door for the blob store and the execution harness.
//!
//! ## Routes
//!
//! | Method | Path              | Success                              |
//! |--------|-------------------|--------------------------------------|
//! | PUT    | `/blobs`          | `201` with `{"hash": "<sha256 hex>"}`|
//! | GET    | `/blobs/{hash}`   | `200` with the stored bytes          |
//! | POST   | `/execute/{hash}` | `200` with the module's output       |
//!
//! Unknown blobs and modules give `404`, an empty hash `400`, a known path
//! with the wrong method `405`. Store and execution failures give `500`; the
//! `x-hashbox-error` header carries the failure kind (`trap`,
//! `contract_violation`, ...).
//!
//! ## Example
//!
//! ```ignore
//! use hashbox_http::{serve, Backend, Router, ServerConfig};
//!
//! let backend = Backend::new(store, harness);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//! serve(listener, Arc::new(Router::new(backend)), ServerConfig::default(), shutdown).await?;
//! ```

pub mod backend;
pub mod error;
pub mod router;
pub mod server;

pub use backend::Backend;
pub use error::ServiceError;
pub use router::{default_routes, Endpoint, Resolution, Route, RoutePattern, Router};
pub use server::{serve, ServerConfig};
