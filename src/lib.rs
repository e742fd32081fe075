//! # tsu-prometheus
//!
//! Prometheus instrumentation for HTTP services built on a minimal
//! hyper + matchit router.
//!
//! Every request that passes through the middleware is counted, timed, and
//! sized, and the number of requests in flight is tracked. A scrape endpoint
//! serves the results in the Prometheus text format.
//!
//! What the middleware records:
//!
//! - **`requests_total`**: counter by status code, method, and path
//! - **`request_duration_seconds`**: histogram by the same labels
//! - **`request_size_bytes`** / **`response_size_bytes`**: summaries
//! - **`concurrent_requests`**: gauge, exact even when handlers panic
//!
//! What it leaves to others: route matching ([`matchit`]), aggregation and
//! exposition ([`prometheus`]), TLS and body limits (your reverse proxy).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tsu_prometheus::middleware::prometheus::Prometheus;
//! use tsu_prometheus::{Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .get("/users/{id}", get_user)
//!         .post("/users",     create_user);
//!
//!     // Registers the instruments and mounts GET /metrics.
//!     let handler = Prometheus::new().wrap_handler(app);
//!
//!     Server::bind("0.0.0.0:3000").serve(handler).await.unwrap();
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#).into_bytes())
//! }
//!
//! async fn create_user(_req: Request) -> Response {
//!     Response::builder()
//!         .status(http::StatusCode::CREATED)
//!         .header("location", "/users/99")
//!         .json(br#"{"id":"99"}"#.to_vec())
//! }
//! ```
//!
//! The `endpoint` label is the raw request path. Routes with path
//! parameters produce one series per distinct path.

mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;

pub use error::Error;
pub use handler::{BoxFuture, Handler, Service};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
