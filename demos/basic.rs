//! Minimal instrumented service: JSON endpoints plus a scrape endpoint.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/users -d '{"name":"alice"}'
//!   curl http://localhost:3000/metrics

use std::time::Duration;

use http::StatusCode;
use tsu_prometheus::middleware::prometheus::Prometheus;
use tsu_prometheus::{Request, Response, Router, Server};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let app = Router::new()
        .get("/users/{id}", get_user)
        .post("/users",     create_user)
        .get("/slow",       slow);

    let handler = Prometheus::builder()
        .subsystem("demo")
        .build()
        .wrap_handler(app);

    Server::bind("0.0.0.0:3000")
        .serve(handler)
        .await
        .expect("server error");
}

// GET /users/{id}
async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#).into_bytes())
}

// POST /users
async fn create_user(req: Request) -> Response {
    if req.body().is_empty() {
        return Response::status(StatusCode::BAD_REQUEST);
    }

    Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/users/99")
        .json(br#"{"id":"99","name":"new_user"}"#.to_vec())
}

// GET /slow, which shows up in the upper duration buckets
async fn slow(_req: Request) -> &'static str {
    tokio::time::sleep(Duration::from_millis(300)).await;
    "done"
}
