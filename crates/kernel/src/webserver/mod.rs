//! HTTP endpoints of the controller.
//!
//! The probe server answers liveness and readiness checks. The metrics
//! server exposes the controller's Prometheus registry.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http::header::CONTENT_TYPE;
use http::status::StatusCode;
use http::Response;
use tracing::{debug, error, info, instrument};
use warp::hyper::Body;
use warp::Filter;

use crate::metrics::Metrics;
use crate::store::ResourceStore;

const OK: &str = "ok";
const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

/// Serve `/healthz` and `/readyz` on `addr` until the process exits.
///
/// Both answer `ok` as soon as the server is up.
pub async fn serve_probes(addr: SocketAddr) -> anyhow::Result<()> {
    info!(%addr, "Serving health probes.");
    warp::serve(probe_routes()).run(addr).await;
    Ok(())
}

/// Serve `/metrics` on `addr` until the process exits.
pub async fn serve_metrics<S: ResourceStore>(
    addr: SocketAddr,
    metrics: Arc<Metrics>,
    store: Arc<S>,
) -> anyhow::Result<()> {
    info!(%addr, "Serving metrics.");
    warp::serve(metrics_routes(metrics, store)).run(addr).await;
    Ok(())
}

fn probe_routes() -> impl Filter<Extract = (&'static str,), Error = warp::Rejection> + Clone {
    let health = warp::get().and(warp::path("healthz")).map(|| OK);
    let ready = warp::get().and(warp::path("readyz")).map(|| OK);
    health.or(ready).unify()
}

fn metrics_routes<S: ResourceStore>(
    metrics: Arc<Metrics>,
    store: Arc<S>,
) -> impl Filter<Extract = (Response<Body>,), Error = warp::Rejection> + Clone {
    warp::get()
        .and(warp::path("metrics"))
        .and(warp::path::end())
        .and_then(move || get_metrics(metrics.clone(), store.clone()))
}

/// Scrape the running kernels and encode every metric.
///
/// A failed scrape still serves the counters, with the running gauge as of
/// the last successful scrape.
#[instrument(level = "debug", skip(metrics, store))]
async fn get_metrics<S: ResourceStore>(
    metrics: Arc<Metrics>,
    store: Arc<S>,
) -> Result<Response<Body>, Infallible> {
    debug!("Got metrics request");
    let _ = metrics.scrape(store.as_ref()).await;
    match metrics.encode() {
        Ok(text) => {
            let mut response = Response::new(Body::from(text));
            if let Ok(value) = TEXT_FORMAT.parse() {
                response.headers_mut().insert(CONTENT_TYPE, value);
            }
            Ok(response)
        }
        Err(e) => {
            error!(error = %e, "Error encoding metrics");
            Ok(return_with_code(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Server error: {}", e),
            ))
        }
    }
}

fn return_with_code(code: StatusCode, body: String) -> Response<Body> {
    let mut response = Response::new(body.into());
    *response.status_mut() = code;
    response
}
