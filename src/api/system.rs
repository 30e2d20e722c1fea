//! Built-in endpoints reading the runtime state.

use std::collections::BTreeMap;

use axum::{
    extract::State,
    response::Response,
    routing::{get, post},
};
use serde_json::{json, Value};

use crate::api::{ApiRoutes, ApiState};
use crate::http::response::ok_response;
use crate::workers::releases::RELEASES_KEY;

pub fn handle(routes: ApiRoutes) -> ApiRoutes {
    routes
        .public("/terraform/v1/mgmt/versions", get(versions))
        .public("/terraform/v1/mgmt/releases", get(releases))
        .protected("/terraform/v1/mgmt/status", post(status))
}

async fn versions() -> Response {
    ok_response(json!({ "version": env!("CARGO_PKG_VERSION") }))
}

/// Latest release metadata, or "unknown" before the first check lands.
async fn releases(State(state): State<ApiState>) -> Response {
    let releases = state
        .runtime
        .snapshot(RELEASES_KEY)
        .unwrap_or_else(|| Value::String("unknown".to_string()));
    ok_response(json!({ "releases": releases }))
}

async fn status(State(state): State<ApiState>) -> Response {
    let market: BTreeMap<_, _> = state.runtime.market().into_iter().collect();
    ok_response(json!({
        "workers": state.runtime.workers(),
        "market": market,
    }))
}
