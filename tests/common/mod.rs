// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! An HTTP front end for `FakeEngine`, speaking enough of the engine's REST and SSO protocol to
//! exercise `engine::Connection` end to end.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use {
    axum::{
        extract::{Path, Query, State},
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Response},
        routing::{get, post},
        Form, Json, Router,
    },
    serde::Deserialize,
    serde_json::json,
};

use affinity_lib::{
    engine::{ApiError, ApiResult, ManagementApi},
    test_env::FakeEngine,
};

pub const USERNAME: &str = "admin@internal";
pub const PASSWORD: &str = "secret";
pub const TOKEN: &str = "fake-access-token";

/// Everything the server saw, beyond what `FakeEngine` records itself.
#[derive(Debug, Default)]
pub struct Traffic {
    pub token_requests: Vec<HashMap<String, String>>,
    pub revoked_tokens: Vec<String>,
    /// Requests rejected because of a missing or wrong bearer token or API version.
    pub unauthorized: usize,
}

#[derive(Clone)]
struct ServerState {
    engine: FakeEngine,
    traffic: Arc<Mutex<Traffic>>,
}

/// Serve `engine` on an ephemeral local port from a background thread.
///
/// Returns the API URL to connect to, and a handle to the recorded traffic.
pub fn serve(engine: FakeEngine) -> (String, Arc<Mutex<Traffic>>) {
    let traffic = Arc::new(Mutex::new(Traffic::default()));
    let state = ServerState {
        engine,
        traffic: Arc::clone(&traffic),
    };

    // Bind before spawning so that the port is accepting connections as soon as this returns.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, router(state)).await.unwrap();
        });
    });

    (format!("http://{addr}/ovirt-engine/api"), traffic)
}

fn router(state: ServerState) -> Router {
    Router::new()
        .route("/ovirt-engine/sso/oauth/token", post(token))
        .route("/ovirt-engine/sso/oauth/revoke", post(revoke))
        .route("/ovirt-engine/api/clusters", get(list_clusters))
        .route(
            "/ovirt-engine/api/clusters/{cluster_id}/affinitygroups",
            get(list_affinity_groups),
        )
        .route(
            "/ovirt-engine/api/clusters/{cluster_id}/affinitygroups/{group_id}/vms",
            post(add_affinity_group_vm),
        )
        .route("/ovirt-engine/api/vms", get(list_vms))
        .with_state(state)
}

async fn token(
    State(state): State<ServerState>,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    let ok = params.get("grant_type").map(String::as_str) == Some("password")
        && params.get("username").map(String::as_str) == Some(USERNAME)
        && params.get("password").map(String::as_str) == Some(PASSWORD);
    state.traffic.lock().unwrap().token_requests.push(params);

    if ok {
        Json(json!({ "access_token": TOKEN, "token_type": "bearer" })).into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "access_denied",
                "error_description": "Cannot authenticate user 'admin@internal'.",
            })),
        )
            .into_response()
    }
}

async fn revoke(
    State(state): State<ServerState>,
    Form(params): Form<HashMap<String, String>>,
) -> StatusCode {
    let Some(token) = params.get("token") else {
        return StatusCode::BAD_REQUEST;
    };
    state
        .traffic
        .lock()
        .unwrap()
        .revoked_tokens
        .push(token.clone());
    let mut engine = state.engine.clone();
    let _ = engine.close();
    StatusCode::OK
}

#[derive(Deserialize)]
struct Search {
    search: String,
}

#[derive(Deserialize)]
struct VmRef {
    id: String,
}

async fn list_clusters(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Query(query): Query<Search>,
) -> Response {
    reply(&state, &headers, |engine| {
        let clusters = engine.list_clusters(&query.search)?;
        Ok(json!({ "cluster": clusters }))
    })
}

async fn list_affinity_groups(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path(cluster_id): Path<String>,
) -> Response {
    reply(&state, &headers, |engine| {
        let groups = engine.list_affinity_groups(&cluster_id)?;
        if groups.is_empty() {
            // The engine leaves empty collections out entirely.
            return Ok(json!({}));
        }
        Ok(json!({ "affinity_group": groups }))
    })
}

async fn list_vms(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Query(query): Query<Search>,
) -> Response {
    reply(&state, &headers, |engine| {
        let vms = engine.list_vms(&query.search)?;
        if vms.is_empty() {
            return Ok(json!({}));
        }
        Ok(json!({ "vm": vms }))
    })
}

async fn add_affinity_group_vm(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path((cluster_id, group_id)): Path<(String, String)>,
    Json(vm): Json<VmRef>,
) -> Response {
    reply(&state, &headers, |engine| {
        engine.add_affinity_group_vm(&cluster_id, &group_id, &vm.id)?;
        Ok(json!({ "id": vm.id }))
    })
}

/// Check the request headers, run `op` against the engine, and turn its result into a response
/// shaped like the engine's.
fn reply<F>(state: &ServerState, headers: &HeaderMap, op: F) -> Response
where
    F: FnOnce(&FakeEngine) -> ApiResult<serde_json::Value>,
{
    let bearer = format!("Bearer {TOKEN}");
    let authorized = headers.get("authorization").and_then(|v| v.to_str().ok())
        == Some(bearer.as_str())
        && headers.get("version").and_then(|v| v.to_str().ok()) == Some("4");
    if !authorized {
        state.traffic.lock().unwrap().unauthorized += 1;
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "reason": "Unauthorized", "detail": "missing or invalid token" })),
        )
            .into_response();
    }

    match op(&state.engine) {
        Ok(body) => Json(body).into_response(),
        Err(ApiError::Fault {
            status,
            reason,
            detail,
        }) => (
            StatusCode::from_u16(status).unwrap(),
            Json(json!({ "reason": reason, "detail": detail })),
        )
            .into_response(),
        Err(other) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "reason": other.to_string() })),
        )
            .into_response(),
    }
}
