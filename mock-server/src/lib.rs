//! In-memory stand-in for a key-value store behind a reverse proxy.
//!
//! Mounted at `<prefix>/v0`. Every request must carry
//! `Authorization: Basic base64(token:)` when a token is configured.
//! Collection listings paginate with `limit`/`offset` and advertise the
//! neighbouring pages through origin-relative `Link` headers, the way the
//! upstream store does.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub const API_VERSION: &str = "v0";
pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 100;

/// collection → key → value
pub type Db = Arc<RwLock<BTreeMap<String, BTreeMap<String, Value>>>>;

#[derive(Clone)]
struct AppState {
    db: Db,
    expected_auth: Option<Arc<str>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemList {
    pub count: usize,
    pub results: Vec<Item>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Router serving the store at `<prefix>/v0`. `prefix` is empty or starts
/// with `/`.
pub fn app(prefix: &str, token: Option<&str>) -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(BTreeMap::new())),
        expected_auth: token
            .filter(|t| !t.is_empty())
            .map(|t| Arc::from(format!("Basic {}", STANDARD.encode(format!("{t}:"))))),
    };
    let api = Router::new()
        .route("/{collection}", get(list_items))
        .route(
            "/{collection}/{key}",
            get(get_item).put(put_item).delete(delete_item),
        )
        .with_state(state);
    Router::new().nest(&format!("{prefix}/{API_VERSION}"), api)
}

pub async fn run(
    listener: TcpListener,
    prefix: &str,
    token: Option<&str>,
) -> Result<(), std::io::Error> {
    axum::serve(listener, app(prefix, token)).await
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let Some(expected) = state.expected_auth.as_deref() else {
        return Ok(());
    };
    let given = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if given == Some(expected) {
        Ok(())
    } else {
        tracing::debug!("rejecting request with missing or wrong credentials");
        Err(error(StatusCode::UNAUTHORIZED, "valid credentials required"))
    }
}

fn page_link(collection: &str, limit: usize, offset: usize, rel: &str) -> String {
    format!("</{API_VERSION}/{collection}?limit={limit}&offset={offset}>; rel=\"{rel}\"")
}

async fn list_items(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(params): Query<ListParams>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0);

    let db = state.db.read().await;
    let all = db.get(&collection);
    let total = all.map_or(0, BTreeMap::len);
    let results: Vec<Item> = all
        .into_iter()
        .flat_map(|items| items.iter())
        .skip(offset)
        .take(limit)
        .map(|(key, value)| Item {
            key: key.clone(),
            value: value.clone(),
        })
        .collect();

    let mut links = Vec::new();
    if offset + results.len() < total {
        links.push(page_link(&collection, limit, offset + limit, "next"));
    }
    if offset > 0 {
        links.push(page_link(&collection, limit, offset.saturating_sub(limit), "prev"));
    }

    let mut response = Json(ItemList {
        count: results.len(),
        results,
    })
    .into_response();
    if !links.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&links.join(", ")) {
            response.headers_mut().insert(header::LINK, value);
        }
    }
    response
}

async fn get_item(
    State(state): State<AppState>,
    Path((collection, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let db = state.db.read().await;
    match db.get(&collection).and_then(|items| items.get(&key)) {
        Some(value) => Json(value.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "item not found"),
    }
}

async fn put_item(
    State(state): State<AppState>,
    Path((collection, key)): Path<(String, String)>,
    headers: HeaderMap,
    Json(value): Json<Value>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    state
        .db
        .write()
        .await
        .entry(collection.clone())
        .or_default()
        .insert(key.clone(), value);

    let location = format!("/{API_VERSION}/{collection}/{key}");
    match HeaderValue::from_str(&location) {
        Ok(location) => (StatusCode::CREATED, [(header::LOCATION, location)]).into_response(),
        Err(_) => StatusCode::CREATED.into_response(),
    }
}

async fn delete_item(
    State(state): State<AppState>,
    Path((collection, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let mut db = state.db.write().await;
    match db.get_mut(&collection).and_then(|items| items.remove(&key)) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => error(StatusCode::NOT_FOUND, "item not found"),
    }
}
