//! Common test utilities for integration tests
//!
//! In-process axum mock servers for the roster endpoint and the ISAPI device
//! gateway. The device mock enforces HTTP Digest authentication, pages user
//! searches and keeps a per-`devIndex` user store so tests can assert on the
//! state a pass leaves behind.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use axum::{
    extract::{OriginalUri, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use roster_sync::config::{Secret, SyncConfig, TargetConfig};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use tokio::net::TcpListener;

static RUSTLS_INIT: Once = Once::new();

pub const DEVICE_USERNAME: &str = "admin";
pub const DEVICE_PASSWORD: &str = "Sup3rS3cret";
pub const ROSTER_TOKEN: &str = "Bearer roster-token";

const REALM: &str = "DS-K1T671";
const NONCE: &str = "4e6a4d354d7a41794e5463364f4451795a6a55335a54673d";
const OPAQUE: &str = "799d5";

/// Install the rustls crypto provider once per test binary
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock server");
    let addr = listener.local_addr().expect("Mock server has no address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Mock server failed");
    });
    format!("http://{addr}")
}

pub fn roster_record(id: &str, name: &str, enabled: bool) -> Value {
    json!({"employeeNo": id, "name": name, "pin": "", "valid": {"enable": enabled, "belongGroup": "staff"}})
}

pub fn device_record(id: &str, name: &str, enabled: bool) -> Value {
    json!({"employeeNo": id, "name": name, "userType": "normal", "Valid": {"enable": enabled}})
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RosterState {
    pub records: Mutex<Vec<Value>>,
    /// Answer 500 instead of the roster
    pub fail: AtomicBool,
    pub requests: AtomicUsize,
}

pub struct MockRoster {
    pub url: String,
    pub state: Arc<RosterState>,
}

impl MockRoster {
    pub async fn start(records: Vec<Value>) -> Self {
        let state = Arc::new(RosterState {
            records: Mutex::new(records),
            ..RosterState::default()
        });
        let app = Router::new()
            .route("/api/personal", get(roster_handler))
            .with_state(Arc::clone(&state));
        let base = serve(app).await;
        Self {
            url: format!("{base}/api/personal"),
            state,
        }
    }

    pub fn set_records(&self, records: Vec<Value>) {
        *self.state.records.lock().unwrap() = records;
    }
}

async fn roster_handler(State(state): State<Arc<RosterState>>, headers: HeaderMap) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);

    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == ROSTER_TOKEN);
    if !authorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({"correcto": false}))).into_response();
    }
    if state.fail.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "roster database offline").into_response();
    }

    let records = state.records.lock().unwrap().clone();
    Json(json!({"correcto": true, "contenido": records})).into_response()
}

// ---------------------------------------------------------------------------
// Device gateway
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct DeviceState {
    /// Users per `devIndex`, in enrollment order
    pub users: Mutex<HashMap<String, Vec<Value>>>,
    /// `employeeNo`s every write is refused for
    pub rejected_ids: Mutex<HashSet<String>>,
    /// `devIndex`es whose searches answer 500
    pub broken_indexes: Mutex<HashSet<String>>,
    /// 401 challenges sent
    pub challenges: AtomicUsize,
    /// Offer `Basic` in a separate header ahead of the Digest challenge
    pub basic_first: AtomicBool,
    /// `METHOD path devIndex employeeNo` for every authenticated write
    pub writes: Mutex<Vec<String>>,
    /// Search requests answered
    pub searches: AtomicUsize,
}

pub struct MockDevice {
    pub url: String,
    pub state: Arc<DeviceState>,
}

impl MockDevice {
    pub async fn start() -> Self {
        let state = Arc::new(DeviceState::default());
        let app = Router::new()
            .route("/ISAPI/AccessControl/UserInfo/Search", post(search_handler))
            .route("/ISAPI/AccessControl/UserInfo/Record", post(record_handler))
            .route("/ISAPI/AccessControl/UserInfo/Modify", put(modify_handler))
            .route("/ISAPI/AccessControl/UserInfoDetail/Delete", put(delete_handler))
            .with_state(Arc::clone(&state));
        let url = serve(app).await;
        Self { url, state }
    }

    pub fn seed(&self, dev_index: &str, users: Vec<Value>) {
        self.state
            .users
            .lock()
            .unwrap()
            .insert(dev_index.to_string(), users);
    }

    pub fn users(&self, dev_index: &str) -> Vec<Value> {
        self.state
            .users
            .lock()
            .unwrap()
            .get(dev_index)
            .cloned()
            .unwrap_or_default()
    }

    /// `(employeeNo, name, enabled)` per enrolled user
    pub fn summary(&self, dev_index: &str) -> Vec<(String, String, bool)> {
        self.users(dev_index)
            .iter()
            .map(|u| {
                (
                    u["employeeNo"].as_str().unwrap_or_default().to_string(),
                    u["name"].as_str().unwrap_or_default().to_string(),
                    u["Valid"]["enable"].as_bool().unwrap_or_default(),
                )
            })
            .collect()
    }

    pub fn reject(&self, employee_no: &str) {
        self.state
            .rejected_ids
            .lock()
            .unwrap()
            .insert(employee_no.to_string());
    }

    pub fn break_index(&self, dev_index: &str) {
        self.state
            .broken_indexes
            .lock()
            .unwrap()
            .insert(dev_index.to_string());
    }

    pub fn writes(&self) -> Vec<String> {
        self.state.writes.lock().unwrap().clone()
    }

    pub fn offer_basic_first(&self) {
        self.state.basic_first.store(true, Ordering::SeqCst);
    }

    pub fn challenges(&self) -> usize {
        self.state.challenges.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Deserialize)]
struct DeviceQuery {
    format: String,
    #[serde(rename = "devIndex")]
    dev_index: String,
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

fn digest_params(header: &str) -> Option<HashMap<String, String>> {
    let rest = header.strip_prefix("Digest ")?;
    let mut params = HashMap::new();
    for part in rest.split(", ") {
        let (key, value) = part.split_once('=')?;
        params.insert(key.trim().to_string(), value.trim_matches('"').to_string());
    }
    Some(params)
}

/// Check the Digest response against the known credentials
fn digest_ok(headers: &HeaderMap, method: &Method, uri: &str) -> bool {
    let Some(params) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(digest_params)
    else {
        return false;
    };
    let get = |key: &str| params.get(key).map(String::as_str).unwrap_or_default();

    if get("username") != DEVICE_USERNAME || get("nonce") != NONCE || get("uri") != uri {
        return false;
    }
    if get("opaque") != OPAQUE {
        return false;
    }

    let ha1 = md5_hex(&format!("{DEVICE_USERNAME}:{REALM}:{DEVICE_PASSWORD}"));
    let ha2 = md5_hex(&format!("{}:{uri}", method.as_str()));
    let expected = md5_hex(&format!(
        "{ha1}:{NONCE}:{}:{}:auth:{ha2}",
        get("nc"),
        get("cnonce")
    ));
    get("qop") == "auth" && get("response") == expected
}

fn challenge(state: &DeviceState) -> Response {
    state.challenges.fetch_add(1, Ordering::SeqCst);
    let mut response = StatusCode::UNAUTHORIZED.into_response();
    let headers = response.headers_mut();
    if state.basic_first.load(Ordering::SeqCst) {
        headers.append(
            header::WWW_AUTHENTICATE,
            header::HeaderValue::from_static(r#"Basic realm="DS""#),
        );
    }
    let digest = format!(r#"Digest qop="auth", realm="{REALM}", nonce="{NONCE}", stale="FALSE", opaque="{OPAQUE}""#);
    if let Ok(value) = header::HeaderValue::from_str(&digest) {
        headers.append(header::WWW_AUTHENTICATE, value);
    }
    response
}

fn path_and_query(uri: &OriginalUri) -> String {
    uri.0
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_default()
}

fn status_ok() -> Response {
    Json(json!({"statusCode": 1, "statusString": "OK", "subStatusCode": "ok"})).into_response()
}

fn status_error(http: StatusCode, sub_status: &str) -> Response {
    (
        http,
        Json(json!({
            "statusCode": 6,
            "statusString": "Invalid Content",
            "subStatusCode": sub_status,
            "errorMsg": sub_status
        })),
    )
        .into_response()
}

async fn search_handler(
    State(state): State<Arc<DeviceState>>,
    method: Method,
    uri: OriginalUri,
    Query(query): Query<DeviceQuery>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !digest_ok(&headers, &method, &path_and_query(&uri)) {
        return challenge(&state);
    }
    assert_eq!(query.format, "json");
    state.searches.fetch_add(1, Ordering::SeqCst);

    if state.broken_indexes.lock().unwrap().contains(&query.dev_index) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "device offline").into_response();
    }

    let cond = &body["UserInfoSearchCond"];
    let position = cond["searchResultPosition"].as_u64().unwrap_or(0) as usize;
    let max_results = cond["maxResults"].as_u64().unwrap_or(30) as usize;

    let users = state
        .users
        .lock()
        .unwrap()
        .get(&query.dev_index)
        .cloned()
        .unwrap_or_default();
    let total = users.len();
    let page: Vec<Value> = users.into_iter().skip(position).take(max_results).collect();
    let status = if total == 0 {
        "NO MATCH"
    } else if position + page.len() < total {
        "MORE"
    } else {
        "OK"
    };

    let mut search = json!({
        "searchID": cond["searchID"],
        "responseStatusStrg": status,
        "numOfMatches": page.len(),
        "totalMatches": total,
    });
    if !page.is_empty() {
        search["UserInfo"] = Value::Array(page);
    }
    Json(json!({"UserInfoSearch": search})).into_response()
}

fn record_write(state: &DeviceState, method: &Method, uri: &OriginalUri, dev_index: &str, id: &str) {
    state
        .writes
        .lock()
        .unwrap()
        .push(format!("{method} {} {dev_index} {id}", uri.0.path()));
}

async fn record_handler(
    State(state): State<Arc<DeviceState>>,
    method: Method,
    uri: OriginalUri,
    Query(query): Query<DeviceQuery>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !digest_ok(&headers, &method, &path_and_query(&uri)) {
        return challenge(&state);
    }

    let Some(items) = body["UserInfo"].as_array() else {
        return status_error(StatusCode::BAD_REQUEST, "badJsonContent");
    };
    for item in items {
        let id = item["employeeNo"].as_str().unwrap_or_default().to_string();
        record_write(&state, &method, &uri, &query.dev_index, &id);

        if state.rejected_ids.lock().unwrap().contains(&id) {
            return status_error(StatusCode::BAD_REQUEST, "deviceUserAlreadyExistFace");
        }
        let mut users = state.users.lock().unwrap();
        let store = users.entry(query.dev_index.clone()).or_default();
        if store.iter().any(|u| u["employeeNo"] == id.as_str()) {
            return status_error(StatusCode::BAD_REQUEST, "employeeNoAlreadyExist");
        }
        store.push(item.clone());
    }
    status_ok()
}

async fn modify_handler(
    State(state): State<Arc<DeviceState>>,
    method: Method,
    uri: OriginalUri,
    Query(query): Query<DeviceQuery>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !digest_ok(&headers, &method, &path_and_query(&uri)) {
        return challenge(&state);
    }

    let info = &body["UserInfo"];
    let id = info["employeeNo"].as_str().unwrap_or_default().to_string();
    record_write(&state, &method, &uri, &query.dev_index, &id);

    if state.rejected_ids.lock().unwrap().contains(&id) {
        return status_error(StatusCode::BAD_REQUEST, "badParameters");
    }
    let mut users = state.users.lock().unwrap();
    let Some(user) = users
        .get_mut(&query.dev_index)
        .and_then(|store| store.iter_mut().find(|u| u["employeeNo"] == id.as_str()))
    else {
        return status_error(StatusCode::BAD_REQUEST, "employeeNoNotExist");
    };
    user["name"] = info["name"].clone();
    user["Valid"]["enable"] = info["Valid"]["enable"].clone();
    status_ok()
}

async fn delete_handler(
    State(state): State<Arc<DeviceState>>,
    method: Method,
    uri: OriginalUri,
    Query(query): Query<DeviceQuery>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !digest_ok(&headers, &method, &path_and_query(&uri)) {
        return challenge(&state);
    }

    let detail = &body["UserInfoDetail"];
    if detail["mode"] != "byEmployeeNo" {
        return status_error(StatusCode::BAD_REQUEST, "badParameters");
    }
    let ids: Vec<String> = detail["EmployeeNoList"]
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|e| e["employeeNo"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    for id in &ids {
        record_write(&state, &method, &uri, &query.dev_index, id);
        if state.rejected_ids.lock().unwrap().contains(id) {
            return status_error(StatusCode::BAD_REQUEST, "badParameters");
        }
    }
    let mut users = state.users.lock().unwrap();
    if let Some(store) = users.get_mut(&query.dev_index) {
        store.retain(|u| !ids.iter().any(|id| u["employeeNo"] == id.as_str()));
    }
    status_ok()
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Config pointing at the two mocks with one target per `dev_index`
pub fn sync_config(roster: &MockRoster, device: &MockDevice, dev_indexes: &[&str]) -> SyncConfig {
    let mut config = SyncConfig::default();
    config.roster.url = Some(roster.url.clone());
    config.roster.authorization = Some(Secret::new(ROSTER_TOKEN));
    config.device.host = Some(device.url.clone());
    config.device.username = DEVICE_USERNAME.to_string();
    config.device.password = Secret::new(DEVICE_PASSWORD);
    config.device.page_size = 2;
    config.device.targets = dev_indexes
        .iter()
        .map(|dev_index| TargetConfig {
            dev_index: (*dev_index).to_string(),
            ..TargetConfig::default()
        })
        .collect();
    config.sync.request_timeout_secs = 5;
    config
}
