use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, Uri},
    routing::{get, post},
    Form, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Inner status the platform uses when a forward reaches only some targets.
pub const PARTIAL_FORWARD_FAILURE: i64 = 216;

#[derive(Clone, Debug)]
pub struct MockConfig {
    /// Address the service map points clients back to.
    pub public_url: String,
    /// Send server settings under the misspelled `setttings` key.
    pub misspelled_settings: bool,
}

impl MockConfig {
    pub fn new(public_url: impl Into<String>) -> Self {
        Self {
            public_url: public_url.into().trim_end_matches('/').to_string(),
            misspelled_settings: true,
        }
    }
}

pub struct MockState {
    config: MockConfig,
    uid: String,
    secret_key: String,
    blocked: RwLock<HashSet<String>>,
}

pub type Shared = Arc<MockState>;

#[derive(Deserialize)]
pub struct ParamsForm {
    pub params: String,
}

#[derive(Deserialize)]
pub struct FriendParams {
    pub fid: String,
    pub imei: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardParams {
    pub total_ids: usize,
    pub msg_info: String,
    #[serde(default)]
    pub to_ids: Option<Vec<DirectTarget>>,
    #[serde(default)]
    pub imei: Option<String>,
    #[serde(default)]
    pub grids: Option<Vec<GroupTarget>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectTarget {
    pub client_id: i64,
    pub to_uid: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupTarget {
    pub client_id: String,
    pub grid: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ForwardResult {
    pub client_id: String,
    pub msg_id: String,
}

pub fn app(config: MockConfig) -> Router {
    let state: Shared = Arc::new(MockState {
        config,
        uid: "1000000000000000001".to_string(),
        secret_key: STANDARD.encode(Uuid::new_v4().as_bytes()),
        blocked: RwLock::new(HashSet::new()),
    });
    Router::new()
        .route("/api/login/getLoginInfo", get(login_info))
        .route("/api/login/getServerInfo", get(server_info))
        .route("/api/friend/block", post(block_user))
        .route("/api/friend/unblock", post(unblock_user))
        .route("/api/message/mforward", post(forward))
        .route("/api/message/forward", post(forward))
        .route("/api/group/mforward", post(forward))
        .route("/api/group/forward", post(forward))
        .with_state(state)
}

pub async fn run(listener: TcpListener, config: MockConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app(config)).await
}

pub fn encrypt(key: &str, plaintext: &str) -> Option<String> {
    let key = STANDARD.decode(key).ok()?;
    let cipher = Aes128CbcEnc::new_from_slices(&key, &[0u8; 16]).ok()?;
    Some(STANDARD.encode(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes())))
}

pub fn decrypt(key: &str, ciphertext: &str) -> Option<String> {
    let key = STANDARD.decode(key).ok()?;
    let data = STANDARD.decode(ciphertext).ok()?;
    let cipher = Aes128CbcDec::new_from_slices(&key, &[0u8; 16]).ok()?;
    String::from_utf8(cipher.decrypt_padded_vec_mut::<Pkcs7>(&data).ok()?).ok()
}

fn outer_error(code: i64, message: &str) -> Json<Value> {
    Json(json!({"error_code": code, "error_message": message, "data": null}))
}

/// Wrap `inner` the way feature endpoints answer: encrypted under the
/// session key inside a successful outer envelope.
fn sealed(state: &MockState, inner: Value) -> Json<Value> {
    match encrypt(&state.secret_key, &inner.to_string()) {
        Some(data) => Json(json!({"error_code": 0, "error_message": "", "data": data})),
        None => outer_error(500, "encryption failed"),
    }
}

fn open<T: serde::de::DeserializeOwned>(state: &MockState, form: &ParamsForm) -> Option<T> {
    let plaintext = decrypt(&state.secret_key, &form.params)?;
    serde_json::from_str(&plaintext).ok()
}

async fn login_info(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Json<Value> {
    let has_cookie = headers
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| !v.trim().is_empty());
    let has_imei = query.get("imei").is_some_and(|v| !v.is_empty());
    if !has_cookie || !has_imei {
        return outer_error(1, "Missing credentials");
    }

    let base = &state.config.public_url;
    Json(json!({
        "error_code": 0,
        "error_message": "",
        "data": {
            "uid": state.uid,
            "zpw_enk": state.secret_key,
            "zpw_service_map_v3": {
                "friend": [base],
                "file": [base, "http://127.0.0.1:9"],
                "chat": [base]
            },
            "zpw_ws": [format!("{}/ws", base.replacen("http", "ws", 1))]
        }
    }))
}

async fn server_info(State(state): State<Shared>) -> Json<Value> {
    let settings = json!({"features": {"sharefile": {"max_size_share_file_v3": 1024}}});
    let field = if state.config.misspelled_settings {
        "setttings"
    } else {
        "settings"
    };
    Json(json!({
        "error_code": 0,
        "error_message": "",
        "data": {field: settings, "extra_ver": {"phonebook": 0}}
    }))
}

async fn block_user(State(state): State<Shared>, Form(form): Form<ParamsForm>) -> Json<Value> {
    let Some(params) = open::<FriendParams>(&state, &form) else {
        return outer_error(114, "Invalid params");
    };
    if params.imei.is_empty() {
        return sealed(&state, json!({"error_code": 114, "error_message": "Missing imei"}));
    }
    state.blocked.write().await.insert(params.fid);
    sealed(&state, json!({"error_code": 0, "error_message": "Successful.", "data": ""}))
}

async fn unblock_user(State(state): State<Shared>, Form(form): Form<ParamsForm>) -> Json<Value> {
    let Some(params) = open::<FriendParams>(&state, &form) else {
        return outer_error(114, "Invalid params");
    };
    if !state.blocked.write().await.remove(&params.fid) {
        return sealed(&state, json!({"error_code": 3, "error_message": "User is not blocked"}));
    }
    sealed(&state, json!({"error_code": 0, "error_message": "Successful.", "data": ""}))
}

async fn forward(State(state): State<Shared>, uri: Uri, Form(form): Form<ParamsForm>) -> Json<Value> {
    let Some(params) = open::<ForwardParams>(&state, &form) else {
        return outer_error(114, "Invalid params");
    };
    if serde_json::from_str::<Value>(&params.msg_info).is_err() {
        return sealed(&state, json!({"error_code": 114, "error_message": "Invalid msgInfo"}));
    }

    let targets: Vec<(String, String)> = if uri.path().starts_with("/api/message/") {
        match (params.to_ids, params.imei) {
            (Some(ids), Some(_)) => ids
                .into_iter()
                .map(|t| (t.client_id.to_string(), t.to_uid))
                .collect(),
            _ => return sealed(&state, json!({"error_code": 114, "error_message": "Missing toIds"})),
        }
    } else {
        match params.grids {
            Some(grids) => grids.into_iter().map(|t| (t.client_id, t.grid)).collect(),
            None => return sealed(&state, json!({"error_code": 114, "error_message": "Missing grids"})),
        }
    };
    if targets.len() != params.total_ids {
        return sealed(&state, json!({"error_code": 114, "error_message": "totalIds mismatch"}));
    }

    let blocked = state.blocked.read().await;
    let success: Vec<ForwardResult> = targets
        .iter()
        .filter(|(_, id)| !blocked.contains(id))
        .map(|(client_id, _)| ForwardResult {
            client_id: client_id.clone(),
            msg_id: Uuid::new_v4().simple().to_string(),
        })
        .collect();
    tracing::debug!(targets = targets.len(), delivered = success.len(), "forward");

    if success.len() < targets.len() {
        return sealed(
            &state,
            json!({
                "error_code": PARTIAL_FORWARD_FAILURE,
                "error_message": "Some targets could not be reached",
                "data": {"success": success}
            }),
        );
    }
    sealed(&state, json!({"error_code": 0, "error_message": "", "data": {"success": success}}))
}
