use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, decrypt, encrypt, ForwardResult, MockConfig, PARTIAL_FORWARD_FAILURE};
use serde_json::{json, Value};
use tower::ServiceExt;

const PUBLIC_URL: &str = "http://mock.test";

async fn body_json(response: axum::response::Response) -> Value {
    let bytes: bytes::Bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<String> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(http::header::COOKIE, cookie);
    }
    builder.body(String::new()).unwrap()
}

/// Percent-encode the characters base64 output can contain.
fn form_value(value: &str) -> String {
    value.replace('+', "%2B").replace('/', "%2F").replace('=', "%3D")
}

fn encrypted_post(uri: &str, key: &str, params: Value) -> Request<String> {
    let ciphertext = encrypt(key, &params.to_string()).unwrap();
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(format!("params={}", form_value(&ciphertext)))
        .unwrap()
}

/// Decrypt the inner envelope of a feature endpoint reply.
fn open(key: &str, outer: &Value) -> Value {
    assert_eq!(outer["error_code"], 0, "outer envelope: {outer}");
    let plaintext = decrypt(key, outer["data"].as_str().unwrap()).unwrap();
    serde_json::from_str(&plaintext).unwrap()
}

async fn login_key(app: &axum::Router) -> String {
    let resp = app
        .clone()
        .oneshot(get("/api/login/getLoginInfo?imei=i-1&type=30", Some("zpw_sek=x")))
        .await
        .unwrap();
    let body = body_json(resp).await;
    body["data"]["zpw_enk"].as_str().unwrap().to_string()
}

// --- login ---

#[tokio::test]
async fn login_info_issues_key_and_service_map() {
    let app = app(MockConfig::new(PUBLIC_URL));
    let resp = app
        .oneshot(get("/api/login/getLoginInfo?imei=i-1", Some("zpw_sek=x")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["error_code"], 0);
    assert!(body["data"]["uid"].is_string());
    assert_eq!(body["data"]["zpw_service_map_v3"]["friend"][0], PUBLIC_URL);
    assert_eq!(body["data"]["zpw_ws"][0], "ws://mock.test/ws");
    assert!(encrypt(body["data"]["zpw_enk"].as_str().unwrap(), "probe").is_some());
}

#[tokio::test]
async fn login_info_without_cookie_is_rejected() {
    let app = app(MockConfig::new(PUBLIC_URL));
    let resp = app.oneshot(get("/api/login/getLoginInfo?imei=i-1", None)).await.unwrap();

    let body = body_json(resp).await;
    assert_eq!(body["error_code"], 1);
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn login_info_without_imei_is_rejected() {
    let app = app(MockConfig::new(PUBLIC_URL));
    let resp = app.oneshot(get("/api/login/getLoginInfo", Some("a=b"))).await.unwrap();
    assert_eq!(body_json(resp).await["error_code"], 1);
}

// --- server info ---

#[tokio::test]
async fn server_info_uses_misspelled_field_by_default() {
    let app = app(MockConfig::new(PUBLIC_URL));
    let resp = app.oneshot(get("/api/login/getServerInfo", Some("a=b"))).await.unwrap();

    let body = body_json(resp).await;
    assert!(body["data"]["setttings"].is_object());
    assert!(body["data"].get("settings").is_none());
    assert!(body["data"]["extra_ver"].is_object());
}

#[tokio::test]
async fn server_info_can_use_correct_field() {
    let mut config = MockConfig::new(PUBLIC_URL);
    config.misspelled_settings = false;
    let resp = app(config)
        .oneshot(get("/api/login/getServerInfo", Some("a=b")))
        .await
        .unwrap();

    let body = body_json(resp).await;
    assert!(body["data"]["settings"].is_object());
    assert!(body["data"].get("setttings").is_none());
}

// --- feature endpoints ---

#[tokio::test]
async fn block_with_wrong_key_is_invalid_params() {
    let app = app(MockConfig::new(PUBLIC_URL));
    let resp = app
        .oneshot(encrypted_post(
            "/api/friend/block",
            "AAECAwQFBgcICQoLDA0ODw==",
            json!({"fid": "u1", "imei": "i-1"}),
        ))
        .await
        .unwrap();

    let body = body_json(resp).await;
    assert_eq!(body["error_code"], 114);
}

#[tokio::test]
async fn unblock_of_unknown_user_fails_inside_envelope() {
    let app = app(MockConfig::new(PUBLIC_URL));
    let key = login_key(&app).await;
    let resp = app
        .oneshot(encrypted_post("/api/friend/unblock", &key, json!({"fid": "u1", "imei": "i-1"})))
        .await
        .unwrap();

    let inner = open(&key, &body_json(resp).await);
    assert_eq!(inner["error_code"], 3);
}

#[tokio::test]
async fn forward_with_mismatched_total_is_rejected() {
    let app = app(MockConfig::new(PUBLIC_URL));
    let key = login_key(&app).await;
    let resp = app
        .oneshot(encrypted_post(
            "/api/group/mforward",
            &key,
            json!({"ttl": 0, "msgType": "1", "totalIds": 3, "msgInfo": "{}", "grids": []}),
        ))
        .await
        .unwrap();

    let inner = open(&key, &body_json(resp).await);
    assert_eq!(inner["error_code"], 114);
}

// --- full block / forward lifecycle ---

#[tokio::test]
async fn block_forward_lifecycle() {
    use tower::Service;

    let router = app(MockConfig::new(PUBLIC_URL));
    let key = login_key(&router).await;
    let mut app = router.into_service();

    let forward_params = json!({
        "ttl": 0,
        "msgType": "1",
        "totalIds": 2,
        "msgInfo": r#"{"message":"hello"}"#,
        "toIds": [
            {"clientId": 11, "toUid": "u1", "ttl": 0},
            {"clientId": 12, "toUid": "u2", "ttl": 0}
        ],
        "imei": "i-1"
    });

    // block u2
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(encrypted_post("/api/friend/block", &key, json!({"fid": "u2", "imei": "i-1"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(open(&key, &body_json(resp).await)["error_code"], 0);

    // forward, u2 is blocked so delivery is partial
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(encrypted_post("/api/message/mforward", &key, forward_params.clone()))
        .await
        .unwrap();
    let inner = open(&key, &body_json(resp).await);
    assert_eq!(inner["error_code"], PARTIAL_FORWARD_FAILURE);
    let success: Vec<ForwardResult> = serde_json::from_value(inner["data"]["success"].clone()).unwrap();
    assert_eq!(success.len(), 1);
    assert_eq!(success[0].client_id, "11");

    // unblock u2
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(encrypted_post("/api/friend/unblock", &key, json!({"fid": "u2", "imei": "i-1"})))
        .await
        .unwrap();
    assert_eq!(open(&key, &body_json(resp).await)["error_code"], 0);

    // forward again, everyone reached
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(encrypted_post("/api/message/mforward", &key, forward_params))
        .await
        .unwrap();
    let inner = open(&key, &body_json(resp).await);
    assert_eq!(inner["error_code"], 0);
    assert_eq!(inner["data"]["success"].as_array().unwrap().len(), 2);
}
