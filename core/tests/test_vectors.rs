//! Verify URL building and reply classification against JSON test vectors
//! stored in `test-vectors/`.
//!
//! Each vector file describes inputs and the expected outcome. Replies are
//! compared as parsed JSON, so field order in the fixtures does not matter.

use serde_json::Value;
use zpw_core::resolver::{self, Reply};
use zpw_core::{build_url, crypto, Error, HttpResponse, QueryValue};

fn query_value(v: &Value) -> QueryValue {
    match v {
        Value::String(s) => QueryValue::from(s.as_str()),
        Value::Bool(b) => QueryValue::from(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => QueryValue::Int(i),
            None => QueryValue::Float(n.as_f64().unwrap()),
        },
        other => panic!("unsupported query value: {other}"),
    }
}

// ---------------------------------------------------------------------------
// URLs
// ---------------------------------------------------------------------------

#[test]
fn url_test_vectors() {
    let raw = include_str!("../../test-vectors/urls.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let params: Vec<(&str, QueryValue)> = case["params"]
            .as_array()
            .unwrap()
            .iter()
            .map(|pair| (pair[0].as_str().unwrap(), query_value(&pair[1])))
            .collect();

        let url = build_url(case["base"].as_str().unwrap(), &params).unwrap();
        assert_eq!(url, case["expected"].as_str().unwrap(), "{name}");
    }
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

#[test]
fn reply_test_vectors() {
    let raw = include_str!("../../test-vectors/replies.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();
    let key = vectors["key"].as_str().unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();

        // Encrypted cases wrap the inner envelope the way the platform does.
        let body = match case.get("encrypt_inner") {
            Some(inner) => {
                let ciphertext = crypto::encrypt(key, &inner.to_string()).unwrap();
                serde_json::json!({"error_code": 0, "error_message": "", "data": ciphertext})
            }
            None => case["body"].clone(),
        };
        let response = HttpResponse {
            status: case["status"].as_u64().unwrap() as u16,
            headers: Vec::new(),
            body: body.to_string(),
        };
        let accepted: Vec<i64> = case["accepted"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c.as_i64().unwrap())
            .collect();

        let result = resolver::decode(response, Some(key))
            .and_then(|reply| resolver::resolve_accepting(reply, &accepted, resolver::payload::<Value>));

        let expected = &case["expected"];
        if let Some(data) = expected.get("ok") {
            assert_eq!(&result.unwrap(), data, "{name}");
            continue;
        }

        let err = expected["err"].clone();
        match result {
            Err(Error::Api { code, message }) => {
                assert_eq!(code, err["code"].as_i64(), "{name}: code");
                assert_eq!(message, err["message"].as_str().unwrap(), "{name}: message");
            }
            other => panic!("{name}: expected api error, got {other:?}"),
        }
    }
}

#[test]
fn reply_without_envelope_fields_is_plain_data() {
    let reply: Reply = serde_json::from_str(r#"{"data":[1,2,3]}"#).unwrap();
    assert!(reply.is_success());
    let data: Vec<u8> = resolver::resolve(reply).unwrap();
    assert_eq!(data, vec![1, 2, 3]);
}
