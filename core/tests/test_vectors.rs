//! Verify response classification against JSON test vectors in `test-vectors/`.
//!
//! Each case describes a simulated response and the outcome the transport
//! must report. Comparing parsed JSON (not raw strings) avoids false
//! negatives from field-ordering differences.

use backoffice_core::{classify, ApiError, HttpResponse};

fn response(case: &serde_json::Value) -> HttpResponse {
    let sim = &case["response"];
    let headers = match sim["content_type"].as_str() {
        Some(ct) => vec![("Content-Type".to_string(), ct.to_string())],
        None => Vec::new(),
    };
    HttpResponse {
        status: sim["status"].as_u64().unwrap() as u16,
        headers,
        body: sim["body"].as_str().unwrap().to_string(),
    }
}

#[test]
fn classify_test_vectors() {
    let raw = include_str!("../../test-vectors/classify.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let expected = &case["expected"];
        let result = classify(response(case));

        match expected["outcome"].as_str().unwrap() {
            "value" => {
                assert_eq!(result.unwrap(), Some(expected["value"].clone()), "{name}: value");
            }
            "null" => {
                assert_eq!(result.unwrap(), None, "{name}: expected null");
            }
            "error" => {
                let err = result.unwrap_err();
                let status = expected["status"].as_u64().unwrap() as u16;
                assert_eq!(err.status_code(), Some(status), "{name}: status");
                assert_eq!(err.message(), expected["message"].as_str().unwrap(), "{name}: message");
                assert_eq!(err.payload(), Some(&expected["payload"]), "{name}: payload");
            }
            "decode" => {
                let err = result.unwrap_err();
                assert!(matches!(err, ApiError::Decode(_)), "{name}: expected Decode");
            }
            other => panic!("{name}: unknown outcome: {other}"),
        }
    }
}
