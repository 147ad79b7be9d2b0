//! End-to-end pipeline scenarios against a mock origin.

use serde_json::{json, Value};
use weft::config::{CacheBackendKind, CacheSettings, Settings};
use weft::serialize::{Encoding, Payload};
use weft::Executor;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn enabled_lru_cache() -> CacheSettings {
    CacheSettings {
        enabled: true,
        backend: CacheBackendKind::Lru,
        ..CacheSettings::default()
    }
}

/// Settings with both caches on LRU and JSON encodings everywhere.
fn cached_settings() -> Settings {
    Settings {
        response_cache: enabled_lru_cache(),
        origin_cache: enabled_lru_cache(),
        response_encoding: Encoding::Json,
        origin_encoding: Encoding::Json,
        ..Settings::default()
    }
}

/// The S1 spec: one GET call, one root dataset, one `map_field` export.
fn persons_spec(server_url: &str) -> String {
    json!({
        "apiVersion": "connector/v1",
        "kind": "connector/v1",
        "metadata": {"name": "persons", "description": "demo"},
        "spec": {
            "timeout": 30,
            "apiCalls": {
                "GetPersons": {
                    "type": "url",
                    "endpoint": "/persons",
                    "method": "get",
                    "arguments": []
                }
            },
            "output": {
                "runtimeType": "python",
                "data": {"Person": {"api": "GetPersons", "metadata": [], "path": "."}},
                "exports": {
                    "Person": {
                        "dataframe": ".",
                        "fields": {
                            "person_ID": [{
                                "function": "map_field",
                                "description": "map fields or change names from source to target.",
                                "params": {"source": "person_id", "target": "person_ID"}
                            }]
                        }
                    }
                }
            }
        },
        "servers": [{"url": server_url}],
        "auth": "apiToken",
        "apiKey": "DUMMY_KEY"
    })
    .to_string()
}

fn decode(payload: &Payload) -> Value {
    match payload {
        Payload::Bytes(bytes) => serde_json::from_slice(bytes).unwrap(),
        Payload::Inline(value) => value.clone(),
    }
}

#[tokio::test]
async fn fetch_transform_and_cache_populate() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/persons"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"person_id": 1}, {"person_id": 2}])),
        )
        .expect(1)
        .mount(&origin)
        .await;

    let executor = Executor::new(cached_settings()).await.unwrap();
    let response = executor.get_endpoint_data(&persons_spec(&origin.uri())).await;

    assert!(response.is_ok(), "unexpected failure: {:?}", response.message);
    assert_eq!(
        decode(response.data.as_ref().unwrap()),
        json!({"Person": [{"person_ID": 1}, {"person_ID": 2}]})
    );

    let stats = executor.stats();
    assert_eq!(stats.app.requests_received, 1);
    assert_eq!(stats.app.requests_served, 1);
    assert_eq!(stats.app.requests_failed, 0);
    assert_eq!(stats.origin_cache.as_ref().unwrap().set_ops, 1);
    assert_eq!(stats.response_cache.as_ref().unwrap().set_ops, 1);
}

#[tokio::test]
async fn repeat_request_hits_the_response_cache() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/persons"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"person_id": 1}])),
        )
        .expect(1) // the second call must not reach the origin
        .mount(&origin)
        .await;

    let executor = Executor::new(cached_settings()).await.unwrap();
    let spec = persons_spec(&origin.uri());

    let first = executor.get_endpoint_data(&spec).await;
    let second = executor.get_endpoint_data(&spec).await;

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(first.data, second.data);

    let stats = executor.stats();
    assert_eq!(stats.response_cache.as_ref().unwrap().hits, 1);
    assert_eq!(stats.app.requests_served, 2);
}

#[tokio::test]
async fn revalidation_reuses_cached_body_on_304() {
    let origin = MockServer::start().await;
    // First call: full body with a validator
    Mock::given(method("GET"))
        .and(path("/persons"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"person_id": 7}]))
                .insert_header("etag", "\"v1\""),
        )
        .up_to_n_times(1)
        .mount(&origin)
        .await;
    // Second call: the conditional request is answered 304
    Mock::given(method("GET"))
        .and(path("/persons"))
        .and(header("if-none-match", "\"v1\""))
        .respond_with(ResponseTemplate::new(304).insert_header("etag", "\"v1\""))
        .expect(1)
        .mount(&origin)
        .await;

    // Origin cache only: every request exercises the revalidation path
    let settings = Settings {
        origin_cache: enabled_lru_cache(),
        origin_encoding: Encoding::Json,
        response_encoding: Encoding::Json,
        ..Settings::default()
    };
    let executor = Executor::new(settings).await.unwrap();
    let spec = persons_spec(&origin.uri());

    let first = executor.get_endpoint_data(&spec).await;
    assert!(first.is_ok(), "first call failed: {:?}", first.message);
    let set_ops_after_first = executor.stats().origin_cache.unwrap().set_ops;

    let second = executor.get_endpoint_data(&spec).await;
    assert!(second.is_ok(), "second call failed: {:?}", second.message);

    // Byte-for-byte reuse of the cached body, no new cache write
    assert_eq!(first.data, second.data);
    assert_eq!(
        executor.stats().origin_cache.unwrap().set_ops,
        set_ops_after_first
    );
}

#[tokio::test]
async fn cursor_pagination_follows_next_path_and_aggregates() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": [1], "next": "/p2"})),
        )
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/p2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": [2], "next": "/p3"})),
        )
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/p3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [3]})))
        .mount(&origin)
        .await;

    let spec = json!({
        "spec": {
            "apiCalls": {
                "GetItems": {
                    "type": "url",
                    "endpoint": "/items",
                    "method": "get",
                    "arguments": [],
                    "pagination": {"type": "cursor", "nextPath": "next"}
                }
            },
            "output": {
                "data": {"Numbers": {"api": "GetItems", "path": "data"}},
                "exports": {}
            }
        },
        "servers": [{"url": origin.uri()}]
    })
    .to_string();

    let executor = Executor::new(Settings {
        response_encoding: Encoding::Json,
        ..Settings::default()
    })
    .await
    .unwrap();
    let response = executor.get_endpoint_data(&spec).await;

    assert!(response.is_ok(), "failed: {:?}", response.message);
    assert_eq!(
        decode(response.data.as_ref().unwrap()),
        json!({"Numbers": [1, 2, 3]})
    );
    // One upstream request per page
    assert_eq!(executor.stats().fetcher.requests_issued, 3);
}

#[tokio::test]
async fn multi_page_fetch_reports_page_accounting() {
    use std::collections::BTreeMap;
    use weft::http::client::{fetch_json_pages, FetchOptions};
    use weft::http::pagination::Pagination;

    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": [1], "next": "/p2"})),
        )
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [2]})))
        .mount(&origin)
        .await;

    let pagination = Pagination {
        next_path: Some("next".to_string()),
        ..Pagination::default()
    };
    let fetched = fetch_json_pages(
        &reqwest::Client::new(),
        reqwest::Method::GET,
        &format!("{}/items", origin.uri()),
        &BTreeMap::new(),
        &BTreeMap::new(),
        None,
        Some(&pagination),
        &FetchOptions {
            timeout: std::time::Duration::from_secs(5),
            max_pages: 10,
            max_retries: 3,
            retry_backoff: 0.0,
        },
    )
    .await
    .unwrap();

    assert_eq!(fetched.pages.len(), 2);
    assert_eq!(fetched.requests_issued, 2);
    assert!(!fetched.may_have_more);
}

#[tokio::test]
async fn retriable_statuses_back_off_and_succeed() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503).insert_header("retry-after", "0"))
        .up_to_n_times(2)
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&origin)
        .await;

    let spec = json!({
        "spec": {
            "apiCalls": {
                "GetFlaky": {"type": "url", "endpoint": "/flaky", "method": "get", "arguments": []}
            },
            "output": {
                "data": {"Out": {"api": "GetFlaky", "path": "."}},
                "exports": {}
            }
        },
        "servers": [{"url": origin.uri()}]
    })
    .to_string();

    let executor = Executor::new(Settings {
        response_encoding: Encoding::Json,
        ..Settings::default()
    })
    .await
    .unwrap();
    let response = executor.get_endpoint_data(&spec).await;

    assert!(response.is_ok(), "failed: {:?}", response.message);
    assert_eq!(
        decode(response.data.as_ref().unwrap()),
        json!({".": {"ok": true}})
    );
    assert_eq!(executor.stats().fetcher.requests_issued, 3);
}

#[tokio::test]
async fn reference_arguments_expand_and_tag_rows() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ids"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ids": [10, 11, 12]})))
        .expect(1) // the prerequisite is fetched once and memoized
        .mount(&origin)
        .await;
    for id in [10, 11, 12] {
        Mock::given(method("GET"))
            .and(path(format!("/visits/{id}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"visit_id": id * 100}])),
            )
            .expect(1)
            .mount(&origin)
            .await;
    }

    let spec = json!({
        "spec": {
            "apiCalls": {
                "GetIds": {"type": "url", "endpoint": "/ids", "method": "get", "arguments": []},
                "GetVisits": {
                    "type": "url",
                    "endpoint": "/visits/{id}",
                    "method": "get",
                    "arguments": [{
                        "name": "id",
                        "argLocation": "parameter",
                        "type": "string",
                        "source": "reference",
                        "value": {"api": "GetIds", "path": "ids"}
                    }]
                }
            },
            "output": {
                "data": {"Visit": {"api": "GetVisits", "path": "."}},
                "exports": {}
            }
        },
        "servers": [{"url": origin.uri()}]
    })
    .to_string();

    let executor = Executor::new(Settings {
        response_encoding: Encoding::Json,
        ..Settings::default()
    })
    .await
    .unwrap();
    let response = executor.get_endpoint_data(&spec).await;

    assert!(response.is_ok(), "failed: {:?}", response.message);
    assert_eq!(
        decode(response.data.as_ref().unwrap()),
        json!({".": [
            {"visit_id": 1000, "argument-id": 10},
            {"visit_id": 1100, "argument-id": 11},
            {"visit_id": 1200, "argument-id": 12}
        ]})
    );
}

#[tokio::test]
async fn terminal_status_fails_the_request() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/persons"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&origin)
        .await;

    let executor = Executor::new(Settings::default()).await.unwrap();
    let response = executor.get_endpoint_data(&persons_spec(&origin.uri())).await;

    assert!(!response.is_ok());
    let message = response.message.unwrap();
    assert!(
        message.starts_with("error fetching data from origin servers"),
        "got: {message}"
    );
    assert_eq!(executor.stats().app.requests_failed, 1);
}

#[tokio::test]
async fn concurrent_identical_requests_agree() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/persons"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"person_id": 5}])),
        )
        .mount(&origin)
        .await;

    let executor = Executor::new(cached_settings()).await.unwrap();
    let spec = persons_spec(&origin.uri());

    let (first, second) = tokio::join!(
        executor.get_endpoint_data(&spec),
        executor.get_endpoint_data(&spec)
    );

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(first.data, second.data);

    // A later call is served from the response cache either way
    let third = executor.get_endpoint_data(&spec).await;
    assert_eq!(third.data, first.data);
    assert!(executor.stats().response_cache.unwrap().hits >= 1);
}
