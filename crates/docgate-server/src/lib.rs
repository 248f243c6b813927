//! HTTP front end for the document gateway.
//!
//! | Method | Path | Effect |
//! |---|---|---|
//! | `POST` | `/{datatype}/{id}` | store the body's `data` under `datatype:id` |
//! | `GET` | `/{datatype}/{id}` | the stored hash as a JSON object |
//! | `POST` | `/bulk` | store each element of a JSON array |
//! | `GET` | `/ping` | liveness probe |
//!
//! Every successful write can be mirrored to a stream (see
//! [`StreamPublisher`]). Errors answer with a `{"error": ...}` body.

pub mod config;
pub mod error;
pub mod handler;
pub mod publisher;
pub mod router;
pub mod server;
pub mod state;

pub use config::GatewayConfig;
pub use error::{ServerError, ServerResult};
pub use publisher::StreamPublisher;
pub use router::build_router;
pub use server::GatewayServer;
pub use state::AppState;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{Body, Bytes};
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use docgate_protocol::{Command, Reply};
    use docgate_store::{Executor, InMemoryBackend, StoreError, StoreResult};
    use futures::future::join_all;
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    fn app(config: GatewayConfig) -> (Arc<InMemoryBackend>, Router) {
        let backend = Arc::new(InMemoryBackend::new());
        let router = build_router(AppState::new(backend.clone(), config));
        (backend, router)
    }

    fn mirroring() -> GatewayConfig {
        GatewayConfig {
            stream_out: true,
            ..Default::default()
        }
    }

    async fn send(app: &Router, method: Method, uri: &str, body: impl Into<Body>) -> (StatusCode, Bytes) {
        let response = app
            .clone()
            .oneshot(Request::builder().method(method).uri(uri).body(body.into()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body)
    }

    fn json_body(body: &Bytes) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn ping_endpoint() {
        let (backend, app) = app(GatewayConfig::default());
        let (status, body) = send(&app, Method::GET, "/ping", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
        assert_eq!(backend.command_count(), 0);
    }

    #[tokio::test]
    async fn post_then_get() {
        let (backend, app) = app(GatewayConfig::default());
        let doc = json!({"data": {"name": "x", "age": 30, "ratio": 1.5, "admin": true, "nick": null}});
        let (status, body) = send(&app, Method::POST, "/users/1", doc.to_string()).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_empty());

        let stored = backend.hash("users:1").unwrap();
        assert_eq!(stored.len(), 5);
        assert_eq!(stored["age"], "30");
        assert_eq!(stored["ratio"], "1.5");
        assert_eq!(stored["admin"], "1");
        assert_eq!(stored["nick"], "");

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/users/1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(
            json_body(&body),
            json!({"name": "x", "age": "30", "ratio": "1.5", "admin": "1", "nick": ""})
        );
    }

    #[tokio::test]
    async fn client_supplied_key_and_date_are_ignored() {
        let (backend, app) = app(GatewayConfig::default());
        let doc = json!({"key": "other:9", "datatype": "other", "date": "yesterday", "data": {"n": "a"}});
        let (status, _) = send(&app, Method::POST, "/users/1", doc.to_string()).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(backend.hash("other:9").is_none());
        let stored = backend.hash("users:1").unwrap();
        assert_eq!(stored.keys().collect::<Vec<_>>(), vec!["n"]);
    }

    #[tokio::test]
    async fn writes_merge_into_existing_record() {
        let (backend, app) = app(GatewayConfig::default());
        send(&app, Method::POST, "/users/1", r#"{"data":{"a":"1","b":"2"}}"#).await;
        send(&app, Method::POST, "/users/1", r#"{"data":{"b":"3"}}"#).await;
        let stored = backend.hash("users:1").unwrap();
        assert_eq!(stored["a"], "1");
        assert_eq!(stored["b"], "3");
    }

    #[tokio::test]
    async fn get_missing_document_is_empty_object() {
        let (_, app) = app(GatewayConfig::default());
        let (status, body) = send(&app, Method::GET, "/users/404", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body), json!({}));
    }

    #[tokio::test]
    async fn malformed_json_is_rejected_before_backend() {
        let (backend, app) = app(GatewayConfig::default());
        for body in ["{", "not json", r#"{"data": {"nested": {"x": 1}}}"#, r#"{"data": [1, 2]}"#] {
            let (status, body) = send(&app, Method::POST, "/users/1", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(json_body(&body)["error"].is_string());
        }
        assert_eq!(backend.command_count(), 0);
    }

    #[tokio::test]
    async fn missing_data_is_rejected() {
        let (backend, app) = app(GatewayConfig::default());
        for body in ["{}", r#"{"data":{}}"#, r#"{"data":null}"#] {
            let (status, _) = send(&app, Method::POST, "/users/1", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        }
        assert_eq!(backend.command_count(), 0);
    }

    #[tokio::test]
    async fn wrong_path_shapes_are_rejected() {
        let (backend, app) = app(GatewayConfig::default());
        let doc = r#"{"data":{"n":"a"}}"#;
        for uri in ["/", "/users", "/users/", "/a/b/c", "/users/1/"] {
            let (status, body) = send(&app, Method::POST, uri, doc).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "POST {uri}");
            assert!(json_body(&body)["error"].as_str().unwrap().contains("path"));

            let (status, _) = send(&app, Method::GET, uri, Body::empty()).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "GET {uri}");
        }
        assert_eq!(backend.command_count(), 0);
    }

    #[tokio::test]
    async fn unsupported_methods() {
        let (backend, app) = app(GatewayConfig::default());
        for (method, uri) in [
            (Method::PUT, "/users/1"),
            (Method::DELETE, "/users/1"),
            (Method::PATCH, "/"),
            (Method::GET, "/bulk"),
            (Method::PUT, "/bulk"),
            (Method::POST, "/ping"),
        ] {
            let (status, body) = send(&app, method.clone(), uri, Body::empty()).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{method} {uri}");
            assert_eq!(json_body(&body), json!({"error": "method not allowed"}));
        }
        assert_eq!(backend.command_count(), 0);
    }

    #[tokio::test]
    async fn no_stream_traffic_when_mirroring_is_off() {
        let (backend, app) = app(GatewayConfig::default());
        send(&app, Method::POST, "/users/1", r#"{"data":{"n":"a"}}"#).await;
        assert_eq!(backend.commands(), vec!["HMSET"]);
        assert!(backend.stream("raggs").is_empty());
    }

    #[tokio::test]
    async fn mirrors_each_write_to_stream() {
        let (backend, app) = app(mirroring());
        let (status, _) = send(&app, Method::POST, "/users/1", r#"{"data":{"n":"a","m":2}}"#).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let entries = backend.stream("raggs");
        assert_eq!(entries.len(), 1);
        let hash: Vec<(String, String)> = backend.hash("users:1").unwrap().into_iter().collect();
        assert_eq!(entries[0].1, hash);
        assert_eq!(backend.commands(), vec!["HMSET", "HGETALL", "XADD"]);
    }

    #[tokio::test]
    async fn mirrors_to_configured_stream() {
        let (backend, app) = app(GatewayConfig {
            stream_name: "events".into(),
            ..mirroring()
        });
        send(&app, Method::POST, "/users/1", r#"{"data":{"n":"a"}}"#).await;
        assert_eq!(backend.stream("events").len(), 1);
        assert!(backend.stream("raggs").is_empty());
    }

    #[tokio::test]
    async fn reads_never_mirror() {
        let (backend, app) = app(mirroring());
        send(&app, Method::GET, "/users/1", Body::empty()).await;
        assert_eq!(backend.commands(), vec!["HGETALL"]);
        assert!(backend.stream("raggs").is_empty());
    }

    #[tokio::test]
    async fn rejected_requests_never_mirror() {
        let (backend, app) = app(mirroring());
        send(&app, Method::POST, "/users/1", "{").await;
        send(&app, Method::POST, "/a/b/c", r#"{"data":{"n":"a"}}"#).await;
        assert_eq!(backend.command_count(), 0);
    }

    #[tokio::test]
    async fn backend_failure_is_500_and_recovers() {
        let (backend, app) = app(GatewayConfig::default());
        backend.fail_command("HMSET", "ERR injected");
        let (status, body) = send(&app, Method::POST, "/users/1", r#"{"data":{"n":"a"}}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json_body(&body)["error"].as_str().unwrap().contains("ERR injected"));

        backend.clear_failures();
        let (status, _) = send(&app, Method::POST, "/users/1", r#"{"data":{"n":"a"}}"#).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(backend.hash("users:1").unwrap()["n"], "a");
    }

    #[tokio::test]
    async fn stream_failure_is_500_after_write() {
        let (backend, app) = app(mirroring());
        backend.fail_command("XADD", "ERR stream down");
        let (status, _) = send(&app, Method::POST, "/users/1", r#"{"data":{"n":"a"}}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(backend.hash("users:1").unwrap()["n"], "a");
        assert!(backend.stream("raggs").is_empty());
    }

    #[tokio::test]
    async fn read_failure_is_500() {
        let (backend, app) = app(GatewayConfig::default());
        backend.fail_command("HGETALL", "ERR injected");
        let (status, _) = send(&app, Method::GET, "/users/1", Body::empty()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    struct Exhausted;

    #[async_trait]
    impl Executor for Exhausted {
        async fn execute(&self, _command: Command) -> StoreResult<Reply> {
            Err(StoreError::PoolExhausted {
                waited: Duration::from_secs(5),
            })
        }
    }

    #[tokio::test]
    async fn pool_exhaustion_is_503() {
        let app = build_router(AppState::new(Arc::new(Exhausted), GatewayConfig::default()));
        let (status, body) = send(&app, Method::POST, "/users/1", r#"{"data":{"n":"a"}}"#).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(json_body(&body)["error"].as_str().unwrap().contains("exhausted"));

        let (status, _) = send(&app, Method::GET, "/users/1", Body::empty()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = send(&app, Method::GET, "/ping", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn bulk_writes_every_item() {
        let (backend, app) = app(GatewayConfig::default());
        let body = json!([
            {"datatype": "users", "key": "1", "data": {"n": "a"}},
            {"datatype": "users", "key": "2", "data": {"n": "b"}},
        ]);
        let (status, _) = send(&app, Method::POST, "/bulk", body.to_string()).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(backend.hash("users:1").unwrap()["n"], "a");
        assert_eq!(backend.hash("users:2").unwrap()["n"], "b");
        assert_eq!(backend.commands(), vec!["HMSET", "HMSET"]);
    }

    #[tokio::test]
    async fn bulk_mirrors_each_item() {
        let (backend, app) = app(mirroring());
        let body = json!([
            {"datatype": "users", "key": "1", "data": {"n": "a"}},
            {"datatype": "orders", "key": "1", "data": {"n": "b"}},
        ]);
        send(&app, Method::POST, "/bulk", body.to_string()).await;
        let entries = backend.stream("raggs");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].1, vec![("n".to_string(), "a".to_string())]);
        assert_eq!(entries[1].1, vec![("n".to_string(), "b".to_string())]);
    }

    #[tokio::test]
    async fn bulk_empty_array() {
        let (backend, app) = app(GatewayConfig::default());
        let (status, _) = send(&app, Method::POST, "/bulk", " [ ] ").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(backend.command_count(), 0);
    }

    #[tokio::test]
    async fn bulk_continues_past_bad_items() {
        let (backend, app) = app(GatewayConfig::default());
        let body = r#"[
            {"datatype": "users", "key": "1", "data": {"n": "a"}},
            {"datatype": "users", "data": {"n": "no key"}},
            17,
            {"datatype": "users", "key": "3", "data": {"n": "c"}}
        ]"#;
        let (status, body) = send(&app, Method::POST, "/bulk", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body = json_body(&body);
        assert_eq!(body["failed_items"], json!([1, 2]));
        assert_eq!(body["written"], json!(2));
        assert!(body["error"].is_string());

        assert!(backend.hash("users:1").is_some());
        assert!(backend.hash("users:3").is_some());
        assert_eq!(backend.command_count(), 2);
    }

    #[tokio::test]
    async fn bulk_structural_errors() {
        let (backend, app) = app(GatewayConfig::default());
        for body in [
            "",
            r#"{"datatype": "users", "key": "1", "data": {"n": "a"}}"#,
            r#"[{"datatype": "users", "key": "1", "data": {"n": "a"}}"#,
            "[,]",
            "[] []",
        ] {
            let (status, response) = send(&app, Method::POST, "/bulk", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body:?}");
            assert!(json_body(&response)["error"].is_string());
        }
        assert_eq!(backend.command_count(), 0);
    }

    #[tokio::test]
    async fn bulk_backend_failure_aborts() {
        let (backend, app) = app(GatewayConfig::default());
        backend.fail_command("HMSET", "ERR injected");
        let body = json!([
            {"datatype": "users", "key": "1", "data": {"n": "a"}},
            {"datatype": "users", "key": "2", "data": {"n": "b"}},
            {"datatype": "users", "key": "3", "data": {"n": "c"}},
        ]);
        let (status, _) = send(&app, Method::POST, "/bulk", body.to_string()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(backend.command_count(), 1);
    }

    #[tokio::test]
    async fn bulk_body_may_arrive_in_small_chunks() {
        let (backend, app) = app(GatewayConfig::default());
        let payload = json!([
            {"datatype": "users", "key": "1", "data": {"s": "a,]}\"["}},
            {"datatype": "users", "key": "2", "data": {"n": 2}},
        ])
        .to_string();
        let chunks: Vec<Result<Bytes, std::io::Error>> = payload
            .as_bytes()
            .chunks(3)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        let body = Body::from_stream(futures::stream::iter(chunks));

        let (status, _) = send(&app, Method::POST, "/bulk", body).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(backend.hash("users:1").unwrap()["s"], "a,]}\"[");
        assert_eq!(backend.hash("users:2").unwrap()["n"], "2");
    }

    #[tokio::test]
    async fn bulk_rejects_oversized_items() {
        let (backend, app) = app(GatewayConfig {
            max_bulk_item_size: 32,
            ..Default::default()
        });
        let body = json!([{"datatype": "users", "key": "1", "data": {"n": "x".repeat(64)}}]);
        let (status, _) = send(&app, Method::POST, "/bulk", body.to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(backend.command_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_writes_to_distinct_keys() {
        let (backend, app) = app(GatewayConfig::default());
        let requests = (0..50).map(|i| {
            let app = app.clone();
            async move {
                let body = json!({"data": {"a": i, "b": i}}).to_string();
                send(&app, Method::POST, &format!("/users/{i}"), body).await.0
            }
        });
        for status in join_all(requests).await {
            assert_eq!(status, StatusCode::NO_CONTENT);
        }
        for i in 0..50 {
            assert_eq!(backend.hash(&format!("users:{i}")).unwrap()["n"], i.to_string());
        }
    }

    #[tokio::test]
    async fn concurrent_writes_to_one_key() {
        let (backend, app) = app(GatewayConfig::default());
        let requests = (0..20).map(|i| {
            let app = app.clone();
            async move {
                let body = json!({"data": {"a": i, "b": i}}).to_string();
                tokio::spawn(async move { send(&app, Method::POST, "/users/1", body).await.0 })
                    .await
                    .unwrap()
            }
        });
        for status in join_all(requests).await {
            assert_eq!(status, StatusCode::NO_CONTENT);
        }
        let stored = backend.hash("users:1").unwrap();
        // Each write lands whole, so both fields come from the same request.
        assert_eq!(stored.len(), 2);
        assert_eq!(stored["a"], stored["b"]);
        let n: u32 = stored["a"].parse().unwrap();
        assert!(n < 20);
    }
}
