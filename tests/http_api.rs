//! HTTP contract tests: CRUD, validation gate, parameter checks and CORS.

mod common;

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use common::{spawn, spawn_memory, spawn_with, CountingStore, DownStore};

fn assert_cors(resp: &reqwest::Response) {
    let h = resp.headers();
    assert_eq!(h.get("access-control-allow-origin").unwrap(), "*");
    assert_eq!(h.get("access-control-allow-methods").unwrap(), "GET, POST, DELETE, OPTIONS");
    assert_eq!(h.get("access-control-allow-headers").unwrap(), "Content-Type");
}

#[tokio::test]
async fn json_entry_lifecycle_end_to_end() {
    let (srv, _mem) = spawn_memory().await;
    let c = &srv.client;
    let entry = [("folder", "demo"), ("name", "users")];

    let resp = c.post(srv.url("/json")).query(&entry).body(r#"[{"name":"aleix"}]"#).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_cors(&resp);
    assert_eq!(resp.text().await.unwrap(), "JSON saved");

    let resp = c.get(srv.url("/json")).query(&entry).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("content-type").unwrap(), "application/json");
    assert_eq!(resp.text().await.unwrap(), r#"[{"name":"aleix"}]"#);

    let resp = c.get(srv.url("/json")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_cors(&resp);
    let listing: Value = resp.json().await.unwrap();
    assert_eq!(listing, json!({"demo": ["users"]}));

    let resp = c.delete(srv.url("/json")).query(&entry).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "JSON deleted");

    let resp = c.get(srv.url("/json")).query(&entry).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_cors(&resp);
    assert_eq!(resp.text().await.unwrap(), "JSON not found");

    let listing: Value = c.get(srv.url("/json")).send().await.unwrap().json().await.unwrap();
    assert_eq!(listing, json!({}));
}

#[tokio::test]
async fn script_content_round_trips_byte_exact() {
    let (srv, _mem) = spawn_memory().await;
    let entry = [("folder", "tools"), ("name", "fmt")];
    let body: Vec<u8> = b"function f(x) {\r\n  return x; // \xe2\x9c\x93\n}\n\x00".to_vec();

    let resp = srv.client.post(srv.url("/scripts")).query(&entry).body(body.clone()).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "Script saved");

    let resp = srv.client.get(srv.url("/scripts")).query(&entry).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get("content-type").unwrap().to_str().unwrap().starts_with("text/plain"));
    assert_eq!(resp.bytes().await.unwrap().to_vec(), body);
}

#[tokio::test]
async fn overwrite_is_last_write_wins() {
    let (srv, _mem) = spawn_memory().await;
    let entry = [("folder", "demo"), ("name", "cfg")];
    for body in [r#"{"v":1}"#, r#"{"v":2}"#] {
        let resp = srv.client.post(srv.url("/json")).query(&entry).body(body).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
    let text = srv.client.get(srv.url("/json")).query(&entry).send().await.unwrap().text().await.unwrap();
    assert_eq!(text, r#"{"v":2}"#);
    let listing: Value = srv.client.get(srv.url("/json")).send().await.unwrap().json().await.unwrap();
    assert_eq!(listing, json!({"demo": ["cfg"]}));
}

#[tokio::test]
async fn scripts_accept_non_json_bodies() {
    let (srv, _mem) = spawn_memory().await;
    let resp = srv.client.post(srv.url("/scripts"))
        .query(&[("folder", "misc"), ("name", "notes")])
        .body("not valid json at all")
        .send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn invalid_json_is_rejected_and_leaves_entry_untouched() {
    let (srv, mem) = spawn_memory().await;
    let entry = [("folder", "demo"), ("name", "a")];

    let resp = srv.client.post(srv.url("/json")).query(&entry).body("{a:1}").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_cors(&resp);
    assert!(resp.text().await.unwrap().starts_with("Invalid JSON"));
    assert!(mem.is_empty());

    let resp = srv.client.post(srv.url("/json")).query(&entry).body(r#"{"a":1}"#).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = srv.client.post(srv.url("/json")).query(&entry).body("{a:2}").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let text = srv.client.get(srv.url("/json")).query(&entry).send().await.unwrap().text().await.unwrap();
    assert_eq!(text, r#"{"a":1}"#);
}

#[tokio::test]
async fn delete_is_idempotent_over_http() {
    let (srv, _mem) = spawn_memory().await;
    let entry = [("folder", "never"), ("name", "created")];
    for _ in 0..2 {
        let resp = srv.client.delete(srv.url("/scripts")).query(&entry).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.text().await.unwrap(), "Script deleted");
    }
}

#[tokio::test]
async fn missing_parameters_never_reach_the_store() {
    let store = CountingStore::new();
    let srv = spawn(store.clone()).await;
    let c = &srv.client;

    let requests = [
        c.get(srv.url("/json")).query(&[("folder", "demo")]),
        c.get(srv.url("/scripts")).query(&[("name", "x")]),
        c.get(srv.url("/json")).query(&[("folder", ""), ("name", "")]),
        c.post(srv.url("/json")).body("{}"),
        c.post(srv.url("/scripts")).query(&[("folder", "demo")]).body("x"),
        c.delete(srv.url("/json")),
    ];
    for req in requests {
        let resp = req.send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_cors(&resp);
        assert_eq!(resp.text().await.unwrap(), "Missing folder or name");
    }
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn separator_in_identifiers_is_rejected() {
    let store = CountingStore::new();
    let srv = spawn(store.clone()).await;
    let resp = srv.client.post(srv.url("/json"))
        .query(&[("folder", "a:b"), ("name", "c")])
        .body("{}")
        .send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let resp = srv.client.get(srv.url("/scripts"))
        .query(&[("folder", "a"), ("name", "b:c")])
        .send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn preflight_short_circuits_with_cors_headers() {
    let store = CountingStore::new();
    let srv = spawn(store.clone()).await;
    for path in ["/json", "/scripts?folder=a&name=b", "/nowhere/at/all"] {
        let resp = srv.client.request(Method::OPTIONS, srv.url(path)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_cors(&resp);
        assert!(resp.bytes().await.unwrap().is_empty());
    }
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn unknown_paths_and_methods() {
    let (srv, _mem) = spawn_memory().await;

    for path in ["/blobs", "/json/extra", "/"] {
        let resp = srv.client.get(srv.url(path)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "path {}", path);
        assert_cors(&resp);
        assert_eq!(resp.text().await.unwrap(), "Not found");
    }

    let resp = srv.client.put(srv.url("/json")).query(&[("folder", "a"), ("name", "b")]).body("{}").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_cors(&resp);
    assert_eq!(resp.text().await.unwrap(), "Method not allowed");

    let resp = srv.client.patch(srv.url("/scripts")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

    let resp = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_cors(&resp);
}

#[tokio::test]
async fn unsupported_method_on_unknown_kind_is_not_found() {
    let (srv, mem) = spawn_memory().await;
    let resp = srv.client.put(srv.url("/blobs")).query(&[("folder", "a"), ("name", "b")]).body("{}").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_cors(&resp);
    assert_eq!(resp.text().await.unwrap(), "Not found");

    let resp = srv.client.patch(srv.url("/blobs")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(mem.is_empty());
}

#[tokio::test]
async fn kinds_have_separate_namespaces() {
    let (srv, _mem) = spawn_memory().await;
    let entry = [("folder", "shared"), ("name", "same")];
    srv.client.post(srv.url("/scripts")).query(&entry).body("script body").send().await.unwrap();

    let resp = srv.client.get(srv.url("/json")).query(&entry).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let scripts: Value = srv.client.get(srv.url("/scripts")).send().await.unwrap().json().await.unwrap();
    assert_eq!(scripts, json!({"shared": ["same"]}));
    let docs: Value = srv.client.get(srv.url("/json")).send().await.unwrap().json().await.unwrap();
    assert_eq!(docs, json!({}));
}

#[tokio::test]
async fn backend_outage_is_service_unavailable_for_single_entries() {
    let srv = spawn(Arc::new(DownStore { keys: vec![] })).await;
    let entry = [("folder", "demo"), ("name", "users")];

    let resp = srv.client.get(srv.url("/json")).query(&entry).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_cors(&resp);
    assert!(resp.text().await.unwrap().starts_with("Backend unavailable"));

    let resp = srv.client.post(srv.url("/json")).query(&entry).body("[]").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let resp = srv.client.delete(srv.url("/json")).query(&entry).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let store = CountingStore::new();
    let srv = spawn_with(store.clone(), 16).await;
    let resp = srv.client.post(srv.url("/scripts"))
        .query(&[("folder", "big"), ("name", "blob")])
        .body(vec![b'x'; 64])
        .send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_cors(&resp);
    assert_eq!(store.calls(), 0);
}
