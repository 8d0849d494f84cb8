use std::sync::Arc;

use idlink_api::app::{build_app, services::AppServices};
use reqwest::StatusCode;
use serde_json::{json, Value};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory store, bound to an ephemeral port.
        let app = build_app(Arc::new(AppServices::in_memory()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn identify(client: &reqwest::Client, srv: &TestServer, body: Value) -> (StatusCode, Value) {
    let res = client
        .post(srv.url("/api/v1/identify"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn banner_and_health_respond() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "The server is running fine!!");

    let res = client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn identify_builds_and_merges_clusters() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = identify(
        &client,
        &srv,
        json!({ "email": "lorraine@hillvalley.edu", "phoneNumber": "123456" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "contact": {
            "primaryContactId": 1,
            "emails": ["lorraine@hillvalley.edu"],
            "phoneNumbers": ["123456"],
            "secondaryContactIds": []
        }})
    );

    // New email, known phone (sent as a JSON number): secondary.
    let (status, body) = identify(
        &client,
        &srv,
        json!({ "email": "mcfly@hillvalley.edu", "phoneNumber": 123456 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["contact"],
        json!({
            "primaryContactId": 1,
            "emails": ["lorraine@hillvalley.edu", "mcfly@hillvalley.edu"],
            "phoneNumbers": ["123456"],
            "secondaryContactIds": [2]
        })
    );

    // Separate cluster, then a request joining the two.
    identify(&client, &srv, json!({ "email": "biff@hillvalley.edu", "phoneNumber": "717171" })).await;
    let (status, body) = identify(
        &client,
        &srv,
        json!({ "email": "mcfly@hillvalley.edu", "phoneNumber": "717171" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["contact"]["primaryContactId"], 1);
    assert_eq!(body["contact"]["secondaryContactIds"], json!([2, 3]));
    assert_eq!(body["contact"]["phoneNumbers"], json!(["123456", "717171"]));

    // Phone alone surfaces the whole cluster.
    let (_, body) = identify(&client, &srv, json!({ "email": null, "phoneNumber": "717171" })).await;
    assert_eq!(body["contact"]["primaryContactId"], 1);
    assert_eq!(
        body["contact"]["emails"],
        json!(["lorraine@hillvalley.edu", "mcfly@hillvalley.edu", "biff@hillvalley.edu"])
    );
}

#[tokio::test]
async fn identify_accepts_get_with_json_body() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url("/api/v1/identify"))
        .json(&json!({ "email": "doc@hillvalley.edu" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["contact"]["emails"], json!(["doc@hillvalley.edu"]));
    assert_eq!(body["contact"]["phoneNumbers"], json!([]));
}

#[tokio::test]
async fn invalid_requests_get_400() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for payload in [
        json!({}),
        json!({ "email": null, "phoneNumber": null }),
        json!({ "email": "   " }),
        json!({ "email": 42 }),
    ] {
        let (status, body) = identify(&client, &srv, payload.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "payload {payload}");
        assert_eq!(body["error"], "invalid_request");
    }

    let res = client
        .post(srv.url("/api/v1/identify"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_request");
}
