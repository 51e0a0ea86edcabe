#![allow(dead_code)]

use mercury::{Client, Session};
use serde_json::Value;
use std::collections::HashMap;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const USER_ID: &str = "100";

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn setup() -> (MockServer, Session) {
    init_logging();
    let server = MockServer::start().await;
    let session = Client::new()
        .with_base_url(&server.uri())
        .unwrap()
        .with_upload_url(&server.uri())
        .unwrap()
        .session(USER_ID)
        .with_dtsg("AQHoUyTk1-oW:AQF2L9LimP2Z");
    (server, session)
}

/// A body the way the service sends it, behind the anti-hijacking guard.
pub fn guarded(body: &Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string(format!("for (;;);{body}"))
}

pub async fn mock_post(server: &MockServer, at: &str, body: Value) {
    Mock::given(method("POST"))
        .and(path(at))
        .respond_with(guarded(&body))
        .mount(server)
        .await;
}

pub async fn requests_to(server: &MockServer, at: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path() == at)
        .collect()
}

pub async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

pub fn form_of(request: &Request) -> HashMap<String, String> {
    url::form_urlencoded::parse(&request.body)
        .into_owned()
        .collect()
}
