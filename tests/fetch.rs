use mercury::{Error, FetchOptions, UserId};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

mod common;
use common::{form_of, guarded, mock_post, requests_to, setup};

#[tokio::test]
async fn fetch_returns_the_raw_response_and_keeps_cookies() {
    let (server, session) = setup().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .and(query_param("sk", "h_chr"))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("set-cookie", "lu=abc; Path=/")
                .set_body_string("<html>gone</html>"),
        )
        .mount(&server)
        .await;

    let options = FetchOptions {
        query: vec![("sk".into(), "h_chr".into())],
        ..FetchOptions::default()
    };
    let response = session
        .fetch(&format!("{}/page", server.uri()), &options)
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(response.text().await.unwrap(), "<html>gone</html>");
    assert!(session.client().cookies().unwrap().contains("lu=abc"));
}

#[tokio::test]
async fn cookies_accumulate() {
    let (server, session) = setup().await;
    session.client().add_cookies("c_user=100; xs=secret");
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "presence=p; Path=/"))
        .mount(&server)
        .await;

    session
        .fetch(&format!("{}/page", server.uri()), &FetchOptions::default())
        .await
        .unwrap();
    let cookies = session.client().cookies().unwrap();
    assert!(cookies.contains("c_user=100"));
    assert!(cookies.contains("xs=secret"));
    assert!(cookies.contains("presence=p"));
}

#[tokio::test]
async fn fetch_reports_transport_errors() {
    let (_server, session) = setup().await;
    let error = session
        .fetch("http://127.0.0.1:1/unreachable", &FetchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Request(_)));
}

#[tokio::test]
async fn fetch_json_follows_redirects() {
    let (server, session) = setup().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(guarded(&json!({"redirect": format!("{}/b", server.uri())})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(guarded(&json!({"payload": {"ok": true}})))
        .mount(&server)
        .await;

    let value = session
        .fetch_json(&format!("{}/a", server.uri()), &FetchOptions::default())
        .await
        .unwrap();
    assert_eq!(value, json!({"payload": {"ok": true}}));
}

#[tokio::test]
async fn login_redirects_are_not_followed() {
    let (server, session) = setup().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(guarded(&json!({"redirect": format!("{}/login.php", server.uri())})))
        .mount(&server)
        .await;

    let error = session
        .fetch_json(&format!("{}/a", server.uri()), &FetchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(error, Error::NotLoggedIn));
    assert!(requests_to(&server, "/login.php").await.is_empty());
}

#[tokio::test]
async fn server_errors_are_request_errors() {
    let (server, session) = setup().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let error = session
        .fetch_json(&format!("{}/a", server.uri()), &FetchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Request(_)));
}

#[tokio::test]
async fn user_info_maps_profiles() {
    let (server, session) = setup().await;
    mock_post(
        &server,
        "/chat/user_info/",
        json!({"payload": {"profiles": {
            "4": {"name": "Mark Zuckerberg", "firstName": "Mark", "vanity": "zuck", "type": "user"},
        }}}),
    )
    .await;

    let profiles = session
        .user_info(&[UserId::from("4"), UserId::from("5")])
        .await
        .unwrap();
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[&UserId::from("4")].vanity.as_deref(), Some("zuck"));

    let form = form_of(&requests_to(&server, "/chat/user_info/").await[0]);
    assert_eq!(form["ids[0]"], "4");
    assert_eq!(form["ids[1]"], "5");
}

#[tokio::test]
async fn validator_cookies_apply_to_posts() {
    let (server, session) = setup().await;
    mock_post(
        &server,
        "/chat/user_info/",
        json!({
            "jsmods": {"require": [["Cookie", "setCookie", [], ["_js_datr", "fresh", 0, "/"]]]},
            "payload": {"profiles": {}},
        }),
    )
    .await;

    session.user_info(&[UserId::from("4")]).await.unwrap();
    assert!(session.client().cookies().unwrap().contains("datr=fresh"));
}
