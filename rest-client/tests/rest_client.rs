use std::sync::Arc;
use std::time::Duration;

use orb_rest_client::reqwest::header::{self, HeaderValue};
use orb_rest_client::reqwest::StatusCode;
use orb_rest_client::{AsyncRestClient, ClientConfig, HttpProxyConfig, Timeouts};
use test_log::test;
use wiremock::{
    matchers::{body_string, header as header_match, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn client_for(server: &MockServer) -> AsyncRestClient {
    AsyncRestClient::new(ClientConfig::new(server.uri()))
}

/// A base URL nothing is listening on.
fn unreachable_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

#[test(tokio::test)]
async fn test_get_returns_body_and_entity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items/1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"{"id":1}"#, "application/json"),
        )
        .expect(2)
        .mount(&server)
        .await;
    let client = client_for(&server);

    assert_eq!(client.get("/items/1").await.unwrap(), r#"{"id":1}"#);

    let entity = client.get_for_entity("/items/1").await.unwrap();
    assert_eq!(entity.status(), StatusCode::OK);
    assert_eq!(entity.body(), Some(r#"{"id":1}"#));
    assert_eq!(entity.content_type(), Some("application/json"));
}

#[test(tokio::test)]
async fn test_base_url_with_trailing_slash() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("one"))
        .expect(1)
        .mount(&server)
        .await;
    let client = AsyncRestClient::new(ClientConfig::new(format!("{}/", server.uri())));

    assert_eq!(client.get("/items/1").await.unwrap(), "one");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.path(), "/items/1");
}

#[test(tokio::test)]
async fn test_body_is_decoded_with_declared_charset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/latin1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain; charset=ISO-8859-1")
                .set_body_bytes(b"caf\xE9".to_vec()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/utf8"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_bytes("café".as_bytes().to_vec()),
        )
        .mount(&server)
        .await;
    let client = client_for(&server);

    assert_eq!(client.get("/latin1").await.unwrap(), "café");
    assert_eq!(client.get("/utf8").await.unwrap(), "café");
}

#[test(tokio::test)]
async fn test_put_without_response_body_returns_empty_string() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/items/1"))
        .and(header_match("content-type", "application/json"))
        .and(body_string(r#"{"id":1}"#))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&server)
        .await;
    let client = client_for(&server);

    assert_eq!(client.put("/items/1", r#"{"id":1}"#).await.unwrap(), "");

    let entity = client.put_for_entity("/items/1", r#"{"id":1}"#).await.unwrap();
    assert_eq!(entity.status(), StatusCode::NO_CONTENT);
    assert_eq!(entity.body(), None);
}

#[test(tokio::test)]
async fn test_post_without_body_sends_empty_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
        .expect(1)
        .mount(&server)
        .await;
    let client = client_for(&server);

    let body = client.post("/events", None, None).await.unwrap();
    assert_eq!(body, "accepted");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].body.is_empty());
    assert_eq!(requests[0].headers[header::CONTENT_LENGTH], "0");
    assert!(!requests[0].headers.contains_key(header::CONTENT_TYPE));
}

#[test(tokio::test)]
async fn test_post_for_entity_with_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .and(header_match("content-type", "text/plain"))
        .and(body_string("hello"))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .expect(1)
        .mount(&server)
        .await;
    let client = client_for(&server);

    let entity = client
        .post_for_entity(
            "/events",
            Some("hello"),
            Some(HeaderValue::from_static("text/plain")),
        )
        .await
        .unwrap();
    assert_eq!(entity.status(), StatusCode::CREATED);
    assert_eq!(entity.into_body(), "created");
}

#[test(tokio::test)]
async fn test_post_with_auth_header_always_sends_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/secured"))
        .and(header_match("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(2)
        .mount(&server)
        .await;
    let client = client_for(&server);

    let body = client
        .post_with_auth_header("/secured", "", "user", "pass", None)
        .await
        .unwrap();
    assert_eq!(body, "ok");

    let body = client
        .post_with_auth_header(
            "/secured",
            r#"{"a":1}"#,
            "user",
            "pass",
            Some(HeaderValue::from_static("application/json")),
        )
        .await
        .unwrap();
    assert_eq!(body, "ok");
}

#[test(tokio::test)]
async fn test_delete() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/items/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("deleted"))
        .expect(2)
        .mount(&server)
        .await;
    let client = client_for(&server);

    assert_eq!(client.delete("/items/1").await.unwrap(), "deleted");
    let entity = client.delete_for_entity("/items/1").await.unwrap();
    assert_eq!(entity.status(), StatusCode::OK);
}

#[test(tokio::test)]
async fn test_not_found_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items/2"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;
    let client = client_for(&server);

    let err = client.get("/items/2").await.unwrap_err();
    assert!(err.is_protocol(), "{err:?}");
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(err.body(), Some("not found"));

    let err = client.get_for_entity("/items/2").await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
}

#[test(tokio::test)]
async fn test_server_error_keeps_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
        .mount(&server)
        .await;
    let client = client_for(&server);

    let err = client.delete("/items/1").await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    assert_eq!(err.body(), Some("try later"));
}

#[test(tokio::test)]
async fn test_unreachable_host_is_transport_error() {
    let client = AsyncRestClient::new(ClientConfig::new(unreachable_base_url()));

    let err = client.get("/items/1").await.unwrap_err();
    assert!(err.is_transport(), "{err:?}");
    assert_eq!(err.status(), None);
    assert!(std::error::Error::source(&err).is_some());
}

#[test(tokio::test)]
async fn test_read_timeout_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    let client = AsyncRestClient::new(ClientConfig::new(server.uri()).with_timeouts(
        Timeouts {
            read: Duration::from_millis(200),
            ..Timeouts::default()
        },
    ));

    let err = client.get("/slow").await.unwrap_err();
    assert!(err.is_transport(), "{err:?}");
    assert_eq!(err.status(), None);
}

#[test(tokio::test)]
async fn test_body_limit_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("0123456789"))
        .mount(&server)
        .await;
    let limited = AsyncRestClient::new(
        ClientConfig::new(server.uri()).with_max_in_memory_size(Some(4)),
    );
    let unlimited = client_for(&server);

    let err = limited.get("/big").await.unwrap_err();
    assert!(err.is_transport(), "{err:?}");
    assert!(err.to_string().contains("max bytes to buffer"), "{err}");

    assert_eq!(unlimited.get("/big").await.unwrap(), "0123456789");
}

#[test(tokio::test)]
async fn test_redirect_is_not_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "/new"),
        )
        .expect(1)
        .mount(&server)
        .await;
    let client = client_for(&server);

    let entity = client.get_for_entity("/old").await.unwrap();
    assert_eq!(entity.status(), StatusCode::FOUND);
    assert_eq!(entity.headers()[header::LOCATION], "/new");
}

#[test(tokio::test)]
async fn test_configured_proxy_is_used() {
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("via proxy"))
        .expect(1)
        .mount(&proxy)
        .await;
    let proxy_addr = proxy.address();
    // `.invalid` never resolves, so only the proxy can answer.
    let client = AsyncRestClient::new(
        ClientConfig::new("http://upstream.invalid").with_proxy(HttpProxyConfig::new(
            proxy_addr.ip().to_string(),
            proxy_addr.port(),
        )),
    );

    assert_eq!(client.get("/items/1").await.unwrap(), "via proxy");
}

#[test(tokio::test)]
async fn test_unconfigured_proxy_connects_directly() {
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&proxy)
        .await;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("direct"))
        .expect(2)
        .mount(&server)
        .await;

    let proxy_ip = proxy.address().ip().to_string();
    for proxy_config in [
        HttpProxyConfig::new(proxy_ip, 0),
        HttpProxyConfig::new("", proxy.address().port()),
    ] {
        let client = AsyncRestClient::new(
            ClientConfig::new(server.uri()).with_proxy(proxy_config),
        );
        assert_eq!(client.get("/items/1").await.unwrap(), "direct");
    }
}

#[test(tokio::test)]
async fn test_concurrent_requests_share_one_client() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .expect(32)
        .mount(&server)
        .await;
    let client = Arc::new(client_for(&server));

    let results = futures::future::join_all((0..32).map(|i| {
        let client = Arc::clone(&client);
        async move { client.get(&format!("/ping/{i}")).await }
    }))
    .await;

    assert!(results.into_iter().all(|r| r.unwrap() == "pong"));
}
