use std::time::Duration;

use msgpurge::api_client::{ApiReply, ChatApi, HttpChatApi};
use msgpurge::config::ApiConfig;
use msgpurge::error::ApiError;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-token";

async fn client_for(server: &MockServer) -> HttpChatApi {
    HttpChatApi::new(&ApiConfig {
        base_url: server.uri(),
        auth_token: TOKEN.to_string(),
    })
    .expect("client should build")
}

#[tokio::test]
async fn test_search_sends_author_and_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/1001/messages/search"))
        .and(query_param("author_id", "42"))
        .and(query_param("max_id", "900"))
        .and(header("authorization", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_results": 1,
            "messages": [[{
                "id": "899",
                "type": 0,
                "hit": true,
                "author": {"id": "42", "username": "me"},
                "content": "bye",
                "attachments": []
            }]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = client_for(&server).await;
    let reply = api.search_messages("1001", "42", Some("900")).await.unwrap();

    match reply {
        ApiReply::Done(page) => {
            assert_eq!(page.total_results, 1);
            assert_eq!(page.messages[0][0].id, "899");
            assert_eq!(page.messages[0][0].content.as_deref(), Some("bye"));
        }
        other => panic!("unexpected reply: {:?}", other),
    }
}

#[tokio::test]
async fn test_search_without_cursor_omits_max_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/1001/messages/search"))
        .and(query_param_is_missing("max_id"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"total_results": 0, "messages": []})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let api = client_for(&server).await;
    let reply = api.search_messages("1001", "42", None).await.unwrap();

    assert!(matches!(reply, ApiReply::Done(page) if page.total_results == 0));
}

#[tokio::test]
async fn test_search_not_indexed_maps_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/1001/messages/search"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"retry_after": 2500})))
        .mount(&server)
        .await;

    let api = client_for(&server).await;
    let reply = api.search_messages("1001", "42", None).await.unwrap();

    assert!(matches!(reply, ApiReply::NotIndexed(wait) if wait == Duration::from_millis(2500)));
}

#[tokio::test]
async fn test_search_server_error_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/1001/messages/search"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let api = client_for(&server).await;
    let err = api.search_messages("1001", "42", None).await.unwrap_err();

    assert!(matches!(err, ApiError::Status { status: 500, message_id: None }));
}

#[tokio::test]
async fn test_delete_success_on_no_content() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/channels/1001/messages/m1"))
        .and(header("authorization", TOKEN))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let api = client_for(&server).await;
    let reply = api.delete_message("1001", "m1").await.unwrap();

    assert_eq!(reply, ApiReply::Done(()));
}

#[tokio::test]
async fn test_delete_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/channels/1001/messages/m4"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({"retry_after": 5000})))
        .mount(&server)
        .await;

    let api = client_for(&server).await;
    let reply = api.delete_message("1001", "m4").await.unwrap();

    assert_eq!(reply, ApiReply::RateLimited(Duration::from_millis(5000)));
}

#[tokio::test]
async fn test_delete_rate_limited_without_body_uses_default_wait() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/channels/1001/messages/m4"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let api = client_for(&server).await;
    let reply = api.delete_message("1001", "m4").await.unwrap();

    assert_eq!(reply, ApiReply::RateLimited(Duration::from_millis(1000)));
}

#[tokio::test]
async fn test_delete_forbidden_carries_message_id() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/channels/1001/messages/m5"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let api = client_for(&server).await;
    let err = api.delete_message("1001", "m5").await.unwrap_err();

    assert_eq!(err.status(), Some(403));
    assert!(err.to_string().contains("m5"));
}
