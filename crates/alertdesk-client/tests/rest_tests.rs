//! REST client tests against a mock notification API.

use alertdesk_client::{ClientError, NotificationApi, NotificationSource};
use alertdesk_core::Priority;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api(server: &MockServer) -> NotificationApi {
    NotificationApi::new(format!("{}/api", server.uri()), "secret-token", 5).unwrap()
}

fn notification(id: &str, priority: &str, read: bool) -> serde_json::Value {
    json!({
        "_id": id,
        "type": "order",
        "title": format!("Notification {id}"),
        "message": "",
        "severity": "warning",
        "priority": priority,
        "isRead": read,
        "createdAt": "2024-05-01T10:00:00Z"
    })
}

#[tokio::test]
async fn test_fetch_sends_auth_and_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notifications"))
        .and(query_param("limit", "50"))
        .and(query_param("page", "1"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "notifications": [notification("n2", "P1", false), notification("n1", "P3", true)],
                "unreadCount": 1
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = api(&server).fetch(50).await.unwrap();
    assert_eq!(page.unread_count, 1);
    assert_eq!(page.notifications.len(), 2);
    assert_eq!(page.notifications[0].id, "n2");
    assert_eq!(page.notifications[0].priority, Some(Priority::P1));
    assert!(page.notifications[1].is_read);
}

#[tokio::test]
async fn test_fetch_truncates_to_limit() {
    let server = MockServer::start().await;
    let items: Vec<_> = (0..5)
        .map(|i| notification(&format!("n{i}"), "P2", false))
        .collect();
    Mock::given(method("GET"))
        .and(path("/api/notifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "notifications": items,
            "unreadCount": 5
        })))
        .mount(&server)
        .await;

    let page = api(&server).fetch(3).await.unwrap();
    assert_eq!(page.notifications.len(), 3);
    assert_eq!(page.unread_count, 5);
}

#[tokio::test]
async fn test_fetch_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notifications"))
        .respond_with(ResponseTemplate::new(401).set_body_string("jwt expired"))
        .mount(&server)
        .await;

    let err = api(&server).fetch(50).await.unwrap_err();
    assert!(err.is_auth_error(), "expected auth error, got {err:?}");
}

#[tokio::test]
async fn test_fetch_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notifications"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = api(&server).fetch(50).await.unwrap_err();
    assert!(matches!(err, ClientError::ApiTransientError(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_fetch_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notifications"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    assert!(api(&server).fetch(50).await.is_err());
}

#[tokio::test]
async fn test_mark_all_read() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/notifications/read-all"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    api(&server).mark_all_read().await.unwrap();
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Nothing listens on port 9 locally.
    let api = NotificationApi::new("http://127.0.0.1:9/api", "t", 2).unwrap();
    let err = api.fetch(10).await.unwrap_err();
    assert!(err.is_network_error(), "expected network error, got {err:?}");
}
