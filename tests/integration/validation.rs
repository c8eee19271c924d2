use crate::common::*;
use rocket::http::{ContentType, Status};

#[test]
fn test_missing_team_header_is_unauthorized() {
    let client = test_client();
    let res = client
        .post("/api/v1/conversations")
        .header(ContentType::JSON)
        .body(r#"{"client_email": "a@b.com", "email_body": "Hi"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Unauthorized);

    let res = client.get("/api/v1/stats").dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

#[test]
fn test_invalid_email_is_rejected() {
    let client = test_client();
    let res = post(
        &client,
        "/api/v1/conversations",
        serde_json::json!({"client_email": "not-an-email", "email_body": "Hi"}).to_string(),
    );
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn test_empty_body_is_rejected() {
    let client = test_client();
    let res = post(
        &client,
        "/api/v1/conversations",
        serde_json::json!({"client_email": "a@b.com", "email_body": "   "}).to_string(),
    );
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn test_message_requires_thread_id() {
    let client = test_client();
    let res = post(
        &client,
        "/api/v1/messages",
        serde_json::json!({"thread_id": "", "client_email": "a@b.com", "body": "Hi"}).to_string(),
    );
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn test_rate_limit_headers_present() {
    let client = test_client();
    let (_, _) = start_conversation(&client, "rl@example.com", "Hi, we need a venue.");
    let res = post(
        &client,
        "/api/v1/conversations",
        serde_json::json!({"client_email": "rl@example.com", "email_body": "Hello again"}).to_string(),
    );
    assert_eq!(res.status(), Status::Ok);
    assert!(res.headers().get_one("X-RateLimit-Limit").is_some());
    assert!(res.headers().get_one("X-RateLimit-Remaining").is_some());
}

#[test]
fn test_unknown_route_returns_json_404() {
    let client = test_client();
    let res = client.get("/api/v1/nope").dispatch();
    assert_eq!(res.status(), Status::NotFound);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["error"], "Not found");
}
