use rocket::http::{ContentType, Header};
use rocket::local::blocking::Client;

pub const TEAM: &str = "team-alpha";

/// Wrapper around Client that auto-deletes the temp DB on drop.
/// Uses Option<Client> so we can drop the DB connection before deleting
/// the file (WAL mode holds it).
pub struct TestClient {
    client: Option<Client>,
    db_path: String,
}

impl Drop for TestClient {
    fn drop(&mut self) {
        drop(self.client.take());
        let _ = std::fs::remove_file(&self.db_path);
        let _ = std::fs::remove_file(format!("{}-wal", self.db_path));
        let _ = std::fs::remove_file(format!("{}-shm", self.db_path));
    }
}

impl std::ops::Deref for TestClient {
    type Target = Client;
    fn deref(&self) -> &Client {
        self.client.as_ref().unwrap()
    }
}

pub fn test_client() -> TestClient {
    // Unique temp DB for each test (avoids parallel test contention)
    let db_path = format!(
        "/tmp/venue_test_{}.db",
        uuid::Uuid::new_v4().to_string().split('-').next().unwrap()
    );

    let rocket = venue_desk::rocket_with_db(&db_path);
    let client = Client::tracked(rocket).expect("valid rocket instance");
    TestClient {
        client: Some(client),
        db_path,
    }
}

/// ISO date `days` from now — tests never hardcode calendar dates.
pub fn future_date(days: i64) -> String {
    (chrono::Utc::now().date_naive() + chrono::Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}

/// POST with the tenant header; body is a JSON string.
pub fn post<'c>(client: &'c Client, uri: &str, body: String) -> rocket::local::blocking::LocalResponse<'c> {
    client
        .post(uri.to_string())
        .header(ContentType::JSON)
        .header(Header::new("X-Team-Id", TEAM))
        .body(body)
        .dispatch()
}

pub fn get<'c>(client: &'c Client, uri: &str) -> rocket::local::blocking::LocalResponse<'c> {
    client
        .get(uri.to_string())
        .header(Header::new("X-Team-Id", TEAM))
        .dispatch()
}

/// Start a conversation; returns (thread_id, full response).
pub fn start_conversation(client: &Client, email: &str, text: &str) -> (String, serde_json::Value) {
    let res = post(
        client,
        "/api/v1/conversations",
        serde_json::json!({
            "client_email": email,
            "client_name": "Test Client",
            "email_body": text,
        })
        .to_string(),
    );
    assert_eq!(res.status(), rocket::http::Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    let thread_id = body["thread_id"].as_str().unwrap().to_string();
    (thread_id, body)
}

/// Send a follow-up message on an existing thread.
pub fn send_message(
    client: &Client,
    thread_id: &str,
    email: &str,
    text: &str,
) -> serde_json::Value {
    let res = post(
        client,
        "/api/v1/messages",
        serde_json::json!({
            "thread_id": thread_id,
            "client_email": email,
            "body": text,
        })
        .to_string(),
    );
    assert_eq!(res.status(), rocket::http::Status::Ok);
    res.into_json().unwrap()
}

/// Drive a fresh event up to the point where the offer is on the table:
/// shortcut booking for Room B. Returns (thread_id, event_id).
pub fn event_at_offer(client: &Client, email: &str, date: &str) -> (String, String) {
    let (thread_id, body) = start_conversation(
        client,
        email,
        &format!("Hello! I'd like to book Room B for {date} with 20 participants."),
    );
    assert_eq!(body["event_info"]["current_step"], 4);
    let event_id = body["event_info"]["event_id"].as_str().unwrap().to_string();
    (thread_id, event_id)
}

/// Drive an event through acceptance + billing so only the deposit is open.
pub fn event_awaiting_deposit(client: &Client, email: &str, date: &str) -> (String, String) {
    let (thread_id, event_id) = event_at_offer(client, email, date);
    let body = send_message(client, &thread_id, email, "That looks perfect, we accept the offer.");
    assert_eq!(body["event_info"]["offer_accepted"], true);
    let body = send_message(
        client,
        &thread_id,
        email,
        "Acme GmbH, Musterstraße 12, 10115 Berlin",
    );
    assert_eq!(body["event_info"]["current_step"], 6);
    (thread_id, event_id)
}
