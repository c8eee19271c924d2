use crate::common::*;

#[test]
fn test_config_roundtrip() {
    let client = test_client();

    let res = get(&client, "/api/v1/config/global-deposit");
    assert_eq!(res.status(), rocket::http::Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert!(body["value"].is_null());

    let policy = serde_json::json!({
        "mode": "fixed",
        "percentage": 30.0,
        "fixed_amount": 400.0,
        "min_amount": 100.0,
        "deadline_days": 10,
        "required": true
    });
    let res = post(&client, "/api/v1/config/global-deposit", policy.to_string());
    assert_eq!(res.status(), rocket::http::Status::Ok);

    let res = get(&client, "/api/v1/config/global-deposit");
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["value"]["mode"], "fixed");
    assert_eq!(body["value"]["fixed_amount"], 400.0);
}

#[test]
fn test_fixed_deposit_policy_flows_into_offers() {
    let client = test_client();
    post(
        &client,
        "/api/v1/config/global-deposit",
        serde_json::json!({
            "mode": "fixed",
            "percentage": 30.0,
            "fixed_amount": 400.0,
            "min_amount": 100.0,
            "deadline_days": 10,
            "required": true
        })
        .to_string(),
    );

    let date = future_date(45);
    let (_, body) = start_conversation(
        &client,
        "fia@example.com",
        &format!("I'd like to book Room B for {date} with 20 participants."),
    );
    assert_eq!(body["deposit_info"]["amount"], 400.0);
}

#[test]
fn test_unknown_config_section_is_404() {
    let client = test_client();
    let res = get(&client, "/api/v1/config/does-not-exist");
    assert_eq!(res.status(), rocket::http::Status::NotFound);
    let res = post(&client, "/api/v1/config/does-not-exist", "{}".to_string());
    assert_eq!(res.status(), rocket::http::Status::NotFound);
}

#[test]
fn test_prompt_history_and_revert() {
    let client = test_client();

    post(
        &client,
        "/api/v1/config/prompts",
        serde_json::json!({"tone": "friendly and casual"}).to_string(),
    );
    post(
        &client,
        "/api/v1/config/prompts",
        serde_json::json!({"tone": "formal and precise"}).to_string(),
    );

    let res = get(&client, "/api/v1/config/prompts/history");
    let history: serde_json::Value = res.into_json().unwrap();
    assert_eq!(history["count"], 2);
    // Latest first.
    assert_eq!(history["history"][0]["prompts"]["tone"], "formal and precise");

    let res = post(&client, "/api/v1/config/prompts/revert/0", String::new());
    assert_eq!(res.status(), rocket::http::Status::Ok);

    let res = get(&client, "/api/v1/config/prompts");
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["value"]["tone"], "friendly and casual");

    // The revert itself is versioned.
    let res = get(&client, "/api/v1/config/prompts/history");
    let history: serde_json::Value = res.into_json().unwrap();
    assert_eq!(history["count"], 3);
}

#[test]
fn test_detection_mode_toggle_is_stored() {
    let client = test_client();
    let res = post(
        &client,
        "/api/v1/config/detection-mode",
        serde_json::json!({"mode": "legacy"}).to_string(),
    );
    assert_eq!(res.status(), rocket::http::Status::Ok);

    // Legacy mode still runs the whole pipeline.
    let date = future_date(45);
    let (_, body) = start_conversation(
        &client,
        "gil@example.com",
        &format!("I'd like to book Room B for {date} with 20 participants."),
    );
    assert_eq!(body["event_info"]["current_step"], 4);
}

#[test]
fn test_tenant_isolation_on_config() {
    let client = test_client();
    post(
        &client,
        "/api/v1/config/faq",
        serde_json::json!([{"question": "Q", "answer": "A", "keywords": ["q"]}]).to_string(),
    );

    // Another tenant sees nothing.
    let res = client
        .get("/api/v1/config/faq")
        .header(rocket::http::Header::new("X-Team-Id", "team-other"))
        .dispatch();
    let body: serde_json::Value = res.into_json().unwrap();
    assert!(body["value"].is_null());
}
