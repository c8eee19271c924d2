use crate::common::*;

fn enable_offer_approval(client: &rocket::local::blocking::Client) {
    let res = post(
        client,
        "/api/v1/config/hil-mode",
        serde_json::json!({"offer_approval": true}).to_string(),
    );
    assert_eq!(res.status(), rocket::http::Status::Ok);
}

#[test]
fn test_offer_approval_holds_draft_until_manager_approves() {
    let client = test_client();
    enable_offer_approval(&client);
    let date = future_date(45);

    let (_, body) = start_conversation(
        &client,
        "amy@example.com",
        &format!("I'd like to book Room B for {date} with 20 participants."),
    );

    // The client gets a holding note, not the offer.
    let response = body["response"].as_str().unwrap();
    assert!(!response.contains("Total:"));
    assert!(response.contains("final check"));
    assert!(body["pending_actions"].as_array().unwrap().len() == 1);

    // The draft waits in the client queue with the full offer.
    let res = get(&client, "/api/v1/tasks/pending");
    let tasks: serde_json::Value = res.into_json().unwrap();
    let task = &tasks["tasks"].as_array().unwrap()[0];
    assert_eq!(task["category"], "offer_message");
    assert_eq!(task["status"], "pending");
    assert!(task["draft_body"].as_str().unwrap().contains("Offer"));
    let task_id = task["id"].as_str().unwrap().to_string();

    // Approval without edits sends the draft body verbatim.
    let res = post(
        &client,
        &format!("/api/v1/tasks/{task_id}/approve"),
        serde_json::json!({}).to_string(),
    );
    assert_eq!(res.status(), rocket::http::Status::Ok);
    let outcome: serde_json::Value = res.into_json().unwrap();
    assert_eq!(outcome["task_status"], "approved");
    assert!(outcome["assistant_reply"].as_str().unwrap().contains("Total: €850.00"));
}

#[test]
fn test_approval_with_edited_message_supersedes_draft() {
    let client = test_client();
    enable_offer_approval(&client);
    let date = future_date(45);
    start_conversation(
        &client,
        "bob@example.com",
        &format!("I'd like to book Room B for {date} with 20 participants."),
    );

    let res = get(&client, "/api/v1/tasks/pending");
    let tasks: serde_json::Value = res.into_json().unwrap();
    let task_id = tasks["tasks"][0]["id"].as_str().unwrap().to_string();

    let res = post(
        &client,
        &format!("/api/v1/tasks/{task_id}/approve"),
        serde_json::json!({"edited_message": "Here is your hand-polished offer."}).to_string(),
    );
    let outcome: serde_json::Value = res.into_json().unwrap();
    assert_eq!(outcome["assistant_reply"], "Here is your hand-polished offer.");

    // Second approve on the same task is a no-op.
    let res = post(
        &client,
        &format!("/api/v1/tasks/{task_id}/approve"),
        serde_json::json!({}).to_string(),
    );
    let outcome: serde_json::Value = res.into_json().unwrap();
    assert_eq!(outcome["task_status"], "approved");
    assert!(outcome.get("continuation_action").is_none());
}

#[test]
fn test_rejection_records_notes() {
    let client = test_client();
    enable_offer_approval(&client);
    let date = future_date(45);
    start_conversation(
        &client,
        "cleo@example.com",
        &format!("I'd like to book Room B for {date} with 20 participants."),
    );

    let res = get(&client, "/api/v1/tasks/pending");
    let tasks: serde_json::Value = res.into_json().unwrap();
    let task_id = tasks["tasks"][0]["id"].as_str().unwrap().to_string();

    // Notes are mandatory.
    let res = post(
        &client,
        &format!("/api/v1/tasks/{task_id}/reject"),
        serde_json::json!({"notes": ""}).to_string(),
    );
    assert_eq!(res.status(), rocket::http::Status::BadRequest);

    let res = post(
        &client,
        &format!("/api/v1/tasks/{task_id}/reject"),
        serde_json::json!({"notes": "pricing needs rework"}).to_string(),
    );
    assert_eq!(res.status(), rocket::http::Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["task_status"], "rejected");

    let res = get(&client, "/api/v1/tasks/pending");
    let tasks: serde_json::Value = res.into_json().unwrap();
    assert_eq!(tasks["count"], 0);
}

#[test]
fn test_hil_all_llm_replies_routes_to_approval_queue() {
    let client = test_client();
    let res = post(
        &client,
        "/api/v1/config/hil-mode",
        serde_json::json!({"hil_all_llm_replies": true}).to_string(),
    );
    assert_eq!(res.status(), rocket::http::Status::Ok);

    let date = future_date(45);
    let (_, body) = start_conversation(
        &client,
        "dan@example.com",
        &format!("I'd like to book Room B for {date} with 20 participants."),
    );

    // The LLM-verbalized offer is held for approval, not sent.
    assert!(!body["response"].as_str().unwrap().contains("Total:"));
    let res = get(&client, "/api/v1/tasks/pending");
    let tasks: serde_json::Value = res.into_json().unwrap();
    assert_eq!(tasks["tasks"][0]["category"], "ai_reply_approval");
}

#[test]
fn test_unknown_task_is_404() {
    let client = test_client();
    let res = post(
        &client,
        "/api/v1/tasks/no-such-task/approve",
        serde_json::json!({}).to_string(),
    );
    assert_eq!(res.status(), rocket::http::Status::NotFound);
}

#[test]
fn test_cleanup_reports_removed_count() {
    let client = test_client();
    let res = post(&client, "/api/v1/tasks/cleanup", "{}".to_string());
    assert_eq!(res.status(), rocket::http::Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["removed"], 0);
}
