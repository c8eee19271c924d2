use crate::common::*;

#[test]
fn test_get_event_returns_full_record() {
    let client = test_client();
    let date = future_date(45);
    let (thread_id, event_id) = event_at_offer(&client, "ana@example.com", &date);

    let res = get(&client, &format!("/api/v1/events/{event_id}"));
    assert_eq!(res.status(), rocket::http::Status::Ok);
    let ev: serde_json::Value = res.into_json().unwrap();
    assert_eq!(ev["thread_id"], thread_id.as_str());
    assert_eq!(ev["current_step"], 4);
    assert_eq!(ev["status"], "option");
    assert_eq!(ev["chosen_date"], date.as_str());
    assert_eq!(ev["profile"]["participants"], 20);
}

#[test]
fn test_get_event_not_found() {
    let client = test_client();
    let res = get(&client, "/api/v1/events/no-such-event");
    assert_eq!(res.status(), rocket::http::Status::NotFound);
}

#[test]
fn test_cancel_requires_literal_confirmation() {
    let client = test_client();
    let date = future_date(45);
    let (_, event_id) = event_at_offer(&client, "bea@example.com", &date);

    let res = post(
        &client,
        &format!("/api/v1/events/{event_id}/cancel"),
        serde_json::json!({"confirmation": "cancel"}).to_string(),
    );
    assert_eq!(res.status(), rocket::http::Status::BadRequest);

    let res = post(
        &client,
        &format!("/api/v1/events/{event_id}/cancel"),
        serde_json::json!({"confirmation": "CANCEL", "reason": "plans changed"}).to_string(),
    );
    assert_eq!(res.status(), rocket::http::Status::Ok);

    // Archived but retained; the room hold is released.
    let res = get(&client, &format!("/api/v1/events/{event_id}"));
    let ev: serde_json::Value = res.into_json().unwrap();
    assert_eq!(ev["status"], "cancelled");
    assert!(ev["locked_room_id"].is_null());
}

#[test]
fn test_cancelled_room_becomes_available_again() {
    let client = test_client();
    let date = future_date(45);
    let (_, event_id) = event_at_offer(&client, "cara@example.com", &date);
    post(
        &client,
        &format!("/api/v1/events/{event_id}/cancel"),
        serde_json::json!({"confirmation": "CANCEL"}).to_string(),
    );

    // No soft conflict: the hold is gone.
    let (_, body) = start_conversation(
        &client,
        "dave@example.com",
        &format!("I'd like to book Room B for {date} with 20 participants."),
    );
    assert_eq!(body["event_info"]["locked_room_id"], "room_b");
    let res = get(&client, "/api/v1/tasks/pending");
    let tasks: serde_json::Value = res.into_json().unwrap();
    assert_eq!(tasks["count"], 0);
}

#[test]
fn test_activity_log_granularities() {
    let client = test_client();
    let date = future_date(45);
    let (_, event_id) = event_at_offer(&client, "eli@example.com", &date);

    let res = get(&client, &format!("/api/v1/events/{event_id}/activity"));
    let coarse: serde_json::Value = res.into_json().unwrap();
    let labels: Vec<&str> = coarse["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["label"].as_str().unwrap())
        .collect();
    assert!(labels.contains(&"event_created"));
    assert!(labels.contains(&"room_locked"));
    assert!(labels.contains(&"offer_prepared"));
    assert!(labels.iter().all(|_| coarse["granularity"] == "high"));

    let res = get(
        &client,
        &format!("/api/v1/events/{event_id}/activity?granularity=detailed&limit=50"),
    );
    let detailed: serde_json::Value = res.into_json().unwrap();
    assert!(detailed["count"].as_u64().unwrap() >= coarse["count"].as_u64().unwrap());
}
