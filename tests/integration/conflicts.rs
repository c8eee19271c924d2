use crate::common::*;

// --- S4: soft conflict (option + option) ---

#[test]
fn test_two_options_on_same_room_create_soft_conflict_notification() {
    let client = test_client();
    let date = future_date(50);
    let request = format!("We'd like to book Room E for {date} with 100 participants.");

    let (_, first) = start_conversation(&client, "alpha@example.com", &request);
    assert_eq!(first["event_info"]["status"], "option");
    assert_eq!(first["event_info"]["locked_room_id"], "room_e");
    let first_event = first["event_info"]["event_id"].as_str().unwrap().to_string();

    let (_, second) = start_conversation(&client, "beta@example.com", &request);
    // Both proceed; the second client still gets a normal offer.
    assert_eq!(second["event_info"]["status"], "option");
    assert_eq!(second["event_info"]["locked_room_id"], "room_e");
    let second_response = second["response"].as_str().unwrap();
    assert!(second_response.contains("Offer"));
    assert!(!second_response.to_lowercase().contains("conflict"));

    // The manager sees a notification referencing both events.
    let res = get(&client, "/api/v1/tasks/pending");
    let tasks: serde_json::Value = res.into_json().unwrap();
    let notification = tasks["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["category"] == "soft_room_conflict_notification")
        .expect("soft conflict notification task");
    let draft = notification["draft_body"].as_str().unwrap();
    assert!(draft.contains(&first_event));
    assert!(draft.contains(second["event_info"]["event_id"].as_str().unwrap()));
}

// --- Hard conflict: confirming against an option holder ---

#[test]
fn test_confirming_against_option_holder_blocks_and_escalates() {
    let client = test_client();
    let date = future_date(50);
    let request = format!("We'd like to book Room E for {date} with 100 participants.");

    // A holds the room as option.
    let (_, a) = start_conversation(&client, "holder@example.com", &request);
    let a_event = a["event_info"]["event_id"].as_str().unwrap().to_string();

    // B runs the full flow up to the deposit, then pays.
    let (b_thread, b_event) = {
        let (thread, body) = start_conversation(&client, "claimant@example.com", &request);
        let event_id = body["event_info"]["event_id"].as_str().unwrap().to_string();
        send_message(&client, &thread, "claimant@example.com", "We accept the offer.");
        send_message(
            &client,
            &thread,
            "claimant@example.com",
            "Claimant GmbH, Beispielweg 3, 20095 Hamburg",
        );
        (thread, event_id)
    };
    let res = post(
        &client,
        "/api/v1/events/deposit/pay",
        serde_json::json!({"event_id": b_event}).to_string(),
    );
    let body: serde_json::Value = res.into_json().unwrap();

    // Confirmation is blocked; B is asked for a reason, no resolution yet.
    assert_eq!(body["event_info"]["status"], "option");
    assert!(body["response"].as_str().unwrap().contains("why"));

    // B supplies the reason → resolution task for the manager.
    let body = send_message(
        &client,
        &b_thread,
        "claimant@example.com",
        "We need the stage and the date is tied to our product launch.",
    );
    assert!(body["response"].as_str().unwrap().contains("manager"));
    assert_eq!(body["event_info"]["status"], "option");

    let res = get(&client, "/api/v1/tasks/pending");
    let tasks: serde_json::Value = res.into_json().unwrap();
    let resolution = tasks["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["category"] == "room_conflict_resolution")
        .expect("resolution task");
    let task_id = resolution["id"].as_str().unwrap().to_string();

    // Manager approves → B wins, A is redirected with the room excluded.
    let res = post(
        &client,
        &format!("/api/v1/tasks/{task_id}/approve"),
        serde_json::json!({"notes": "claimant wins"}).to_string(),
    );
    assert_eq!(res.status(), rocket::http::Status::Ok);
    let outcome: serde_json::Value = res.into_json().unwrap();
    assert_eq!(outcome["continuation_action"], "conflict_resolved");

    let res = get(&client, &format!("/api/v1/events/{a_event}"));
    let a_record: serde_json::Value = res.into_json().unwrap();
    assert!(a_record["locked_room_id"].is_null());
    assert_eq!(a_record["current_step"], 3);
    assert!(
        a_record["excluded_rooms"]
            .as_array()
            .unwrap()
            .iter()
            .any(|r| r == "room_e")
    );

    // B can now confirm unopposed.
    let body = send_message(&client, &b_thread, "claimant@example.com", "Please confirm the booking.");
    assert_eq!(body["event_info"]["status"], "confirmed");
}

// --- Hard conflict: confirmed holder blocks outright ---

#[test]
fn test_room_confirmed_elsewhere_is_not_offered() {
    let client = test_client();
    let date = future_date(55);

    // First event confirms Room B end to end.
    let email = "winner@example.com";
    let (_, event_id) = event_awaiting_deposit(&client, email, &date);
    post(
        &client,
        "/api/v1/events/deposit/pay",
        serde_json::json!({"event_id": event_id}).to_string(),
    );

    // A newcomer asking for Room B on the same date gets a different room.
    let (_, body) = start_conversation(
        &client,
        "late@example.com",
        &format!("We'd like to book Room B for {date} with 20 participants."),
    );
    let locked = body["event_info"]["locked_room_id"].as_str().unwrap();
    assert_ne!(locked, "room_b");
}
