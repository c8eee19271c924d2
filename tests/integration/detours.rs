use crate::common::*;

// --- S2: date change preserves the room lock ---

#[test]
fn test_date_change_keeps_locked_room_and_recomputes_offer() {
    let client = test_client();
    let email = "kim@example.com";
    let first_date = future_date(45);
    let (thread_id, event_id) = event_at_offer(&client, email, &first_date);

    let new_date = future_date(90);
    let body = send_message(&client, &thread_id, email, &format!("Change to {new_date}."));

    // Detour 4→2→3→4 in one turn; the lock survives the date change.
    assert_eq!(body["event_info"]["current_step"], 4);
    assert_eq!(body["event_info"]["locked_room_id"], "room_b");
    assert_eq!(body["event_info"]["chosen_date"], new_date.as_str());
    assert!(body["response"].as_str().unwrap().contains(&new_date));

    // Deposit due date is recomputed against the new event date.
    let expected_due = (chrono::Utc::now().date_naive() + chrono::Duration::days(90 - 14))
        .format("%Y-%m-%d")
        .to_string();
    assert_eq!(body["deposit_info"]["due_date"], expected_due.as_str());

    // The detour is auditable.
    let res = get(&client, &format!("/api/v1/events/{event_id}"));
    let ev: serde_json::Value = res.into_json().unwrap();
    assert!(
        ev["audit"]
            .as_array()
            .unwrap()
            .iter()
            .any(|a| a["reason"] == "change_request")
    );
}

#[test]
fn test_participant_change_releases_room_for_reevaluation() {
    let client = test_client();
    let email = "lena@example.com";
    let date = future_date(40);
    let (thread_id, _) = event_at_offer(&client, email, &date);

    // 20 → 100 guests: Room B (cap 60) can't hold it; re-evaluation must
    // pick a bigger room.
    let body = send_message(
        &client,
        &thread_id,
        email,
        "Change of plan — we're now expecting 100 participants.",
    );

    assert_eq!(body["event_info"]["current_step"], 4);
    let room = body["event_info"]["locked_room_id"].as_str().unwrap();
    assert!(room == "room_a" || room == "room_e", "expected a big room, got {room}");
}

#[test]
fn test_room_change_detours_and_locks_requested_room() {
    let client = test_client();
    let email = "max@example.com";
    let date = future_date(40);
    let (thread_id, _) = event_at_offer(&client, email, &date);

    let body = send_message(&client, &thread_id, email, "Could we switch to Room C instead?");
    assert_eq!(body["event_info"]["locked_room_id"], "room_c");
    assert_eq!(body["event_info"]["current_step"], 4);
    assert!(body["response"].as_str().unwrap().contains("Room C"));
}

#[test]
fn test_pure_question_at_offer_stage_does_not_detour() {
    let client = test_client();
    let email = "nina@example.com";
    let date = future_date(40);
    let (thread_id, _) = event_at_offer(&client, email, &date);

    let body = send_message(&client, &thread_id, email, "Is parking available?");
    // FAQ answer, no workflow movement.
    assert!(body["response"].as_str().unwrap().contains("parking"));
    assert_eq!(body["event_info"]["current_step"], 4);
    assert_eq!(body["event_info"]["chosen_date"], date.as_str());
}
