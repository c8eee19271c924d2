use crate::common::*;

// --- S6: deposit-paid continuation ---

#[test]
fn test_deposit_payment_confirms_event_and_offers_site_visit() {
    let client = test_client();
    let email = "sara@example.com";
    let date = future_date(60);
    let (_, event_id) = event_awaiting_deposit(&client, email, &date);

    let res = post(
        &client,
        "/api/v1/events/deposit/pay",
        serde_json::json!({"event_id": event_id}).to_string(),
    );
    assert_eq!(res.status(), rocket::http::Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();

    assert_eq!(body["deposit"]["paid"], true);
    assert!(body["deposit"]["paid_at"].is_string());

    // The synthetic turn dispatched straight to confirmation.
    assert_eq!(body["event_info"]["current_step"], 7);
    assert_eq!(body["event_info"]["status"], "confirmed");
    let response = body["response"].as_str().unwrap();
    assert!(response.contains("confirmed"));
    assert!(response.to_lowercase().contains("site visit"));

    // Record reflects the confirmation and the paid deposit.
    let res = get(&client, &format!("/api/v1/events/{event_id}"));
    let ev: serde_json::Value = res.into_json().unwrap();
    assert_eq!(ev["status"], "confirmed");
    assert_eq!(ev["deposit"]["paid"], true);
    assert_eq!(ev["site_visit"]["status"], "proposed");
}

#[test]
fn test_deposit_pay_without_requirement_is_rejected() {
    let client = test_client();
    let (_, body) = start_conversation(&client, "tom@example.com", "Hi, we need a venue.");
    let event_id = body["event_info"]["event_id"].as_str().unwrap();

    let res = post(
        &client,
        "/api/v1/events/deposit/pay",
        serde_json::json!({"event_id": event_id}).to_string(),
    );
    assert_eq!(res.status(), rocket::http::Status::BadRequest);
}

#[test]
fn test_confirmed_event_satisfies_gate_invariant() {
    let client = test_client();
    let email = "uwe@example.com";
    let date = future_date(60);
    let (_, event_id) = event_awaiting_deposit(&client, email, &date);
    post(
        &client,
        "/api/v1/events/deposit/pay",
        serde_json::json!({"event_id": event_id}).to_string(),
    );

    // status = confirmed ⇒ accepted ∧ billing ∧ (deposit paid if required)
    let res = get(&client, &format!("/api/v1/events/{event_id}"));
    let ev: serde_json::Value = res.into_json().unwrap();
    assert_eq!(ev["status"], "confirmed");
    assert_eq!(ev["offer_accepted"], true);
    assert!(ev["billing"]["street"].is_string());
    assert!(ev["billing"]["postal_code"].is_string());
    assert!(ev["billing"]["city"].is_string());
    assert_eq!(ev["deposit"]["required"], true);
    assert_eq!(ev["deposit"]["paid"], true);
}

#[test]
fn test_progress_stages_track_the_workflow() {
    let client = test_client();
    let email = "vera@example.com";
    let date = future_date(60);
    let (_, event_id) = event_at_offer(&client, email, &date);

    let res = get(&client, &format!("/api/v1/events/{event_id}/progress"));
    let progress: serde_json::Value = res.into_json().unwrap();
    let stages = progress["stages"].as_array().unwrap();
    assert_eq!(stages[0]["key"], "date");
    assert_eq!(stages[0]["state"], "completed");
    assert_eq!(stages[1]["state"], "completed");
    assert_eq!(stages[2]["state"], "active");
    assert_eq!(stages[4]["state"], "pending");
}
