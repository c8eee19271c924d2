use crate::common::*;

// --- S3: hybrid acceptance + Q&A ---

#[test]
fn test_acceptance_with_question_prompts_billing_then_answers() {
    let client = test_client();
    let email = "olga@example.com";
    let date = future_date(45);
    let (thread_id, _) = event_at_offer(&client, email, &date);

    let body = send_message(
        &client,
        &thread_id,
        email,
        "Room B looks perfect. Do you offer catering?",
    );

    assert_eq!(body["event_info"]["offer_accepted"], true);
    let response = body["response"].as_str().unwrap();
    // Billing request first, separator, then the catering answer.
    let billing_pos = response.find("billing address").expect("billing prompt");
    let separator_pos = response.find("---").expect("hybrid separator");
    let catering_pos = response.to_lowercase().find("catering").expect("catering answer");
    assert!(billing_pos < separator_pos);
    assert!(separator_pos < catering_pos);
}

#[test]
fn test_billing_capture_completes_acceptance_and_reminds_deposit() {
    let client = test_client();
    let email = "pia@example.com";
    let date = future_date(45);
    let (thread_id, _) = event_at_offer(&client, email, &date);

    send_message(&client, &thread_id, email, "Wonderful, we accept the offer.");
    let body = send_message(
        &client,
        &thread_id,
        email,
        "Acme GmbH, Musterstraße 12, 10115 Berlin",
    );

    // Gate: accepted ✓, billing ✓, deposit still open → Step 6 reminder.
    assert_eq!(body["event_info"]["current_step"], 6);
    let response = body["response"].as_str().unwrap();
    assert!(response.contains("deposit of €255.00"));
    assert!(response.contains("/api/v1/events/deposit/pay"));
}

#[test]
fn test_decline_is_acknowledged_without_confirming() {
    let client = test_client();
    let email = "quentin@example.com";
    let date = future_date(45);
    let (thread_id, _) = event_at_offer(&client, email, &date);

    send_message(&client, &thread_id, email, "We accept the offer.");
    let body = send_message(
        &client,
        &thread_id,
        email,
        "Sorry, we must decline after all.",
    );

    assert_eq!(body["event_info"]["offer_accepted"], false);
    assert_eq!(body["event_info"]["status"], "option");
    assert!(body["response"].as_str().unwrap().contains("alternative"));
}

#[test]
fn test_counter_rounds_escalate_to_manager_after_cap() {
    let client = test_client();
    let email = "rita@example.com";
    let date = future_date(45);
    let (thread_id, _) = event_at_offer(&client, email, &date);
    send_message(&client, &thread_id, email, "We accept the offer.");

    // Three counter rounds get a concession reply.
    for round in 1..=3 {
        let body = send_message(
            &client,
            &thread_id,
            email,
            &format!("Any discount possible? (round {round})"),
        );
        assert!(
            body["response"].as_str().unwrap().contains("adjust"),
            "round {round} should offer to trim the package"
        );
    }

    // The fourth goes to a manager.
    let body = send_message(&client, &thread_id, email, "Final ask: a discount, please.");
    assert!(body["response"].as_str().unwrap().contains("manager"));

    let res = get(&client, "/api/v1/tasks/pending");
    let tasks: serde_json::Value = res.into_json().unwrap();
    assert!(
        tasks["tasks"]
            .as_array()
            .unwrap()
            .iter()
            .any(|t| t["category"] == "manager_request")
    );
}
