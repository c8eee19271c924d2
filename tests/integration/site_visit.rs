use crate::common::*;

fn confirmed_event(client: &rocket::local::blocking::Client, email: &str, date: &str) -> (String, String) {
    let (thread_id, event_id) = event_awaiting_deposit(client, email, date);
    let res = post(
        client,
        "/api/v1/events/deposit/pay",
        serde_json::json!({"event_id": event_id}).to_string(),
    );
    assert_eq!(res.status(), rocket::http::Status::Ok);
    (thread_id, event_id)
}

#[test]
fn test_two_step_site_visit_flow_reaches_scheduled() {
    let client = test_client();
    let email = "walt@example.com";
    let event_date = future_date(60);
    let (thread_id, event_id) = confirmed_event(&client, email, &event_date);

    // Step 1 of the sub-flow: pick one of the proposed dates.
    let visit_date = future_date(10);
    let body = send_message(&client, &thread_id, email, &format!("{visit_date} works for us."));
    assert!(body["response"].as_str().unwrap().contains("time"));

    // Step 2: pick a slot → recap and confirm.
    let body = send_message(&client, &thread_id, email, "14:00 would suit us.");
    assert!(body["response"].as_str().unwrap().contains("Shall I book it?"));

    let body = send_message(&client, &thread_id, email, "Yes, please book it.");
    assert!(body["response"].as_str().unwrap().contains("booked"));

    let res = get(&client, &format!("/api/v1/events/{event_id}"));
    let ev: serde_json::Value = res.into_json().unwrap();
    assert_eq!(ev["site_visit"]["status"], "scheduled");
    assert_eq!(ev["site_visit"]["confirmed_date"], visit_date.as_str());
    assert_eq!(ev["site_visit"]["confirmed_time"], "14:00");
}

#[test]
fn test_site_visit_on_event_day_is_unavailable() {
    let client = test_client();
    let email = "xena@example.com";
    let event_date = future_date(60);
    let (thread_id, event_id) = confirmed_event(&client, email, &event_date);

    // The event day itself is out; visits happen strictly before.
    let body = send_message(&client, &thread_id, email, &format!("{event_date} would be ideal."));
    assert!(body["response"].as_str().unwrap().contains("isn't available"));

    let res = get(&client, &format!("/api/v1/events/{event_id}"));
    let ev: serde_json::Value = res.into_json().unwrap();
    assert_eq!(ev["site_visit"]["status"], "proposed");
}

#[test]
fn test_declining_the_site_visit_ends_the_flow() {
    let client = test_client();
    let email = "yuri@example.com";
    let event_date = future_date(60);
    let (thread_id, event_id) = confirmed_event(&client, email, &event_date);

    send_message(&client, &thread_id, email, "No thanks, not necessary for us.");

    let res = get(&client, &format!("/api/v1/events/{event_id}"));
    let ev: serde_json::Value = res.into_json().unwrap();
    assert_eq!(ev["site_visit"]["status"], "cancelled");
}

#[test]
fn test_scheduled_visit_is_acknowledged_not_reprompted() {
    let client = test_client();
    let email = "zoe@example.com";
    let event_date = future_date(60);
    let (thread_id, _) = confirmed_event(&client, email, &event_date);

    let visit_date = future_date(10);
    send_message(&client, &thread_id, email, &format!("{visit_date} works for us."));
    send_message(&client, &thread_id, email, "14:00 would suit us.");
    send_message(&client, &thread_id, email, "Yes, please book it.");

    // A later question must not re-open the proposal.
    let body = send_message(&client, &thread_id, email, "Is parking available?");
    let response = body["response"].as_str().unwrap();
    assert!(response.contains("parking"));
    assert!(!response.contains("open for a site visit"));
}
