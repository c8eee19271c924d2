use crate::common::*;

#[test]
fn test_health_is_public() {
    let client = test_client();
    // No X-Team-Id header needed.
    let res = client.get("/api/v1/health").dispatch();
    assert_eq!(res.status(), rocket::http::Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "venue-desk");
}

#[test]
fn test_stats_counts_tenant_data() {
    let client = test_client();
    let date = future_date(45);
    event_at_offer(&client, "stat@example.com", &date);

    let res = get(&client, "/api/v1/stats");
    assert_eq!(res.status(), rocket::http::Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["events"]["total"], 1);
    assert_eq!(body["events"]["option"], 1);
    assert_eq!(body["clients"], 1);
    // One inbound plus one outbound message.
    assert_eq!(body["messages"], 2);
}

#[test]
fn test_stats_are_tenant_scoped() {
    let client = test_client();
    let date = future_date(45);
    event_at_offer(&client, "mine@example.com", &date);

    let res = client
        .get("/api/v1/stats")
        .header(rocket::http::Header::new("X-Team-Id", "team-other"))
        .dispatch();
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["events"]["total"], 0);
}
