use crate::catalog::CatalogCache;
use crate::db::Db;
use crate::llm::LlmGateway;
use crate::mail::Outbox;
use crate::models::*;
use crate::pipeline::{self, EventLocks, Services};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, get, post};

use super::{ApiError, TeamId, api_error};

#[get("/api/v1/events/<event_id>")]
pub fn get_event(
    db: &State<Db>,
    team: TeamId,
    event_id: &str,
) -> Result<Json<EventRecord>, ApiError> {
    db.load_event(&team.0, event_id)
        .map_err(|e| api_error(Status::InternalServerError, &e.to_string()))?
        .map(Json)
        .ok_or_else(|| api_error(Status::NotFound, "Event not found"))
}

/// Cancellation needs the literal confirmation word; the record is archived
/// but retained.
#[post("/api/v1/events/<event_id>/cancel", format = "json", data = "<body>")]
pub fn cancel_event(
    db: &State<Db>,
    locks: &State<EventLocks>,
    team: TeamId,
    event_id: &str,
    body: Json<CancelEventBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.confirmation != "CANCEL" {
        return Err(api_error(
            Status::BadRequest,
            "Cancellation requires confirmation: \"CANCEL\"",
        ));
    }

    let mut ev = db
        .load_event(&team.0, event_id)
        .map_err(|e| api_error(Status::InternalServerError, &e.to_string()))?
        .ok_or_else(|| api_error(Status::NotFound, "Event not found"))?;

    let lock = locks.handle_for(&ev.id);
    let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

    // Cancelling releases the room hold and invalidates open tasks.
    ev.status = EventStatus::Cancelled;
    ev.locked_room_id = None;
    ev.audit.push(AuditEntry {
        from_step: ev.current_step,
        to_step: ev.current_step,
        reason: format!("cancelled: {}", body.reason.as_deref().unwrap_or("client request")),
        at: chrono::Utc::now().to_rfc3339(),
    });
    db.save_event(&mut ev)
        .map_err(|e| api_error(Status::InternalServerError, &e.to_string()))?;
    let _ = db.set_client_status(&team.0, &ev.client_email, EventStatus::Cancelled);
    let _ = db.mark_thread_tasks_stale(&team.0, &ev.thread_id);
    db.log_activity(&team.0, &ev.id, "high", "event_cancelled", body.reason.as_deref());

    Ok(Json(serde_json::json!({
        "event_id": ev.id,
        "status": "cancelled",
    })))
}

/// Simulated payment: mark the deposit paid, then feed the synthetic
/// `deposit_just_paid` message into the thread to trigger the next turn.
#[allow(clippy::too_many_arguments)]
#[post("/api/v1/events/deposit/pay", format = "json", data = "<body>")]
pub fn pay_deposit(
    db: &State<Db>,
    catalogs: &State<CatalogCache>,
    gateway: &State<LlmGateway>,
    locks: &State<EventLocks>,
    outbox: &State<Outbox>,
    team: TeamId,
    body: Json<DepositPayBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut ev = db
        .load_event(&team.0, &body.event_id)
        .map_err(|e| api_error(Status::InternalServerError, &e.to_string()))?
        .ok_or_else(|| api_error(Status::NotFound, "Event not found"))?;

    if !ev.deposit.required {
        return Err(api_error(Status::BadRequest, "No deposit is required for this event"));
    }

    {
        let lock = locks.handle_for(&ev.id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        ev.deposit.paid = true;
        ev.deposit.paid_at = Some(chrono::Utc::now().to_rfc3339());
        db.save_event(&mut ev)
            .map_err(|e| api_error(Status::InternalServerError, &e.to_string()))?;
        db.log_activity(&team.0, &ev.id, "high", "deposit_paid", None);
    }

    // The synthetic turn acquires the event lock itself.
    let msg = InboundMessage {
        tenant_id: team.0.clone(),
        client_email: ev.client_email.clone(),
        thread_id: ev.thread_id.clone(),
        body: "[deposit paid]".to_string(),
        subject: None,
        extras: InboundExtras {
            event_id: Some(ev.id.clone()),
            skip_dev_choice: None,
            deposit_just_paid: Some(true),
        },
    };
    let services = Services {
        db: db.inner(),
        catalogs: catalogs.inner(),
        gateway: gateway.inner(),
        locks: locks.inner(),
        outbox: outbox.inner(),
    };
    let turn = pipeline::run_turn(&services, &msg);

    Ok(Json(serde_json::json!({
        "event_id": ev.id,
        "deposit": ev.deposit,
        "response": turn.response,
        "event_info": turn.event_info,
    })))
}

#[get("/api/v1/events/<event_id>/progress")]
pub fn event_progress(
    db: &State<Db>,
    team: TeamId,
    event_id: &str,
) -> Result<Json<serde_json::Value>, ApiError> {
    let ev = db
        .load_event(&team.0, event_id)
        .map_err(|e| api_error(Status::InternalServerError, &e.to_string()))?
        .ok_or_else(|| api_error(Status::NotFound, "Event not found"))?;
    Ok(Json(pipeline::progress_stages(&ev)))
}

#[get("/api/v1/events/<event_id>/activity?<granularity>&<limit>")]
pub fn event_activity(
    db: &State<Db>,
    team: TeamId,
    event_id: &str,
    granularity: Option<&str>,
    limit: Option<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let granularity = match granularity.unwrap_or("high") {
        "detailed" => "detailed",
        _ => "high",
    };
    let entries = db
        .list_activities(&team.0, event_id, granularity, limit.unwrap_or(50))
        .map_err(|e| api_error(Status::InternalServerError, &e.to_string()))?;
    Ok(Json(serde_json::json!({
        "event_id": event_id,
        "granularity": granularity,
        "entries": entries,
        "count": entries.len(),
    })))
}
