use crate::catalog::CatalogCache;
use crate::db::Db;
use crate::error::Error;
use crate::llm::LlmGateway;
use crate::mail::Outbox;
use crate::models::*;
use crate::pipeline::{EventLocks, Services};
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::tasks;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, get, post};

use super::{ApiError, TeamId, api_error};

#[get("/api/v1/tasks/pending")]
pub fn pending_tasks(db: &State<Db>, team: TeamId) -> Result<Json<serde_json::Value>, ApiError> {
    let tasks = db
        .pending_tasks(&team.0)
        .map_err(|e| api_error(Status::InternalServerError, &e.to_string()))?;

    // Separate queues for the manager UI.
    let bucket = |t: &HilTask| match t.category {
        TaskCategory::OfferMessage | TaskCategory::ConfirmationMessage => "client",
        TaskCategory::AiReplyApproval => "approval",
        TaskCategory::SoftRoomConflictNotification => "notification",
        TaskCategory::RoomConflictResolution | TaskCategory::ManagerRequest => "resolution",
    };
    let mut grouped: std::collections::HashMap<&str, Vec<&HilTask>> = Default::default();
    for task in &tasks {
        grouped.entry(bucket(task)).or_default().push(task);
    }

    Ok(Json(serde_json::json!({
        "tasks": &tasks,
        "count": tasks.len(),
        "queues": {
            "client": grouped.get("client").unwrap_or(&Vec::new()),
            "approval": grouped.get("approval").unwrap_or(&Vec::new()),
            "notification": grouped.get("notification").unwrap_or(&Vec::new()),
            "resolution": grouped.get("resolution").unwrap_or(&Vec::new()),
        }
    })))
}

#[allow(clippy::too_many_arguments)]
#[post("/api/v1/tasks/<task_id>/approve", format = "json", data = "<body>")]
pub fn approve_task(
    db: &State<Db>,
    catalogs: &State<CatalogCache>,
    gateway: &State<LlmGateway>,
    locks: &State<EventLocks>,
    outbox: &State<Outbox>,
    rate_limiter: &State<RateLimiter>,
    rate_config: &State<RateLimitConfig>,
    team: TeamId,
    task_id: &str,
    body: Json<ApproveTaskBody>,
) -> Result<Json<tasks::ApprovalOutcome>, ApiError> {
    let rl = rate_limiter.check_with_info(
        &format!("approve:{}", team.0),
        rate_config.approvals_max,
        rate_config.approvals_window_secs,
    );
    if !rl.allowed {
        return Err(api_error(Status::TooManyRequests, "Rate limited"));
    }

    let services = Services {
        db: db.inner(),
        catalogs: catalogs.inner(),
        gateway: gateway.inner(),
        locks: locks.inner(),
        outbox: outbox.inner(),
    };
    match tasks::approve(
        &services,
        &team.0,
        task_id,
        body.edited_message.as_deref(),
        body.notes.as_deref(),
    ) {
        Ok(outcome) => Ok(Json(outcome)),
        Err(Error::TaskNotFound(_)) => Err(api_error(Status::NotFound, "Task not found")),
        Err(e) => Err(api_error(Status::InternalServerError, &e.to_string())),
    }
}

#[allow(clippy::too_many_arguments)]
#[post("/api/v1/tasks/<task_id>/reject", format = "json", data = "<body>")]
pub fn reject_task(
    db: &State<Db>,
    catalogs: &State<CatalogCache>,
    gateway: &State<LlmGateway>,
    locks: &State<EventLocks>,
    outbox: &State<Outbox>,
    team: TeamId,
    task_id: &str,
    body: Json<RejectTaskBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.notes.trim().is_empty() {
        return Err(api_error(Status::BadRequest, "notes are required for a rejection"));
    }
    let services = Services {
        db: db.inner(),
        catalogs: catalogs.inner(),
        gateway: gateway.inner(),
        locks: locks.inner(),
        outbox: outbox.inner(),
    };
    match tasks::reject(&services, &team.0, task_id, body.notes.trim()) {
        Ok(status) => Ok(Json(serde_json::json!({"task_status": status}))),
        Err(Error::TaskNotFound(_)) => Err(api_error(Status::NotFound, "Task not found")),
        Err(e) => Err(api_error(Status::InternalServerError, &e.to_string())),
    }
}

#[post("/api/v1/tasks/cleanup")]
pub fn cleanup_tasks(db: &State<Db>, team: TeamId) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = db
        .cleanup_tasks(&team.0, tasks::CLEANUP_THRESHOLD_HOURS)
        .map_err(|e| api_error(Status::InternalServerError, &e.to_string()))?;
    Ok(Json(serde_json::json!({"removed": removed})))
}
