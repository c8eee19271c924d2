use crate::conflict;
use crate::db::Db;
use crate::error::{Error, Result};
use crate::models::*;
use crate::pipeline::Services;
use log::{info, warn};
use sha2::{Digest, Sha256};

/// Resolved tasks older than this are removed by cleanup.
const CLEANUP_AFTER_HOURS: i64 = 24;
/// Interval between background sweeps (seconds).
const SWEEP_INTERVAL_SECS: u64 = 60;

/// Dedup key: hash(thread_id, category, body_digest).
pub fn signature(thread_id: &str, category: TaskCategory, body: &str) -> String {
    let mut digest = Sha256::new();
    digest.update(body.as_bytes());
    let body_digest = hex::encode(digest.finalize());

    let mut hasher = Sha256::new();
    hasher.update(format!("{thread_id}|{}|{body_digest}", category.as_str()));
    hex::encode(&hasher.finalize()[..16])
}

/// Create a task unless an identical one is already pending. Returns the
/// task id, or None on dedup / storage failure.
pub fn enqueue(
    db: &Db,
    ev: &EventRecord,
    category: TaskCategory,
    body: &str,
    body_markdown: Option<&str>,
) -> Option<String> {
    let sig = signature(&ev.thread_id, category, body);
    match db.pending_task_by_signature(&ev.tenant_id, &sig) {
        Ok(Some(existing)) => {
            info!("task dedup: {} already pending for thread {}", existing.id, ev.thread_id);
            return None;
        }
        Ok(None) => {}
        Err(e) => {
            warn!("task dedup lookup failed: {e}");
        }
    }

    let task = HilTask {
        id: uuid::Uuid::new_v4().to_string(),
        tenant_id: ev.tenant_id.clone(),
        event_id: ev.id.clone(),
        thread_id: ev.thread_id.clone(),
        category,
        status: TaskStatus::Pending,
        draft_body: body.to_string(),
        draft_body_markdown: body_markdown.map(String::from),
        signature: sig,
        notes: None,
        edited_body: None,
        created_at: chrono::Utc::now().to_rfc3339(),
        resolved_at: None,
    };
    match db.insert_task(&task) {
        Ok(()) => {
            db.log_activity(
                &ev.tenant_id,
                &ev.id,
                "detailed",
                "hil_task_created",
                Some(category.as_str()),
            );
            Some(task.id)
        }
        Err(e) => {
            warn!("failed to enqueue HIL task: {e}");
            None
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ApprovalOutcome {
    pub task_status: TaskStatus,
    pub assistant_reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_action: Option<String>,
}

/// Manager approval: send the effective reply (edited body wins, else the
/// plain draft body — never the markdown), then run the downstream
/// continuation for the task's category.
pub fn approve(
    services: &Services<'_>,
    tenant: &str,
    task_id: &str,
    edited_message: Option<&str>,
    notes: Option<&str>,
) -> Result<ApprovalOutcome> {
    let task = services
        .db
        .get_task(tenant, task_id)?
        .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;

    // Signature dedup: a second approve on the same draft is a no-op.
    if task.status != TaskStatus::Pending {
        return Ok(ApprovalOutcome {
            task_status: task.status,
            assistant_reply: task.edited_body.unwrap_or(task.draft_body),
            continuation_action: None,
        });
    }
    if services
        .db
        .resolved_task_by_signature(tenant, &task.signature)?
        .is_some()
    {
        services
            .db
            .resolve_task(tenant, task_id, TaskStatus::Stale, notes, None)?;
        return Ok(ApprovalOutcome {
            task_status: TaskStatus::Stale,
            assistant_reply: String::new(),
            continuation_action: None,
        });
    }

    let effective_reply = edited_message
        .map(String::from)
        .unwrap_or_else(|| task.draft_body.clone());
    services
        .db
        .resolve_task(tenant, task_id, TaskStatus::Approved, notes, edited_message)?;

    // Manager-side categories carry no direct client reply; conflict
    // resolutions message the parties from the continuation instead.
    let client_facing = !matches!(
        task.category,
        TaskCategory::SoftRoomConflictNotification
            | TaskCategory::ManagerRequest
            | TaskCategory::RoomConflictResolution
    );
    if client_facing && !effective_reply.is_empty() {
        deliver_reply(services, tenant, &task, &effective_reply);
    }

    let continuation_action = run_continuation(services, tenant, &task, notes)?;

    Ok(ApprovalOutcome {
        task_status: TaskStatus::Approved,
        assistant_reply: effective_reply,
        continuation_action,
    })
}

pub fn reject(services: &Services<'_>, tenant: &str, task_id: &str, notes: &str) -> Result<TaskStatus> {
    let task = services
        .db
        .get_task(tenant, task_id)?
        .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
    if task.status != TaskStatus::Pending {
        return Ok(task.status);
    }
    services
        .db
        .resolve_task(tenant, task_id, TaskStatus::Rejected, Some(notes), None)?;

    // Rejecting a conflict resolution means the requesting event loses.
    if task.category == TaskCategory::RoomConflictResolution
        && let Some(mut loser) = services.db.load_event(tenant, &task.event_id)?
    {
        let lock = services.locks.handle_for(&loser.id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        conflict::apply_loser_redirect(&mut loser, conflict::LoserRedirect::Step3);
        services.db.save_event(&mut loser)?;
        deliver_plain(
            services,
            tenant,
            &loser,
            "Our events manager had to give the room to an earlier inquiry — but let me find you \
             an equally good alternative right away. Would you like other rooms, or a different date?",
        );
    }

    Ok(TaskStatus::Rejected)
}

fn deliver_reply(services: &Services<'_>, tenant: &str, task: &HilTask, body: &str) {
    let _ = services.db.insert_message(
        tenant,
        &task.thread_id,
        Some(&task.event_id),
        "out",
        "assistant",
        body,
        None,
        &serde_json::json!({"approved_task": task.id}),
    );
    if let Ok(Some(ev)) = services.db.load_event(tenant, &task.event_id) {
        services.outbox.publish(crate::mail::OutboundMail {
            tenant_id: tenant.to_string(),
            to: ev.client_email,
            subject: "Your venue booking".to_string(),
            body_text: body.to_string(),
        });
    }
}

fn deliver_plain(services: &Services<'_>, tenant: &str, ev: &EventRecord, body: &str) {
    let _ = services.db.insert_message(
        tenant,
        &ev.thread_id,
        Some(&ev.id),
        "out",
        "assistant",
        body,
        None,
        &serde_json::json!({}),
    );
    services.outbox.publish(crate::mail::OutboundMail {
        tenant_id: tenant.to_string(),
        to: ev.client_email.clone(),
        subject: "Your venue booking".to_string(),
        body_text: body.to_string(),
    });
}

/// Downstream continuation after an approval.
fn run_continuation(
    services: &Services<'_>,
    tenant: &str,
    task: &HilTask,
    notes: Option<&str>,
) -> Result<Option<String>> {
    match task.category {
        // An approved offer or step-5 reply whose gate already passed goes
        // straight to confirmation; an approved negotiation reply implies
        // the acceptance it acknowledged.
        TaskCategory::OfferMessage | TaskCategory::ConfirmationMessage | TaskCategory::AiReplyApproval => {
            let lock = services.locks.handle_for(&task.event_id);
            let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
            let Some(mut ev) = services.db.load_event(tenant, &task.event_id)? else {
                return Ok(None);
            };
            if ev.status == EventStatus::Confirmed {
                return Ok(None);
            }
            if task.category == TaskCategory::AiReplyApproval {
                if ev.current_step == 5 && !ev.offer_accepted {
                    ev.offer_accepted = true;
                }
                if ev.current_step < 5 {
                    return Ok(None);
                }
            }
            let gate = crate::gate::check_confirmation_gate(&ev);
            if !gate.ready_for_hil {
                if task.category == TaskCategory::AiReplyApproval {
                    services.db.save_event(&mut ev)?;
                }
                return Ok(None);
            }
            if ev.current_step != 7 {
                ev.record_transition(7, "hil_approval_continuation");
            }
            let reply = crate::pipeline::run_internal_step(services, &mut ev);
            services.db.save_event(&mut ev)?;
            if let Some(reply) = reply {
                deliver_plain(services, tenant, &ev, &reply);
            }
            // Step 7 may still block (e.g. a room conflict surfaced).
            let action = if ev.status == EventStatus::Confirmed {
                "confirmed"
            } else {
                "pending"
            };
            Ok(Some(action.to_string()))
        }
        // Approving a conflict resolution: the requesting event wins, the
        // current option holder is redirected.
        TaskCategory::RoomConflictResolution => {
            let Some(winner) = services.db.load_event(tenant, &task.event_id)? else {
                return Ok(None);
            };
            let (Some(date), Some(room_id)) = (winner.chosen_date.clone(), winner.locked_room_id.clone())
            else {
                return Ok(None);
            };
            let losers = services.db.events_holding(tenant, &date, &room_id, &winner.id)?;
            for mut loser in losers {
                if loser.status != EventStatus::Option {
                    continue;
                }
                let lock = services.locks.handle_for(&loser.id);
                let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
                let redirect = conflict::loser_redirect(&loser, &winner);
                conflict::apply_loser_redirect(&mut loser, redirect);
                services.db.save_event(&mut loser)?;
                services.db.log_activity(
                    tenant,
                    &loser.id,
                    "high",
                    "conflict_resolution_lost",
                    notes,
                );
                deliver_plain(
                    services,
                    tenant,
                    &loser,
                    "A scheduling decision went to another booking for your requested room — \
                     let me suggest alternatives right away. Would a different room or date work?",
                );
            }
            Ok(Some("conflict_resolved".to_string()))
        }
        TaskCategory::SoftRoomConflictNotification | TaskCategory::ManagerRequest => Ok(None),
    }
}

/// Background sweeper: expired snapshots out, old resolved tasks out.
pub fn spawn_sweeper(db_path: String) {
    tokio::spawn(async move {
        let conn = match rusqlite::Connection::open(&db_path) {
            Ok(c) => c,
            Err(e) => {
                warn!("sweeper: failed to open DB: {e}");
                return;
            }
        };
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();

        // Let the server come up before the first sweep.
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;

        loop {
            let swept = Db::sweep_expired_snapshots(&conn);
            if swept > 0 {
                info!("sweeper: removed {swept} expired snapshots");
            }
            let cutoff =
                (chrono::Utc::now() - chrono::Duration::hours(CLEANUP_AFTER_HOURS)).to_rfc3339();
            let removed = conn
                .execute(
                    "DELETE FROM tasks WHERE status IN ('approved', 'rejected', 'stale')
                     AND resolved_at IS NOT NULL AND resolved_at < ?1",
                    rusqlite::params![cutoff],
                )
                .unwrap_or(0);
            if removed > 0 {
                info!("sweeper: removed {removed} resolved tasks");
            }
            tokio::time::sleep(std::time::Duration::from_secs(SWEEP_INTERVAL_SECS)).await;
        }
    });
}

pub const CLEANUP_THRESHOLD_HOURS: i64 = CLEANUP_AFTER_HOURS;
