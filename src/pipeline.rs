use crate::catalog::CatalogCache;
use crate::change::{self, ChangeTarget};
use crate::db::Db;
use crate::detect::{self, DetectionMode};
use crate::llm::LlmGateway;
use crate::mail::Outbox;
use crate::models::*;
use crate::steps::{self, HilConfig, TurnCtx};
use crate::tasks;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Safety bound on the routing loop; a turn never legitimately dispatches
/// more steps than the workflow has.
const MAX_DISPATCHES: u8 = 8;

/// Per-event serialization: all turns for the same event queue behind this
/// lock for the full pipeline (pre-route → dispatch → persist).
pub struct EventLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Default for EventLocks {
    fn default() -> Self {
        EventLocks {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl EventLocks {
    pub fn handle_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Everything a turn needs, bundled once in the route handler.
pub struct Services<'a> {
    pub db: &'a Db,
    pub catalogs: &'a CatalogCache,
    pub gateway: &'a LlmGateway,
    pub locks: &'a EventLocks,
    pub outbox: &'a Outbox,
}

/// Run one inbound turn end to end and build the API response.
pub fn run_turn(services: &Services<'_>, msg: &InboundMessage) -> TurnResponse {
    let tenant = msg.tenant_id.as_str();
    let _ = services.db.upsert_client(tenant, &msg.client_email, None);

    let hil = HilConfig::from_config(
        services.db.get_config(tenant, "hil-mode").ok().flatten().as_ref(),
    );

    // Resolve the event before taking its lock.
    let mut ev = match resolve_event(services.db, msg, &hil) {
        Ok(ResolvedEvent::Existing(ev)) | Ok(ResolvedEvent::Fresh(ev)) => ev,
        Ok(ResolvedEvent::NeedsChoice(reply)) => {
            return simple_response(msg, reply, serde_json::Value::Null);
        }
        Err(e) => {
            warn!("event resolution failed: {e}");
            return simple_response(
                msg,
                "We encountered a problem; a manager has been notified.".to_string(),
                serde_json::Value::Null,
            );
        }
    };

    let lock = services.locks.handle_for(&ev.id);
    let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

    // Re-read under the lock: a racing turn may have advanced the record.
    if let Ok(Some(fresh)) = services.db.load_event(tenant, &ev.id) {
        ev = fresh;
    }

    // 1. Duplicate gate — returns before any state mutation.
    if ev.caller_step.is_none()
        && ev.current_step > 1
        && services
            .db
            .last_inbound_body(tenant, &msg.thread_id)
            .ok()
            .flatten()
            .as_deref()
            == Some(msg.body.as_str())
    {
        return simple_response(
            msg,
            "Is there something specific you'd like to add? Your previous message is already being handled."
                .to_string(),
            event_info(&ev),
        );
    }

    let _ = services.db.insert_message(
        tenant,
        &msg.thread_id,
        Some(&ev.id),
        "in",
        &msg.client_email,
        &msg.body,
        msg.subject.as_deref(),
        &serde_json::json!({}),
    );

    let catalog = services.catalogs.load(services.db, tenant);
    let llm = services.gateway.capability(
        services.db.get_config(tenant, "llm-provider").ok().flatten().as_ref(),
    );
    let mode = DetectionMode::from_config(
        services.db.get_config(tenant, "detection-mode").ok().flatten().as_ref(),
    );
    let tone_override = services
        .db
        .get_config(tenant, "prompts")
        .ok()
        .flatten()
        .and_then(|v| v.get("tone").and_then(|t| t.as_str()).map(String::from));

    let ctx = TurnCtx {
        db: services.db,
        catalog,
        llm,
        tenant: tenant.to_string(),
        today: crate::dates::today(),
        hil,
        tone_override,
    };

    // Synthetic deposit-paid turns bypass detection and change handling and
    // dispatch straight to Step 7.
    let deposit_just_paid = msg.extras.deposit_just_paid.unwrap_or(false);
    let det = if deposit_just_paid {
        let mut d = DetectionResult::empty(Intent::Confirmation);
        d.is_confirmation = true;
        d
    } else {
        detect::detect(&ctx.llm, mode, &msg.body, ctx.today, &ev.profile)
    };

    // 2. Nonsense gate.
    let workflow_signal = det.has_action_signal()
        || det.is_question
        || det.entities.date.is_some()
        || det.entities.participants.is_some();
    if det.intent == Intent::Nonsense || (det.confidence < 0.15 && !workflow_signal) {
        info!("silent-ignore for thread {} (nonsense)", msg.thread_id);
        return simple_response(msg, String::new(), event_info(&ev));
    }
    if det.confidence < 0.25 && !workflow_signal {
        tasks::enqueue(
            services.db,
            &ev,
            TaskCategory::ManagerRequest,
            &format!("Low-confidence message needs review: {}", msg.body),
            None,
        );
        return simple_response(
            msg,
            "Thanks for your message — a member of our team will take a look and get back to you."
                .to_string(),
            event_info(&ev),
        );
    }

    // 3. Prompt-injection defense: refuse without touching workflow state.
    if det.has_injection_attempt {
        return simple_response(msg, crate::compose::security_refusal(), event_info(&ev));
    }

    // 4. Manager request.
    if det.is_manager_request {
        tasks::enqueue(
            services.db,
            &ev,
            TaskCategory::ManagerRequest,
            &format!("Client asked for a manager: {}", msg.body),
            None,
        );
        services
            .db
            .log_activity(tenant, &ev.id, "high", "manager_requested", None);
        return simple_response(
            msg,
            "Of course — I've asked our events manager to take over. You'll hear from them directly."
                .to_string(),
            event_info(&ev),
        );
    }

    // 5. Guard evaluation (pure) + billing-flow correction.
    let billing_flow = ev.awaiting_billing_for_accept && ev.offer_accepted;
    let requirements_hash_changed = ev.room_eval_hash.is_some()
        && ev.room_eval_hash.as_deref() != Some(steps::room::eval_hash(&ev.profile).as_str());
    let guards = GuardSnapshot {
        forced_step: billing_flow.then_some(5),
        requirements_hash_changed,
        deposit_bypass: deposit_just_paid,
        billing_flow,
    };

    // 6. Change detection. Billing flow suppresses detours unless the LLM
    // unambiguously confirmed a change request.
    let mut disambiguation_note = None;
    if !deposit_just_paid {
        let change_allowed =
            !guards.billing_flow || (det.is_change_request && det.confidence >= 0.8 && !det.is_ambiguous);
        if change_allowed && let Some(decision) = change::classify(&msg.body, &det, &ev) {
            if guards.billing_flow {
                ev.awaiting_billing_for_accept = false;
            }
            disambiguation_note = decision.disambiguation_note.clone();
            apply_change(services.db, &mut ev, &decision);
        } else if let Some(forced) = guards.forced_step
            && ev.current_step != forced
        {
            ev.record_transition(forced, "billing_flow");
        }
    }
    if guards.requirements_hash_changed {
        // Availability must be re-checked on next entry to Step 3.
        ev.room_eval_hash = None;
    }

    // 7/8. Global field capture — any step, persisted with the turn. Runs
    // before dispatch so the Step-1 shortcut sees the captured fields.
    capture_fields(&mut ev, &det, msg);

    // 9/10. Dispatch loop.
    if deposit_just_paid && ev.current_step != 7 {
        ev.record_transition(7, "deposit_paid");
    }

    let mut drafts: Vec<Draft> = Vec::new();
    let mut silent = false;
    let mut dispatches = 0u8;
    loop {
        dispatches += 1;
        if dispatches > MAX_DISPATCHES {
            warn!("routing loop exceeded {MAX_DISPATCHES} dispatches for event {}", ev.id);
            break;
        }
        let step = steps::entry_gate(ev.current_step, &ev);
        if step != ev.current_step {
            ev.record_transition(step, "guard_violation");
        }
        let result = steps::dispatch(step, &ctx, &mut ev, msg, &det);
        drafts.extend(result.drafts);
        match result.action {
            StepAction::Ignore => {
                silent = true;
                break;
            }
            StepAction::Halt => break,
            StepAction::Detour { target, reason } => {
                // Guard correction, not a client-driven detour: no caller_step.
                ev.record_transition(target, reason);
                continue;
            }
            StepAction::Advance | StepAction::Shortcut if result.halt => break,
            StepAction::Advance | StepAction::Shortcut => continue,
        }
    }

    // Empty-reply safety net.
    let has_client_text = drafts.iter().any(|d| !d.body.is_empty());
    if !silent && !has_client_text {
        drafts.push(Draft::plain(crate::compose::fallback_for_step(ev.current_step)));
    }
    if let Some(note) = disambiguation_note
        && let Some(last) = drafts.iter_mut().filter(|d| !d.body.is_empty()).next_back()
    {
        last.body.push_str(&format!("\n\n{note}"));
    }

    // Persist once at end of turn, then route the drafts.
    if let Err(e) = services.db.save_event(&mut ev) {
        warn!("failed to persist event {}: {e}", ev.id);
    }

    let (response, pending_actions) = route_drafts(services, &ctx, &ev, msg, drafts);

    TurnResponse {
        thread_id: msg.thread_id.clone(),
        session_id: None,
        response,
        event_info: event_info(&ev),
        deposit_info: ev.deposit.required.then(|| ev.deposit.clone()),
        progress: Some(progress_stages(&ev)),
        pending_actions: (!pending_actions.is_empty()).then_some(pending_actions),
        fallback_context: det.fallback,
    }
}

enum ResolvedEvent {
    Existing(EventRecord),
    Fresh(EventRecord),
    NeedsChoice(String),
}

/// Continue-vs-new decision. A thread with an event always continues it
/// (the thread is the conversation key); reset rules apply when a known
/// client starts a new thread.
fn resolve_event(
    db: &Db,
    msg: &InboundMessage,
    hil: &HilConfig,
) -> crate::error::Result<ResolvedEvent> {
    if let Some(event_id) = &msg.extras.event_id
        && let Some(ev) = db.load_event(&msg.tenant_id, event_id)?
    {
        return Ok(ResolvedEvent::Existing(ev));
    }

    if let Some(ev) = db.latest_event_for_thread(&msg.tenant_id, &msg.thread_id)?
        && ev.status != EventStatus::Cancelled
    {
        // Dev-mode choice: an in-thread message carrying a different real
        // date without a revision signal may mean "new inquiry".
        if hil.dev_choice && !msg.extras.skip_dev_choice.unwrap_or(false) {
            let incoming = detect::extract_date(&msg.body);
            let lower = msg.body.to_lowercase();
            let revision = ["change", "switch", "reschedule", "instead", "actually"]
                .iter()
                .any(|v| lower.contains(v));
            if let Some(date) = incoming
                && !revision
                && ev.chosen_date.is_some()
                && ev.chosen_date.as_deref() != Some(date.as_str())
            {
                return Ok(ResolvedEvent::NeedsChoice(
                    "You already have an inquiry with us — should I update the existing one, or is this a new event? \
                     (Reply 'change the date' to update, or start a new conversation for a separate event.)"
                        .to_string(),
                ));
            }
        }
        return Ok(ResolvedEvent::Existing(ev));
    }

    if let Some(ev) = db.latest_event_for_client(&msg.tenant_id, &msg.client_email)? {
        let closed = matches!(ev.status, EventStatus::Confirmed | EventStatus::Cancelled);
        let deep_in_visit = matches!(
            ev.site_visit.status,
            SiteVisitStatus::Proposed | SiteVisitStatus::Scheduled
        );
        let lower = msg.body.to_lowercase();
        let revision = ["change", "switch", "reschedule", "instead", "actually"]
            .iter()
            .any(|v| lower.contains(v));
        let different_date = detect::extract_date(&msg.body)
            .is_some_and(|d| ev.chosen_date.is_some() && ev.chosen_date.as_deref() != Some(d.as_str()));

        if !closed && !deep_in_visit && !(different_date && !revision) {
            // Same inquiry continued on a new thread: keep the record but
            // bind it to the new conversation key.
            let mut ev = ev;
            ev.thread_id = msg.thread_id.clone();
            return Ok(ResolvedEvent::Existing(ev));
        }
    }

    let ev = EventRecord::new(&msg.tenant_id, &msg.client_email, &msg.thread_id);
    db.insert_event(&ev)?;
    db.log_activity(&msg.tenant_id, &ev.id, "high", "event_created", None);
    Ok(ResolvedEvent::Fresh(ev))
}

/// Detour bookkeeping, shared across all steps: set caller_step, jump
/// backward, clear the availability snapshot, keep the lock for date
/// changes, drop it for requirements changes.
fn apply_change(db: &Db, ev: &mut EventRecord, decision: &change::ChangeDecision) {
    let from = ev.current_step;
    if decision.detour_step < from {
        ev.caller_step = Some(from);
    }
    ev.room_eval_hash = None;

    match &decision.target {
        ChangeTarget::Date(_) => {
            // The lock survives; Step 3 re-verifies availability. The date
            // itself is re-confirmed by Step 2 (from the detected entity or
            // fresh proposals).
            ev.chosen_date = None;
        }
        ChangeTarget::Room(_) => {
            ev.locked_room_id = None;
        }
        ChangeTarget::Participants(n) => {
            ev.locked_room_id = None;
            if *n > 0 {
                ev.profile.participants = Some(*n);
            }
        }
        ChangeTarget::Requirements => {
            ev.locked_room_id = None;
        }
        ChangeTarget::SiteVisitDate(_) => {
            // Handled inside Step 7's sub-flow; no commitment is cleared.
            ev.caller_step = None;
        }
    }

    db.log_activity(
        &ev.tenant_id,
        &ev.id,
        "high",
        "change_detected",
        Some(&format!("{:?} -> step {}", decision.target, decision.detour_step)),
    );
    ev.record_transition(decision.detour_step, "change_request");
}

/// Opportunistic capture: contact, timing, room preference, headcount,
/// billing. Runs on every turn regardless of step.
fn capture_fields(ev: &mut EventRecord, det: &DetectionResult, msg: &InboundMessage) {
    let e = &det.entities;
    if let Some(v) = &e.contact_name {
        ev.profile.contact_name = Some(v.clone());
    }
    if let Some(v) = &e.contact_email {
        ev.profile.contact_email = Some(v.clone());
    }
    if let Some(v) = &e.contact_phone {
        ev.profile.contact_phone = Some(v.clone());
    }
    if let Some(v) = &e.start_time {
        ev.profile.start_time = Some(v.clone());
    }
    if let Some(v) = &e.end_time {
        ev.profile.end_time = Some(v.clone());
    }
    if let Some(v) = &e.room_preference {
        ev.profile.room_preference = Some(v.clone());
    }
    if let Some(v) = e.participants {
        ev.profile.participants = Some(v);
    }
    if let Some(v) = &e.event_type
        && ev.profile.event_type.is_none()
    {
        ev.profile.event_type = Some(v.clone());
    }
    if let Some(v) = &e.room_type_hint {
        ev.profile.layout = Some(v.clone());
    }

    if let Some(billing) = detect::extract_billing(&msg.body) {
        if billing.street.is_some() {
            ev.billing.street = billing.street;
        }
        if billing.postal_code.is_some() {
            ev.billing.postal_code = billing.postal_code;
        }
        if billing.city.is_some() {
            ev.billing.city = billing.city;
        }
        if billing.company.is_some() {
            ev.billing.company = billing.company;
        }
        if billing.vat_id.is_some() {
            ev.billing.vat_id = billing.vat_id;
        }
    }
}

/// Decide per draft: send, hold for approval, or manager-queue. Returns the
/// client-facing response text and the pending-action descriptors.
fn route_drafts(
    services: &Services<'_>,
    ctx: &TurnCtx<'_>,
    ev: &EventRecord,
    msg: &InboundMessage,
    drafts: Vec<Draft>,
) -> (String, Vec<serde_json::Value>) {
    let mut sent_parts: Vec<String> = Vec::new();
    let mut pending: Vec<serde_json::Value> = Vec::new();

    for draft in drafts {
        match draft.category {
            // Manager-side queues: enqueue, and deliver any client text too.
            Some(
                cat @ (TaskCategory::SoftRoomConflictNotification
                | TaskCategory::RoomConflictResolution
                | TaskCategory::ManagerRequest),
            ) => {
                if let Some(task_id) = tasks::enqueue(
                    services.db,
                    ev,
                    cat,
                    draft.body_markdown.as_deref().unwrap_or(&draft.body),
                    None,
                ) {
                    pending.push(serde_json::json!({"task_id": task_id, "category": cat.as_str()}));
                }
                if !draft.body.is_empty() {
                    send(services, ev, msg, &draft.body);
                    sent_parts.push(draft.body);
                }
            }
            // Client drafts gated by a tenant toggle.
            Some(cat @ (TaskCategory::OfferMessage | TaskCategory::ConfirmationMessage))
                if draft.requires_approval =>
            {
                if let Some(task_id) = tasks::enqueue(
                    services.db,
                    ev,
                    cat,
                    &draft.body,
                    draft.body_markdown.as_deref(),
                ) {
                    pending.push(serde_json::json!({"task_id": task_id, "category": cat.as_str()}));
                }
                sent_parts.push(
                    "Our team is giving your offer a final check — you'll receive it shortly."
                        .to_string(),
                );
            }
            // Everything else: either every AI reply needs sign-off, or send.
            _ => {
                if ctx.hil.all_llm_replies && draft.llm_generated {
                    if let Some(task_id) = tasks::enqueue(
                        services.db,
                        ev,
                        TaskCategory::AiReplyApproval,
                        &draft.body,
                        draft.body_markdown.as_deref(),
                    ) {
                        pending.push(serde_json::json!({
                            "task_id": task_id,
                            "category": TaskCategory::AiReplyApproval.as_str()
                        }));
                    }
                    sent_parts.push(
                        "Thanks! Our team is double-checking the reply and it will reach you shortly."
                            .to_string(),
                    );
                } else if !draft.body.is_empty() {
                    send(services, ev, msg, &draft.body);
                    sent_parts.push(draft.body);
                }
            }
        }
    }

    (sent_parts.join("\n\n"), pending)
}

fn send(services: &Services<'_>, ev: &EventRecord, msg: &InboundMessage, body: &str) {
    let _ = services.db.insert_message(
        &ev.tenant_id,
        &msg.thread_id,
        Some(&ev.id),
        "out",
        "assistant",
        body,
        msg.subject.as_deref(),
        &serde_json::json!({}),
    );
    services.outbox.publish(crate::mail::OutboundMail {
        tenant_id: ev.tenant_id.clone(),
        to: ev.client_email.clone(),
        subject: msg
            .subject
            .clone()
            .unwrap_or_else(|| "Your venue booking".to_string()),
        body_text: body.to_string(),
    });
}

/// Continuation dispatch after a HIL approval: run the event's current step
/// with a synthetic confirmation turn (no inbound message). The caller holds
/// the event lock and persists afterwards. Returns the client-facing text,
/// if any.
pub(crate) fn run_internal_step(services: &Services<'_>, ev: &mut EventRecord) -> Option<String> {
    let tenant = ev.tenant_id.clone();
    let ctx = TurnCtx {
        db: services.db,
        catalog: services.catalogs.load(services.db, &tenant),
        llm: services.gateway.capability(
            services.db.get_config(&tenant, "llm-provider").ok().flatten().as_ref(),
        ),
        tenant: tenant.clone(),
        today: crate::dates::today(),
        hil: HilConfig::from_config(
            services.db.get_config(&tenant, "hil-mode").ok().flatten().as_ref(),
        ),
        tone_override: None,
    };
    let msg = InboundMessage {
        tenant_id: tenant.clone(),
        client_email: ev.client_email.clone(),
        thread_id: ev.thread_id.clone(),
        body: String::new(),
        subject: None,
        extras: InboundExtras::default(),
    };
    let mut det = DetectionResult::empty(Intent::Confirmation);
    det.is_confirmation = true;

    let mut drafts: Vec<Draft> = Vec::new();
    let mut dispatches = 0u8;
    loop {
        dispatches += 1;
        if dispatches > MAX_DISPATCHES {
            break;
        }
        let step = steps::entry_gate(ev.current_step, ev);
        if step != ev.current_step {
            ev.record_transition(step, "guard_violation");
        }
        let result = steps::dispatch(step, &ctx, ev, &msg, &det);
        drafts.extend(result.drafts);
        match result.action {
            StepAction::Halt | StepAction::Ignore => break,
            StepAction::Detour { target, reason } => {
                ev.record_transition(target, reason);
                continue;
            }
            _ if result.halt => break,
            _ => continue,
        }
    }

    // The manager just approved this path, so client drafts go out directly;
    // manager-side categories still enqueue.
    let mut parts = Vec::new();
    for draft in drafts {
        if let Some(
            cat @ (TaskCategory::SoftRoomConflictNotification
            | TaskCategory::RoomConflictResolution
            | TaskCategory::ManagerRequest),
        ) = draft.category
        {
            tasks::enqueue(
                services.db,
                ev,
                cat,
                draft.body_markdown.as_deref().unwrap_or(&draft.body),
                None,
            );
        }
        if !draft.body.is_empty() {
            parts.push(draft.body);
        }
    }
    (!parts.is_empty()).then(|| parts.join("\n\n"))
}

fn simple_response(msg: &InboundMessage, response: String, event_info: serde_json::Value) -> TurnResponse {
    TurnResponse {
        thread_id: msg.thread_id.clone(),
        session_id: None,
        response,
        event_info,
        deposit_info: None,
        progress: None,
        pending_actions: None,
        fallback_context: None,
    }
}

pub fn event_info(ev: &EventRecord) -> serde_json::Value {
    serde_json::json!({
        "event_id": ev.id,
        "thread_id": ev.thread_id,
        "current_step": ev.current_step,
        "status": ev.status.as_str(),
        "chosen_date": ev.chosen_date,
        "locked_room_id": ev.locked_room_id,
        "offer_accepted": ev.offer_accepted,
    })
}

/// Map the 7 internal steps to the 5 client-facing stages.
pub fn progress_stages(ev: &EventRecord) -> serde_json::Value {
    let stage_state = |active: bool, completed: bool| {
        if completed {
            "completed"
        } else if active {
            "active"
        } else {
            "pending"
        }
    };
    let step = ev.current_step;
    let confirmed = ev.status == EventStatus::Confirmed;
    let deposit_done = !ev.deposit.required || ev.deposit.paid;

    serde_json::json!({
        "stages": [
            {"key": "date", "state": stage_state(step <= 2, step > 2 || ev.chosen_date.is_some())},
            {"key": "room", "state": stage_state(step == 3, step > 3 && ev.locked_room_id.is_some())},
            {"key": "offer", "state": stage_state(step == 4 || step == 5, ev.offer_accepted)},
            {"key": "deposit", "state": stage_state(step == 6, step > 6 && deposit_done)},
            {"key": "confirmed", "state": stage_state(step == 7 && !confirmed, confirmed)},
        ]
    })
}
