use super::{TurnCtx, hybrid_append, qna_allowed, qna_answer};
use crate::conflict::{self, Conflict};
use crate::dates;
use crate::gate;
use crate::models::*;
use chrono::{Datelike, Duration};

/// Step 7 — Confirmation & site visit.
pub fn handle(
    ctx: &TurnCtx<'_>,
    ev: &mut EventRecord,
    msg: &InboundMessage,
    det: &DetectionResult,
) -> StepResult {
    // Confirmed events only take Q&A and the site-visit sub-flow; everything
    // else was settled.
    if ev.status != EventStatus::Confirmed {
        let status = gate::check_confirmation_gate(ev);
        if !status.ready_for_hil {
            return StepResult {
                drafts: Vec::new(),
                action: StepAction::Detour { target: 6, reason: "gate_not_ready" },
                halt: false,
            };
        }

        // Confirming against another hold is a hard conflict.
        if let (Some(date), Some(room_id)) = (ev.chosen_date.clone(), ev.locked_room_id.clone()) {
            match conflict::detect(ctx.db, ev, &date, &room_id, true) {
                Ok(Some(Conflict::HardAgainstOption { other_event_id })) => {
                    return hard_conflict_against_option(ctx, ev, msg, &other_event_id);
                }
                Ok(Some(Conflict::HardAgainstConfirmed { .. })) => {
                    // Blocked outright, no task. Re-pick a room.
                    let name = ctx
                        .catalog
                        .room(&room_id)
                        .map(|r| r.name.clone())
                        .unwrap_or(room_id.clone());
                    ev.locked_room_id = None;
                    ev.room_eval_hash = None;
                    ev.cleared_room_name = Some(name);
                    return StepResult {
                        drafts: Vec::new(),
                        action: StepAction::Detour { target: 3, reason: "hard_conflict_confirmed_holder" },
                        halt: false,
                    };
                }
                _ => {}
            }
        }

        ev.status = EventStatus::Confirmed;
        ev.awaiting_conflict_reason = false;
        let _ = ctx
            .db
            .set_client_status(&ctx.tenant, &ev.client_email, EventStatus::Confirmed);
        ctx.db
            .log_activity(&ctx.tenant, &ev.id, "high", "event_confirmed", None);
    }

    let mut sections: Vec<String> = Vec::new();
    let mut category = None;
    let mut requires_approval = false;

    if !ev.confirmation_sent {
        ev.confirmation_sent = true;
        sections.push(confirmation_message(ctx, ev));
        category = Some(TaskCategory::ConfirmationMessage);
        requires_approval = ctx.hil.confirmation_approval;
    }

    if let Some(site_visit_part) = site_visit_flow(ctx, ev, msg, det) {
        sections.push(site_visit_part);
    }

    if sections.is_empty() {
        if qna_allowed(ev, det)
            && let Some(answer) = qna_answer(ctx, ev, det, &msg.body)
        {
            return StepResult::halt_with(vec![Draft::plain(answer)]);
        }
        sections.push(
            "Everything is set for your event — let me know if anything changes.".to_string(),
        );
    } else if det.is_question {
        return StepResult::halt_with(vec![Draft {
            body: hybrid_append(sections.join("\n\n"), qna_answer(ctx, ev, det, &msg.body)),
            body_markdown: None,
            requires_approval,
            category,
            llm_generated: false,
        }]);
    }

    StepResult::halt_with(vec![Draft {
        body: sections.join("\n\n"),
        body_markdown: None,
        requires_approval,
        category,
        llm_generated: false,
    }])
}

/// Celebrate briefly, acknowledge a scheduled site visit (never re-prompt),
/// list the remaining admin steps.
fn confirmation_message(ctx: &TurnCtx<'_>, ev: &EventRecord) -> String {
    let date = ev.chosen_date.as_deref().unwrap_or("-");
    let room = ev
        .locked_room_id
        .as_deref()
        .and_then(|id| ctx.catalog.room(id))
        .map(|r| r.name.clone())
        .unwrap_or_else(|| "your room".to_string());

    let mut checklist = vec![
        "- Signed contract (we'll send it within one business day)".to_string(),
        "- Final headcount, due 7 days before the event".to_string(),
    ];
    if ev.deposit.required && ev.deposit.paid {
        checklist.insert(0, "- Deposit received ✓".to_string());
    }
    let visit_line = match ev.site_visit.status {
        SiteVisitStatus::Scheduled => ev.site_visit.confirmed_date.as_ref().map(|d| {
            format!(
                "Your site visit on {} at {} stands as planned.",
                dates::display(d),
                ev.site_visit.confirmed_time.as_deref().unwrap_or("the agreed time")
            )
        }),
        _ => None,
    };

    let mut out = format!(
        "Wonderful news — {room} is confirmed for {}! 🎉\n\nWhat happens next:\n{}",
        dates::display(date),
        checklist.join("\n")
    );
    if let Some(line) = visit_line {
        out.push_str("\n\n");
        out.push_str(&line);
    }
    out
}

fn hard_conflict_against_option(
    ctx: &TurnCtx<'_>,
    ev: &mut EventRecord,
    msg: &InboundMessage,
    other_event_id: &str,
) -> StepResult {
    if ev.awaiting_conflict_reason {
        // Second turn: the reason arrived; escalate for a manager decision.
        ev.awaiting_conflict_reason = false;
        ctx.db.log_activity(
            &ctx.tenant,
            &ev.id,
            "high",
            "conflict_escalated",
            Some(other_event_id),
        );
        return StepResult::halt_with(vec![Draft {
            body: "Thank you — I've passed your booking and the reasons to our events manager. \
                   You'll hear back as soon as the room question is decided."
                .to_string(),
            body_markdown: Some(format!(
                "Room conflict resolution needed: event {} wants to confirm against option holder {}.\nClient's reason: {}",
                ev.id, other_event_id, msg.body
            )),
            requires_approval: false,
            category: Some(TaskCategory::RoomConflictResolution),
            llm_generated: false,
        }]);
    }

    ev.awaiting_conflict_reason = true;
    StepResult::halt_with(vec![Draft::plain(
        "Before I can finalize: another inquiry currently holds this room for the same date. \
         Could you briefly tell me why this exact room and date matter for you? Our events \
         manager will then decide right away.",
    )])
}

/// Two-step site-visit flow: dates first, then time slots.
fn site_visit_flow(
    ctx: &TurnCtx<'_>,
    ev: &mut EventRecord,
    msg: &InboundMessage,
    det: &DetectionResult,
) -> Option<String> {
    let event_date = ev.chosen_date.clone()?;
    let lower = msg.body.to_lowercase();

    match ev.site_visit.status {
        SiteVisitStatus::Idle => {
            let slots = propose_dates(ctx, &event_date);
            if slots.is_empty() {
                return None;
            }
            ev.site_visit.status = SiteVisitStatus::Proposed;
            ev.site_visit.proposed_slots = slots.clone();
            Some(format!(
                "Would you like to see the venue beforehand? These dates are open for a site visit:\n{}",
                slots
                    .iter()
                    .map(|d| format!("- {} ({d})", dates::display(d)))
                    .collect::<Vec<_>>()
                    .join("\n")
            ))
        }
        SiteVisitStatus::Proposed => {
            if lower.contains("no thanks") || lower.contains("not necessary") || det.is_rejection {
                ev.site_visit.status = SiteVisitStatus::Cancelled;
                return Some("No problem — we'll skip the site visit.".to_string());
            }
            let Some(picked) = det
                .entities
                .site_visit_date
                .as_deref()
                .or(det.entities.date.as_deref())
                .and_then(dates::normalize)
            else {
                if !det.is_question && !ev.site_visit.proposed_slots.is_empty() {
                    return Some(format!(
                        "Whenever you're ready: these dates are still open for a site visit: {}.",
                        ev.site_visit.proposed_slots.join(", ")
                    ));
                }
                return None;
            };
            // Visits happen strictly before the event day.
            if picked.as_str() >= event_date.as_str() {
                return Some(format!(
                    "A site visit on {} isn't available — visits need to happen before your event on {}. Which earlier date works?",
                    dates::display(&picked),
                    dates::display(&event_date)
                ));
            }
            if dates::is_past(&picked, ctx.today) {
                return Some("That date has already passed — which upcoming date works for you?".to_string());
            }
            ev.site_visit.status = SiteVisitStatus::TimePending;
            ev.site_visit.requested_date = Some(picked.clone());
            let slots = ctx.catalog.site_visit.slots.join(", ");
            Some(format!(
                "{} it is. Which time suits you best? Open slots: {slots}.",
                dates::display(&picked)
            ))
        }
        SiteVisitStatus::TimePending => {
            let Some(time) = det
                .entities
                .site_visit_time
                .clone()
                .or(det.entities.start_time.clone())
            else {
                if det.is_question {
                    return None;
                }
                let slots = ctx.catalog.site_visit.slots.join(", ");
                return Some(format!("Which time works for your visit? Open slots: {slots}."));
            };
            ev.site_visit.status = SiteVisitStatus::ConfirmPending;
            ev.site_visit.requested_time = Some(time.clone());
            let date = ev.site_visit.requested_date.clone().unwrap_or_default();
            Some(format!(
                "To recap: site visit on {} at {time}. Shall I book it?",
                dates::display(&date)
            ))
        }
        SiteVisitStatus::ConfirmPending => {
            if det.is_confirmation || det.is_acceptance || lower.contains("yes") {
                ev.site_visit.status = SiteVisitStatus::Scheduled;
                ev.site_visit.confirmed_date = ev.site_visit.requested_date.clone();
                ev.site_visit.confirmed_time = ev.site_visit.requested_time.clone();
                let date = ev.site_visit.confirmed_date.clone().unwrap_or_default();
                ctx.db
                    .log_activity(&ctx.tenant, &ev.id, "high", "site_visit_scheduled", Some(&date));
                Some(format!(
                    "Your site visit is booked for {} at {} — we look forward to showing you around!",
                    dates::display(&date),
                    ev.site_visit.confirmed_time.as_deref().unwrap_or("-")
                ))
            } else if det.is_rejection {
                ev.site_visit.status = SiteVisitStatus::Cancelled;
                Some("Understood — no site visit then.".to_string())
            } else {
                None
            }
        }
        // Scheduled/completed/cancelled: acknowledged in the confirmation
        // message; never re-prompt.
        _ => None,
    }
}

/// 3–5 visit dates strictly before the event, on the configured weekdays.
fn propose_dates(ctx: &TurnCtx<'_>, event_date: &str) -> Vec<String> {
    let event = match dates::parse_iso(event_date) {
        Some(d) => d,
        None => return Vec::new(),
    };
    let max = ctx.catalog.site_visit.max_proposals.clamp(3, 5);
    let mut out = Vec::new();
    let mut d = ctx.today + Duration::days(1);
    while d < event && out.len() < max {
        let weekday = d.weekday().number_from_monday();
        if ctx.catalog.site_visit.weekdays.contains(&weekday) {
            out.push(d.format("%Y-%m-%d").to_string());
        }
        d += Duration::days(1);
    }
    out
}
