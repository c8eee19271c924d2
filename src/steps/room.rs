use super::{TurnCtx, qna_allowed, qna_answer};
use crate::catalog::Room;
use crate::conflict::{self, Conflict};
use crate::dates;
use crate::models::*;
use sha2::{Digest, Sha256};

/// Preferred-room bonus; sized to beat the Available-vs-Option status gap.
const PREFERRED_BONUS: i32 = 30;
/// Status gap between a free room and one soft-held as option.
const FREE_BONUS: i32 = 25;
const FEATURE_MATCH_POINTS: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomHold {
    Free,
    OptionHeld,
    ConfirmedHeld,
    Blocked,
}

#[derive(Debug, Clone)]
pub struct RoomScore {
    pub room_id: String,
    pub name: String,
    pub score: i32,
    pub hold: RoomHold,
    pub matched: Vec<String>,
    pub missing: Vec<String>,
}

/// Snapshot of the requirements that drove the last availability check.
pub fn eval_hash(profile: &EventProfile) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{}|{}|{}",
        profile.participants.unwrap_or(0),
        profile.layout.as_deref().unwrap_or(""),
        profile.requirements.join(",")
    ));
    hex::encode(&hasher.finalize()[..8])
}

pub fn hold_state(ctx: &TurnCtx<'_>, ev: &EventRecord, room: &Room, date: &str) -> RoomHold {
    if room.blocked_dates.iter().any(|d| d == date) {
        return RoomHold::Blocked;
    }
    let holders = ctx
        .db
        .events_holding(&ev.tenant_id, date, &room.id, &ev.id)
        .unwrap_or_default();
    if holders.iter().any(|e| e.status == EventStatus::Confirmed) {
        RoomHold::ConfirmedHeld
    } else if !holders.is_empty() {
        RoomHold::OptionHeld
    } else {
        RoomHold::Free
    }
}

/// Selectable = free or soft-held. Confirmed holds and blocked dates are out.
pub fn is_available(ctx: &TurnCtx<'_>, ev: &EventRecord, room_id: &str, date: &str) -> bool {
    match ctx.catalog.room(room_id) {
        Some(room) => matches!(hold_state(ctx, ev, room, date), RoomHold::Free | RoomHold::OptionHeld),
        None => false,
    }
}

fn effective_capacity(room: &Room, layout: Option<&str>) -> u32 {
    match layout {
        Some(layout) => room
            .capacity_by_layout
            .get(layout)
            .copied()
            .unwrap_or(room.capacity_max),
        None => room.capacity_max,
    }
}

/// Rank all selectable rooms for the date and headcount.
pub fn evaluate(ctx: &TurnCtx<'_>, ev: &EventRecord, date: &str, participants: u32) -> Vec<RoomScore> {
    let layout = ev.profile.layout.as_deref();
    let preference = ev.profile.room_preference.as_deref();
    let wanted: Vec<String> = ev
        .profile
        .requirements
        .iter()
        .map(|r| r.to_lowercase())
        .collect();

    let mut scores: Vec<RoomScore> = ctx
        .catalog
        .rooms
        .iter()
        .filter(|room| !ev.excluded_rooms.contains(&room.id))
        .filter_map(|room| {
            let hold = hold_state(ctx, ev, room, date);
            if matches!(hold, RoomHold::ConfirmedHeld | RoomHold::Blocked) {
                return None;
            }
            let capacity = effective_capacity(room, layout);
            if capacity < participants {
                return None;
            }

            // Capacity fit is primary: tight fits score above oversized rooms.
            let surplus_ratio = (capacity - participants) as f64 / capacity.max(1) as f64;
            let mut score = 100 - (surplus_ratio * 40.0) as i32;

            if hold == RoomHold::Free {
                score += FREE_BONUS;
            }
            if preference.is_some_and(|p| {
                let p = p.to_lowercase();
                p.contains(&room.name.to_lowercase()) || p == room.id.to_lowercase()
            }) {
                score += PREFERRED_BONUS;
            }

            // Fuzzy substring match over features ∪ services ∪ layout keys.
            let haystack: Vec<String> = room
                .features
                .iter()
                .chain(room.services.iter())
                .cloned()
                .chain(room.capacity_by_layout.keys().cloned())
                .map(|s| s.to_lowercase())
                .collect();
            let mut matched = Vec::new();
            let mut missing = Vec::new();
            for want in &wanted {
                if haystack.iter().any(|h| h.contains(want.as_str()) || want.contains(h.as_str())) {
                    matched.push(want.clone());
                } else {
                    missing.push(want.clone());
                }
            }
            score += matched.len() as i32 * FEATURE_MATCH_POINTS;

            Some(RoomScore {
                room_id: room.id.clone(),
                name: room.name.clone(),
                score,
                hold,
                matched,
                missing,
            })
        })
        .collect();

    scores.sort_by(|a, b| b.score.cmp(&a.score).then(a.name.cmp(&b.name)));
    scores
}

/// Step 3 — Room availability.
pub fn handle(
    ctx: &TurnCtx<'_>,
    ev: &mut EventRecord,
    msg: &InboundMessage,
    det: &DetectionResult,
) -> StepResult {
    if qna_allowed(ev, det) && det.entities.room_preference.is_none() {
        if let Some(answer) = qna_answer(ctx, ev, det, &msg.body) {
            return StepResult::halt_with(vec![Draft::plain(answer)]);
        }
    }

    let Some(date) = ev.chosen_date.clone() else {
        // Entry gate normally prevents this; treat as a guard violation.
        return StepResult {
            drafts: Vec::new(),
            action: StepAction::Detour { target: 2, reason: "guard_missing_date" },
            halt: false,
        };
    };

    if let Some(pref) = &det.entities.room_preference {
        ev.profile.room_preference = Some(pref.clone());
    }

    // Fast-skip after a date change: the locked room survives as long as it
    // is still available and still fits; the snapshot hash is refreshed in
    // place.
    if let Some(room_id) = ev.locked_room_id.clone() {
        let still_fits = ctx.catalog.room(&room_id).is_some_and(|r| {
            effective_capacity(r, ev.profile.layout.as_deref()) >= ev.profile.participants.unwrap_or(1)
        });
        let available = is_available(ctx, ev, &room_id, &date);
        if available && still_fits {
            ev.room_eval_hash = Some(eval_hash(&ev.profile));
            let target = ev.caller_step.take().unwrap_or(4);
            ctx.db.log_activity(
                &ctx.tenant,
                &ev.id,
                "detailed",
                "room_reverified",
                Some(&room_id),
            );
            ev.record_transition(target, "room_still_available");
            return StepResult::advance();
        }
        if !available {
            let name = ctx
                .catalog
                .room(&room_id)
                .map(|r| r.name.clone())
                .unwrap_or(room_id.clone());
            ev.cleared_room_name = Some(name);
        }
        ev.locked_room_id = None;
        ev.room_eval_hash = None;
    }

    let Some(participants) = ev.profile.participants else {
        return StepResult::halt_with(vec![Draft::plain(
            "How many guests are you expecting? I'll match the right room straight away.",
        )]);
    };

    let ranked = evaluate(ctx, ev, &date, participants);
    let lost_room_prefix = ev
        .cleared_room_name
        .take()
        .map(|name| format!("{} is no longer available on {}. ", name, dates::display(&date)))
        .unwrap_or_default();

    // An explicitly requested room wins outright when it made the ranking.
    let preferred_pick = ev.profile.room_preference.as_deref().and_then(|pref| {
        let pref = pref.to_lowercase();
        ranked
            .iter()
            .find(|s| pref.contains(&s.name.to_lowercase()) || pref == s.room_id.to_lowercase())
    });

    let Some(best) = preferred_pick.or(ranked.first()) else {
        let body = format!(
            "{}Unfortunately no room fits {} guests on {}.\n\nOptions:\n\
             1. A different date — I can check alternatives.\n\
             2. Split the group across two rooms.\n\
             3. Reduce the headcount to {} or fewer.",
            lost_room_prefix,
            participants,
            dates::display(&date),
            ctx.catalog.largest_capacity()
        );
        ctx.db
            .log_activity(&ctx.tenant, &ev.id, "high", "no_room_available", Some(&date));
        return StepResult::halt_with(vec![Draft::plain(body)]);
    };

    // Lock the best room; the event now holds it as an option.
    let selected = best.clone();
    ev.locked_room_id = Some(selected.room_id.clone());
    ev.room_eval_hash = Some(eval_hash(&ev.profile));
    if ev.status == EventStatus::Lead {
        ev.status = EventStatus::Option;
        let _ = ctx
            .db
            .set_client_status(&ctx.tenant, &ev.client_email, EventStatus::Option);
    }
    ctx.db.log_activity(
        &ctx.tenant,
        &ev.id,
        "high",
        "room_locked",
        Some(&selected.name),
    );

    let mut drafts = Vec::new();

    // Soft conflict: both options proceed, manager gets a notification,
    // neither client is told in-thread.
    if let Ok(Some(Conflict::Soft { other_event_id })) =
        conflict::detect(ctx.db, ev, &date, &selected.room_id, false)
    {
        drafts.push(Draft {
            body: String::new(),
            body_markdown: Some(format!(
                "Soft room conflict: events {} and {} both hold {} on {} as option.",
                ev.id, other_event_id, selected.name, date
            )),
            requires_approval: false,
            category: Some(TaskCategory::SoftRoomConflictNotification),
            llm_generated: false,
        });
    }

    let mut ack = format!(
        "{}{} works well for {} guests on {}",
        lost_room_prefix,
        selected.name,
        participants,
        dates::display(&date)
    );
    if !selected.missing.is_empty() {
        ack.push_str(&format!(
            " (note: no {} — happy to suggest alternatives)",
            selected.missing.join(", ")
        ));
    }
    ack.push('.');

    // The acknowledgement rides in front of the Step 4 offer. A fresh
    // selection supersedes any pending detour return.
    ev.room_confirmation_prefix = Some(ack);
    ev.caller_step = None;
    ev.record_transition(4, "room_selected");
    StepResult {
        drafts,
        action: StepAction::Advance,
        halt: false,
    }
}
