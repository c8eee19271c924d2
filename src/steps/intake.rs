use super::{TurnCtx, hybrid_append, qna_allowed, qna_answer, room};
use crate::dates;
use crate::models::*;

/// Step 1 — Intake. Field capture already happened in pre-route; this step
/// validates what arrived and moves the event into the date flow.
pub fn handle(
    ctx: &TurnCtx<'_>,
    ev: &mut EventRecord,
    msg: &InboundMessage,
    det: &DetectionResult,
) -> StepResult {
    // Headcount beyond the largest room is a hard stop with alternatives.
    if let Some(n) = ev.profile.participants {
        let max = ctx.catalog.largest_capacity();
        if n > max {
            let body = format!(
                "Thank you for thinking of us! Unfortunately {n} guests exceeds our largest room, \
                 which seats {max}.\n\nA few options:\n\
                 1. Reduce the headcount to {max} or fewer.\n\
                 2. Split the group across two of our rooms on the same day.\n\
                 3. We can recommend partner venues for larger formats.\n\n\
                 Would any of these work for you?"
            );
            ctx.db.log_activity(&ctx.tenant, &ev.id, "high", "capacity_exceeded", Some(&format!("{n} > {max}")));
            return StepResult::halt_with(vec![Draft::plain(body)]);
        }
    }

    // A question with no event substance yet: answer it and invite details.
    if qna_allowed(ev, det) && ev.chosen_date.is_none() && ev.profile.participants.is_none() {
        let answer = qna_answer(ctx, ev, det, &msg.body).unwrap_or_else(|| {
            "Happy to help with any questions about our venue.".to_string()
        });
        let body = hybrid_append(
            answer,
            Some("To get a booking started, just share your preferred date and headcount.".to_string()),
        );
        return StepResult::halt_with(vec![Draft::plain(body)]);
    }

    // Smart shortcut: date + room + participants in one message jump
    // straight into the offer path (Step 3 verifies and locks the room).
    let preference = ev.profile.room_preference.clone();
    if let (Some(date), Some(pref), Some(_)) = (
        det.entities.date.as_deref().and_then(dates::normalize),
        preference.as_deref(),
        ev.profile.participants,
    ) && !dates::is_past(&date, ctx.today)
        && let Some(room_id) = ctx.catalog.room_by_reference(pref).map(|r| r.id.clone())
        && room::is_available(ctx, ev, &room_id, &date)
    {
        ev.chosen_date = Some(date.clone());
        ctx.db
            .log_activity(&ctx.tenant, &ev.id, "high", "smart_shortcut", Some(&date));
        ev.record_transition(3, "smart_shortcut");
        return StepResult {
            drafts: Vec::new(),
            action: StepAction::Shortcut,
            halt: false,
        };
    }

    // Past dates fall through to Step 2, which rejects with alternatives.
    ev.record_transition(2, "intake_complete");
    StepResult::advance()
}
