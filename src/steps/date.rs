use super::{TurnCtx, qna_allowed, qna_answer};
use crate::dates;
use crate::models::*;
use chrono::{Datelike, Duration};

/// Proposal cap per prompt.
const MAX_SUGGESTIONS: usize = 5;
/// Failed proposal rounds before escalating to a manager.
const MAX_FAILED_ROUNDS: u32 = 3;

/// Step 2 — Date confirmation.
pub fn handle(
    ctx: &TurnCtx<'_>,
    ev: &mut EventRecord,
    msg: &InboundMessage,
    det: &DetectionResult,
) -> StepResult {
    if qna_allowed(ev, det) && det.entities.date.is_none() {
        if let Some(answer) = qna_answer(ctx, ev, det, &msg.body) {
            return StepResult::halt_with(vec![Draft::plain(answer)]);
        }
    }

    let requested = det
        .entities
        .date
        .as_deref()
        .and_then(dates::normalize)
        .or_else(|| ev.chosen_date.clone());

    match requested {
        Some(date) if dates::is_past(&date, ctx.today) => {
            ev.failed_date_proposals += 1;
            if ev.failed_date_proposals >= MAX_FAILED_ROUNDS {
                return escalate(ctx, ev);
            }
            let weekday = dates::parse_iso(&date).map(|d| d.weekday());
            let alternatives = match weekday {
                Some(w) => dates::next_weekdays(ctx.today, w, 3),
                None => dates::upcoming_business_days(ctx.today, 21, 3),
            };
            let body = format!(
                "{} is already in the past, so I can't book it. The next comparable dates are:\n{}\n\nWould one of these work?",
                dates::display(&date),
                bullet_list(&alternatives)
            );
            StepResult::halt_with(vec![Draft::plain(body)])
        }
        Some(date) => {
            confirm_date(ctx, ev, det, date);
            StepResult::advance()
        }
        None => propose(ctx, ev, msg),
    }
}

fn confirm_date(ctx: &TurnCtx<'_>, ev: &mut EventRecord, det: &DetectionResult, date: String) {
    let changed = ev.chosen_date.as_deref() != Some(date.as_str());
    ev.chosen_date = Some(date.clone());
    ev.failed_date_proposals = 0;
    if let Some(start) = &det.entities.start_time {
        ev.profile.start_time = Some(start.clone());
    }
    if let Some(end) = &det.entities.end_time {
        ev.profile.end_time = Some(end.clone());
    }
    if changed {
        ctx.db
            .log_activity(&ctx.tenant, &ev.id, "high", "date_confirmed", Some(&date));
    }
    // A date change keeps the room lock; Step 3 re-verifies availability.
    ev.record_transition(3, "date_confirmed");
}

/// No usable date: derive candidates from weekday/month hints, fuzzy season
/// words, or plain upcoming business days.
fn propose(ctx: &TurnCtx<'_>, ev: &mut EventRecord, msg: &InboundMessage) -> StepResult {
    let lower = msg.body.to_lowercase();
    let preferred_weekday = lower
        .split(|c: char| !c.is_alphanumeric())
        .find_map(dates::weekday_from_name);
    let month = lower
        .split(|c: char| !c.is_alphanumeric())
        .find_map(dates::month_number)
        .or_else(|| season_months(&lower));

    let mut candidates: Vec<String> = Vec::new();
    if let Some(weekday) = preferred_weekday {
        // Preferred weekday first (tie-break 1), earliest future (tie-break 2).
        let mut d = ctx.today + Duration::days(1);
        let end = ctx.today + Duration::days(400);
        while d <= end && candidates.len() < MAX_SUGGESTIONS {
            if d.weekday() == weekday && month.is_none_or(|m| d.month() == m) {
                candidates.push(d.format("%Y-%m-%d").to_string());
            }
            d += Duration::days(1);
        }
    }
    if candidates.is_empty() && let Some(m) = month {
        let mut d = ctx.today + Duration::days(1);
        let end = ctx.today + Duration::days(400);
        while d <= end && candidates.len() < MAX_SUGGESTIONS {
            if d.month() == m && !matches!(d.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun) {
                candidates.push(d.format("%Y-%m-%d").to_string());
            }
            d += Duration::days(1);
        }
    }
    if candidates.is_empty() {
        candidates = dates::upcoming_business_days(ctx.today, 21, MAX_SUGGESTIONS);
    }
    candidates.truncate(MAX_SUGGESTIONS);

    ev.failed_date_proposals += 1;
    if ev.failed_date_proposals > MAX_FAILED_ROUNDS {
        return escalate(ctx, ev);
    }

    let body = format!(
        "Here are some dates that could work for your event:\n{}\n\nWhich one should I check for you? An exact date (e.g. 2026-06-12) works too.",
        bullet_list(&candidates)
    );
    StepResult::halt_with(vec![Draft::plain(body)])
}

fn escalate(ctx: &TurnCtx<'_>, ev: &mut EventRecord) -> StepResult {
    ctx.db.log_activity(
        &ctx.tenant,
        &ev.id,
        "high",
        "date_escalated_to_manager",
        Some(&format!("{} failed rounds", ev.failed_date_proposals)),
    );
    let draft = Draft {
        body: "Finding the right date is proving tricky, so I've looped in our events manager — \
               they'll follow up with tailored options shortly."
            .to_string(),
        body_markdown: Some(format!(
            "Date negotiation stuck after {} rounds for event {}. Please propose dates manually.",
            ev.failed_date_proposals, ev.id
        )),
        requires_approval: false,
        category: Some(TaskCategory::ManagerRequest),
        llm_generated: false,
    };
    StepResult::halt_with(vec![draft])
}

fn season_months(lower: &str) -> Option<u32> {
    // Fuzzy season hint resolves to the season's last month ("late spring").
    if lower.contains("spring") {
        Some(5)
    } else if lower.contains("summer") {
        Some(7)
    } else if lower.contains("autumn") || lower.contains("fall") {
        Some(10)
    } else if lower.contains("winter") {
        Some(12)
    } else {
        None
    }
}

fn bullet_list(dates_iso: &[String]) -> String {
    dates_iso
        .iter()
        .map(|d| format!("- {} ({})", dates::display(d), d))
        .collect::<Vec<_>>()
        .join("\n")
}
