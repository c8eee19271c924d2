use super::{TurnCtx, hybrid_append, qna_answer};
use crate::compose;
use crate::gate;
use crate::models::*;

/// Counter-proposal rounds before a manager takes over.
const MAX_COUNTER_ROUNDS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NegotiationIntent {
    // Order encodes the tie-break: ACCEPT > DECLINE > COUNTER > QUESTION.
    Question,
    Counter,
    Decline,
    Accept,
}

const COUNTER_PHRASES: &[&str] = &[
    "discount",
    "cheaper",
    "lower price",
    "too expensive",
    "over our budget",
    "over budget",
    "can you do",
    "best price",
    "günstiger",
];

/// All intents present in the message with confidences; ties break toward
/// the stronger commitment.
pub fn collect_detected_intents(det: &DetectionResult, body: &str) -> Vec<(NegotiationIntent, f64)> {
    let lower = body.to_lowercase();
    let mut intents = Vec::new();
    if det.is_acceptance || det.is_confirmation {
        intents.push((NegotiationIntent::Accept, det.confidence));
    }
    if det.is_rejection {
        intents.push((NegotiationIntent::Decline, det.confidence));
    }
    if COUNTER_PHRASES.iter().any(|p| lower.contains(p)) {
        intents.push((NegotiationIntent::Counter, 0.8));
    }
    if det.is_question {
        intents.push((NegotiationIntent::Question, 0.6));
    }
    intents
}

fn winning_intent(intents: &[(NegotiationIntent, f64)]) -> Option<NegotiationIntent> {
    intents
        .iter()
        .max_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        })
        .map(|(intent, _)| *intent)
}

/// Step 5 — Negotiation: accept / decline / counter, plus the billing
/// capture loop after an acceptance.
pub fn handle(
    ctx: &TurnCtx<'_>,
    ev: &mut EventRecord,
    msg: &InboundMessage,
    det: &DetectionResult,
) -> StepResult {
    // Billing just arrived for an earlier acceptance (captured in pre-route).
    if ev.awaiting_billing_for_accept && ev.billing.is_complete() {
        ev.awaiting_billing_for_accept = false;
        ctx.db
            .log_activity(&ctx.tenant, &ev.id, "high", "billing_received", None);
        ev.record_transition(6, "billing_complete");
        return StepResult::advance();
    }

    let intents = collect_detected_intents(det, &msg.body);
    match winning_intent(&intents) {
        Some(NegotiationIntent::Accept) => accept(ctx, ev, msg, det),
        Some(NegotiationIntent::Decline) => {
            ev.offer_accepted = false;
            ctx.db
                .log_activity(&ctx.tenant, &ev.id, "high", "offer_declined", None);
            StepResult::halt_with(vec![Draft::plain(
                "Understood — thanks for letting us know. If budget, date or setup was the \
                 sticking point, tell us and we'll gladly put together an alternative.",
            )])
        }
        Some(NegotiationIntent::Counter) => counter(ctx, ev),
        Some(NegotiationIntent::Question) => {
            let answer = qna_answer(ctx, ev, det, &msg.body)
                .unwrap_or_else(|| "Happy to clarify anything about the offer.".to_string());
            StepResult::halt_with(vec![Draft::plain(answer)])
        }
        None if ev.awaiting_billing_for_accept => StepResult::halt_with(vec![Draft::plain(
            billing_prompt(),
        )]),
        None => StepResult::halt_with(vec![Draft::plain(
            "Should I book it as offered, or would you like to adjust anything first?",
        )]),
    }
}

fn accept(
    ctx: &TurnCtx<'_>,
    ev: &mut EventRecord,
    msg: &InboundMessage,
    det: &DetectionResult,
) -> StepResult {
    ev.offer_accepted = true;
    ctx.db
        .log_activity(&ctx.tenant, &ev.id, "high", "offer_accepted", None);

    let status = gate::check_confirmation_gate(ev);
    match gate::missing_prerequisite(&status) {
        Some("billing") => {
            ev.awaiting_billing_for_accept = true;
            let reply = hybrid_append(billing_prompt(), qna_answer(ctx, ev, det, &msg.body));
            StepResult::halt_with(vec![Draft::plain(reply)])
        }
        Some("deposit") => {
            // Step 6 issues the deposit reminder.
            ev.record_transition(6, "accepted_awaiting_deposit");
            StepResult::advance()
        }
        _ => {
            ev.record_transition(7, "gate_passed");
            StepResult::advance()
        }
    }
}

fn counter(ctx: &TurnCtx<'_>, ev: &mut EventRecord) -> StepResult {
    ev.counter_rounds += 1;
    if ev.counter_rounds > MAX_COUNTER_ROUNDS {
        ctx.db.log_activity(
            &ctx.tenant,
            &ev.id,
            "high",
            "negotiation_escalated",
            Some(&format!("{} rounds", ev.counter_rounds)),
        );
        return StepResult::halt_with(vec![Draft {
            body: "I've passed your request to our events manager — they have more room on \
                   pricing than I do and will come back to you directly."
                .to_string(),
            body_markdown: Some(format!(
                "Negotiation for event {} exceeded {} counter rounds. Manual pricing decision needed.",
                ev.id, MAX_COUNTER_ROUNDS
            )),
            requires_approval: false,
            category: Some(TaskCategory::ManagerRequest),
            llm_generated: false,
        }]);
    }

    let deposit_note = if ev.deposit.required {
        format!(
            " The deposit of {} stays unchanged.",
            compose::format_money(ev.deposit.amount)
        )
    } else {
        String::new()
    };
    StepResult::halt_with(vec![Draft::plain(format!(
        "Our room rates are fixed, but we can trim the package: a lighter catering line or \
         fewer add-ons usually brings the total down quickly.{deposit_note} Which items should I adjust?"
    ))])
}

fn billing_prompt() -> String {
    "Wonderful — to prepare the contract I just need your billing address \
     (company if applicable, street, postal code and city)."
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tie_breaks_toward_accept() {
        let mut det = DetectionResult::empty(Intent::Acceptance);
        det.is_acceptance = true;
        det.is_rejection = true;
        det.confidence = 0.8;
        let intents = collect_detected_intents(&det, "we accept, though we must decline the wine");
        assert_eq!(winning_intent(&intents), Some(NegotiationIntent::Accept));
    }

    #[test]
    fn counter_beats_question() {
        let mut det = DetectionResult::empty(Intent::Question);
        det.is_question = true;
        det.confidence = 0.6;
        let intents = collect_detected_intents(&det, "can you do a discount on the total?");
        assert_eq!(winning_intent(&intents), Some(NegotiationIntent::Counter));
    }
}
