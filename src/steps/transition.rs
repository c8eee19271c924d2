use super::TurnCtx;
use crate::compose;
use crate::gate;
use crate::models::*;

/// Step 6 — Transition: the gate-keeping step between negotiation and
/// confirmation. Prompts for whatever prerequisite is still missing and
/// advances the moment the gate passes. Reminders here are deterministic
/// (plain verbalization only).
pub fn handle(
    ctx: &TurnCtx<'_>,
    ev: &mut EventRecord,
    _msg: &InboundMessage,
    _det: &DetectionResult,
) -> StepResult {
    let status = gate::check_confirmation_gate(ev);
    match gate::missing_prerequisite(&status) {
        None => {
            ev.record_transition(7, "gate_passed");
            StepResult::advance()
        }
        Some("acceptance") => {
            // Can only happen via a guard violation; fall back to the offer.
            StepResult {
                drafts: Vec::new(),
                action: StepAction::Detour { target: 4, reason: "guard_missing_acceptance" },
                halt: false,
            }
        }
        Some("billing") => {
            ev.awaiting_billing_for_accept = true;
            ev.record_transition(5, "awaiting_billing");
            StepResult::halt_with(vec![Draft::plain(
                "Almost there — I just need your billing address (company if applicable, \
                 street, postal code and city) to prepare the contract.",
            )])
        }
        _ => {
            let amount = compose::format_money(ev.deposit.amount);
            let due = ev.deposit.due_date.clone().unwrap_or_else(|| "-".to_string());
            ctx.db
                .log_activity(&ctx.tenant, &ev.id, "detailed", "deposit_reminder", Some(&due));
            StepResult::halt_with(vec![Draft::plain(format!(
                "One last step: a deposit of {amount} is due by {due} to lock in your booking.\n\
                 You can settle it here: /api/v1/events/deposit/pay (event {id}).\n\
                 The moment it arrives, you'll receive your confirmation.",
                id = ev.id
            ))])
        }
    }
}
