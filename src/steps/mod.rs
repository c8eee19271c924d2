// Step handler decomposition — one file per workflow step.
// Shared contract (context, dispatch table, Q&A helpers) lives here.

pub mod confirmation;
pub mod date;
pub mod intake;
pub mod negotiation;
pub mod offer;
pub mod room;
pub mod transition;

use crate::catalog::Catalog;
use crate::db::Db;
use crate::llm::Llm;
use crate::models::*;
use chrono::NaiveDate;

/// Tenant HIL toggles (config section `hil-mode`).
#[derive(Debug, Clone, Default)]
pub struct HilConfig {
    pub offer_approval: bool,
    pub confirmation_approval: bool,
    pub all_llm_replies: bool,
    /// Dev-mode continue-vs-reset choice gating (tenant flag).
    pub dev_choice: bool,
}

impl HilConfig {
    pub fn from_config(value: Option<&serde_json::Value>) -> Self {
        let get = |key: &str| {
            value
                .and_then(|v| v.get(key))
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
        };
        HilConfig {
            offer_approval: get("offer_approval"),
            confirmation_approval: get("confirmation_approval"),
            all_llm_replies: get("hil_all_llm_replies"),
            dev_choice: get("dev_choice"),
        }
    }
}

/// Request-scoped context threaded into every step handler. Tenant-scoped
/// handles only — no process globals.
pub struct TurnCtx<'a> {
    pub db: &'a Db,
    pub catalog: Catalog,
    pub llm: Llm<'a>,
    pub tenant: String,
    pub today: NaiveDate,
    pub hil: HilConfig,
    pub tone_override: Option<String>,
}

impl TurnCtx<'_> {
    pub fn verbalize(&self, intro: &str, body: &str, facts: &crate::compose::HardFacts) -> crate::compose::Verbalized {
        crate::compose::empathetic(&self.llm, self.tone_override.as_deref(), intro, body, facts)
    }
}

/// Handler table keyed by step number.
pub fn dispatch(
    step: u8,
    ctx: &TurnCtx<'_>,
    ev: &mut EventRecord,
    msg: &InboundMessage,
    det: &DetectionResult,
) -> StepResult {
    let handler: fn(&TurnCtx<'_>, &mut EventRecord, &InboundMessage, &DetectionResult) -> StepResult =
        match step {
            1 => intake::handle,
            2 => date::handle,
            3 => room::handle,
            4 => offer::handle,
            5 => negotiation::handle,
            6 => transition::handle,
            _ => confirmation::handle,
        };
    handler(ctx, ev, msg, det)
}

/// Entry gate: step S requires step S−1's commitments. Returns the step the
/// router must actually dispatch (the missing-prerequisite step).
pub fn entry_gate(step: u8, ev: &EventRecord) -> u8 {
    if step >= 3 && ev.chosen_date.is_none() {
        return 2;
    }
    if step >= 4 && ev.locked_room_id.is_none() {
        return 3;
    }
    step
}

/// Whether a step may answer a pure Q&A without running workflow logic.
/// Detours always produce a workflow response.
pub fn qna_allowed(ev: &EventRecord, det: &DetectionResult) -> bool {
    ev.caller_step.is_none() && !det.has_action_signal() && det.is_question
}

/// Workflow body first, Q&A answer after a separator.
pub fn hybrid_append(workflow_reply: String, qna: Option<String>) -> String {
    match qna {
        Some(answer) if !answer.is_empty() => format!("{workflow_reply}\n\n---\n{answer}"),
        _ => workflow_reply,
    }
}

/// Catalog/FAQ-grounded answer for the detected Q&A types.
pub fn qna_answer(ctx: &TurnCtx<'_>, ev: &EventRecord, det: &DetectionResult, body: &str) -> Option<String> {
    if det.qna_types.is_empty() {
        return None;
    }
    let mut parts: Vec<String> = Vec::new();

    for qna in &det.qna_types {
        match qna {
            QnaType::Products => {
                let products = ctx
                    .catalog
                    .products_for(ev.chosen_date.as_deref(), ev.locked_room_id.as_deref());
                let full = products
                    .iter()
                    .map(|p| {
                        format!(
                            "- {} — {} {}",
                            p.name,
                            crate::compose::format_money(p.price),
                            p.unit.label()
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                let full = format!("Yes — our current catering and add-ons:\n{full}");
                parts.push(crate::compose::snapshot_or_inline(
                    ctx.db,
                    &ctx.tenant,
                    "products",
                    "Yes — we offer catering, beverages and equipment packages.",
                    &full,
                ));
            }
            QnaType::Rooms => {
                let full = ctx
                    .catalog
                    .rooms
                    .iter()
                    .map(|r| format!("- {} — up to {} guests", r.name, r.capacity_max))
                    .collect::<Vec<_>>()
                    .join("\n");
                let full = format!("Our rooms:\n{full}");
                parts.push(crate::compose::snapshot_or_inline(
                    ctx.db,
                    &ctx.tenant,
                    "rooms",
                    "We have five rooms from boardroom size up to 200 guests.",
                    &full,
                ));
            }
            QnaType::Pricing => {
                let full = ctx
                    .catalog
                    .rooms
                    .iter()
                    .map(|r| format!("- {} — {} per event", r.name, crate::compose::format_money(r.unit_price)))
                    .collect::<Vec<_>>()
                    .join("\n");
                parts.push(crate::compose::snapshot_or_inline(
                    ctx.db,
                    &ctx.tenant,
                    "pricing",
                    "Room hire starts at €380 per event; happy to send a tailored offer.",
                    &format!("Room hire rates:\n{full}"),
                ));
            }
            QnaType::Availability => {
                parts.push(match &ev.chosen_date {
                    Some(d) => format!(
                        "I'm holding {} for you — availability is re-checked at every step.",
                        crate::dates::display(d)
                    ),
                    None => "Share a date and I'll check availability right away.".to_string(),
                });
            }
            QnaType::SiteVisit => {
                parts.push(
                    "You're welcome to visit the venue before your event — I can propose a few dates once your booking date is set."
                        .to_string(),
                );
            }
            QnaType::General => {
                if let Some(answer) = faq_answer(&ctx.catalog, body) {
                    parts.push(answer);
                }
            }
        }
    }

    // FAQ hits ride along regardless of the detected Q&A type.
    if let Some(answer) = faq_answer(&ctx.catalog, body)
        && !parts.contains(&answer)
    {
        parts.push(answer);
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

fn faq_answer(catalog: &Catalog, body: &str) -> Option<String> {
    let lower = body.to_lowercase();
    catalog
        .faq
        .iter()
        .find(|entry| entry.keywords.iter().any(|k| lower.contains(k.as_str())))
        .map(|entry| entry.answer.clone())
}
