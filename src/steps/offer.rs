use super::{TurnCtx, hybrid_append, qna_allowed, qna_answer};
use crate::compose::{self, HardFacts};
use crate::dates;
use crate::models::*;
use sha2::{Digest, Sha256};

pub struct OfferLine {
    pub label: String,
    pub unit_price: f64,
    pub unit: String,
    pub quantity: u32,
    pub total: f64,
}

pub struct ComposedOffer {
    pub lines: Vec<OfferLine>,
    pub total: f64,
    pub body: String,
    pub facts: HardFacts,
    pub hash: String,
}

/// Build the structured offer: room, products, totals, deposit line.
/// The body is emitted verbatim — never verbalized.
pub fn compose_offer(ctx: &TurnCtx<'_>, ev: &mut EventRecord) -> Option<ComposedOffer> {
    let room = ctx.catalog.room(ev.locked_room_id.as_deref()?)?;
    let date = ev.chosen_date.clone()?;
    let participants = ev.profile.participants.unwrap_or(1);

    let mut lines = vec![OfferLine {
        label: format!("{} (room hire)", room.name),
        unit_price: room.unit_price,
        unit: "per event".to_string(),
        quantity: 1,
        total: room.unit_price,
    }];

    let available = ctx.catalog.products_for(Some(date.as_str()), Some(room.id.as_str()));
    for wish in &ev.profile.product_wishes {
        let Some(product) = available
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(wish) || wish.to_lowercase().contains(&p.name.to_lowercase()))
        else {
            continue;
        };
        let quantity = match product.unit {
            crate::catalog::ProductUnit::PerPerson => participants,
            crate::catalog::ProductUnit::PerEvent => 1,
        };
        lines.push(OfferLine {
            label: product.name.clone(),
            unit_price: product.price,
            unit: product.unit.label().to_string(),
            quantity,
            total: product.price * quantity as f64,
        });
    }

    let total: f64 = lines.iter().map(|l| l.total).sum();

    // Deposit per tenant policy; the due date tracks the event date.
    let policy = &ctx.catalog.deposit;
    if policy.required {
        let amount = policy.amount_for(total);
        ev.deposit = DepositInfo {
            required: true,
            amount,
            due_date: Some(dates::deposit_due_date(ctx.today, &date, policy.deadline_days)),
            paid: ev.deposit.paid,
            paid_at: ev.deposit.paid_at.clone(),
        };
    } else {
        ev.deposit = DepositInfo::default();
    }

    let window = match (&ev.profile.start_time, &ev.profile.end_time) {
        (Some(s), Some(e)) => format!("{s}–{e}"),
        (Some(s), None) => format!("from {s}"),
        _ => "full day".to_string(),
    };

    let mut body = String::new();
    body.push_str(&format!("Offer — {}\n", ctx.catalog.venue_name));
    body.push_str(&format!("Date: {date}\n"));
    body.push_str(&format!("Room: {} (up to {} guests)\n", room.name, room.capacity_max));
    body.push_str(&format!("Time: {window}\n"));
    body.push_str(&format!("Participants: {participants}\n\n"));
    for line in &lines {
        if line.quantity > 1 {
            body.push_str(&format!(
                "- {} — {} {} × {} = {}\n",
                line.label,
                compose::format_money(line.unit_price),
                line.unit,
                line.quantity,
                compose::format_money(line.total)
            ));
        } else {
            body.push_str(&format!(
                "- {} — {} ({})\n",
                line.label,
                compose::format_money(line.total),
                line.unit
            ));
        }
    }
    body.push_str(&format!("\nTotal: {}\n", compose::format_money(total)));
    if ev.deposit.required {
        body.push_str(&format!(
            "Deposit: {} due by {}\n",
            compose::format_money(ev.deposit.amount),
            ev.deposit.due_date.as_deref().unwrap_or("-")
        ));
    }

    let facts = HardFacts {
        dates: {
            let mut d = vec![date.clone()];
            if let Some(due) = &ev.deposit.due_date
                && ev.deposit.required
            {
                d.push(due.clone());
            }
            d
        },
        prices: {
            let mut p: Vec<String> = lines.iter().map(|l| compose::format_money(l.total)).collect();
            p.extend(lines.iter().map(|l| compose::format_money(l.unit_price)));
            p.push(compose::format_money(total));
            if ev.deposit.required {
                p.push(compose::format_money(ev.deposit.amount));
            }
            p.sort();
            p.dedup();
            p
        },
        product_units: lines
            .iter()
            .map(|l| (l.label.clone(), l.unit.clone()))
            .collect(),
        room_names: vec![room.name.clone()],
    };

    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    let hash = hex::encode(&hasher.finalize()[..8]);

    Some(ComposedOffer {
        lines,
        total,
        body,
        facts,
        hash,
    })
}

/// Step 4 — Offer.
pub fn handle(
    ctx: &TurnCtx<'_>,
    ev: &mut EventRecord,
    msg: &InboundMessage,
    det: &DetectionResult,
) -> StepResult {
    // Acceptance of an already-sent offer skips straight to negotiation.
    if det.is_acceptance && ev.offer_hash.is_some() {
        ev.record_transition(5, "offer_accepted");
        return StepResult::advance();
    }

    // A pure question about an offer that's already out doesn't re-send it.
    if qna_allowed(ev, det)
        && ev.offer_hash.is_some()
        && let Some(answer) = qna_answer(ctx, ev, det, &msg.body)
    {
        return StepResult::halt_with(vec![Draft::plain(answer)]);
    }

    // Product wishes mentioned this turn flow into the offer.
    capture_product_wishes(ctx, ev, &msg.body);

    let Some(offer) = compose_offer(ctx, ev) else {
        return StepResult {
            drafts: Vec::new(),
            action: StepAction::Detour { target: 3, reason: "guard_missing_room" },
            halt: false,
        };
    };

    let refreshed = ev.offer_hash.as_deref() != Some(offer.hash.as_str());
    ev.offer_hash = Some(offer.hash.clone());
    if refreshed {
        ctx.db
            .log_activity(&ctx.tenant, &ev.id, "high", "offer_prepared", None);
    }

    let intro = match ev.room_confirmation_prefix.take() {
        Some(prefix) => format!("{prefix} Here is your offer:"),
        None => "Here is your updated offer:".to_string(),
    };
    let verbalized = ctx.verbalize(&intro, &offer.body, &offer.facts);

    let mut reply = format!("{}\n\n{}", verbalized.text, offer.body);
    if det.is_question {
        reply = hybrid_append(reply, qna_answer(ctx, ev, det, &msg.body));
    }
    reply.push_str(&compose::footer_live(&ev.id));

    StepResult::halt_with(vec![Draft {
        body: reply,
        body_markdown: None,
        requires_approval: ctx.hil.offer_approval,
        category: Some(TaskCategory::OfferMessage),
        llm_generated: verbalized.llm_generated,
    }])
}

fn capture_product_wishes(ctx: &TurnCtx<'_>, ev: &mut EventRecord, body: &str) {
    let lower = body.to_lowercase();
    for product in &ctx.catalog.products {
        if lower.contains(&product.name.to_lowercase())
            && !ev
                .profile
                .product_wishes
                .iter()
                .any(|w| w.eq_ignore_ascii_case(&product.name))
        {
            ev.profile.product_wishes.push(product.name.clone());
        }
    }
}
