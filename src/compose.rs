use crate::dates;
use crate::db::Db;
use crate::llm::Llm;
use crate::models::FallbackContext;
use log::warn;

/// Chat bodies longer than this get summarized behind a snapshot link.
const SNAPSHOT_THRESHOLD: usize = 400;
/// Snapshot retention.
const SNAPSHOT_TTL_DAYS: i64 = 7;

pub fn format_money(amount: f64) -> String {
    format!("€{amount:.2}")
}

/// The protected facts a tone rewrite must carry through verbatim.
#[derive(Debug, Clone, Default)]
pub struct HardFacts {
    pub dates: Vec<String>,
    pub prices: Vec<String>,
    /// (product name, unit label) pairs; the unit is a protected fact.
    pub product_units: Vec<(String, String)>,
    pub room_names: Vec<String>,
}

impl HardFacts {
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
            && self.prices.is_empty()
            && self.product_units.is_empty()
            && self.room_names.is_empty()
    }
}

// --- Verification ---

/// Every ISO or verbal date found in `text`, normalized.
fn scan_dates(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let tokens: Vec<&str> = text.split_whitespace().collect();
    for width in 1..=4usize {
        if tokens.len() < width {
            break;
        }
        for window in tokens.windows(width) {
            let candidate = window.join(" ");
            let candidate = candidate.trim_end_matches(['.', ',', '!', '?', ':']);
            if let Some(iso) = dates::normalize(candidate)
                && !out.contains(&iso)
            {
                out.push(iso);
            }
        }
    }
    out
}

/// Every money token ("€1234.00") found in `text`.
fn scan_money(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter_map(|tok| {
            let tok = tok
                .trim_start_matches(['(', ','])
                .trim_end_matches(['.', ',', ';', ')', '!', '?']);
            if tok.starts_with('€') && tok.len() > 1 {
                Some(tok.to_string())
            } else {
                None
            }
        })
        .collect()
}

/// Check a candidate text against the hard-facts bundle. Returns the failed
/// conditions (empty = verified).
pub fn verify(candidate: &str, facts: &HardFacts) -> Vec<String> {
    let mut failed = Vec::new();

    for date in &facts.dates {
        let verbal = dates::display(date);
        if !candidate.contains(date.as_str()) && !candidate.contains(&verbal) {
            failed.push(format!("missing_date:{date}"));
        }
    }
    for price in &facts.prices {
        if !candidate.contains(price.as_str()) {
            failed.push(format!("missing_price:{price}"));
        }
    }
    for room in &facts.room_names {
        if !candidate.contains(room.as_str()) {
            failed.push(format!("missing_room:{room}"));
        }
    }
    for (product, unit) in &facts.product_units {
        if !candidate.contains(product.as_str()) {
            failed.push(format!("missing_product:{product}"));
            continue;
        }
        // The unit on the product's line must not be swapped.
        for line in candidate.lines().filter(|l| l.contains(product.as_str())) {
            let wrong = other_unit(unit);
            if line.contains(wrong) && !line.contains(unit.as_str()) {
                failed.push(format!("unit_swapped:{product}"));
            }
        }
    }

    // Invented facts: any date or money token not in the bundle is a fail.
    for found in scan_dates(candidate) {
        let known = facts.dates.iter().any(|d| *d == found);
        if !known {
            failed.push(format!("invented_date:{found}"));
        }
    }
    for found in scan_money(candidate) {
        let known = facts.prices.iter().any(|p| *p == found);
        if !known {
            failed.push(format!("invented_price:{found}"));
        }
    }

    failed
}

fn other_unit(unit: &str) -> &'static str {
    if unit == "per person" { "per event" } else { "per person" }
}

/// Fix single-unit swaps in place; anything else is left for the template
/// fallback.
pub fn surgical_patch(candidate: &str, facts: &HardFacts) -> String {
    let mut lines: Vec<String> = candidate.lines().map(String::from).collect();
    for (product, unit) in &facts.product_units {
        let wrong = other_unit(unit);
        for line in lines.iter_mut().filter(|l| l.contains(product.as_str())) {
            if line.contains(wrong) && !line.contains(unit.as_str()) {
                *line = line.replace(wrong, unit);
            }
        }
    }
    lines.join("\n")
}

// --- Verbalization ---

/// Tone instructions: tenant `prompts` config may override the register,
/// never the facts. The `### TEXT TO REWRITE` marker is load-bearing for
/// the stub provider.
fn tone_prompt(tone_override: Option<&str>, intro: &str) -> String {
    let tone = tone_override.unwrap_or(
        "Warm, professional, concise. Address the client directly. Two sentences at most.",
    );
    format!(
        "Rewrite the text below in the venue's voice for a booking email.\n\
         Tone: {tone}\n\
         Keep every date, price, room name and product name EXACTLY as written.\n\
         Do not add new dates, prices or commitments.\n\
         ### TEXT TO REWRITE\n{intro}"
    )
}

/// Outcome of one verbalization: final intro text plus whether an LLM
/// actually produced it (relevant for the ai_reply_approval routing).
pub struct Verbalized {
    pub text: String,
    pub llm_generated: bool,
    pub fallback: Option<FallbackContext>,
}

/// The safety sandwich: rewrite only the intro, verify intro+body against
/// the bundle, patch a unit swap, fall back to the deterministic intro.
pub fn empathetic(
    llm: &Llm<'_>,
    tone_override: Option<&str>,
    intro: &str,
    attached_body: &str,
    facts: &HardFacts,
) -> Verbalized {
    let candidate = match llm.complete(&tone_prompt(tone_override, intro)) {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) | Err(_) => {
            return Verbalized {
                text: intro.to_string(),
                llm_generated: false,
                fallback: Some(FallbackContext {
                    source: "verbalizer".to_string(),
                    trigger: "llm_unavailable".to_string(),
                    failed_conditions: Vec::new(),
                    context: None,
                    original_error: None,
                }),
            };
        }
    };

    let full = |intro_text: &str| {
        if attached_body.is_empty() {
            intro_text.to_string()
        } else {
            format!("{intro_text}\n{attached_body}")
        }
    };

    let failed = verify(&full(&candidate), facts);
    if failed.is_empty() {
        return Verbalized {
            text: candidate,
            llm_generated: true,
            fallback: None,
        };
    }

    let patched = surgical_patch(&candidate, facts);
    let failed_after_patch = verify(&full(&patched), facts);
    if failed_after_patch.is_empty() {
        return Verbalized {
            text: patched,
            llm_generated: true,
            fallback: None,
        };
    }

    warn!("verbalizer output failed verification: {failed_after_patch:?}");
    Verbalized {
        text: intro.to_string(),
        llm_generated: false,
        fallback: Some(FallbackContext {
            source: "verbalizer".to_string(),
            trigger: "fact_verification_failed".to_string(),
            failed_conditions: failed_after_patch,
            context: None,
            original_error: None,
        }),
    }
}

// --- Footer, snapshots, fallbacks ---

/// Info-page link: live query link for ongoing events, snapshot id for
/// point-in-time data.
pub fn footer_live(event_id: &str) -> String {
    format!("\n\n—\nDetails and live status: /info?event={event_id}")
}

pub fn footer_snapshot(snapshot_id: &str) -> String {
    format!("\n\n—\nFull details: /api/v1/info/{snapshot_id}")
}

/// Long catalog answers go behind a snapshot link; short ones stay inline.
pub fn snapshot_or_inline(
    db: &Db,
    tenant: &str,
    kind: &str,
    summary: &str,
    full_content: &str,
) -> String {
    if full_content.len() <= SNAPSHOT_THRESHOLD {
        return full_content.to_string();
    }
    let payload = serde_json::json!({ "kind": kind, "content": full_content });
    match db.insert_snapshot(tenant, kind, &payload, SNAPSHOT_TTL_DAYS) {
        Ok(id) => format!("{summary}{}", footer_snapshot(&id)),
        Err(e) => {
            warn!("snapshot store failed, inlining content: {e}");
            full_content.to_string()
        }
    }
}

pub fn security_refusal() -> String {
    "I can only help with venue bookings and related questions. \
     Let me know your event date, headcount or any question about our rooms."
        .to_string()
}

/// Context-aware empty-reply safety net, keyed by the step the routing loop
/// ended on.
pub fn fallback_for_step(step: u8) -> String {
    match step {
        1 => "Thanks for reaching out! Could you share your preferred date and the number of guests?",
        2 => "I'm checking our calendar for suitable dates and will follow up shortly.",
        3 => "I'm reviewing room availability for your date and will get back to you right away.",
        4 => "I'm preparing your offer and will send it over shortly.",
        5 => "I'm reviewing the details of your offer — one moment please.",
        6 => "We're finalizing the remaining booking details and will confirm shortly.",
        _ => "We're finalizing your booking — you'll hear from us very soon.",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> HardFacts {
        HardFacts {
            dates: vec!["2026-02-15".to_string()],
            prices: vec!["€850.00".to_string()],
            product_units: vec![("Coffee Break".to_string(), "per person".to_string())],
            room_names: vec!["Room B".to_string()],
        }
    }

    #[test]
    fn verify_passes_when_all_facts_present() {
        let text = "Offer for Room B on 2026-02-15\nCoffee Break — €9.50 per person\nTotal: €850.00";
        let mut f = facts();
        f.prices.push("€9.50".to_string());
        assert!(verify(text, &f).is_empty());
    }

    #[test]
    fn verify_flags_missing_room_and_invented_price() {
        let text = "Your offer for 2026-02-15 comes to €999.00.";
        let failed = verify(text, &facts());
        assert!(failed.iter().any(|f| f.starts_with("missing_room")));
        assert!(failed.iter().any(|f| f.starts_with("invented_price")));
    }

    #[test]
    fn verify_flags_invented_date() {
        let text = "Room B is reserved for 2026-02-15 and 2026-02-16. Total €850.00. Coffee Break per person.";
        let failed = verify(text, &facts());
        assert_eq!(failed, vec!["invented_date:2026-02-16".to_string()]);
    }

    #[test]
    fn unit_swap_is_patched() {
        let text = "Room B on 2026-02-15, €850.00 total\nCoffee Break — per event";
        let failed = verify(text, &facts());
        assert!(failed.iter().any(|f| f.starts_with("unit_swapped")));
        let patched = surgical_patch(text, &facts());
        assert!(verify(&patched, &facts()).is_empty());
        assert!(patched.contains("per person"));
    }

    #[test]
    fn verbal_date_form_satisfies_the_bundle() {
        let text = "Room B is yours on February 15, 2026 — total €850.00, Coffee Break per person.";
        assert!(verify(text, &facts()).is_empty());
    }
}
