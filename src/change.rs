use crate::models::*;

/// What a change request is bound to, once disambiguated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeTarget {
    Date(String),
    Room(String),
    Participants(u32),
    Requirements,
    SiteVisitDate(String),
}

#[derive(Debug, Clone)]
pub struct ChangeDecision {
    pub target: ChangeTarget,
    /// Which step the detour jumps back to.
    pub detour_step: u8,
    /// Appended when the target was inferred rather than named.
    pub disambiguation_note: Option<String>,
}

const REVISION_VERBS: &[&str] = &[
    "change", "switch", "reschedule", "instead", "actually", "move",
    "rather", "ändern", "stattdessen", "verschieben", "umbuchen",
];

const VARIABLE_WORDS_DATE: &[&str] = &["date", "day", "termin", "datum"];
const VARIABLE_WORDS_ROOM: &[&str] = &["room", "space", "raum"];
const VARIABLE_WORDS_PARTICIPANTS: &[&str] =
    &["participants", "people", "pax", "guests", "headcount", "teilnehmer"];
const VARIABLE_WORDS_REQUIREMENTS: &[&str] =
    &["layout", "setup", "requirements", "equipment", "bestuhlung"];
const VARIABLE_WORDS_SITE_VISIT: &[&str] = &["site visit", "visit", "tour", "viewing", "besichtigung"];

fn has_revision_signal(lower: &str) -> bool {
    REVISION_VERBS.iter().any(|v| lower.contains(v))
}

fn mentions(lower: &str, words: &[&str]) -> bool {
    words.iter().any(|w| {
        if w.contains(' ') {
            lower.contains(w)
        } else {
            lower
                .split(|c: char| !c.is_alphanumeric())
                .any(|tok| tok == *w)
        }
    })
}

/// Dual-condition change classifier: a message is a change request only with
/// BOTH a revision signal and a bound target (named variable or specific
/// value). Pure Q&A (question mark, no signal, no target) never detours.
///
/// A bare value without a type ("change to May 14") binds to the variable
/// whose value shape it matches, date first; the reply then carries a
/// disambiguation line when a site visit is in play.
pub fn classify(
    body: &str,
    detection: &DetectionResult,
    event: &EventRecord,
) -> Option<ChangeDecision> {
    // Acceptances skip change detection entirely.
    if detection.is_acceptance && detection.confidence >= 0.7 {
        return None;
    }

    let lower = body.to_lowercase();
    let revision = has_revision_signal(&lower);

    let names_date = mentions(&lower, VARIABLE_WORDS_DATE);
    let names_room = mentions(&lower, VARIABLE_WORDS_ROOM);
    let names_participants = mentions(&lower, VARIABLE_WORDS_PARTICIPANTS);
    let names_requirements = mentions(&lower, VARIABLE_WORDS_REQUIREMENTS);
    let names_site_visit = mentions(&lower, VARIABLE_WORDS_SITE_VISIT);

    let new_date = detection
        .entities
        .date
        .as_deref()
        .and_then(crate::dates::normalize);
    let new_room = detection.entities.room_preference.clone();
    let new_participants = detection.entities.participants;

    let has_value = new_date.is_some() || new_room.is_some() || new_participants.is_some();
    let has_named_variable =
        names_date || names_room || names_participants || names_requirements || names_site_visit;

    // Pure Q&A filter
    if lower.contains('?') && !revision && !has_value {
        return None;
    }
    if !revision || (!has_value && !has_named_variable) {
        return None;
    }

    // While a site-visit proposal is open, a mentioned date is a visit
    // preference, not an event-date change.
    if event.site_visit.status == SiteVisitStatus::Proposed
        && let Some(date) = &new_date
        && !names_date
    {
        return Some(ChangeDecision {
            target: ChangeTarget::SiteVisitDate(date.clone()),
            detour_step: 7,
            disambiguation_note: None,
        });
    }

    if names_site_visit && let Some(date) = &new_date {
        return Some(ChangeDecision {
            target: ChangeTarget::SiteVisitDate(date.clone()),
            detour_step: 7,
            disambiguation_note: None,
        });
    }

    // Explicitly named variables win over inference.
    if names_date || (new_date.is_some() && !names_room && !names_participants) {
        if let Some(date) = new_date {
            // No-op change: same date after ISO normalization.
            if event.chosen_date.as_deref() == Some(date.as_str()) {
                return None;
            }
            let note = if !names_date && event.site_visit.status != SiteVisitStatus::Idle {
                Some(
                    "If you meant the site visit date instead, please write 'change site visit date'."
                        .to_string(),
                )
            } else {
                None
            };
            return Some(ChangeDecision {
                target: ChangeTarget::Date(date),
                detour_step: 2,
                disambiguation_note: note,
            });
        }
        if names_date {
            // "we need another date" without a value: still a detour to Step 2.
            return Some(ChangeDecision {
                target: ChangeTarget::Date(String::new()),
                detour_step: 2,
                disambiguation_note: None,
            });
        }
    }

    if names_room || new_room.is_some() {
        let room = new_room.unwrap_or_default();
        return Some(ChangeDecision {
            target: ChangeTarget::Room(room),
            detour_step: 3,
            disambiguation_note: None,
        });
    }

    if names_participants || new_participants.is_some() {
        if let Some(n) = new_participants {
            if event.profile.participants == Some(n) {
                return None;
            }
            return Some(ChangeDecision {
                target: ChangeTarget::Participants(n),
                detour_step: 3,
                disambiguation_note: None,
            });
        }
        return Some(ChangeDecision {
            target: ChangeTarget::Participants(0),
            detour_step: 3,
            disambiguation_note: None,
        });
    }

    if names_requirements {
        return Some(ChangeDecision {
            target: ChangeTarget::Requirements,
            detour_step: 3,
            disambiguation_note: None,
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn event() -> EventRecord {
        let mut ev = EventRecord::new("t1", "a@b.com", "thread-1");
        ev.current_step = 4;
        ev.chosen_date = Some("2026-06-14".to_string());
        ev.locked_room_id = Some("room_a".to_string());
        ev
    }

    fn detect(body: &str) -> DetectionResult {
        crate::detect::heuristic_unified(body, NaiveDate::from_ymd_opt(2026, 1, 10).unwrap())
    }

    #[test]
    fn change_with_date_value_detours_to_step_2() {
        let body = "Change to June 25, 2026.";
        let decision = classify(body, &detect(body), &event()).unwrap();
        assert_eq!(decision.target, ChangeTarget::Date("2026-06-25".to_string()));
        assert_eq!(decision.detour_step, 2);
    }

    #[test]
    fn question_without_revision_is_not_a_change() {
        let body = "Is the room available on other dates?";
        assert!(classify(body, &detect(body), &event()).is_none());
    }

    #[test]
    fn revision_verb_without_target_is_not_a_change() {
        let body = "Actually, let me think about it.";
        assert!(classify(body, &detect(body), &event()).is_none());
    }

    #[test]
    fn same_date_after_normalization_is_a_noop() {
        let body = "Let's switch to June 14, 2026 instead";
        assert!(classify(body, &detect(body), &event()).is_none());
    }

    #[test]
    fn room_change_detours_to_step_3() {
        let body = "Could we switch to Room C instead?";
        let decision = classify(body, &detect(body), &event()).unwrap();
        assert_eq!(decision.target, ChangeTarget::Room("Room C".to_string()));
        assert_eq!(decision.detour_step, 3);
    }

    #[test]
    fn date_while_site_visit_proposed_is_a_visit_preference() {
        let body = "Let's switch it to 2026-06-10";
        let mut ev = event();
        ev.site_visit.status = SiteVisitStatus::Proposed;
        let decision = classify(body, &detect(body), &ev).unwrap();
        assert_eq!(
            decision.target,
            ChangeTarget::SiteVisitDate("2026-06-10".to_string())
        );
    }

    #[test]
    fn acceptance_skips_change_detection() {
        let body = "Sounds good, we'll take it — actually the date works great";
        let mut det = detect(body);
        det.is_acceptance = true;
        det.confidence = 0.9;
        assert!(classify(body, &det, &event()).is_none());
    }

    #[test]
    fn ambiguous_date_gets_disambiguation_note() {
        let body = "Please change to May 14, 2026";
        let mut ev = event();
        ev.site_visit.status = SiteVisitStatus::Scheduled;
        let decision = classify(body, &detect(body), &ev).unwrap();
        assert!(decision.disambiguation_note.is_some());
    }
}
