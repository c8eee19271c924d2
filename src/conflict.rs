use crate::db::Db;
use crate::error::Result;
use crate::models::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// Both events hold the room as option. Both proceed; the manager gets
    /// a notification task; neither client is informed.
    Soft { other_event_id: String },
    /// The other side holds an option and this event wants to confirm.
    /// Block the confirmation and escalate to a manager decision.
    HardAgainstOption { other_event_id: String },
    /// The other side already confirmed. Block outright, no task.
    HardAgainstConfirmed { other_event_id: String },
}

/// Action the losing event is redirected to after a manager decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoserRedirect {
    /// Date was the conflicting dimension → pick a new date.
    Step2,
    /// Room was the conflicting dimension → re-pick with the room excluded.
    Step3,
}

/// Check what holding/confirming (date, room) for `event` collides with.
///
/// `confirming` distinguishes an option hold (soft path possible) from a
/// confirmation attempt (always hard when contested). Uses a snapshot of
/// concurrent events, not a coordinated transaction.
pub fn detect(
    db: &Db,
    event: &EventRecord,
    date: &str,
    room_id: &str,
    confirming: bool,
) -> Result<Option<Conflict>> {
    let holders = db.events_holding(&event.tenant_id, date, room_id, &event.id)?;

    let confirmed = holders.iter().find(|e| e.status == EventStatus::Confirmed);
    if let Some(other) = confirmed {
        return Ok(Some(Conflict::HardAgainstConfirmed {
            other_event_id: other.id.clone(),
        }));
    }

    let option_holder = holders.iter().find(|e| e.status == EventStatus::Option);
    if let Some(other) = option_holder {
        return Ok(Some(if confirming {
            Conflict::HardAgainstOption {
                other_event_id: other.id.clone(),
            }
        } else {
            Conflict::Soft {
                other_event_id: other.id.clone(),
            }
        }));
    }

    Ok(None)
}

/// Where the losing side goes after the manager picks a winner.
pub fn loser_redirect(loser: &EventRecord, winner: &EventRecord) -> LoserRedirect {
    // Same room on different dates never conflicts, so a conflict with an
    // equal date is a date-dimension collision only when the loser could
    // move dates; otherwise exclude the room.
    if loser.chosen_date == winner.chosen_date && loser.locked_room_id == winner.locked_room_id {
        LoserRedirect::Step3
    } else {
        LoserRedirect::Step2
    }
}

/// Apply the redirect: clears the contested commitment and routes the event.
pub fn apply_loser_redirect(loser: &mut EventRecord, redirect: LoserRedirect) {
    match redirect {
        LoserRedirect::Step2 => {
            loser.chosen_date = None;
            loser.record_transition(2, "conflict_resolution_lost_date");
        }
        LoserRedirect::Step3 => {
            if let Some(room) = loser.locked_room_id.take() {
                if !loser.excluded_rooms.contains(&room) {
                    loser.excluded_rooms.push(room);
                }
            }
            loser.room_eval_hash = None;
            if loser.status == EventStatus::Option {
                loser.status = EventStatus::Lead;
            }
            loser.record_transition(3, "conflict_resolution_lost_room");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held_event(id: &str, status: EventStatus) -> EventRecord {
        let mut ev = EventRecord::new("t1", "x@y.com", id);
        ev.id = id.to_string();
        ev.status = status;
        ev.chosen_date = Some("2026-02-07".to_string());
        ev.locked_room_id = Some("room_e".to_string());
        ev
    }

    #[test]
    fn redirect_excludes_contested_room() {
        let winner = held_event("a", EventStatus::Option);
        let mut loser = held_event("b", EventStatus::Option);
        let redirect = loser_redirect(&loser, &winner);
        assert_eq!(redirect, LoserRedirect::Step3);
        apply_loser_redirect(&mut loser, redirect);
        assert!(loser.locked_room_id.is_none());
        assert!(loser.excluded_rooms.contains(&"room_e".to_string()));
        assert_eq!(loser.current_step, 3);
        assert_eq!(loser.status, EventStatus::Lead);
    }

    #[test]
    fn date_redirect_clears_date() {
        let mut winner = held_event("a", EventStatus::Option);
        winner.chosen_date = Some("2026-02-08".to_string());
        let mut loser = held_event("b", EventStatus::Option);
        let redirect = loser_redirect(&loser, &winner);
        assert_eq!(redirect, LoserRedirect::Step2);
        apply_loser_redirect(&mut loser, redirect);
        assert!(loser.chosen_date.is_none());
        assert_eq!(loser.current_step, 2);
    }
}
