use crate::models::{EventRecord, GateStatus};

/// Order-independent prerequisite check for confirmation.
///
/// Reads the event record only; the caller applies any metadata updates
/// based on the snapshot. Never writes.
pub fn check_confirmation_gate(event: &EventRecord) -> GateStatus {
    let offer_accepted = event.offer_accepted;
    let billing_complete = event.billing.is_complete();
    let deposit_required = event.deposit.required;
    let deposit_paid = event.deposit.paid;

    GateStatus {
        offer_accepted,
        billing_complete,
        deposit_required,
        deposit_paid,
        ready_for_hil: offer_accepted && billing_complete && (!deposit_required || deposit_paid),
    }
}

/// The first missing prerequisite, in prompting order, or None when ready.
pub fn missing_prerequisite(gate: &GateStatus) -> Option<&'static str> {
    if !gate.offer_accepted {
        Some("acceptance")
    } else if !gate.billing_complete {
        Some("billing")
    } else if gate.deposit_required && !gate.deposit_paid {
        Some("deposit")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventRecord;

    fn accepted_event() -> EventRecord {
        let mut ev = EventRecord::new("t1", "a@b.com", "th");
        ev.offer_accepted = true;
        ev.billing.street = Some("Main St 1".to_string());
        ev.billing.postal_code = Some("10115".to_string());
        ev.billing.city = Some("Berlin".to_string());
        ev
    }

    #[test]
    fn ready_without_deposit_requirement() {
        let mut ev = accepted_event();
        ev.deposit.required = false;
        let gate = check_confirmation_gate(&ev);
        assert!(gate.ready_for_hil);
        assert!(missing_prerequisite(&gate).is_none());
    }

    #[test]
    fn unpaid_deposit_blocks() {
        let mut ev = accepted_event();
        ev.deposit.required = true;
        ev.deposit.paid = false;
        let gate = check_confirmation_gate(&ev);
        assert!(!gate.ready_for_hil);
        assert_eq!(missing_prerequisite(&gate), Some("deposit"));
    }

    #[test]
    fn prerequisites_are_order_independent() {
        // Deposit paid before billing arrives: gate still reports billing.
        let mut ev = EventRecord::new("t1", "a@b.com", "th");
        ev.offer_accepted = true;
        ev.deposit.required = true;
        ev.deposit.paid = true;
        let gate = check_confirmation_gate(&ev);
        assert!(!gate.ready_for_hil);
        assert_eq!(missing_prerequisite(&gate), Some("billing"));
    }
}
