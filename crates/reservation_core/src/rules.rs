use tracing::warn;

use crate::{
    gate::GateState,
    notifications::Notification,
    reservation::{ChangeEvent, ChangeKind, ReservationStatus},
};

/// Decides whether a change event produces a notification.
pub trait ListenerRules: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    fn evaluate(&self, event: &ChangeEvent, gate: GateState) -> Option<Notification>;
}

/// Rules for a user watching their own reservations.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserRules;

impl ListenerRules for UserRules {
    fn name(&self) -> &'static str {
        "user"
    }

    fn evaluate(&self, event: &ChangeEvent, gate: GateState) -> Option<Notification> {
        let reservation = &event.reservation;
        match event.kind {
            // An approved row showing up live means an administrator assigned it directly.
            ChangeKind::Added => {
                if reservation.status == ReservationStatus::Approved && gate == GateState::Active {
                    Some(Notification::assigned(&reservation.space_name))
                } else {
                    None
                }
            }
            ChangeKind::Modified => {
                if reservation.is_rejection() {
                    Some(Notification::rejected(&reservation.rejection_reason))
                } else if reservation.status == ReservationStatus::Approved {
                    Some(Notification::approved(&reservation.space_name))
                } else {
                    None
                }
            }
            ChangeKind::Removed => Some(Notification::deleted(&reservation.space_name)),
        }
    }
}

/// Rules for an administrator watching incoming pending requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdminRules;

impl ListenerRules for AdminRules {
    fn name(&self) -> &'static str {
        "admin"
    }

    fn evaluate(&self, event: &ChangeEvent, gate: GateState) -> Option<Notification> {
        if gate == GateState::Suppressing {
            return None;
        }
        if event.kind != ChangeKind::Added {
            warn!(
                kind = ?event.kind,
                reservation_id = %event.reservation.id,
                "pending-request feed delivered a non-addition"
            );
        }
        Some(Notification::new_request(&event.reservation.space_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::NotificationKind;
    use crate::reservation::Reservation;

    fn reservation(status: ReservationStatus) -> Reservation {
        Reservation::new("r1", "u1", "Lab 3", status)
    }

    fn kind_of(notification: Option<Notification>) -> Option<NotificationKind> {
        notification.map(|n| n.kind)
    }

    #[test]
    fn removal_always_notifies_deletion() {
        for gate in [GateState::Suppressing, GateState::Active] {
            for status in [
                ReservationStatus::Pending,
                ReservationStatus::Approved,
                ReservationStatus::Cancelled,
            ] {
                let event = ChangeEvent::removed(reservation(status));
                let notification = UserRules.evaluate(&event, gate).expect("deleted");
                assert_eq!(notification.kind, NotificationKind::Deleted);
                assert!(notification.body.contains("Lab 3"));
            }
        }
    }

    #[test]
    fn added_without_approval_is_silent() {
        for status in [
            ReservationStatus::Pending,
            ReservationStatus::Cancelled,
            ReservationStatus::Completed,
            ReservationStatus::Unknown,
        ] {
            let event = ChangeEvent::added(reservation(status));
            assert_eq!(kind_of(UserRules.evaluate(&event, GateState::Active)), None);
        }
    }

    #[test]
    fn approved_addition_respects_gate() {
        let event = ChangeEvent::added(reservation(ReservationStatus::Approved));
        assert_eq!(kind_of(UserRules.evaluate(&event, GateState::Suppressing)), None);
        assert_eq!(
            kind_of(UserRules.evaluate(&event, GateState::Active)),
            Some(NotificationKind::Assigned)
        );
    }

    #[test]
    fn cancellation_without_reason_is_silent() {
        let event = ChangeEvent::modified(reservation(ReservationStatus::Cancelled));
        assert_eq!(kind_of(UserRules.evaluate(&event, GateState::Active)), None);
    }

    #[test]
    fn cancellation_with_reason_is_a_rejection() {
        let event = ChangeEvent::modified(
            reservation(ReservationStatus::Cancelled).with_rejection_reason("Overbooked"),
        );
        let notification = UserRules
            .evaluate(&event, GateState::Suppressing)
            .expect("rejection");
        assert_eq!(notification.kind, NotificationKind::Rejected);
        assert!(notification.body.contains("Overbooked"));
    }

    #[test]
    fn modification_to_approved_notifies_approval() {
        let event = ChangeEvent::modified(reservation(ReservationStatus::Approved));
        assert_eq!(
            kind_of(UserRules.evaluate(&event, GateState::Suppressing)),
            Some(NotificationKind::Approved)
        );
        let pending = ChangeEvent::modified(reservation(ReservationStatus::Pending));
        assert_eq!(kind_of(UserRules.evaluate(&pending, GateState::Active)), None);
    }

    #[test]
    fn admin_drops_everything_while_suppressing() {
        for event in [
            ChangeEvent::added(reservation(ReservationStatus::Pending)),
            ChangeEvent::modified(reservation(ReservationStatus::Pending)),
            ChangeEvent::removed(reservation(ReservationStatus::Pending)),
        ] {
            assert_eq!(kind_of(AdminRules.evaluate(&event, GateState::Suppressing)), None);
        }
    }

    #[test]
    fn admin_names_the_space_once_active() {
        let event = ChangeEvent::added(reservation(ReservationStatus::Pending));
        let notification = AdminRules
            .evaluate(&event, GateState::Active)
            .expect("new request");
        assert_eq!(notification.kind, NotificationKind::NewRequest);
        assert_eq!(notification.body, "Pending request for: Lab 3");
    }
}
