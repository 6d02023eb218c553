use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use shared_models::consultation::{Consultation, ConsultationStatus};
use shared_models::StatusChange;

use crate::models::ConsultationError;

/// Statuses reachable in one step. COMPLETED and CANCELLED are terminal.
pub fn allowed_transitions(current: ConsultationStatus) -> &'static [ConsultationStatus] {
    use ConsultationStatus::*;

    match current {
        Pending => &[Active, Cancelled],
        Active => &[Completed, Cancelled],
        Completed | Cancelled => &[],
    }
}

pub fn validate_transition(
    current: ConsultationStatus,
    requested: ConsultationStatus,
) -> Result<(), ConsultationError> {
    if allowed_transitions(current).contains(&requested) {
        debug!("Status transition validated: {} -> {}", current, requested);
        return Ok(());
    }

    warn!("Invalid status transition attempted: {} -> {}", current, requested);
    Err(ConsultationError::InvalidTransition {
        from: current,
        to: requested,
    })
}

/// Builds the conditional write for a validated transition. Timestamps are
/// only supplied when the consultation does not carry one yet.
pub fn plan_transition(
    consultation: &Consultation,
    requested: ConsultationStatus,
    now: DateTime<Utc>,
) -> Result<StatusChange, ConsultationError> {
    validate_transition(consultation.status, requested)?;

    let started_at = (requested == ConsultationStatus::Active && consultation.started_at.is_none())
        .then_some(now);
    let ended_at = (requested == ConsultationStatus::Completed && consultation.ended_at.is_none())
        .then_some(now);

    Ok(StatusChange {
        expected: consultation.status,
        new_status: requested,
        started_at,
        ended_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use uuid::Uuid;
    use ConsultationStatus::*;

    const ALL: [ConsultationStatus; 4] = [Pending, Active, Completed, Cancelled];

    fn consultation(status: ConsultationStatus) -> Consultation {
        let now = Utc::now();
        Consultation {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            title: "Checkup".to_string(),
            description: String::new(),
            status,
            started_at: None,
            ended_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn only_forward_moves_and_cancellation_are_legal() {
        let legal = [
            (Pending, Active),
            (Active, Completed),
            (Pending, Cancelled),
            (Active, Cancelled),
        ];

        for from in ALL {
            for to in ALL {
                let result = validate_transition(from, to);
                if legal.contains(&(from, to)) {
                    assert!(result.is_ok(), "{} -> {} should be allowed", from, to);
                } else {
                    assert_matches!(result, Err(ConsultationError::InvalidTransition { .. }));
                }
            }
        }
    }

    #[test]
    fn activation_stamps_started_at() {
        let now = Utc::now();
        let change = plan_transition(&consultation(Pending), Active, now).unwrap();

        assert_eq!(change.expected, Pending);
        assert_eq!(change.started_at, Some(now));
        assert_eq!(change.ended_at, None);
    }

    #[test]
    fn completion_keeps_existing_end_timestamp() {
        let earlier = Utc::now() - chrono::Duration::hours(1);
        let mut active = consultation(Active);
        active.ended_at = Some(earlier);

        let change = plan_transition(&active, Completed, Utc::now()).unwrap();
        assert_eq!(change.ended_at, None);
        assert_eq!(change.started_at, None);
    }

    #[test]
    fn cancellation_stamps_nothing() {
        let change = plan_transition(&consultation(Active), Cancelled, Utc::now()).unwrap();
        assert!(change.started_at.is_none() && change.ended_at.is_none());
    }
}
