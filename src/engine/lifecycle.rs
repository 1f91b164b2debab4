use crate::model::BookingStatus;

use super::error::TransitionError;

/// Check a status change against the transition table.
///
/// Returns the cancellation reason to store: the trimmed reason for a
/// cancellation, `None` for every other target status.
pub fn validate_transition(
    from: BookingStatus,
    to: BookingStatus,
    reason: Option<&str>,
) -> Result<Option<String>, TransitionError> {
    if from.is_terminal() {
        return Err(TransitionError::Terminal { from, to });
    }
    if !from.can_transition_to(to) {
        return Err(TransitionError::NotAllowed { from, to });
    }
    if to != BookingStatus::Cancelled {
        return Ok(None);
    }
    match reason.map(str::trim) {
        Some(r) if !r.is_empty() => Ok(Some(r.to_string())),
        _ => Err(TransitionError::MissingReason),
    }
}

/// A booking may only be moved while it still occupies its resource.
pub fn validate_reschedule(status: BookingStatus) -> Result<(), TransitionError> {
    if status.is_active() {
        Ok(())
    } else {
        Err(TransitionError::NotActive(status))
    }
}
