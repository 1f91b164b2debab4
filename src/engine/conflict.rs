use ulid::Ulid;

use crate::model::*;

use super::EngineError;

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// Ids of every overlapping confirmed booking, in start order.
    Rejected(Vec<Ulid>),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }

    pub fn into_result(self) -> Result<(), EngineError> {
        match self {
            Admission::Admitted => Ok(()),
            Admission::Rejected(ids) => Err(EngineError::Conflict(ids)),
        }
    }
}

pub(crate) fn validate_interval(interval: &Interval) -> Result<(), EngineError> {
    use crate::limits::*;
    if interval.start() < MIN_VALID_TIMESTAMP_MS || interval.end() > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if interval.duration_ms() > MAX_SPAN_DURATION_MS {
        return Err(EngineError::LimitExceeded("interval too wide"));
    }
    Ok(())
}

/// Decide whether `candidate` may become a confirmed booking on `rs`.
///
/// Only confirmed bookings occupy the resource. `excluding` skips one booking,
/// so a reschedule is checked against every *other* booking.
///
/// The caller must hold the resource's write lock until the resulting booking
/// is persisted, otherwise two admitted candidates could race in.
pub fn check_admission(rs: &ResourceState, candidate: &Interval, excluding: Option<Ulid>) -> Admission {
    let conflicts: Vec<Ulid> = rs
        .overlapping(candidate)
        .filter(|b| b.is_active() && Some(b.id) != excluding)
        .map(|b| b.id)
        .collect();
    if conflicts.is_empty() {
        Admission::Admitted
    } else {
        Admission::Rejected(conflicts)
    }
}
