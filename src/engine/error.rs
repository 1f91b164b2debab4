use std::fmt;

use ulid::Ulid;

use crate::model::{BookingStatus, IntervalError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Resource,
    Client,
    Booking,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::Resource => "resource",
            Entity::Client => "client",
            Entity::Booking => "booking",
        })
    }
}

/// Why a status change (or reschedule) was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The booking already reached a terminal status.
    Terminal {
        from: BookingStatus,
        to: BookingStatus,
    },
    /// Not in the transition table, e.g. confirmed → confirmed.
    NotAllowed {
        from: BookingStatus,
        to: BookingStatus,
    },
    /// Cancellation requested without a reason.
    MissingReason,
    /// Only confirmed bookings can be rescheduled.
    NotActive(BookingStatus),
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionError::Terminal { from, to } => {
                write!(f, "booking is {from} (terminal); cannot move to {to}")
            }
            TransitionError::NotAllowed { from, to } => {
                write!(f, "transition {from} -> {to} is not allowed")
            }
            TransitionError::MissingReason => write!(f, "cancellation requires a reason"),
            TransitionError::NotActive(status) => {
                write!(f, "booking is {status}; only confirmed bookings can be rescheduled")
            }
        }
    }
}

#[derive(Debug)]
pub enum EngineError {
    InvalidInterval(IntervalError),
    NotFound(Entity, Ulid),
    AlreadyExists(Ulid),
    /// Every confirmed booking the candidate interval overlaps.
    Conflict(Vec<Ulid>),
    IllegalTransition(TransitionError),
    HasBookings(Ulid),
    LimitExceeded(&'static str),
    WalError(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidInterval(e) => write!(f, "{e}"),
            EngineError::NotFound(entity, id) => write!(f, "{entity} not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Conflict(ids) => {
                write!(f, "conflict with booking")?;
                if ids.len() > 1 {
                    write!(f, "s")?;
                }
                for (i, id) in ids.iter().enumerate() {
                    let sep = if i == 0 { ": " } else { ", " };
                    write!(f, "{sep}{id}")?;
                }
                Ok(())
            }
            EngineError::IllegalTransition(e) => write!(f, "illegal transition: {e}"),
            EngineError::HasBookings(id) => {
                write!(f, "cannot remove resource {id}: it still has bookings")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<IntervalError> for EngineError {
    fn from(e: IntervalError) -> Self {
        EngineError::InvalidInterval(e)
    }
}

impl From<TransitionError> for EngineError {
    fn from(e: TransitionError) -> Self {
        EngineError::IllegalTransition(e)
    }
}
