use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{Money, ReservationId, ReservationStatus, RoomId};

#[derive(Debug, Error)]
pub enum BookingError {
    /// Malformed or missing fields, bad date format or ordering.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid date range")]
    InvalidDateRange,
    /// A private-only event covers the stay; only a whole-property booking is allowed.
    #[error("{date} is reserved for private event \"{event_name}\"; book the whole property instead")]
    PrivateEventOnly { date: NaiveDate, event_name: String },
    #[error("room {room} is unavailable on {date}")]
    RoomUnavailable { room: RoomId, date: NaiveDate },
    #[error("only {available} room(s) available on {date}, {requested} requested")]
    InsufficientCapacity {
        date: NaiveDate,
        available: u32,
        requested: u32,
    },
    #[error("computed total {0} is not positive")]
    InvalidTotal(Money),
    #[error("reservation not found: {0}")]
    NotFound(ReservationId),
    #[error("cannot change reservation status from {from} to {to}")]
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl BookingError {
    /// Storage failures leave no partial state, so the whole request may be resubmitted.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BookingError::Persistence(_))
    }

    /// Business-rule rejections the caller can offer a remedy for.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            BookingError::PrivateEventOnly { .. }
                | BookingError::RoomUnavailable { .. }
                | BookingError::InsufficientCapacity { .. }
        )
    }
}

impl From<std::io::Error> for BookingError {
    fn from(e: std::io::Error) -> Self {
        BookingError::Persistence(e.to_string())
    }
}
