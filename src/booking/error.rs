use thiserror::Error;

use crate::entities::booking::BookingStatus;

/// Failures reported by the persistence and payment collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("date range overlaps an existing reservation")]
    Overlap,

    #[error("record changed since it was read")]
    Stale,

    #[error("booking number already taken")]
    DuplicateNumber,

    #[error("transaction could not be serialized")]
    Serialization,

    #[error("{0}")]
    Backend(String),
}

impl StoreError {
    /// Whether the write may succeed if attempted again from a fresh read.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::DuplicateNumber | StoreError::Serialization)
    }
}

impl From<sea_orm::DbErr> for StoreError {
    fn from(e: sea_orm::DbErr) -> Self {
        StoreError::Backend(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotEligible(String),

    #[error("cannot move booking from {from:?} via {event}")]
    InvalidTransition {
        from: BookingStatus,
        event: &'static str,
    },

    #[error("booking is already {0:?}")]
    AlreadyTerminal(BookingStatus),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("payment declined: {0}")]
    PaymentDeclined(String),

    #[error("store error: {0}")]
    Store(String),
}

impl BookingError {
    pub fn not_found(entity: &'static str) -> Self {
        BookingError::NotFound { entity }
    }
}

impl From<StoreError> for BookingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Overlap => {
                BookingError::Conflict("Car is already reserved for the requested dates".to_string())
            }
            StoreError::Stale | StoreError::Serialization => {
                BookingError::Conflict("Booking was modified by another request".to_string())
            }
            other => BookingError::Store(other.to_string()),
        }
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
