//! Booking lifecycle: pricing, availability, numbering, status
//! transitions and cancellation refunds.

pub mod availability;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod number;
pub mod payment;
pub mod pricing;
pub mod service;
pub mod store;

pub use error::{BookingError, BookingResult, StoreError, StoreResult};
pub use lifecycle::{BookingEvent, PickupReport, ReturnReport};
pub use service::{Actor, BookingService, Cancellation, NewBooking};
