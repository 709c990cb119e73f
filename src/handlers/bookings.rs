use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::pricing::PricingBreakdown;
use crate::booking::NewBooking;
use crate::entities::booking;
use crate::error::{AppError, AppResult};
use crate::utils::jwt::Claims;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    #[serde(flatten)]
    pub booking: booking::Model,
    pub pricing: PricingBreakdown,
    pub extra_charges: Decimal,
    pub is_active_now: bool,
}

impl From<booking::Model> for BookingResponse {
    fn from(booking: booking::Model) -> Self {
        Self {
            pricing: booking.pricing(),
            extra_charges: booking.extra_charges(),
            is_active_now: booking.is_active_at(Utc::now()),
            booking,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CancellationResponse {
    pub booking: BookingResponse,
    pub refund_amount: Decimal,
}

/// Reserve a car
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<NewBooking>,
) -> AppResult<Json<BookingResponse>> {
    let booking = state.bookings.create_booking(claims.sub, payload).await?;
    Ok(Json(booking.into()))
}

/// List the caller's bookings
pub async fn my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<BookingResponse>>> {
    let bookings = state.bookings.list_for_user(claims.sub).await?;
    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

async fn managed_booking(
    state: &AppState,
    claims: &Claims,
    booking_id: Uuid,
) -> AppResult<booking::Model> {
    let booking = state.bookings.get_booking(booking_id).await?;
    if !claims.actor().may_manage(&booking) {
        return Err(AppError::Forbidden(
            "Not authorized to access this booking".to_string(),
        ));
    }
    Ok(booking)
}

/// Get one booking (owner or staff)
pub async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<BookingResponse>> {
    let booking = managed_booking(&state, &claims, booking_id).await?;
    Ok(Json(booking.into()))
}

/// Authorize payment and confirm a pending booking (owner only)
pub async fn confirm_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<BookingResponse>> {
    let booking = state
        .bookings
        .confirm_booking(booking_id, claims.actor())
        .await?;
    Ok(Json(booking.into()))
}

/// Cancel a booking (owner or staff)
pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
    payload: Option<Json<CancelRequest>>,
) -> AppResult<Json<CancellationResponse>> {
    let reason = payload.and_then(|Json(p)| p.reason);
    let cancellation = state
        .bookings
        .cancel_booking(booking_id, claims.actor(), reason)
        .await?;

    Ok(Json(CancellationResponse {
        booking: cancellation.booking.into(),
        refund_amount: cancellation.refund_amount,
    }))
}
