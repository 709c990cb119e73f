use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::{BookingEvent, PickupReport, ReturnReport};
use crate::entities::booking::BookingStatus;
use crate::entities::promo_code;
use crate::entities::user::{self, UserRole};
use crate::error::{AppError, AppResult};
use crate::handlers::bookings::BookingResponse;
use crate::AppState;

// ============ Booking Operations ============

#[derive(Debug, Deserialize)]
pub struct BookingListQuery {
    pub status: Option<BookingStatus>,
}

/// List all bookings, optionally by status (staff)
pub async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<BookingListQuery>,
) -> AppResult<Json<Vec<BookingResponse>>> {
    let bookings = state.bookings.list_all(query.status).await?;
    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

/// Hand the car over to the renter (staff)
pub async fn pickup(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(report): Json<PickupReport>,
) -> AppResult<Json<BookingResponse>> {
    let booking = state
        .bookings
        .transition(booking_id, BookingEvent::Pickup(report))
        .await?;
    Ok(Json(booking.into()))
}

/// Take the car back and close the rental (staff)
pub async fn return_car(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(report): Json<ReturnReport>,
) -> AppResult<Json<BookingResponse>> {
    let booking = state
        .bookings
        .transition(booking_id, BookingEvent::Return(report))
        .await?;
    Ok(Json(booking.into()))
}

/// Expire pending bookings past the confirmation window (staff)
pub async fn expire_pending(
    State(state): State<AppState>,
) -> AppResult<Json<serde_json::Value>> {
    let window = Duration::minutes(state.config.pending_expiry_minutes);
    let expired = state.bookings.expire_pending(window).await?;
    Ok(Json(serde_json::json!({ "expired": expired })))
}

// ============ User Management ============

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(u: user::Model) -> Self {
        Self {
            name: u.full_name(),
            id: u.id,
            email: u.email,
            role: u.role,
            is_active: u.is_active,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

/// List all users (admin)
pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<UserResponse>>> {
    let users = user::Entity::find()
        .order_by_desc(user::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(users.into_iter().map(Into::into).collect()))
}

/// Change a user's role or deactivate the account (admin)
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<UserResponse>> {
    let user = user::Entity::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let mut active: user::ActiveModel = user.into();
    if let Some(role) = payload.role {
        active.role = Set(role);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }

    let result = active.update(&state.db).await?;
    Ok(Json(result.into()))
}

// ============ Promo Codes ============

#[derive(Debug, Deserialize)]
pub struct CreatePromoRequest {
    pub code: String,
    pub discount: Decimal,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Create a promo code (admin)
pub async fn create_promo(
    State(state): State<AppState>,
    Json(payload): Json<CreatePromoRequest>,
) -> AppResult<Json<promo_code::Model>> {
    let code = payload.code.trim().to_uppercase();
    if code.is_empty() {
        return Err(AppError::BadRequest("Promo code is required".to_string()));
    }
    if payload.discount.is_sign_negative() {
        return Err(AppError::BadRequest("Discount cannot be negative".to_string()));
    }

    if promo_code::Entity::find_by_id(code.clone())
        .one(&state.db)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("Promo code already exists".to_string()));
    }

    let promo = promo_code::ActiveModel {
        code: Set(code),
        discount: Set(payload.discount),
        is_active: Set(true),
        expires_at: Set(payload.expires_at),
    };

    let result = promo.insert(&state.db).await?;
    Ok(Json(result))
}
