use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::pricing::{compute_pricing, PricingBreakdown};
use crate::entities::booking::{Addon, InsuranceType};
use crate::entities::car::{self, CarStatus};
use crate::entities::location;
use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRangeQuery {
    fn range(&self) -> AppResult<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Ok(Some((start, end))),
            (None, None) => Ok(None),
            _ => Err(AppError::BadRequest(
                "start and end must be given together".to_string(),
            )),
        }
    }
}

/// List rentable cars, optionally only those free for a date range
pub async fn list_cars(
    State(state): State<AppState>,
    Query(query): Query<DateRangeQuery>,
) -> AppResult<Json<Vec<car::Model>>> {
    let cars = car::Entity::find()
        .filter(car::Column::IsActive.eq(true))
        .filter(car::Column::Status.eq(CarStatus::Available))
        .order_by_asc(car::Column::PricePerDay)
        .all(&state.db)
        .await?;

    let Some((start, end)) = query.range()? else {
        return Ok(Json(cars));
    };

    let mut available = Vec::with_capacity(cars.len());
    for c in cars {
        if state.bookings.is_available(c.id, start, end).await? {
            available.push(c);
        }
    }

    Ok(Json(available))
}

/// Get car details
pub async fn get_car(
    State(state): State<AppState>,
    Path(car_id): Path<Uuid>,
) -> AppResult<Json<car::Model>> {
    let car = car::Entity::find_by_id(car_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Car not found".to_string()))?;

    Ok(Json(car))
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub car_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub available: bool,
}

/// Check whether a car is free for a date range
pub async fn car_availability(
    State(state): State<AppState>,
    Path(car_id): Path<Uuid>,
    Query(query): Query<DateRangeQuery>,
) -> AppResult<Json<AvailabilityResponse>> {
    let (start, end) = query
        .range()?
        .ok_or_else(|| AppError::BadRequest("start and end are required".to_string()))?;

    let available = state.bookings.is_available(car_id, start, end).await?;

    Ok(Json(AvailabilityResponse {
        car_id,
        start,
        end,
        available,
    }))
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub addons: Vec<Addon>,
    #[serde(default)]
    pub insurance_type: InsuranceType,
}

/// Price a prospective rental without reserving anything
pub async fn quote(
    State(state): State<AppState>,
    Path(car_id): Path<Uuid>,
    Json(payload): Json<QuoteRequest>,
) -> AppResult<Json<PricingBreakdown>> {
    if payload.end_date <= payload.start_date {
        return Err(AppError::BadRequest(
            "End date must be after start date".to_string(),
        ));
    }

    let car = car::Entity::find_by_id(car_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Car not found".to_string()))?;

    let pricing = compute_pricing(
        car.price_per_day,
        payload.start_date,
        payload.end_date,
        &payload.addons,
        payload.insurance_type,
        Decimal::ZERO,
        state.bookings.policy(),
    )?;

    Ok(Json(pricing))
}

// ============ Fleet Management ============

#[derive(Debug, Deserialize)]
pub struct CreateCarRequest {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub category: String,
    pub transmission: String,
    pub fuel_type: String,
    pub seats: i32,
    pub doors: i32,
    pub color: String,
    pub license_plate: String,
    pub vin: String,
    #[serde(default)]
    pub mileage: i32,
    pub price_per_day: Decimal,
    pub location_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCarRequest {
    pub color: Option<String>,
    pub mileage: Option<i32>,
    pub price_per_day: Option<Decimal>,
    pub location_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SetCarStatusRequest {
    pub status: CarStatus,
}

async fn ensure_location(state: &AppState, location_id: Uuid) -> AppResult<()> {
    location::Entity::find_by_id(location_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid location".to_string()))?;
    Ok(())
}

/// Add a car to the fleet (admin)
pub async fn create_car(
    State(state): State<AppState>,
    Json(payload): Json<CreateCarRequest>,
) -> AppResult<Json<car::Model>> {
    if payload.price_per_day.is_sign_negative() {
        return Err(AppError::BadRequest("Price per day cannot be negative".to_string()));
    }
    if !(2..=15).contains(&payload.seats) || !(2..=5).contains(&payload.doors) {
        return Err(AppError::BadRequest("Invalid seat or door count".to_string()));
    }
    ensure_location(&state, payload.location_id).await?;

    let license_plate = payload.license_plate.trim().to_uppercase();
    let existing = car::Entity::find()
        .filter(car::Column::LicensePlate.eq(&license_plate))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(
            "A car with this license plate already exists".to_string(),
        ));
    }

    let car = car::ActiveModel {
        id: Set(Uuid::new_v4()),
        make: Set(payload.make),
        model: Set(payload.model),
        year: Set(payload.year),
        category: Set(payload.category),
        transmission: Set(payload.transmission),
        fuel_type: Set(payload.fuel_type),
        seats: Set(payload.seats),
        doors: Set(payload.doors),
        color: Set(payload.color),
        license_plate: Set(license_plate),
        vin: Set(payload.vin.trim().to_uppercase()),
        mileage: Set(payload.mileage),
        price_per_day: Set(payload.price_per_day),
        location_id: Set(payload.location_id),
        status: Set(CarStatus::Available),
        is_active: Set(true),
        created_at: Set(Utc::now()),
    };

    let result = car.insert(&state.db).await?;
    tracing::info!(car_id = %result.id, plate = %result.license_plate, "Car added");
    Ok(Json(result))
}

/// Update a car (admin)
pub async fn update_car(
    State(state): State<AppState>,
    Path(car_id): Path<Uuid>,
    Json(payload): Json<UpdateCarRequest>,
) -> AppResult<Json<car::Model>> {
    let car = car::Entity::find_by_id(car_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Car not found".to_string()))?;

    let mut active: car::ActiveModel = car.into();

    if let Some(color) = payload.color {
        active.color = Set(color);
    }
    if let Some(mileage) = payload.mileage {
        active.mileage = Set(mileage);
    }
    if let Some(price) = payload.price_per_day {
        if price.is_sign_negative() {
            return Err(AppError::BadRequest("Price per day cannot be negative".to_string()));
        }
        active.price_per_day = Set(price);
    }
    if let Some(location_id) = payload.location_id {
        ensure_location(&state, location_id).await?;
        active.location_id = Set(location_id);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }

    let result = active.update(&state.db).await?;
    Ok(Json(result))
}

/// Change a car's fleet status (admin)
pub async fn set_car_status(
    State(state): State<AppState>,
    Path(car_id): Path<Uuid>,
    Json(payload): Json<SetCarStatusRequest>,
) -> AppResult<Json<car::Model>> {
    let car = car::Entity::find_by_id(car_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Car not found".to_string()))?;

    let mut active: car::ActiveModel = car.into();
    active.status = Set(payload.status);

    let result = active.update(&state.db).await?;
    tracing::info!(car_id = %result.id, status = ?result.status, "Car status changed");
    Ok(Json(result))
}

/// Retire a car; booking history keeps referencing it (admin)
pub async fn deactivate_car(
    State(state): State<AppState>,
    Path(car_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let car = car::Entity::find_by_id(car_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Car not found".to_string()))?;

    let mut active: car::ActiveModel = car.into();
    active.is_active = Set(false);
    active.update(&state.db).await?;

    Ok(Json(serde_json::json!({ "message": "Car deactivated" })))
}
