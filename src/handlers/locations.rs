use axum::{extract::State, Json};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::location;
use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateLocationRequest {
    pub name: String,
    pub address: String,
    pub city: String,
    pub country: String,
}

/// List active pickup/dropoff locations
pub async fn list_locations(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<location::Model>>> {
    let locations = location::Entity::find()
        .filter(location::Column::IsActive.eq(true))
        .order_by_asc(location::Column::Name)
        .all(&state.db)
        .await?;

    Ok(Json(locations))
}

/// Create a location (admin)
pub async fn create_location(
    State(state): State<AppState>,
    Json(payload): Json<CreateLocationRequest>,
) -> AppResult<Json<location::Model>> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("Location name is required".to_string()));
    }

    let location = location::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name.trim().to_string()),
        address: Set(payload.address),
        city: Set(payload.city),
        country: Set(payload.country),
        is_active: Set(true),
        created_at: Set(Utc::now()),
    };

    let result = location.insert(&state.db).await?;
    Ok(Json(result))
}
