use axum::{
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;

use crate::handlers::{admin, auth, bookings, cars, locations};
use crate::middleware::auth::{auth_middleware, require_admin, require_staff};
use crate::middleware::rate_limit::{create_public_governor, create_user_governor};
use crate::AppState;

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "message": "Server is running",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub fn create_router(state: AppState) -> Router {
    // Public routes (rate limited per IP)
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(create_public_governor());

    let me_routes = Router::new()
        .route("/me", get(auth::me))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Public catalogue
    let public_routes = Router::new()
        .route("/cars", get(cars::list_cars))
        .route("/cars/{id}", get(cars::get_car))
        .route("/cars/{id}/availability", get(cars::car_availability))
        .route("/cars/{id}/quote", post(cars::quote))
        .route("/locations", get(locations::list_locations));

    // Customer booking routes (requires auth, rate limited per user)
    let booking_routes = Router::new()
        .route("/", post(bookings::create_booking).get(bookings::my_bookings))
        .route("/{id}", get(bookings::get_booking))
        .route("/{id}/confirm", post(bookings::confirm_booking))
        .route("/{id}/cancel", post(bookings::cancel_booking))
        .layer(create_user_governor())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Rental counter routes (requires auth + manager or admin role)
    let staff_routes = Router::new()
        .route("/bookings", get(admin::list_bookings))
        .route("/bookings/{id}/pickup", post(admin::pickup))
        .route("/bookings/{id}/return", post(admin::return_car))
        .route("/bookings/expire", post(admin::expire_pending))
        .layer(middleware::from_fn(require_staff))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Admin routes (requires auth + admin role)
    let admin_routes = Router::new()
        .route("/cars", post(cars::create_car))
        .route("/cars/{id}", put(cars::update_car).delete(cars::deactivate_car))
        .route("/cars/{id}/status", put(cars::set_car_status))
        .route("/locations", post(locations::create_location))
        .route("/promo-codes", post(admin::create_promo))
        .route("/users", get(admin::list_users))
        .route("/users/{id}", put(admin::update_user))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health))
        .nest("/api/auth", auth_routes.merge(me_routes))
        .nest("/api", public_routes)
        .nest("/api/bookings", booking_routes)
        .nest("/api/admin", staff_routes.merge(admin_routes))
        .with_state(state)
}
