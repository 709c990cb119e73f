use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use sea_orm_migration::MigratorTrait;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::map_response_body::MapResponseBodyLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use car_rental_backend::{
    booking::payment::{CounterPaymentGateway, HttpPaymentGateway, PaymentGateway},
    config::Config,
    db::{self, SeaOrmStore},
    entities::user::{self, UserRole},
    handlers::auth::hash_password,
    middleware::rate_limit::{create_global_governor, log_request},
    routes, AppState, BookingService,
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "car_rental_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    tracing::info!("Starting server at {}", config.server_addr());

    // Connect to database
    let db = db::connect(&config)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Connected to database");

    // Run migrations
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    tracing::info!("Migrations complete");

    // Seed admin account if not exists
    seed_admin(&db, &config).await;

    let payments: Arc<dyn PaymentGateway> = match &config.payment_gateway_url {
        Some(url) => {
            tracing::info!("Using payment gateway at {}", url);
            Arc::new(HttpPaymentGateway::new(url.clone()))
        }
        None => {
            tracing::warn!("PAYMENT_GATEWAY_URL not set, payments are settled at the counter");
            Arc::new(CounterPaymentGateway)
        }
    };

    let bookings = BookingService::new(
        Arc::new(SeaOrmStore::new(db.clone())),
        payments,
        config.pricing_policy(),
        config.booking_write_retries,
    );

    spawn_expiry_sweep(bookings.clone(), &config);

    // Create app state
    let state = AppState {
        db,
        config: config.clone(),
        bookings,
    };

    // Create router with middleware (outermost first)
    let app = routes::create_router(state).layer(
        ServiceBuilder::new()
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
            .layer(MapResponseBodyLayer::new(axum::body::Body::new))
            .layer(TraceLayer::new_for_http())
            .layer(axum::middleware::from_fn(log_request))
            .layer(create_global_governor()),
    );

    // Start server with socket address for rate limiting
    let addr: SocketAddr = config.server_addr().parse().expect("Invalid address");
    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}

/// Periodically expire bookings left pending past the confirmation window
fn spawn_expiry_sweep(bookings: BookingService, config: &Config) {
    let window = chrono::Duration::minutes(config.pending_expiry_minutes);
    let period = Duration::from_secs(config.expiry_sweep_seconds.max(1));

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if let Err(e) = bookings.expire_pending(window).await {
                tracing::warn!(error = %e, "Expiry sweep failed");
            }
        }
    });
}

/// Seed the admin account if it doesn't exist
async fn seed_admin(db: &sea_orm::DatabaseConnection, config: &Config) {
    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(&config.admin_email))
        .one(db)
        .await
        .expect("Failed to check for admin");

    if existing.is_none() {
        let password_hash =
            hash_password(&config.admin_password).expect("Failed to hash admin password");

        let admin = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(config.admin_email.clone()),
            password_hash: Set(password_hash),
            first_name: Set("Admin".to_string()),
            last_name: Set("User".to_string()),
            phone: Set(String::new()),
            date_of_birth: Set(chrono::NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid date")),
            role: Set(UserRole::Admin),
            is_active: Set(true),
            last_login: Set(None),
            created_at: Set(Utc::now()),
        };

        admin.insert(db).await.expect("Failed to create admin");
        tracing::info!("Admin account created: {}", config.admin_email);
    }
}
