use std::env;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::booking::pricing::{InsuranceRates, PricingPolicy};

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub server_host: String,
    pub server_port: u16,
    pub tax_rate: Decimal,
    pub insurance_rates: InsuranceRates,
    pub pending_expiry_minutes: i64,
    pub expiry_sweep_seconds: u64,
    pub payment_gateway_url: Option<String>,
    pub admin_email: String,
    pub admin_password: String,
    pub booking_write_retries: u32,
}

fn parsed<T: FromStr>(key: &str, default: &str) -> T {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{} must be a valid {}", key, std::any::type_name::<T>()))
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set"),
            jwt_expiration_hours: parsed("JWT_EXPIRATION_HOURS", "24"),
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parsed("SERVER_PORT", "3000"),
            tax_rate: parsed("TAX_RATE", "0.10"),
            insurance_rates: InsuranceRates {
                basic: parsed("INSURANCE_BASIC_PER_DAY", "10"),
                standard: parsed("INSURANCE_STANDARD_PER_DAY", "20"),
                premium: parsed("INSURANCE_PREMIUM_PER_DAY", "35"),
            },
            pending_expiry_minutes: parsed("PENDING_EXPIRY_MINUTES", "60"),
            expiry_sweep_seconds: parsed("EXPIRY_SWEEP_SECONDS", "300"),
            payment_gateway_url: env::var("PAYMENT_GATEWAY_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            admin_email: env::var("ADMIN_EMAIL")
                .unwrap_or_else(|_| "admin@carrental.com".to_string()),
            admin_password: env::var("ADMIN_PASSWORD")
                .unwrap_or_else(|_| "admin12345".to_string()),
            booking_write_retries: parsed("BOOKING_WRITE_RETRIES", "3"),
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn pricing_policy(&self) -> PricingPolicy {
        PricingPolicy {
            tax_rate: self.tax_rate,
            insurance: self.insurance_rates,
        }
    }
}
