pub mod booking;
pub mod car;
pub mod location;
pub mod promo_code;
pub mod user;
