pub mod bookings;
pub mod health;
pub mod locations;
pub mod metrics;
pub mod request_id;
