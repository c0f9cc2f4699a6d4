pub mod health;
pub mod packages;
pub mod progress;
