pub mod appointments;
pub mod assistant;
pub mod error;
pub mod inventory;
pub mod router;
pub mod services;
pub mod templates;
pub mod traits;
