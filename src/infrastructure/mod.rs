pub mod config;
pub mod database;
pub mod entities;
pub mod messaging;
pub mod orders;
pub mod repositories;
pub mod traits;
