pub mod app;
pub mod auth_handlers;
pub mod cache;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod models;
pub mod recipe_handlers;
pub mod repository;
pub mod sessions;
pub mod store;
pub mod tokens;

pub use app::{build_router, AppState};
pub use error::{ServiceError, ServiceResult};
