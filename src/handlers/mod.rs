pub mod assistant;
pub mod auth;
pub mod codes;
pub mod common;
pub mod dashboard;
pub mod festival;
pub mod health;
pub mod products;
pub mod staff;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;
