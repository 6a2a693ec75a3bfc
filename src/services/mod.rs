// Accounts and registration
pub mod accounts;
pub mod notifications;
pub mod otp;

// Inventory
pub mod dashboard;
pub mod products;

// Forecasting
pub mod festival_sales;

// External collaborators
pub mod assistant;

// Service factory for dependency injection
pub mod factory;
