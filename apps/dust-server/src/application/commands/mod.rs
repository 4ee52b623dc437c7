pub mod auth;
pub mod content;
pub mod models;
pub mod tenants;
