pub mod config;
pub mod cycle;
pub mod error;
pub mod models;
pub mod routes;
pub mod store;
