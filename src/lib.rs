pub mod app;
pub mod config;
pub mod core;
pub mod export;
pub mod models;
