pub mod chat;
pub mod config;
pub mod errors;
pub mod exchange;
pub mod execution;
pub mod metrics;
pub mod models;
pub mod parser;
pub mod services;
