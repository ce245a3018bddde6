pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod exit;
pub mod export;
pub mod inventory;
pub mod platform;
pub mod rules;
pub mod ui;
pub mod validate;
